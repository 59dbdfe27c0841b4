//! Command handlers.
//!
//! Each handler forwards to `notechat_core::Persistence` and renders the
//! result as plain text. Errors are flattened to strings at this boundary.

use std::io::Write;
use std::path::Path;

use notechat_core::{Chat, ChatEdit, Dataset, NewAttachment, Persistence, StoreConfig};

use crate::cli::{Cli, Commands};

type CmdResult = Result<(), String>;

fn err(e: impl std::fmt::Display) -> String {
    e.to_string()
}

/// Run one parsed command, writing human-readable output to `out`.
///
/// `import` and `reset` never read the stored chats, so they still work when
/// the stored table is unreadable.
pub async fn run(cli: Cli, out: &mut impl Write) -> CmdResult {
    let config = StoreConfig::resolve(cli.data_dir)?;
    let store = Persistence::open(&config).await.map_err(err)?;

    match cli.command {
        Commands::List => {
            let dataset = load_dataset(&store).await?;
            if dataset.is_empty() {
                writeln!(out, "No chats yet").map_err(err)?;
            }
            for chat in dataset.chats() {
                write_chat_line(out, chat)?;
            }
        }

        Commands::Search { query } => {
            let dataset = load_dataset(&store).await?;
            let hits = dataset.search(&query);
            if hits.is_empty() {
                writeln!(out, "No chats found").map_err(err)?;
            }
            for chat in hits {
                write_chat_line(out, chat)?;
            }
        }

        Commands::Show { chat_id } => {
            let dataset = load_dataset(&store).await?;
            let chat = dataset
                .find_chat(&chat_id)
                .ok_or_else(|| format!("Chat not found: {chat_id}"))?;
            write_chat(out, chat)?;
        }

        Commands::NewChat {
            name,
            description,
            icon,
        } => {
            let mut dataset = load_dataset(&store).await?;
            let id = dataset
                .create_chat(&name, &description, icon.as_deref())
                .map_err(err)?
                .id
                .clone();
            store.save_all(&dataset).await.map_err(err)?;
            writeln!(out, "{id}").map_err(err)?;
        }

        Commands::EditChat {
            chat_id,
            name,
            description,
            icon,
        } => {
            let mut dataset = load_dataset(&store).await?;
            dataset
                .edit_chat(
                    &chat_id,
                    ChatEdit {
                        name,
                        description,
                        icon,
                    },
                )
                .map_err(err)?;
            store.save_all(&dataset).await.map_err(err)?;
        }

        Commands::DeleteChat { chat_id } => {
            let mut dataset = load_dataset(&store).await?;
            store
                .delete_chat(&mut dataset, &chat_id)
                .await
                .map_err(err)?;
        }

        Commands::Note {
            chat_id,
            text,
            attachments,
        } => {
            let mut dataset = load_dataset(&store).await?;
            let attachments = attachments
                .iter()
                .map(|path| read_attachment(path))
                .collect::<Result<Vec<_>, _>>()?;
            let note = store
                .append_note(&mut dataset, &chat_id, text, attachments)
                .await
                .map_err(err)?;
            writeln!(out, "{}", note.id).map_err(err)?;
            for attachment in &note.attachments {
                writeln!(out, "  {} {} ({})", attachment.id, attachment.name, attachment.size)
                    .map_err(err)?;
            }
        }

        Commands::Fetch {
            attachment_id,
            out: out_path,
        } => {
            let bytes = store
                .fetch_attachment_blob(&attachment_id)
                .await
                .map_err(err)?
                .ok_or_else(|| format!("Attachment not found: {attachment_id}"))?;
            std::fs::write(&out_path, &bytes).map_err(err)?;
            writeln!(out, "Wrote {} bytes to {}", bytes.len(), out_path.display()).map_err(err)?;
        }

        Commands::Export { out_dir } => {
            let dataset = load_dataset(&store).await?;
            let outcome = store.export_archive(&dataset).await.map_err(err)?;
            std::fs::create_dir_all(&out_dir).map_err(err)?;
            let path = out_dir.join(&outcome.file_name);
            std::fs::write(&path, &outcome.bytes).map_err(err)?;

            writeln!(
                out,
                "Exported {} chats and {} attachments to {}",
                dataset.len(),
                outcome.attachments,
                path.display()
            )
            .map_err(err)?;
            for warning in &outcome.warnings {
                writeln!(out, "warning: {warning}").map_err(err)?;
            }
        }

        Commands::Import { file } => {
            let bytes = std::fs::read(&file).map_err(err)?;
            let mut dataset = Dataset::new();
            let report = store
                .import_archive(&mut dataset, &bytes)
                .await
                .map_err(err)?;

            writeln!(
                out,
                "Imported {} chats and {} attachments",
                report.chats, report.attachments
            )
            .map_err(err)?;
            for warning in &report.warnings {
                writeln!(out, "warning: {warning}").map_err(err)?;
            }
        }

        Commands::Reset { yes } => {
            if !yes {
                return Err("Refusing to reset without --yes".to_string());
            }
            store.reset_all(&mut Dataset::new()).await.map_err(err)?;
            writeln!(out, "All data deleted").map_err(err)?;
        }
    }

    Ok(())
}

async fn load_dataset(store: &Persistence) -> Result<Dataset, String> {
    store.load_all().await.map_err(err)
}

fn read_attachment(path: &Path) -> Result<NewAttachment, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| format!("{} has no file name", path.display()))?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(NewAttachment {
        name,
        mime_type,
        bytes,
    })
}

fn write_chat_line(out: &mut impl Write, chat: &Chat) -> CmdResult {
    writeln!(
        out,
        "{} {} {} ({} notes){}",
        chat.icon,
        chat.id,
        chat.name,
        chat.notes.len(),
        if chat.description.is_empty() {
            String::new()
        } else {
            format!(" - {}", chat.description)
        }
    )
    .map_err(err)
}

fn write_chat(out: &mut impl Write, chat: &Chat) -> CmdResult {
    write_chat_line(out, chat)?;
    for note in &chat.notes {
        writeln!(
            out,
            "  [{}] {}",
            note.timestamp.format("%Y-%m-%d %H:%M"),
            note.text.as_deref().unwrap_or("")
        )
        .map_err(err)?;
        for attachment in &note.attachments {
            writeln!(
                out,
                "    📎 {} {} ({}, {})",
                attachment.id, attachment.name, attachment.size, attachment.mime_type
            )
            .map_err(err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    async fn load(dir: &Path) -> Dataset {
        let store = Persistence::open(&StoreConfig::new(dir)).await.unwrap();
        store.load_all().await.unwrap()
    }

    async fn exec(dir: &Path, args: &[&str]) -> Result<String, String> {
        let mut argv = vec!["notechat", "--data-dir", dir.to_str().unwrap()];
        argv.extend_from_slice(args);
        let cli = Cli::parse_from(argv);

        let mut out = Vec::new();
        run(cli, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn new_chat_note_and_show() {
        let dir = tempdir().unwrap();
        let id = exec(dir.path(), &["new-chat", "--name", "Work", "--icon", "💼"])
            .await
            .unwrap()
            .trim()
            .to_string();

        exec(dir.path(), &["note", &id, "--text", "hello"])
            .await
            .unwrap();
        let shown = exec(dir.path(), &["show", &id]).await.unwrap();

        assert!(shown.contains("Work"));
        assert!(shown.contains("hello"));
        assert!(shown.contains("(1 notes)"));
    }

    #[tokio::test]
    async fn note_with_attachment_guesses_mime_type() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.pdf");
        std::fs::write(&file, vec![7u8; 2048]).unwrap();

        let data = dir.path().join("data");
        let id = exec(&data, &["new-chat", "--name", "Docs"])
            .await
            .unwrap()
            .trim()
            .to_string();
        exec(&data, &["note", &id, "--attach", file.to_str().unwrap()])
            .await
            .unwrap();

        let dataset = load(&data).await;
        let attachment = &dataset.chats()[0].notes[0].attachments[0];
        assert_eq!(attachment.name, "report.pdf");
        assert_eq!(attachment.mime_type, "application/pdf");
        assert_eq!(attachment.size, "2 KB");
    }

    #[tokio::test]
    async fn export_then_import_into_fresh_store() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let target = dir.path().join("target");
        let backups = dir.path().join("backups");

        let id = exec(&source, &["new-chat", "--name", "Work"])
            .await
            .unwrap()
            .trim()
            .to_string();
        exec(&source, &["note", &id, "--text", "hello"])
            .await
            .unwrap();
        exec(&source, &["export", "--out-dir", backups.to_str().unwrap()])
            .await
            .unwrap();

        let archive = std::fs::read_dir(&backups)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        assert!(archive
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("notechat_backup_"));

        let output = exec(&target, &["import", archive.to_str().unwrap()])
            .await
            .unwrap();
        assert!(output.contains("Imported 1 chats"));

        let dataset = load(&target).await;
        assert_eq!(dataset.chats()[0].name, "Work");
        assert_eq!(dataset.chats()[0].notes[0].text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn reset_requires_confirmation() {
        let dir = tempdir().unwrap();
        exec(dir.path(), &["new-chat", "--name", "Work"])
            .await
            .unwrap();

        assert!(exec(dir.path(), &["reset"]).await.is_err());
        assert_eq!(load(dir.path()).await.len(), 1);

        exec(dir.path(), &["reset", "--yes"]).await.unwrap();
        assert!(load(dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn reset_and_import_recover_from_corrupt_table() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let broken = dir.path().join("broken");

        let id = exec(&source, &["new-chat", "--name", "Work"])
            .await
            .unwrap()
            .trim()
            .to_string();
        exec(&source, &["note", &id, "--text", "hello"])
            .await
            .unwrap();
        exec(&source, &["export", "--out-dir", dir.path().to_str().unwrap()])
            .await
            .unwrap();
        let archive = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .find(|path| path.extension().is_some_and(|ext| ext == "zip"))
            .unwrap();

        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("chats.json"), "{ not json").unwrap();
        assert!(exec(&broken, &["list"]).await.is_err());

        exec(&broken, &["import", archive.to_str().unwrap()])
            .await
            .unwrap();
        assert_eq!(load(&broken).await.chats()[0].name, "Work");

        std::fs::write(broken.join("chats.json"), "{ not json").unwrap();
        exec(&broken, &["reset", "--yes"]).await.unwrap();
        assert!(load(&broken).await.is_empty());
    }

    #[tokio::test]
    async fn search_and_delete() {
        let dir = tempdir().unwrap();
        let work = exec(dir.path(), &["new-chat", "--name", "Work"])
            .await
            .unwrap()
            .trim()
            .to_string();
        exec(dir.path(), &["new-chat", "--name", "Recipes", "--description", "pasta"])
            .await
            .unwrap();

        let hits = exec(dir.path(), &["search", "PASTA"]).await.unwrap();
        assert!(hits.contains("Recipes"));
        assert!(!hits.contains("Work"));

        exec(dir.path(), &["delete-chat", &work]).await.unwrap();
        let listed = exec(dir.path(), &["list"]).await.unwrap();
        assert!(!listed.contains("Work"));
        assert!(listed.contains("Recipes"));
    }
}
