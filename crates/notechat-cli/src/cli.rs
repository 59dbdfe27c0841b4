use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Notechat - organize notes into chats", long_about = None)]
pub struct Cli {
    /// Data directory (defaults to $NOTECHAT_DATA_DIR, then ~/.notechat)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all chats
    List,

    /// Find chats whose name or description contains QUERY
    Search { query: String },

    /// Print a chat and its notes
    Show { chat_id: String },

    /// Create a chat
    NewChat {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        icon: Option<String>,
    },

    /// Change a chat's name, description, or icon
    EditChat {
        chat_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },

    /// Delete a chat with all of its notes and attachments
    DeleteChat { chat_id: String },

    /// Append a note to a chat
    Note {
        chat_id: String,
        #[arg(long)]
        text: Option<String>,
        /// File to attach (repeatable)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },

    /// Write an attachment's bytes to OUT
    Fetch { attachment_id: String, out: PathBuf },

    /// Export everything to notechat_backup_YYYY-MM-DD.zip
    Export {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Replace all data with the contents of a backup (.zip or legacy .json)
    Import { file: PathBuf },

    /// Delete all chats and attachments
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}
