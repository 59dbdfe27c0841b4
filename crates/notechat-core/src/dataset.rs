//! The in-memory dataset.
//!
//! A [`Dataset`] is owned by the caller and handed to the facade by
//! reference. Edits here are purely in memory; persist them with
//! [`Persistence::save_all`](crate::facade::Persistence::save_all).

use chrono::Utc;

use crate::error::{NotechatError, Result};
use crate::ids::new_id;
use crate::persistence::types::{Chat, Note, DEFAULT_ICON};

/// Fields to change on an existing chat. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ChatEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    chats: Vec<Chat>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chats(chats: Vec<Chat>) -> Self {
        Self { chats }
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn find_chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    /// Create a chat and put it at the top of the list.
    pub fn create_chat(&mut self, name: &str, description: &str, icon: Option<&str>) -> Result<&Chat> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NotechatError::EmptyChatName);
        }

        let chat = Chat {
            id: new_id(),
            name: name.to_string(),
            description: description.trim().to_string(),
            icon: icon
                .filter(|i| !i.is_empty())
                .unwrap_or(DEFAULT_ICON)
                .to_string(),
            created_at: Utc::now(),
            notes: Vec::new(),
        };
        self.chats.insert(0, chat);
        Ok(&self.chats[0])
    }

    /// Change a chat's name, description, or icon.
    pub fn edit_chat(&mut self, chat_id: &str, edit: ChatEdit) -> Result<&Chat> {
        if let Some(name) = &edit.name {
            if name.trim().is_empty() {
                return Err(NotechatError::EmptyChatName);
            }
        }

        let chat = self
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| NotechatError::ChatNotFound(chat_id.to_string()))?;

        if let Some(name) = edit.name {
            chat.name = name.trim().to_string();
        }
        if let Some(description) = edit.description {
            chat.description = description.trim().to_string();
        }
        if let Some(icon) = edit.icon.filter(|i| !i.is_empty()) {
            chat.icon = icon;
        }
        Ok(&*chat)
    }

    /// Chats whose name or description contains `query`, case-insensitively.
    pub fn search(&self, query: &str) -> Vec<&Chat> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.chats.iter().collect();
        }

        self.chats
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&query)
                    || c.description.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Append a note to a chat. Rejects notes with neither text nor attachments.
    pub fn push_note(&mut self, chat_id: &str, note: Note) -> Result<()> {
        if note.text.as_deref().map_or(true, str::is_empty) && note.attachments.is_empty() {
            return Err(NotechatError::EmptyNote);
        }

        let chat = self
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| NotechatError::ChatNotFound(chat_id.to_string()))?;
        chat.notes.push(note);
        Ok(())
    }

    pub(crate) fn remove_chat(&mut self, chat_id: &str) -> Option<Chat> {
        let index = self.chats.iter().position(|c| c.id == chat_id)?;
        Some(self.chats.remove(index))
    }

    pub(crate) fn replace(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
    }

    pub(crate) fn clear(&mut self) {
        self.chats.clear();
    }
}
