//! Per-user chat session: language, filters and history.
//!
//! The engine borrows a session mutably for the duration of one turn and
//! never keeps it.

use crate::domain::DomainFilter;
use crate::language::Language;
use crate::tables::TableFilter;
use crate::ui_text::{ui_text, TextId};
use crate::visualization::VisualizationType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization_type: Option<VisualizationType>,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            visualization_type: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, visualization_type: Option<VisualizationType>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            visualization_type,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub language: Language,
    pub table_filter: TableFilter,
    pub domain_filter: DomainFilter,
    history: Vec<ChatTurn>,
}

impl ConversationState {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            table_filter: TableFilter::All,
            domain_filter: DomainFilter::All,
            history: vec![welcome_turn(language)],
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.history.push(turn);
    }

    /// Switch language and re-localize the welcome turn if it is still first.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        if let Some(first) = self.history.first_mut() {
            if first.role == Role::Assistant {
                first.content = ui_text(TextId::WelcomeMessage, language).to_string();
            }
        }
    }

    /// Drop the history, keeping only a fresh welcome turn.
    pub fn clear(&mut self) {
        self.history = vec![welcome_turn(self.language)];
    }

    pub fn last_user_question(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }

    pub fn last_assistant_turn(&self) -> Option<&ChatTurn> {
        self.history.iter().rev().find(|t| t.role == Role::Assistant)
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

fn welcome_turn(language: Language) -> ChatTurn {
    ChatTurn::assistant(ui_text(TextId::WelcomeMessage, language), None)
}
