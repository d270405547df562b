use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AuthUser;
use crate::models::{Chat, DonationRecord, Message, Post};

/// Tables that publish insert notifications on the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Posts,
    Chats,
    ChatMessages,
    DonationsHistory,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Chats => "chats",
            Self::ChatMessages => "chat_messages",
            Self::DonationsHistory => "donations_history",
        }
    }
}

/// A committed row insert, as delivered by the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "table", content = "new", rename_all = "snake_case")]
pub enum RowInsert {
    ChatMessages(Message),
    Posts(Post),
    Chats(Chat),
    DonationsHistory(DonationRecord),
}

impl RowInsert {
    pub fn table(&self) -> Table {
        match self {
            Self::ChatMessages(_) => Table::ChatMessages,
            Self::Posts(_) => Table::Posts,
            Self::Chats(_) => Table::Chats,
            Self::DonationsHistory(_) => Table::DonationsHistory,
        }
    }

    /// Value of a filterable column, if the row has it.
    pub fn column(&self, name: &str) -> Option<String> {
        let id = match (self, name) {
            (_, "id") => self.id(),
            (Self::ChatMessages(m), "chat_id") => m.chat_id,
            (Self::ChatMessages(m), "sender_id") => m.sender_id,
            (Self::Posts(p), "author_id") => p.author_id,
            (Self::Posts(p), "role") => return Some(p.role.to_string()),
            (Self::Chats(c), "donor_id") => c.donor_id,
            (Self::Chats(c), "ngo_id") => c.ngo_id,
            (Self::DonationsHistory(d), "donor_id") => d.donor_id,
            (Self::DonationsHistory(d), "ngo_id") => d.ngo_id,
            _ => return None,
        };
        Some(id.to_string())
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::ChatMessages(m) => m.id,
            Self::Posts(p) => p.id,
            Self::Chats(c) => c.id,
            Self::DonationsHistory(d) => d.id,
        }
    }
}

/// Equality predicate over one column of one table (`chat_id=eq.<id>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertFilter {
    pub table: Table,
    pub column: String,
    pub value: String,
}

impl InsertFilter {
    pub fn eq(table: Table, column: &str, value: impl ToString) -> Self {
        Self {
            table,
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub fn matches(&self, row: &RowInsert) -> bool {
        row.table() == self.table && row.column(&self.column).as_deref() == Some(self.value.as_str())
    }
}

/// Authentication state changes published by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
}
