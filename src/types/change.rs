use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// Kind of row change delivered by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Row image carried by insert/update events.
///
/// Row-level security may redact columns before delivery, so only `id`
/// is guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowImage {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RowImage {
    /// Full row image of a bookmark.
    pub fn from_bookmark(b: &Bookmark) -> Self {
        Self {
            id: b.id.clone(),
            user_id: Some(b.user_id.clone()),
            title: Some(b.title.clone()),
            url: Some(b.url.clone()),
            created_at: Some(b.created_at),
        }
    }

    /// Returns the complete bookmark, or `None` if any column was redacted.
    pub fn to_bookmark(&self) -> Option<Bookmark> {
        Some(Bookmark {
            id: self.id.clone(),
            title: self.title.clone()?,
            url: self.url.clone()?,
            created_at: self.created_at?,
            user_id: self.user_id.clone()?,
        })
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

/// Prior identity of a deleted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldRow {
    pub id: String,
}

/// One message from the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "eventType")]
    pub event_type: ChangeKind,
    #[serde(default)]
    pub new: Option<RowImage>,
    #[serde(default)]
    pub old: Option<OldRow>,
}

impl ChangeEvent {
    pub fn insert(table: &str, row: RowImage) -> Self {
        Self {
            table: table.to_string(),
            event_type: ChangeKind::Insert,
            new: Some(row),
            old: None,
        }
    }

    pub fn update(table: &str, row: RowImage) -> Self {
        Self {
            table: table.to_string(),
            event_type: ChangeKind::Update,
            new: Some(row),
            old: None,
        }
    }

    pub fn delete(table: &str, id: &str) -> Self {
        Self {
            table: table.to_string(),
            event_type: ChangeKind::Delete,
            new: None,
            old: Some(OldRow { id: id.to_string() }),
        }
    }
}
