use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved bookmark row as stored by the data service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
}

/// Insert payload. `id` and `created_at` are assigned server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub user_id: String,
    pub title: String,
    pub url: String,
}
