//! Page composition for the single entry route.
//!
//! The session is checked on every load. Signed-out callers get the sign-in
//! prompt; signed-in callers get the dashboard with a fresh, owner-scoped
//! snapshot of their bookmarks, newest first.

use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::remote::RemoteDataService;
use crate::types::bookmark::Bookmark;
use crate::types::session::{SessionCookie, User};

pub const APP_TITLE: &str = "Smart Bookmarks";
pub const SIGN_IN_TAGLINE: &str = "Save and organize your favorite links in one beautiful place";
pub const SIGN_IN_HINT: &str = "Sign in with Google to start saving bookmarks";
pub const DASHBOARD_TAGLINE: &str =
    "Save and organize your favorite links. Changes sync in real-time across all your devices.";
pub const EMPTY_TITLE: &str = "No bookmarks yet";
pub const EMPTY_HINT: &str = "Add your first bookmark above to get started";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Page {
    SignIn {
        title: String,
        tagline: String,
        hint: String,
    },
    Dashboard {
        user: User,
        bookmarks: Vec<Bookmark>,
    },
}

impl Page {
    fn sign_in() -> Self {
        Page::SignIn {
            title: APP_TITLE.to_string(),
            tagline: SIGN_IN_TAGLINE.to_string(),
            hint: SIGN_IN_HINT.to_string(),
        }
    }
}

/// Renders the entry route for `session`.
///
/// A failed snapshot fetch is logged and shown as an empty list.
pub async fn load_page(remote: &Arc<dyn RemoteDataService>, session: Option<&SessionCookie>) -> Page {
    let Some(cookie) = session else {
        return Page::sign_in();
    };

    let user = match remote.get_user(cookie.access_token()).await {
        Ok(Some(user)) => user,
        Ok(None) => return Page::sign_in(),
        Err(e) => {
            tracing::error!(error = %e, "session check failed");
            return Page::sign_in();
        }
    };

    let bookmarks = match remote.list_bookmarks(cookie.access_token(), &user.id).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "error fetching bookmarks");
            Vec::new()
        }
    };

    Page::Dashboard { user, bookmarks }
}

/// One row of the rendered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkView {
    pub id: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub created_label: String,
    pub delete_disabled: bool,
}

impl BookmarkView {
    pub fn new(bookmark: &Bookmark, delete_pending: bool) -> Self {
        Self {
            id: bookmark.id.clone(),
            title: bookmark.title.clone(),
            url: bookmark.url.clone(),
            domain: display_domain(&bookmark.url),
            created_label: bookmark.created_at.format("%b %-d, %Y").to_string(),
            delete_disabled: delete_pending,
        }
    }
}

/// Host without a leading `www.`; the raw input when it does not parse.
pub fn display_domain(url: &str) -> String {
    match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
        Some(host) => host.strip_prefix("www.").map(str::to_string).unwrap_or(host),
        None => url.to_string(),
    }
}

/// The list section: rows, or the empty-state copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ListView {
    Empty { title: String, hint: String },
    Items { items: Vec<BookmarkView> },
}

impl ListView {
    pub fn build<'a, I, F>(bookmarks: I, is_pending: F) -> Self
    where
        I: IntoIterator<Item = &'a Bookmark>,
        F: Fn(&str) -> bool,
    {
        let items: Vec<BookmarkView> = bookmarks
            .into_iter()
            .map(|b| BookmarkView::new(b, is_pending(&b.id)))
            .collect();
        if items.is_empty() {
            ListView::Empty {
                title: EMPTY_TITLE.to_string(),
                hint: EMPTY_HINT.to_string(),
            }
        } else {
            ListView::Items { items }
        }
    }
}
