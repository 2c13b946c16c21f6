//! Remote Data Service boundary.
//!
//! Authentication, the bookmarks table and its change feed all live behind
//! [`RemoteDataService`]. The process builds exactly one implementation and
//! hands it around as `Arc<dyn RemoteDataService>`.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::change::ChangeEvent;
use crate::types::errors::RemoteError;
use crate::types::session::{AuthSession, OAuthRedirect, User};

pub mod local;
#[cfg(feature = "hosted")]
pub mod realtime;
pub mod rest;

/// Name of the bookmarks table on every backend.
pub const BOOKMARKS_TABLE: &str = "bookmarks";

/// Buffered change events per subscription.
pub const FEED_CAPACITY: usize = 256;

#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Resolves the account behind an access token. `None` when the token is not a live session.
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, RemoteError>;

    /// Invalidates the session server-side.
    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError>;

    /// Builds the URL that starts delegated sign-in with `provider`.
    async fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<OAuthRedirect, RemoteError>;

    /// Exchanges the code returned to the callback route for a session.
    async fn exchange_code(&self, code: &str, code_verifier: Option<&str>) -> Result<AuthSession, RemoteError>;

    async fn insert_bookmark(&self, access_token: &str, row: &NewBookmark) -> Result<(), RemoteError>;

    /// Deletes `id` if owned by `owner_id`. Returns the number of rows removed.
    async fn delete_bookmark(&self, access_token: &str, owner_id: &str, id: &str) -> Result<u64, RemoteError>;

    /// All rows owned by `owner_id`, newest first.
    async fn list_bookmarks(&self, access_token: &str, owner_id: &str) -> Result<Vec<Bookmark>, RemoteError>;

    /// Point read of one row visible to the caller.
    async fn fetch_bookmark(&self, access_token: &str, id: &str) -> Result<Option<Bookmark>, RemoteError>;

    /// Opens a change feed for every event on `table`.
    async fn subscribe(&self, access_token: &str, table: &str) -> Result<ChangeFeed, RemoteError>;
}

/// Consumer half of a change-feed subscription.
///
/// Dropping or closing the feed cancels the producer.
pub struct ChangeFeed {
    rx: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
}

/// Producer half of a change-feed subscription.
#[derive(Clone)]
pub struct FeedSender {
    tx: mpsc::Sender<ChangeEvent>,
    cancel: CancellationToken,
}

impl ChangeFeed {
    pub fn channel(capacity: usize) -> (FeedSender, ChangeFeed) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        (
            FeedSender { tx, cancel: cancel.clone() },
            ChangeFeed { rx, cancel },
        )
    }

    /// Next event, or `None` once the feed is closed from either side.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    pub fn close(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl FeedSender {
    pub async fn send(&self, event: ChangeEvent) -> Result<(), RemoteError> {
        if self.cancel.is_cancelled() {
            return Err(RemoteError::Closed);
        }
        self.tx.send(event).await.map_err(|_| RemoteError::Closed)
    }

    /// Resolves once the consumer has closed or dropped the feed.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}
