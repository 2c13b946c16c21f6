//! Mount lifecycle for the live bookmark list.
//!
//! One controller owns one [`BookmarkList`] and exactly one change-feed
//! subscription for as long as it is mounted. Feed messages are handled
//! synchronously by a consumer task; point reads for inserts run in their
//! own tasks and re-check the mount guard before touching state, so nothing
//! is reconciled after teardown begins.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::bookmark_list::{BookmarkList, Reaction};
use crate::remote::{ChangeFeed, RemoteDataService, BOOKMARKS_TABLE};
use crate::services::actions::MutationActions;
use crate::types::bookmark::Bookmark;
use crate::types::change::ChangeKind;
use crate::types::errors::RemoteError;
use crate::types::session::SessionCookie;

/// Published view of the collection after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListSnapshot {
    pub items: Vec<Bookmark>,
    /// Sorted ids whose delete affordance is disabled.
    pub pending_deletes: Vec<String>,
    pub revision: u64,
}

impl ListSnapshot {
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|b| b.id.as_str()).collect()
    }

    pub fn is_delete_pending(&self, id: &str) -> bool {
        self.pending_deletes.iter().any(|p| p == id)
    }
}

/// Result of a delete request from the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Mutation accepted; the entry disappears when the delete event arrives.
    Issued,
    /// Absent, already pending, or the list is unmounted.
    Skipped,
    /// Mutation failed; the pending flag was cleared and the entry stays.
    Failed,
}

struct Shared {
    list: Mutex<BookmarkList>,
    updates: watch::Sender<ListSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BookmarkList> {
        self.list.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_locked(&self, list: &BookmarkList) {
        let revision = self.updates.borrow().revision + 1;
        let mut pending: Vec<String> = list.pending_deletes().iter().cloned().collect();
        pending.sort();
        self.updates.send_replace(ListSnapshot {
            items: list.items().to_vec(),
            pending_deletes: pending,
            revision,
        });
    }

    /// Applies `f` unless unmounted; publishes when it reports a change.
    fn mutate<F>(&self, mounted: &CancellationToken, f: F) -> bool
    where
        F: FnOnce(&mut BookmarkList) -> bool,
    {
        let mut list = self.lock();
        if mounted.is_cancelled() {
            return false;
        }
        let changed = f(&mut list);
        if changed {
            self.publish_locked(&list);
        }
        changed
    }

    /// Like [`Shared::mutate`] for feed messages, which may ask for a point read.
    fn react(&self, mounted: &CancellationToken, f: impl FnOnce(&mut BookmarkList) -> Reaction) -> Reaction {
        let mut list = self.lock();
        if mounted.is_cancelled() {
            return Reaction::Unchanged;
        }
        let reaction = f(&mut list);
        if reaction == Reaction::Changed {
            self.publish_locked(&list);
        }
        reaction
    }
}

pub struct ListController {
    user_id: String,
    shared: Arc<Shared>,
    mounted: CancellationToken,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl ListController {
    /// Seeds the list and opens its change-feed subscription.
    pub async fn mount(
        remote: Arc<dyn RemoteDataService>,
        session: SessionCookie,
        user_id: &str,
        snapshot: Vec<Bookmark>,
    ) -> Result<Self, RemoteError> {
        let feed = remote.subscribe(session.access_token(), BOOKMARKS_TABLE).await?;

        let list = BookmarkList::new(user_id, snapshot);
        let (updates, _) = watch::channel(ListSnapshot {
            items: list.items().to_vec(),
            pending_deletes: Vec::new(),
            revision: 0,
        });
        let shared = Arc::new(Shared {
            list: Mutex::new(list),
            updates,
        });
        let mounted = CancellationToken::new();

        let consumer = tokio::spawn(consume(
            feed,
            shared.clone(),
            remote,
            Arc::new(session),
            mounted.clone(),
        ));
        tracing::info!(user_id, "bookmark list mounted");

        Ok(Self {
            user_id: user_id.to_string(),
            shared,
            mounted,
            consumer: Mutex::new(Some(consumer)),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_mounted(&self) -> bool {
        !self.mounted.is_cancelled()
    }

    /// Receives every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> ListSnapshot {
        self.shared.updates.borrow().clone()
    }

    /// Replaces the collection with a freshly fetched snapshot.
    pub fn reseed(&self, snapshot: Vec<Bookmark>) {
        self.shared.mutate(&self.mounted, |list| {
            list.reseed(snapshot);
            true
        });
    }

    /// Optimistically shows a row this session created.
    pub fn insert_local(&self, row: Bookmark) -> bool {
        self.shared.mutate(&self.mounted, |list| list.insert_local(row))
    }

    /// Issues the delete mutation for `id`, tracking it as pending meanwhile.
    ///
    /// Failures are logged and not returned: the entry simply stays visible.
    pub async fn request_delete(
        &self,
        actions: &MutationActions,
        session: Option<&SessionCookie>,
        id: &str,
    ) -> DeleteOutcome {
        if !self.shared.mutate(&self.mounted, |list| list.begin_delete(id)) {
            return DeleteOutcome::Skipped;
        }

        match actions.delete_bookmark(session, id).await {
            Ok(()) => DeleteOutcome::Issued,
            Err(e) => {
                tracing::error!(id, error = %e, "error deleting bookmark");
                self.shared.mutate(&self.mounted, |list| list.delete_failed(id));
                DeleteOutcome::Failed
            }
        }
    }

    /// Cancelled once teardown begins.
    pub fn teardown_signal(&self) -> CancellationToken {
        self.mounted.child_token()
    }

    /// Closes the subscription and stops all reconciliation.
    pub async fn unmount(&self) {
        self.cancel();
        let consumer = self
            .consumer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(consumer) = consumer {
            let _ = consumer.await;
            tracing::info!(user_id = %self.user_id, "bookmark list unmounted");
        }
    }

    fn cancel(&self) {
        // Taken under the list lock so no mutation interleaves with teardown.
        let _list = self.shared.lock();
        self.mounted.cancel();
    }
}

impl Drop for ListController {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn consume(
    mut feed: ChangeFeed,
    shared: Arc<Shared>,
    remote: Arc<dyn RemoteDataService>,
    session: Arc<SessionCookie>,
    mounted: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = mounted.cancelled() => break,
            event = feed.recv() => match event {
                Some(event) => event,
                None => {
                    tracing::warn!("change feed ended");
                    break;
                }
            },
        };
        tracing::debug!(kind = ?event.event_type, "change event");

        match shared.react(&mounted, |list| list.on_change(&event)) {
            Reaction::Resolve { id, kind } => {
                tokio::spawn(resolve(
                    id,
                    kind,
                    shared.clone(),
                    remote.clone(),
                    session.clone(),
                    mounted.clone(),
                ));
            }
            Reaction::Changed | Reaction::Unchanged => {}
        }
    }
    feed.close();
}

/// Point read for an insert/update event. Failures are discarded.
async fn resolve(
    id: String,
    kind: ChangeKind,
    shared: Arc<Shared>,
    remote: Arc<dyn RemoteDataService>,
    session: Arc<SessionCookie>,
    mounted: CancellationToken,
) {
    let result = remote.fetch_bookmark(session.access_token(), &id).await;
    if mounted.is_cancelled() {
        return;
    }
    match result {
        Ok(Some(row)) => {
            shared.mutate(&mounted, |list| list.apply_resolved(kind, row));
        }
        Ok(None) => tracing::debug!(id = %id, "changed row not visible; skipped"),
        Err(e) => tracing::warn!(id = %id, error = %e, "could not resolve changed row"),
    }
}
