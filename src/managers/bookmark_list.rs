//! Session bookmark collection and its reconciliation rules.
//!
//! The collection starts from the server snapshot and absorbs change-feed
//! events. Every rule is idempotent and order-tolerant: duplicate inserts
//! collapse on `id`, deletes of absent ids are no-ops. Events only ever
//! describe *what* changed; rows for inserts are resolved by a point read
//! because the event payload may be redacted.
//!
//! Ids seen in a delete event are remembered, so a point read that returns
//! after the delete cannot bring the row back. A reseed forgets every such id
//! the new snapshot contains.

use std::collections::HashSet;

use crate::remote::BOOKMARKS_TABLE;
use crate::types::bookmark::Bookmark;
use crate::types::change::{ChangeEvent, ChangeKind};

/// What the caller must do after feeding an event in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Unchanged,
    Changed,
    /// Read the row by id and hand it to [`BookmarkList::apply_resolved`].
    Resolve { id: String, kind: ChangeKind },
}

#[derive(Debug, Clone)]
pub struct BookmarkList {
    user_id: String,
    items: Vec<Bookmark>,
    pending_deletes: HashSet<String>,
    deleted: HashSet<String>,
}

impl BookmarkList {
    /// Seeds the collection with `snapshot`, kept in the order given (newest first).
    pub fn new(user_id: impl Into<String>, snapshot: Vec<Bookmark>) -> Self {
        Self {
            user_id: user_id.into(),
            items: snapshot,
            pending_deletes: HashSet::new(),
            deleted: HashSet::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn items(&self) -> &[Bookmark] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|b| b.id == id)
    }

    /// Replaces the collection wholesale with a new snapshot.
    ///
    /// Locally reconciled entries are discarded. Pending-delete flags survive
    /// only for ids still present; deleted ids survive only for ids absent.
    pub fn reseed(&mut self, snapshot: Vec<Bookmark>) {
        self.items = snapshot;
        let items = &self.items;
        self.pending_deletes
            .retain(|id| items.iter().any(|b| &b.id == id));
        self.deleted.retain(|id| !items.iter().any(|b| &b.id == id));
    }

    /// Applies one change-feed message.
    pub fn on_change(&mut self, event: &ChangeEvent) -> Reaction {
        if !event.table.is_empty() && event.table != BOOKMARKS_TABLE {
            return Reaction::Unchanged;
        }

        match event.event_type {
            ChangeKind::Insert => {
                let Some(row) = event.new.as_ref() else {
                    return Reaction::Unchanged;
                };
                if !row.is_owned_by(&self.user_id)
                    || self.contains(&row.id)
                    || self.is_deleted(&row.id)
                {
                    return Reaction::Unchanged;
                }
                Reaction::Resolve {
                    id: row.id.clone(),
                    kind: ChangeKind::Insert,
                }
            }
            ChangeKind::Delete => {
                let Some(old) = event.old.as_ref() else {
                    return Reaction::Unchanged;
                };
                self.deleted.insert(old.id.clone());
                if self.remove(&old.id) {
                    Reaction::Changed
                } else {
                    Reaction::Unchanged
                }
            }
            ChangeKind::Update => {
                let Some(row) = event.new.as_ref() else {
                    return Reaction::Unchanged;
                };
                if !row.is_owned_by(&self.user_id) || !self.contains(&row.id) {
                    return Reaction::Unchanged;
                }
                match row.to_bookmark() {
                    Some(bookmark) => {
                        if self.replace(bookmark) {
                            Reaction::Changed
                        } else {
                            Reaction::Unchanged
                        }
                    }
                    None => Reaction::Resolve {
                        id: row.id.clone(),
                        kind: ChangeKind::Update,
                    },
                }
            }
        }
    }

    /// Applies the row read back for a [`Reaction::Resolve`]. Returns whether
    /// the collection changed. Rows already seen deleted are refused.
    pub fn apply_resolved(&mut self, kind: ChangeKind, row: Bookmark) -> bool {
        if row.user_id != self.user_id || self.is_deleted(&row.id) {
            return false;
        }
        match kind {
            ChangeKind::Insert => self.prepend(row),
            ChangeKind::Update => self.replace(row),
            ChangeKind::Delete => false,
        }
    }

    /// Optimistic insert of a row this session just created.
    pub fn insert_local(&mut self, row: Bookmark) -> bool {
        self.apply_resolved(ChangeKind::Insert, row)
    }

    fn prepend(&mut self, row: Bookmark) -> bool {
        if self.contains(&row.id) {
            return false;
        }
        self.items.insert(0, row);
        true
    }

    /// Replaces in place, keeping position. No-op if absent or identical.
    fn replace(&mut self, row: Bookmark) -> bool {
        match self.position(&row.id) {
            Some(idx) if self.items[idx] != row => {
                self.items[idx] = row;
                true
            }
            _ => false,
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        self.pending_deletes.remove(id);
        let before = self.items.len();
        self.items.retain(|b| b.id != id);
        self.items.len() != before
    }

    /// Marks `id` as pending deletion. Returns `false` if it is absent or
    /// already pending, in which case no delete should be issued.
    pub fn begin_delete(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.pending_deletes.insert(id.to_string())
    }

    /// Clears the pending flag after the delete mutation failed. The entry stays visible.
    pub fn delete_failed(&mut self, id: &str) -> bool {
        self.pending_deletes.remove(id)
    }

    pub fn is_delete_pending(&self, id: &str) -> bool {
        self.pending_deletes.contains(id)
    }

    /// Whether a delete event for `id` arrived since the last reseed that listed it.
    pub fn is_deleted(&self, id: &str) -> bool {
        self.deleted.contains(id)
    }

    pub fn pending_deletes(&self) -> &HashSet<String> {
        &self.pending_deletes
    }
}
