//! Unit tests for list reconciliation against change-feed events.

use chrono::{TimeZone, Utc};
use smartmarks::managers::bookmark_list::{BookmarkList, Reaction};
use smartmarks::types::bookmark::Bookmark;
use smartmarks::types::change::{ChangeEvent, ChangeKind, RowImage};

fn bm(id: &str, user_id: &str, title: &str) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        title: title.to_string(),
        url: format!("https://{}.example.com", id),
        created_at: Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
        user_id: user_id.to_string(),
    }
}

fn ids(list: &BookmarkList) -> Vec<&str> {
    list.items().iter().map(|b| b.id.as_str()).collect()
}

fn insert_event(row: &Bookmark) -> ChangeEvent {
    ChangeEvent::insert("bookmarks", RowImage::from_bookmark(row))
}

/// Drives an insert event through to its point read, as the controller does.
fn deliver_insert(list: &mut BookmarkList, row: &Bookmark) {
    match list.on_change(&insert_event(row)) {
        Reaction::Resolve { kind, .. } => {
            list.apply_resolved(kind, row.clone());
        }
        Reaction::Unchanged | Reaction::Changed => {}
    }
}

// ─── Inserts ───

#[test]
fn insert_event_for_current_user_adds_row() {
    let mut list = BookmarkList::new("u1", vec![]);
    let row = Bookmark {
        url: "https://example.com".to_string(),
        ..bm("b1", "u1", "Example")
    };

    let reaction = list.on_change(&insert_event(&row));
    assert_eq!(
        reaction,
        Reaction::Resolve { id: "b1".to_string(), kind: ChangeKind::Insert }
    );
    assert!(list.apply_resolved(ChangeKind::Insert, row.clone()));
    assert_eq!(list.items(), &[row]);
}

#[test]
fn insert_event_for_other_user_is_ignored() {
    let mut list = BookmarkList::new("u1", vec![]);
    let reaction = list.on_change(&insert_event(&bm("b1", "u2", "Theirs")));
    assert_eq!(reaction, Reaction::Unchanged);
    assert!(list.is_empty());
}

#[test]
fn insert_event_without_owner_is_ignored() {
    let mut list = BookmarkList::new("u1", vec![]);
    let event = ChangeEvent::insert(
        "bookmarks",
        RowImage { id: "b1".to_string(), ..RowImage::default() },
    );
    assert_eq!(list.on_change(&event), Reaction::Unchanged);
}

#[test]
fn redacted_insert_still_resolves_by_id() {
    let mut list = BookmarkList::new("u1", vec![]);
    let event = ChangeEvent::insert(
        "bookmarks",
        RowImage {
            id: "b1".to_string(),
            user_id: Some("u1".to_string()),
            ..RowImage::default()
        },
    );
    assert!(matches!(list.on_change(&event), Reaction::Resolve { .. }));
}

#[test]
fn new_rows_are_prepended() {
    let mut list = BookmarkList::new("u1", vec![bm("old", "u1", "Old")]);
    deliver_insert(&mut list, &bm("new", "u1", "New"));
    assert_eq!(ids(&list), vec!["new", "old"]);
}

#[test]
fn duplicate_insert_events_collapse() {
    let mut list = BookmarkList::new("u1", vec![]);
    let row = bm("b1", "u1", "Once");
    deliver_insert(&mut list, &row);
    deliver_insert(&mut list, &row);
    assert_eq!(list.on_change(&insert_event(&row)), Reaction::Unchanged);
    assert_eq!(ids(&list), vec!["b1"]);
}

#[test]
fn late_resolve_after_optimistic_insert_is_noop() {
    let mut list = BookmarkList::new("u1", vec![]);
    let row = bm("b1", "u1", "Mine");
    let reaction = list.on_change(&insert_event(&row));
    assert!(list.insert_local(row.clone()));
    if let Reaction::Resolve { kind, .. } = reaction {
        assert!(!list.apply_resolved(kind, row));
    }
    assert_eq!(list.len(), 1);
}

#[test]
fn resolved_row_for_other_user_is_dropped() {
    let mut list = BookmarkList::new("u1", vec![]);
    assert!(!list.apply_resolved(ChangeKind::Insert, bm("b1", "u2", "Theirs")));
    assert!(list.is_empty());
}

#[test]
fn events_for_other_tables_are_ignored() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "Kept")]);
    let event = ChangeEvent::delete("notes", "b1");
    assert_eq!(list.on_change(&event), Reaction::Unchanged);
    assert!(list.contains("b1"));
}

// ─── Deletes ───

#[test]
fn delete_event_removes_row_and_repeat_is_noop() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "A"), bm("b2", "u1", "B")]);
    assert_eq!(list.on_change(&ChangeEvent::delete("bookmarks", "b1")), Reaction::Changed);
    assert_eq!(ids(&list), vec!["b2"]);
    assert_eq!(list.on_change(&ChangeEvent::delete("bookmarks", "b1")), Reaction::Unchanged);
    assert_eq!(ids(&list), vec!["b2"]);
}

#[test]
fn delete_of_absent_id_leaves_list_unchanged() {
    let items = vec![bm("b1", "u1", "A"), bm("b2", "u1", "B")];
    let mut list = BookmarkList::new("u1", items.clone());
    assert_eq!(list.on_change(&ChangeEvent::delete("bookmarks", "zz")), Reaction::Unchanged);
    assert_eq!(list.items(), items.as_slice());
}

#[test]
fn resolve_landing_after_delete_event_is_refused() {
    let mut list = BookmarkList::new("u1", vec![]);
    let row = bm("b1", "u1", "A");
    let reaction = list.on_change(&insert_event(&row));
    assert!(matches!(reaction, Reaction::Resolve { kind: ChangeKind::Insert, .. }));

    // The read already returned the row, but the delete event is processed first.
    assert_eq!(list.on_change(&ChangeEvent::delete("bookmarks", "b1")), Reaction::Unchanged);
    assert!(list.is_deleted("b1"));

    assert!(!list.apply_resolved(ChangeKind::Insert, row.clone()));
    assert!(!list.insert_local(row));
    assert!(list.is_empty());
}

#[test]
fn insert_event_for_deleted_id_is_ignored() {
    let row = bm("b1", "u1", "A");
    let mut list = BookmarkList::new("u1", vec![row.clone()]);
    list.on_change(&ChangeEvent::delete("bookmarks", "b1"));
    assert_eq!(list.on_change(&insert_event(&row)), Reaction::Unchanged);
    assert!(list.is_empty());
}

#[test]
fn reseed_listing_a_deleted_id_restores_it() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "A")]);
    list.on_change(&ChangeEvent::delete("bookmarks", "b1"));
    list.on_change(&ChangeEvent::delete("bookmarks", "b2"));

    list.reseed(vec![bm("b1", "u1", "A")]);
    assert!(!list.is_deleted("b1"));
    assert!(list.is_deleted("b2"));
    assert_eq!(ids(&list), vec!["b1"]);
    assert!(!list.apply_resolved(ChangeKind::Insert, bm("b2", "u1", "B")));
}

#[test]
fn begin_delete_tracks_pending_until_event() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "A")]);
    assert!(list.begin_delete("b1"));
    assert!(list.is_delete_pending("b1"));
    assert!(!list.begin_delete("b1"), "second click while pending is ignored");

    list.on_change(&ChangeEvent::delete("bookmarks", "b1"));
    assert!(!list.is_delete_pending("b1"));
    assert!(list.is_empty());
}

#[test]
fn begin_delete_of_absent_id_is_refused() {
    let mut list = BookmarkList::new("u1", vec![]);
    assert!(!list.begin_delete("b1"));
    assert!(list.pending_deletes().is_empty());
}

#[test]
fn failed_delete_clears_pending_and_keeps_row() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "A")]);
    list.begin_delete("b1");
    assert!(list.delete_failed("b1"));
    assert!(!list.is_delete_pending("b1"));
    assert!(list.contains("b1"));
}

// ─── Updates ───

#[test]
fn complete_update_replaces_in_place() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "A"), bm("b2", "u1", "B")]);
    let renamed = bm("b2", "u1", "Renamed");
    let event = ChangeEvent::update("bookmarks", RowImage::from_bookmark(&renamed));
    assert_eq!(list.on_change(&event), Reaction::Changed);
    assert_eq!(ids(&list), vec!["b1", "b2"]);
    assert_eq!(list.items()[1].title, "Renamed");
}

#[test]
fn redacted_update_asks_for_point_read() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "A")]);
    let event = ChangeEvent::update(
        "bookmarks",
        RowImage {
            id: "b1".to_string(),
            user_id: Some("u1".to_string()),
            ..RowImage::default()
        },
    );
    assert_eq!(
        list.on_change(&event),
        Reaction::Resolve { id: "b1".to_string(), kind: ChangeKind::Update }
    );
    assert!(list.apply_resolved(ChangeKind::Update, bm("b1", "u1", "Fresh")));
    assert_eq!(list.items()[0].title, "Fresh");
}

#[test]
fn update_for_absent_row_is_ignored() {
    let mut list = BookmarkList::new("u1", vec![]);
    let event = ChangeEvent::update("bookmarks", RowImage::from_bookmark(&bm("b1", "u1", "A")));
    assert_eq!(list.on_change(&event), Reaction::Unchanged);
    assert!(list.is_empty());
}

// ─── Reseed ───

#[test]
fn reseed_replaces_collection_exactly() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "A")]);
    deliver_insert(&mut list, &bm("b2", "u1", "B"));
    let snapshot = vec![bm("b9", "u1", "Z"), bm("b8", "u1", "Y")];
    list.reseed(snapshot.clone());
    assert_eq!(list.items(), snapshot.as_slice());
}

#[test]
fn reseed_keeps_pending_only_for_present_ids() {
    let mut list = BookmarkList::new("u1", vec![bm("b1", "u1", "A"), bm("b2", "u1", "B")]);
    list.begin_delete("b1");
    list.begin_delete("b2");
    list.reseed(vec![bm("b2", "u1", "B")]);
    assert!(!list.is_delete_pending("b1"));
    assert!(list.is_delete_pending("b2"));
}
