//! Property-based tests for list reconciliation under arbitrary event orderings.
//!
//! The change feed, point reads and the optimistic local insert may reach the
//! list in any order and any number of times. These tests check that the
//! collection stays duplicate-free, that deleted rows stay deleted, and that
//! reseeding is authoritative.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use smartmarks::managers::bookmark_list::{BookmarkList, Reaction};
use smartmarks::types::bookmark::Bookmark;
use smartmarks::types::change::{ChangeEvent, ChangeKind, RowImage};

const USER: &str = "u1";

fn bm(id: &str, user_id: &str) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        title: format!("Title {}", id),
        url: format!("https://{}.example.com", id),
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        user_id: user_id.to_string(),
    }
}

/// One thing that can happen to the list.
#[derive(Debug, Clone)]
enum Step {
    /// Insert event followed immediately by its point read.
    InsertEvent(String),
    /// Insert event whose point read is delayed until the end.
    InsertEventDeferred(String),
    LocalInsert(String),
    DeleteEvent(String),
    ForeignInsert(String),
}

fn arb_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("b1"), Just("b2"), Just("b3"), Just("b4")].prop_map(str::to_string)
}

fn arb_step(include_deletes: bool) -> BoxedStrategy<Step> {
    let base = prop_oneof![
        arb_id().prop_map(Step::InsertEvent),
        arb_id().prop_map(Step::InsertEventDeferred),
        arb_id().prop_map(Step::LocalInsert),
        arb_id().prop_map(Step::ForeignInsert),
    ];
    if include_deletes {
        prop_oneof![4 => base, 1 => arb_id().prop_map(Step::DeleteEvent)].boxed()
    } else {
        base.boxed()
    }
}

fn run(list: &mut BookmarkList, steps: &[Step]) {
    let mut deferred = Vec::new();
    for step in steps {
        match step {
            Step::InsertEvent(id) | Step::InsertEventDeferred(id) => {
                let row = bm(id, USER);
                let reaction = list.on_change(&ChangeEvent::insert("bookmarks", RowImage::from_bookmark(&row)));
                if let Reaction::Resolve { kind, .. } = reaction {
                    if matches!(step, Step::InsertEvent(_)) {
                        list.apply_resolved(kind, row);
                    } else {
                        deferred.push((kind, row));
                    }
                }
            }
            Step::LocalInsert(id) => {
                list.insert_local(bm(id, USER));
            }
            Step::DeleteEvent(id) => {
                list.on_change(&ChangeEvent::delete("bookmarks", id));
            }
            Step::ForeignInsert(id) => {
                let row = bm(id, "intruder");
                let reaction = list.on_change(&ChangeEvent::insert("bookmarks", RowImage::from_bookmark(&row)));
                assert_eq!(reaction, Reaction::Unchanged);
            }
        }
    }
    for (kind, row) in deferred {
        list.apply_resolved(kind, row);
    }
}

fn count(list: &BookmarkList, id: &str) -> usize {
    list.items().iter().filter(|b| b.id == id).count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn inserts_in_any_order_yield_each_id_exactly_once(
        steps in prop::collection::vec(arb_step(false), 1..30),
    ) {
        let mut list = BookmarkList::new(USER, vec![]);
        run(&mut list, &steps);

        for id in ["b1", "b2", "b3", "b4"] {
            let seen = steps.iter().any(|s| matches!(s,
                Step::InsertEvent(x) | Step::InsertEventDeferred(x) | Step::LocalInsert(x) if x == id));
            prop_assert_eq!(count(&list, id), usize::from(seen));
        }
        prop_assert!(list.items().iter().all(|b| b.user_id == USER));
    }

    #[test]
    fn interleaved_deletes_never_duplicate(
        steps in prop::collection::vec(arb_step(true), 1..40),
    ) {
        let mut list = BookmarkList::new(USER, vec![]);
        run(&mut list, &steps);
        for id in ["b1", "b2", "b3", "b4"] {
            prop_assert!(count(&list, id) <= 1);
        }
    }

    #[test]
    fn deleted_ids_never_come_back(
        steps in prop::collection::vec(arb_step(true), 1..40),
    ) {
        let mut list = BookmarkList::new(USER, vec![]);
        run(&mut list, &steps);
        for id in ["b1", "b2", "b3", "b4"] {
            let deleted = steps.iter().any(|s| matches!(s, Step::DeleteEvent(x) if x == id));
            let inserted = steps.iter().any(|s| matches!(s,
                Step::InsertEvent(x) | Step::InsertEventDeferred(x) | Step::LocalInsert(x) if x == id));
            let expected = usize::from(inserted && !deleted);
            prop_assert_eq!(count(&list, id), expected, "id {}", id);
        }
    }

    #[test]
    fn deleting_absent_id_leaves_list_unchanged(
        present in prop::collection::btree_set("[a-m][0-9]{1,3}", 0..8),
        absent in "[n-z][0-9]{1,3}",
    ) {
        let items: Vec<Bookmark> = present.iter().map(|id| bm(id, USER)).collect();
        let mut list = BookmarkList::new(USER, items.clone());
        let reaction = list.on_change(&ChangeEvent::delete("bookmarks", &absent));
        prop_assert_eq!(reaction, Reaction::Unchanged);
        prop_assert_eq!(list.items(), items.as_slice());
    }

    #[test]
    fn reseed_replaces_exactly(
        steps in prop::collection::vec(arb_step(true), 0..20),
        snapshot_ids in prop::collection::btree_set("[a-z][0-9]{1,3}", 0..8),
    ) {
        let mut list = BookmarkList::new(USER, vec![bm("seed", USER)]);
        run(&mut list, &steps);

        let snapshot: Vec<Bookmark> = snapshot_ids.iter().map(|id| bm(id, USER)).collect();
        list.reseed(snapshot.clone());
        prop_assert_eq!(list.items(), snapshot.as_slice());
    }

    #[test]
    fn update_events_preserve_order(
        ids in prop::collection::btree_set("[a-z][0-9]{1,3}", 1..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let items: Vec<Bookmark> = ids.iter().map(|id| bm(id, USER)).collect();
        let mut list = BookmarkList::new(USER, items.clone());
        let target = &items[pick.index(items.len())];
        let renamed = Bookmark { title: "renamed".to_string(), ..target.clone() };
        list.on_change(&ChangeEvent::update("bookmarks", RowImage::from_bookmark(&renamed)));

        let before: Vec<&str> = items.iter().map(|b| b.id.as_str()).collect();
        let after: Vec<&str> = list.items().iter().map(|b| b.id.as_str()).collect();
        prop_assert_eq!(before, after);
        prop_assert_eq!(list.items().iter().filter(|b| b.title == "renamed").count(), 1);
    }
}

#[test]
fn deferred_resolve_after_delete_event_reinserts_nothing_stale() {
    // The point read returned the row, then the row was deleted and the delete
    // event found nothing to remove. The late read result must not revive it.
    let mut list = BookmarkList::new(USER, vec![]);
    let row = bm("b1", USER);
    let reaction = list.on_change(&ChangeEvent::insert("bookmarks", RowImage::from_bookmark(&row)));
    assert!(matches!(reaction, Reaction::Resolve { kind: ChangeKind::Insert, .. }));

    assert_eq!(list.on_change(&ChangeEvent::delete("bookmarks", "b1")), Reaction::Unchanged);
    assert!(!list.apply_resolved(ChangeKind::Insert, row));
    assert!(list.is_empty());
}
