//! Unit tests for the realtime websocket frame codec.

use serde_json::{json, Value};
use smartmarks::remote::realtime::*;
use smartmarks::types::change::ChangeKind;
use smartmarks::types::errors::RemoteError;

fn change_frame(data: Value) -> String {
    json!({
        "topic": "realtime:bookmarks-changes",
        "event": "postgres_changes",
        "payload": { "data": data, "ids": [1] },
        "ref": null
    })
    .to_string()
}

#[test]
fn socket_url_switches_scheme_and_sets_query() {
    let url = socket_url("https://abc.example.co", "anon-123").unwrap();
    assert_eq!(
        url.as_str(),
        "wss://abc.example.co/realtime/v1/websocket?apikey=anon-123&vsn=1.0.0"
    );
    let local = socket_url("http://localhost:54321", "k").unwrap();
    assert_eq!(local.scheme(), "ws");
}

#[test]
fn socket_url_rejects_unknown_scheme() {
    assert!(matches!(socket_url("ftp://example.com", "k"), Err(RemoteError::Protocol(_))));
}

#[test]
fn join_message_subscribes_to_all_events_on_table() {
    let msg: Value = serde_json::from_str(&join_message("realtime:bookmarks-changes", "bookmarks", "tok", "1")).unwrap();
    assert_eq!(msg["event"], "phx_join");
    assert_eq!(msg["ref"], "1");
    assert_eq!(msg["payload"]["access_token"], "tok");
    assert_eq!(
        msg["payload"]["config"]["postgres_changes"][0],
        json!({"event": "*", "schema": "public", "table": "bookmarks"})
    );
}

#[test]
fn heartbeat_and_leave_messages() {
    let hb: Value = serde_json::from_str(&heartbeat_message("7")).unwrap();
    assert_eq!(hb["topic"], "phoenix");
    assert_eq!(hb["event"], "heartbeat");
    let leave: Value = serde_json::from_str(&leave_message("realtime:bookmarks-changes", "8")).unwrap();
    assert_eq!(leave["event"], "phx_leave");
    assert_eq!(leave["topic"], "realtime:bookmarks-changes");
}

#[test]
fn decodes_full_insert() {
    let text = change_frame(json!({
        "table": "bookmarks",
        "type": "INSERT",
        "record": {
            "id": "b1",
            "user_id": "u1",
            "title": "Example",
            "url": "https://example.com",
            "created_at": "2026-10-16T08:00:00.123456+00:00"
        },
        "old_record": null
    }));
    let Frame::Change(event) = decode_frame(&text).unwrap() else {
        panic!("expected change frame");
    };
    assert_eq!(event.table, "bookmarks");
    assert_eq!(event.event_type, ChangeKind::Insert);
    let bookmark = event.new.unwrap().to_bookmark().unwrap();
    assert_eq!(bookmark.id, "b1");
    assert_eq!(bookmark.title, "Example");
}

#[test]
fn decodes_redacted_insert_as_partial_row() {
    let text = change_frame(json!({
        "table": "bookmarks",
        "type": "INSERT",
        "record": { "id": "b1", "user_id": "u1" }
    }));
    let Frame::Change(event) = decode_frame(&text).unwrap() else {
        panic!("expected change frame");
    };
    let row = event.new.unwrap();
    assert!(row.is_owned_by("u1"));
    assert!(row.to_bookmark().is_none());
}

#[test]
fn decodes_delete_with_numeric_id() {
    let text = change_frame(json!({
        "table": "bookmarks",
        "type": "DELETE",
        "old_record": { "id": 42 }
    }));
    let Frame::Change(event) = decode_frame(&text).unwrap() else {
        panic!("expected change frame");
    };
    assert_eq!(event.event_type, ChangeKind::Delete);
    assert!(event.new.is_none());
    assert_eq!(event.old.unwrap().id, "42");
}

#[test]
fn unknown_change_type_is_protocol_error() {
    let text = change_frame(json!({ "table": "bookmarks", "type": "TRUNCATE" }));
    assert!(matches!(decode_frame(&text), Err(RemoteError::Protocol(_))));
}

#[test]
fn decodes_join_reply() {
    let ok = json!({
        "topic": "realtime:bookmarks-changes",
        "event": "phx_reply",
        "payload": { "status": "ok", "response": {} },
        "ref": "1"
    })
    .to_string();
    assert_eq!(
        decode_frame(&ok).unwrap(),
        Frame::Reply { reference: "1".to_string(), ok: true, message: None }
    );

    let rejected = json!({
        "event": "phx_reply",
        "payload": { "status": "error", "response": { "reason": "invalid token" } },
        "ref": "1"
    })
    .to_string();
    assert_eq!(
        decode_frame(&rejected).unwrap(),
        Frame::Reply { reference: "1".to_string(), ok: false, message: Some("invalid token".to_string()) }
    );
}

#[test]
fn close_and_unknown_events() {
    assert_eq!(decode_frame(r#"{"event":"phx_close","payload":{}}"#).unwrap(), Frame::ChannelClosed);
    assert_eq!(decode_frame(r#"{"event":"phx_error","payload":{}}"#).unwrap(), Frame::ChannelClosed);
    assert_eq!(decode_frame(r#"{"event":"presence_state","payload":{}}"#).unwrap(), Frame::Other);
}

#[test]
fn malformed_json_is_protocol_error() {
    assert!(matches!(decode_frame("{not json"), Err(RemoteError::Protocol(_))));
}
