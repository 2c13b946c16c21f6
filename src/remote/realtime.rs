//! Realtime change feed over the hosted service's Phoenix-channel websocket.
//!
//! Frames are JSON objects `{topic, event, payload, ref}`. We join one topic
//! per subscription with a `postgres_changes` config for every event on the
//! table, keep the socket alive with heartbeats, and translate each
//! `postgres_changes` frame into a [`ChangeEvent`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{ChangeFeed, FeedSender, FEED_CAPACITY};
use crate::types::change::{ChangeEvent, ChangeKind, OldRow, RowImage};
use crate::types::errors::RemoteError;

pub const PROTOCOL_VSN: &str = "1.0.0";
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: &str = "1";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Change(ChangeEvent),
    Reply { reference: String, ok: bool, message: Option<String> },
    /// The server closed or errored the channel.
    ChannelClosed,
    Other,
}

/// Websocket endpoint for a service base URL.
pub fn socket_url(service_url: &str, anon_key: &str) -> Result<Url, RemoteError> {
    let mut url = Url::parse(service_url).map_err(|e| RemoteError::Protocol(e.to_string()))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(RemoteError::Protocol(format!("Unsupported scheme: {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| RemoteError::Protocol("Cannot switch to websocket scheme".to_string()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", PROTOCOL_VSN);
    Ok(url)
}

pub fn join_message(topic: &str, table: &str, access_token: &str, reference: &str) -> String {
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": access_token
        },
        "ref": reference,
        "join_ref": reference
    })
    .to_string()
}

pub fn heartbeat_message(reference: &str) -> String {
    json!({ "topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": reference }).to_string()
}

pub fn leave_message(topic: &str, reference: &str) -> String {
    json!({ "topic": topic, "event": "phx_leave", "payload": {}, "ref": reference }).to_string()
}

/// Decodes one text frame.
pub fn decode_frame(text: &str) -> Result<Frame, RemoteError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|e| RemoteError::Protocol(e.to_string()))?;
    let event = frame.get("event").and_then(|v| v.as_str()).unwrap_or("");

    match event {
        "postgres_changes" => {
            let data = frame
                .pointer("/payload/data")
                .ok_or_else(|| RemoteError::Protocol("postgres_changes without data".to_string()))?;
            Ok(Frame::Change(decode_change(data)?))
        }
        "phx_reply" => {
            let reference = frame
                .get("ref")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let ok = frame.pointer("/payload/status").and_then(|v| v.as_str()) == Some("ok");
            let message = frame
                .pointer("/payload/response/reason")
                .or_else(|| frame.pointer("/payload/response/message"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Ok(Frame::Reply { reference, ok, message })
        }
        "phx_close" | "phx_error" => Ok(Frame::ChannelClosed),
        _ => Ok(Frame::Other),
    }
}

fn decode_change(data: &Value) -> Result<ChangeEvent, RemoteError> {
    let table = data.get("table").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let kind = match data.get("type").and_then(|v| v.as_str()) {
        Some("INSERT") => ChangeKind::Insert,
        Some("UPDATE") => ChangeKind::Update,
        Some("DELETE") => ChangeKind::Delete,
        other => {
            return Err(RemoteError::Protocol(format!("Unknown change type: {:?}", other)));
        }
    };

    let new = data.get("record").and_then(row_image);
    let old = data
        .get("old_record")
        .and_then(|r| r.get("id"))
        .and_then(id_string)
        .map(|id| OldRow { id });

    Ok(ChangeEvent {
        table,
        event_type: kind,
        new,
        old,
    })
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Columns that fail to decode are treated as redacted.
fn row_image(record: &Value) -> Option<RowImage> {
    let id = record.get("id").and_then(id_string)?;
    let text = |k: &str| record.get(k).and_then(|v| v.as_str()).map(str::to_string);
    Some(RowImage {
        id,
        user_id: text("user_id"),
        title: text("title"),
        url: text("url"),
        created_at: text("created_at")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

async fn send_text(sink: &mut SplitSink<WsStream, Message>, text: String) -> Result<(), RemoteError> {
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| RemoteError::Http(e.to_string()))
}

/// Connects, joins the table's channel and starts pumping events into a feed.
pub async fn connect(
    service_url: &str,
    anon_key: &str,
    access_token: &str,
    table: &str,
) -> Result<ChangeFeed, RemoteError> {
    let url = socket_url(service_url, anon_key)?;
    let (ws, _) = connect_async(url.as_str())
        .await
        .map_err(|e| RemoteError::Http(e.to_string()))?;
    let (mut sink, mut stream) = ws.split();

    let topic = format!("realtime:{}-changes", table);
    send_text(&mut sink, join_message(&topic, table, access_token, JOIN_REF)).await?;

    let joined = tokio::time::timeout(JOIN_TIMEOUT, async {
        while let Some(msg) = stream.next().await {
            let msg = msg.map_err(|e| RemoteError::Http(e.to_string()))?;
            let Message::Text(text) = msg else { continue };
            match decode_frame(text.as_str())? {
                Frame::Reply { reference, ok, message } if reference == JOIN_REF => {
                    return if ok {
                        Ok(())
                    } else {
                        Err(RemoteError::Protocol(
                            message.unwrap_or_else(|| "channel join rejected".to_string()),
                        ))
                    };
                }
                Frame::ChannelClosed => return Err(RemoteError::Closed),
                _ => {}
            }
        }
        Err::<(), RemoteError>(RemoteError::Closed)
    })
    .await
    .map_err(|_| RemoteError::Protocol("timed out joining channel".to_string()))?;
    joined?;

    tracing::info!(topic = %topic, "realtime subscription joined");

    let (sender, feed) = ChangeFeed::channel(FEED_CAPACITY);
    tokio::spawn(pump(sink, stream, sender, topic));
    Ok(feed)
}

async fn pump(
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
    sender: FeedSender,
    topic: String,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = sender.closed() => {
                let _ = send_text(&mut sink, leave_message(&topic, &next_ref.to_string())).await;
                let _ = sink.close().await;
                break;
            }
            _ = heartbeat.tick() => {
                let reference = next_ref.to_string();
                next_ref += 1;
                if let Err(e) = send_text(&mut sink, heartbeat_message(&reference)).await {
                    tracing::warn!(error = %e, "realtime heartbeat failed");
                    break;
                }
            }
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "realtime socket error");
                        break;
                    }
                };
                match decode_frame(text.as_str()) {
                    Ok(Frame::Change(event)) => {
                        if sender.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(Frame::ChannelClosed) => break,
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "undecodable realtime frame"),
                }
            }
        }
    }
    tracing::info!(topic = %topic, "realtime subscription closed");
}
