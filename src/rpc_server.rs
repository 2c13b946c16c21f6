//! Smartmarks RPC server: JSON-RPC over stdin/stdout for a UI front end.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:      {"id":1, "method":"form.submit", "params":{}}
//! Response:     {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Notification: {"event":"bookmarks", "revision":3, "list":{...}}

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use smartmarks::app::App;
use smartmarks::config::AppConfig;
use smartmarks::logging;
use smartmarks::rpc_handler::{handle_method, RpcHost};

/// Fixed-window limiter: at most `max_per_second` requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

#[tokio::main]
async fn main() {
    logging::init("smartmarks-rpc");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };
    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize data service");
            std::process::exit(1);
        }
    };

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(message) = outbound_rx.recv().await {
            let line = format!("{}\n", message);
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let host = Arc::new(RpcHost::new(app, outbound.clone()));
    let _ = outbound.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = outbound.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };
        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            let _ = outbound.send(json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let params = req.get("params").cloned().unwrap_or(json!({}));

        // Each request runs on its own task so a slow remote call never blocks the loop.
        let host = host.clone();
        let outbound = outbound.clone();
        tokio::spawn(async move {
            let response = match handle_method(&host, &method, &params).await {
                Ok(val) => json!({"id": id, "result": val}),
                Err(err) => json!({"id": id, "error": err}),
            };
            let _ = outbound.send(response);
        });
    }

    host.shutdown().await;
    drop(outbound);
    drop(host);
    // In-flight handlers hold their own senders; give them the writer until they finish.
    let _ = writer.await;
}
