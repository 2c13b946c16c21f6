//! In-process data service backed by SQLite.
//!
//! Implements [`RemoteDataService`] over a local `rusqlite` database with the
//! same ownership rules the hosted service enforces: every statement is scoped
//! by `user_id = caller`. Change events fan out over a `broadcast` channel to
//! every open subscription, unfiltered, exactly like the hosted feed.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use url::Url;
use uuid::Uuid;

use super::{ChangeFeed, RemoteDataService, BOOKMARKS_TABLE, FEED_CAPACITY};
use crate::database::Database;
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::change::{ChangeEvent, RowImage};
use crate::types::errors::RemoteError;
use crate::types::session::{AuthSession, OAuthRedirect, User};

/// Providers the local service accepts for delegated sign-in.
pub const SUPPORTED_PROVIDERS: &[&str] = &["google", "github"];

const BROADCAST_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct LocalOptions {
    /// Strip every column except `id` and `user_id` from insert events.
    pub redact_insert_payloads: bool,
    /// Base of the authorize URL handed back by `authorize_url`.
    pub authorize_base_url: String,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            redact_insert_payloads: false,
            authorize_base_url: "http://localhost:54321".to_string(),
        }
    }
}

pub struct LocalDataService {
    db: Mutex<Database>,
    events: broadcast::Sender<ChangeEvent>,
    options: LocalOptions,
}

impl LocalDataService {
    pub fn open<P: AsRef<Path>>(path: P, options: LocalOptions) -> Result<Self, RemoteError> {
        Ok(Self::with_database(Database::open(path)?, options))
    }

    pub fn open_in_memory(options: LocalOptions) -> Result<Self, RemoteError> {
        Ok(Self::with_database(Database::open_in_memory()?, options))
    }

    fn with_database(db: Database, options: LocalOptions) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            db: Mutex::new(db),
            events,
            options,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, RemoteError> {
        self.db.lock().map_err(|e| RemoteError::Database(e.to_string()))
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        let created_ms: i64 = row.get(3)?;
        Ok(Bookmark {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_default(),
            user_id: row.get(4)?,
        })
    }

    fn user_for_token(conn: &Connection, token: &str) -> Result<Option<User>, RemoteError> {
        let user = conn
            .query_row(
                "SELECT u.id, u.email FROM sessions s JOIN users u ON u.id = s.user_id WHERE s.token = ?1",
                params![token],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn require_user(conn: &Connection, token: &str) -> Result<User, RemoteError> {
        Self::user_for_token(conn, token)?.ok_or(RemoteError::Unauthorized)
    }

    fn issue_session_locked(conn: &Connection, user_id: &str) -> Result<AuthSession, RemoteError> {
        let user = conn
            .query_row(
                "SELECT id, email FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or(RemoteError::Unauthorized)?;

        let token = Uuid::new_v4().simple().to_string();
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user.id, Self::now_millis()],
        )?;
        Ok(AuthSession {
            access_token: token,
            user,
        })
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers simply means nobody is subscribed right now.
        let _ = self.events.send(event);
    }

    /// Creates the account for `email`, or returns the existing one.
    pub fn create_user(&self, email: &str) -> Result<User, RemoteError> {
        let db = self.lock()?;
        let conn = db.connection();
        conn.execute(
            "INSERT OR IGNORE INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), email, Self::now_millis()],
        )?;
        let user = conn.query_row(
            "SELECT id, email FROM users WHERE email = ?1",
            params![email],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                })
            },
        )?;
        Ok(user)
    }

    /// Starts a new session for an existing account.
    pub fn issue_session(&self, user_id: &str) -> Result<AuthSession, RemoteError> {
        let db = self.lock()?;
        Self::issue_session_locked(db.connection(), user_id)
    }

    /// Records the identity provider's consent for `email` and returns the
    /// one-shot code the callback route will exchange.
    pub fn grant_oauth_code(&self, provider: &str, email: &str) -> Result<String, RemoteError> {
        if !SUPPORTED_PROVIDERS.contains(&provider) {
            return Err(RemoteError::Provider(format!("Unsupported provider: {}", provider)));
        }
        let user = self.create_user(email)?;
        let code = Uuid::new_v4().simple().to_string();
        let db = self.lock()?;
        db.connection().execute(
            "INSERT INTO oauth_codes (code, provider, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![code, provider, user.id, Self::now_millis()],
        )?;
        Ok(code)
    }

    /// Out-of-band title change, as made by another tool against the same table.
    ///
    /// Emits an Update event with the full row image.
    pub fn update_bookmark_title(&self, id: &str, title: &str) -> Result<bool, RemoteError> {
        let updated = {
            let db = self.lock()?;
            let conn = db.connection();
            let affected = conn.execute(
                "UPDATE bookmarks SET title = ?1 WHERE id = ?2",
                params![title, id],
            )?;
            if affected == 0 {
                None
            } else {
                conn.query_row(
                    "SELECT id, title, url, created_at, user_id FROM bookmarks WHERE id = ?1",
                    params![id],
                    Self::row_to_bookmark,
                )
                .optional()?
            }
        };

        match updated {
            Some(bookmark) => {
                self.publish(ChangeEvent::update(BOOKMARKS_TABLE, RowImage::from_bookmark(&bookmark)));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RemoteDataService for LocalDataService {
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, RemoteError> {
        let db = self.lock()?;
        Self::user_for_token(db.connection(), access_token)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
        let db = self.lock()?;
        db.connection()
            .execute("DELETE FROM sessions WHERE token = ?1", params![access_token])?;
        Ok(())
    }

    async fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<OAuthRedirect, RemoteError> {
        if !SUPPORTED_PROVIDERS.contains(&provider) {
            return Err(RemoteError::Provider(format!("Unsupported provider: {}", provider)));
        }
        let mut url = Url::parse(&format!("{}/auth/v1/authorize", self.options.authorize_base_url))
            .map_err(|e| RemoteError::Provider(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to);
        Ok(OAuthRedirect {
            url: url.to_string(),
            code_verifier: None,
        })
    }

    async fn exchange_code(&self, code: &str, _code_verifier: Option<&str>) -> Result<AuthSession, RemoteError> {
        let db = self.lock()?;
        let conn = db.connection();
        let user_id: Option<String> = conn
            .query_row(
                "SELECT user_id FROM oauth_codes WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?;
        let user_id = user_id
            .ok_or_else(|| RemoteError::Provider("Invalid or expired authorization code".to_string()))?;
        conn.execute("DELETE FROM oauth_codes WHERE code = ?1", params![code])?;
        Self::issue_session_locked(conn, &user_id)
    }

    async fn insert_bookmark(&self, access_token: &str, row: &NewBookmark) -> Result<(), RemoteError> {
        let inserted = {
            let db = self.lock()?;
            let conn = db.connection();
            let caller = Self::require_user(conn, access_token)?;
            if caller.id != row.user_id {
                return Err(RemoteError::Unauthorized);
            }

            let created_ms = Self::now_millis();
            let bookmark = Bookmark {
                id: Uuid::new_v4().to_string(),
                title: row.title.clone(),
                url: row.url.clone(),
                created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_default(),
                user_id: row.user_id.clone(),
            };
            conn.execute(
                "INSERT INTO bookmarks (id, user_id, title, url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![bookmark.id, bookmark.user_id, bookmark.title, bookmark.url, created_ms],
            )?;
            bookmark
        };

        let image = if self.options.redact_insert_payloads {
            RowImage {
                id: inserted.id.clone(),
                user_id: Some(inserted.user_id.clone()),
                ..RowImage::default()
            }
        } else {
            RowImage::from_bookmark(&inserted)
        };
        tracing::debug!(id = %inserted.id, "bookmark inserted");
        self.publish(ChangeEvent::insert(BOOKMARKS_TABLE, image));
        Ok(())
    }

    async fn delete_bookmark(&self, access_token: &str, owner_id: &str, id: &str) -> Result<u64, RemoteError> {
        let affected = {
            let db = self.lock()?;
            let conn = db.connection();
            let caller = Self::require_user(conn, access_token)?;
            conn.execute(
                "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2 AND user_id = ?3",
                params![id, owner_id, caller.id],
            )?
        };

        if affected > 0 {
            self.publish(ChangeEvent::delete(BOOKMARKS_TABLE, id));
        }
        Ok(affected as u64)
    }

    async fn list_bookmarks(&self, access_token: &str, owner_id: &str) -> Result<Vec<Bookmark>, RemoteError> {
        let db = self.lock()?;
        let conn = db.connection();
        let caller = Self::require_user(conn, access_token)?;

        let mut stmt = conn.prepare(
            "SELECT id, title, url, created_at, user_id FROM bookmarks \
             WHERE user_id = ?1 AND user_id = ?2 ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![owner_id, caller.id], Self::row_to_bookmark)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    async fn fetch_bookmark(&self, access_token: &str, id: &str) -> Result<Option<Bookmark>, RemoteError> {
        let db = self.lock()?;
        let conn = db.connection();
        let caller = Self::require_user(conn, access_token)?;
        let bookmark = conn
            .query_row(
                "SELECT id, title, url, created_at, user_id FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                params![id, caller.id],
                Self::row_to_bookmark,
            )
            .optional()?;
        Ok(bookmark)
    }

    async fn subscribe(&self, access_token: &str, table: &str) -> Result<ChangeFeed, RemoteError> {
        {
            let db = self.lock()?;
            Self::require_user(db.connection(), access_token)?;
        }
        if table != BOOKMARKS_TABLE {
            return Err(RemoteError::Protocol(format!("Unknown table: {}", table)));
        }

        let (sender, feed) = ChangeFeed::channel(FEED_CAPACITY);
        let mut events = self.events.subscribe();
        let table = table.to_string();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = sender.closed() => break,
                    received = events.recv() => received,
                };
                match received {
                    Ok(event) if event.table == table => {
                        if sender.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "change feed lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("local change feed closed");
        });

        Ok(feed)
    }
}
