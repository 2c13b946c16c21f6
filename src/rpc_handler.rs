//! RPC method handler for the Smartmarks JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! [`RpcHost`] holds the state of one client session (credential, form,
//! mounted list) and `handle_method` dispatches calls against it. List
//! changes are pushed to the client as `{"event":"bookmarks", ...}`
//! notifications through the outbound channel.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::app::App;
use crate::managers::add_form::AddBookmarkForm;
use crate::managers::list_controller::{DeleteOutcome, ListController, ListSnapshot};
use crate::managers::session_controls::{SignInControl, SignOutControl, SignOutOutcome, DEFAULT_PROVIDER};
use crate::services::page::{self, ListView, Page};
use crate::types::bookmark::Bookmark;
use crate::types::session::{SessionCookie, User};

/// Per-client state behind the RPC loop.
pub struct RpcHost {
    app: App,
    session: Mutex<Option<SessionCookie>>,
    oauth_verifier: Mutex<Option<String>>,
    form: Mutex<AddBookmarkForm>,
    list: Mutex<Option<Arc<ListController>>>,
    sign_in: Mutex<SignInControl>,
    sign_out: Mutex<Option<SignOutControl>>,
    outbound: mpsc::UnboundedSender<Value>,
}

impl RpcHost {
    pub fn new(app: App, outbound: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            app,
            session: Mutex::new(None),
            oauth_verifier: Mutex::new(None),
            form: Mutex::new(AddBookmarkForm::new()),
            list: Mutex::new(None),
            sign_in: Mutex::new(SignInControl::default()),
            sign_out: Mutex::new(None),
            outbound,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Installs a credential directly, as a host restoring a saved cookie would.
    pub fn set_session(&self, cookie: Option<SessionCookie>) {
        if let Ok(mut session) = self.session.lock() {
            *session = cookie;
        }
    }

    fn session(&self) -> Option<SessionCookie> {
        self.session.lock().ok().and_then(|s| s.clone())
    }

    fn current_list(&self) -> Option<Arc<ListController>> {
        self.list.lock().ok().and_then(|l| l.clone())
    }

    fn form_state(&self) -> Result<Value, String> {
        let form = self.form.lock().map_err(|e| e.to_string())?;
        Ok(json!({
            "title": form.title(),
            "url": form.url(),
            "phase": form.phase(),
            "disabled": form.is_disabled(),
            "error": form.error(),
        }))
    }

    fn list_view(snapshot: &ListSnapshot) -> Value {
        let view = ListView::build(&snapshot.items, |id| snapshot.is_delete_pending(id));
        json!(view)
    }

    /// Mounts the list for `user`, or reseeds it if already mounted for them.
    async fn show_list(
        &self,
        cookie: SessionCookie,
        user: &User,
        bookmarks: Vec<Bookmark>,
    ) -> Result<ListSnapshot, String> {
        if let Some(existing) = self.current_list() {
            if existing.user_id() == user.id && existing.is_mounted() {
                existing.reseed(bookmarks);
                return Ok(existing.snapshot());
            }
        }
        self.hide_list().await;

        let controller = ListController::mount(self.app.remote.clone(), cookie, &user.id, bookmarks)
            .await
            .map_err(|e| e.to_string())?;
        let controller = Arc::new(controller);
        self.spawn_forwarder(&controller);
        let snapshot = controller.snapshot();
        *self.list.lock().map_err(|e| e.to_string())? = Some(controller);
        Ok(snapshot)
    }

    async fn hide_list(&self) {
        let previous = self.list.lock().ok().and_then(|mut l| l.take());
        if let Some(previous) = previous {
            previous.unmount().await;
        }
    }

    /// Pushes every published snapshot to the client until teardown.
    fn spawn_forwarder(&self, controller: &ListController) {
        let mut updates = controller.subscribe();
        let teardown = controller.teardown_signal();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = teardown.cancelled() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let snapshot = updates.borrow_and_update().clone();
                let event = json!({
                    "event": "bookmarks",
                    "revision": snapshot.revision,
                    "list": Self::list_view(&snapshot),
                });
                if outbound.send(event).is_err() {
                    break;
                }
            }
        });
    }

    /// Tears down the mounted list.
    pub async fn shutdown(&self) {
        self.hide_list().await;
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(host: &RpcHost, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Page ───
        "page.load" => {
            let cookie = host.session();
            match page::load_page(&host.app.remote, cookie.as_ref()).await {
                Page::Dashboard { user, bookmarks } => {
                    let cookie = cookie.ok_or("not signed in")?;
                    let snapshot = host.show_list(cookie, &user, bookmarks).await?;
                    let email = user.email.clone().unwrap_or_default();
                    *host.sign_out.lock().map_err(|e| e.to_string())? = Some(SignOutControl::new(&email));
                    Ok(json!({
                        "view": "dashboard",
                        "title": page::APP_TITLE,
                        "tagline": page::DASHBOARD_TAGLINE,
                        "user": user,
                        "list": RpcHost::list_view(&snapshot),
                        "form": host.form_state()?,
                    }))
                }
                sign_in @ Page::SignIn { .. } => {
                    host.hide_list().await;
                    *host.sign_out.lock().map_err(|e| e.to_string())? = None;
                    Ok(json!(sign_in))
                }
            }
        }

        // ─── Auth ───
        "auth.sign_in" => {
            let provider = {
                let mut control = host.sign_in.lock().map_err(|e| e.to_string())?;
                control.select_provider(str_param(params, "provider").unwrap_or(DEFAULT_PROVIDER));
                control.begin()
            };
            let provider = provider.ok_or("sign-in already in progress")?;
            let result = host.app.actions.sign_in_with_oauth(&provider).await;
            host.sign_in.lock().map_err(|e| e.to_string())?.finish(&result);
            let redirect = result.map_err(|e| e.to_string())?;
            *host.oauth_verifier.lock().map_err(|e| e.to_string())? = redirect.code_verifier;
            Ok(json!({"url": redirect.url}))
        }
        "auth.callback" => {
            let code = str_param(params, "code").ok_or("missing code")?;
            let verifier = host.oauth_verifier.lock().map_err(|e| e.to_string())?.take();
            let session = host
                .app
                .actions
                .complete_oauth(code, verifier.as_deref())
                .await
                .map_err(|e| e.to_string())?;
            host.set_session(Some(SessionCookie::from(&session)));
            Ok(json!({"user": session.user}))
        }
        "auth.sign_out" => {
            let cookie = host.session();
            {
                let mut guard = host.sign_out.lock().map_err(|e| e.to_string())?;
                let control = guard.as_mut().ok_or("not signed in")?;
                if !control.begin() {
                    return Err("sign-out already in progress".to_string());
                }
            }
            let result = host.app.actions.sign_out(cookie.as_ref()).await;
            let reload = {
                let mut guard = host.sign_out.lock().map_err(|e| e.to_string())?;
                let reload = match guard.as_mut() {
                    Some(control) => control.finish(&result) == SignOutOutcome::Reload,
                    None => result.is_ok(),
                };
                if reload {
                    *guard = None;
                }
                reload
            };
            if reload {
                host.set_session(None);
                host.hide_list().await;
            }
            Ok(json!({"reload": reload}))
        }

        // ─── Add form ───
        "form.update" => {
            {
                let mut form = host.form.lock().map_err(|e| e.to_string())?;
                if let Some(title) = str_param(params, "title") {
                    form.set_title(title);
                }
                if let Some(url) = str_param(params, "url") {
                    form.set_url(url);
                }
            }
            host.form_state()
        }
        "form.state" => host.form_state(),
        "form.submit" => {
            let submission = host.form.lock().map_err(|e| e.to_string())?.begin_submit();
            let ok = match submission {
                Ok(submission) => {
                    let cookie = host.session();
                    let result = host
                        .app
                        .actions
                        .add_bookmark(cookie.as_ref(), &submission.title, &submission.url)
                        .await;
                    let ok = result.is_ok();
                    host.form.lock().map_err(|e| e.to_string())?.finish_submit(&result);
                    ok
                }
                Err(_) => false,
            };
            Ok(json!({"ok": ok, "form": host.form_state()?}))
        }

        // ─── List ───
        "bookmark.delete" => {
            let id = str_param(params, "id").ok_or("missing id")?;
            let list = host.current_list().ok_or("bookmark list not mounted")?;
            let cookie = host.session();
            let outcome = list.request_delete(&host.app.actions, cookie.as_ref(), id).await;
            let outcome = match outcome {
                DeleteOutcome::Issued => "issued",
                DeleteOutcome::Skipped => "skipped",
                DeleteOutcome::Failed => "failed",
            };
            Ok(json!({"outcome": outcome}))
        }
        "list.snapshot" => {
            let list = host.current_list().ok_or("bookmark list not mounted")?;
            let snapshot = list.snapshot();
            Ok(json!({
                "revision": snapshot.revision,
                "list": RpcHost::list_view(&snapshot),
            }))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
