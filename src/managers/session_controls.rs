//! Sign-in and sign-out affordances.

use serde::Serialize;

use crate::services::actions::MutationActions;
use crate::types::errors::ActionError;
use crate::types::session::{OAuthRedirect, SessionCookie};

pub const DEFAULT_PROVIDER: &str = "google";

/// "Sign in with …" button: asks for the provider redirect, shows failures inline.
#[derive(Debug, Clone, Serialize)]
pub struct SignInControl {
    provider: String,
    loading: bool,
    error: Option<String>,
}

impl Default for SignInControl {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER)
    }
}

impl SignInControl {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            loading: false,
            error: None,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Switches provider. Ignored while a request is outstanding.
    pub fn select_provider(&mut self, provider: &str) -> bool {
        if self.loading {
            return false;
        }
        self.provider = provider.to_string();
        true
    }

    /// Enters the loading state and returns the provider to request, or
    /// `None` if a request is already outstanding.
    pub fn begin(&mut self) -> Option<String> {
        if self.loading {
            return None;
        }
        self.loading = true;
        self.error = None;
        Some(self.provider.clone())
    }

    /// Leaves the loading state, keeping the failure message if any.
    pub fn finish(&mut self, result: &Result<OAuthRedirect, ActionError>) {
        self.loading = false;
        if let Err(e) = result {
            self.error = Some(e.to_string());
        }
    }

    /// Returns the redirect to follow. `None` while a request is already outstanding.
    pub async fn click(&mut self, actions: &MutationActions) -> Option<Result<OAuthRedirect, ActionError>> {
        let provider = self.begin()?;
        let result = actions.sign_in_with_oauth(&provider).await;
        self.finish(&result);
        Some(result)
    }
}

/// What the host should do after the sign-out control finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutOutcome {
    /// Session ended; reload the page route.
    Reload,
    /// Sign-out failed; the control is usable again.
    Retry,
    /// A sign-out is already running.
    Busy,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignOutControl {
    user_email: String,
    loading: bool,
}

impl SignOutControl {
    pub fn new(user_email: &str) -> Self {
        Self {
            user_email: user_email.to_string(),
            loading: false,
        }
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Enters the loading state. `false` if a sign-out is already running.
    pub fn begin(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    /// The control stays disabled on success, since the page reloads.
    pub fn finish(&mut self, result: &Result<(), ActionError>) -> SignOutOutcome {
        match result {
            Ok(()) => SignOutOutcome::Reload,
            Err(e) => {
                tracing::error!(error = %e, "error signing out");
                self.loading = false;
                SignOutOutcome::Retry
            }
        }
    }

    pub async fn click(&mut self, actions: &MutationActions, session: Option<&SessionCookie>) -> SignOutOutcome {
        if !self.begin() {
            return SignOutOutcome::Busy;
        }
        let result = actions.sign_out(session).await;
        self.finish(&result)
    }
}
