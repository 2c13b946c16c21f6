use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of a completed sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: User,
}

/// The caller's credential as presented to actions and the page route.
///
/// The token is wiped from memory when the cookie is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionCookie {
    access_token: String,
}

impl SessionCookie {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCookie(<redacted>)")
    }
}

impl From<&AuthSession> for SessionCookie {
    fn from(session: &AuthSession) -> Self {
        Self::new(session.access_token.clone())
    }
}

/// Where to send the browser to start delegated sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthRedirect {
    pub url: String,
    /// PKCE verifier to present back at the callback, when the backend uses one.
    pub code_verifier: Option<String>,
}
