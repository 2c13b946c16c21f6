//! Client for the hosted auth + REST data service.
//!
//! Auth lives under `/auth/v1`, the bookmarks table under `/rest/v1/bookmarks`
//! (PostgREST filter syntax), and the change feed is a realtime websocket
//! opened by [`super::realtime`].

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::{RequestBuilder, Response, StatusCode};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{ChangeFeed, RemoteDataService};
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::RemoteError;
use crate::types::session::{AuthSession, OAuthRedirect, User};

/// Identity providers the hosted auth service can delegate to.
pub const KNOWN_PROVIDERS: &[&str] = &[
    "apple", "azure", "bitbucket", "discord", "facebook", "figma", "github", "gitlab",
    "google", "kakao", "keycloak", "linkedin_oidc", "notion", "slack", "spotify",
    "twitch", "twitter", "workos", "zoom",
];

const PKCE_VERIFIER_BYTES: usize = 32;

/// PKCE S256 challenge for a verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

/// Fresh random PKCE verifier (43 URL-safe characters).
pub fn pkce_verifier() -> Result<String, RemoteError> {
    let mut bytes = [0u8; PKCE_VERIFIER_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| RemoteError::Provider("Failed to generate PKCE verifier".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: User,
}

pub struct RestDataService {
    http: reqwest::Client,
    service_url: String,
    anon_key: String,
}

impl RestDataService {
    pub fn new(service_url: &str, anon_key: &str) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("smartmarks/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            service_url: service_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.service_url, path)
    }

    fn authed(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    /// Maps non-success statuses to errors, keeping the service's message verbatim.
    async fn check(resp: Response) -> Result<Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::Unauthorized);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::Http(error_message(status, &body)))
    }
}

/// Pulls the human-readable message out of an auth or PostgREST error body.
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[async_trait]
impl RemoteDataService for RestDataService {
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, RemoteError> {
        let resp = self
            .authed(self.http.get(self.endpoint("/auth/v1/user")), access_token)
            .send()
            .await?;
        match Self::check(resp).await {
            Ok(resp) => Ok(Some(resp.json::<User>().await?)),
            Err(RemoteError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
        let resp = self
            .authed(self.http.post(self.endpoint("/auth/v1/logout")), access_token)
            .send()
            .await?;
        match Self::check(resp).await {
            // Already gone server-side.
            Ok(_) | Err(RemoteError::Unauthorized) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<OAuthRedirect, RemoteError> {
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(RemoteError::Provider(format!("Unsupported provider: {}", provider)));
        }
        let verifier = pkce_verifier()?;
        let mut url = Url::parse(&self.endpoint("/auth/v1/authorize"))
            .map_err(|e| RemoteError::Provider(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", &pkce_challenge(&verifier))
            .append_pair("code_challenge_method", "s256");
        Ok(OAuthRedirect {
            url: url.to_string(),
            code_verifier: Some(verifier),
        })
    }

    async fn exchange_code(&self, code: &str, code_verifier: Option<&str>) -> Result<AuthSession, RemoteError> {
        let verifier = code_verifier
            .ok_or_else(|| RemoteError::Provider("Missing PKCE code verifier".to_string()))?;
        let resp = self
            .http
            .post(self.endpoint("/auth/v1/token"))
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "auth_code": code, "code_verifier": verifier }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Provider(error_message(status, &body)));
        }
        let token: TokenResponse = resp.json().await?;
        Ok(AuthSession {
            access_token: token.access_token,
            user: token.user,
        })
    }

    async fn insert_bookmark(&self, access_token: &str, row: &NewBookmark) -> Result<(), RemoteError> {
        let resp = self
            .authed(self.http.post(self.endpoint("/rest/v1/bookmarks")), access_token)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn delete_bookmark(&self, access_token: &str, owner_id: &str, id: &str) -> Result<u64, RemoteError> {
        let resp = self
            .authed(self.http.delete(self.endpoint("/rest/v1/bookmarks")), access_token)
            .query(&[("id", format!("eq.{}", id)), ("user_id", format!("eq.{}", owner_id))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let removed: Vec<Value> = Self::check(resp).await?.json().await?;
        Ok(removed.len() as u64)
    }

    async fn list_bookmarks(&self, access_token: &str, owner_id: &str) -> Result<Vec<Bookmark>, RemoteError> {
        let resp = self
            .authed(self.http.get(self.endpoint("/rest/v1/bookmarks")), access_token)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", owner_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn fetch_bookmark(&self, access_token: &str, id: &str) -> Result<Option<Bookmark>, RemoteError> {
        let resp = self
            .authed(self.http.get(self.endpoint("/rest/v1/bookmarks")), access_token)
            .query(&[
                ("select", "*".to_string()),
                ("id", format!("eq.{}", id)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;
        let rows: Vec<Bookmark> = Self::check(resp).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    #[cfg(feature = "hosted")]
    async fn subscribe(&self, access_token: &str, table: &str) -> Result<ChangeFeed, RemoteError> {
        super::realtime::connect(&self.service_url, &self.anon_key, access_token, table).await
    }

    #[cfg(not(feature = "hosted"))]
    async fn subscribe(&self, _access_token: &str, _table: &str) -> Result<ChangeFeed, RemoteError> {
        Err(RemoteError::Protocol("realtime support not compiled in".to_string()))
    }
}
