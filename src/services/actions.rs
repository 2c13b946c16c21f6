//! Mutation actions.
//!
//! Server-side operations that establish the caller's identity and delegate
//! to the data service. Every action is attempted once; failures are returned
//! to the component that invoked it.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::remote::RemoteDataService;
use crate::types::bookmark::NewBookmark;
use crate::types::errors::ActionError;
use crate::types::session::{AuthSession, OAuthRedirect, SessionCookie, User};

pub struct MutationActions {
    remote: Arc<dyn RemoteDataService>,
    config: Arc<AppConfig>,
}

impl MutationActions {
    pub fn new(remote: Arc<dyn RemoteDataService>, config: Arc<AppConfig>) -> Self {
        Self { remote, config }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteDataService> {
        &self.remote
    }

    /// Resolves the caller, or `None` when there is no valid session.
    pub async fn current_user(&self, session: Option<&SessionCookie>) -> Result<Option<User>, ActionError> {
        match session {
            Some(cookie) => Ok(self.remote.get_user(cookie.access_token()).await?),
            None => Ok(None),
        }
    }

    async fn require_user<'s>(
        &self,
        session: Option<&'s SessionCookie>,
    ) -> Result<(User, &'s str), ActionError> {
        let cookie = session.ok_or(ActionError::Unauthenticated)?;
        let user = self
            .remote
            .get_user(cookie.access_token())
            .await?
            .ok_or(ActionError::Unauthenticated)?;
        Ok((user, cookie.access_token()))
    }

    /// Inserts a bookmark owned by the caller.
    ///
    /// Nothing is returned; sessions observe the new row through the change feed.
    pub async fn add_bookmark(
        &self,
        session: Option<&SessionCookie>,
        title: &str,
        url: &str,
    ) -> Result<(), ActionError> {
        let (user, token) = self.require_user(session).await?;

        if title.trim().is_empty() || url.trim().is_empty() {
            return Err(ActionError::Validation("URL and title are required".to_string()));
        }

        let row = NewBookmark {
            user_id: user.id,
            title: title.to_string(),
            url: url.to_string(),
        };
        self.remote.insert_bookmark(token, &row).await?;
        tracing::info!(user_id = %row.user_id, "bookmark added");
        Ok(())
    }

    /// Deletes a bookmark owned by the caller.
    ///
    /// A foreign or unknown id affects zero rows and is not an error.
    pub async fn delete_bookmark(&self, session: Option<&SessionCookie>, id: &str) -> Result<(), ActionError> {
        let (user, token) = self.require_user(session).await?;
        let affected = self.remote.delete_bookmark(token, &user.id, id).await?;
        if affected == 0 {
            tracing::debug!(id, "delete matched no owned row");
        }
        Ok(())
    }

    pub async fn sign_out(&self, session: Option<&SessionCookie>) -> Result<(), ActionError> {
        if let Some(cookie) = session {
            self.remote.sign_out(cookie.access_token()).await?;
        }
        Ok(())
    }

    /// Starts delegated sign-in and returns where to send the browser.
    pub async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthRedirect, ActionError> {
        Ok(self
            .remote
            .authorize_url(provider, &self.config.oauth_callback_url())
            .await?)
    }

    /// Callback route: trades the provider's code for a session.
    pub async fn complete_oauth(&self, code: &str, code_verifier: Option<&str>) -> Result<AuthSession, ActionError> {
        Ok(self.remote.exchange_code(code, code_verifier).await?)
    }
}
