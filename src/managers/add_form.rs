//! Add-bookmark form.
//!
//! `Idle -> Submitting -> Idle`. Input is validated before any remote call;
//! only one submission may be in flight. On success the fields are cleared,
//! on failure the reason is kept for inline display and the input is retained.

use serde::Serialize;
use url::Url;

use crate::services::actions::MutationActions;
use crate::types::errors::{ActionError, FormError, SubmitError};
use crate::types::session::SessionCookie;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    Idle,
    Submitting,
}

/// Validated field values handed to the create mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub title: String,
    pub url: String,
}

/// Checks both fields the way the browser's `required` / `type=url` inputs would.
pub fn validate(title: &str, url: &str) -> Result<Submission, FormError> {
    if title.trim().is_empty() {
        return Err(FormError::MissingTitle);
    }
    let url = url.trim();
    if url.is_empty() {
        return Err(FormError::MissingUrl);
    }
    // `Url::parse` only accepts absolute URLs.
    Url::parse(url).map_err(|_| FormError::InvalidUrl(url.to_string()))?;
    Ok(Submission {
        title: title.to_string(),
        url: url.to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AddBookmarkForm {
    title: String,
    url: String,
    phase: FormPhase,
    error: Option<String>,
}

impl Default for AddBookmarkForm {
    fn default() -> Self {
        Self::new()
    }
}

impl AddBookmarkForm {
    pub fn new() -> Self {
        Self {
            title: String::new(),
            url: String::new(),
            phase: FormPhase::Idle,
            error: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    /// Inline error text, if the last attempt failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Inputs and the submit affordance are disabled while submitting.
    pub fn is_disabled(&self) -> bool {
        self.phase == FormPhase::Submitting
    }

    /// Edits are ignored while a submission is outstanding.
    pub fn set_title(&mut self, title: &str) {
        if !self.is_disabled() {
            self.title = title.to_string();
        }
    }

    pub fn set_url(&mut self, url: &str) {
        if !self.is_disabled() {
            self.url = url.to_string();
        }
    }

    /// Validates and moves to `Submitting`. On rejection the form stays idle
    /// with the reason shown, and no mutation may be issued.
    pub fn begin_submit(&mut self) -> Result<Submission, FormError> {
        if self.phase == FormPhase::Submitting {
            return Err(FormError::AlreadySubmitting);
        }
        match validate(&self.title, &self.url) {
            Ok(submission) => {
                self.phase = FormPhase::Submitting;
                self.error = None;
                Ok(submission)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Returns to `Idle` with the outcome of the mutation.
    pub fn finish_submit(&mut self, result: &Result<(), ActionError>) {
        self.phase = FormPhase::Idle;
        match result {
            Ok(()) => {
                self.title.clear();
                self.url.clear();
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
    }

    /// Runs one full submission round trip.
    ///
    /// Callers sharing the form across tasks should use `begin_submit` /
    /// `finish_submit` instead so no lock is held across the remote call.
    pub async fn submit(
        &mut self,
        actions: &MutationActions,
        session: Option<&SessionCookie>,
    ) -> Result<(), SubmitError> {
        let submission = self.begin_submit().map_err(SubmitError::Rejected)?;
        let result = actions
            .add_bookmark(session, &submission.title, &submission.url)
            .await;
        self.finish_submit(&result);
        result.map_err(SubmitError::Failed)
    }
}
