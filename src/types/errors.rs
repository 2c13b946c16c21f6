use std::fmt;

// === ActionError ===

/// Failures surfaced by mutation actions to the component that invoked them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// No valid session.
    Unauthenticated,
    /// A required field is missing.
    Validation(String),
    /// The data service call failed; the message is passed through verbatim.
    RemoteService(String),
    /// The identity provider rejected the request.
    Provider(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::Unauthenticated => write!(f, "Not authenticated"),
            ActionError::Validation(msg) => write!(f, "{}", msg),
            ActionError::RemoteService(msg) => write!(f, "{}", msg),
            ActionError::Provider(msg) => write!(f, "Sign-in failed: {}", msg),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<RemoteError> for ActionError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unauthorized => ActionError::Unauthenticated,
            RemoteError::Provider(msg) => ActionError::Provider(msg),
            RemoteError::Http(msg)
            | RemoteError::Database(msg)
            | RemoteError::Protocol(msg) => ActionError::RemoteService(msg),
            RemoteError::Closed => ActionError::RemoteService(RemoteError::Closed.to_string()),
        }
    }
}

// === RemoteError ===

/// Errors at the data service boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The access token is missing, expired, or does not own the row.
    Unauthorized,
    /// Transport or non-success HTTP status.
    Http(String),
    /// Storage failure inside the service.
    Database(String),
    /// The OAuth provider rejected the request.
    Provider(String),
    /// Unexpected payload shape on the wire.
    Protocol(String),
    /// The change feed is no longer delivering.
    Closed,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Unauthorized => write!(f, "Unauthorized"),
            RemoteError::Http(msg) => write!(f, "Request failed: {}", msg),
            RemoteError::Database(msg) => write!(f, "Database error: {}", msg),
            RemoteError::Provider(msg) => write!(f, "Provider error: {}", msg),
            RemoteError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            RemoteError::Closed => write!(f, "Change feed closed"),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<rusqlite::Error> for RemoteError {
    fn from(err: rusqlite::Error) -> Self {
        RemoteError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err.to_string())
    }
}

// === FormError ===

/// Client-side rejections raised before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    /// A submission is already in flight.
    AlreadySubmitting,
    /// The title field is empty.
    MissingTitle,
    /// The url field is empty.
    MissingUrl,
    /// The url field does not parse as an absolute URL.
    InvalidUrl(String),
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::AlreadySubmitting => write!(f, "A bookmark is already being added"),
            FormError::MissingTitle => write!(f, "Title is required"),
            FormError::MissingUrl => write!(f, "URL is required"),
            FormError::InvalidUrl(input) => write!(f, "Please enter a valid URL: {}", input),
        }
    }
}

impl std::error::Error for FormError {}

// === SubmitError ===

/// Why a form submission did not produce a bookmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Rejected client-side; no remote call was made.
    Rejected(FormError),
    /// The create mutation failed.
    Failed(ActionError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Rejected(e) => write!(f, "{}", e),
            SubmitError::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SubmitError {}

// === ConfigError ===

/// Errors reading process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(String),
    /// A variable is set but unusable.
    Invalid(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "Missing configuration: {}", var),
            ConfigError::Invalid(var, msg) => write!(f, "Invalid configuration {}: {}", var, msg),
        }
    }
}

impl std::error::Error for ConfigError {}
