//! Process configuration for Smartmarks.
//!
//! Read once at startup from the environment and shared immutably as
//! `Arc<AppConfig>` for the lifetime of the process.

use std::path::PathBuf;

use url::Url;

use crate::types::errors::ConfigError;

pub const ENV_SERVICE_URL: &str = "SMARTMARKS_SERVICE_URL";
pub const ENV_ANON_KEY: &str = "SMARTMARKS_ANON_KEY";
pub const ENV_SITE_URL: &str = "SMARTMARKS_SITE_URL";
pub const ENV_DATA_DIR: &str = "SMARTMARKS_DATA_DIR";

pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DB_FILE_NAME: &str = "smartmarks.db";

/// Which data service backs the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Hosted auth + REST + realtime service.
    Hosted { service_url: String, anon_key: String },
    /// In-process SQLite service.
    Local { db_path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: Backend,
    /// Public base URL of this site, without a trailing slash.
    pub site_url: String,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match (get(ENV_SERVICE_URL), get(ENV_ANON_KEY)) {
            (Some(service_url), Some(anon_key)) => {
                let service_url = normalize_url(ENV_SERVICE_URL, &service_url)?;
                Backend::Hosted { service_url, anon_key }
            }
            (Some(_), None) => return Err(ConfigError::Missing(ENV_ANON_KEY.to_string())),
            (None, Some(_)) => return Err(ConfigError::Missing(ENV_SERVICE_URL.to_string())),
            (None, None) => Backend::Local {
                db_path: default_data_dir(get(ENV_DATA_DIR)).join(DB_FILE_NAME),
            },
        };

        let site_url = match get(ENV_SITE_URL) {
            Some(raw) => normalize_url(ENV_SITE_URL, &raw)?,
            None => DEFAULT_SITE_URL.to_string(),
        };

        Ok(Self { backend, site_url })
    }

    /// Where the identity provider sends the browser back to.
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/api/auth/callback", self.site_url)
    }
}

fn normalize_url(var: &str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    Url::parse(trimmed).map_err(|e| ConfigError::Invalid(var.to_string(), e.to_string()))?;
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Prefers the configured directory, then the executable's directory, then CWD.
fn default_data_dir(configured: Option<String>) -> PathBuf {
    if let Some(dir) = configured {
        return PathBuf::from(dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}
