//! App Core for Smartmarks.
//!
//! Builds the one shared data-service handle for the process and the
//! mutation actions on top of it. Components receive the handle by `Arc`
//! rather than reaching for a global.

use std::sync::Arc;

use crate::config::{AppConfig, Backend};
use crate::remote::local::{LocalDataService, LocalOptions};
use crate::remote::rest::RestDataService;
use crate::remote::RemoteDataService;
use crate::services::actions::MutationActions;
use crate::types::errors::RemoteError;

pub struct App {
    pub config: Arc<AppConfig>,
    pub remote: Arc<dyn RemoteDataService>,
    pub actions: Arc<MutationActions>,
}

impl App {
    /// Connects the backend named by `config`.
    pub fn new(config: AppConfig) -> Result<Self, RemoteError> {
        let remote: Arc<dyn RemoteDataService> = match &config.backend {
            Backend::Hosted { service_url, anon_key } => {
                tracing::info!(service_url = %service_url, "using hosted data service");
                Arc::new(RestDataService::new(service_url, anon_key)?)
            }
            Backend::Local { db_path } => {
                tracing::info!(path = %db_path.display(), "using local data service");
                if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir).map_err(|e| RemoteError::Database(e.to_string()))?;
                }
                Arc::new(LocalDataService::open(db_path, LocalOptions::default())?)
            }
        };
        Ok(Self::with_remote(config, remote))
    }

    /// Wires an already-built backend, e.g. a shared local service in tests.
    pub fn with_remote(config: AppConfig, remote: Arc<dyn RemoteDataService>) -> Self {
        let config = Arc::new(config);
        let actions = Arc::new(MutationActions::new(remote.clone(), config.clone()));
        Self {
            config,
            remote,
            actions,
        }
    }
}
