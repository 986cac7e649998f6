pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod seating;
pub mod services;

use std::sync::Arc;
use tracing::info;

use cache::{ReportCache, SessionCache, Store};

// Shared state для всего приложения
pub struct AppState {
    pub cache: SessionCache<Store>,
    pub reports: ReportCache<Store>,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let store = Store::from_config(&config.storage).await?;
        info!(backend = store.backend_name(), "Storage ready");
        Ok(Self::with_store(config, store))
    }

    /// Both caches share one backend.
    pub fn with_store(config: config::Config, store: Store) -> Arc<Self> {
        Arc::new(Self {
            cache: SessionCache::new(store.clone()),
            reports: ReportCache::new(store),
            config,
        })
    }
}
