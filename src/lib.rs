pub mod algorithms;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{RecError, Result};
pub use models::*;

use dashmap::DashMap;
use parking_lot::RwLock;
use services::recommendation::RecommendationService;
use std::sync::Arc;
use tracing::info;

/// Shared serving state: configuration, the currently published model
/// behind a swappable handle, and request counters.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    service: Arc<RwLock<Arc<RecommendationService>>>,
    pub stats: Arc<DashMap<String, u64>>,
}

impl AppState {
    /// Loads the model named by the configuration and builds the serving
    /// state. A missing model file is fatal here; the server never starts
    /// without a trained model.
    pub fn new(config: Config) -> Result<Self> {
        let model = store::load(&config.model.path)?;
        let service = RecommendationService::new(Arc::new(model));

        Ok(Self {
            config: Arc::new(config),
            service: Arc::new(RwLock::new(Arc::new(service))),
            stats: Arc::new(DashMap::new()),
        })
    }

    /// The currently published service. Queries run against the clone, so
    /// a concurrent reload never changes a request mid-flight.
    pub fn service(&self) -> Arc<RecommendationService> {
        self.service.read().clone()
    }

    /// Re-reads the model file and publishes it. The new model is fully
    /// loaded before the handle swap, so readers observe either the old
    /// or the new model, never a mixture.
    pub fn reload(&self) -> Result<()> {
        let model = store::load(&self.config.model.path)?;
        let fresh = Arc::new(RecommendationService::new(Arc::new(model)));
        *self.service.write() = fresh;
        info!("published reloaded model");
        Ok(())
    }

    pub fn bump(&self, key: &str) {
        *self.stats.entry(key.to_string()).or_insert(0) += 1;
    }
}

pub async fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
