pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod store;

pub use db::DbPool;

use config::Config;
use engine::Services;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Stores;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub services: Services,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the SQLite stores and the services on top of `db`
    pub fn new(config: Config, db: DbPool) -> Self {
        let services = Services::new(Stores::sqlite(db.clone()), &config.auth);
        Self {
            config,
            db,
            services,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
