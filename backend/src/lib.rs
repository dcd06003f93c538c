//! Certificate issuance service: template catalog, PDF rendering, bulk
//! issuance, public verification and retention of rendered files.

pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod job_controller;
pub mod render;
pub mod services;
pub mod storage;

use crate::config::{normalize_base_url, AppConfig};
use crate::job_controller::sweeper::SweepLog;
use crate::services::certificates::workflow::IssueContext;
use crate::storage::Storage;
use actix_files::Files;
use actix_web::{web, HttpRequest};
use rusqlite::Connection;
use std::sync::Arc;

/// Shared application state, injected into handlers as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Storage,
    /// Outcome of the most recent retention sweep.
    pub sweeps: SweepLog,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let storage = Storage::new(&config.storage_root);
        Self {
            config: Arc::new(config),
            storage,
            sweeps: SweepLog::default(),
        }
    }

    pub fn connect(&self) -> rusqlite::Result<Connection> {
        db::open(&self.config.database_path)
    }

    /// Base for absolute links, always ending with `/`. The configured public
    /// URL wins over the host the request came in on.
    pub fn base_url(&self, req: &HttpRequest) -> String {
        match &self.config.public_base_url {
            Some(url) => normalize_base_url(url),
            None => {
                let info = req.connection_info();
                normalize_base_url(&format!("{}://{}", info.scheme(), info.host()))
            }
        }
    }

    pub fn issue_context(&self, req: &HttpRequest) -> IssueContext {
        IssueContext {
            database: self.config.database_path.clone(),
            storage: self.storage.clone(),
            base_url: self.base_url(req),
        }
    }
}

/// Registers every route of the service. Used by `main` and by the
/// integration tests.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::new(state.clone()))
        .service(services::templates::configure_routes())
        .service(services::certificates::configure_routes())
        .service(services::verify::configure_api_routes())
        .service(services::verify::configure_page_routes())
        .service(services::admin::configure_routes())
        .service(Files::new("/static/output", state.storage.output_dir()));
}
