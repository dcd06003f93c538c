use actix_web::{App, HttpServer};
use certforge::config::AppConfig;
use certforge::db;
use certforge::job_controller::sweeper::{self, RetentionPolicy};
use certforge::storage::PREVIEW_FILE_NAME;
use certforge::AppState;
use env_logger::Env;
use log::{info, warn};
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    if config.uses_default_admin_key() {
        warn!("ADMIN_SECRET_KEY is not set, the admin endpoints use the default key");
    }

    let conn = db::open(&config.database_path).map_err(io::Error::other)?;
    db::initialize(&conn).map_err(io::Error::other)?;
    drop(conn);

    let state = AppState::new(config);
    state.storage.ensure_layout()?;

    // Start the retention sweeper
    let sweeper_handle = sweeper::start(
        RetentionPolicy {
            dir: state.storage.output_dir(),
            max_age: state.config.retention,
            keep: vec![PREVIEW_FILE_NAME.to_string()],
        },
        state.config.sweep_interval,
        state.sweeps.clone(),
    );

    let (host, port) = (state.config.host.clone(), state.config.port);
    info!("Server running at http://{}:{}", host, port);

    let app_state = state.clone();
    let result = HttpServer::new(move || {
        App::new().configure(|cfg| certforge::configure(cfg, &app_state))
    })
    .bind((host.as_str(), port))?
    .run()
    .await;

    sweeper_handle.stop().await;
    result
}
