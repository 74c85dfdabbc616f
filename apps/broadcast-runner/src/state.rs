//! Shared state for the HTTP API

use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::runner::BroadcastRunner;

/// State shared across all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: DatabaseConnection,
    pub runner: BroadcastRunner,
}
