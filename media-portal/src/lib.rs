pub mod config;
pub mod handlers;
pub mod login;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod upload;
pub mod utils;

use services::{LazyMongo, SessionAuth};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session_auth: Arc<SessionAuth>,
    pub db: LazyMongo,
}

impl AppState {
    pub fn new(session_auth: Arc<SessionAuth>, db: LazyMongo) -> Self {
        Self { session_auth, db }
    }
}
