pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod route;
pub mod schema;

use sqlx::{Pool, Sqlite};

use crate::{auth::AuthKeys, config::Config};

// Struct representing the application state
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub auth: AuthKeys,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: &Config) -> Self {
        AppState {
            db,
            auth: AuthKeys::new(&config.jwt_secret, config.password_hash_iterations),
        }
    }
}
