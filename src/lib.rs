use actix_web::web;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;

/// Registers every front-end and auth route. Expects `ContentService`,
/// `Tera` and `DbPool` as app data and a session middleware around it.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.configure(routes::auth::config_auth)
        .configure(routes::front::config_front);
}
