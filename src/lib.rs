use axum::Router;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::{pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};

pub mod api;
pub mod auth;
pub mod error;
pub mod models;
pub mod notify;
pub mod policy;
pub mod schema;

pub type DbPool = Pool<AsyncPgConnection>;

pub fn connect_to_db(db_url: &str) -> DbPool {
    let db_config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    Pool::builder(db_config)
        .build()
        .expect("failed to build database pool")
}

pub fn app() -> Router {
    Router::new().nest("/api", api::app())
}
