use axum::{http::Method, Extension};
use campus_hub::{auth::ensure_jwt_secret_is_valid, connect_to_db, notify};
use envconfig::Envconfig;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: String,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
}

// Undelivered outbox rows are retried on this cadence.
const OUTBOX_RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,campus_hub=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::init_from_env().unwrap();
    ensure_jwt_secret_is_valid();

    let pool = connect_to_db(&config.db_url);

    let outbox_pool = pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(OUTBOX_RETRY_INTERVAL);
        loop {
            interval.tick().await;
            match outbox_pool.get().await {
                Ok(mut conn) => {
                    let delivered = notify::dispatch_pending(&mut conn).await;
                    if delivered > 0 {
                        tracing::debug!(delivered, "dispatched outbox notifications");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "no connection available for outbox dispatch");
                }
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = campus_hub::app().layer(Extension(pool)).layer(cors);

    tracing::info!(port = config.port, "starting campus hub server");
    axum::Server::bind(&([0, 0, 0, 0], config.port).into())
        .serve(app.into_make_service())
        .await
        .unwrap();
}
