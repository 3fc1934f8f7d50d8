use axum::Router;

pub mod admin;
pub mod club;
pub mod membership;
pub mod notifications;
pub mod roles;

pub fn app() -> Router {
    Router::new()
        .nest(
            "/clubs",
            club::app()
                .merge(membership::app())
                .merge(roles::app())
                .merge(admin::app()),
        )
        .nest("/notifications", notifications::app())
}
