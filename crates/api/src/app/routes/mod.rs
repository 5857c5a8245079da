use axum::{Router, routing::get};

pub mod activities;
pub mod inventory;
pub mod purchases;
pub mod suppliers;
pub mod system;
pub mod templates;
pub mod waitlist;

/// Router for all authenticated (owner-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/activities", activities::router())
        .nest("/inventory", inventory::router())
        .nest("/suppliers", suppliers::router())
        .nest("/purchases", purchases::router())
        .nest("/templates", templates::router())
}

/// Router for endpoints that need no token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/waitlist", waitlist::router())
}
