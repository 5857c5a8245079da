use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(join_waitlist))
}

/// 201 on first signup, 200 when the email was already listed.
pub async fn join_waitlist(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::WaitlistRequest>,
) -> axum::response::Response {
    match services.join_waitlist(&body.email, body.name).await {
        Ok(signup) => {
            let status = if signup.created { StatusCode::CREATED } else { StatusCode::OK };
            (status, Json(dto::waitlist_entry_to_json(&signup.entry))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
