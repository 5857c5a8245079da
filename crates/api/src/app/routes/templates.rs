use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use agrolog_activities::{NewTemplate, TemplateId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_template).get(list_templates))
        .route(
            "/:id",
            get(get_template).put(update_template).delete(delete_template),
        )
}

fn template_id(raw: &str) -> Result<TemplateId, axum::response::Response> {
    errors::parse_id(raw, "template").map(TemplateId::new)
}

pub async fn create_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Json(body): Json<NewTemplate>,
) -> axum::response::Response {
    match services.create_template(owner.owner_id(), body).await {
        Ok(t) => (StatusCode::CREATED, Json(dto::template_to_json(&t))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_templates(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<dto::TemplateListQuery>,
) -> axum::response::Response {
    match services.list_templates(owner.owner_id(), query.kind).await {
        Ok(list) => {
            let items = list.iter().map(dto::template_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match template_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.get_template(owner.owner_id(), id).await {
        Ok(t) => (StatusCode::OK, Json(dto::template_to_json(&t))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<NewTemplate>,
) -> axum::response::Response {
    let id = match template_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.update_template(owner.owner_id(), id, body).await {
        Ok(t) => (StatusCode::OK, Json(dto::template_to_json(&t))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match template_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_template(owner.owner_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
