use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use agrolog_purchasing::{NewPurchase, PurchaseId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase).get(list_purchases))
        .route("/:id", get(get_purchase).delete(delete_purchase))
}

fn purchase_id(raw: &str) -> Result<PurchaseId, axum::response::Response> {
    errors::parse_id(raw, "purchase").map(PurchaseId::new)
}

pub async fn create_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Json(body): Json<NewPurchase>,
) -> axum::response::Response {
    match services.create_purchase(owner.owner_id(), body).await {
        Ok((purchase, movement)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "purchase": dto::purchase_to_json(&purchase),
                "movement": movement.as_ref().map(dto::movement_to_json),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<dto::PurchaseListQuery>,
) -> axum::response::Response {
    match services.list_purchases(owner.owner_id(), query.supplier()).await {
        Ok(list) => {
            let items = list.iter().map(dto::purchase_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match purchase_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.get_purchase(owner.owner_id(), id).await {
        Ok(p) => (StatusCode::OK, Json(dto::purchase_to_json(&p))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match purchase_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_purchase(owner.owner_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
