use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use agrolog_purchasing::{NewSupplier, SupplierId, SupplierPatch};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_supplier).get(list_suppliers))
        .route(
            "/:id",
            get(get_supplier).patch(update_supplier).delete(deactivate_supplier),
        )
        .route("/:id/reactivate", post(reactivate_supplier))
}

fn supplier_id(raw: &str) -> Result<SupplierId, axum::response::Response> {
    errors::parse_id(raw, "supplier").map(SupplierId::new)
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Json(body): Json<NewSupplier>,
) -> axum::response::Response {
    match services.create_supplier(owner.owner_id(), body).await {
        Ok(s) => (StatusCode::CREATED, Json(dto::supplier_to_json(&s))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<dto::SupplierListQuery>,
) -> axum::response::Response {
    match services
        .list_suppliers(owner.owner_id(), query.include_inactive)
        .await
    {
        Ok(list) => {
            let items = list.iter().map(dto::supplier_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match supplier_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.get_supplier(owner.owner_id(), id).await {
        Ok(s) => (StatusCode::OK, Json(dto::supplier_to_json(&s))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<SupplierPatch>,
) -> axum::response::Response {
    let id = match supplier_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.update_supplier(owner.owner_id(), id, body).await {
        Ok(s) => (StatusCode::OK, Json(dto::supplier_to_json(&s))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Soft delete: the supplier stays readable with `active = false`.
pub async fn deactivate_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match supplier_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.deactivate_supplier(owner.owner_id(), id).await {
        Ok(s) => (StatusCode::OK, Json(dto::supplier_to_json(&s))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reactivate_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match supplier_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.reactivate_supplier(owner.owner_id(), id).await {
        Ok(s) => (StatusCode::OK, Json(dto::supplier_to_json(&s))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
