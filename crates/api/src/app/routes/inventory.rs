use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use agrolog_inventory::{
    InventoryItemId, ItemDetailsPatch, MovementQuery, NewInventoryItem, RecordMovement,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route(
            "/items/:id",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route("/items/:id/movements", post(record_movement).get(item_movements))
        .route("/movements", get(list_movements))
}

fn item_id(raw: &str) -> Result<InventoryItemId, axum::response::Response> {
    errors::parse_id(raw, "item").map(InventoryItemId::new)
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Json(body): Json<NewInventoryItem>,
) -> axum::response::Response {
    match services.create_item(owner.owner_id(), body).await {
        Ok((item, opening)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "item": dto::item_to_json(&item),
                "opening_movement": opening.as_ref().map(dto::movement_to_json),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<dto::ItemListQuery>,
) -> axum::response::Response {
    match services
        .list_items(owner.owner_id(), query.category, query.low_stock)
        .await
    {
        Ok(list) => {
            let items = list.iter().map(dto::item_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.get_item(owner.owner_id(), id).await {
        Ok(item) => (StatusCode::OK, Json(dto::item_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<ItemDetailsPatch>,
) -> axum::response::Response {
    let id = match item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.update_item(owner.owner_id(), id, body).await {
        Ok(item) => (StatusCode::OK, Json(dto::item_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Removes the item; its movement history is kept.
pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_item(owner.owner_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MovementRequest>,
) -> axum::response::Response {
    let id = match item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut cmd = RecordMovement::new(owner.owner_id(), id, body.operation, body.amount, body.unit);
    cmd.note = body.note;

    match services.record_movement(cmd).await {
        Ok((item, movement)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "item": dto::item_to_json(&item),
                "movement": dto::movement_to_json(&movement),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn item_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match item_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    movements_response(&services, owner, MovementQuery::for_item(id)).await
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<dto::MovementListQuery>,
) -> axum::response::Response {
    movements_response(&services, owner, MovementQuery::from(query)).await
}

async fn movements_response(
    services: &AppServices,
    owner: OwnerContext,
    query: MovementQuery,
) -> axum::response::Response {
    match services.movements(owner.owner_id(), &query).await {
        Ok(list) => {
            let items = list.iter().map(dto::movement_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
