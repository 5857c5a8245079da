use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use agrolog_activities::{ActivityDraft, ActivityFilter, ActivityId};
use agrolog_inventory::InventoryItemId;

use crate::app::services::{AppServices, Consumption};
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_activity).get(list_activities))
        .route("/summary", get(crop_summary))
        .route(
            "/:id",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
        .route("/:id/consumptions", post(record_consumption))
}

fn activity_id(raw: &str) -> Result<ActivityId, axum::response::Response> {
    errors::parse_id(raw, "activity").map(ActivityId::new)
}

pub async fn create_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Json(body): Json<ActivityDraft>,
) -> axum::response::Response {
    match services.create_activity(owner.owner_id(), body).await {
        Ok(a) => (StatusCode::CREATED, Json(dto::activity_to_json(&a))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_activities(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<dto::ActivityListQuery>,
) -> axum::response::Response {
    let filter = ActivityFilter::from(query);
    match services.list_activities(owner.owner_id(), &filter).await {
        Ok(list) => {
            let items = list.iter().map(dto::activity_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn crop_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<dto::ActivityListQuery>,
) -> axum::response::Response {
    let filter = ActivityFilter::from(query);
    match services.activity_summary(owner.owner_id(), &filter).await {
        Ok(rows) => {
            let crops = rows.iter().map(dto::crop_summary_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "crops": crops }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match activity_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.get_activity(owner.owner_id(), id).await {
        Ok(a) => (StatusCode::OK, Json(dto::activity_to_json(&a))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<ActivityDraft>,
) -> axum::response::Response {
    let id = match activity_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.update_activity(owner.owner_id(), id, body).await {
        Ok(a) => (StatusCode::OK, Json(dto::activity_to_json(&a))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match activity_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delete_activity(owner.owner_id(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn record_consumption(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ConsumptionRequest>,
) -> axum::response::Response {
    let id = match activity_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let consumption = Consumption {
        item_id: InventoryItemId::new(body.item_id),
        amount: body.amount,
        unit: body.unit,
        day: body.day,
        module: body.module,
        note: body.note,
    };
    match services.consume_for_activity(owner.owner_id(), id, consumption).await {
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
