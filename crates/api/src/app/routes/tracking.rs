use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use storefront_auth::Permission;
use storefront_core::DomainError;
use storefront_sales::{
    CreateTracking, OrderId, OrderTracking, TrackingCommand, TrackingEntry, TrackingStatus,
    UpdateTrackingStatus,
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_tracking))
        .route("/:order_id", get(get_tracking).put(update_tracking))
        .route("/:order_id/history", get(get_history))
}

const TRACKING_STATUSES: [&str; 5] = ["Pending", "Processing", "Shipped", "Delivered", "Cancelled"];

fn parse_status(raw: &str) -> Result<TrackingStatus, DomainError> {
    dto::parse_wire("status", raw, &TRACKING_STATUSES)
}

/// Rehydrate the order's tracking or answer 404.
async fn load_tracking(services: &AppServices, order_id: OrderId) -> Result<OrderTracking, ApiError> {
    let tracking: OrderTracking = services
        .load(OrderTracking::id_for(order_id), OrderTracking::empty)
        .await?;
    if !tracking.exists() {
        return Err(ApiError::not_found("Tracking not found"));
    }
    Ok(tracking)
}

pub async fn create_tracking(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Json(body): Json<dto::CreateTrackingRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::TRACKING_WRITE)?;
    if body.order.trim().is_empty() {
        return Err(DomainError::MissingFields(vec!["order".to_string()]).into());
    }

    let order_id: OrderId = body.order.parse()?;
    if services.read_models().orders.get(order_id).is_none() {
        return Err(ApiError::not_found("Order not found"));
    }

    let now = Utc::now();
    let status = match body.status.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_status(raw)?,
        _ => TrackingStatus::default(),
    };
    let history = body
        .history
        .iter()
        .map(|h| {
            Ok(TrackingEntry {
                status: parse_status(&h.status)?,
                date: h.date.unwrap_or(now),
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;

    let cmd = TrackingCommand::Create(CreateTracking {
        order_id,
        status,
        history,
        occurred_at: now,
    });
    services
        .dispatch(
            OrderTracking::id_for(order_id),
            OrderTracking::AGGREGATE_TYPE,
            cmd,
            OrderTracking::empty,
        )
        .await?;

    let tracking = load_tracking(&services, order_id).await?;
    info!(order_id = %order_id, "tracking opened");
    Ok((StatusCode::CREATED, Json(dto::tracking_to_json(&tracking))).into_response())
}

pub async fn get_tracking(
    Extension(services): Extension<Arc<AppServices>>,
    Path(order_id): Path<String>,
) -> Result<Response, ApiError> {
    let order_id: OrderId = order_id.parse()?;
    let tracking = load_tracking(&services, order_id).await?;
    Ok((StatusCode::OK, Json(dto::tracking_to_json(&tracking))).into_response())
}

pub async fn update_tracking(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(order_id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::TRACKING_WRITE)?;
    let order_id: OrderId = order_id.parse()?;
    if body.status.trim().is_empty() {
        return Err(DomainError::MissingFields(vec!["status".to_string()]).into());
    }
    let status = parse_status(&body.status)?;

    let cmd = TrackingCommand::UpdateStatus(UpdateTrackingStatus {
        order_id,
        status,
        occurred_at: Utc::now(),
    });
    services
        .dispatch(
            OrderTracking::id_for(order_id),
            OrderTracking::AGGREGATE_TYPE,
            cmd,
            OrderTracking::empty,
        )
        .await?;

    let tracking = load_tracking(&services, order_id).await?;
    info!(order_id = %order_id, status = ?status, "tracking updated");
    Ok((StatusCode::OK, Json(dto::tracking_to_json(&tracking))).into_response())
}

pub async fn get_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(order_id): Path<String>,
) -> Result<Response, ApiError> {
    let order_id: OrderId = order_id.parse()?;
    let tracking = load_tracking(&services, order_id).await?;
    Ok((StatusCode::OK, Json(dto::tracking_history_to_json(tracking.history()))).into_response())
}
