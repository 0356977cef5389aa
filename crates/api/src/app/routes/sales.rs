use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use storefront_auth::Permission;
use storefront_core::{AggregateId, DomainError};
use storefront_sales::{OrderId, RecordSale, Sale, SaleCommand, SaleId};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale))
        .route("/day", get(sales_by_day))
        .route("/month", get(sales_by_month))
        .route("/total", get(total_sales))
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Json(body): Json<dto::CreateSaleRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::SALES_WRITE)?;

    let missing = [
        ("orderId", body.order_id.trim().is_empty()),
        ("amount", body.amount.is_none()),
    ]
    .into_iter()
    .filter(|(_, absent)| *absent)
    .map(|(k, _)| k);
    if let Some(err) = DomainError::missing_fields(missing) {
        return Err(err.into());
    }

    let order_id: OrderId = body.order_id.parse()?;
    if services.read_models().orders.get(order_id).is_none() {
        return Err(ApiError::not_found("Order not found"));
    }

    let now = Utc::now();
    let sale_id = SaleId::new(AggregateId::new());
    let amount = body.amount.unwrap_or_default();
    let date = body.date.unwrap_or(now);
    let cmd = SaleCommand::RecordSale(RecordSale {
        sale_id,
        order_id,
        amount,
        date,
        occurred_at: now,
    });
    services
        .dispatch(sale_id.0, Sale::AGGREGATE_TYPE, cmd, |id| Sale::empty(SaleId::new(id)))
        .await?;

    info!(sale_id = %sale_id.0, order_id = %order_id, amount, "sale recorded");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": sale_id.0.to_string(),
            "order": order_id.to_string(),
            "amount": amount,
            "date": date,
        })),
    )
        .into_response())
}

pub async fn sales_by_day(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::SALES_READ)?;
    Ok((StatusCode::OK, Json(services.read_models().sales.by_day())).into_response())
}

pub async fn sales_by_month(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::SALES_READ)?;
    Ok((StatusCode::OK, Json(services.read_models().sales.by_month())).into_response())
}

pub async fn total_sales(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::SALES_READ)?;
    Ok((StatusCode::OK, Json(services.read_models().sales.total())).into_response())
}
