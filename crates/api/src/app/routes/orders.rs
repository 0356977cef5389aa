use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use storefront_auth::{Permission, authorize};
use storefront_core::{AggregateId, DomainError};
use storefront_products::ProductId;
use storefront_sales::{CreateOrder, Order, OrderCommand, OrderId, OrderItem, OrderStatus};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order))
}

pub(crate) const ORDER_STATUSES: [&str; 3] = ["pending", "completed", "cancelled"];

fn order(id: AggregateId) -> Order {
    Order::empty(OrderId::new(id))
}

fn render(services: &AppServices, order: &Order) -> serde_json::Value {
    let read_models = services.read_models();
    dto::order_to_json(order, &read_models.users, &read_models.products)
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Json(body): Json<dto::CreateOrderRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::ORDERS_WRITE)?;

    let mut missing = Vec::new();
    if body.products.is_empty() {
        missing.push("products");
    }
    if body.total_amount.is_none() {
        missing.push("totalAmount");
    }
    if let Some(err) = DomainError::missing_fields(missing) {
        return Err(err.into());
    }

    let items = body
        .products
        .iter()
        .map(|item| {
            let id: AggregateId = item.product.parse()?;
            Ok(OrderItem {
                product_id: ProductId::new(id),
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;
    let status: OrderStatus = match body.status.as_deref() {
        Some(raw) if !raw.trim().is_empty() => dto::parse_wire("status", raw, &ORDER_STATUSES)?,
        _ => OrderStatus::default(),
    };

    let order_id = OrderId::new(AggregateId::new());
    let cmd = OrderCommand::CreateOrder(CreateOrder {
        order_id,
        user_id: principal.user_id(),
        items,
        status,
        total_amount: body.total_amount.unwrap_or_default(),
        occurred_at: Utc::now(),
    });
    services
        .dispatch(order_id.0, Order::AGGREGATE_TYPE, cmd, order)
        .await?;

    let created: Order = services.load(order_id.0, order).await?;
    info!(order_id = %order_id, user_id = %principal.user_id(), "order placed");
    Ok((StatusCode::CREATED, Json(render(&services, &created))).into_response())
}

/// Admins see every order; everyone else sees their own.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> Response {
    let scope = match authorize(&principal.principal(), &Permission::ORDERS_READ_ALL) {
        Ok(()) => None,
        Err(_) => Some(principal.user_id()),
    };
    let orders = services
        .read_models()
        .orders
        .list(scope)
        .iter()
        .map(|o| render(&services, o))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(orders)).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let order_id: OrderId = id.parse()?;
    let found = services
        .read_models()
        .orders
        .get(order_id)
        .filter(|o| principal.is_admin() || o.user_id() == Some(principal.user_id()));

    match found {
        Some(o) => Ok((StatusCode::OK, Json(render(&services, &o))).into_response()),
        None => Err(ApiError::not_found("Order not found")),
    }
}
