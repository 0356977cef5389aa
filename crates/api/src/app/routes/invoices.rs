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
use storefront_core::{AggregateId, DomainError};
use storefront_infra::DispatchError;
use storefront_invoicing::{Invoice, InvoiceCommand, InvoiceId, InvoiceStatus, IssueInvoice, UpdateInvoiceStatus};
use storefront_sales::OrderId;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice))
        .route("/:invoice_id", get(get_invoice).put(update_invoice))
}

const INVOICE_STATUSES: [&str; 3] = ["Paid", "Unpaid", "Overdue"];

fn invoice(id: AggregateId) -> Invoice {
    Invoice::empty(InvoiceId::new(id))
}

async fn load_invoice(services: &AppServices, invoice_id: InvoiceId) -> Result<Invoice, ApiError> {
    let invoice: Invoice = services.load(invoice_id.0, invoice).await?;
    if !invoice.exists() {
        return Err(ApiError::not_found("Invoice not found"));
    }
    Ok(invoice)
}

fn render(services: &AppServices, invoice: &Invoice) -> serde_json::Value {
    let read_models = services.read_models();
    let order = invoice
        .order_id()
        .and_then(|id| read_models.orders.get(id))
        .map(|o| dto::order_to_json(&o, &read_models.users, &read_models.products));
    dto::invoice_to_json(invoice, order)
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::INVOICES_WRITE)?;

    let missing = [
        ("orderId", body.order_id.trim().is_empty()),
        ("invoiceNumber", body.invoice_number.trim().is_empty()),
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

    let invoice_id = InvoiceId::for_number(&body.invoice_number);
    let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
        order_id,
        invoice_number: body.invoice_number.trim().to_string(),
        amount: body.amount.unwrap_or_default(),
        occurred_at: Utc::now(),
    });
    let result = services
        .dispatch(invoice_id.0, Invoice::AGGREGATE_TYPE, cmd, invoice)
        .await;

    // Concurrent issues of one number collide on stream creation.
    if let Err(DispatchError::Concurrency(_)) = result {
        return Err(DomainError::duplicate("Invoice number already exists").into());
    }
    result?;

    let issued = load_invoice(&services, invoice_id).await?;
    info!(invoice_id = %invoice_id, invoice_number = issued.invoice_number(), "invoice issued");
    Ok((StatusCode::CREATED, Json(render(&services, &issued))).into_response())
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(invoice_id): Path<String>,
) -> Result<Response, ApiError> {
    let invoice_id: InvoiceId = invoice_id.parse()?;
    let invoice = load_invoice(&services, invoice_id).await?;
    Ok((StatusCode::OK, Json(render(&services, &invoice))).into_response())
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(invoice_id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::INVOICES_WRITE)?;
    let invoice_id: InvoiceId = invoice_id.parse()?;
    if body.status.trim().is_empty() {
        return Err(DomainError::MissingFields(vec!["status".to_string()]).into());
    }
    let status: InvoiceStatus = dto::parse_wire("status", &body.status, &INVOICE_STATUSES)?;

    let cmd = InvoiceCommand::UpdateStatus(UpdateInvoiceStatus {
        invoice_id,
        status,
        occurred_at: Utc::now(),
    });
    services
        .dispatch(invoice_id.0, Invoice::AGGREGATE_TYPE, cmd, invoice)
        .await?;

    let updated = load_invoice(&services, invoice_id).await?;
    Ok((StatusCode::OK, Json(render(&services, &updated))).into_response())
}
