//! Payment recording and reconciliation across products.
//!
//! A checkout touches several product streams. The `PaymentIntent` stream,
//! keyed by the payment reference, is created first: that append is the
//! uniqueness check for the reference, and the intent remembers which
//! products to update when the gateway reports the outcome.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use storefront_core::{DomainError, UserId};
use storefront_events::{EventBus, EventEnvelope};
use storefront_products::{
    OpenPaymentIntent, PaymentIntent, PaymentIntentCommand, PaymentReference, PaymentStatus, Product,
    ProductCommand, ProductId, ReconcilePayment, RecordPayment, SettlePaymentIntent,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub reference: PaymentReference,
    pub user_id: UserId,
    pub amount: u64,
    pub product_ids: Vec<ProductId>,
    pub occurred_at: DateTime<Utc>,
}

fn product(id: storefront_core::AggregateId) -> Product {
    Product::empty(ProductId::new(id))
}

/// Skip a product whose stream is gone or never held the payment.
fn skip_missing(result: Result<Vec<StoredEvent>, DispatchError>, product_id: ProductId) -> Result<Vec<StoredEvent>, DispatchError> {
    match result {
        Err(DispatchError::Domain(DomainError::NotFound(what))) => {
            warn!(%product_id, missing = %what, "skipping payment target");
            Ok(vec![])
        }
        other => other,
    }
}

/// Record a pending payment on every listed product.
///
/// Fails with `Conflict` if the reference was already used. Products that
/// do not exist are skipped. Returns every committed event.
pub async fn record_payment<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    request: PaymentRequest,
) -> Result<Vec<StoredEvent>, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let mut product_ids = request.product_ids.clone();
    product_ids.sort();
    product_ids.dedup();

    let intent_id = PaymentIntent::id_for(&request.reference);
    let mut committed = dispatcher
        .dispatch(
            intent_id,
            PaymentIntent::AGGREGATE_TYPE,
            PaymentIntentCommand::Open(OpenPaymentIntent {
                reference: request.reference.clone(),
                user_id: request.user_id,
                amount: request.amount,
                product_ids: product_ids.clone(),
                occurred_at: request.occurred_at,
            }),
            PaymentIntent::empty,
        )
        .await?;

    for product_id in product_ids {
        let result = dispatcher
            .dispatch(
                product_id.0,
                Product::AGGREGATE_TYPE,
                ProductCommand::RecordPayment(RecordPayment {
                    product_id,
                    user_id: request.user_id,
                    amount: request.amount,
                    reference: request.reference.clone(),
                    occurred_at: request.occurred_at,
                }),
                product,
            )
            .await;
        committed.extend(skip_missing(result, product_id)?);
    }

    info!(reference = %request.reference, "payment recorded");
    Ok(committed)
}

/// Set the status of the payment `reference` wherever it was recorded.
///
/// Unknown references fail with `NotFound`. Repeating a reconciliation with
/// the same status commits nothing.
pub async fn reconcile_payment<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    reference: &PaymentReference,
    status: PaymentStatus,
    occurred_at: DateTime<Utc>,
) -> Result<Vec<StoredEvent>, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let intent_id = PaymentIntent::id_for(reference);
    let intent: PaymentIntent = dispatcher.load(intent_id, PaymentIntent::empty).await?;
    if !intent.exists() {
        return Err(DomainError::not_found("payment reference").into());
    }

    let mut committed = dispatcher
        .dispatch(
            intent_id,
            PaymentIntent::AGGREGATE_TYPE,
            PaymentIntentCommand::Settle(SettlePaymentIntent {
                reference: reference.clone(),
                status,
                occurred_at,
            }),
            PaymentIntent::empty,
        )
        .await?;

    for &product_id in intent.product_ids() {
        let result = dispatcher
            .dispatch(
                product_id.0,
                Product::AGGREGATE_TYPE,
                ProductCommand::ReconcilePayment(ReconcilePayment {
                    product_id,
                    reference: reference.clone(),
                    status,
                    occurred_at,
                }),
                product,
            )
            .await;
        committed.extend(skip_missing(result, product_id)?);
    }

    info!(%reference, status = status.as_str(), "payment reconciled");
    Ok(committed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use storefront_core::AggregateId;
    use storefront_events::InMemoryEventBus;
    use storefront_products::CreateProduct;

    use crate::event_store::InMemoryEventStore;

    type Dispatcher =
        CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    async fn create_product(d: &Dispatcher, name: &str) -> ProductId {
        let product_id = ProductId::new(AggregateId::new());
        d.dispatch(
            product_id.0,
            Product::AGGREGATE_TYPE,
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                name: name.to_string(),
                description: "desc".to_string(),
                price: Some(50),
                category: "misc".to_string(),
                brand: "Generic".to_string(),
                stock: Some(3),
                images: vec!["p.png".to_string()],
                occurred_at: Utc::now(),
            }),
            product,
        )
        .await
        .unwrap();
        product_id
    }

    fn request(reference: &PaymentReference, user_id: UserId, product_ids: Vec<ProductId>) -> PaymentRequest {
        PaymentRequest {
            reference: reference.clone(),
            user_id,
            amount: 100,
            product_ids,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_then_reconcile_updates_every_product() {
        let d = dispatcher();
        let p1 = create_product(&d, "One").await;
        let p2 = create_product(&d, "Two").await;
        let reference = PaymentReference::parse("ref-1").unwrap();

        record_payment(&d, request(&reference, UserId::new(), vec![p1, p2])).await.unwrap();
        for id in [p1, p2] {
            let p: Product = d.load(id.0, product).await.unwrap();
            assert_eq!(p.payment(&reference).unwrap().status, PaymentStatus::Pending);
        }

        let committed = reconcile_payment(&d, &reference, PaymentStatus::Success, Utc::now())
            .await
            .unwrap();
        assert_eq!(committed.len(), 3);

        for id in [p1, p2] {
            let p: Product = d.load(id.0, product).await.unwrap();
            assert_eq!(p.payment(&reference).unwrap().status, PaymentStatus::Success);
        }

        let again = reconcile_payment(&d, &reference, PaymentStatus::Success, Utc::now())
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn reused_reference_is_a_conflict() {
        let d = dispatcher();
        let p1 = create_product(&d, "One").await;
        let reference = PaymentReference::parse("ref-dup").unwrap();

        record_payment(&d, request(&reference, UserId::new(), vec![p1])).await.unwrap();
        let err = record_payment(&d, request(&reference, UserId::new(), vec![p1]))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn missing_products_are_skipped() {
        let d = dispatcher();
        let p1 = create_product(&d, "One").await;
        let ghost = ProductId::new(AggregateId::new());
        let reference = PaymentReference::parse("ref-ghost").unwrap();

        let committed = record_payment(&d, request(&reference, UserId::new(), vec![p1, ghost]))
            .await
            .unwrap();
        // Intent opened + one product payment.
        assert_eq!(committed.len(), 2);

        let committed = reconcile_payment(&d, &reference, PaymentStatus::Failed, Utc::now())
            .await
            .unwrap();
        assert_eq!(committed.len(), 2);
    }

    #[tokio::test]
    async fn reconciling_unknown_reference_is_not_found() {
        let d = dispatcher();
        let reference = PaymentReference::parse("never-issued").unwrap();

        let err = reconcile_payment(&d, &reference, PaymentStatus::Success, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Domain(DomainError::NotFound(_))));
    }
}
