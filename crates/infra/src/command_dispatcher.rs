//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store
//!   ↓
//! 2. Rehydrate aggregate (apply historical events)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Append to store with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish committed events to the bus (projections)
//! ```
//!
//! Step 4 is a compare-and-swap on the stream version: two concurrent
//! read-modify-write cycles on one aggregate cannot both commit. The loser
//! gets `DispatchError::Concurrency` and may retry.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use storefront_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use storefront_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic business rule failure.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency failure (stale aggregate version).
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// Failed to deserialize historical payloads into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Persisting happens before publication: if the append fails nothing is
/// published. A failed publish is logged and not returned, because the
/// events are already durable and the read side can be rebuilt from the
/// store.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// `make_aggregate` builds the empty aggregate that history is applied
    /// to (e.g. `Product::empty`). Returns the committed events; an empty
    /// vector means the command was a no-op.
    pub async fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id).await?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            debug!(%aggregate_id, aggregate_type, "command produced no events");
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected).await?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            if let Err(err) = self.bus.publish(stored.to_envelope()) {
                warn!(
                    %aggregate_id,
                    sequence_number = stored.sequence_number,
                    error = ?err,
                    "event committed but publication failed"
                );
            }
        }

        Ok(committed)
    }

    /// Rehydrate an aggregate from its stream without executing a command.
    ///
    /// Used for reads that must observe every committed event.
    pub async fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id).await?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    use storefront_core::{AggregateRoot, UserId};
    use storefront_events::InMemoryEventBus;
    use storefront_products::{
        AddReview, AddToFavourites, CreateProduct, Product, ProductCommand, ProductId,
    };

    use crate::event_store::InMemoryEventStore;

    type Dispatcher =
        CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn make(id: AggregateId) -> Product {
        Product::empty(ProductId::new(id))
    }

    async fn create(d: &Dispatcher) -> ProductId {
        let product_id = ProductId::new(AggregateId::new());
        d.dispatch(
            product_id.0,
            "products.product",
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                name: "Desk Lamp".to_string(),
                description: "LED".to_string(),
                price: Some(40),
                category: "home".to_string(),
                brand: "Lumo".to_string(),
                stock: Some(5),
                images: vec!["lamp.png".to_string()],
                occurred_at: Utc::now(),
            }),
            make,
        )
        .await
        .unwrap();
        product_id
    }

    #[tokio::test]
    async fn dispatch_persists_and_publishes() {
        let d = dispatcher();
        let subscription = d.bus().subscribe();

        let product_id = create(&d).await;

        let envelope = subscription.try_recv().unwrap();
        assert_eq!(envelope.aggregate_id(), product_id.0);
        assert_eq!(envelope.sequence_number(), 1);
        assert_eq!(envelope.event_type(), "products.product.created");

        let product: Product = d.load(product_id.0, make).await.unwrap();
        assert_eq!(product.version(), 1);
        assert_eq!(product.slug(), "desk-lamp");
    }

    #[tokio::test]
    async fn noop_commands_append_nothing() {
        let d = dispatcher();
        let product_id = create(&d).await;
        let user_id = UserId::new();
        let fav = || {
            ProductCommand::AddToFavourites(AddToFavourites {
                product_id,
                user_id,
                occurred_at: Utc::now(),
            })
        };

        assert_eq!(d.dispatch(product_id.0, "products.product", fav(), make).await.unwrap().len(), 1);
        assert!(d.dispatch(product_id.0, "products.product", fav(), make).await.unwrap().is_empty());
        assert_eq!(d.store().load_stream(product_id.0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn domain_errors_pass_through() {
        let d = dispatcher();
        let product_id = create(&d).await;

        let err = d
            .dispatch(
                product_id.0,
                "products.product",
                ProductCommand::AddReview(AddReview {
                    product_id,
                    user_id: UserId::new(),
                    comment: "bad".to_string(),
                    rating: 9.0,
                    occurred_at: Utc::now(),
                }),
                make,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn stale_append_is_a_concurrency_error() {
        let store = Arc::new(InMemoryEventStore::new());
        let d: Dispatcher = CommandDispatcher::new(store.clone(), Arc::new(InMemoryEventBus::new()));
        let product_id = create(&d).await;

        // A writer that loaded version 0 tries to commit after version 1 exists.
        let stale = UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id: product_id.0,
            aggregate_type: "products.product".to_string(),
            event_type: "products.product.deleted".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        };
        let err = store.append(vec![stale], ExpectedVersion::Exact(0)).await.unwrap_err();

        assert!(matches!(DispatchError::from(err), DispatchError::Concurrency(_)));
    }
}
