//! Snapshot projection: keeps the latest state of every live aggregate of
//! one type, folded from its events with the aggregate's own `apply`.

use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use storefront_auth::User;
use storefront_core::{Aggregate, AggregateId};
use storefront_events::EventEnvelope;
use storefront_products::{Product, ProductId};
use storefront_sales::{Order, OrderId, Sale, SaleId};
use storefront_vehicles::{Vehicle, VehicleId};

use super::ProjectionError;
use super::cursor::StreamCursors;
use crate::read_model::{InMemoryReadStore, ReadStore};

/// An aggregate whose state doubles as its read model.
pub trait Projected: Aggregate<Event: DeserializeOwned> + Clone + Send + Sync + 'static {
    const STREAM_TYPE: &'static str;

    fn empty_at(id: AggregateId) -> Self;

    /// `false` once the aggregate has been deleted; the snapshot is dropped.
    fn is_live(&self) -> bool;
}

impl Projected for Product {
    const STREAM_TYPE: &'static str = Product::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Product::empty(ProductId::new(id))
    }

    fn is_live(&self) -> bool {
        self.exists()
    }
}

impl Projected for User {
    const STREAM_TYPE: &'static str = User::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        User::empty(id.into())
    }

    fn is_live(&self) -> bool {
        self.exists()
    }
}

impl Projected for Vehicle {
    const STREAM_TYPE: &'static str = Vehicle::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Vehicle::empty(VehicleId::new(id))
    }

    fn is_live(&self) -> bool {
        self.exists()
    }
}

impl Projected for Order {
    const STREAM_TYPE: &'static str = Order::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Order::empty(OrderId::new(id))
    }

    fn is_live(&self) -> bool {
        self.exists()
    }
}

impl Projected for Sale {
    const STREAM_TYPE: &'static str = Sale::AGGREGATE_TYPE;

    fn empty_at(id: AggregateId) -> Self {
        Sale::empty(SaleId::new(id))
    }

    fn is_live(&self) -> bool {
        self.order_id().is_some()
    }
}

#[derive(Debug)]
pub struct AggregateProjection<A, S = InMemoryReadStore<AggregateId, A>> {
    store: S,
    cursors: StreamCursors,
    // Serializes cursor check, fold and commit for the worker and inline callers.
    apply_lock: Mutex<()>,
    _aggregate: core::marker::PhantomData<fn() -> A>,
}

impl<A> AggregateProjection<A>
where
    A: Projected,
{
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<A, S> AggregateProjection<A, S>
where
    A: Projected,
    S: ReadStore<AggregateId, A>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
            apply_lock: Mutex::new(()),
            _aggregate: core::marker::PhantomData,
        }
    }

    pub fn get(&self, id: AggregateId) -> Option<A> {
        self.store.get(&id)
    }

    pub fn list(&self) -> Vec<A> {
        self.store.list()
    }

    /// Fold one envelope into the snapshot. Returns `Ok(false)` when the
    /// envelope belongs to another stream type or was already applied.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        if envelope.aggregate_type() != A::STREAM_TYPE {
            return Ok(false);
        }

        let _guard = self.apply_lock.lock().map_err(|_| ProjectionError::Poisoned)?;

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.should_apply(aggregate_id, seq)? {
            return Ok(false);
        }

        let event: A::Event = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let mut snapshot = self
            .store
            .get(&aggregate_id)
            .unwrap_or_else(|| A::empty_at(aggregate_id));
        snapshot.apply(&event);

        if snapshot.is_live() {
            self.store.upsert(aggregate_id, snapshot);
        } else {
            self.store.remove(&aggregate_id);
        }
        self.cursors.advance(aggregate_id, seq);

        Ok(true)
    }

    /// Drop all snapshots and cursors.
    pub fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use storefront_products::{ProductCreated, ProductDeleted, ProductEvent};

    fn envelope(id: AggregateId, seq: u64, event: &ProductEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id,
            Product::AGGREGATE_TYPE,
            seq,
            "products.product.test",
            Utc::now(),
            serde_json::to_value(event).unwrap(),
        )
    }

    fn created(product_id: ProductId) -> ProductEvent {
        ProductEvent::ProductCreated(ProductCreated {
            product_id,
            name: "Kettle".to_string(),
            slug: "kettle".to_string(),
            description: "Steel".to_string(),
            price: 30,
            category: "kitchen".to_string(),
            brand: "Boil".to_string(),
            stock: 2,
            images: vec!["k.png".to_string()],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn folds_events_and_skips_redelivery() {
        let projection = AggregateProjection::<Product>::in_memory();
        let product_id = ProductId::new(AggregateId::new());
        let env = envelope(product_id.0, 1, &created(product_id));

        assert!(projection.apply_envelope(&env).unwrap());
        assert!(!projection.apply_envelope(&env).unwrap());

        let snapshot = projection.get(product_id.0).unwrap();
        assert_eq!(snapshot.name(), "Kettle");
        assert_eq!(projection.list().len(), 1);
    }

    #[test]
    fn deleted_aggregates_leave_the_read_model() {
        let projection = AggregateProjection::<Product>::in_memory();
        let product_id = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(product_id.0, 1, &created(product_id)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                product_id.0,
                2,
                &ProductEvent::ProductDeleted(ProductDeleted {
                    product_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert!(projection.get(product_id.0).is_none());
    }

    #[test]
    fn other_stream_types_are_ignored() {
        let projection = AggregateProjection::<Product>::in_memory();
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(),
            "vehicles.vehicle",
            1,
            "vehicles.vehicle.created",
            Utc::now(),
            serde_json::json!({}),
        );

        assert!(!projection.apply_envelope(&env).unwrap());
    }

    #[test]
    fn gaps_are_reported() {
        let projection = AggregateProjection::<Product>::in_memory();
        let product_id = ProductId::new(AggregateId::new());

        let err = projection
            .apply_envelope(&envelope(product_id.0, 3, &created(product_id)))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::SequenceGap { .. }));
    }
}
