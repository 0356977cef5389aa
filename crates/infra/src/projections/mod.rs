//! Read-model projections.
//!
//! Projections fold committed events into query-optimized views. They are
//! disposable (rebuilt from `EventStore::load_all` at startup) and
//! idempotent: each keeps a per-stream cursor, so an envelope delivered
//! twice is applied once.

pub mod aggregate;
pub mod cursor;
pub mod orders;
pub mod products;
pub mod sales;
pub mod users;
pub mod vehicles;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use storefront_core::AggregateId;
use storefront_events::EventEnvelope;

use crate::event_store::{EventStore, EventStoreError, StoredEvent};

pub use aggregate::{AggregateProjection, Projected};
pub use cursor::StreamCursors;
pub use orders::OrderHistory;
pub use products::{ProductCatalog, ProductFilter};
pub use sales::SalesLedger;
pub use users::UserDirectory;
pub use vehicles::{VehicleFilter, VehicleListings};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("sequence gap in stream {aggregate_id} (last={last}, found={found})")]
    SequenceGap {
        aggregate_id: AggregateId,
        last: u64,
        found: u64,
    },

    #[error("projection lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// Every read model the HTTP layer queries.
#[derive(Debug, Default)]
pub struct ReadModels {
    pub products: ProductCatalog,
    pub users: UserDirectory,
    pub vehicles: VehicleListings,
    pub orders: OrderHistory,
    pub sales: SalesLedger,
}

impl ReadModels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route an envelope to the projection owning its stream type.
    /// Envelopes nobody projects (payment intents, invoices, tracking) are
    /// accepted and ignored.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.products.apply_envelope(envelope)?;
        self.users.apply_envelope(envelope)?;
        self.vehicles.apply_envelope(envelope)?;
        self.orders.apply_envelope(envelope)?;
        self.sales.apply_envelope(envelope)?;
        Ok(())
    }

    /// Apply events a handler just committed, ahead of the bus worker.
    ///
    /// Failures are logged only: the worker delivers the same envelopes and
    /// the cursors make the second application a no-op.
    pub fn apply_committed(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(err) = self.apply_envelope(&stored.to_envelope()) {
                warn!(
                    aggregate_id = %stored.aggregate_id,
                    sequence_number = stored.sequence_number,
                    error = %err,
                    "inline projection update failed"
                );
            }
        }
    }

    pub fn reset(&self) {
        self.products.reset();
        self.users.reset();
        self.vehicles.reset();
        self.orders.reset();
        self.sales.reset();
    }

    /// Clear every view and replay the full event log in commit order.
    /// Returns the number of events replayed.
    pub async fn rebuild<S>(&self, store: &S) -> Result<usize, ProjectionError>
    where
        S: EventStore + ?Sized,
    {
        self.reset();
        let events = store.load_all().await?;
        for stored in &events {
            self.apply_envelope(&stored.to_envelope())?;
        }
        info!(events = events.len(), "read models rebuilt");
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    use storefront_core::{AggregateRoot, UserId};
    use storefront_events::InMemoryEventBus;
    use storefront_products::{AddToFavourites, CreateProduct, Product, ProductCommand, ProductId};

    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::InMemoryEventStore;

    fn create_cmd(product_id: ProductId) -> ProductCommand {
        ProductCommand::CreateProduct(CreateProduct {
            product_id,
            name: "Blender".to_string(),
            description: "600W".to_string(),
            price: Some(75),
            category: "kitchen".to_string(),
            brand: "Whirl".to_string(),
            stock: Some(4),
            images: vec!["b.png".to_string()],
            occurred_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn rebuild_replays_the_store_and_inline_updates_are_idempotent() {
        let store = Arc::new(InMemoryEventStore::new());
        let dispatcher = CommandDispatcher::new(
            store.clone(),
            Arc::new(InMemoryEventBus::<EventEnvelope<JsonValue>>::new()),
        );
        let product_id = ProductId::new(AggregateId::new());
        let make = |id| Product::empty(ProductId::new(id));

        let created = dispatcher
            .dispatch(product_id.0, Product::AGGREGATE_TYPE, create_cmd(product_id), make)
            .await
            .unwrap();
        let favourited = dispatcher
            .dispatch(
                product_id.0,
                Product::AGGREGATE_TYPE,
                ProductCommand::AddToFavourites(AddToFavourites {
                    product_id,
                    user_id: UserId::new(),
                    occurred_at: Utc::now(),
                }),
                make,
            )
            .await
            .unwrap();

        let models = ReadModels::new();
        models.apply_committed(&created);
        models.apply_committed(&created);
        models.apply_committed(&favourited);
        assert_eq!(models.products.get(product_id).unwrap().version(), 2);

        let rebuilt = ReadModels::new();
        assert_eq!(rebuilt.rebuild(store.as_ref()).await.unwrap(), 2);
        let product = rebuilt.products.get(product_id).unwrap();
        assert_eq!(product.favourites().len(), 1);
        assert_eq!(product.version(), 2);
    }
}
