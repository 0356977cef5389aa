//! Order history queries.

use serde_json::Value as JsonValue;

use storefront_core::UserId;
use storefront_events::EventEnvelope;
use storefront_sales::{Order, OrderId};

use super::ProjectionError;
use super::aggregate::AggregateProjection;

#[derive(Debug)]
pub struct OrderHistory {
    snapshots: AggregateProjection<Order>,
}

impl Default for OrderHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderHistory {
    pub fn new() -> Self {
        Self {
            snapshots: AggregateProjection::in_memory(),
        }
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        self.snapshots.apply_envelope(envelope)
    }

    pub fn reset(&self) {
        self.snapshots.reset();
    }

    pub fn get(&self, order_id: OrderId) -> Option<Order> {
        self.snapshots.get(order_id.0)
    }

    /// Newest first; `user` restricts the list to one customer.
    pub fn list(&self, user: Option<UserId>) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .snapshots
            .list()
            .into_iter()
            .filter(|o| user.is_none_or(|u| o.user_id() == Some(u)))
            .collect();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        orders
    }
}
