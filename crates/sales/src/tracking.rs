//! Order tracking: one stream per order, keyed by the order id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use storefront_events::Event;

use crate::order::OrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// One status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub status: TrackingStatus,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTracking {
    id: AggregateId,
    order_id: Option<OrderId>,
    status: TrackingStatus,
    history: Vec<TrackingEntry>,
    version: u64,
    created: bool,
}

impl OrderTracking {
    /// Stream type recorded with every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "sales.tracking";

    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            order_id: None,
            status: TrackingStatus::Pending,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    /// Stream id of the tracking record for `order_id`.
    pub fn id_for(order_id: OrderId) -> AggregateId {
        AggregateId::derived("tracking", &order_id.to_string())
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn status(&self) -> TrackingStatus {
        self.status
    }

    pub fn history(&self) -> &[TrackingEntry] {
        &self.history
    }
}

impl AggregateRoot for OrderTracking {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTracking. `history` seeds prior entries, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTracking {
    pub order_id: OrderId,
    pub status: TrackingStatus,
    pub history: Vec<TrackingEntry>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTrackingStatus {
    pub order_id: OrderId,
    pub status: TrackingStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingCommand {
    Create(CreateTracking),
    UpdateStatus(UpdateTrackingStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingCreated {
    pub tracking_id: AggregateId,
    pub order_id: OrderId,
    pub status: TrackingStatus,
    pub history: Vec<TrackingEntry>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStatusUpdated {
    pub tracking_id: AggregateId,
    pub order_id: OrderId,
    pub status: TrackingStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingEvent {
    TrackingCreated(TrackingCreated),
    TrackingStatusUpdated(TrackingStatusUpdated),
}

impl Event for TrackingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TrackingEvent::TrackingCreated(_) => "sales.tracking.created",
            TrackingEvent::TrackingStatusUpdated(_) => "sales.tracking.status_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TrackingEvent::TrackingCreated(e) => e.occurred_at,
            TrackingEvent::TrackingStatusUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for OrderTracking {
    type Command = TrackingCommand;
    type Event = TrackingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TrackingEvent::TrackingCreated(e) => {
                self.id = e.tracking_id;
                self.order_id = Some(e.order_id);
                self.status = e.status;
                self.history = e.history.clone();
                self.created = true;
            }
            TrackingEvent::TrackingStatusUpdated(e) => {
                self.status = e.status;
                self.history.push(TrackingEntry {
                    status: e.status,
                    date: e.occurred_at,
                });
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TrackingCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("tracking already exists for this order"));
                }
                Ok(vec![TrackingEvent::TrackingCreated(TrackingCreated {
                    tracking_id: OrderTracking::id_for(cmd.order_id),
                    order_id: cmd.order_id,
                    status: cmd.status,
                    history: cmd.history.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            TrackingCommand::UpdateStatus(cmd) => {
                if !self.created || self.order_id != Some(cmd.order_id) {
                    return Err(DomainError::not_found("Tracking not found"));
                }
                // Every update is recorded, including a repeat of the current status.
                Ok(vec![TrackingEvent::TrackingStatusUpdated(TrackingStatusUpdated {
                    tracking_id: self.id,
                    order_id: cmd.order_id,
                    status: cmd.status,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn tracked(order_id: OrderId) -> OrderTracking {
        let mut tracking = OrderTracking::empty(OrderTracking::id_for(order_id));
        execute(
            &mut tracking,
            &TrackingCommand::Create(CreateTracking {
                order_id,
                status: TrackingStatus::default(),
                history: vec![],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        tracking
    }

    fn update(order_id: OrderId, status: TrackingStatus) -> TrackingCommand {
        TrackingCommand::UpdateStatus(UpdateTrackingStatus {
            order_id,
            status,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn status_updates_append_history() {
        let order_id = OrderId::new(AggregateId::new());
        let mut tracking = tracked(order_id);

        execute(&mut tracking, &update(order_id, TrackingStatus::Processing)).unwrap();
        execute(&mut tracking, &update(order_id, TrackingStatus::Shipped)).unwrap();

        assert_eq!(tracking.status(), TrackingStatus::Shipped);
        let statuses: Vec<_> = tracking.history().iter().map(|h| h.status).collect();
        assert_eq!(statuses, vec![TrackingStatus::Processing, TrackingStatus::Shipped]);
    }

    #[test]
    fn second_tracking_for_an_order_conflicts() {
        let order_id = OrderId::new(AggregateId::new());
        let tracking = tracked(order_id);

        let err = tracking
            .handle(&TrackingCommand::Create(CreateTracking {
                order_id,
                status: TrackingStatus::Pending,
                history: vec![],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn updating_missing_tracking_is_not_found() {
        let order_id = OrderId::new(AggregateId::new());
        let tracking = OrderTracking::empty(OrderTracking::id_for(order_id));

        let err = tracking
            .handle(&update(order_id, TrackingStatus::Delivered))
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("Tracking not found"));
    }
}
