use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use storefront_events::Event;

use crate::order::OrderId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A completed sale against an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    order_id: Option<OrderId>,
    amount: u64,
    date: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Sale {
    /// Stream type recorded with every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "sales.sale";

    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            order_id: None,
            amount: 0,
            date: None,
            version: 0,
            created: false,
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordSale. `date` is the business date used for summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleId,
    pub order_id: OrderId,
    pub amount: u64,
    pub date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordSale(RecordSale),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub order_id: OrderId,
    pub amount: u64,
    pub date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleRecorded(SaleRecorded),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleRecorded(_) => "sales.sale.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleRecorded(e) => {
                self.id = e.sale_id;
                self.order_id = Some(e.order_id);
                self.amount = e.amount;
                self.date = Some(e.date);
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordSale(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("sale already recorded"));
                }
                Ok(vec![SaleEvent::SaleRecorded(SaleRecorded {
                    sale_id: cmd.sale_id,
                    order_id: cmd.order_id,
                    amount: cmd.amount,
                    date: cmd.date,
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

    #[test]
    fn record_sale_sets_amount_and_date() {
        let sale_id = SaleId::new(AggregateId::new());
        let mut sale = Sale::empty(sale_id);
        let date = Utc::now();

        execute(
            &mut sale,
            &SaleCommand::RecordSale(RecordSale {
                sale_id,
                order_id: OrderId::new(AggregateId::new()),
                amount: 4_200,
                date,
                occurred_at: date,
            }),
        )
        .unwrap();

        assert_eq!(sale.amount(), 4_200);
        assert_eq!(sale.date(), Some(date));
        assert_eq!(sale.version(), 1);
    }
}
