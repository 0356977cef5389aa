//! Sales ledger and period summaries.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storefront_events::EventEnvelope;
use storefront_sales::{PeriodSummary, Sale, SalesTotal, summary};

use super::ProjectionError;
use super::aggregate::AggregateProjection;

#[derive(Debug)]
pub struct SalesLedger {
    snapshots: AggregateProjection<Sale>,
}

impl Default for SalesLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SalesLedger {
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

    fn dated_amounts(&self) -> Vec<(DateTime<Utc>, u64)> {
        self.snapshots
            .list()
            .into_iter()
            .filter_map(|s| s.date().map(|d| (d, s.amount())))
            .collect()
    }

    pub fn by_day(&self) -> Vec<PeriodSummary> {
        let sales = self.dated_amounts();
        summary::by_day(sales.iter().map(|(d, a)| (d, *a)))
    }

    pub fn by_month(&self) -> Vec<PeriodSummary> {
        let sales = self.dated_amounts();
        summary::by_month(sales.iter().map(|(d, a)| (d, *a)))
    }

    pub fn total(&self) -> SalesTotal {
        let sales = self.dated_amounts();
        summary::total(sales.iter().map(|(d, a)| (d, *a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    use storefront_core::AggregateId;
    use storefront_sales::{OrderId, SaleEvent, SaleId, SaleRecorded};

    fn record(ledger: &SalesLedger, amount: u64, date: DateTime<Utc>) {
        let sale_id = SaleId::new(AggregateId::new());
        let event = SaleEvent::SaleRecorded(SaleRecorded {
            sale_id,
            order_id: OrderId::new(AggregateId::new()),
            amount,
            date,
            occurred_at: Utc::now(),
        });
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            sale_id.0,
            Sale::AGGREGATE_TYPE,
            1,
            "sales.sale.recorded",
            Utc::now(),
            serde_json::to_value(&event).unwrap(),
        );
        ledger.apply_envelope(&envelope).unwrap();
    }

    #[test]
    fn summaries_group_recorded_sales() {
        let ledger = SalesLedger::new();
        assert_eq!(ledger.total(), SalesTotal::default());

        record(&ledger, 100, Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap());
        record(&ledger, 50, Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap());
        record(&ledger, 25, Utc.with_ymd_and_hms(2024, 3, 2, 20, 0, 0).unwrap());
        record(&ledger, 10, Utc.with_ymd_and_hms(2024, 4, 5, 8, 0, 0).unwrap());

        let days: Vec<_> = ledger.by_day().into_iter().map(|p| (p.period, p.total_sales, p.count)).collect();
        assert_eq!(
            days,
            vec![
                ("2024-03-01".to_string(), 50, 1),
                ("2024-03-02".to_string(), 125, 2),
                ("2024-04-05".to_string(), 10, 1),
            ]
        );

        let months: Vec<_> = ledger.by_month().into_iter().map(|p| (p.period, p.count)).collect();
        assert_eq!(months, vec![("2024-03".to_string(), 3), ("2024-04".to_string(), 1)]);

        assert_eq!(
            ledger.total(),
            SalesTotal {
                total_sales: 185,
                count: 4
            }
        );
    }
}
