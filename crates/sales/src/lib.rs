//! Orders, order tracking and sales (event-sourced).
//!
//! Business rules only: no IO, no HTTP, no storage. Sales summaries are pure
//! functions over recorded sales so that projections and tests share them.

pub mod order;
pub mod sale;
pub mod summary;
pub mod tracking;

pub use order::{
    CreateOrder, Order, OrderCommand, OrderCreated, OrderEvent, OrderId, OrderItem, OrderStatus,
};
pub use sale::{RecordSale, Sale, SaleCommand, SaleEvent, SaleId, SaleRecorded};
pub use summary::{PeriodSummary, SalesTotal, by_day, by_month, total};
pub use tracking::{
    CreateTracking, OrderTracking, TrackingCommand, TrackingCreated, TrackingEntry, TrackingEvent,
    TrackingStatus, TrackingStatusUpdated, UpdateTrackingStatus,
};
