//! Infrastructure layer: event storage, command dispatch, read models,
//! configuration and the payment gateway client.

pub mod checkout;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod external;
pub mod projections;
pub mod read_model;
pub mod workers;

pub use checkout::{PaymentRequest, reconcile_payment, record_payment};
pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use config::{AppConfig, ConfigError};
pub use projections::{ProjectionError, ReadModels};
