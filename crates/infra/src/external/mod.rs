//! External service clients.

pub mod paystack;

pub use paystack::{
    GatewayError, InitializeTransaction, InitializedTransaction, PaymentGateway, PaystackGateway,
    VerifiedTransaction,
};
