//! Products domain module (event-sourced).
//!
//! The `Product` aggregate owns its reviews, favourites and payments; every
//! change to those sub-collections goes through a `ProductCommand`. The
//! `PaymentIntent` aggregate pins a payment reference to the products it was
//! recorded against.
//!
//! Pure domain logic: no IO, no HTTP, no storage.

pub mod checkout;
pub mod payment;
pub mod product;
pub mod review;
pub mod slug;

pub use checkout::{
    OpenPaymentIntent, PaymentIntent, PaymentIntentCommand, PaymentIntentEvent, PaymentIntentOpened,
    PaymentIntentSettled, SettlePaymentIntent,
};
pub use payment::{Payment, PaymentReference, PaymentStatus};
pub use product::{
    AddReview, AddToFavourites, CreateProduct, DeleteProduct, FavouriteAdded, FavouriteRemoved,
    PaymentReconciled, PaymentRecorded, Product, ProductCommand, ProductCreated, ProductDeleted,
    ProductEvent, ProductId, ProductPatch, ProductUpdated, ReconcilePayment, RecordPayment,
    RemoveFromFavourites, ReviewAdded, UpdateProduct,
};
pub use review::{Rating, RatingSummary, Review};
pub use slug::slugify;
