use axum::Router;

pub mod invoices;
pub mod orders;
pub mod products;
pub mod sales;
pub mod system;
pub mod tracking;
pub mod users;
pub mod vehicles;

/// Router for every `/api` endpoint. Authentication is resolved by the
/// middleware; each handler decides whether it needs a principal.
pub fn router() -> Router {
    Router::new()
        .nest("/api/user", users::router())
        .nest("/api/products", products::router())
        .nest("/api/vehicles", vehicles::router())
        .nest("/api/vehicle/search", vehicles::search_router())
        .nest("/api/orders", orders::router())
        .nest("/api/tracking", tracking::router())
        .nest("/api/invoices", invoices::router())
        .nest("/api/sales", sales::router())
}
