use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tracing::info;

use storefront_auth::Permission;
use storefront_core::{AggregateId, DomainError};
use storefront_infra::PaymentRequest;
use storefront_infra::external::InitializeTransaction;
use storefront_infra::projections::ProductFilter;
use storefront_products::{
    AddReview, AddToFavourites, CreateProduct, DeleteProduct, PaymentReference, Product, ProductCommand,
    ProductId, ProductPatch, RemoveFromFavourites, UpdateProduct, slugify,
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/search", get(search_products))
        .route("/checkout", post(checkout))
        .route("/verify-payment", get(verify_payment))
        .route("/favourites", get(list_favourites).post(add_favourite))
        .route("/favourites/:id", delete(remove_favourite))
        .route("/:id", get(get_product).patch(update_product).delete(delete_product))
        .route("/:id/reviews", get(list_reviews).post(add_review))
}

/// Sub-collections that change only through their own endpoints.
const UNPATCHABLE: [&str; 3] = ["reviews", "favourites", "payments"];

fn product(id: AggregateId) -> Product {
    Product::empty(ProductId::new(id))
}

fn parse_product_id(raw: &str) -> Result<ProductId, ApiError> {
    let id: AggregateId = raw.parse()?;
    Ok(ProductId::new(id))
}

/// Rehydrate a live product or answer 404.
async fn load_product(services: &AppServices, product_id: ProductId) -> Result<Product, ApiError> {
    let product: Product = services.load(product_id.0, product).await?;
    if !product.exists() {
        return Err(ApiError::not_found("Product not found!"));
    }
    Ok(product)
}

async fn dispatch_product(
    services: &AppServices,
    product_id: ProductId,
    command: ProductCommand,
) -> Result<(), ApiError> {
    if !services.read_models().products.contains(product_id.0) {
        return Err(ApiError::not_found("Product not found!"));
    }
    services
        .dispatch(product_id.0, Product::AGGREGATE_TYPE, command, product)
        .await?;
    Ok(())
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::ProductListQuery>,
) -> Response {
    let filter = ProductFilter {
        category: q.category,
        brand: q.brand,
        max_price: q.price,
    };
    let items = services
        .read_models()
        .products
        .list(&filter)
        .iter()
        .map(dto::product_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(items)).into_response()
}

pub async fn search_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::SearchQuery>,
) -> Result<Response, ApiError> {
    let items = services.read_models().products.search(&q.query);
    if items.is_empty() {
        return Err(ApiError::not_found("No products found!"));
    }
    let items = items.iter().map(dto::product_to_json).collect::<Vec<_>>();
    Ok((StatusCode::OK, Json(items)).into_response())
}

/// `key` is a slug; a product id is accepted as well.
pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let catalog = &services.read_models().products;
    let found = catalog
        .id_by_slug(&key)
        .or_else(|| key.parse::<AggregateId>().ok().map(ProductId::new))
        .and_then(|id| catalog.get(id));

    match found {
        Some(p) => Ok((StatusCode::OK, Json(dto::product_to_json(&p))).into_response()),
        None => Err(ApiError::not_found("Product not found!")),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Json(body): Json<dto::CreateProductRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::PRODUCTS_WRITE)?;

    let slug = slugify(&body.name);
    if !slug.is_empty() && services.read_models().products.slug_in_use(&slug) {
        return Err(DomainError::conflict(format!("slug '{slug}' is already in use")).into());
    }

    let product_id = ProductId::new(AggregateId::new());
    let cmd = ProductCommand::CreateProduct(CreateProduct {
        product_id,
        name: body.name,
        description: body.description,
        price: body.price,
        category: body.category,
        brand: body.brand,
        stock: body.stock,
        images: body.images,
        occurred_at: Utc::now(),
    });
    services
        .dispatch(product_id.0, Product::AGGREGATE_TYPE, cmd, product)
        .await?;

    let created = load_product(&services, product_id).await?;
    info!(product_id = %product_id, slug = created.slug(), "product created");
    Ok((StatusCode::CREATED, Json(dto::product_to_json(&created))).into_response())
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::PRODUCTS_WRITE)?;
    let product_id = parse_product_id(&id)?;

    if let Some(field) = UNPATCHABLE.iter().find(|k| body.get(**k).is_some()) {
        return Err(DomainError::validation(format!("{field} cannot be updated here")).into());
    }
    let patch: ProductPatch = serde_json::from_value(body)
        .map_err(|e| DomainError::validation(format!("invalid product update: {e}")))?;

    dispatch_product(
        &services,
        product_id,
        ProductCommand::UpdateProduct(UpdateProduct {
            product_id,
            patch,
            occurred_at: Utc::now(),
        }),
    )
    .await?;

    let updated = load_product(&services, product_id).await?;
    Ok((StatusCode::OK, Json(dto::product_to_json(&updated))).into_response())
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::PRODUCTS_WRITE)?;
    let product_id = parse_product_id(&id)?;

    dispatch_product(
        &services,
        product_id,
        ProductCommand::DeleteProduct(DeleteProduct {
            product_id,
            occurred_at: Utc::now(),
        }),
    )
    .await?;

    info!(product_id = %product_id, "product deleted");
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Product deleted", "id": product_id.to_string() })),
    )
        .into_response())
}

pub async fn add_review(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    Json(body): Json<dto::AddReviewRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::PRODUCTS_REVIEW)?;
    let product_id = parse_product_id(&id)?;
    let rating = body
        .rating
        .ok_or_else(|| DomainError::MissingFields(vec!["rating".to_string()]))?;

    dispatch_product(
        &services,
        product_id,
        ProductCommand::AddReview(AddReview {
            product_id,
            user_id: principal.user_id(),
            comment: body.comment,
            rating,
            occurred_at: Utc::now(),
        }),
    )
    .await?;

    let reviewed = load_product(&services, product_id).await?;
    Ok((StatusCode::OK, Json(dto::product_to_json(&reviewed))).into_response())
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let product_id = parse_product_id(&id)?;
    let product = load_product(&services, product_id).await?;
    let reviews = dto::reviews_to_json(&product, &services.read_models().users);
    Ok((StatusCode::OK, Json(reviews)).into_response())
}

pub async fn add_favourite(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Json(body): Json<dto::FavouriteRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::FAVOURITES_WRITE)?;
    let product_id = parse_product_id(&body.product_id)?;

    dispatch_product(
        &services,
        product_id,
        ProductCommand::AddToFavourites(AddToFavourites {
            product_id,
            user_id: principal.user_id(),
            occurred_at: Utc::now(),
        }),
    )
    .await?;

    let product = load_product(&services, product_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Added to favourites", "product": dto::product_to_json(&product) })),
    )
        .into_response())
}

pub async fn list_favourites(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> Response {
    let items = services
        .read_models()
        .products
        .favourites_of(principal.user_id())
        .iter()
        .map(dto::product_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(items)).into_response()
}

pub async fn remove_favourite(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::FAVOURITES_WRITE)?;
    let product_id = parse_product_id(&id)?;

    dispatch_product(
        &services,
        product_id,
        ProductCommand::RemoveFromFavourites(RemoveFromFavourites {
            product_id,
            user_id: principal.user_id(),
            occurred_at: Utc::now(),
        }),
    )
    .await?;

    let product = load_product(&services, product_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Removed from favourites", "product": dto::product_to_json(&product) })),
    )
        .into_response())
}

/// Opens a gateway transaction for the cart and records a pending payment
/// on each product in it.
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Json(body): Json<dto::CheckoutRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::CHECKOUT)?;

    let mut missing = Vec::new();
    if body.cart_items.is_empty() {
        missing.push("cartItems");
    }
    let total_amount = body.total_amount.filter(|a| *a > 0);
    if total_amount.is_none() {
        missing.push("totalAmount");
    }
    if let Some(err) = DomainError::missing_fields(missing) {
        return Err(err.into());
    }
    let total_amount = total_amount.unwrap_or_default();

    let product_ids = body
        .cart_items
        .iter()
        .map(|raw| parse_product_id(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let minor_units = total_amount
        .checked_mul(100)
        .ok_or_else(|| DomainError::validation("totalAmount is too large"))?;

    let now = Utc::now();
    let reference = PaymentReference::generate(now);
    let initialized = services
        .gateway()
        .initialize(InitializeTransaction {
            email: principal.email().to_string(),
            amount: minor_units,
            reference: reference.clone(),
            callback_url: services.settings().paystack_callback_url.clone(),
        })
        .await?;

    services
        .record_payment(PaymentRequest {
            reference: reference.clone(),
            user_id: principal.user_id(),
            amount: total_amount,
            product_ids,
            occurred_at: now,
        })
        .await?;

    info!(reference = %reference, user_id = %principal.user_id(), amount = total_amount, "checkout started");
    Ok((
        StatusCode::OK,
        Json(json!({
            "paymentUrl": initialized.authorization_url,
            "reference": reference.as_str(),
        })),
    )
        .into_response())
}

/// Asks the gateway for the outcome of `reference` and reconciles it.
pub async fn verify_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::VerifyPaymentQuery>,
) -> Result<Response, ApiError> {
    if q.reference.trim().is_empty() {
        return Err(DomainError::MissingFields(vec!["reference".to_string()]).into());
    }
    let reference = PaymentReference::parse(&q.reference)?;

    let verified = services.gateway().verify(&reference).await?;
    services
        .reconcile_payment(&reference, verified.status, Utc::now())
        .await?;

    info!(reference = %reference, status = verified.status.as_str(), "payment verified");
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": verified.status.as_str(),
            "gatewayStatus": verified.gateway_status,
        })),
    )
        .into_response())
}
