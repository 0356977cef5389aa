use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};

use storefront_auth::User;
use storefront_core::{AggregateRoot, DomainError};
use storefront_infra::projections::{ProductCatalog, UserDirectory};
use storefront_invoicing::Invoice;
use storefront_products::Product;
use storefront_sales::{Order, OrderTracking, TrackingEntry};
use storefront_vehicles::{CreateVehicle, Vehicle, VehiclePatch};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: Option<u64>,
    pub category: String,
    pub brand: String,
    pub stock: Option<u64>,
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddReviewRequest {
    pub comment: String,
    pub rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavouriteRequest {
    pub product_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub cart_items: Vec<String>,
    /// Major currency units.
    pub total_amount: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyPaymentQuery {
    pub reference: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleListQuery {
    pub make: Option<String>,
    pub location: Option<String>,
    pub price: Option<u64>,
    pub year: Option<u32>,
    pub condition: Option<String>,
    pub transmission: Option<String>,
    pub color: Option<String>,
    pub fuel_type: Option<String>,
}

/// Vehicle attributes as sent by clients. Enumerated attributes arrive as
/// strings and are parsed case-insensitively.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VehicleRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u32>,
    pub price: Option<u64>,
    pub mileage: Option<u64>,
    pub condition: Option<String>,
    pub availability: Option<String>,
    pub engine_type: Option<String>,
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub interior_material: Option<String>,
    pub quantity: Option<u32>,
    pub location: Option<String>,
    pub images: Option<Vec<String>>,
}

pub(crate) fn parse_opt<T>(raw: Option<String>) -> Result<Option<T>, DomainError>
where
    T: core::str::FromStr<Err = DomainError>,
{
    // Blank enumerated values count as missing.
    raw.filter(|v| !v.trim().is_empty()).map(|v| v.parse()).transpose()
}

impl VehicleRequest {
    pub fn into_create(self) -> Result<CreateVehicle, DomainError> {
        Ok(CreateVehicle {
            make: self.make,
            model: self.model,
            year: self.year,
            price: self.price,
            mileage: self.mileage,
            condition: parse_opt(self.condition)?,
            availability: parse_opt(self.availability)?,
            engine_type: self.engine_type,
            transmission: parse_opt(self.transmission)?,
            fuel_type: parse_opt(self.fuel_type)?,
            exterior_color: self.exterior_color,
            interior_color: self.interior_color,
            interior_material: parse_opt(self.interior_material)?,
            quantity: self.quantity,
            location: self.location,
            images: self.images.unwrap_or_default(),
        })
    }

    pub fn into_patch(self) -> Result<VehiclePatch, DomainError> {
        Ok(VehiclePatch {
            make: self.make,
            model: self.model,
            year: self.year,
            price: self.price,
            mileage: self.mileage,
            condition: parse_opt(self.condition)?,
            availability: parse_opt(self.availability)?,
            engine_type: self.engine_type,
            transmission: parse_opt(self.transmission)?,
            fuel_type: parse_opt(self.fuel_type)?,
            exterior_color: self.exterior_color,
            interior_color: self.interior_color,
            interior_material: parse_opt(self.interior_material)?,
            quantity: self.quantity,
            location: self.location,
            images: self.images,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product: String,
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub products: Vec<OrderItemRequest>,
    pub status: Option<String>,
    pub total_amount: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TrackingEntryRequest {
    pub status: String,
    pub date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateTrackingRequest {
    pub order: String,
    pub status: Option<String>,
    pub history: Vec<TrackingEntryRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub order_id: String,
    pub invoice_number: String,
    pub amount: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub order_id: String,
    pub amount: Option<u64>,
    pub date: Option<chrono::DateTime<chrono::Utc>>,
}

/// Parse a status-like enum by its serialized name, ignoring case.
pub fn parse_wire<T: DeserializeOwned>(field: &str, raw: &str, names: &[&str]) -> Result<T, DomainError> {
    let raw = raw.trim();
    let name = names
        .iter()
        .find(|n| n.eq_ignore_ascii_case(raw))
        .ok_or_else(|| DomainError::validation(format!("invalid {field}: '{raw}'")))?;
    serde_json::from_value(JsonValue::String((*name).to_string()))
        .map_err(|e| DomainError::validation(format!("invalid {field}: {e}")))
}

// -------------------------
// Response mapping
// -------------------------

pub fn user_to_json(user: &User) -> JsonValue {
    json!({
        "id": user.id().to_string(),
        "name": user.name(),
        "email": user.email(),
        "role": user.role().as_str(),
        "authProvider": user.auth_provider(),
        "image": user.image(),
        "createdAt": user.created_at(),
    })
}

/// `{id, name, email}`, or just `{id}` when the user is unknown.
fn user_ref(users: &UserDirectory, user_id: storefront_core::UserId) -> JsonValue {
    match users.get(user_id) {
        Some(user) => json!({ "id": user_id.to_string(), "name": user.name(), "email": user.email() }),
        None => json!({ "id": user_id.to_string() }),
    }
}

pub fn product_to_json(product: &Product) -> JsonValue {
    json!({
        "id": product.id_typed().to_string(),
        "name": product.name(),
        "slug": product.slug(),
        "description": product.description(),
        "price": product.price(),
        "category": product.category(),
        "brand": product.brand(),
        "stock": product.stock(),
        "images": product.images(),
        "rating": product.rating(),
        "numReviews": product.reviews().len(),
        "reviews": product.reviews().iter().map(|r| json!({
            "user": r.user.to_string(),
            "comment": r.comment,
            "rating": r.rating.value(),
            "createdAt": r.created_at,
        })).collect::<Vec<_>>(),
        "favourites": product.favourites().iter().map(|u| u.to_string()).collect::<Vec<_>>(),
        "payments": product.payments().iter().map(|p| json!({
            "user": p.user.to_string(),
            "amount": p.amount,
            "reference": p.reference.as_str(),
            "status": p.status.as_str(),
            "createdAt": p.created_at,
        })).collect::<Vec<_>>(),
        "createdAt": product.created_at(),
        "updatedAt": product.updated_at(),
    })
}

/// Reviews with the reviewer's name and email joined in.
pub fn reviews_to_json(product: &Product, users: &UserDirectory) -> JsonValue {
    JsonValue::Array(
        product
            .reviews()
            .iter()
            .map(|r| {
                json!({
                    "user": user_ref(users, r.user),
                    "comment": r.comment,
                    "rating": r.rating.value(),
                    "createdAt": r.created_at,
                })
            })
            .collect(),
    )
}

pub fn vehicle_to_json(vehicle: &Vehicle) -> JsonValue {
    let mut body = json!({
        "id": vehicle.id_typed().to_string(),
        "owner": vehicle.owner().map(|u| u.to_string()),
        "createdAt": vehicle.created_at(),
        "updatedAt": vehicle.updated_at(),
    });
    if let (Some(d), Some(map)) = (vehicle.details(), body.as_object_mut()) {
        let details = json!({
            "make": d.make,
            "model": d.model,
            "year": d.year,
            "price": d.price,
            "mileage": d.mileage,
            "condition": d.condition.as_str(),
            "availability": d.availability.as_str(),
            "engineType": d.engine_type,
            "transmission": d.transmission.as_str(),
            "fuelType": d.fuel_type.as_str(),
            "exteriorColor": d.exterior_color,
            "interiorColor": d.interior_color,
            "interiorMaterial": d.interior_material.as_str(),
            "quantity": d.quantity,
            "location": d.location,
            "images": d.images,
        });
        if let JsonValue::Object(details) = details {
            map.extend(details);
        }
    }
    body
}

/// Order with the buyer and each product's name and price joined in.
pub fn order_to_json(order: &Order, users: &UserDirectory, products: &ProductCatalog) -> JsonValue {
    json!({
        "id": order.id_typed().to_string(),
        "user": order.user_id().map(|u| user_ref(users, u)),
        "products": order.items().iter().map(|item| {
            let product = match products.get(item.product_id) {
                Some(p) => json!({ "id": item.product_id.to_string(), "name": p.name(), "price": p.price() }),
                None => json!({ "id": item.product_id.to_string() }),
            };
            json!({ "product": product, "quantity": item.quantity })
        }).collect::<Vec<_>>(),
        "status": order.status(),
        "totalAmount": order.total_amount(),
        "createdAt": order.created_at(),
    })
}

pub fn tracking_history_to_json(history: &[TrackingEntry]) -> JsonValue {
    JsonValue::Array(
        history
            .iter()
            .map(|h| json!({ "status": h.status, "date": h.date }))
            .collect(),
    )
}

pub fn tracking_to_json(tracking: &OrderTracking) -> JsonValue {
    json!({
        "order": tracking.order_id().map(|o| o.to_string()),
        "status": tracking.status(),
        "history": tracking_history_to_json(tracking.history()),
    })
}

/// Invoice with its order joined in when the order is known.
pub fn invoice_to_json(invoice: &Invoice, order: Option<JsonValue>) -> JsonValue {
    let order = order.unwrap_or_else(|| json!(invoice.order_id().map(|o| o.to_string())));
    json!({
        "id": invoice.id_typed().to_string(),
        "order": order,
        "invoiceNumber": invoice.invoice_number(),
        "amount": invoice.amount(),
        "issuedDate": invoice.issued_date(),
        "status": invoice.status(),
    })
}
