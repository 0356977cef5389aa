use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use storefront_events::Event;

use crate::payment::{Payment, PaymentReference, PaymentStatus};
use crate::review::{Rating, RatingSummary, Review};
use crate::slug::slugify;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Aggregate root: Product.
///
/// Owns three sub-collections:
/// - `reviews`: ordered, at most one per user;
/// - `favourites`: a set of users;
/// - `payments`: ordered, unique by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    price: u64,
    category: String,
    brand: String,
    stock: u64,
    images: Vec<String>,
    reviews: Vec<Review>,
    rating: RatingSummary,
    favourites: Vec<UserId>,
    payments: Vec<Payment>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Product {
    /// Stream type recorded with every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "products.product";

    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            price: 0,
            category: String::new(),
            brand: String::new(),
            stock: 0,
            images: Vec::new(),
            reviews: Vec::new(),
            rating: RatingSummary::default(),
            favourites: Vec::new(),
            payments: Vec::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    /// Created and not deleted.
    pub fn exists(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn stock(&self) -> u64 {
        self.stock
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    /// Mean review rating, one decimal place.
    pub fn rating(&self) -> f64 {
        self.rating.average()
    }

    pub fn favourites(&self) -> &[UserId] {
        &self.favourites
    }

    pub fn is_favourite_of(&self, user: UserId) -> bool {
        self.favourites.contains(&user)
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn payment(&self, reference: &PaymentReference) -> Option<&Payment> {
        self.payments.iter().find(|p| &p.reference == reference)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// Commands

/// Command: CreateProduct.
///
/// `price` and `stock` are optional so that a missing value can be reported
/// alongside missing text fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Option<u64>,
    pub category: String,
    pub brand: String,
    pub stock: Option<u64>,
    pub images: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update of descriptive attributes.
///
/// Reviews, favourites and payments are deliberately absent: they change only
/// through their own commands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<u64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub stock: Option<u64>,
    pub images: Option<Vec<String>>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self == &ProductPatch::default()
    }
}

/// Command: UpdateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    pub patch: ProductPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddReview. `rating` is validated by the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub comment: String,
    pub rating: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddToFavourites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddToFavourites {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveFromFavourites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveFromFavourites {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment (appends a pending payment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub amount: u64,
    pub reference: PaymentReference,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReconcilePayment (sets the status reported by the gateway).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePayment {
    pub product_id: ProductId,
    pub reference: PaymentReference,
    pub status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    DeleteProduct(DeleteProduct),
    AddReview(AddReview),
    AddToFavourites(AddToFavourites),
    RemoveFromFavourites(RemoveFromFavourites),
    RecordPayment(RecordPayment),
    ReconcilePayment(ReconcilePayment),
}

// Events

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: u64,
    pub category: String,
    pub brand: String,
    pub stock: u64,
    pub images: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated. `slug` is set when the name changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub patch: ProductPatch,
    pub slug: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReviewAdded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAdded {
    pub product_id: ProductId,
    pub review: Review,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FavouriteAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavouriteAdded {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FavouriteRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavouriteRemoved {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub product_id: ProductId,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentReconciled. Keeps the prior status as an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReconciled {
    pub product_id: ProductId,
    pub reference: PaymentReference,
    pub previous_status: PaymentStatus,
    pub status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductDeleted(ProductDeleted),
    ReviewAdded(ReviewAdded),
    FavouriteAdded(FavouriteAdded),
    FavouriteRemoved(FavouriteRemoved),
    PaymentRecorded(PaymentRecorded),
    PaymentReconciled(PaymentReconciled),
}

impl ProductEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::ProductDeleted(e) => e.product_id,
            ProductEvent::ReviewAdded(e) => e.product_id,
            ProductEvent::FavouriteAdded(e) => e.product_id,
            ProductEvent::FavouriteRemoved(e) => e.product_id,
            ProductEvent::PaymentRecorded(e) => e.product_id,
            ProductEvent::PaymentReconciled(e) => e.product_id,
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ProductUpdated(_) => "products.product.updated",
            ProductEvent::ProductDeleted(_) => "products.product.deleted",
            ProductEvent::ReviewAdded(_) => "products.product.review_added",
            ProductEvent::FavouriteAdded(_) => "products.product.favourite_added",
            ProductEvent::FavouriteRemoved(_) => "products.product.favourite_removed",
            ProductEvent::PaymentRecorded(_) => "products.product.payment_recorded",
            ProductEvent::PaymentReconciled(_) => "products.product.payment_reconciled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
            ProductEvent::ReviewAdded(e) => e.occurred_at,
            ProductEvent::FavouriteAdded(e) => e.occurred_at,
            ProductEvent::FavouriteRemoved(e) => e.occurred_at,
            ProductEvent::PaymentRecorded(e) => e.occurred_at,
            ProductEvent::PaymentReconciled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.slug = e.slug.clone();
                self.description = e.description.clone();
                self.price = e.price;
                self.category = e.category.clone();
                self.brand = e.brand.clone();
                self.stock = e.stock;
                self.images = e.images.clone();
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                let p = &e.patch;
                if let Some(name) = &p.name {
                    self.name = name.clone();
                }
                if let Some(slug) = &e.slug {
                    self.slug = slug.clone();
                }
                if let Some(description) = &p.description {
                    self.description = description.clone();
                }
                if let Some(price) = p.price {
                    self.price = price;
                }
                if let Some(category) = &p.category {
                    self.category = category.clone();
                }
                if let Some(brand) = &p.brand {
                    self.brand = brand.clone();
                }
                if let Some(stock) = p.stock {
                    self.stock = stock;
                }
                if let Some(images) = &p.images {
                    self.images = images.clone();
                }
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::ProductDeleted(e) => {
                self.deleted = true;
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::ReviewAdded(e) => {
                self.rating.record(e.review.rating);
                self.reviews.push(e.review.clone());
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::FavouriteAdded(e) => {
                if !self.favourites.contains(&e.user_id) {
                    self.favourites.push(e.user_id);
                }
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::FavouriteRemoved(e) => {
                self.favourites.retain(|u| *u != e.user_id);
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::PaymentRecorded(e) => {
                self.payments.push(e.payment.clone());
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::PaymentReconciled(e) => {
                if let Some(p) = self.payments.iter_mut().find(|p| p.reference == e.reference) {
                    p.status = e.status;
                }
                self.updated_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::DeleteProduct(cmd) => self.handle_delete(cmd),
            ProductCommand::AddReview(cmd) => self.handle_add_review(cmd),
            ProductCommand::AddToFavourites(cmd) => self.handle_add_favourite(cmd),
            ProductCommand::RemoveFromFavourites(cmd) => self.handle_remove_favourite(cmd),
            ProductCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            ProductCommand::ReconcilePayment(cmd) => self.handle_reconcile_payment(cmd),
        }
    }
}

impl Product {
    fn ensure_exists(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found("product"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        let mut missing = Vec::new();
        for (field, value) in [
            ("name", &cmd.name),
            ("description", &cmd.description),
            ("category", &cmd.category),
            ("brand", &cmd.brand),
        ] {
            if value.trim().is_empty() {
                missing.push(field);
            }
        }
        if cmd.price.is_none() {
            missing.push("price");
        }
        if cmd.stock.is_none() {
            missing.push("stock");
        }
        if cmd.images.iter().all(|i| i.trim().is_empty()) {
            missing.push("images");
        }
        if let Some(err) = DomainError::missing_fields(missing) {
            return Err(err);
        }

        let slug = slugify(&cmd.name);
        if slug.is_empty() {
            return Err(DomainError::validation("name must contain letters or digits"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            name: cmd.name.trim().to_string(),
            slug,
            description: cmd.description.trim().to_string(),
            price: cmd.price.unwrap_or_default(),
            category: cmd.category.trim().to_string(),
            brand: cmd.brand.trim().to_string(),
            stock: cmd.stock.unwrap_or_default(),
            images: cmd.images.iter().filter(|i| !i.trim().is_empty()).cloned().collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if cmd.patch.is_empty() {
            return Ok(vec![]);
        }

        let mut patch = cmd.patch.clone();
        for (field, value) in [
            ("name", &mut patch.name),
            ("description", &mut patch.description),
            ("category", &mut patch.category),
            ("brand", &mut patch.brand),
        ] {
            if let Some(v) = value {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::validation(format!("{field} cannot be empty")));
                }
                *v = trimmed.to_string();
            }
        }
        if let Some(images) = &patch.images {
            if images.iter().all(|i| i.trim().is_empty()) {
                return Err(DomainError::validation("images cannot be empty"));
            }
        }

        let slug = match &patch.name {
            Some(name) if *name != self.name => {
                let slug = slugify(name);
                if slug.is_empty() {
                    return Err(DomainError::validation("name must contain letters or digits"));
                }
                Some(slug)
            }
            _ => None,
        };

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            product_id: cmd.product_id,
            patch,
            slug,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        Ok(vec![ProductEvent::ProductDeleted(ProductDeleted {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_review(&self, cmd: &AddReview) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        let rating = Rating::new(cmd.rating)?;
        if self.reviews.iter().any(|r| r.user == cmd.user_id) {
            return Err(DomainError::duplicate("You have already reviewed this product"));
        }

        Ok(vec![ProductEvent::ReviewAdded(ReviewAdded {
            product_id: cmd.product_id,
            review: Review {
                user: cmd.user_id,
                comment: cmd.comment.trim().to_string(),
                rating,
                created_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_favourite(&self, cmd: &AddToFavourites) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if self.is_favourite_of(cmd.user_id) {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::FavouriteAdded(FavouriteAdded {
            product_id: cmd.product_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_favourite(
        &self,
        cmd: &RemoveFromFavourites,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if !self.is_favourite_of(cmd.user_id) {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::FavouriteRemoved(FavouriteRemoved {
            product_id: cmd.product_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        // Redelivery of the same reference is a no-op.
        if self.payment(&cmd.reference).is_some() {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::PaymentRecorded(PaymentRecorded {
            product_id: cmd.product_id,
            payment: Payment {
                user: cmd.user_id,
                amount: cmd.amount,
                reference: cmd.reference.clone(),
                status: PaymentStatus::Pending,
                created_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Any transition is accepted: the gateway is the source of truth.
    fn handle_reconcile_payment(
        &self,
        cmd: &ReconcilePayment,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created || self.id != cmd.product_id {
            return Err(DomainError::not_found("product"));
        }

        let payment = self
            .payment(&cmd.reference)
            .ok_or_else(|| DomainError::not_found("payment reference"))?;
        if payment.status == cmd.status {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::PaymentReconciled(PaymentReconciled {
            product_id: cmd.product_id,
            reference: cmd.reference.clone(),
            previous_status: payment.status,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
