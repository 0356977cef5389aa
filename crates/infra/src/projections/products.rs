//! Product catalog queries over the product snapshot projection.

use serde_json::Value as JsonValue;

use storefront_core::{AggregateId, UserId};
use storefront_events::EventEnvelope;
use storefront_products::{Product, ProductId};

use super::ProjectionError;
use super::aggregate::AggregateProjection;

/// Optional catalog filters. `category` and `brand` match exactly;
/// `max_price` keeps products priced at or below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub max_price: Option<u64>,
}

impl ProductFilter {
    fn matches(&self, product: &Product) -> bool {
        self.category.as_deref().is_none_or(|c| product.category() == c)
            && self.brand.as_deref().is_none_or(|b| product.brand() == b)
            && self.max_price.is_none_or(|max| product.price() <= max)
    }
}

#[derive(Debug)]
pub struct ProductCatalog {
    snapshots: AggregateProjection<Product>,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductCatalog {
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

    pub fn get(&self, product_id: ProductId) -> Option<Product> {
        self.snapshots.get(product_id.0)
    }

    /// Newest first.
    pub fn list(&self, filter: &ProductFilter) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .snapshots
            .list()
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        newest_first(&mut products);
        products
    }

    /// Case-insensitive substring match on name, category or brand. A blank
    /// query returns the whole catalog.
    pub fn search(&self, query: &str) -> Vec<Product> {
        let needle = query.trim().to_lowercase();
        let mut products: Vec<Product> = self
            .snapshots
            .list()
            .into_iter()
            .filter(|p| {
                needle.is_empty()
                    || [p.name(), p.category(), p.brand()]
                        .iter()
                        .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect();
        newest_first(&mut products);
        products
    }

    /// Slugs are not unique across renames; the newest product wins.
    pub fn id_by_slug(&self, slug: &str) -> Option<ProductId> {
        let mut matching: Vec<Product> = self
            .snapshots
            .list()
            .into_iter()
            .filter(|p| p.slug() == slug)
            .collect();
        newest_first(&mut matching);
        matching.first().map(|p| p.id_typed())
    }

    pub fn slug_in_use(&self, slug: &str) -> bool {
        self.snapshots.list().iter().any(|p| p.slug() == slug)
    }

    pub fn favourites_of(&self, user: UserId) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .snapshots
            .list()
            .into_iter()
            .filter(|p| p.is_favourite_of(user))
            .collect();
        newest_first(&mut products);
        products
    }

    pub fn contains(&self, id: AggregateId) -> bool {
        self.snapshots.get(id).is_some()
    }
}

fn newest_first(products: &mut [Product]) {
    products.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id_typed().cmp(&a.id_typed())));
}
