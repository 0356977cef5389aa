//! Vehicle listing queries.

use serde_json::Value as JsonValue;

use storefront_events::EventEnvelope;
use storefront_vehicles::{Condition, FuelType, Transmission, Vehicle, VehicleDetails, VehicleId};

use super::ProjectionError;
use super::aggregate::AggregateProjection;

/// Listing filters; every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleFilter {
    pub make: Option<String>,
    pub location: Option<String>,
    pub max_price: Option<u64>,
    pub year: Option<u32>,
    pub condition: Option<Condition>,
    pub transmission: Option<Transmission>,
    pub exterior_color: Option<String>,
    pub fuel_type: Option<FuelType>,
}

impl VehicleFilter {
    fn matches(&self, d: &VehicleDetails) -> bool {
        self.make.as_deref().is_none_or(|v| d.make == v)
            && self.location.as_deref().is_none_or(|v| d.location == v)
            && self.max_price.is_none_or(|v| d.price <= v)
            && self.year.is_none_or(|v| d.year == v)
            && self.condition.is_none_or(|v| d.condition == v)
            && self.transmission.is_none_or(|v| d.transmission == v)
            && self.exterior_color.as_deref().is_none_or(|v| d.exterior_color == v)
            && self.fuel_type.is_none_or(|v| d.fuel_type == v)
    }
}

#[derive(Debug)]
pub struct VehicleListings {
    snapshots: AggregateProjection<Vehicle>,
}

impl Default for VehicleListings {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleListings {
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

    pub fn get(&self, vehicle_id: VehicleId) -> Option<Vehicle> {
        self.snapshots.get(vehicle_id.0)
    }

    /// Newest first.
    pub fn list(&self, filter: &VehicleFilter) -> Vec<Vehicle> {
        self.collect(|d| filter.matches(d))
    }

    /// A numeric query matches `year` or `mileage` exactly; any query also
    /// matches the descriptive fields by case-insensitive substring.
    pub fn search(&self, query: &str) -> Vec<Vehicle> {
        let query = query.trim();
        if query.is_empty() {
            return self.collect(|_| true);
        }

        let number = query.parse::<u64>().ok();
        let needle = query.to_lowercase();
        self.collect(|d| {
            let numeric = number.is_some_and(|n| u64::from(d.year) == n || d.mileage == n);
            numeric
                || [
                    d.make.as_str(),
                    d.model.as_str(),
                    d.condition.as_str(),
                    d.availability.as_str(),
                    d.engine_type.as_str(),
                    d.transmission.as_str(),
                    d.fuel_type.as_str(),
                    d.exterior_color.as_str(),
                    d.interior_color.as_str(),
                    d.interior_material.as_str(),
                    d.location.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
    }

    fn collect(&self, keep: impl Fn(&VehicleDetails) -> bool) -> Vec<Vehicle> {
        let mut vehicles: Vec<Vehicle> = self
            .snapshots
            .list()
            .into_iter()
            .filter(|v| v.details().is_some_and(&keep))
            .collect();
        vehicles.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        vehicles
    }
}
