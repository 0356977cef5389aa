use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use storefront_events::Event;

use crate::attributes::{Availability, Condition, FuelType, InteriorMaterial, Transmission};

/// Vehicle listing identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub AggregateId);

impl VehicleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for VehicleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Descriptive attributes of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub make: String,
    pub model: String,
    pub year: u32,
    pub price: u64,
    pub mileage: u64,
    pub condition: Condition,
    pub availability: Availability,
    pub engine_type: String,
    pub transmission: Transmission,
    pub fuel_type: FuelType,
    pub exterior_color: String,
    pub interior_color: String,
    pub interior_material: InteriorMaterial,
    pub quantity: u32,
    pub location: String,
    pub images: Vec<String>,
}

/// Who is issuing a command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// Aggregate root: Vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    id: VehicleId,
    owner: Option<UserId>,
    details: Option<VehicleDetails>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Vehicle {
    /// Stream type recorded with every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "vehicles.vehicle";

    pub fn empty(id: VehicleId) -> Self {
        Self {
            id,
            owner: None,
            details: None,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> VehicleId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn details(&self) -> Option<&VehicleDetails> {
        self.details.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// The owner and admins may modify a listing.
    pub fn can_be_modified_by(&self, actor: &Actor) -> bool {
        actor.is_admin || self.owner == Some(actor.user_id)
    }
}

impl AggregateRoot for Vehicle {
    type Id = VehicleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateVehicle. Every attribute is optional here so that all
/// missing ones can be reported at once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateVehicle {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u32>,
    pub price: Option<u64>,
    pub mileage: Option<u64>,
    pub condition: Option<Condition>,
    pub availability: Option<Availability>,
    pub engine_type: Option<String>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<FuelType>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub interior_material: Option<InteriorMaterial>,
    pub quantity: Option<u32>,
    pub location: Option<String>,
    pub images: Vec<String>,
}

impl CreateVehicle {
    /// Checks required fields and returns the complete attribute set.
    pub fn into_details(self) -> Result<VehicleDetails, DomainError> {
        fn text(value: Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
            match value.map(|v| v.trim().to_string()) {
                Some(v) if !v.is_empty() => v,
                _ => {
                    missing.push(field);
                    String::new()
                }
            }
        }

        fn required<T>(value: Option<T>, field: &'static str, missing: &mut Vec<&'static str>) -> Option<T> {
            if value.is_none() {
                missing.push(field);
            }
            value
        }

        let mut missing = Vec::new();
        let make = text(self.make, "make", &mut missing);
        let model = text(self.model, "model", &mut missing);
        let year = required(self.year, "year", &mut missing);
        let price = required(self.price, "price", &mut missing);
        let mileage = required(self.mileage, "mileage", &mut missing);
        let condition = required(self.condition, "condition", &mut missing);
        let availability = required(self.availability, "availability", &mut missing);
        let engine_type = text(self.engine_type, "engineType", &mut missing);
        let transmission = required(self.transmission, "transmission", &mut missing);
        let fuel_type = required(self.fuel_type, "fuelType", &mut missing);
        let exterior_color = text(self.exterior_color, "exteriorColor", &mut missing);
        let interior_color = text(self.interior_color, "interiorColor", &mut missing);
        let interior_material = required(self.interior_material, "interiorMaterial", &mut missing);
        let quantity = required(self.quantity, "quantity", &mut missing);
        let location = text(self.location, "location", &mut missing);
        let images: Vec<String> = self
            .images
            .into_iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if images.is_empty() {
            missing.push("images");
        }

        if let Some(err) = DomainError::missing_fields(missing) {
            return Err(err);
        }

        match (
            year,
            price,
            mileage,
            condition,
            availability,
            transmission,
            fuel_type,
            interior_material,
            quantity,
        ) {
            (
                Some(year),
                Some(price),
                Some(mileage),
                Some(condition),
                Some(availability),
                Some(transmission),
                Some(fuel_type),
                Some(interior_material),
                Some(quantity),
            ) => Ok(VehicleDetails {
                make,
                model,
                year,
                price,
                mileage,
                condition,
                availability,
                engine_type,
                transmission,
                fuel_type,
                exterior_color,
                interior_color,
                interior_material,
                quantity,
                location,
                images,
            }),
            _ => Err(DomainError::invariant("required vehicle field missing")),
        }
    }
}

/// Partial update of a listing's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehiclePatch {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u32>,
    pub price: Option<u64>,
    pub mileage: Option<u64>,
    pub condition: Option<Condition>,
    pub availability: Option<Availability>,
    pub engine_type: Option<String>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<FuelType>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub interior_material: Option<InteriorMaterial>,
    pub quantity: Option<u32>,
    pub location: Option<String>,
    pub images: Option<Vec<String>>,
}

impl VehiclePatch {
    pub fn is_empty(&self) -> bool {
        self == &VehiclePatch::default()
    }

    fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("make", &self.make),
            ("model", &self.model),
            ("engineType", &self.engine_type),
            ("exteriorColor", &self.exterior_color),
            ("interiorColor", &self.interior_color),
            ("location", &self.location),
        ] {
            if value.as_ref().is_some_and(|v| v.trim().is_empty()) {
                return Err(DomainError::validation(format!("{field} cannot be empty")));
            }
        }
        if self.images.as_ref().is_some_and(|i| i.iter().all(|s| s.trim().is_empty())) {
            return Err(DomainError::validation("images cannot be empty"));
        }
        Ok(())
    }

    /// Overwrites the attributes present in the patch.
    pub fn apply_to(&self, details: &mut VehicleDetails) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut details.make, &self.make);
        set(&mut details.model, &self.model);
        set(&mut details.year, &self.year);
        set(&mut details.price, &self.price);
        set(&mut details.mileage, &self.mileage);
        set(&mut details.condition, &self.condition);
        set(&mut details.availability, &self.availability);
        set(&mut details.engine_type, &self.engine_type);
        set(&mut details.transmission, &self.transmission);
        set(&mut details.fuel_type, &self.fuel_type);
        set(&mut details.exterior_color, &self.exterior_color);
        set(&mut details.interior_color, &self.interior_color);
        set(&mut details.interior_material, &self.interior_material);
        set(&mut details.quantity, &self.quantity);
        set(&mut details.location, &self.location);
        set(&mut details.images, &self.images);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVehicleListing {
    pub vehicle_id: VehicleId,
    pub owner: UserId,
    pub details: VehicleDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateVehicle {
    pub vehicle_id: VehicleId,
    pub actor: Actor,
    pub patch: VehiclePatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteVehicle {
    pub vehicle_id: VehicleId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleCommand {
    Create(CreateVehicleListing),
    Update(UpdateVehicle),
    Delete(DeleteVehicle),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleCreated {
    pub vehicle_id: VehicleId,
    pub owner: UserId,
    pub details: VehicleDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleUpdated {
    pub vehicle_id: VehicleId,
    pub patch: VehiclePatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDeleted {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleEvent {
    VehicleCreated(VehicleCreated),
    VehicleUpdated(VehicleUpdated),
    VehicleDeleted(VehicleDeleted),
}

impl VehicleEvent {
    pub fn vehicle_id(&self) -> VehicleId {
        match self {
            VehicleEvent::VehicleCreated(e) => e.vehicle_id,
            VehicleEvent::VehicleUpdated(e) => e.vehicle_id,
            VehicleEvent::VehicleDeleted(e) => e.vehicle_id,
        }
    }
}

impl Event for VehicleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VehicleEvent::VehicleCreated(_) => "vehicles.vehicle.created",
            VehicleEvent::VehicleUpdated(_) => "vehicles.vehicle.updated",
            VehicleEvent::VehicleDeleted(_) => "vehicles.vehicle.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VehicleEvent::VehicleCreated(e) => e.occurred_at,
            VehicleEvent::VehicleUpdated(e) => e.occurred_at,
            VehicleEvent::VehicleDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Vehicle {
    type Command = VehicleCommand;
    type Event = VehicleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VehicleEvent::VehicleCreated(e) => {
                self.id = e.vehicle_id;
                self.owner = Some(e.owner);
                self.details = Some(e.details.clone());
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            VehicleEvent::VehicleUpdated(e) => {
                if let Some(details) = self.details.as_mut() {
                    e.patch.apply_to(details);
                }
                self.updated_at = Some(e.occurred_at);
            }
            VehicleEvent::VehicleDeleted(e) => {
                self.deleted = true;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VehicleCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("vehicle already exists"));
                }
                Ok(vec![VehicleEvent::VehicleCreated(VehicleCreated {
                    vehicle_id: cmd.vehicle_id,
                    owner: cmd.owner,
                    details: cmd.details.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            VehicleCommand::Update(cmd) => {
                self.ensure_modifiable(cmd.vehicle_id, &cmd.actor)?;
                if cmd.patch.is_empty() {
                    return Ok(vec![]);
                }
                cmd.patch.validate()?;
                Ok(vec![VehicleEvent::VehicleUpdated(VehicleUpdated {
                    vehicle_id: cmd.vehicle_id,
                    patch: cmd.patch.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            VehicleCommand::Delete(cmd) => {
                self.ensure_modifiable(cmd.vehicle_id, &cmd.actor)?;
                Ok(vec![VehicleEvent::VehicleDeleted(VehicleDeleted {
                    vehicle_id: cmd.vehicle_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Vehicle {
    fn ensure_modifiable(&self, vehicle_id: VehicleId, actor: &Actor) -> Result<(), DomainError> {
        if !self.exists() || self.id != vehicle_id {
            return Err(DomainError::not_found("Vehicle not found!"));
        }
        if !self.can_be_modified_by(actor) {
            return Err(DomainError::unauthorized("Access denied"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn full_create() -> CreateVehicle {
        CreateVehicle {
            make: Some("Toyota".to_string()),
            model: Some("Corolla".to_string()),
            year: Some(2018),
            price: Some(7_500_000),
            mileage: Some(64_000),
            condition: Some(Condition::Foreign),
            availability: Some(Availability::Available),
            engine_type: Some("1.8L I4".to_string()),
            transmission: Some(Transmission::Automatic),
            fuel_type: Some(FuelType::Petrol),
            exterior_color: Some("Silver".to_string()),
            interior_color: Some("Black".to_string()),
            interior_material: Some(InteriorMaterial::Fabric),
            quantity: Some(1),
            location: Some("Lagos".to_string()),
            images: vec!["https://img.example/corolla.png".to_string()],
        }
    }

    fn listed(owner: UserId) -> Vehicle {
        let id = VehicleId::new(AggregateId::new());
        let mut vehicle = Vehicle::empty(id);
        execute(
            &mut vehicle,
            &VehicleCommand::Create(CreateVehicleListing {
                vehicle_id: id,
                owner,
                details: full_create().into_details().unwrap(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        vehicle
    }

    fn price_patch(vehicle: &Vehicle, actor: Actor, price: u64) -> VehicleCommand {
        VehicleCommand::Update(UpdateVehicle {
            vehicle_id: vehicle.id_typed(),
            actor,
            patch: VehiclePatch {
                price: Some(price),
                ..VehiclePatch::default()
            },
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn into_details_lists_missing_fields_in_order() {
        let cmd = CreateVehicle {
            model: None,
            quantity: None,
            images: vec![" ".to_string()],
            ..full_create()
        };
        let err = cmd.into_details().unwrap_err();
        assert_eq!(
            err,
            DomainError::MissingFields(vec![
                "model".to_string(),
                "quantity".to_string(),
                "images".to_string()
            ])
        );
    }

    #[test]
    fn owner_can_update_listing() {
        let owner = UserId::new();
        let mut vehicle = listed(owner);
        let actor = Actor { user_id: owner, is_admin: false };

        let cmd = price_patch(&vehicle, actor, 7_000_000);
        execute(&mut vehicle, &cmd).unwrap();

        assert_eq!(vehicle.details().unwrap().price, 7_000_000);
        assert_eq!(vehicle.details().unwrap().make, "Toyota");
    }

    #[test]
    fn strangers_cannot_modify_but_admins_can() {
        let mut vehicle = listed(UserId::new());
        let stranger = Actor { user_id: UserId::new(), is_admin: false };
        let admin = Actor { user_id: UserId::new(), is_admin: true };

        let err = vehicle.handle(&price_patch(&vehicle, stranger, 1)).unwrap_err();
        assert_eq!(err, DomainError::unauthorized("Access denied"));

        let delete = VehicleCommand::Delete(DeleteVehicle {
            vehicle_id: vehicle.id_typed(),
            actor: admin,
            occurred_at: Utc::now(),
        });
        execute(&mut vehicle, &delete).unwrap();
        assert!(!vehicle.exists());
    }

    #[test]
    fn blank_text_in_patch_is_rejected() {
        let owner = UserId::new();
        let vehicle = listed(owner);
        let err = vehicle
            .handle(&VehicleCommand::Update(UpdateVehicle {
                vehicle_id: vehicle.id_typed(),
                actor: Actor { user_id: owner, is_admin: false },
                patch: VehiclePatch {
                    location: Some("  ".to_string()),
                    ..VehiclePatch::default()
                },
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deleted_listing_is_not_found() {
        let owner = UserId::new();
        let actor = Actor { user_id: owner, is_admin: false };
        let mut vehicle = listed(owner);
        let delete = VehicleCommand::Delete(DeleteVehicle {
            vehicle_id: vehicle.id_typed(),
            actor,
            occurred_at: Utc::now(),
        });
        execute(&mut vehicle, &delete).unwrap();

        let err = vehicle.handle(&price_patch(&vehicle, actor, 1)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
