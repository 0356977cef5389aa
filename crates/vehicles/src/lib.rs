//! Vehicle listings domain module (event-sourced).
//!
//! Listings are owned by the user who created them; only the owner or an
//! admin may change or remove one.

pub mod attributes;
pub mod vehicle;

pub use attributes::{Availability, Condition, FuelType, InteriorMaterial, Transmission};
pub use vehicle::{
    Actor, CreateVehicle, CreateVehicleListing, DeleteVehicle, UpdateVehicle, Vehicle,
    VehicleCommand, VehicleCreated, VehicleDeleted, VehicleDetails, VehicleEvent, VehicleId,
    VehiclePatch, VehicleUpdated,
};
