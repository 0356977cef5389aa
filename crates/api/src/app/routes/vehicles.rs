use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use storefront_auth::Permission;
use storefront_core::AggregateId;
use storefront_infra::projections::VehicleFilter;
use storefront_vehicles::{
    Actor, CreateVehicleListing, DeleteVehicle, UpdateVehicle, Vehicle, VehicleCommand, VehicleId,
};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_vehicles).post(create_vehicle))
        .route("/search", get(search_vehicles))
        .route("/:id", get(get_vehicle).patch(update_vehicle).delete(delete_vehicle))
}

/// Search is also reachable on its own legacy path.
pub fn search_router() -> Router {
    Router::new().route("/", get(search_vehicles))
}

fn vehicle(id: AggregateId) -> Vehicle {
    Vehicle::empty(VehicleId::new(id))
}

fn actor(principal: &PrincipalContext) -> Actor {
    Actor {
        user_id: principal.user_id(),
        is_admin: principal.is_admin(),
    }
}

pub async fn list_vehicles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::VehicleListQuery>,
) -> Result<Response, ApiError> {
    let filter = VehicleFilter {
        make: q.make,
        location: q.location,
        max_price: q.price,
        year: q.year,
        condition: dto::parse_opt(q.condition)?,
        transmission: dto::parse_opt(q.transmission)?,
        exterior_color: q.color,
        fuel_type: dto::parse_opt(q.fuel_type)?,
    };
    let items = services
        .read_models()
        .vehicles
        .list(&filter)
        .iter()
        .map(dto::vehicle_to_json)
        .collect::<Vec<_>>();
    Ok((StatusCode::OK, Json(items)).into_response())
}

pub async fn search_vehicles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::SearchQuery>,
) -> Response {
    let items = services
        .read_models()
        .vehicles
        .search(&q.query)
        .iter()
        .map(dto::vehicle_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(items)).into_response()
}

pub async fn get_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let vehicle_id: VehicleId = id.parse()?;
    match services.read_models().vehicles.get(vehicle_id) {
        Some(v) => Ok((StatusCode::OK, Json(dto::vehicle_to_json(&v))).into_response()),
        None => Err(ApiError::not_found("Vehicle not found!")),
    }
}

pub async fn create_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Json(body): Json<dto::VehicleRequest>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::VEHICLES_WRITE)?;
    let details = body.into_create()?.into_details()?;

    let vehicle_id = VehicleId::new(AggregateId::new());
    let cmd = VehicleCommand::Create(CreateVehicleListing {
        vehicle_id,
        owner: principal.user_id(),
        details,
        occurred_at: Utc::now(),
    });
    services
        .dispatch(vehicle_id.0, Vehicle::AGGREGATE_TYPE, cmd, vehicle)
        .await?;

    let created: Vehicle = services.load(vehicle_id.0, vehicle).await?;
    info!(vehicle_id = %vehicle_id, owner = %principal.user_id(), "vehicle listed");
    Ok((StatusCode::CREATED, Json(dto::vehicle_to_json(&created))).into_response())
}

pub async fn update_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
    Json(body): Json<dto::VehicleRequest>,
) -> Result<Response, ApiError> {
    let vehicle_id: VehicleId = id.parse()?;
    let patch = body.into_patch()?;

    let cmd = VehicleCommand::Update(UpdateVehicle {
        vehicle_id,
        actor: actor(&principal),
        patch,
        occurred_at: Utc::now(),
    });
    services
        .dispatch(vehicle_id.0, Vehicle::AGGREGATE_TYPE, cmd, vehicle)
        .await?;

    let updated: Vehicle = services.load(vehicle_id.0, vehicle).await?;
    Ok((StatusCode::OK, Json(dto::vehicle_to_json(&updated))).into_response())
}

pub async fn delete_vehicle(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let vehicle_id: VehicleId = id.parse()?;

    let cmd = VehicleCommand::Delete(DeleteVehicle {
        vehicle_id,
        actor: actor(&principal),
        occurred_at: Utc::now(),
    });
    services
        .dispatch(vehicle_id.0, Vehicle::AGGREGATE_TYPE, cmd, vehicle)
        .await?;

    info!(vehicle_id = %vehicle_id, "vehicle removed");
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Vehicle deleted", "id": vehicle_id.to_string() })),
    )
        .into_response())
}
