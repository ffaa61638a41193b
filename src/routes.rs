//! Vehicle route assignment.
//!
//! Spawn indices become road-aligned waypoints (no sidewalk offset) that are
//! handed to the engine's path follower. After submission the engine owns the
//! vehicle's progress along the path.
use crate::engine::{ActorHandle, Engine, LaneChangePolicy};
use crate::error::DirectorError;
use crate::geometry::Vec3;
use crate::spawn_points::SpawnPointIndex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRouteSpec {
    pub handle: ActorHandle,
    pub waypoints: Vec<Vec3>,
    pub lane_change_disabled: bool,
}

pub struct RouteAssigner;

impl RouteAssigner {
    /// Resolve `route` and submit it as `vehicle`'s path.
    ///
    /// Every index is resolved before the engine sees anything, so a bad index
    /// leaves the vehicle untouched.
    pub fn assign<E: Engine + ?Sized>(
        engine: &mut E,
        vehicle: ActorHandle,
        route: &[usize],
        spawn_points: &SpawnPointIndex,
    ) -> Result<VehicleRouteSpec, DirectorError> {
        if route.is_empty() {
            return Err(DirectorError::InvalidRoute(
                "route must contain at least one spawn index".to_string(),
            ));
        }
        if spawn_points.is_empty() {
            return Err(DirectorError::InvalidRoute(
                "map publishes no spawn points".to_string(),
            ));
        }
        let waypoints = route
            .iter()
            .map(|&index| spawn_points.location(index))
            .collect::<Result<Vec<_>, _>>()?;

        engine.set_lane_change_policy(vehicle, LaneChangePolicy::disabled())?;
        engine.assign_vehicle_path(vehicle, &waypoints)?;
        tracing::info!(%vehicle, ?route, "assigned vehicle route");

        Ok(VehicleRouteSpec {
            handle: vehicle,
            waypoints,
            lane_change_disabled: true,
        })
    }
}
