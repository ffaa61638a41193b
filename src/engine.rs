//! Simulation-engine collaborator.
//!
//! The director never simulates anything itself: it spawns, commands, and
//! destroys actors through this trait. Every call reports failure through a
//! typed `EngineError`, so callers never poll actor liveness first.
use crate::geometry::{SpawnPoint, Transform, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod kinematic;

/// Engine-issued identifier for a live actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorHandle(pub u32);

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{0} is not a live actor")]
    ActorNotFound(ActorHandle),

    #[error("blueprint {0:?} not found in blueprint library")]
    BlueprintNotFound(String),

    #[error("spawn of {blueprint:?} rejected: {reason}")]
    SpawnRejected { blueprint: String, reason: String },

    #[error("destroy of {handle} failed: {reason}")]
    DestroyFailed { handle: ActorHandle, reason: String },
}

/// Lane lookup result for a world position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneInfo {
    /// Signed lane identifier; the sign encodes direction of travel.
    pub lane_id: i32,
    pub drivable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleControl {
    pub throttle: f64,
    pub brake: f64,
    pub steer: f64,
}

impl VehicleControl {
    pub fn full_brake() -> Self {
        Self {
            throttle: 0.0,
            brake: 1.0,
            steer: 0.0,
        }
    }
}

/// Traffic-manager lane change tuning for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneChangePolicy {
    pub left_pct: f64,
    pub right_pct: f64,
    pub auto_lane_change: bool,
}

impl LaneChangePolicy {
    /// No lane changes in either direction, so an assigned path is followed as given.
    pub fn disabled() -> Self {
        Self {
            left_pct: 0.0,
            right_pct: 0.0,
            auto_lane_change: false,
        }
    }
}

pub trait Engine {
    fn spawn_actor(
        &mut self,
        blueprint: &str,
        transform: &Transform,
        attach_to: Option<ActorHandle>,
    ) -> Result<ActorHandle, EngineError>;

    /// Destroying an already-destroyed handle returns an error; callers must tolerate it.
    fn destroy_actor(&mut self, handle: ActorHandle) -> Result<(), EngineError>;

    fn position(&self, handle: ActorHandle) -> Result<Vec3, EngineError>;

    fn forward_vector(&self, handle: ActorHandle) -> Result<Vec3, EngineError>;

    fn velocity(&self, handle: ActorHandle) -> Result<Vec3, EngineError>;

    /// Direct walker control. Takes effect on the next simulation step only.
    fn apply_walker_direction(
        &mut self,
        handle: ActorHandle,
        direction: Vec3,
        speed: f64,
        crouch: bool,
    ) -> Result<(), EngineError>;

    fn apply_vehicle_control(
        &mut self,
        handle: ActorHandle,
        control: VehicleControl,
    ) -> Result<(), EngineError>;

    fn set_autopilot(
        &mut self,
        handle: ActorHandle,
        enabled: bool,
        routing_port: u16,
    ) -> Result<(), EngineError>;

    fn assign_vehicle_path(
        &mut self,
        handle: ActorHandle,
        waypoints: &[Vec3],
    ) -> Result<(), EngineError>;

    fn set_lane_change_policy(
        &mut self,
        handle: ActorHandle,
        policy: LaneChangePolicy,
    ) -> Result<(), EngineError>;

    fn set_distance_to_leading_vehicle(
        &mut self,
        handle: ActorHandle,
        distance: f64,
    ) -> Result<(), EngineError>;

    fn set_pedestrians_crossing_factor(&mut self, factor: f64);

    fn set_hazard_lights(&mut self, handle: ActorHandle, on: bool) -> Result<(), EngineError>;

    /// `None` when the position does not project onto any road lane.
    fn resolve_lane(&self, position: Vec3) -> Option<LaneInfo>;

    fn spawn_points(&self) -> Vec<SpawnPoint>;

    /// The engine-owned observer camera. Never destroyed by the director.
    fn spectator(&self) -> ActorHandle;

    fn set_transform(&mut self, handle: ActorHandle, transform: &Transform)
        -> Result<(), EngineError>;

    fn start_sensor(&mut self, handle: ActorHandle) -> Result<(), EngineError>;

    fn stop_sensor(&mut self, handle: ActorHandle) -> Result<(), EngineError>;
}
