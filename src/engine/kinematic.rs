//! Deterministic in-process engine for dry runs and tests.
//!
//! Nothing here models dynamics: walkers translate along their last commanded
//! direction, autopilot vehicles slide along their assigned path at a fixed
//! cruise speed, and a full-brake control holds a vehicle still for one step.
//! Every command is recorded so tests can assert on exactly what the director
//! asked for.
use super::{ActorHandle, Engine, EngineError, LaneChangePolicy, LaneInfo, VehicleControl};
use crate::geometry::{Rotation, SpawnPoint, Transform, Vec3};
use crate::map::TownMap;
use std::collections::{BTreeMap, BTreeSet};

/// Autopilot speed along an assigned path, map units per second.
pub const CRUISE_SPEED: f64 = 8.0;
/// Positions further than this from every spawn point are off-road.
pub const LANE_CAPTURE_RADIUS: f64 = 15.0;
/// Two bodies closer than this at spawn time collide.
const SPAWN_CLEARANCE: f64 = 0.5;

const SPECTATOR: ActorHandle = ActorHandle(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Vehicle,
    Walker,
    Sensor,
    Other,
}

impl BodyKind {
    fn from_blueprint(blueprint: &str) -> Self {
        if blueprint.starts_with("vehicle.") {
            BodyKind::Vehicle
        } else if blueprint.starts_with("walker.") {
            BodyKind::Walker
        } else if blueprint.starts_with("sensor.") {
            BodyKind::Sensor
        } else {
            BodyKind::Other
        }
    }
}

#[derive(Debug, Clone)]
struct Body {
    kind: BodyKind,
    transform: Transform,
    velocity: Vec3,
    attached_to: Option<ActorHandle>,
    walker_command: Option<(Vec3, f64)>,
    control: Option<VehicleControl>,
    autopilot: bool,
    path: Vec<Vec3>,
    path_cursor: usize,
    listening: bool,
    hazard_lights: bool,
    leading_distance: Option<f64>,
    lane_policy: Option<LaneChangePolicy>,
}

impl Body {
    fn new(kind: BodyKind, transform: Transform, attached_to: Option<ActorHandle>) -> Self {
        Self {
            kind,
            transform,
            velocity: Vec3::ZERO,
            attached_to,
            walker_command: None,
            control: None,
            autopilot: false,
            path: Vec::new(),
            path_cursor: 0,
            listening: false,
            hazard_lights: false,
            leading_distance: None,
            lane_policy: None,
        }
    }
}

/// One recorded walker motion command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkerCommand {
    pub handle: ActorHandle,
    pub direction: Vec3,
    pub speed: f64,
    pub crouch: bool,
}

#[derive(Debug, Clone)]
pub struct KinematicEngine {
    spawn_points: Vec<SpawnPoint>,
    lane_ids: Vec<i32>,
    bodies: BTreeMap<ActorHandle, Body>,
    spectator: Transform,
    next_handle: u32,
    elapsed: f64,
    crossing_factor: f64,
    missing_blueprints: BTreeSet<String>,
    failing_destroys: BTreeSet<ActorHandle>,
    fail_all_destroys: bool,
    destroy_calls: BTreeMap<ActorHandle, usize>,
    stop_calls: Vec<ActorHandle>,
    destroy_log: Vec<ActorHandle>,
    walker_commands: Vec<WalkerCommand>,
    vehicle_controls: Vec<(ActorHandle, VehicleControl)>,
    autopilot_calls: Vec<(ActorHandle, bool, u16)>,
}

impl KinematicEngine {
    pub fn new(map: &TownMap) -> Self {
        Self::with_spawn_points(map.spawn_points.clone(), map.lane_ids.clone())
    }

    pub fn with_spawn_points(spawn_points: Vec<SpawnPoint>, lane_ids: Vec<i32>) -> Self {
        Self {
            spawn_points,
            lane_ids,
            bodies: BTreeMap::new(),
            spectator: Transform::default(),
            next_handle: SPECTATOR.0 + 1,
            elapsed: 0.0,
            crossing_factor: 0.0,
            missing_blueprints: BTreeSet::new(),
            failing_destroys: BTreeSet::new(),
            fail_all_destroys: false,
            destroy_calls: BTreeMap::new(),
            stop_calls: Vec::new(),
            destroy_log: Vec::new(),
            walker_commands: Vec::new(),
            vehicle_controls: Vec::new(),
            autopilot_calls: Vec::new(),
        }
    }

    /// Make `blueprint` unknown to the blueprint library.
    pub fn remove_blueprint(&mut self, blueprint: &str) {
        self.missing_blueprints.insert(blueprint.to_string());
    }

    /// Make every destroy of `handle` fail while leaving the actor alive.
    pub fn fail_destroy_of(&mut self, handle: ActorHandle) {
        self.failing_destroys.insert(handle);
    }

    pub fn fail_all_destroys(&mut self) {
        self.fail_all_destroys = true;
    }

    /// Move a body without going through a command; tests use this to stage positions.
    pub fn teleport(&mut self, handle: ActorHandle, location: Vec3) -> Result<(), EngineError> {
        let body = self.body_mut(handle)?;
        body.transform.location = location;
        Ok(())
    }

    /// Advance the world by `dt` seconds, consuming one-step commands.
    pub fn step(&mut self, dt: f64) {
        for body in self.bodies.values_mut() {
            match body.kind {
                BodyKind::Walker => step_walker(body, dt),
                BodyKind::Vehicle => step_vehicle(body, dt),
                BodyKind::Sensor | BodyKind::Other => {}
            }
        }
        self.elapsed += dt;
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn is_alive(&self, handle: ActorHandle) -> bool {
        handle == SPECTATOR || self.bodies.contains_key(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn kind_of(&self, handle: ActorHandle) -> Option<BodyKind> {
        self.bodies.get(&handle).map(|body| body.kind)
    }

    pub fn parent_of(&self, handle: ActorHandle) -> Option<ActorHandle> {
        self.bodies.get(&handle).and_then(|body| body.attached_to)
    }

    /// Every destroy call for `handle`, successful or not.
    pub fn destroy_calls(&self, handle: ActorHandle) -> usize {
        self.destroy_calls.get(&handle).copied().unwrap_or(0)
    }

    pub fn total_destroy_calls(&self) -> usize {
        self.destroy_calls.values().sum()
    }

    /// Handles in the order destroy was requested.
    pub fn destroy_log(&self) -> &[ActorHandle] {
        &self.destroy_log
    }

    pub fn stop_calls(&self) -> &[ActorHandle] {
        &self.stop_calls
    }

    pub fn walker_commands(&self) -> &[WalkerCommand] {
        &self.walker_commands
    }

    pub fn vehicle_controls(&self) -> &[(ActorHandle, VehicleControl)] {
        &self.vehicle_controls
    }

    pub fn autopilot_calls(&self) -> &[(ActorHandle, bool, u16)] {
        &self.autopilot_calls
    }

    pub fn autopilot_enabled(&self, handle: ActorHandle) -> bool {
        self.bodies.get(&handle).is_some_and(|body| body.autopilot)
    }

    pub fn assigned_path(&self, handle: ActorHandle) -> Option<&[Vec3]> {
        self.bodies.get(&handle).map(|body| body.path.as_slice())
    }

    pub fn lane_policy(&self, handle: ActorHandle) -> Option<LaneChangePolicy> {
        self.bodies.get(&handle).and_then(|body| body.lane_policy)
    }

    pub fn leading_distance(&self, handle: ActorHandle) -> Option<f64> {
        self.bodies.get(&handle).and_then(|body| body.leading_distance)
    }

    pub fn is_listening(&self, handle: ActorHandle) -> bool {
        self.bodies.get(&handle).is_some_and(|body| body.listening)
    }

    pub fn hazard_lights(&self, handle: ActorHandle) -> bool {
        self.bodies.get(&handle).is_some_and(|body| body.hazard_lights)
    }

    pub fn crossing_factor(&self) -> f64 {
        self.crossing_factor
    }

    fn body(&self, handle: ActorHandle) -> Result<&Body, EngineError> {
        self.bodies
            .get(&handle)
            .ok_or(EngineError::ActorNotFound(handle))
    }

    fn body_mut(&mut self, handle: ActorHandle) -> Result<&mut Body, EngineError> {
        self.bodies
            .get_mut(&handle)
            .ok_or(EngineError::ActorNotFound(handle))
    }

    fn vehicle_mut(&mut self, handle: ActorHandle) -> Result<&mut Body, EngineError> {
        let body = self.body_mut(handle)?;
        if body.kind != BodyKind::Vehicle {
            return Err(EngineError::ActorNotFound(handle));
        }
        Ok(body)
    }

    /// World transform, following attachment chains.
    fn world_transform(&self, handle: ActorHandle) -> Result<Transform, EngineError> {
        if handle == SPECTATOR {
            return Ok(self.spectator);
        }
        let body = self.body(handle)?;
        match body.attached_to {
            Some(parent) => {
                let parent = self.world_transform(parent)?;
                Ok(Transform::new(
                    parent.location + body.transform.location,
                    parent.rotation,
                ))
            }
            None => Ok(body.transform),
        }
    }

    fn occupied(&self, location: Vec3) -> bool {
        self.bodies.values().any(|body| {
            body.attached_to.is_none()
                && matches!(body.kind, BodyKind::Vehicle | BodyKind::Walker)
                && body.transform.location.distance(location) < SPAWN_CLEARANCE
        })
    }
}

fn step_walker(body: &mut Body, dt: f64) {
    match body.walker_command.take() {
        Some((direction, speed)) => {
            body.velocity = direction * speed;
            body.transform.location += body.velocity * dt;
            if direction != Vec3::ZERO {
                body.transform.rotation = Rotation::facing(direction);
            }
        }
        None => body.velocity = Vec3::ZERO,
    }
}

fn step_vehicle(body: &mut Body, dt: f64) {
    let braking = body.control.take().is_some_and(|control| control.brake > 0.0);
    if braking || !body.autopilot || body.path_cursor >= body.path.len() {
        body.velocity = Vec3::ZERO;
        return;
    }
    let mut budget = CRUISE_SPEED * dt;
    let start = body.transform.location;
    while budget > 0.0 && body.path_cursor < body.path.len() {
        let target = body.path[body.path_cursor];
        let to_target = target - body.transform.location;
        let distance = to_target.length();
        if distance <= budget {
            body.transform.location = target;
            budget -= distance;
            body.path_cursor += 1;
        } else {
            let direction = to_target / distance;
            body.transform.location += direction * budget;
            body.transform.rotation = Rotation::facing(direction);
            budget = 0.0;
        }
    }
    body.velocity = if dt > 0.0 {
        (body.transform.location - start) / dt
    } else {
        Vec3::ZERO
    };
}

impl Engine for KinematicEngine {
    fn spawn_actor(
        &mut self,
        blueprint: &str,
        transform: &Transform,
        attach_to: Option<ActorHandle>,
    ) -> Result<ActorHandle, EngineError> {
        if self.missing_blueprints.contains(blueprint) {
            return Err(EngineError::BlueprintNotFound(blueprint.to_string()));
        }
        if let Some(parent) = attach_to {
            if !self.is_alive(parent) {
                return Err(EngineError::ActorNotFound(parent));
            }
        }
        let kind = BodyKind::from_blueprint(blueprint);
        if attach_to.is_none()
            && matches!(kind, BodyKind::Vehicle | BodyKind::Walker)
            && self.occupied(transform.location)
        {
            return Err(EngineError::SpawnRejected {
                blueprint: blueprint.to_string(),
                reason: "collision at spawn location".to_string(),
            });
        }
        let handle = ActorHandle(self.next_handle);
        self.next_handle += 1;
        self.bodies
            .insert(handle, Body::new(kind, *transform, attach_to));
        Ok(handle)
    }

    fn destroy_actor(&mut self, handle: ActorHandle) -> Result<(), EngineError> {
        *self.destroy_calls.entry(handle).or_default() += 1;
        self.destroy_log.push(handle);
        if self.fail_all_destroys || self.failing_destroys.contains(&handle) {
            return Err(EngineError::DestroyFailed {
                handle,
                reason: "injected failure".to_string(),
            });
        }
        match self.bodies.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(EngineError::ActorNotFound(handle)),
        }
    }

    fn position(&self, handle: ActorHandle) -> Result<Vec3, EngineError> {
        Ok(self.world_transform(handle)?.location)
    }

    fn forward_vector(&self, handle: ActorHandle) -> Result<Vec3, EngineError> {
        Ok(self.world_transform(handle)?.rotation.forward_vector())
    }

    fn velocity(&self, handle: ActorHandle) -> Result<Vec3, EngineError> {
        if handle == SPECTATOR {
            return Ok(Vec3::ZERO);
        }
        Ok(self.body(handle)?.velocity)
    }

    fn apply_walker_direction(
        &mut self,
        handle: ActorHandle,
        direction: Vec3,
        speed: f64,
        crouch: bool,
    ) -> Result<(), EngineError> {
        let body = self.body_mut(handle)?;
        if body.kind != BodyKind::Walker {
            return Err(EngineError::ActorNotFound(handle));
        }
        body.walker_command = Some((direction, speed));
        self.walker_commands.push(WalkerCommand {
            handle,
            direction,
            speed,
            crouch,
        });
        Ok(())
    }

    fn apply_vehicle_control(
        &mut self,
        handle: ActorHandle,
        control: VehicleControl,
    ) -> Result<(), EngineError> {
        self.vehicle_mut(handle)?.control = Some(control);
        self.vehicle_controls.push((handle, control));
        Ok(())
    }

    fn set_autopilot(
        &mut self,
        handle: ActorHandle,
        enabled: bool,
        routing_port: u16,
    ) -> Result<(), EngineError> {
        self.vehicle_mut(handle)?.autopilot = enabled;
        self.autopilot_calls.push((handle, enabled, routing_port));
        Ok(())
    }

    fn assign_vehicle_path(
        &mut self,
        handle: ActorHandle,
        waypoints: &[Vec3],
    ) -> Result<(), EngineError> {
        let body = self.vehicle_mut(handle)?;
        body.path = waypoints.to_vec();
        body.path_cursor = 0;
        Ok(())
    }

    fn set_lane_change_policy(
        &mut self,
        handle: ActorHandle,
        policy: LaneChangePolicy,
    ) -> Result<(), EngineError> {
        self.vehicle_mut(handle)?.lane_policy = Some(policy);
        Ok(())
    }

    fn set_distance_to_leading_vehicle(
        &mut self,
        handle: ActorHandle,
        distance: f64,
    ) -> Result<(), EngineError> {
        self.vehicle_mut(handle)?.leading_distance = Some(distance);
        Ok(())
    }

    fn set_pedestrians_crossing_factor(&mut self, factor: f64) {
        self.crossing_factor = factor;
    }

    fn set_hazard_lights(&mut self, handle: ActorHandle, on: bool) -> Result<(), EngineError> {
        self.vehicle_mut(handle)?.hazard_lights = on;
        Ok(())
    }

    fn resolve_lane(&self, position: Vec3) -> Option<LaneInfo> {
        let (index, distance) = self
            .spawn_points
            .iter()
            .map(|point| (point.index, point.location().distance(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        let lane_id = self.lane_ids.get(index).copied()?;
        Some(LaneInfo {
            lane_id,
            drivable: distance <= LANE_CAPTURE_RADIUS,
        })
    }

    fn spawn_points(&self) -> Vec<SpawnPoint> {
        self.spawn_points.clone()
    }

    fn spectator(&self) -> ActorHandle {
        SPECTATOR
    }

    fn set_transform(
        &mut self,
        handle: ActorHandle,
        transform: &Transform,
    ) -> Result<(), EngineError> {
        if handle == SPECTATOR {
            self.spectator = *transform;
            return Ok(());
        }
        self.body_mut(handle)?.transform = *transform;
        Ok(())
    }

    fn start_sensor(&mut self, handle: ActorHandle) -> Result<(), EngineError> {
        let body = self.body_mut(handle)?;
        if body.kind != BodyKind::Sensor {
            return Err(EngineError::ActorNotFound(handle));
        }
        body.listening = true;
        Ok(())
    }

    fn stop_sensor(&mut self, handle: ActorHandle) -> Result<(), EngineError> {
        self.stop_calls.push(handle);
        let body = self.body_mut(handle)?;
        body.listening = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::default_town;

    #[test]
    fn walker_moves_only_on_steps_with_a_command() {
        let mut engine = KinematicEngine::new(&default_town());
        let walker = engine
            .spawn_actor(
                "walker.pedestrian.0001",
                &Transform::from_location(Vec3::ZERO),
                None,
            )
            .expect("spawn walker");
        engine
            .apply_walker_direction(walker, Vec3::X, 2.0, false)
            .expect("command walker");
        engine.step(0.5);
        assert_eq!(engine.position(walker).unwrap(), Vec3::new(1.0, 0.0, 0.0));

        engine.step(0.5);
        assert_eq!(engine.position(walker).unwrap(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(engine.velocity(walker).unwrap(), Vec3::ZERO);
    }

    #[test]
    fn autopilot_vehicle_follows_path_and_holds_when_braked() {
        let mut engine = KinematicEngine::new(&default_town());
        let vehicle = engine
            .spawn_actor("vehicle.tesla.model3", &Transform::default(), None)
            .expect("spawn vehicle");
        engine.set_autopilot(vehicle, true, 8000).unwrap();
        engine
            .assign_vehicle_path(vehicle, &[Vec3::new(100.0, 0.0, 0.0)])
            .unwrap();

        engine.step(1.0);
        assert_eq!(engine.position(vehicle).unwrap(), Vec3::new(CRUISE_SPEED, 0.0, 0.0));

        engine
            .apply_vehicle_control(vehicle, VehicleControl::full_brake())
            .unwrap();
        engine.step(1.0);
        assert_eq!(engine.position(vehicle).unwrap(), Vec3::new(CRUISE_SPEED, 0.0, 0.0));

        engine.step(1.0);
        assert_eq!(
            engine.position(vehicle).unwrap(),
            Vec3::new(2.0 * CRUISE_SPEED, 0.0, 0.0)
        );
    }

    #[test]
    fn destroy_twice_reports_missing_actor() {
        let mut engine = KinematicEngine::new(&default_town());
        let vehicle = engine
            .spawn_actor("vehicle.tesla.model3", &Transform::default(), None)
            .unwrap();
        engine.destroy_actor(vehicle).expect("first destroy");
        assert_eq!(
            engine.destroy_actor(vehicle),
            Err(EngineError::ActorNotFound(vehicle))
        );
        assert_eq!(engine.destroy_calls(vehicle), 2);
    }

    #[test]
    fn overlapping_spawn_is_rejected() {
        let mut engine = KinematicEngine::new(&default_town());
        let transform = Transform::from_location(Vec3::new(5.0, 5.0, 0.0));
        engine
            .spawn_actor("vehicle.audi.tt", &transform, None)
            .unwrap();
        let err = engine
            .spawn_actor("walker.pedestrian.0001", &transform, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::SpawnRejected { .. }));
    }

    #[test]
    fn attached_sensor_follows_parent() {
        let mut engine = KinematicEngine::new(&default_town());
        let vehicle = engine
            .spawn_actor(
                "vehicle.audi.tt",
                &Transform::from_location(Vec3::new(10.0, 0.0, 0.0)),
                None,
            )
            .unwrap();
        let sensor = engine
            .spawn_actor(
                "sensor.other.v2v_broadcast",
                &Transform::from_location(Vec3::new(0.0, 0.0, 1.0)),
                Some(vehicle),
            )
            .unwrap();
        assert_eq!(engine.position(sensor).unwrap(), Vec3::new(10.0, 0.0, 1.0));
        assert_eq!(engine.parent_of(sensor), Some(vehicle));
    }

    #[test]
    fn lane_resolution_uses_nearest_spawn_point() {
        let engine = KinematicEngine::new(&default_town());
        let eastbound = engine.resolve_lane(Vec3::new(31.0, 1.0, 0.0)).unwrap();
        assert_eq!(eastbound.lane_id, 1);
        assert!(eastbound.drivable);

        let westbound = engine.resolve_lane(Vec3::new(30.0, 29.0, 0.0)).unwrap();
        assert_eq!(westbound.lane_id, -1);

        let far = engine.resolve_lane(Vec3::new(-100.0, -100.0, 0.0)).unwrap();
        assert!(!far.drivable);
    }
}
