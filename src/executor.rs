//! Scenario execution and the per-tick pipeline.
//!
//! `execute` spawns the observer's sensors, then vehicles, then walkers.
//! Every actor is registered the moment it exists. Per-actor failures are
//! logged and skipped; anything else tears down what was spawned and is
//! returned. `tick` runs walkers, then the proximity guard, then hazard
//! lights, then the V2V exchange.
use crate::detection::{resolve, Detection, SensorEvent};
use crate::engine::{ActorHandle, Engine};
use crate::error::DirectorError;
use crate::geometry::{Transform, Vec3};
use crate::hazard::HazardLightPolicy;
use crate::proximity::{lanes_share_direction, Observer, ProximityGuard};
use crate::registry::{ActorKind, ActorRegistry, CleanupReport};
use crate::routes::RouteAssigner;
use crate::scenario::{
    validate_scenario, ScenarioConfig, ScenarioSettings, SpectatorSpec, VehicleSpec, WalkerSpec,
};
use crate::sidewalk::{SidewalkTable, SidewalkZoneMap};
use crate::spawn_points::SpawnPointIndex;
use crate::validator::{IndexValidator, ReservedIndexSet};
use crate::v2v::{NearbyVehicles, V2vExchange};
use crate::walkers::{WalkerRouteManager, WalkerUpdate};
use serde::Serialize;

pub const WALKER_BLUEPRINT: &str = "walker.pedestrian.0001";
pub const SENSOR_BLUEPRINTS: [&str; 2] = [
    "sensor.other.walker_detection",
    "sensor.other.v2v_broadcast",
];
/// Sensors ride one unit above their parent's origin.
const SENSOR_MOUNT: Vec3 = Vec3::new(0.0, 0.0, 1.0);

/// An actor `execute` gave up on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedActor {
    pub actor: String,
    pub class: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub vehicles_spawned: usize,
    pub walkers_spawned: usize,
    pub sensors_spawned: usize,
    pub routes_assigned: usize,
    pub skipped: Vec<SkippedActor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub walkers: WalkerUpdate,
    pub braking: usize,
    pub hazard_lights_on: usize,
    pub nearby_vehicles: Vec<NearbyVehicles>,
}

pub struct ScenarioExecutor<E: Engine> {
    engine: E,
    spawn_points: SpawnPointIndex,
    zones: SidewalkZoneMap,
    validator: IndexValidator,
    registry: ActorRegistry,
    walkers: WalkerRouteManager,
    managed_vehicles: Vec<ActorHandle>,
    observer: Option<ActorHandle>,
    guard: ProximityGuard,
    hazard: HazardLightPolicy,
    v2v: V2vExchange,
}

impl<E: Engine> ScenarioExecutor<E> {
    /// Take ownership of `engine` and validate the static tables against its map.
    ///
    /// An engine with no spawn points is accepted here; `execute` reports it.
    pub fn new(
        engine: E,
        sidewalks: &SidewalkTable,
        reserved: ReservedIndexSet,
    ) -> Result<Self, DirectorError> {
        let spawn_points = SpawnPointIndex::new(engine.spawn_points())?;
        let zones = if spawn_points.is_empty() {
            SidewalkZoneMap::default()
        } else {
            SidewalkZoneMap::new(sidewalks, spawn_points.len())?
        };
        let validator = IndexValidator::new(spawn_points.len(), reserved);
        let walkers = WalkerRouteManager::new(spawn_points.clone(), zones.clone());
        let settings = ScenarioSettings::default();
        Ok(Self {
            engine,
            spawn_points,
            zones,
            validator,
            registry: ActorRegistry::new(),
            walkers,
            managed_vehicles: Vec::new(),
            observer: None,
            guard: ProximityGuard::new(
                settings.safe_distance_to_observer,
                settings.traffic_manager_port,
            ),
            hazard: HazardLightPolicy::new(settings.hazard_light_radius),
            v2v: V2vExchange::new(settings.v2v_proximity_threshold),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    pub fn walkers(&self) -> &WalkerRouteManager {
        &self.walkers
    }

    pub fn managed_vehicles(&self) -> &[ActorHandle] {
        &self.managed_vehicles
    }

    pub fn observer(&self) -> Option<ActorHandle> {
        self.observer
    }

    pub fn execute(&mut self, config: &ScenarioConfig) -> Result<ExecutionSummary, DirectorError> {
        match self.spawn_all(config) {
            Ok(summary) => {
                tracing::info!(
                    vehicles = summary.vehicles_spawned,
                    walkers = summary.walkers_spawned,
                    sensors = summary.sensors_spawned,
                    skipped = summary.skipped.len(),
                    "scenario spawned"
                );
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(error = %err, class = %err.class(), "scenario aborted");
                self.cleanup();
                Err(err)
            }
        }
    }

    fn spawn_all(&mut self, config: &ScenarioConfig) -> Result<ExecutionSummary, DirectorError> {
        validate_scenario(config)?;
        let settings = &config.scenario_config;
        self.guard = ProximityGuard::new(
            settings.safe_distance_to_observer,
            settings.traffic_manager_port,
        );
        self.hazard = HazardLightPolicy::new(settings.hazard_light_radius);
        self.v2v = V2vExchange::new(settings.v2v_proximity_threshold);
        self.walkers.set_step_seconds(settings.fixed_delta_seconds);

        if self.spawn_points.is_empty() {
            return Err(DirectorError::NoSpawnPoints);
        }

        let mut summary = ExecutionSummary::default();
        if let Some(spectator) = &config.spectator {
            let result = self.place_spectator(spectator, &mut summary);
            contain("spectator".to_string(), result, &mut summary)?;
        }

        for (position, vehicle) in config.vehicles.iter().enumerate() {
            let result = self.spawn_vehicle(vehicle, settings, &mut summary);
            contain(format!("vehicles[{position}]"), result, &mut summary)?;
        }

        self.engine
            .set_pedestrians_crossing_factor(settings.pedestrians_crossing_factor);

        for (position, walker) in config.walkers.iter().enumerate() {
            let result = self.spawn_walker(walker, &mut summary);
            contain(format!("walkers[{position}]"), result, &mut summary)?;
        }
        Ok(summary)
    }

    fn place_spectator(
        &mut self,
        spec: &SpectatorSpec,
        summary: &mut ExecutionSummary,
    ) -> Result<(), DirectorError> {
        let index = self.validator.check_in_range(spec.spawn_index)?;
        let transform = self.spawn_points.transform(index)?;
        let spectator = self.engine.spectator();
        self.engine.set_transform(spectator, &transform)?;
        self.observer = Some(spectator);
        tracing::info!(index, "spectator placed");
        if spec.attach_sensors {
            self.attach_sensors(spectator, summary)?;
        }
        Ok(())
    }

    fn spawn_vehicle(
        &mut self,
        spec: &VehicleSpec,
        settings: &ScenarioSettings,
        summary: &mut ExecutionSummary,
    ) -> Result<(), DirectorError> {
        let index = self.validator.check_in_range(spec.spawn_index)?;
        let route = if spec.autopilot {
            spec.route
                .iter()
                .map(|&step| self.validator.check_in_range(step))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            if !spec.route.is_empty() {
                tracing::warn!(
                    index,
                    route = ?spec.route,
                    "route ignored for vehicle without autopilot"
                );
            }
            Vec::new()
        };
        let transform = self.spawn_points.transform(index)?;

        let handle = self.engine.spawn_actor(&spec.model, &transform, None)?;
        self.registry.register(handle, ActorKind::Vehicle, None);
        summary.vehicles_spawned += 1;
        tracing::info!(%handle, index, model = %spec.model, "vehicle spawned");

        if spec.attach_sensors {
            self.attach_sensors(handle, summary)?;
        }
        if !spec.autopilot {
            return Ok(());
        }

        self.engine
            .set_autopilot(handle, true, settings.traffic_manager_port)?;
        self.engine
            .set_distance_to_leading_vehicle(handle, settings.safe_distance_between_vehicles)?;
        self.managed_vehicles.push(handle);
        if !route.is_empty() {
            RouteAssigner::assign(&mut self.engine, handle, &route, &self.spawn_points)?;
            summary.routes_assigned += 1;
        }
        Ok(())
    }

    fn spawn_walker(
        &mut self,
        spec: &WalkerSpec,
        summary: &mut ExecutionSummary,
    ) -> Result<(), DirectorError> {
        let index = self.validator.check(spec.spawn_index)?;
        let route = spec
            .go_to_route
            .iter()
            .map(|&step| self.validator.check(step))
            .collect::<Result<Vec<_>, _>>()?;
        let transform = self.zones.transform_for(&self.spawn_points, index)?;

        let handle = self.engine.spawn_actor(WALKER_BLUEPRINT, &transform, None)?;
        let key = self.registry.register(handle, ActorKind::Walker, None);
        summary.walkers_spawned += 1;
        tracing::info!(%handle, index, ?route, "walker spawned");

        self.walkers.add_walker(key, handle, route, spec.speed)
    }

    fn attach_sensors(
        &mut self,
        parent: ActorHandle,
        summary: &mut ExecutionSummary,
    ) -> Result<(), DirectorError> {
        let mount = Transform::from_location(SENSOR_MOUNT);
        for blueprint in SENSOR_BLUEPRINTS {
            let sensor = self.engine.spawn_actor(blueprint, &mount, Some(parent))?;
            self.registry
                .register(sensor, ActorKind::Sensor, Some(parent));
            summary.sensors_spawned += 1;
            self.engine.start_sensor(sensor)?;
            tracing::debug!(%sensor, %parent, blueprint, "sensor attached");
        }
        Ok(())
    }

    /// One pass of the per-tick pipeline. Commands take effect on the engine's
    /// next step.
    pub fn tick(&mut self) -> TickReport {
        let walkers = self.walkers.update(&mut self.engine, &mut self.registry);

        let braking = match self.observer {
            Some(handle) => match Observer::locate(&self.engine, handle) {
                Ok(observer) => self
                    .guard
                    .apply(
                        &mut self.engine,
                        &observer,
                        &self.managed_vehicles,
                        lanes_share_direction::<E>,
                    )
                    .iter()
                    .filter(|decision| decision.braking)
                    .count(),
                Err(err) => {
                    tracing::warn!(%handle, error = %err, "observer unavailable");
                    0
                }
            },
            None => 0,
        };

        let walker_handles: Vec<ActorHandle> =
            self.walkers.tasks().iter().map(|task| task.handle()).collect();
        let hazard_lights_on =
            self.hazard
                .apply(&mut self.engine, &self.managed_vehicles, &walker_handles);
        let nearby_vehicles = self.v2v.exchange(&self.engine, &self.managed_vehicles);

        TickReport {
            walkers,
            braking,
            hazard_lights_on,
            nearby_vehicles,
        }
    }

    /// Walkers named in a walker-detection event that this run spawned.
    pub fn handle_walker_detection(&self, event: &SensorEvent) -> Vec<Detection> {
        resolve(&self.registry, event, ActorKind::Walker)
    }

    /// Vehicles named in a V2V broadcast event that this run spawned.
    pub fn handle_v2v_broadcast(&self, event: &SensorEvent) -> Vec<Detection> {
        resolve(&self.registry, event, ActorKind::Vehicle)
    }

    /// Destroy everything this run spawned. Safe to call at any point, repeatedly.
    pub fn cleanup(&mut self) -> CleanupReport {
        self.walkers.clear();
        self.managed_vehicles.clear();
        self.observer = None;
        self.registry.cleanup(&mut self.engine)
    }
}

/// Swallow per-actor failures into `summary`; pass everything else through.
fn contain(
    actor: String,
    result: Result<(), DirectorError>,
    summary: &mut ExecutionSummary,
) -> Result<(), DirectorError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_contained() => {
            tracing::warn!(%actor, class = %err.class(), error = %err, "skipping actor");
            summary.skipped.push(SkippedActor {
                actor,
                class: err.class().as_str(),
                reason: err.to_string(),
            });
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
