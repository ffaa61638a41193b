//! Scenario documents: what to spawn and how the run is tuned.
//!
//! Field names are snake_case. Older scenario files spell a few fields
//! differently (`spawn_point`, `spawn_walkersensor_v2v`, `go_to_point`); those
//! spellings are accepted as aliases.
use crate::error::DirectorError;
use crate::validator::IndexValidator;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_VEHICLE_MODEL: &str = "vehicle.tesla.model3";
pub const DEFAULT_WALKER_SPEED: f64 = 1.4;
pub const DEFAULT_SAFE_DISTANCE: f64 = 10.0;
pub const DEFAULT_TRAFFIC_MANAGER_PORT: u16 = 8000;
pub const DEFAULT_HAZARD_LIGHT_RADIUS: f64 = 20.0;
pub const DEFAULT_FIXED_DELTA_SECONDS: f64 = 0.05;
pub const DEFAULT_V2V_PROXIMITY_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub spectator: Option<SpectatorSpec>,
    #[serde(default)]
    pub vehicles: Vec<VehicleSpec>,
    #[serde(default)]
    pub walkers: Vec<WalkerSpec>,
    #[serde(default)]
    pub scenario_config: ScenarioSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectatorSpec {
    #[serde(alias = "spawn_point")]
    pub spawn_index: i64,
    #[serde(default, alias = "spawn_walkersensor_v2v")]
    pub attach_sensors: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpec {
    #[serde(alias = "spawn_point")]
    pub spawn_index: i64,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub route: Vec<i64>,
    #[serde(default)]
    pub autopilot: bool,
    #[serde(default, alias = "spawn_walkersensor_v2v")]
    pub attach_sensors: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkerSpec {
    #[serde(alias = "spawn_point")]
    pub spawn_index: i64,
    #[serde(default, alias = "go_to_point")]
    pub go_to_route: Vec<i64>,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

/// Run-wide tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSettings {
    #[serde(default = "default_safe_distance")]
    pub safe_distance_to_observer: f64,
    #[serde(default = "default_safe_distance")]
    pub safe_distance_between_vehicles: f64,
    #[serde(default = "default_port")]
    pub traffic_manager_port: u16,
    /// Share of pedestrians allowed to cross roads, 0.0 to 1.0.
    #[serde(default = "default_crossing_factor")]
    pub pedestrians_crossing_factor: f64,
    #[serde(default = "default_hazard_radius")]
    pub hazard_light_radius: f64,
    #[serde(default = "default_fixed_delta")]
    pub fixed_delta_seconds: f64,
    /// Vehicles closer than this hear each other's V2V broadcasts.
    #[serde(default = "default_v2v_threshold")]
    pub v2v_proximity_threshold: f64,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            safe_distance_to_observer: DEFAULT_SAFE_DISTANCE,
            safe_distance_between_vehicles: DEFAULT_SAFE_DISTANCE,
            traffic_manager_port: DEFAULT_TRAFFIC_MANAGER_PORT,
            pedestrians_crossing_factor: default_crossing_factor(),
            hazard_light_radius: DEFAULT_HAZARD_LIGHT_RADIUS,
            fixed_delta_seconds: DEFAULT_FIXED_DELTA_SECONDS,
            v2v_proximity_threshold: DEFAULT_V2V_PROXIMITY_THRESHOLD,
        }
    }
}

fn default_model() -> String {
    DEFAULT_VEHICLE_MODEL.to_string()
}

fn default_speed() -> f64 {
    DEFAULT_WALKER_SPEED
}

fn default_safe_distance() -> f64 {
    DEFAULT_SAFE_DISTANCE
}

fn default_port() -> u16 {
    DEFAULT_TRAFFIC_MANAGER_PORT
}

fn default_crossing_factor() -> f64 {
    1.0
}

fn default_hazard_radius() -> f64 {
    DEFAULT_HAZARD_LIGHT_RADIUS
}

fn default_fixed_delta() -> f64 {
    DEFAULT_FIXED_DELTA_SECONDS
}

fn default_v2v_threshold() -> f64 {
    DEFAULT_V2V_PROXIMITY_THRESHOLD
}

pub fn load_scenario(path: &Path) -> Result<ScenarioConfig> {
    let bytes = fs::read(path).with_context(|| format!("read scenario {}", path.display()))?;
    let config: ScenarioConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse scenario JSON {}", path.display()))?;
    Ok(config)
}

/// Reject documents that cannot be run at all.
///
/// Index problems are not checked here; they only cost the actor involved.
pub fn validate_scenario(config: &ScenarioConfig) -> Result<(), DirectorError> {
    for (position, walker) in config.walkers.iter().enumerate() {
        if walker.go_to_route.is_empty() {
            return Err(DirectorError::MalformedScenario(format!(
                "walkers[{position}] has an empty go_to_route"
            )));
        }
        let usable_speed = walker.speed.is_finite() && walker.speed > 0.0;
        if !usable_speed {
            return Err(DirectorError::MalformedScenario(format!(
                "walkers[{position}] speed must be positive, got {}",
                walker.speed
            )));
        }
    }

    let settings = &config.scenario_config;
    for (name, value) in [
        ("safe_distance_to_observer", settings.safe_distance_to_observer),
        (
            "safe_distance_between_vehicles",
            settings.safe_distance_between_vehicles,
        ),
        ("hazard_light_radius", settings.hazard_light_radius),
        ("v2v_proximity_threshold", settings.v2v_proximity_threshold),
    ] {
        let usable = value.is_finite() && value >= 0.0;
        if !usable {
            return Err(DirectorError::MalformedScenario(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
    }
    let dt = settings.fixed_delta_seconds;
    let usable_dt = dt > 0.0 && dt <= 1.0;
    if !usable_dt {
        return Err(DirectorError::MalformedScenario(format!(
            "fixed_delta_seconds must be in (0, 1], got {dt}"
        )));
    }
    Ok(())
}

/// One spawn index a run would skip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexIssue {
    pub actor: String,
    pub field: &'static str,
    pub index: i64,
    pub reason: String,
}

/// Every index the executor would reject, without spawning anything.
///
/// Vehicles and the spectator only need indices on the map; walkers also
/// avoid the reserved set. Routes of vehicles without autopilot are never
/// used, so they are not checked.
pub fn check_indices(config: &ScenarioConfig, validator: &IndexValidator) -> Vec<IndexIssue> {
    let mut issues = Vec::new();
    let mut record = |actor: String, field: &'static str, index: i64, reserved_ok: bool| {
        let verdict = if reserved_ok {
            validator.check_in_range(index)
        } else {
            validator.check(index)
        };
        if let Err(err) = verdict {
            issues.push(IndexIssue {
                actor,
                field,
                index,
                reason: err.to_string(),
            });
        }
    };

    if let Some(spectator) = &config.spectator {
        record("spectator".to_string(), "spawn_index", spectator.spawn_index, true);
    }
    for (position, vehicle) in config.vehicles.iter().enumerate() {
        let actor = format!("vehicles[{position}]");
        record(actor.clone(), "spawn_index", vehicle.spawn_index, true);
        if !vehicle.autopilot {
            continue;
        }
        for &index in &vehicle.route {
            record(actor.clone(), "route", index, true);
        }
    }
    for (position, walker) in config.walkers.iter().enumerate() {
        let actor = format!("walkers[{position}]");
        record(actor.clone(), "spawn_index", walker.spawn_index, false);
        for &index in &walker.go_to_route {
            record(actor.clone(), "go_to_route", index, false);
        }
    }
    issues
}
