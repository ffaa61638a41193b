//! Command runners behind the CLI.
use crate::cli::{CheckArgs, RunArgs};
use crate::engine::kinematic::KinematicEngine;
use crate::executor::{ExecutionSummary, ScenarioExecutor, TickReport};
use crate::map::{default_town, load_map, TownMap};
use crate::registry::CleanupReport;
use crate::scenario::{check_indices, load_scenario, validate_scenario, IndexIssue};
use crate::sidewalk::SidewalkZoneMap;
use crate::validator::IndexValidator;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub scenario: String,
    pub map: String,
    pub spawn_points: usize,
    pub sidewalk_indices: usize,
    pub reserved_indices: usize,
    pub vehicles: usize,
    pub walkers: usize,
    pub issues: Vec<IndexIssue>,
}

/// Per-tick counters summed over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickTotals {
    pub arrivals: usize,
    pub completions: usize,
    pub walker_commands: usize,
    pub lost_walkers: usize,
    pub brake_engagements: usize,
    pub hazard_light_ticks: usize,
    pub v2v_contacts: usize,
}

impl TickTotals {
    pub fn absorb(&mut self, tick: &TickReport) {
        self.arrivals += tick.walkers.arrivals;
        self.completions += tick.walkers.completed.len();
        self.walker_commands += tick.walkers.commands;
        self.lost_walkers += tick.walkers.lost;
        self.brake_engagements += tick.braking;
        self.hazard_light_ticks += tick.hazard_lights_on;
        self.v2v_contacts += tick.nearby_vehicles.len();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub map: String,
    pub ticks: u32,
    pub fixed_delta_seconds: f64,
    pub simulated_seconds: f64,
    pub execution: ExecutionSummary,
    pub totals: TickTotals,
    pub walkers_remaining: usize,
    pub cleanup: CleanupReport,
}

pub fn run_check(args: CheckArgs) -> Result<()> {
    let config = load_scenario(&args.scenario)?;
    validate_scenario(&config)
        .with_context(|| format!("validate scenario {}", args.scenario.display()))?;
    let town = load_town(args.map.as_deref())?;
    let zones = SidewalkZoneMap::new(&town.sidewalks, town.spawn_points.len())
        .with_context(|| format!("validate sidewalk table for map {}", town.name))?;
    let validator = IndexValidator::new(town.spawn_points.len(), town.reserved.clone());

    let report = CheckReport {
        scenario: args.scenario.display().to_string(),
        map: town.name.clone(),
        spawn_points: town.spawn_points.len(),
        sidewalk_indices: zones.classified_len(),
        reserved_indices: town.reserved.len(),
        vehicles: config.vehicles.len(),
        walkers: config.walkers.len(),
        issues: check_indices(&config, &validator),
    };
    tracing::info!(issues = report.issues.len(), "scenario checked");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "scenario {} on map {} ({} spawn points)",
        report.scenario, report.map, report.spawn_points
    );
    println!(
        "vehicles: {}  walkers: {}",
        report.vehicles, report.walkers
    );
    if report.issues.is_empty() {
        println!("no index problems");
    }
    for issue in &report.issues {
        println!(
            "skip {} {} {}: {}",
            issue.actor, issue.field, issue.index, issue.reason
        );
    }
    Ok(())
}

pub fn run_scenario(args: RunArgs) -> Result<()> {
    let config = load_scenario(&args.scenario)?;
    let town = load_town(args.map.as_deref())?;
    let engine = KinematicEngine::new(&town);
    let mut executor = ScenarioExecutor::new(engine, &town.sidewalks, town.reserved.clone())
        .with_context(|| format!("prepare map {}", town.name))?;

    let execution = executor
        .execute(&config)
        .with_context(|| format!("execute scenario {}", args.scenario.display()))?;

    let dt = config.scenario_config.fixed_delta_seconds;
    let mut totals = TickTotals::default();
    for tick in 0..args.ticks {
        let report = executor.tick();
        totals.absorb(&report);
        executor.engine_mut().step(dt);
        if report.braking > 0 {
            tracing::debug!(tick, braking = report.braking, "vehicles braking");
        }
    }
    let walkers_remaining = executor.walkers().len();
    let simulated_seconds = executor.engine().elapsed();
    let cleanup = executor.cleanup();

    let report = RunReport {
        scenario: args.scenario.display().to_string(),
        map: town.name.clone(),
        ticks: args.ticks,
        fixed_delta_seconds: dt,
        simulated_seconds,
        execution,
        totals,
        walkers_remaining,
        cleanup,
    };
    println!(
        "ran {} ticks: {} walkers completed, {} brake engagements, {} actors destroyed",
        report.ticks,
        report.totals.completions,
        report.totals.brake_engagements,
        report.cleanup.destroyed
    );
    if let Some(path) = &args.report {
        write_json(path, &report)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn load_town(path: Option<&Path>) -> Result<TownMap> {
    match path {
        Some(path) => load_map(path),
        None => Ok(default_town()),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ActorHandle;
    use crate::v2v::NearbyVehicles;
    use crate::walkers::WalkerUpdate;

    #[test]
    fn totals_accumulate_tick_reports() {
        let mut totals = TickTotals::default();
        let tick = TickReport {
            walkers: WalkerUpdate {
                arrivals: 1,
                completed: vec![ActorHandle(3)],
                commands: 2,
                lost: 0,
            },
            braking: 1,
            hazard_lights_on: 2,
            nearby_vehicles: vec![NearbyVehicles {
                vehicle: ActorHandle(5),
                other: ActorHandle(6),
                distance: 12.0,
                other_speed: 8.0,
            }],
        };
        totals.absorb(&tick);
        totals.absorb(&tick);
        assert_eq!(
            totals,
            TickTotals {
                arrivals: 2,
                completions: 2,
                walker_commands: 4,
                lost_walkers: 0,
                brake_engagements: 2,
                hazard_light_ticks: 4,
                v2v_contacts: 2,
            }
        );
    }
}
