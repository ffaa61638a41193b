use super::{ScenarioExecutor, SENSOR_BLUEPRINTS};
use crate::detection::SensorEvent;
use crate::engine::kinematic::{BodyKind, KinematicEngine};
use crate::engine::{ActorHandle, Engine, LaneChangePolicy};
use crate::error::DirectorError;
use crate::geometry::{SpawnPoint, Transform, Vec3};
use crate::map::default_town;
use crate::registry::ActorKind;
use crate::scenario::ScenarioConfig;
use crate::sidewalk::SidewalkTable;
use crate::validator::ReservedIndexSet;

fn town_executor() -> ScenarioExecutor<KinematicEngine> {
    town_executor_with(|_| {})
}

fn town_executor_with(
    prepare: impl FnOnce(&mut KinematicEngine),
) -> ScenarioExecutor<KinematicEngine> {
    let town = default_town();
    let mut engine = KinematicEngine::new(&town);
    prepare(&mut engine);
    ScenarioExecutor::new(engine, &town.sidewalks, town.reserved.clone()).expect("town executor")
}

fn scenario(json: &str) -> ScenarioConfig {
    serde_json::from_str(json).expect("scenario JSON")
}

fn handles_of(executor: &ScenarioExecutor<KinematicEngine>, kind: ActorKind) -> Vec<ActorHandle> {
    executor
        .registry()
        .iter()
        .filter(|(_, entry)| entry.kind == kind)
        .map(|(_, entry)| entry.handle)
        .collect()
}

#[test]
fn vehicle_and_walker_run_to_walker_completion() {
    let mut executor = town_executor();
    let config = scenario(
        r#"{
            "vehicles": [{"spawn_index": 3, "route": [3, 10, 3], "autopilot": true}],
            "walkers": [{"spawn_index": 0, "go_to_route": [5], "speed": 1.4}]
        }"#,
    );

    let summary = executor.execute(&config).expect("execute");

    assert_eq!(summary.vehicles_spawned, 1);
    assert_eq!(summary.walkers_spawned, 1);
    assert_eq!(summary.routes_assigned, 1);
    assert!(summary.skipped.is_empty());
    assert_eq!(executor.registry().len(), 2);

    let vehicle = handles_of(&executor, ActorKind::Vehicle)[0];
    let walker = handles_of(&executor, ActorKind::Walker)[0];
    let engine = executor.engine();
    assert!(engine.autopilot_enabled(vehicle));
    assert_eq!(engine.lane_policy(vehicle), Some(LaneChangePolicy::disabled()));
    assert_eq!(engine.leading_distance(vehicle), Some(10.0));
    assert_eq!(engine.assigned_path(vehicle).map(<[Vec3]>::len), Some(3));
    assert_eq!(engine.crossing_factor(), 1.0);
    // Index 0 is a Bottom-zone sidewalk point.
    assert_eq!(
        engine.position(walker).unwrap(),
        Vec3::new(-4.0, 0.0, 0.5)
    );

    let mut completions = Vec::new();
    for _ in 0..400 {
        let report = executor.tick();
        completions.extend(report.walkers.completed);
        executor.engine_mut().step(0.5);
        if executor.walkers().is_empty() {
            break;
        }
    }

    assert_eq!(completions, vec![walker]);
    assert!(executor.walkers().is_empty());
    assert_eq!(executor.registry().len(), 1);
    assert_eq!(executor.engine().destroy_calls(walker), 1);

    let report = executor.cleanup();
    assert_eq!(report.destroy_attempts(), 1);
    assert_eq!(executor.engine().destroy_calls(walker), 1);
    assert_eq!(executor.engine().destroy_calls(vehicle), 1);
    assert_eq!(executor.engine().live_count(), 0);
}

#[test]
fn reserved_walker_index_is_skipped_and_batch_continues() {
    let mut executor = town_executor();
    let config = scenario(
        r#"{
            "walkers": [
                {"spawn_index": 42, "go_to_route": [5]},
                {"spawn_index": 0, "go_to_route": [2]},
                {"spawn_index": 6, "go_to_route": [5]}
            ]
        }"#,
    );

    let summary = executor.execute(&config).expect("execute");

    assert_eq!(summary.walkers_spawned, 1);
    let skipped: Vec<_> = summary
        .skipped
        .iter()
        .map(|skip| (skip.actor.as_str(), skip.class))
        .collect();
    assert_eq!(
        skipped,
        vec![
            ("walkers[0]", "policy_rejection"),
            ("walkers[1]", "policy_rejection"),
        ]
    );
    assert_eq!(executor.walkers().len(), 1);
}

#[test]
fn vehicles_ignore_the_reserved_set() {
    let mut executor = town_executor();
    let config = scenario(r#"{"vehicles": [{"spawn_index": 42, "route": [41, 42]}]}"#);
    let summary = executor.execute(&config).expect("execute");
    assert_eq!(summary.vehicles_spawned, 1);
    // Not on autopilot, so the route is never handed over.
    assert_eq!(summary.routes_assigned, 0);
    assert!(executor.managed_vehicles().is_empty());
}

#[test]
fn route_of_a_vehicle_without_autopilot_is_not_checked() {
    let mut executor = town_executor();
    let config = scenario(r#"{"vehicles": [{"spawn_index": 3, "route": [500, -2]}]}"#);

    let summary = executor.execute(&config).expect("execute");

    assert_eq!(summary.vehicles_spawned, 1);
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.routes_assigned, 0);
}

#[test]
fn missing_model_and_spawn_collision_are_contained() {
    let mut executor = town_executor_with(|engine| engine.remove_blueprint("vehicle.unknown"));
    let config = scenario(
        r#"{
            "vehicles": [
                {"spawn_index": 3, "model": "vehicle.unknown"},
                {"spawn_index": 4},
                {"spawn_index": 4},
                {"spawn_index": 500}
            ]
        }"#,
    );

    let summary = executor.execute(&config).expect("execute");

    assert_eq!(summary.vehicles_spawned, 1);
    let classes: Vec<_> = summary.skipped.iter().map(|skip| skip.class).collect();
    assert_eq!(
        classes,
        vec!["resource_unavailable", "engine_failure", "policy_rejection"]
    );
    assert_eq!(executor.registry().len(), 1);
}

#[test]
fn teardown_destroys_exactly_what_was_registered_even_when_every_destroy_fails() {
    let mut executor = town_executor();
    let config = scenario(
        r#"{
            "vehicles": [{"spawn_index": 4}, {"spawn_index": 4}, {"spawn_index": 8}],
            "walkers": [{"spawn_index": 0, "go_to_route": [5]}, {"spawn_index": 1, "go_to_route": [5]}]
        }"#,
    );
    executor.execute(&config).expect("execute");
    let registered = executor.registry().len();
    assert_eq!(registered, 3);
    executor.engine_mut().fail_all_destroys();

    let report = executor.cleanup();

    assert_eq!(report.destroy_attempts(), registered);
    assert_eq!(report.destroy_failures, registered);
    assert_eq!(executor.engine().total_destroy_calls(), registered);
    assert!(executor.registry().is_empty());
    assert!(executor.walkers().is_empty());
}

#[test]
fn vehicle_sensors_are_registered_started_and_stopped_first() {
    let mut executor = town_executor();
    let config = scenario(
        r#"{"vehicles": [{"spawn_index": 3, "spawn_walkersensor_v2v": true}]}"#,
    );

    let summary = executor.execute(&config).expect("execute");

    assert_eq!(summary.sensors_spawned, SENSOR_BLUEPRINTS.len());
    let vehicle = handles_of(&executor, ActorKind::Vehicle)[0];
    let sensors = handles_of(&executor, ActorKind::Sensor);
    assert_eq!(sensors.len(), 2);
    for &sensor in &sensors {
        assert!(executor.engine().is_listening(sensor));
        assert_eq!(executor.engine().parent_of(sensor), Some(vehicle));
        assert_eq!(executor.engine().kind_of(sensor), Some(BodyKind::Sensor));
    }

    let report = executor.cleanup();

    assert_eq!(report.stopped, 2);
    assert_eq!(executor.engine().stop_calls().len(), 2);
    assert_eq!(executor.engine().destroy_log().last(), Some(&vehicle));
}

#[test]
fn spectator_sensors_attach_to_the_spectator() {
    let mut executor = town_executor();
    let config = scenario(r#"{"spectator": {"spawn_point": 7, "spawn_walkersensor_v2v": true}}"#);

    executor.execute(&config).expect("execute");

    let spectator = executor.engine().spectator();
    assert_eq!(executor.observer(), Some(spectator));
    assert_eq!(
        executor.engine().position(spectator).unwrap(),
        Vec3::new(210.0, 0.0, 0.5)
    );
    let sensors = handles_of(&executor, ActorKind::Sensor);
    assert_eq!(sensors.len(), 2);
    assert!(sensors
        .iter()
        .all(|&sensor| executor.engine().parent_of(sensor) == Some(spectator)));
    assert!(!executor.registry().contains_handle(spectator));
}

#[test]
fn approaching_vehicle_brakes_near_the_spectator() {
    let mut executor = town_executor();
    // Row 1 runs westbound: 13 sits 30 units east of 12, facing it.
    let config = scenario(
        r#"{
            "spectator": {"spawn_index": 12},
            "vehicles": [{"spawn_index": 13, "autopilot": true}],
            "scenario_config": {"safe_distance_to_observer": 40.0}
        }"#,
    );
    executor.execute(&config).expect("execute");
    let vehicle = executor.managed_vehicles()[0];

    let report = executor.tick();

    assert_eq!(report.braking, 1);
    let controls = executor.engine().vehicle_controls();
    assert_eq!(controls.len(), 1);
    assert_eq!(controls[0].0, vehicle);
    assert_eq!(controls[0].1.brake, 1.0);
    assert_eq!(controls[0].1.throttle, 0.0);
}

#[test]
fn hazard_lights_come_on_near_walkers() {
    let mut executor = town_executor();
    let config = scenario(
        r#"{
            "vehicles": [{"spawn_index": 3, "autopilot": true}],
            "walkers": [{"spawn_index": 3, "go_to_route": [7]}]
        }"#,
    );
    executor.execute(&config).expect("execute");
    let vehicle = executor.managed_vehicles()[0];

    let report = executor.tick();

    assert_eq!(report.hazard_lights_on, 1);
    assert!(executor.engine().hazard_lights(vehicle));
}

#[test]
fn malformed_scenario_spawns_nothing() {
    let mut executor = town_executor();
    let config = scenario(
        r#"{
            "vehicles": [{"spawn_index": 3}],
            "walkers": [{"spawn_index": 0, "go_to_route": []}]
        }"#,
    );

    let err = executor.execute(&config).unwrap_err();

    assert!(matches!(err, DirectorError::MalformedScenario(_)));
    assert_eq!(executor.engine().live_count(), 0);
    assert!(executor.registry().is_empty());
}

#[test]
fn empty_map_fails_the_whole_run() {
    let engine = KinematicEngine::with_spawn_points(Vec::new(), Vec::new());
    let mut executor =
        ScenarioExecutor::new(engine, &SidewalkTable::town(), ReservedIndexSet::town())
            .expect("empty maps are accepted until execute");
    let config = scenario(r#"{"vehicles": [{"spawn_index": 0}]}"#);

    let err = executor.execute(&config).unwrap_err();

    assert!(matches!(err, DirectorError::NoSpawnPoints));
    assert_eq!(executor.engine().total_destroy_calls(), 0);
}

#[test]
fn sidewalk_table_must_fit_the_map() {
    let points: Vec<SpawnPoint> = (0..10)
        .map(|index| SpawnPoint {
            index,
            transform: Transform::from_location(Vec3::new(index as f64 * 10.0, 0.0, 0.0)),
        })
        .collect();
    let engine = KinematicEngine::with_spawn_points(points, vec![1; 10]);
    let err = ScenarioExecutor::new(engine, &SidewalkTable::town(), ReservedIndexSet::town())
        .err()
        .expect("town table does not fit a ten-point map");
    assert!(matches!(err, DirectorError::InvalidZoneTable(_)));
}

#[test]
fn cleanup_twice_is_safe() {
    let mut executor = town_executor();
    executor
        .execute(&scenario(r#"{"vehicles": [{"spawn_index": 3}]}"#))
        .expect("execute");
    executor.cleanup();
    let second = executor.cleanup();
    assert_eq!(second.destroy_attempts(), 0);
    assert_eq!(executor.engine().total_destroy_calls(), 1);
}

#[test]
fn nearby_autopilot_vehicles_exchange_v2v_state() {
    let mut executor = town_executor();
    // Spawn points sit 30 units apart along row 0.
    let config = scenario(
        r#"{
            "vehicles": [
                {"spawn_index": 3, "autopilot": true},
                {"spawn_index": 4, "autopilot": true},
                {"spawn_index": 6, "autopilot": true},
                {"spawn_index": 7}
            ],
            "scenario_config": {"v2v_proximity_threshold": 40.0}
        }"#,
    );
    executor.execute(&config).expect("execute");
    let managed = executor.managed_vehicles().to_vec();

    let report = executor.tick();

    assert_eq!(report.nearby_vehicles.len(), 1);
    let pair = report.nearby_vehicles[0];
    assert_eq!((pair.vehicle, pair.other), (managed[0], managed[1]));
    assert!((pair.distance - 30.0).abs() < 1e-9);
    assert_eq!(pair.other_speed, 0.0);
}

#[test]
fn sensor_events_resolve_to_actors_this_run_owns() {
    let mut executor = town_executor();
    let config = scenario(
        r#"{
            "vehicles": [{"spawn_index": 3, "autopilot": true, "attach_sensors": true}],
            "walkers": [{"spawn_index": 0, "go_to_route": [5]}]
        }"#,
    );
    executor.execute(&config).expect("execute");
    let vehicle = handles_of(&executor, ActorKind::Vehicle)[0];
    let walker = handles_of(&executor, ActorKind::Walker)[0];
    let event = SensorEvent::new([
        (walker, Vec3::new(-4.0, 0.0, 0.5)),
        (vehicle, Vec3::new(90.0, 0.0, 0.5)),
        (ActorHandle(9_999), Vec3::ZERO),
    ]);

    let walkers = executor.handle_walker_detection(&event);
    let vehicles = executor.handle_v2v_broadcast(&event);

    assert_eq!(walkers.len(), 1);
    assert_eq!(walkers[0].handle, walker);
    assert_eq!(walkers[0].location, Vec3::new(-4.0, 0.0, 0.5));
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0].handle, vehicle);

    executor.cleanup();
    assert!(executor.handle_walker_detection(&event).is_empty());
}

#[test]
fn fast_walker_completes_at_the_configured_step() {
    let mut executor = town_executor();
    // Ten units per step would otherwise hop back and forth across the
    // arrival radius around index 1, about 34 units away.
    let config = scenario(
        r#"{
            "walkers": [{"spawn_index": 0, "go_to_route": [1], "speed": 10.0}],
            "scenario_config": {"fixed_delta_seconds": 1.0}
        }"#,
    );
    executor.execute(&config).expect("execute");

    let mut completed = 0;
    for _ in 0..100 {
        completed += executor.tick().walkers.completed.len();
        executor.engine_mut().step(1.0);
        if executor.walkers().is_empty() {
            break;
        }
    }

    assert_eq!(completed, 1);
}
