//! Braking managed vehicles that close on the observer.
//!
//! Decisions are recomputed from current positions every tick and carry no
//! state between ticks. A vehicle brakes only while it is near the observer,
//! in a lane running the same direction, and pointed at the observer.
use crate::engine::{ActorHandle, Engine, EngineError, VehicleControl};
use crate::geometry::Vec3;
use serde::Serialize;

/// Minimum cosine between a vehicle's heading and the bearing to the observer
/// (roughly 45 degrees) for the vehicle to count as closing.
pub const HEADING_DOT_THRESHOLD: f64 = 0.7;

/// Where the watched actor stands and which way it faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observer {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Observer {
    pub fn locate<E: Engine + ?Sized>(
        engine: &E,
        handle: ActorHandle,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            position: engine.position(handle)?,
            forward: engine.forward_vector(handle)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProximityDecision {
    pub handle: ActorHandle,
    pub distance: f64,
    pub same_lane: bool,
    pub heading_dot: f64,
    pub braking: bool,
}

/// True when both positions sit on drivable lanes whose ids share a sign.
pub fn lanes_share_direction<E: Engine + ?Sized>(engine: &E, a: Vec3, b: Vec3) -> bool {
    match (engine.resolve_lane(a), engine.resolve_lane(b)) {
        (Some(first), Some(second)) => {
            first.drivable
                && second.drivable
                && first.lane_id != 0
                && first.lane_id.signum() == second.lane_id.signum()
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityGuard {
    pub safe_distance: f64,
    pub routing_port: u16,
}

impl ProximityGuard {
    pub fn new(safe_distance: f64, routing_port: u16) -> Self {
        Self {
            safe_distance,
            routing_port,
        }
    }

    /// Decide for every vehicle against one snapshot of the world.
    ///
    /// Vehicles the engine cannot locate are skipped.
    pub fn evaluate<E, F>(
        &self,
        engine: &E,
        observer: &Observer,
        vehicles: &[ActorHandle],
        same_lane: F,
    ) -> Vec<ProximityDecision>
    where
        E: Engine + ?Sized,
        F: Fn(&E, Vec3, Vec3) -> bool,
    {
        vehicles
            .iter()
            .filter_map(|&handle| {
                match self.decide(engine, observer, handle, &same_lane) {
                    Ok(decision) => Some(decision),
                    Err(err) => {
                        tracing::warn!(%handle, error = %err, "skipping proximity check");
                        None
                    }
                }
            })
            .collect()
    }

    fn decide<E, F>(
        &self,
        engine: &E,
        observer: &Observer,
        handle: ActorHandle,
        same_lane: &F,
    ) -> Result<ProximityDecision, EngineError>
    where
        E: Engine + ?Sized,
        F: Fn(&E, Vec3, Vec3) -> bool,
    {
        let position = engine.position(handle)?;
        let forward = engine.forward_vector(handle)?;
        let distance = position.distance(observer.position);
        let shares_lane = same_lane(engine, position, observer.position);
        let to_observer = (observer.position - position).normalize_or_zero();
        let heading_dot = forward.dot(to_observer);
        let braking =
            distance < self.safe_distance && shares_lane && heading_dot > HEADING_DOT_THRESHOLD;
        Ok(ProximityDecision {
            handle,
            distance,
            same_lane: shares_lane,
            heading_dot,
            braking,
        })
    }

    /// Brake or release each vehicle; returns how many are braking.
    pub fn enforce<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        decisions: &[ProximityDecision],
    ) -> usize {
        let mut braking = 0;
        for decision in decisions {
            let handle = decision.handle;
            let result = if decision.braking {
                braking += 1;
                tracing::debug!(
                    %handle,
                    distance = decision.distance,
                    heading_dot = decision.heading_dot,
                    "braking near observer"
                );
                engine.apply_vehicle_control(handle, VehicleControl::full_brake())
            } else {
                engine.set_autopilot(handle, true, self.routing_port)
            };
            if let Err(err) = result {
                tracing::warn!(%handle, error = %err, "proximity command failed");
            }
        }
        braking
    }

    pub fn apply<E, F>(
        &self,
        engine: &mut E,
        observer: &Observer,
        vehicles: &[ActorHandle],
        same_lane: F,
    ) -> Vec<ProximityDecision>
    where
        E: Engine + ?Sized,
        F: Fn(&E, Vec3, Vec3) -> bool,
    {
        let decisions = self.evaluate(&*engine, observer, vehicles, same_lane);
        self.enforce(engine, &decisions);
        decisions
    }
}
