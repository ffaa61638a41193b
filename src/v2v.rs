//! Vehicle-to-vehicle state exchange.
//!
//! Every tick each managed vehicle broadcasts where it is and how fast it is
//! going. Receivers only act on broadcasts from vehicles inside the proximity
//! threshold.
use crate::engine::{ActorHandle, Engine, EngineError};
use crate::geometry::Vec3;
use serde::Serialize;

/// One vehicle's broadcast for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct V2vMessage {
    pub handle: ActorHandle,
    pub location: Vec3,
    /// Magnitude of the engine-reported velocity.
    pub speed: f64,
}

/// Two vehicles close enough to hear each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearbyVehicles {
    pub vehicle: ActorHandle,
    pub other: ActorHandle,
    pub distance: f64,
    pub other_speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct V2vExchange {
    pub proximity_threshold: f64,
}

impl V2vExchange {
    pub fn new(proximity_threshold: f64) -> Self {
        Self {
            proximity_threshold,
        }
    }

    /// Snapshot position and speed of each vehicle. Vehicles the engine
    /// cannot report on stay silent this tick.
    pub fn broadcast<E: Engine + ?Sized>(
        engine: &E,
        vehicles: &[ActorHandle],
    ) -> Vec<V2vMessage> {
        vehicles
            .iter()
            .filter_map(|&handle| match snapshot(engine, handle) {
                Ok(message) => Some(message),
                Err(err) => {
                    tracing::warn!(%handle, error = %err, "vehicle missed its V2V broadcast");
                    None
                }
            })
            .collect()
    }

    /// Pairs strictly closer than the threshold, each reported once with the
    /// earlier broadcaster as `vehicle`.
    pub fn nearby(&self, messages: &[V2vMessage]) -> Vec<NearbyVehicles> {
        let mut pairs = Vec::new();
        for (position, receiver) in messages.iter().enumerate() {
            for sender in &messages[position + 1..] {
                let distance = receiver.location.distance(sender.location);
                if distance >= self.proximity_threshold {
                    continue;
                }
                tracing::debug!(
                    vehicle = %receiver.handle,
                    other = %sender.handle,
                    distance,
                    other_speed = sender.speed,
                    "vehicles within V2V range"
                );
                pairs.push(NearbyVehicles {
                    vehicle: receiver.handle,
                    other: sender.handle,
                    distance,
                    other_speed: sender.speed,
                });
            }
        }
        pairs
    }

    pub fn exchange<E: Engine + ?Sized>(
        &self,
        engine: &E,
        vehicles: &[ActorHandle],
    ) -> Vec<NearbyVehicles> {
        let messages = Self::broadcast(engine, vehicles);
        self.nearby(&messages)
    }
}

fn snapshot<E: Engine + ?Sized>(engine: &E, handle: ActorHandle) -> Result<V2vMessage, EngineError> {
    let location = engine.position(handle)?;
    let speed = engine.velocity(handle)?.length();
    Ok(V2vMessage {
        handle,
        location,
        speed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::kinematic::KinematicEngine;
    use crate::geometry::Transform;
    use crate::map::default_town;

    fn vehicle_at(engine: &mut KinematicEngine, x: f64) -> ActorHandle {
        engine
            .spawn_actor(
                "vehicle.audi.tt",
                &Transform::from_location(Vec3::new(x, 0.0, 0.0)),
                None,
            )
            .expect("spawn vehicle")
    }

    fn message(handle: u32, x: f64, speed: f64) -> V2vMessage {
        V2vMessage {
            handle: ActorHandle(handle),
            location: Vec3::new(x, 0.0, 0.0),
            speed,
        }
    }

    #[test]
    fn only_pairs_inside_the_threshold_are_reported() {
        let exchange = V2vExchange::new(30.0);
        let messages = [message(1, 0.0, 5.0), message(2, 29.5, 3.0), message(3, 60.0, 0.0)];

        let pairs = exchange.nearby(&messages);

        assert_eq!(
            pairs,
            vec![NearbyVehicles {
                vehicle: ActorHandle(1),
                other: ActorHandle(2),
                distance: 29.5,
                other_speed: 3.0,
            }]
        );
    }

    #[test]
    fn distance_equal_to_the_threshold_is_out_of_range() {
        let exchange = V2vExchange::new(30.0);
        assert!(exchange
            .nearby(&[message(1, 0.0, 0.0), message(2, 30.0, 0.0)])
            .is_empty());
    }

    #[test]
    fn broadcast_reports_speed_and_skips_destroyed_vehicles() {
        let mut engine = KinematicEngine::new(&default_town());
        let moving = vehicle_at(&mut engine, 0.0);
        let gone = vehicle_at(&mut engine, 20.0);
        engine.set_autopilot(moving, true, 8000).expect("autopilot");
        engine
            .assign_vehicle_path(moving, &[Vec3::new(100.0, 0.0, 0.0)])
            .expect("path");
        engine.step(1.0);
        engine.destroy_actor(gone).expect("destroy");

        let messages = V2vExchange::broadcast(&engine, &[moving, gone]);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].handle, moving);
        assert!(messages[0].speed > 0.0);
        let expected = engine.velocity(moving).expect("velocity").length();
        assert_eq!(messages[0].speed, expected);
    }
}
