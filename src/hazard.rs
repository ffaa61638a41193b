//! Hazard lights for vehicles near pedestrians.
use crate::engine::{ActorHandle, Engine};
use crate::geometry::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardLightPolicy {
    pub radius: f64,
}

impl HazardLightPolicy {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    /// Turn lights on for every vehicle with a walker inside the radius and
    /// off for the rest. Returns the number of vehicles lit.
    pub fn apply<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        vehicles: &[ActorHandle],
        walkers: &[ActorHandle],
    ) -> usize {
        let walker_positions: Vec<Vec3> = walkers
            .iter()
            .filter_map(|&walker| engine.position(walker).ok())
            .collect();

        let mut lit = 0;
        for &vehicle in vehicles {
            let position = match engine.position(vehicle) {
                Ok(position) => position,
                Err(err) => {
                    tracing::warn!(%vehicle, error = %err, "skipping hazard light check");
                    continue;
                }
            };
            let near = walker_positions
                .iter()
                .any(|walker| walker.distance(position) <= self.radius);
            if near {
                lit += 1;
            }
            if let Err(err) = engine.set_hazard_lights(vehicle, near) {
                tracing::warn!(%vehicle, error = %err, "failed to set hazard lights");
            }
        }
        lit
    }
}
