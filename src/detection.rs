//! Sensor events delivered by the engine.
//!
//! Both attached sensors report a map of detected actor to its location. The
//! director only resolves those actors against what this run owns; decoding
//! the payload itself is the engine's job.
use crate::engine::ActorHandle;
use crate::geometry::Vec3;
use crate::registry::{ActorKind, ActorRegistry};
use serde::Serialize;
use std::collections::BTreeMap;

/// One already-decoded sensor event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorEvent {
    pub readings: BTreeMap<ActorHandle, Vec3>,
}

impl SensorEvent {
    pub fn new(readings: impl IntoIterator<Item = (ActorHandle, Vec3)>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub handle: ActorHandle,
    pub kind: ActorKind,
    pub location: Vec3,
}

/// Keep readings for registered actors of `kind`; anything else is not ours
/// to act on and is dropped.
pub fn resolve(registry: &ActorRegistry, event: &SensorEvent, kind: ActorKind) -> Vec<Detection> {
    let mut detections = Vec::new();
    for (&handle, &location) in &event.readings {
        match registry.find(handle) {
            Some(entry) if entry.kind == kind => {
                tracing::info!(%handle, %kind, ?location, "actor detected");
                detections.push(Detection {
                    handle,
                    kind,
                    location,
                });
            }
            Some(entry) => {
                tracing::debug!(%handle, found = %entry.kind, expected = %kind, "detection kind mismatch");
            }
            None => {
                tracing::debug!(%handle, "detection for an actor this run does not own");
            }
        }
    }
    detections
}
