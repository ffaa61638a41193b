//! Map-space geometry shared by every component.
//!
//! Positions use glam's `DVec3` so distance and heading math stays in `f64`,
//! matching the units the simulator publishes for spawn points.
use serde::{Deserialize, Serialize};

pub use glam::DVec3 as Vec3;

/// Orientation in degrees, simulator convention (pitch, yaw, roll).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotation {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Unit vector pointing along the heading described by pitch and yaw.
    pub fn forward_vector(&self) -> Vec3 {
        let pitch = self.pitch.to_radians();
        let yaw = self.yaw.to_radians();
        Vec3::new(pitch.cos() * yaw.cos(), pitch.cos() * yaw.sin(), pitch.sin())
    }

    /// Yaw-only rotation facing along `direction`; pitch and roll are zero.
    pub fn facing(direction: Vec3) -> Self {
        Self {
            pitch: 0.0,
            yaw: direction.y.atan2(direction.x).to_degrees(),
            roll: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub location: Vec3,
    pub rotation: Rotation,
}

impl Transform {
    pub fn new(location: Vec3, rotation: Rotation) -> Self {
        Self { location, rotation }
    }

    pub fn from_location(location: Vec3) -> Self {
        Self {
            location,
            rotation: Rotation::default(),
        }
    }
}

/// A fixed position and orientation published by the map, referenced by index.
///
/// Indices are dense and start at zero; `SpawnPointIndex` enforces that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub index: usize,
    pub transform: Transform,
}

impl SpawnPoint {
    pub fn location(&self) -> Vec3 {
        self.transform.location
    }
}
