//! Sidewalk zone classification for pedestrian destinations.
//!
//! Spawn points sit on road centerlines. Pedestrians aim for a point shifted
//! onto the adjacent sidewalk instead, with the shift chosen by which
//! compass-relative zone the index belongs to.
use crate::error::DirectorError;
use crate::geometry::{Transform, Vec3};
use crate::spawn_points::SpawnPointIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lateral/longitudinal shift applied to zoned indices, in map units.
pub const SIDEWALK_OFFSET: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidewalkZone {
    Left,
    Right,
    Top,
    Bottom,
    None,
}

impl SidewalkZone {
    pub fn offset(self) -> Vec3 {
        match self {
            SidewalkZone::Left => Vec3::new(0.0, -SIDEWALK_OFFSET, 0.0),
            SidewalkZone::Right => Vec3::new(0.0, SIDEWALK_OFFSET, 0.0),
            SidewalkZone::Top => Vec3::new(SIDEWALK_OFFSET, 0.0, 0.0),
            SidewalkZone::Bottom => Vec3::new(-SIDEWALK_OFFSET, 0.0, 0.0),
            SidewalkZone::None => Vec3::ZERO,
        }
    }
}

/// Zone membership lists as published alongside a map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidewalkTable {
    #[serde(default)]
    pub left: Vec<usize>,
    #[serde(default)]
    pub right: Vec<usize>,
    #[serde(default)]
    pub top: Vec<usize>,
    #[serde(default)]
    pub bottom: Vec<usize>,
}

impl SidewalkTable {
    /// Membership lists for the built-in two-lane town layout.
    pub fn town() -> Self {
        Self {
            left: vec![
                27, 94, 25, 29, 31, 86, 33, 35, 60, 70, 58, 84, 62, 64, 66, 68, 50, 48, 88, 54,
                39, 37, 91, 43, 45, 47,
            ],
            right: vec![
                28, 95, 26, 30, 32, 34, 36, 61, 71, 59, 63, 83, 65, 67, 69, 57, 49, 89, 55, 38,
                40, 92, 42, 90, 44, 46,
            ],
            top: vec![
                23, 21, 19, 13, 15, 80, 82, 76, 78, 72, 74, 11, 9, 85, 7, 5, 99, 97, 3,
            ],
            bottom: vec![
                24, 22, 18, 14, 93, 16, 81, 0, 77, 79, 73, 75, 12, 10, 8, 6, 96, 100, 98, 4,
            ],
        }
    }

    fn zones(&self) -> [(SidewalkZone, &[usize]); 4] {
        [
            (SidewalkZone::Left, self.left.as_slice()),
            (SidewalkZone::Right, self.right.as_slice()),
            (SidewalkZone::Top, self.top.as_slice()),
            (SidewalkZone::Bottom, self.bottom.as_slice()),
        ]
    }
}

/// Validated index-to-zone lookup.
#[derive(Debug, Clone, Default)]
pub struct SidewalkZoneMap {
    zones: BTreeMap<usize, SidewalkZone>,
}

impl SidewalkZoneMap {
    /// Validate `table` against a map with `spawn_count` points.
    ///
    /// Fails on any index listed in two zones (or twice in one) and on any
    /// index the map does not publish.
    pub fn new(table: &SidewalkTable, spawn_count: usize) -> Result<Self, DirectorError> {
        let mut zones = BTreeMap::new();
        for (zone, members) in table.zones() {
            for &index in members {
                if index >= spawn_count {
                    return Err(DirectorError::InvalidZoneTable(format!(
                        "{zone:?} lists index {index} but the map has {spawn_count} spawn points"
                    )));
                }
                if let Some(previous) = zones.insert(index, zone) {
                    return Err(DirectorError::InvalidZoneTable(format!(
                        "index {index} listed in both {previous:?} and {zone:?}"
                    )));
                }
            }
        }
        Ok(Self { zones })
    }

    pub fn zone_of(&self, index: usize) -> SidewalkZone {
        self.zones.get(&index).copied().unwrap_or(SidewalkZone::None)
    }

    pub fn offset_for(&self, index: usize) -> Vec3 {
        self.zone_of(index).offset()
    }

    /// Spawn point transform shifted onto its sidewalk; orientation is kept as-is.
    pub fn transform_for(
        &self,
        spawn_points: &SpawnPointIndex,
        index: usize,
    ) -> Result<Transform, DirectorError> {
        let base = spawn_points.transform(index)?;
        Ok(Transform::new(
            base.location + self.offset_for(index),
            base.rotation,
        ))
    }

    pub fn classified_len(&self) -> usize {
        self.zones.len()
    }
}

#[cfg(test)]
#[path = "sidewalk_tests.rs"]
mod tests;
