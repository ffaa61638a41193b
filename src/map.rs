//! Spawn-point maps for the dry-run engine.
//!
//! A map file lists spawn points and may carry its own sidewalk table and
//! reserved set; without them the built-in town tables apply.
use crate::geometry::{Rotation, SpawnPoint, Transform, Vec3};
use crate::sidewalk::SidewalkTable;
use crate::validator::ReservedIndexSet;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Spacing between grid points in the built-in town.
const TOWN_GRID_SPACING: f64 = 30.0;
const TOWN_GRID_COLUMNS: usize = 11;
const TOWN_POINT_COUNT: usize = 101;
/// Spawn points hover slightly above the road surface.
const SPAWN_HEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapFile {
    #[serde(default)]
    pub name: Option<String>,
    pub spawn_points: Vec<MapPoint>,
    #[serde(default)]
    pub sidewalks: Option<SidewalkTable>,
    #[serde(default)]
    pub reserved: Option<ReservedIndexSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapPoint {
    pub index: usize,
    pub location: [f64; 3],
    /// Pitch, yaw, roll in degrees.
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default)]
    pub lane_id: Option<i32>,
}

/// Resolved map ready to seed an engine and the director's static tables.
#[derive(Debug, Clone)]
pub struct TownMap {
    pub name: String,
    pub spawn_points: Vec<SpawnPoint>,
    /// Lane id of the road under each spawn point, by index.
    pub lane_ids: Vec<i32>,
    pub sidewalks: SidewalkTable,
    pub reserved: ReservedIndexSet,
}

/// Lane direction implied by heading: eastbound/northbound lanes are positive.
pub fn lane_id_for_yaw(yaw: f64) -> i32 {
    let radians = yaw.to_radians();
    if radians.cos() + radians.sin() >= 0.0 {
        1
    } else {
        -1
    }
}

/// Built-in layout: an 11-column grid whose rows alternate direction of travel.
pub fn default_town() -> TownMap {
    let spawn_points: Vec<SpawnPoint> = (0..TOWN_POINT_COUNT)
        .map(|index| {
            let column = index % TOWN_GRID_COLUMNS;
            let row = index / TOWN_GRID_COLUMNS;
            let yaw = if row % 2 == 0 { 0.0 } else { 180.0 };
            SpawnPoint {
                index,
                transform: Transform::new(
                    Vec3::new(
                        column as f64 * TOWN_GRID_SPACING,
                        row as f64 * TOWN_GRID_SPACING,
                        SPAWN_HEIGHT,
                    ),
                    Rotation::new(0.0, yaw, 0.0),
                ),
            }
        })
        .collect();
    let lane_ids = spawn_points
        .iter()
        .map(|point| lane_id_for_yaw(point.transform.rotation.yaw))
        .collect();
    TownMap {
        name: "town".to_string(),
        spawn_points,
        lane_ids,
        sidewalks: SidewalkTable::town(),
        reserved: ReservedIndexSet::town(),
    }
}

pub fn load_map(path: &Path) -> Result<TownMap> {
    let bytes = fs::read(path).with_context(|| format!("read map {}", path.display()))?;
    let file: MapFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse map JSON {}", path.display()))?;
    resolve_map(file).with_context(|| format!("resolve map {}", path.display()))
}

pub fn resolve_map(file: MapFile) -> Result<TownMap> {
    let mut points = file.spawn_points;
    points.sort_by_key(|point| point.index);
    for (expected, point) in points.iter().enumerate() {
        if point.index != expected {
            return Err(anyhow!(
                "spawn point indices must be dense from 0 (expected {expected}, found {})",
                point.index
            ));
        }
    }

    let mut spawn_points = Vec::with_capacity(points.len());
    let mut lane_ids = Vec::with_capacity(points.len());
    for point in points {
        let [x, y, z] = point.location;
        let [pitch, yaw, roll] = point.rotation;
        lane_ids.push(point.lane_id.unwrap_or_else(|| lane_id_for_yaw(yaw)));
        spawn_points.push(SpawnPoint {
            index: point.index,
            transform: Transform::new(Vec3::new(x, y, z), Rotation::new(pitch, yaw, roll)),
        });
    }

    Ok(TownMap {
        name: file.name.unwrap_or_else(|| "custom".to_string()),
        spawn_points,
        lane_ids,
        sidewalks: file.sidewalks.unwrap_or_else(SidewalkTable::town),
        reserved: file.reserved.unwrap_or_else(ReservedIndexSet::town),
    })
}
