//! Read-only spawn point table for one scenario run.
use crate::error::DirectorError;
use crate::geometry::{SpawnPoint, Transform, Vec3};

#[derive(Debug, Clone, Default)]
pub struct SpawnPointIndex {
    points: Vec<SpawnPoint>,
}

impl SpawnPointIndex {
    /// Build the table, requiring indices to be dense and start at zero.
    pub fn new(points: Vec<SpawnPoint>) -> Result<Self, DirectorError> {
        for (expected, point) in points.iter().enumerate() {
            if point.index != expected {
                return Err(DirectorError::SparseSpawnPoints {
                    expected,
                    found: point.index,
                });
            }
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&SpawnPoint, DirectorError> {
        self.points
            .get(index)
            .ok_or(DirectorError::IndexOutOfRange {
                index,
                len: self.points.len(),
            })
    }

    pub fn transform(&self, index: usize) -> Result<Transform, DirectorError> {
        Ok(self.get(index)?.transform)
    }

    pub fn location(&self, index: usize) -> Result<Vec3, DirectorError> {
        Ok(self.get(index)?.location())
    }
}
