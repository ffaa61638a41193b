//! Spawn index gate applied before any spawn or route assignment.
use crate::error::{DirectorError, RejectReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Indices excluded from pedestrian use regardless of sidewalk zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservedIndexSet(BTreeSet<usize>);

impl ReservedIndexSet {
    /// Intersections in the built-in town where a sidewalk offset lands in traffic.
    pub fn town() -> Self {
        Self::from_iter([1, 2, 17, 20, 41, 42, 51, 52, 53, 56, 87])
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<usize> for ReservedIndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone)]
pub struct IndexValidator {
    highest: Option<usize>,
    reserved: ReservedIndexSet,
}

impl IndexValidator {
    pub fn new(spawn_count: usize, reserved: ReservedIndexSet) -> Self {
        Self {
            highest: spawn_count.checked_sub(1),
            reserved,
        }
    }

    /// Pedestrian gate: in range and not reserved.
    pub fn is_valid(&self, index: i64) -> bool {
        self.check(index).is_ok()
    }

    /// Road gate: in range only. Vehicles use road-aligned points, so the
    /// reserved set does not apply to them.
    pub fn in_range(&self, index: i64) -> bool {
        self.check_in_range(index).is_ok()
    }

    pub fn check(&self, index: i64) -> Result<usize, DirectorError> {
        let resolved = self.check_in_range(index)?;
        if self.reserved.contains(resolved) {
            return Err(DirectorError::PolicyRejection {
                index,
                reason: RejectReason::Reserved,
            });
        }
        Ok(resolved)
    }

    pub fn check_in_range(&self, index: i64) -> Result<usize, DirectorError> {
        let Ok(resolved) = usize::try_from(index) else {
            return Err(DirectorError::PolicyRejection {
                index,
                reason: RejectReason::Negative,
            });
        };
        match self.highest {
            Some(highest) if resolved <= highest => Ok(resolved),
            highest => Err(DirectorError::PolicyRejection {
                index,
                reason: RejectReason::BeyondHighest { highest },
            }),
        }
    }
}
