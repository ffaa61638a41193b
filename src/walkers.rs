//! Per-tick pedestrian route following.
//!
//! Each walker owns a task that walks an ordered list of spawn indices. Targets
//! are sidewalk-offset and pinned to ground level. The motion command is
//! reissued every tick because the engine consumes it after one step.
//!
//! With a known step length, the commanded speed is capped so one step ends
//! on the target instead of past it.
//!
//! A task that reaches the end of its route is retired in the same `update`
//! call: its actor is destroyed through the registry, which removes the entry
//! so cleanup never sees it again.
use crate::engine::{ActorHandle, Engine};
use crate::error::DirectorError;
use crate::geometry::Vec3;
use crate::registry::{ActorKey, ActorRegistry};
use crate::sidewalk::SidewalkZoneMap;
use crate::spawn_points::SpawnPointIndex;
use serde::Serialize;

/// A walker within this distance of its target has arrived.
pub const ARRIVAL_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkerState {
    Moving,
    Completed,
}

#[derive(Debug, Clone)]
pub struct WalkerTask {
    key: ActorKey,
    handle: ActorHandle,
    route: Vec<usize>,
    cursor: usize,
    speed: f64,
    state: WalkerState,
}

impl WalkerTask {
    pub fn handle(&self) -> ActorHandle {
        self.handle
    }

    pub fn route(&self) -> &[usize] {
        &self.route
    }

    /// Number of route targets already reached.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> WalkerState {
        self.state
    }

    fn complete(&mut self) {
        self.state = WalkerState::Completed;
    }
}

/// What one `update` call did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WalkerUpdate {
    /// Route targets reached this tick.
    pub arrivals: usize,
    /// Walkers whose route finished and were retired this tick.
    pub completed: Vec<ActorHandle>,
    /// Motion commands issued.
    pub commands: usize,
    /// Tasks dropped because the engine no longer knew their walker.
    pub lost: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WalkerRouteManager {
    spawn_points: SpawnPointIndex,
    zones: SidewalkZoneMap,
    tasks: Vec<WalkerTask>,
    step_seconds: Option<f64>,
}

impl WalkerRouteManager {
    pub fn new(spawn_points: SpawnPointIndex, zones: SidewalkZoneMap) -> Self {
        Self {
            spawn_points,
            zones,
            tasks: Vec::new(),
            step_seconds: None,
        }
    }

    /// Length of one engine step. Non-positive values remove the cap.
    pub fn set_step_seconds(&mut self, seconds: f64) {
        let usable = seconds.is_finite() && seconds > 0.0;
        self.step_seconds = usable.then_some(seconds);
    }

    /// Start a walker on `route` at `speed`.
    ///
    /// Route indices must already be validated; an index past the spawn table
    /// is a caller bug and is reported as such.
    pub fn add_walker(
        &mut self,
        key: ActorKey,
        handle: ActorHandle,
        route: Vec<usize>,
        speed: f64,
    ) -> Result<(), DirectorError> {
        if route.is_empty() {
            return Err(DirectorError::EmptyRoute);
        }
        let usable_speed = speed.is_finite() && speed > 0.0;
        if !usable_speed {
            return Err(DirectorError::InvalidSpeed(speed));
        }
        if let Some(&index) = route.iter().find(|&&index| index >= self.spawn_points.len()) {
            return Err(DirectorError::IndexOutOfRange {
                index,
                len: self.spawn_points.len(),
            });
        }
        tracing::debug!(%handle, ?route, speed, "walker task added");
        self.tasks.push(WalkerTask {
            key,
            handle,
            route,
            cursor: 0,
            speed,
            state: WalkerState::Moving,
        });
        Ok(())
    }

    pub fn tasks(&self) -> &[WalkerTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Forget every task without touching the engine; cleanup owns the actors.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Ground-level target for `index`.
    pub fn target_for(&self, index: usize) -> Result<Vec3, DirectorError> {
        let mut target = self.zones.transform_for(&self.spawn_points, index)?.location;
        target.z = 0.0;
        Ok(target)
    }

    /// Advance every moving walker by one tick.
    pub fn update<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        registry: &mut ActorRegistry,
    ) -> WalkerUpdate {
        let mut outcome = WalkerUpdate::default();
        if self.tasks.is_empty() {
            return outcome;
        }

        let mut lost = Vec::new();
        for position in 0..self.tasks.len() {
            if self.tasks[position].state != WalkerState::Moving {
                continue;
            }
            match self.step_task(position, engine, &mut outcome) {
                Ok(()) => {}
                Err(err) => {
                    tracing::warn!(
                        handle = %self.tasks[position].handle,
                        error = %err,
                        "walker task dropped"
                    );
                    lost.push(position);
                }
            }
        }
        for position in lost {
            self.tasks[position].complete();
            outcome.lost += 1;
        }

        let (finished, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.state == WalkerState::Completed);
        self.tasks = remaining;
        for task in finished {
            registry.destroy(task.key, engine);
            if task.cursor == task.route.len() {
                tracing::info!(handle = %task.handle, "walker completed its route");
                outcome.completed.push(task.handle);
            }
        }
        outcome
    }

    fn step_task<E: Engine + ?Sized>(
        &mut self,
        position: usize,
        engine: &mut E,
        outcome: &mut WalkerUpdate,
    ) -> Result<(), DirectorError> {
        let task = &self.tasks[position];
        let (handle, speed) = (task.handle, task.speed);
        let Some(target_index) = task.route.get(task.cursor).copied() else {
            self.tasks[position].complete();
            return Ok(());
        };

        let target = self.target_for(target_index)?;
        let current = engine.position(handle)?;
        let distance = current.distance(target);

        if distance <= ARRIVAL_THRESHOLD {
            let task = &mut self.tasks[position];
            task.cursor += 1;
            outcome.arrivals += 1;
            tracing::info!(%handle, target_index, cursor = task.cursor, "walker reached target");
            if task.cursor == task.route.len() {
                task.complete();
            }
            return Ok(());
        }

        let speed = match self.step_seconds {
            Some(step) => speed.min(distance / step),
            None => speed,
        };
        let direction = (target - current).normalize_or_zero();
        engine.apply_walker_direction(handle, direction, speed, false)?;
        outcome.commands += 1;
        tracing::debug!(%handle, target_index, distance, "walker heading to target");
        Ok(())
    }
}

#[cfg(test)]
#[path = "walkers_tests.rs"]
mod tests;
