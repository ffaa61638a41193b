//! Single owner of every actor a scenario run spawns.
//!
//! Entries live in an arena keyed by `ActorKey`; components hold keys, never
//! raw handles they might destroy on their own. Removal from the arena happens
//! before the engine is asked to destroy, so no actor is destroyed twice.
use crate::engine::{ActorHandle, Engine};
use serde::Serialize;
use slotmap::{new_key_type, SlotMap};
use std::fmt;

new_key_type! {
    /// Stable identifier of a registry entry.
    pub struct ActorKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Vehicle,
    Walker,
    Sensor,
}

impl ActorKind {
    /// Sensors must be stopped before they (or their parent) are destroyed.
    pub fn is_stoppable(self) -> bool {
        matches!(self, ActorKind::Sensor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActorKind::Vehicle => "vehicle",
            ActorKind::Walker => "walker",
            ActorKind::Sensor => "sensor",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ActorEntry {
    pub handle: ActorHandle,
    pub kind: ActorKind,
    pub attached_to: Option<ActorHandle>,
    stopped: bool,
}

impl ActorEntry {
    #[cfg(test)]
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Outcome of a registry-wide teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub destroyed: usize,
    pub destroy_failures: usize,
    pub stopped: usize,
    pub stop_failures: usize,
}

impl CleanupReport {
    /// Destroy requests issued, successful or not.
    pub fn destroy_attempts(&self) -> usize {
        self.destroyed + self.destroy_failures
    }
}

#[derive(Debug, Default)]
pub struct ActorRegistry {
    entries: SlotMap<ActorKey, ActorEntry>,
    order: Vec<ActorKey>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        handle: ActorHandle,
        kind: ActorKind,
        attached_to: Option<ActorHandle>,
    ) -> ActorKey {
        let key = self.entries.insert(ActorEntry {
            handle,
            kind,
            attached_to,
            stopped: false,
        });
        self.order.push(key);
        tracing::debug!(%handle, %kind, "registered actor");
        key
    }

    /// The live entry for `handle`, if this run still owns it.
    pub fn find(&self, handle: ActorHandle) -> Option<&ActorEntry> {
        self.entries.values().find(|entry| entry.handle == handle)
    }

    #[cfg(test)]
    pub(crate) fn contains_handle(&self, handle: ActorHandle) -> bool {
        self.find(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: ActorKind) -> usize {
        self.entries.values().filter(|entry| entry.kind == kind).count()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ActorKey, &ActorEntry)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(*key).map(|entry| (*key, entry)))
    }

    /// Retire one actor ahead of cleanup.
    ///
    /// Registered sensors attached to it are stopped first and stay registered
    /// for cleanup. Returns `false` when the key was already retired. Engine
    /// failures are logged, never returned.
    pub fn destroy<E: Engine + ?Sized>(&mut self, key: ActorKey, engine: &mut E) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        self.order.retain(|candidate| *candidate != key);

        let mut report = CleanupReport::default();
        self.stop_attached(entry.handle, engine, &mut report);
        retire(entry, engine, &mut report);
        true
    }

    /// Tear down every remaining actor, newest first.
    ///
    /// Reverse registration order puts sensors ahead of the actors they are
    /// attached to. The registry is empty afterwards even if destroys failed.
    pub fn cleanup<E: Engine + ?Sized>(&mut self, engine: &mut E) -> CleanupReport {
        let mut report = CleanupReport::default();
        let order = std::mem::take(&mut self.order);
        for key in order.into_iter().rev() {
            if let Some(entry) = self.entries.remove(key) {
                self.stop_attached(entry.handle, engine, &mut report);
                retire(entry, engine, &mut report);
            }
        }
        self.entries.clear();
        tracing::info!(
            destroyed = report.destroyed,
            destroy_failures = report.destroy_failures,
            stopped = report.stopped,
            "registry cleanup complete"
        );
        report
    }

    fn stop_attached<E: Engine + ?Sized>(
        &mut self,
        parent: ActorHandle,
        engine: &mut E,
        report: &mut CleanupReport,
    ) {
        for entry in self.entries.values_mut() {
            if entry.attached_to == Some(parent) && entry.kind.is_stoppable() && !entry.stopped {
                stop(entry, engine, report);
            }
        }
    }
}

fn stop<E: Engine + ?Sized>(entry: &mut ActorEntry, engine: &mut E, report: &mut CleanupReport) {
    entry.stopped = true;
    match engine.stop_sensor(entry.handle) {
        Ok(()) => report.stopped += 1,
        Err(err) => {
            report.stop_failures += 1;
            tracing::warn!(handle = %entry.handle, error = %err, "failed to stop sensor");
        }
    }
}

fn retire<E: Engine + ?Sized>(mut entry: ActorEntry, engine: &mut E, report: &mut CleanupReport) {
    if entry.kind.is_stoppable() && !entry.stopped {
        stop(&mut entry, engine, report);
    }
    match engine.destroy_actor(entry.handle) {
        Ok(()) => {
            report.destroyed += 1;
            tracing::debug!(handle = %entry.handle, kind = %entry.kind, "destroyed actor");
        }
        Err(err) => {
            report.destroy_failures += 1;
            tracing::warn!(
                handle = %entry.handle,
                kind = %entry.kind,
                error = %err,
                "failed to destroy actor"
            );
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
