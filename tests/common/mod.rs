//! Shared test infrastructure for integration tests.
// Each test crate uses a different subset of these helpers.
#![allow(dead_code)]

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scenario files written into a private temp directory.
pub struct ScenarioFixture {
    dir: TempDir,
}

impl ScenarioFixture {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `value` as pretty JSON under `name` and return its path.
    pub fn write_json(&self, name: &str, value: &Value) -> anyhow::Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, serde_json::to_string_pretty(value)?)?;
        Ok(path)
    }

    pub fn write_text(&self, name: &str, text: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(name);
        std::fs::write(&path, text)?;
        Ok(path)
    }
}

/// One vehicle on an autopilot loop and one pedestrian crossing to index 5.
pub fn crossing_scenario() -> Value {
    serde_json::json!({
        "vehicles": [
            {"spawn_point": 3, "model": "vehicle.tesla.model3", "route": [3, 10, 3], "autopilot": true}
        ],
        "walkers": [
            {"spawn_point": 0, "go_to_point": [5], "speed": 1.4}
        ],
        "scenario_config": {
            "safe_distance_to_observer": 10.0,
            "safe_distance_between_vehicles": 10.0
        }
    })
}

/// Run the built `sdir` binary with `args`.
pub fn sdir<I, S>(args: I) -> anyhow::Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let output = Command::new(env!("CARGO_BIN_EXE_sdir"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()?;
    Ok(output)
}

pub fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
