//! Tick-driven director for traffic scenarios on a driving simulator.
//!
//! A scenario document names vehicles, pedestrians, and an observer by spawn
//! index. [`executor::ScenarioExecutor`] spawns them through an [`engine::Engine`],
//! then each tick walks pedestrians along sidewalk-offset routes, brakes vehicles
//! closing on the observer, toggles hazard lights near pedestrians, and shares
//! vehicle state over V2V. Every
//! spawned actor is owned by one [`registry::ActorRegistry`] and torn down once.
pub mod cli;
pub mod detection;
pub mod engine;
pub mod error;
pub mod executor;
pub mod geometry;
pub mod hazard;
pub mod logging;
pub mod map;
pub mod proximity;
pub mod registry;
pub mod routes;
pub mod scenario;
pub mod sidewalk;
pub mod spawn_points;
pub mod v2v;
pub mod validator;
pub mod walkers;
pub mod workflow;

pub use error::{DirectorError, ErrorClass};
