//! Tuning and connection settings.
//!
//! Every setting has a default, and all of the structs can be deserialised from
//! a partial JSON document.

use crate::error::SimResult;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of the behaviour model and stepper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    /// The maximum distance from a waypoint at which it counts as visited.
    pub waypoint_margin: f64,
    /// The probability that a vehicle randomly decelerates on a given tick.
    pub deceleration_probability: f64,
    /// Whether vehicles hold short of waypoints that carry a light in the stop state.
    pub stop_at_lights: bool,
    /// How far short of a stop light's waypoint vehicles hold.
    pub light_stop_distance: f64,
    /// Seed for the simulation's random source; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            waypoint_margin: 1.0,
            deceleration_probability: 0.5,
            stop_at_lights: false,
            light_stop_distance: 2.0,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Returns a copy of the config with a fixed random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Settings of the simulation registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// The number of lowercase letters in a generated simulation key.
    pub key_length: usize,
    /// The config handed to simulations created by the registry.
    pub simulation: SimConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            key_length: 5,
            simulation: SimConfig::default(),
        }
    }
}

/// Settings of the visualisation bridge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// The address the bridge listens on, e.g. `127.0.0.1:6666`.
    pub address: String,
    /// An executable to launch once the bridge is listening.
    pub visualiser: Option<PathBuf>,
    /// The directory the visualiser writes rendered frames to.
    pub frame_dir: Option<PathBuf>,
    /// Whether rendered `.png` frames in `frame_dir` are deleted on shutdown.
    pub remove_frames_on_shutdown: bool,
    /// The longest a frame request waits for its acknowledgement, in ms.
    /// `None` waits forever.
    pub frame_timeout_ms: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6666".to_string(),
            visualiser: None,
            frame_dir: None,
            remove_frames_on_shutdown: false,
            frame_timeout_ms: None,
        }
    }
}

impl BridgeConfig {
    /// Creates a config that listens on `addr` with every other setting defaulted.
    pub fn listen_on(addr: SocketAddr) -> Self {
        Self {
            address: addr.to_string(),
            ..Default::default()
        }
    }

    /// The frame acknowledgement timeout, if any.
    pub fn frame_timeout(&self) -> Option<Duration> {
        self.frame_timeout_ms.map(Duration::from_millis)
    }
}

/// The combined settings of a process hosting simulations and a bridge.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub bridge: BridgeConfig,
}

impl Config {
    /// Parses a config from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
