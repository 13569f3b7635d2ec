use crate::AgentId;
use thiserror::Error;

/// Errors raised by the simulation domain.
///
/// None of these are fatal; callers turn them into failure responses.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("no simulation found with the key {0:?}")]
    SimulationNotFound(String),

    #[error("no agent found with the id {0}")]
    AgentNotFound(AgentId),

    #[error("no traffic light found with the id {0}")]
    LightNotFound(usize),

    #[error("road network error: {0}")]
    RoadNetwork(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// Errors raised by the visualisation bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unable to resolve the address {0:?}")]
    Resolve(String),

    #[error("unable to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("the bridge has already been started")]
    AlreadyStarted,

    #[error("the visualiser is not connected")]
    NotConnected,

    #[error("the visualiser disconnected")]
    Disconnected,

    #[error("timed out waiting for a frame acknowledgement")]
    Timeout,

    #[error("malformed message from the visualiser: {0}")]
    Protocol(String),

    #[error("unable to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
