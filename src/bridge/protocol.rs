//! The newline-delimited JSON messages exchanged with the visualiser.

use crate::error::{BridgeError, BridgeResult};
use crate::math::Point2d;
use serde::{Deserialize, Serialize};

/// A request for the visualiser to render one tick of a simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRequest {
    /// The position of every live agent.
    pub agents: Vec<Point2d>,
    /// The waypoints of the road network.
    pub waypoints: Vec<Point2d>,
    /// The waypoint each agent is heading for, in the same order as `agents`.
    pub goals: Vec<Point2d>,
    pub light_positions: Vec<Point2d>,
    /// Whether each light shows stop, in the same order as `light_positions`.
    pub light_states: Vec<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_position: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_direction: Option<[f64; 2]>,
    pub tick: u64,
}

/// The visualiser's acknowledgement of a [FrameRequest].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReply {
    /// Where the rendered frame was written.
    pub filepath: String,
}

/// Serialises a message as a single line of JSON, newline included.
pub fn encode<T: Serialize>(message: &T) -> BridgeResult<Vec<u8>> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    Ok(line)
}

/// Parses one line sent by the visualiser.
pub fn decode_reply(line: &str) -> BridgeResult<FrameReply> {
    serde_json::from_str(line.trim()).map_err(|err| BridgeError::Protocol(err.to_string()))
}
