use crate::math::Point2d;
use serde::{Deserialize, Serialize};

/// A traffic light placed on a waypoint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficLight {
    /// The light's ID, its index in the environment's light registry.
    id: usize,
    /// The location of the light. Vehicles targeting a waypoint
    /// at this location are controlled by the light.
    position: Point2d,
    /// Whether the light is showing stop.
    stop: bool,
}

impl TrafficLight {
    /// Creates a new traffic light.
    pub(crate) fn new(id: usize, position: Point2d, stop: bool) -> Self {
        Self { id, position, stop }
    }

    /// Gets the light's ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Gets the light's position.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// Whether the light is showing stop.
    pub fn is_stop(&self) -> bool {
        self.stop
    }

    /// Sets whether the light is showing stop.
    pub(crate) fn set_stop(&mut self, stop: bool) {
        log::debug!("light {} set to stop={}", self.id, stop);
        self.stop = stop;
    }
}
