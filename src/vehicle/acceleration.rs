use serde::{Deserialize, Serialize};

/// The speed model of a vehicle: a discrete car-following model where
/// speeds change by whole steps of acceleration or deceleration each tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedModel {
    max_speed: f64,
    acceleration: f64,
    deceleration: f64,
}

/// The parameters of the speed model.
pub struct ModelParams {
    /// The fastest the vehicle may travel, in distance units per tick.
    pub max_speed: f64,
    /// The speed gained per tick when accelerating.
    pub acceleration: f64,
    /// The speed lost per tick when decelerating, a positive number.
    pub deceleration: f64,
}

impl SpeedModel {
    /// Creates a new speed model. Negative parameters are treated as zero.
    pub fn new(params: &ModelParams) -> Self {
        SpeedModel {
            max_speed: params.max_speed.max(0.0),
            acceleration: params.acceleration.max(0.0),
            deceleration: params.deceleration.max(0.0),
        }
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    pub fn deceleration(&self) -> f64 {
        self.deceleration
    }

    /// Clamps a speed into `[0, max_speed]`.
    pub fn clamp(&self, speed: f64) -> f64 {
        speed.max(0.0).min(self.max_speed)
    }

    /// Whether the vehicle must brake for an obstacle `gap` ahead.
    pub fn must_brake(&self, speed: f64, gap: f64) -> bool {
        gap <= speed - self.deceleration
    }

    /// Whether the vehicle is free to accelerate with `gap` to the vehicle ahead.
    pub fn can_accelerate(&self, speed: f64, gap: f64) -> bool {
        speed < self.max_speed && gap >= speed + self.acceleration
    }

    /// The speed after one step of acceleration, never exceeding `limit`.
    pub fn accelerate(&self, speed: f64, limit: f64) -> f64 {
        self.clamp(f64::min(speed + self.acceleration, limit))
    }

    /// The speed after one step of deceleration.
    pub fn decelerate(&self, speed: f64) -> f64 {
        self.clamp(speed - self.deceleration)
    }

    /// The speed needed to hold `hold` short of a point `dist` away,
    /// if holding requires a change this tick.
    ///
    /// # Arguments
    /// * `speed` - The vehicle's current speed.
    /// * `dist` - The distance to the point.
    /// * `hold` - How far short of the point to stop.
    pub fn hold_short(&self, speed: f64, dist: f64, hold: f64) -> Option<f64> {
        let room = f64::max(dist - hold, 0.0);
        if room <= speed + self.acceleration {
            Some(self.accelerate(speed, room))
        } else {
            None
        }
    }
}
