use self::acceleration::{ModelParams, SpeedModel};
use self::dynamics::move_towards;
use crate::agent::{ActContext, Agent, AgentId};
use crate::environment::Environment;
use crate::math::{in_range, Point2d};
use cgmath::prelude::*;

mod acceleration;
mod dynamics;

/// A simulated vehicle following a route of waypoints.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    id: AgentId,
    /// The vehicle's position.
    position: Point2d,
    /// The speed in distance units per tick.
    speed: f64,
    /// The speed model.
    acc: SpeedModel,
    /// The waypoint the vehicle is heading for.
    current_waypoint: Point2d,
    /// The waypoints to visit after the current one.
    route: Vec<Point2d>,
    /// How often, in ticks, copies of this vehicle are spawned.
    /// Zero for a live vehicle.
    frequency: u32,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
pub struct VehicleAttributes {
    /// The fastest the vehicle may travel, in distance units per tick.
    pub max_speed: f64,
    /// The speed gained per tick when accelerating.
    pub acceleration: f64,
    /// The speed lost per tick when decelerating, a positive number.
    pub deceleration: f64,
}

impl Vehicle {
    /// The kind tag of vehicles.
    pub const KIND: &'static str = "vehicle";

    /// Creates a new, stationary vehicle with an unassigned ID.
    ///
    /// The first waypoint of `route` becomes the current waypoint.
    /// With an empty route the vehicle's own position is its destination.
    pub fn new(attributes: &VehicleAttributes, position: Point2d, route: Vec<Point2d>) -> Self {
        let mut vehicle = Self {
            id: AgentId::UNASSIGNED,
            position,
            speed: 0.0,
            acc: SpeedModel::new(&ModelParams {
                max_speed: attributes.max_speed,
                acceleration: attributes.acceleration,
                deceleration: attributes.deceleration,
            }),
            current_waypoint: position,
            route,
            frequency: 0,
        };
        vehicle.next_waypoint();
        vehicle
    }

    /// Sets the vehicle's starting speed, clamped to `[0, max_speed]`.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = self.acc.clamp(speed);
        self
    }

    /// Makes the vehicle a spawn template, copied into the simulation
    /// every `frequency` ticks.
    pub fn spawn_every(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    /// The fastest the vehicle may travel.
    pub fn max_speed(&self) -> f64 {
        self.acc.max_speed()
    }

    /// The speed gained per tick when accelerating.
    pub fn acceleration(&self) -> f64 {
        self.acc.acceleration()
    }

    /// The speed lost per tick when decelerating.
    pub fn deceleration(&self) -> f64 {
        self.acc.deceleration()
    }

    /// The remaining straight-line distance to the current waypoint.
    pub fn distance_to_waypoint(&self) -> f64 {
        self.position.distance(self.current_waypoint)
    }

    /// Checks whether the vehicle has reached its current waypoint, and if so
    /// moves on to the next one. Returns `true` iff the vehicle has reached
    /// the end of its route.
    fn update_waypoint(&mut self, margin: f64) -> bool {
        if in_range(self.position, self.current_waypoint, margin) && !self.next_waypoint() {
            log::info!("vehicle {} reached destination {:?}", self.id, self.position);
            return true;
        }
        false
    }

    /// Pops the next waypoint off the route.
    /// Returns `false` if the route is exhausted.
    fn next_waypoint(&mut self) -> bool {
        if self.route.is_empty() {
            return false;
        }
        self.current_waypoint = self.route.remove(0);
        log::debug!(
            "vehicle {} heading for {:?}, {} waypoints left",
            self.id,
            self.current_waypoint,
            self.route.len()
        );
        true
    }

    /// Calculates the vehicle's speed for this tick from its surroundings.
    /// The first rule which applies wins.
    fn update_speed(&mut self, agents: &[Box<dyn Agent>], env: &Environment, ctx: &mut ActContext) {
        let dist = self.distance_to_waypoint();

        // Hold short of a stop light
        if ctx.config.stop_at_lights && env.is_stopped_at(self.current_waypoint) {
            let hold = ctx.config.light_stop_distance;
            if let Some(speed) = self.acc.hold_short(self.speed, dist, hold) {
                self.speed = speed;
                log::debug!("vehicle {} holding for light, v: {}", self.id, self.speed);
                return;
            }
        }

        // Slow down to touch the waypoint
        if dist <= self.speed {
            self.speed = dist;
            log::debug!("vehicle {} approaching waypoint, v: {}", self.id, self.speed);
            return;
        }

        // Slow down for the vehicle ahead
        let gap = self.gap_ahead(agents);
        if self.acc.must_brake(self.speed, gap) {
            self.speed = self.acc.clamp(gap);
            log::debug!("vehicle {} following, gap: {}, v: {}", self.id, gap, self.speed);
            return;
        }

        // Accelerate into free space
        if self.acc.can_accelerate(self.speed, gap) {
            self.speed = self.acc.accelerate(self.speed, f64::INFINITY);
            return;
        }

        // Random deceleration
        if ctx.random_deceleration() {
            self.speed = self.acc.decelerate(self.speed);
        }
    }

    /// Finds the distance to the closest agent in front of this one: an agent
    /// heading for the same waypoint which is closer to it.
    /// Infinite if there is no such agent.
    fn gap_ahead(&self, agents: &[Box<dyn Agent>]) -> f64 {
        let own_dist = self.distance_to_waypoint();
        agents
            .iter()
            .filter(|agent| agent.id() != self.id)
            .filter(|agent| agent.current_waypoint() == self.current_waypoint)
            .filter(|agent| agent.position().distance(self.current_waypoint) < own_dist)
            .map(|agent| self.position.distance(agent.position()))
            .fold(f64::INFINITY, f64::min)
    }

    /// Moves the vehicle towards its current waypoint at its current speed.
    fn update_position(&mut self) {
        self.position = move_towards(self.position, self.current_waypoint, self.speed);
    }
}

impl Agent for Vehicle {
    fn act(
        &self,
        agents: &[Box<dyn Agent>],
        env: &Environment,
        ctx: &mut ActContext,
    ) -> (Box<dyn Agent>, bool) {
        let mut next = self.clone();
        if next.update_waypoint(ctx.config.waypoint_margin) {
            return (Box::new(next), true);
        }
        next.update_speed(agents, env, ctx);
        next.update_position();
        (Box::new(next), false)
    }

    fn id(&self) -> AgentId {
        self.id
    }

    fn position(&self) -> Point2d {
        self.position
    }

    fn current_waypoint(&self) -> Point2d {
        self.current_waypoint
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn route(&self) -> &[Point2d] {
        &self.route
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn frequency(&self) -> u32 {
        self.frequency
    }

    fn with_id(&self, id: AgentId) -> Box<dyn Agent> {
        Box::new(Self { id, ..self.clone() })
    }

    fn with_frequency(&self, frequency: u32) -> Box<dyn Agent> {
        Box::new(self.clone().spawn_every(frequency))
    }

    fn box_clone(&self) -> Box<dyn Agent> {
        Box::new(self.clone())
    }
}
