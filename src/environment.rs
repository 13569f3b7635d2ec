use crate::error::{SimError, SimResult};
use crate::light::TrafficLight;
use crate::math::Point2d;
pub use source::{crossroads_waypoints, JsonWaypointFile, RoadNetworkSource, StaticWaypoints};

mod source;

/// The road network a simulation runs on, plus its traffic lights.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    /// The waypoints of the road network, in canonical route order.
    waypoints: Vec<Point2d>,
    /// The traffic lights. A light's ID is its index.
    lights: Vec<TrafficLight>,
}

impl Environment {
    /// Creates an environment from an ordered list of waypoints.
    pub fn new(waypoints: Vec<Point2d>) -> Self {
        Self {
            waypoints,
            lights: vec![],
        }
    }

    /// Creates an environment from a road network source.
    pub fn load(source: &dyn RoadNetworkSource) -> SimResult<Self> {
        let waypoints = source.load_waypoints()?;
        log::debug!("loaded {} waypoints", waypoints.len());
        Ok(Self::new(waypoints))
    }

    /// The waypoints of the road network.
    pub fn waypoints(&self) -> &[Point2d] {
        &self.waypoints
    }

    /// The part of the route that starts at waypoint `start`.
    /// Empty if `start` is past the end of the network.
    pub fn route_from(&self, start: usize) -> Vec<Point2d> {
        self.waypoints.get(start..).unwrap_or_default().to_vec()
    }

    /// The traffic lights, ordered by ID.
    pub fn lights(&self) -> &[TrafficLight] {
        &self.lights
    }

    /// Adds a traffic light and returns its ID.
    pub fn add_light(&mut self, position: Point2d, stop: bool) -> usize {
        let id = self.lights.len();
        self.lights.push(TrafficLight::new(id, position, stop));
        id
    }

    /// Finds the light at exactly `position`.
    pub fn light_at(&self, position: Point2d) -> Option<&TrafficLight> {
        self.lights.iter().find(|light| light.position() == position)
    }

    /// Gets the light with the given ID.
    pub fn light(&self, id: usize) -> Option<&TrafficLight> {
        self.lights.get(id)
    }

    /// Sets whether the light with the given ID shows stop.
    pub fn update_light(&mut self, id: usize, stop: bool) -> SimResult<()> {
        let light = self.lights.get_mut(id).ok_or(SimError::LightNotFound(id))?;
        light.set_stop(stop);
        Ok(())
    }

    /// Whether a light in the stop state sits on `position`.
    pub fn is_stopped_at(&self, position: Point2d) -> bool {
        self.light_at(position).map_or(false, |light| light.is_stop())
    }
}
