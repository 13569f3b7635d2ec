use crate::config::SimConfig;
use crate::environment::Environment;
use crate::math::Point2d;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique ID of an [Agent] within a simulation.
///
/// Negative values mean "not yet assigned"; the simulation assigns
/// a fresh ID when such an agent is added.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub i64);

impl AgentId {
    /// The placeholder ID of an agent that has not been added to a simulation.
    pub const UNASSIGNED: AgentId = AgentId(-1);

    /// Whether this is a real ID rather than the placeholder.
    pub fn is_assigned(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-tick inputs to [Agent::act] owned by the simulation.
pub struct ActContext<'a> {
    /// The simulation's tuning parameters.
    pub config: &'a SimConfig,
    /// The simulation's random source.
    pub rng: &'a mut dyn RngCore,
}

impl<'a> ActContext<'a> {
    pub fn new(config: &'a SimConfig, rng: &'a mut dyn RngCore) -> Self {
        Self { config, rng }
    }

    /// Draws whether an agent randomly decelerates this tick.
    pub fn random_deceleration(&mut self) -> bool {
        let p = self.config.deceleration_probability;
        (0.0..=1.0).contains(&p) && self.rng.gen_bool(p)
    }
}

/// An actor in the simulation.
///
/// Agents are values: [act](Agent::act) and the `with_*` methods return an
/// updated copy and leave `self` untouched.
pub trait Agent: fmt::Debug + Send {
    /// Simulates one tick for the agent.
    ///
    /// # Parameters
    /// * `agents` - Every agent in the simulation, including this one
    /// * `env` - The environment the agent moves through
    /// * `ctx` - The simulation's config and random source
    ///
    /// # Returns
    /// The updated agent, and `true` if the agent has reached its final destination.
    fn act(
        &self,
        agents: &[Box<dyn Agent>],
        env: &Environment,
        ctx: &mut ActContext,
    ) -> (Box<dyn Agent>, bool);

    fn id(&self) -> AgentId;

    fn position(&self) -> Point2d;

    /// The waypoint the agent is currently heading for.
    fn current_waypoint(&self) -> Point2d;

    fn speed(&self) -> f64;

    /// The waypoints still to visit after the current one.
    fn route(&self) -> &[Point2d];

    /// A tag naming the kind of agent, e.g. `"vehicle"`.
    fn kind(&self) -> &'static str;

    /// How often, in ticks, copies of this agent are spawned.
    /// Zero for an agent that is itself live.
    fn frequency(&self) -> u32;

    /// Returns a copy of the agent with a different ID.
    fn with_id(&self, id: AgentId) -> Box<dyn Agent>;

    /// Returns a copy of the agent with a different spawn frequency.
    fn with_frequency(&self, frequency: u32) -> Box<dyn Agent>;

    fn box_clone(&self) -> Box<dyn Agent>;

    /// Whether the agent is a spawn template rather than a live agent.
    fn is_template(&self) -> bool {
        self.frequency() > 0
    }

    /// A serialisable snapshot of the agent.
    fn info(&self) -> AgentInfo {
        AgentInfo {
            id: self.id(),
            kind: self.kind().to_string(),
            position: self.position(),
            speed: self.speed(),
            current_waypoint: self.current_waypoint(),
            route: self.route().to_vec(),
            frequency: self.frequency(),
        }
    }
}

impl Clone for Box<dyn Agent> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// A snapshot of an agent's state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: AgentId,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Point2d,
    pub speed: f64,
    pub current_waypoint: Point2d,
    pub route: Vec<Point2d>,
    #[serde(default)]
    pub frequency: u32,
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn unassigned_ids() {
        assert!(!AgentId::UNASSIGNED.is_assigned());
        assert!(AgentId(0).is_assigned());
        assert_eq!(AgentId(12).to_string(), "12");
    }

    #[test]
    fn deceleration_probability_bounds() {
        let mut rng = StepRng::new(0, 0);
        let mut config = SimConfig::default();

        config.deceleration_probability = 0.0;
        assert!(!ActContext::new(&config, &mut rng).random_deceleration());

        config.deceleration_probability = 1.0;
        assert!(ActContext::new(&config, &mut rng).random_deceleration());

        config.deceleration_probability = f64::NAN;
        assert!(!ActContext::new(&config, &mut rng).random_deceleration());
    }
}
