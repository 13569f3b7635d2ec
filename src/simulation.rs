use crate::agent::{ActContext, Agent, AgentId, AgentInfo};
use crate::bridge::FrameRequest;
use crate::config::SimConfig;
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::light::TrafficLight;
use crate::math::{to_array, Point2d, Vector2d};
use crate::vehicle::Vehicle;
use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A traffic simulation.
pub struct Simulation {
    /// The current tick; the number of steps simulated so far.
    tick: u64,
    /// The live agents, in the order they were spawned.
    agents: Vec<Box<dyn Agent>>,
    /// Templates copied into `agents` on every tick that is a multiple of their frequency.
    agents_to_spawn: Vec<Box<dyn Agent>>,
    /// The last agent ID handed out.
    next_agent_id: i64,
    /// The road network and traffic lights.
    environment: Environment,
    /// Set once the simulation has been told to stop.
    should_stop: StopHandle,
    /// Tuning parameters of the behaviour model.
    config: SimConfig,
    /// The random source of the behaviour model.
    rng: SmallRng,
}

/// A handle that stops a [Simulation] from another thread.
///
/// A running [Simulation::run_steps] notices the stop at the end of the tick
/// in progress. Once stopped, a simulation never runs again.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Tells the simulation to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the simulation has been told to stop.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A serialisable snapshot of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInfo {
    pub tick: u64,
    pub stopped: bool,
    pub agents: Vec<AgentInfo>,
    pub templates: Vec<AgentInfo>,
    pub waypoints: Vec<Point2d>,
    pub lights: Vec<TrafficLight>,
}

impl Simulation {
    /// Creates a new simulation with the default config.
    pub fn new(environment: Environment) -> Self {
        Self::with_config(environment, SimConfig::default())
    }

    /// Creates a new simulation.
    pub fn with_config(environment: Environment, config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            tick: 0,
            agents: vec![],
            agents_to_spawn: vec![],
            next_agent_id: 0,
            environment,
            should_stop: StopHandle::default(),
            config,
            rng,
        }
    }

    /// Adds an agent to the simulation and returns its ID.
    ///
    /// Agents with an unassigned ID are given a fresh one. Agents with a positive
    /// frequency are spawn templates: they are queued, and copies are spawned
    /// on later ticks, but the template itself never acts.
    pub fn add_agent(&mut self, agent: Box<dyn Agent>) -> AgentId {
        let agent = if agent.id().is_assigned() {
            self.next_agent_id = self.next_agent_id.max(agent.id().0);
            agent
        } else {
            agent.with_id(self.next_id())
        };
        let id = agent.id();
        if agent.is_template() {
            log::info!("agent {} queued to spawn every {} ticks", id, agent.frequency());
            self.agents_to_spawn.push(agent);
        } else {
            log::info!("agent {} added at {:?}", id, agent.position());
            self.agents.push(agent);
        }
        id
    }

    /// Adds a vehicle to the simulation and returns its ID.
    pub fn add_vehicle(&mut self, vehicle: Vehicle) -> AgentId {
        self.add_agent(Box::new(vehicle))
    }

    /// Removes an agent or spawn template from the simulation.
    pub fn remove_agent(&mut self, id: AgentId) -> SimResult<Box<dyn Agent>> {
        for set in [&mut self.agents, &mut self.agents_to_spawn] {
            if let Some(idx) = set.iter().position(|agent| agent.id() == id) {
                log::info!("removing agent {}", id);
                return Ok(set.remove(idx));
            }
        }
        Err(SimError::AgentNotFound(id))
    }

    /// Adds a traffic light to the environment and returns its ID.
    pub fn add_light(&mut self, position: Point2d, stop: bool) -> usize {
        self.environment.add_light(position, stop)
    }

    /// Sets whether a traffic light shows stop.
    pub fn update_light(&mut self, id: usize, stop: bool) -> SimResult<()> {
        self.environment.update_light(id, stop)
    }

    /// Advances the simulation by up to `steps` ticks, stopping early if the
    /// simulation is stopped. Returns the number of ticks simulated.
    pub fn run_steps(&mut self, steps: u64) -> u64 {
        let mut ran = 0;
        while ran < steps && !self.is_stopped() {
            self.step();
            ran += 1;
        }
        log::debug!("ran {} of {} steps, now at tick {}", ran, steps, self.tick);
        ran
    }

    /// Advances the simulation until it is stopped through a [StopHandle].
    pub fn run(&mut self) {
        while !self.is_stopped() {
            self.step();
        }
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self) {
        self.tick += 1;

        // Agents spawned this tick first act on the next one
        let live = self.agents.len();
        self.spawn_agents();

        let mut arrived = SmallVec::<[usize; 8]>::new();
        let mut ctx = ActContext::new(&self.config, &mut self.rng);
        for idx in 0..live {
            let (next, reached) = self.agents[idx].act(&self.agents, &self.environment, &mut ctx);
            self.agents[idx] = next;
            if reached {
                arrived.push(idx);
            }
        }

        // Remove from the back so earlier indices stay valid
        if !arrived.is_empty() {
            let removed = arrived
                .iter()
                .rev()
                .map(|idx| self.agents.remove(*idx).id())
                .collect::<SmallVec<[AgentId; 8]>>();
            log::info!(
                "tick {}: agents [{}] reached their destination",
                self.tick,
                removed.iter().rev().join(", ")
            );
        }
    }

    /// Copies any spawn templates that are due this tick into the simulation.
    fn spawn_agents(&mut self) {
        let tick = self.tick;
        let due = self
            .agents_to_spawn
            .iter()
            .filter(|template| tick % u64::from(template.frequency()) == 0)
            .map(|template| template.with_frequency(0))
            .collect::<SmallVec<[_; 4]>>();
        for agent in due {
            let agent = agent.with_id(self.next_id());
            log::debug!("tick {}: spawned agent {}", tick, agent.id());
            self.agents.push(agent);
        }
    }

    /// Hands out the next agent ID.
    fn next_id(&mut self) -> AgentId {
        self.next_agent_id += 1;
        AgentId(self.next_agent_id)
    }

    /// Stops the simulation.
    pub fn stop(&self) {
        self.should_stop.stop();
    }

    /// Whether the simulation has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.should_stop.is_stopped()
    }

    /// Gets a handle that can stop the simulation from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.should_stop.clone()
    }

    /// Gets the current tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Gets the simulation's config.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Gets the simulation's environment.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns an iterator over the live agents, in spawn order.
    pub fn agents(&self) -> impl Iterator<Item = &dyn Agent> {
        self.agents.iter().map(|agent| agent.as_ref())
    }

    /// Returns an iterator over the spawn templates.
    pub fn templates(&self) -> impl Iterator<Item = &dyn Agent> {
        self.agents_to_spawn.iter().map(|agent| agent.as_ref())
    }

    /// Gets the live agent with the given ID.
    pub fn agent(&self, id: AgentId) -> Option<&dyn Agent> {
        self.agents().find(|agent| agent.id() == id)
    }

    /// Gets a snapshot of the agent or spawn template with the given ID.
    pub fn agent_info(&self, id: AgentId) -> SimResult<AgentInfo> {
        self.agents()
            .chain(self.templates())
            .find(|agent| agent.id() == id)
            .map(|agent| agent.info())
            .ok_or(SimError::AgentNotFound(id))
    }

    /// Gets the positions of the live agents, and the waypoints they're heading for.
    pub fn agent_positions(&self) -> (Vec<Point2d>, Vec<Point2d>) {
        self.agents()
            .map(|agent| (agent.position(), agent.current_waypoint()))
            .unzip()
    }

    /// Gets the waypoints of the road network.
    pub fn waypoints(&self) -> &[Point2d] {
        self.environment.waypoints()
    }

    /// Gets the positions and stop states of the traffic lights, ordered by ID.
    pub fn lights(&self) -> (Vec<Point2d>, Vec<bool>) {
        self.environment
            .lights()
            .iter()
            .map(|light| (light.position(), light.is_stop()))
            .unzip()
    }

    /// Builds a request for the visualiser to render the current tick.
    ///
    /// # Arguments
    /// * `camera_position` - Where to place the camera, if it should move.
    /// * `camera_direction` - Which way to point the camera, if it should turn.
    pub fn frame_request(
        &self,
        camera_position: Option<Point2d>,
        camera_direction: Option<Vector2d>,
    ) -> FrameRequest {
        let (agents, goals) = self.agent_positions();
        let (light_positions, light_states) = self.lights();
        FrameRequest {
            agents,
            waypoints: self.waypoints().to_vec(),
            goals,
            light_positions,
            light_states,
            camera_position: camera_position.map(to_array),
            camera_direction: camera_direction.map(|dir| [dir.x, dir.y]),
            tick: self.tick,
        }
    }

    /// Gets a snapshot of the whole simulation.
    pub fn info(&self) -> SimulationInfo {
        SimulationInfo {
            tick: self.tick,
            stopped: self.is_stopped(),
            agents: self.agents().map(|agent| agent.info()).collect(),
            templates: self.templates().map(|agent| agent.info()).collect(),
            waypoints: self.environment.waypoints().to_vec(),
            lights: self.environment.lights().to_vec(),
        }
    }

    /// Gets a snapshot of the whole simulation as a JSON string.
    pub fn info_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(&self.info())?)
    }
}
