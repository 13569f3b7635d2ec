pub use agent::{ActContext, Agent, AgentId, AgentInfo};
pub use bridge::{BridgeState, FrameReply, FrameRequest, VisualisationBridge};
pub use cgmath;
pub use config::{BridgeConfig, Config, RegistryConfig, SimConfig};
pub use environment::{
    crossroads_waypoints, Environment, JsonWaypointFile, RoadNetworkSource, StaticWaypoints,
};
pub use error::{BridgeError, BridgeResult, SimError, SimResult};
pub use light::TrafficLight;
pub use registry::{SimulationHandle, SimulationRegistry};
pub use simulation::{Simulation, SimulationInfo, StopHandle};
pub use vehicle::{Vehicle, VehicleAttributes};

mod agent;
pub mod bridge;
mod config;
mod environment;
mod error;
mod light;
pub mod math;
mod registry;
mod simulation;
mod util;
mod vehicle;
