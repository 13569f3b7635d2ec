//! Tests that involve vehicles following a single route.

use assert_approx_eq::assert_approx_eq;
use waypoint_traffic::{
    math::Point2d, Environment, SimConfig, Simulation, SimulationInfo, StaticWaypoints, Vehicle,
    VehicleAttributes,
};

const ATTRIBS: VehicleAttributes = VehicleAttributes {
    max_speed: 5.0,
    acceleration: 1.0,
    deceleration: 1.0,
};

fn straight_road() -> Environment {
    Environment::new(vec![Point2d::new(0.0, 0.0), Point2d::new(100.0, 0.0)])
}

/// Test that a vehicle's position increases monotonically.
#[test]
fn vehicle_drives_forward() {
    let mut sim = Simulation::with_config(straight_road(), SimConfig::default().with_seed(5));
    let veh = sim.add_vehicle(Vehicle::new(
        &ATTRIBS,
        Point2d::new(0.0, 0.0),
        vec![Point2d::new(100.0, 0.0)],
    ));

    let mut pos = sim.agent(veh).unwrap().position().x;
    // Not long enough to reach the end of the road
    for _ in 0..15 {
        sim.step();
        let next_pos = sim.agent(veh).unwrap().position().x;
        assert!(next_pos >= pos);
        assert!(next_pos <= 100.0 + 1e-9);
        pos = next_pos;
    }
    assert!(pos > 0.0);
}

/// Test that a vehicle is removed once it reaches the end of its route.
#[test]
fn vehicle_leaves_at_end_of_route() {
    let config = SimConfig {
        deceleration_probability: 0.0,
        ..SimConfig::default()
    };
    let mut sim = Simulation::with_config(straight_road(), config);
    let veh = sim.add_vehicle(Vehicle::new(
        &ATTRIBS,
        Point2d::new(0.0, 0.0),
        vec![Point2d::new(20.0, 0.0)],
    ));
    // 1 + 2 + 3 + 4 + 5 + 5 = 20, then one tick to notice arrival
    sim.run_steps(6);
    assert_approx_eq!(sim.agent(veh).unwrap().position().x, 20.0);
    sim.run_steps(1);
    assert!(sim.agent(veh).is_none());
}

/// Test that every vehicle in a queue keeps a legal speed and stays on the road.
#[test]
fn queue_stays_within_limits() {
    let mut sim = Simulation::with_config(straight_road(), SimConfig::default().with_seed(11));
    let ids = (0..5)
        .map(|i| {
            let position = Point2d::new(-8.0 * i as f64, 0.0);
            sim.add_vehicle(Vehicle::new(&ATTRIBS, position, vec![Point2d::new(100.0, 0.0)]))
        })
        .collect::<Vec<_>>();

    for _ in 0..15 {
        sim.step();
        for id in &ids {
            let agent = sim.agent(*id).unwrap();
            assert!(agent.speed() >= 0.0 && agent.speed() <= ATTRIBS.max_speed);
            assert!(agent.position().x <= 100.0 + 1e-9);
        }
    }
    // The leader only slows down at random, so it must have made progress
    assert!(sim.agent(ids[0]).unwrap().position().x > 0.0);
}

/// Test that two simulations with the same seed produce identical trajectories.
#[test]
fn fixed_seed_is_deterministic() {
    let run = || {
        let mut sim = Simulation::with_config(straight_road(), SimConfig::default().with_seed(42));
        for i in 0..4 {
            let position = Point2d::new(-6.0 * i as f64, 0.0);
            sim.add_vehicle(Vehicle::new(&ATTRIBS, position, vec![Point2d::new(100.0, 0.0)]));
        }
        sim.add_vehicle(
            Vehicle::new(&ATTRIBS, Point2d::new(0.0, 0.0), vec![Point2d::new(100.0, 0.0)])
                .spawn_every(4),
        );
        (0..30)
            .map(|_| {
                sim.step();
                sim.agent_positions().0
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

/// Test that templates add one vehicle every `frequency` ticks.
#[test]
fn templates_spawn_periodically() {
    let mut sim = Simulation::new(straight_road());
    sim.add_vehicle(
        Vehicle::new(&ATTRIBS, Point2d::new(0.0, 0.0), vec![Point2d::new(1000.0, 0.0)])
            .spawn_every(5),
    );
    sim.run_steps(23);
    assert_eq!(sim.agents().count(), 4);
    assert!(sim.agents().all(|agent| agent.frequency() == 0));
    assert_eq!(sim.templates().count(), 1);
}

/// Test that a snapshot survives a trip through JSON.
#[test]
fn info_round_trips_through_json() {
    let mut sim = Simulation::with_config(straight_road(), SimConfig::default().with_seed(3));
    sim.add_light(Point2d::new(100.0, 0.0), true);
    for i in 0..3 {
        let position = Point2d::new(-4.0 * i as f64, 0.0);
        sim.add_vehicle(Vehicle::new(&ATTRIBS, position, vec![Point2d::new(100.0, 0.0)]));
    }
    sim.run_steps(7);

    let json = sim.info_json().unwrap();
    let info: SimulationInfo = serde_json::from_str(&json).unwrap();
    assert_eq!(info.tick, 7);
    assert!(!info.stopped);
    assert_eq!(info.agents.len(), 3);
    for (parsed, agent) in info.agents.iter().zip(sim.agents()) {
        assert_eq!(parsed.id, agent.id());
        assert_eq!(parsed.kind, "vehicle");
        assert_approx_eq!(parsed.position.x, agent.position().x);
        assert_approx_eq!(parsed.speed, agent.speed());
        assert_eq!(parsed.route, agent.route());
    }
    assert!(info.lights[0].is_stop());

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["agents"][0]["type"], "vehicle");
    assert!(value["agents"][0]["currentWaypoint"]["x"].is_number());
}

/// Test that a route sliced from a loaded network is followed in order.
#[test]
fn follows_route_from_loaded_network() {
    let source = StaticWaypoints(vec![
        Point2d::new(0.0, 0.0),
        Point2d::new(3.0, 0.0),
        Point2d::new(3.0, 3.0),
    ]);
    let env = Environment::load(&source).unwrap();
    let config = SimConfig {
        deceleration_probability: 0.0,
        ..SimConfig::default()
    };
    let mut sim = Simulation::with_config(env, config);
    let route = sim.environment().route_from(1);
    let veh = sim.add_vehicle(Vehicle::new(&ATTRIBS, Point2d::new(0.0, 0.0), route));
    assert_eq!(sim.agent(veh).unwrap().current_waypoint(), Point2d::new(3.0, 0.0));

    let mut visited = vec![];
    while let Some(agent) = sim.agent(veh) {
        let goal = agent.current_waypoint();
        if visited.last() != Some(&goal) {
            visited.push(goal);
        }
        assert!(sim.run_steps(1) == 1 && sim.tick() < 50);
    }
    assert_eq!(visited, vec![Point2d::new(3.0, 0.0), Point2d::new(3.0, 3.0)]);
}
