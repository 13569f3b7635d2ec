use std::time::Instant;
use waypoint_traffic::math::Vector2d;
use waypoint_traffic::{
    crossroads_waypoints, Environment, SimConfig, Simulation, Vehicle, VehicleAttributes,
};

fn main() {
    let env = Environment::new(crossroads_waypoints());
    let config = SimConfig {
        stop_at_lights: true,
        ..SimConfig::default().with_seed(1)
    };
    let mut sim = Simulation::with_config(env, config);
    let light = sim.add_light(sim.waypoints()[1], true);

    let attributes = VehicleAttributes {
        max_speed: 3.0,
        acceleration: 1.0,
        deceleration: 1.0,
    };
    let start = sim.waypoints()[0];
    for offset in 1..4 {
        let position = start - Vector2d::new(0.0, 6.0 * offset as f64);
        let route = sim.environment().route_from(0);
        sim.add_vehicle(Vehicle::new(&attributes, position, route));
    }
    let route = sim.environment().route_from(0);
    sim.add_vehicle(Vehicle::new(&attributes, start, route).spawn_every(15));

    println!("Simulating...");
    const NUM_TICKS: u64 = 120;
    let begin = Instant::now();
    while sim.tick() < NUM_TICKS {
        sim.run_steps(10);
        let (positions, _) = sim.agent_positions();
        let lead = positions.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        println!(
            "Tick {:>3}: {} vehicles, light {}, furthest y = {:.1}",
            sim.tick(),
            positions.len(),
            if sim.lights().1[light] { "red" } else { "green" },
            lead,
        );
        if sim.tick() % 40 == 0 {
            let stop = !sim.lights().1[light];
            sim.update_light(light, stop).expect("light was added above");
        }
    }
    println!("Avg. tick: {:?}", begin.elapsed() / NUM_TICKS as u32);
}
