//! Tests that drive a simulation through the visualisation bridge.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use waypoint_traffic::{
    crossroads_waypoints, math::Point2d, BridgeConfig, BridgeError, Environment, FrameRequest,
    SimConfig, Simulation, SimulationRegistry, Vehicle, VehicleAttributes, VisualisationBridge,
};

/// A stand-in visualiser that acknowledges every frame with a numbered path.
fn fake_visualiser(addr: SocketAddr) -> std::thread::JoinHandle<Vec<FrameRequest>> {
    std::thread::spawn(move || {
        let stream = TcpStream::connect(addr).unwrap();
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);
        let mut frames = vec![];
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap_or(0) > 0 {
            let frame: FrameRequest = serde_json::from_str(&line).unwrap();
            let reply = format!("{{\"filepath\":\"frames/{}.png\"}}\n", frame.tick);
            frames.push(frame);
            line.clear();
            if writer.write_all(reply.as_bytes()).is_err() {
                break;
            }
        }
        frames
    })
}

#[test]
fn renders_every_tick() {
    let registry = SimulationRegistry::default();
    let key = registry.create(Environment::new(crossroads_waypoints()));
    registry
        .with(&key, |sim| {
            let attributes = VehicleAttributes {
                max_speed: 4.0,
                acceleration: 1.0,
                deceleration: 1.0,
            };
            let route = sim.environment().route_from(1);
            sim.add_vehicle(Vehicle::new(&attributes, Point2d::new(50.0, 0.0), route));
            sim.add_light(Point2d::new(50.0, 50.0), true);
        })
        .unwrap();

    let bridge = VisualisationBridge::new(BridgeConfig::listen_on(SocketAddr::from((
        [127, 0, 0, 1],
        0,
    ))));
    let visualiser = fake_visualiser(bridge.bind().unwrap());
    bridge.start_server().unwrap();

    let mut paths = vec![];
    for _ in 0..5 {
        let frame = registry
            .with(&key, |sim| {
                sim.run_steps(1);
                sim.frame_request(None, None)
            })
            .unwrap();
        paths.push(bridge.send_simulation_frame(&frame).unwrap());
    }
    assert_eq!(
        paths,
        (1..=5).map(|tick| format!("frames/{}.png", tick)).collect::<Vec<_>>()
    );

    bridge.stop_server();
    let frames = visualiser.join().unwrap();
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0].waypoints.len(), 12);
    assert_eq!(frames[4].agents.len(), 1);
    assert_eq!(frames[4].light_states, vec![true]);
    assert!(matches!(
        bridge.send_simulation_frame(&frames[0]),
        Err(BridgeError::NotConnected)
    ));
}

#[test]
fn simulation_and_bridge_stop_independently() {
    let sim = Simulation::with_config(
        Environment::new(crossroads_waypoints()),
        SimConfig::default().with_seed(9),
    );
    let stop = sim.stop_handle();
    let bridge = Arc::new(VisualisationBridge::new(BridgeConfig::listen_on(
        SocketAddr::from(([127, 0, 0, 1], 0)),
    )));
    let addr = bridge.bind().unwrap();
    // Connect, but never acknowledge anything
    let _silent = std::thread::spawn(move || TcpStream::connect(addr).unwrap())
        .join()
        .unwrap();
    bridge.start_server().unwrap();

    let requester = {
        let bridge = bridge.clone();
        let frame = sim.frame_request(Some(Point2d::new(0.0, 0.0)), None);
        std::thread::spawn(move || bridge.send_simulation_frame(&frame))
    };
    std::thread::sleep(std::time::Duration::from_millis(50));
    bridge.stop_server();
    assert!(matches!(
        requester.join().unwrap(),
        Err(BridgeError::Disconnected | BridgeError::NotConnected)
    ));

    assert!(!stop.is_stopped());
    stop.stop();
    assert!(sim.is_stopped());
}
