use std::time::{Duration, Instant};

use traffic_volume::cgmath::Point2;
use traffic_volume::{ConnectionAttributes, Simulation, SimulationConfig, VolumeRates};

/// Builds a two-lane corridor with traffic flowing west to east.
fn demo() -> Simulation {
    let mut sim = Simulation::new(SimulationConfig {
        seed: Some(1),
        ..Default::default()
    });
    let net = sim.network_mut();
    let mut starts = vec![];
    let mut ends = vec![];
    for lane in 0..2 {
        let y = 3.5 * lane as f64;
        let a = net.add_point(Point2::new(0.0, y));
        let b = net.add_point(Point2::new(500.0, y));
        net.add_connection(&ConnectionAttributes {
            from: a,
            to: b,
            target_velocity: 16.66,
            capacity: 60,
        });
        starts.push(a);
        ends.push(b);
    }
    let west = sim.add_point_group("west", &starts);
    let east = sim.add_point_group("east", &ends);
    let volume = sim.add_volume(west, east).unwrap();
    sim.volume_mut(volume)
        .unwrap()
        .set_rates(VolumeRates::new(1800, 200, 12, 6));
    sim
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut sim = match std::env::args().nth(1) {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Simulation::load_json(&content, SimulationConfig::default())?
        }
        None => demo(),
    };

    println!("Simulating...");
    const NUM_FRAMES: u32 = 1000;
    for _ in 0..10 {
        let start = Instant::now();
        for _ in 0..NUM_FRAMES {
            sim.step(0.1);
        }
        let frame: Duration = start.elapsed() / NUM_FRAMES;
        println!(
            "t = {:.0} s, avg. frame: {:?} ({} vehs in network, {} queued)",
            sim.time(),
            frame,
            sim.network().iter_vehicles().count(),
            sim.queued_len(),
        );
    }

    for (_, volume) in sim.iter_volumes() {
        println!(
            "{:?}: {} born, {} admitted, {} queued",
            volume.rates(),
            volume.born(),
            volume.admitted(),
            volume.queued_len()
        );
    }
    Ok(())
}
