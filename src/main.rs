//! Probe Swarm headless runner
//!
//! Drives the simulation with synthetic 60 Hz frames and no renderer.
//!
//! Usage: `probe-swarm [config.json] [seconds]`

use probe_swarm::SimConfig;
use probe_swarm::sim::{FixedStepper, SimEvent, SimulationState, TickInput};

/// Log one tick's events: Master AI changes at info, births and deaths at trace
fn log_events(state: &SimulationState) {
    for event in &state.events {
        match event {
            SimEvent::PhaseChanged { .. } | SimEvent::Warped { .. } => {
                log::info!("tick {}: {:?}", state.time_ticks, event)
            }
            SimEvent::Replicated { .. } | SimEvent::Sacrificed { .. } => {
                log::trace!("tick {}: {:?}", state.time_ticks, event)
            }
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, seconds_arg) = match args.first() {
        Some(first) if first.ends_with(".json") => (Some(first.as_str()), args.get(1)),
        _ => (None, args.first()),
    };

    let config = match config_path {
        Some(path) => match SimConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SimConfig::default(),
    };
    let seconds: f32 = match seconds_arg.map(|s| s.parse::<f32>()) {
        Some(Ok(s)) if s > 0.0 => s,
        Some(_) => {
            log::error!("Simulated seconds must be a positive number");
            std::process::exit(1);
        }
        None => 120.0,
    };

    log::info!("Probe Swarm (headless) running {:.0}s of simulation", seconds);

    let frame_dt = 1.0 / 60.0;
    let frames = (seconds / frame_dt).ceil() as u64;
    let mut stepper = FixedStepper::from_config(&config);
    let mut state = SimulationState::new(config);
    let mut input = TickInput::default();

    for frame in 0..frames {
        stepper.advance_with(&mut state, &mut input, frame_dt, log_events);

        // Progress every ten simulated seconds
        if frame % 600 == 599 {
            let stats = state.stats();
            log::info!(
                "t={:.0}s system={} phase={:?} probes={} remaining={:.1}%",
                (frame + 1) as f32 * frame_dt,
                stats.system_index,
                stats.phase,
                stats.population,
                stats.remaining_percent
            );
        }
    }

    match serde_json::to_string_pretty(&state.stats()) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Failed to serialize stats: {}", e);
            std::process::exit(1);
        }
    }
}

