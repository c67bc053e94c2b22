//! Probe Swarm - self-replicating probes foraging a toroidal world
//!
//! Core modules:
//! - `sim`: Fixed-step simulation (geometry, resource index, probes, Master AI)
//! - `config`: Startup configuration with JSON loading and validation

pub mod config;
pub mod sim;

pub use config::{ConfigError, FloatRange, SimConfig};

/// Simulation timing constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum ticks drained per frame before leftover time is dropped
    pub const MAX_STEPS_PER_FRAME: u32 = 8;
    /// Largest frame delta accepted by the stepper (seconds)
    pub const MAX_FRAME_DT: f32 = 0.25;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Unit vector for a heading angle
#[inline]
pub fn heading_to_dir(theta: f32) -> glam::Vec2 {
    glam::Vec2::new(theta.cos(), theta.sin())
}
