//! Simulation configuration
//!
//! Fixed at startup. Loaded from JSON (any missing field takes its default)
//! and validated before a `SimulationState` is built from it.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_FRAME_DT, MAX_STEPS_PER_FRAME, SIM_DT};

/// Errors raised while loading or validating a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Inclusive range of floats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
}

impl FloatRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Uniform sample in `[min, max]`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max <= self.min {
            self.min
        } else {
            rng.random_range(self.min..=self.max)
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    fn is_ordered(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// All tunables consumed by the simulation core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === World & timing ===
    pub world_width: f32,
    pub world_height: f32,
    /// Fixed simulation timestep (seconds)
    pub sim_dt: f32,
    pub max_steps_per_frame: u32,
    pub max_frame_dt: f32,

    // === Population ===
    /// Probes at startup, including the player probe
    pub initial_probes: usize,
    /// Hard population cap
    pub max_probes: usize,
    /// Initial probes are scattered within this radius of the world center
    pub initial_spread_radius: f32,

    // === Resources ===
    pub common_count: usize,
    pub rich_count: usize,
    pub common_capacity: FloatRange,
    pub rich_capacity: FloatRange,
    pub resource_base_radius: f32,
    pub common_radius_factor: f32,
    pub rich_radius_factor: f32,

    // === Clustering ===
    pub cluster_count: usize,
    pub cluster_weight: FloatRange,
    /// Gaussian standard deviation around a cluster center
    pub cluster_spread: f32,
    pub common_clustered_probability: f32,
    pub rich_clustered_probability: f32,

    // === Spatial index ===
    pub cell_size: f32,

    // === Probe kinematics ===
    pub probe_radius: f32,
    /// Exponential velocity drag (per second)
    pub drag: f32,
    pub player_boost_accel: f32,
    pub player_boost_speed: f32,

    // === Behavior ===
    pub radar_range: f32,
    pub radar_cooldown: FloatRange,
    pub wander_duration: FloatRange,
    pub wander_delay: FloatRange,
    pub wander_accel_fraction: f32,
    /// Per-tick chance to perturb the wander heading
    pub heading_jitter_chance: f32,
    /// Maximum heading perturbation (radians)
    pub heading_jitter: f32,
    pub steer_min_fraction: f32,
    pub target_ease_distance: f32,
    pub waypoint_ease_distance: f32,
    /// Target dropped when its squared distance exceeds this multiple of radar range squared
    pub target_drop_factor: f32,

    // === Harvesting ===
    pub touch_pad: f32,

    // === Replication ===
    pub replication_cost: f32,
    pub replication_margin: f32,
    pub child_start_resources: f32,
    pub replication_cooldown: FloatRange,
    pub child_spawn_radius: f32,

    // === Genetics ===
    pub base_max_speed: f32,
    pub base_accel: f32,
    pub base_harvest_rate: f32,
    pub max_speed_limits: FloatRange,
    pub accel_limits: FloatRange,
    pub harvest_rate_limits: FloatRange,
    /// Each gene is scaled by a factor in [1 - mutation, 1 + mutation]
    pub mutation: f32,

    // === Master AI ===
    pub depletion_threshold: f32,
    pub rally_radius: f32,
    pub rally_required_fraction: f32,
    pub rally_relaxed_fraction: f32,
    pub rally_timeout: f32,
    pub sacrifice_fraction: f32,
    pub sacrifice_timer: FloatRange,
    pub sacrifice_accel_boost: f32,
    pub sacrifice_speed_boost: f32,
    pub charge_duration: f32,

    // === Warp ===
    pub warp_spread_radius: f32,
    pub warp_speed: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world_width: 12_000.0,
            world_height: 12_000.0,
            sim_dt: SIM_DT,
            max_steps_per_frame: MAX_STEPS_PER_FRAME,
            max_frame_dt: MAX_FRAME_DT,

            initial_probes: 200,
            max_probes: 100_000,
            initial_spread_radius: 600.0,

            common_count: 4_000,
            rich_count: 400,
            common_capacity: FloatRange::new(40.0, 120.0),
            rich_capacity: FloatRange::new(300.0, 800.0),
            resource_base_radius: 4.0,
            common_radius_factor: 0.6,
            rich_radius_factor: 0.9,

            cluster_count: 12,
            cluster_weight: FloatRange::new(0.5, 2.0),
            cluster_spread: 350.0,
            common_clustered_probability: 0.6,
            rich_clustered_probability: 0.85,

            cell_size: 250.0,

            probe_radius: 6.0,
            drag: 0.8,
            player_boost_accel: 2.0,
            player_boost_speed: 1.6,

            radar_range: 600.0,
            radar_cooldown: FloatRange::new(0.4, 1.2),
            wander_duration: FloatRange::new(1.5, 4.0),
            wander_delay: FloatRange::new(0.2, 0.8),
            wander_accel_fraction: 0.35,
            heading_jitter_chance: 0.01,
            heading_jitter: 0.6,
            steer_min_fraction: 0.25,
            target_ease_distance: 250.0,
            waypoint_ease_distance: 600.0,
            target_drop_factor: 16.0,

            touch_pad: 4.0,

            replication_cost: 60.0,
            replication_margin: 5.0,
            child_start_resources: 10.0,
            replication_cooldown: FloatRange::new(4.0, 8.0),
            child_spawn_radius: 20.0,

            base_max_speed: 220.0,
            base_accel: 160.0,
            base_harvest_rate: 30.0,
            max_speed_limits: FloatRange::new(80.0, 600.0),
            accel_limits: FloatRange::new(40.0, 500.0),
            harvest_rate_limits: FloatRange::new(5.0, 150.0),
            mutation: 0.08,

            depletion_threshold: 0.9,
            rally_radius: 900.0,
            rally_required_fraction: 0.65,
            rally_relaxed_fraction: 0.45,
            rally_timeout: 40.0,
            sacrifice_fraction: 0.10,
            sacrifice_timer: FloatRange::new(1.5, 4.0),
            sacrifice_accel_boost: 2.5,
            sacrifice_speed_boost: 1.8,
            charge_duration: 6.0,

            warp_spread_radius: 1_200.0,
            warp_speed: 60.0,
        }
    }
}

impl SimConfig {
    /// Load and validate a config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse and validate a config from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Velocity multiplier applied once per fixed tick
    pub fn damping_per_tick(&self) -> f32 {
        (-self.drag * self.sim_dt).exp()
    }

    /// Largest radius any resource of this config can have
    pub fn max_resource_radius(&self) -> f32 {
        let common = self.common_capacity.max.max(0.0).sqrt() * self.common_radius_factor;
        let rich = self.rich_capacity.max.max(0.0).sqrt() * self.rich_radius_factor;
        self.resource_base_radius + common.max(rich)
    }

    /// Reject configurations the simulation cannot run sensibly
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::invalid(field, format!("must be positive, got {value}")))
            }
        }
        fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::invalid(field, format!("must be >= 0, got {value}")))
            }
        }
        fn fraction(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::invalid(field, format!("must be in [0, 1], got {value}")))
            }
        }
        fn ordered(field: &'static str, range: &FloatRange) -> Result<(), ConfigError> {
            if range.is_ordered() {
                Ok(())
            } else {
                Err(ConfigError::invalid(
                    field,
                    format!("min {} must not exceed max {}", range.min, range.max),
                ))
            }
        }

        positive("world_width", self.world_width)?;
        positive("world_height", self.world_height)?;
        positive("sim_dt", self.sim_dt)?;
        positive("max_frame_dt", self.max_frame_dt)?;
        positive("cell_size", self.cell_size)?;
        positive("radar_range", self.radar_range)?;
        positive("target_ease_distance", self.target_ease_distance)?;
        positive("waypoint_ease_distance", self.waypoint_ease_distance)?;
        positive("replication_cost", self.replication_cost)?;
        non_negative("probe_radius", self.probe_radius)?;
        non_negative("drag", self.drag)?;
        non_negative("cluster_spread", self.cluster_spread)?;
        non_negative("touch_pad", self.touch_pad)?;
        non_negative("replication_margin", self.replication_margin)?;
        non_negative("child_start_resources", self.child_start_resources)?;
        non_negative("rally_timeout", self.rally_timeout)?;
        non_negative("charge_duration", self.charge_duration)?;
        non_negative("mutation", self.mutation)?;

        if self.max_steps_per_frame == 0 {
            return Err(ConfigError::invalid("max_steps_per_frame", "must be at least 1"));
        }
        if self.initial_probes == 0 {
            return Err(ConfigError::invalid(
                "initial_probes",
                "must include the player probe",
            ));
        }
        if self.max_probes < self.initial_probes {
            return Err(ConfigError::invalid(
                "max_probes",
                format!(
                    "cap {} is below initial population {}",
                    self.max_probes, self.initial_probes
                ),
            ));
        }

        for (field, range) in [
            ("common_capacity", &self.common_capacity),
            ("rich_capacity", &self.rich_capacity),
            ("cluster_weight", &self.cluster_weight),
            ("radar_cooldown", &self.radar_cooldown),
            ("wander_duration", &self.wander_duration),
            ("wander_delay", &self.wander_delay),
            ("replication_cooldown", &self.replication_cooldown),
            ("max_speed_limits", &self.max_speed_limits),
            ("accel_limits", &self.accel_limits),
            ("harvest_rate_limits", &self.harvest_rate_limits),
            ("sacrifice_timer", &self.sacrifice_timer),
        ] {
            ordered(field, range)?;
        }
        if self.common_capacity.min <= 0.0 || self.rich_capacity.min <= 0.0 {
            return Err(ConfigError::invalid(
                "common_capacity",
                "resource capacities must be positive",
            ));
        }

        for (field, value) in [
            ("wander_accel_fraction", self.wander_accel_fraction),
            ("heading_jitter_chance", self.heading_jitter_chance),
            ("steer_min_fraction", self.steer_min_fraction),
            ("common_clustered_probability", self.common_clustered_probability),
            ("rich_clustered_probability", self.rich_clustered_probability),
            ("depletion_threshold", self.depletion_threshold),
            ("rally_required_fraction", self.rally_required_fraction),
            ("rally_relaxed_fraction", self.rally_relaxed_fraction),
            ("sacrifice_fraction", self.sacrifice_fraction),
        ] {
            fraction(field, value)?;
        }

        // Harvest scans only the 3x3 block around a probe's cell
        let touch = self.probe_radius + self.max_resource_radius() + self.touch_pad;
        if touch > self.cell_size {
            return Err(ConfigError::invalid(
                "cell_size",
                format!("must cover the largest touch distance {touch:.1}"),
            ));
        }

        Ok(())
    }
}
