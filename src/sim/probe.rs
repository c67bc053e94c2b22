//! Probe entity and per-probe behavior
//!
//! Behavior priority: sacrificing, then player control, then autonomous
//! foraging. Autonomous probes either chase a target resource or wander
//! between radar pings; while the Master AI broadcasts a rally point they
//! head there instead.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::resource::ResourcePool;
use super::torus::World;
use crate::config::SimConfig;
use crate::{heading_to_dir, normalize_angle};

/// Heritable parameters, mutated on replication
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Genes {
    pub max_speed: f32,
    pub accel: f32,
    pub harvest_rate: f32,
}

impl Genes {
    pub fn base(config: &SimConfig) -> Self {
        Self {
            max_speed: config.max_speed_limits.clamp(config.base_max_speed),
            accel: config.accel_limits.clamp(config.base_accel),
            harvest_rate: config.harvest_rate_limits.clamp(config.base_harvest_rate),
        }
    }

    /// Copy with each gene scaled by an independent factor in
    /// `[1 - mutation, 1 + mutation]`, clamped to its limits
    pub fn mutated<R: Rng + ?Sized>(&self, config: &SimConfig, rng: &mut R) -> Self {
        let m = config.mutation;
        let mut factor = || {
            if m > 0.0 {
                rng.random_range(1.0 - m..=1.0 + m)
            } else {
                1.0
            }
        };
        Self {
            max_speed: config.max_speed_limits.clamp(self.max_speed * factor()),
            accel: config.accel_limits.clamp(self.accel * factor()),
            harvest_rate: config.harvest_rate_limits.clamp(self.harvest_rate * factor()),
        }
    }
}

/// Branch of the behavior machine a probe runs this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeMode {
    Sacrificing,
    PlayerControlled,
    Autonomous,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probe {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Radians
    pub heading: f32,
    pub resources_carried: f32,
    pub genes: Genes,
    /// Index into the resource pool; revalidated every tick
    pub target: Option<u32>,
    pub radar_cooldown: f32,
    pub wander_timer: f32,
    pub replication_cooldown: f32,
    pub waypoint: Option<Vec2>,
    pub sacrificing: bool,
    pub sacrifice_timer: f32,
    pub alive: bool,
}

impl Probe {
    pub const PLAYER_ID: u32 = 0;

    pub fn new(id: u32, pos: Vec2, genes: Genes) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            heading: 0.0,
            resources_carried: 0.0,
            genes,
            target: None,
            radar_cooldown: 0.0,
            wander_timer: 0.0,
            replication_cooldown: 0.0,
            waypoint: None,
            sacrificing: false,
            sacrifice_timer: 0.0,
            alive: true,
        }
    }

    #[inline]
    pub fn is_player(&self) -> bool {
        self.id == Self::PLAYER_ID
    }

    pub fn mode(&self) -> ProbeMode {
        if self.sacrificing {
            ProbeMode::Sacrificing
        } else if self.is_player() {
            ProbeMode::PlayerControlled
        } else {
            ProbeMode::Autonomous
        }
    }

    /// Living autonomous probe that is not already sacrificing
    pub fn is_sacrifice_eligible(&self) -> bool {
        self.alive && !self.sacrificing && !self.is_player()
    }

    /// Clear transient behavior state; autonomous probes get fresh cooldowns
    pub fn reset_behavior<R: Rng + ?Sized>(&mut self, config: &SimConfig, rng: &mut R) {
        self.target = None;
        self.waypoint = None;
        self.wander_timer = 0.0;
        if !self.is_player() {
            self.radar_cooldown = config.radar_cooldown.sample(rng);
            self.replication_cooldown = config.replication_cooldown.sample(rng);
            self.heading = rng.random::<f32>() * std::f32::consts::TAU;
        }
    }

    /// Enter the sacrifice sub-state. Ignored for the player.
    pub fn begin_sacrifice(&mut self, waypoint: Vec2, timer: f32) {
        if self.is_player() {
            return;
        }
        self.sacrificing = true;
        self.sacrifice_timer = timer;
        self.waypoint = Some(waypoint);
        self.target = None;
    }

    /// Whether the automatic replication gates pass (cap checked by the caller)
    pub fn wants_to_replicate(&self, config: &SimConfig) -> bool {
        self.alive
            && !self.sacrificing
            && !self.is_player()
            && self.replication_cooldown <= 0.0
            && self.resources_carried >= config.replication_cost + config.replication_margin
    }

    /// Pay the replication cost and build a child with mutated genes.
    ///
    /// Returns `None` when the probe cannot afford the cost.
    pub fn spawn_child<R: Rng + ?Sized>(
        &mut self,
        child_id: u32,
        config: &SimConfig,
        world: World,
        rng: &mut R,
    ) -> Option<Probe> {
        if !self.alive || self.sacrificing || self.resources_carried < config.replication_cost {
            return None;
        }
        self.resources_carried -= config.replication_cost;
        self.replication_cooldown = config.replication_cooldown.sample(rng);

        let pos = world.random_point_near(rng, self.pos, config.child_spawn_radius);
        let mut child = Probe::new(child_id, pos, self.genes.mutated(config, rng));
        child.vel = self.vel;
        child.resources_carried = config.child_start_resources;
        child.reset_behavior(config, rng);
        Some(child)
    }
}

/// Per-tick inputs shared by every probe update
#[derive(Debug, Clone, Copy)]
pub struct BehaviorContext<'a> {
    pub config: &'a SimConfig,
    pub world: World,
    pub dt: f32,
    /// Velocity multiplier applied after integration
    pub damping: f32,
    /// Shared waypoint while the Master AI is outside its normal phase
    pub rally_point: Option<Vec2>,
    /// Player thrust intent, expected within the unit disk
    pub thrust: Vec2,
    pub boost: bool,
}

/// Advance one probe's behavior and motion by one tick
pub fn update_probe<R: Rng + ?Sized>(
    probe: &mut Probe,
    pool: &ResourcePool,
    ctx: &BehaviorContext<'_>,
    rng: &mut R,
) {
    if !probe.alive {
        return;
    }
    let config = ctx.config;
    probe.replication_cooldown = (probe.replication_cooldown - ctx.dt).max(0.0);

    let speed_cap = match probe.mode() {
        ProbeMode::Sacrificing => {
            if let Some(waypoint) = probe.waypoint {
                let accel = probe.genes.accel * config.sacrifice_accel_boost;
                steer_toward(
                    probe,
                    ctx.world,
                    waypoint,
                    accel,
                    config.steer_min_fraction,
                    config.waypoint_ease_distance,
                    ctx.dt,
                );
            }
            probe.sacrifice_timer -= ctx.dt;
            if probe.sacrifice_timer <= 0.0 {
                probe.alive = false;
                return;
            }
            probe.genes.max_speed * config.sacrifice_speed_boost
        }
        ProbeMode::PlayerControlled => {
            let (accel_mul, speed_mul) = if ctx.boost {
                (config.player_boost_accel, config.player_boost_speed)
            } else {
                (1.0, 1.0)
            };
            let thrust = ctx.thrust.clamp_length_max(1.0);
            if thrust.is_finite() && thrust.length_squared() > 1e-6 {
                probe.vel += thrust * probe.genes.accel * accel_mul * ctx.dt;
                probe.heading = thrust.y.atan2(thrust.x);
            }
            probe.genes.max_speed * speed_mul
        }
        ProbeMode::Autonomous => {
            if let Some(rally) = ctx.rally_point {
                probe.waypoint = Some(rally);
                let accel = probe.genes.accel;
                steer_toward(
                    probe,
                    ctx.world,
                    rally,
                    accel,
                    config.steer_min_fraction,
                    config.waypoint_ease_distance,
                    ctx.dt,
                );
            } else {
                forage(probe, pool, ctx, rng);
            }
            probe.genes.max_speed
        }
    };

    integrate(probe, speed_cap, ctx);
}

/// Chase the current target, or wander and ping radar when there is none
fn forage<R: Rng + ?Sized>(
    probe: &mut Probe,
    pool: &ResourcePool,
    ctx: &BehaviorContext<'_>,
    rng: &mut R,
) {
    let config = ctx.config;

    if let Some(idx) = probe.target {
        match pool.get(idx) {
            Some(resource) if resource.is_active() && resource.amt > 0.0 => {
                let dist_sq = ctx.world.distance_sq(probe.pos, resource.pos);
                let drop_sq = config.target_drop_factor * config.radar_range * config.radar_range;
                if dist_sq > drop_sq {
                    probe.target = None;
                } else {
                    let accel = probe.genes.accel;
                    steer_toward(
                        probe,
                        ctx.world,
                        resource.pos,
                        accel,
                        config.steer_min_fraction,
                        config.target_ease_distance,
                        ctx.dt,
                    );
                    return;
                }
            }
            _ => probe.target = None,
        }
    }

    probe.radar_cooldown -= ctx.dt;
    probe.wander_timer = (probe.wander_timer - ctx.dt).max(0.0);

    if probe.radar_cooldown <= 0.0 {
        if let Some(idx) = pool.nearest_within(probe.pos, config.radar_range) {
            probe.target = Some(idx);
            probe.wander_timer = 0.0;
            probe.radar_cooldown = config.radar_cooldown.sample(rng);
            return;
        }
        probe.heading = rng.random::<f32>() * std::f32::consts::TAU;
        probe.wander_timer = config.wander_duration.sample(rng);
        probe.radar_cooldown = probe.wander_timer + config.wander_delay.sample(rng);
    }

    if probe.wander_timer > 0.0 {
        if config.heading_jitter > 0.0 && rng.random::<f32>() < config.heading_jitter_chance {
            let jitter = rng.random_range(-config.heading_jitter..=config.heading_jitter);
            probe.heading = normalize_angle(probe.heading + jitter);
        }
        probe.vel += heading_to_dir(probe.heading)
            * probe.genes.accel
            * config.wander_accel_fraction
            * ctx.dt;
    }
}

/// Accelerate toward `to`, easing off linearly inside `ease_distance`
fn steer_toward(
    probe: &mut Probe,
    world: World,
    to: Vec2,
    accel: f32,
    min_fraction: f32,
    ease_distance: f32,
    dt: f32,
) {
    let delta = world.delta(probe.pos, to);
    let dist = delta.length();
    if dist < 1e-3 {
        return;
    }
    let dir = delta / dist;
    let ease = (min_fraction + (1.0 - min_fraction) * dist / ease_distance).clamp(min_fraction, 1.0);
    probe.vel += dir * accel * ease * dt;
    probe.heading = dir.y.atan2(dir.x);
}

/// Clamp speed, move, damp, wrap
fn integrate(probe: &mut Probe, speed_cap: f32, ctx: &BehaviorContext<'_>) {
    let speed_sq = probe.vel.length_squared();
    if speed_sq > speed_cap * speed_cap {
        probe.vel *= speed_cap / speed_sq.sqrt();
    }
    probe.pos += probe.vel * ctx.dt;
    probe.vel *= ctx.damping;
    probe.pos = ctx.world.wrap_position(probe.pos);
}

/// Pull material from the target if touching it, otherwise from the nearest
/// touching resource. Returns the amount taken.
pub fn harvest(probe: &mut Probe, pool: &mut ResourcePool, config: &SimConfig, dt: f32) -> f32 {
    if !probe.alive {
        return 0.0;
    }
    let reach = config.probe_radius + config.touch_pad;
    let source = match probe.target {
        Some(idx) if pool.is_touching(idx, probe.pos, reach) => Some(idx),
        _ => pool.nearest_touching(probe.pos, reach),
    };
    let Some(idx) = source else {
        return 0.0;
    };
    let outcome = pool.harvest(idx, probe.genes.harvest_rate * dt);
    probe.resources_carried += outcome.taken;
    if outcome.depleted && probe.target == Some(idx) {
        probe.target = None;
    }
    outcome.taken
}
