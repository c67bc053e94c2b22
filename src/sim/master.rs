//! Master AI orchestration
//!
//! A global state machine layered over the swarm. Once a system is mostly
//! drained it calls every probe to a shared waypoint, spends a fraction of
//! the closest ones to build a warp structure, charges it, then moves the
//! survivors to a fresh system.
//!
//! ```text
//! Normal --depleted--> Rally --arrived--> Build --all sacrificed--> Charge
//!    ^                                                                 |
//!    +----------------------- Warp <------- charge_duration -----------+
//! ```

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::select::{Candidate, select_k_closest};
use super::state::{SimEvent, SimulationState};
use crate::heading_to_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MasterPhase {
    #[default]
    Normal,
    Rally,
    Build,
    Charge,
    /// Only observed for the instant of a system swap
    Warp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureMode {
    Building,
    Charging,
}

/// The structure sacrifices build at the rally waypoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpStructure {
    pub pos: Vec2,
    pub mode: StructureMode,
    /// 0..=1 while charging
    pub charge_progress: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterState {
    pub phase: MasterPhase,
    /// Seconds spent in the current phase
    pub timer: f32,
    pub waypoint: Option<Vec2>,
    pub sacrificed: u32,
    pub to_sacrifice: u32,
    pub structure: Option<WarpStructure>,
}

impl MasterState {
    /// Shared waypoint autonomous probes steer to, if any
    pub fn rally_point(&self) -> Option<Vec2> {
        match self.phase {
            MasterPhase::Normal | MasterPhase::Warp => None,
            _ => self.waypoint,
        }
    }
}

/// Evaluate the Master AI once. Called by `tick` after replication.
pub fn update(state: &mut SimulationState, dt: f32) {
    state.master.timer += dt;

    match state.master.phase {
        MasterPhase::Normal => {
            if !state.probes.is_empty()
                && state.pool.depletion() >= state.config.depletion_threshold
            {
                begin_rally(state);
            }
        }
        MasterPhase::Rally => {
            if rally_complete(state) {
                begin_build(state);
            }
        }
        MasterPhase::Build => {
            if state.master.sacrificed >= state.master.to_sacrifice {
                begin_charge(state);
            }
        }
        MasterPhase::Charge => {
            let duration = state.config.charge_duration;
            let progress = if duration > 0.0 {
                (state.master.timer / duration).min(1.0)
            } else {
                1.0
            };
            if let Some(structure) = state.master.structure.as_mut() {
                structure.charge_progress = progress;
            }
            if state.master.timer >= duration {
                warp(state);
            }
        }
        // Warp is left in the update that enters it
        MasterPhase::Warp => set_phase(state, MasterPhase::Normal),
    }
}

fn set_phase(state: &mut SimulationState, to: MasterPhase) {
    let from = state.master.phase;
    state.master.phase = to;
    state.master.timer = 0.0;
    state.events.push(SimEvent::PhaseChanged { from, to });
    log::info!("Master AI: {:?} -> {:?}", from, to);
}

fn begin_rally(state: &mut SimulationState) {
    let waypoint = state.world.random_point(&mut state.rng);
    for probe in state.probes.iter_mut().filter(|p| p.alive) {
        probe.waypoint = Some(waypoint);
        probe.target = None;
    }
    state.master.waypoint = Some(waypoint);
    state.master.sacrificed = 0;
    state.master.to_sacrifice = 0;
    log::info!(
        "System {} at {:.0}% depletion, rallying at ({:.0}, {:.0})",
        state.system_index,
        state.pool.depletion() * 100.0,
        waypoint.x,
        waypoint.y
    );
    set_phase(state, MasterPhase::Rally);
}

/// Arrival count needed out of `population` for a fraction, never below one
fn arrival_quota(population: usize, fraction: f32) -> usize {
    ((population as f32 * fraction).ceil() as usize).max(1)
}

fn rally_complete(state: &SimulationState) -> bool {
    let Some(waypoint) = state.master.waypoint else {
        return false;
    };
    let radius_sq = state.config.rally_radius * state.config.rally_radius;
    let mut population = 0;
    let mut arrived = 0;
    for probe in state.probes.iter().filter(|p| p.alive && !p.sacrificing) {
        population += 1;
        if state.world.distance_sq(probe.pos, waypoint) <= radius_sq {
            arrived += 1;
        }
    }

    arrived >= arrival_quota(population, state.config.rally_required_fraction)
        || (state.master.timer >= state.config.rally_timeout
            && arrived >= arrival_quota(population, state.config.rally_relaxed_fraction))
}

fn begin_build(state: &mut SimulationState) {
    let Some(waypoint) = state.master.waypoint else {
        set_phase(state, MasterPhase::Normal);
        return;
    };
    state.master.structure = Some(WarpStructure {
        pos: waypoint,
        mode: StructureMode::Building,
        charge_progress: 0.0,
    });

    let eligible = state.probes.iter().filter(|p| p.is_sacrifice_eligible()).count();
    let quota = (eligible as f32 * state.config.sacrifice_fraction).floor() as usize;
    state.master.sacrificed = 0;
    state.master.to_sacrifice = quota as u32;
    set_phase(state, MasterPhase::Build);

    if quota == 0 {
        begin_charge(state);
        return;
    }

    let mut scratch = std::mem::take(&mut state.selection_scratch);
    scratch.clear();
    scratch.extend(
        state
            .probes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_sacrifice_eligible())
            .map(|(slot, p)| Candidate {
                slot,
                dist_sq: state.world.distance_sq(p.pos, waypoint),
            }),
    );
    select_k_closest(&mut scratch, quota);
    for candidate in &scratch[..quota] {
        let timer = state.config.sacrifice_timer.sample(&mut state.rng);
        state.probes[candidate.slot].begin_sacrifice(waypoint, timer);
    }
    log::debug!("Selected {} of {} probes for sacrifice", quota, eligible);
    state.selection_scratch = scratch;
}

fn begin_charge(state: &mut SimulationState) {
    if let Some(structure) = state.master.structure.as_mut() {
        structure.mode = StructureMode::Charging;
        structure.charge_progress = 0.0;
    }
    set_phase(state, MasterPhase::Charge);
}

/// Swap in a fresh system and scatter the survivors around its center
fn warp(state: &mut SimulationState) {
    set_phase(state, MasterPhase::Warp);

    state.pool.spawn_system(&state.config, &mut state.rng);
    state.system_index += 1;

    let center = state.world.center();
    let spread = state.config.warp_spread_radius;
    let speed = state.config.warp_speed;
    let mut survivors = 0;
    for probe in state.probes.iter_mut().filter(|p| p.alive) {
        probe.pos = state.world.random_point_near(&mut state.rng, center, spread);
        let angle = state.rng.random::<f32>() * std::f32::consts::TAU;
        probe.vel = heading_to_dir(angle) * state.rng.random::<f32>() * speed;
        probe.reset_behavior(&state.config, &mut state.rng);
        survivors += 1;
    }

    state.master.waypoint = None;
    state.master.structure = None;
    state.events.push(SimEvent::Warped {
        system_index: state.system_index,
        survivors,
    });
    log::info!(
        "Warped to system {} with {} probes",
        state.system_index,
        survivors
    );

    set_phase(state, MasterPhase::Normal);
}
