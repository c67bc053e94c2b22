//! Fixed timestep simulation tick
//!
//! One tick runs the stages in a fixed order: probe behavior and motion,
//! harvesting, replication, Master AI, dead-probe compaction.

use glam::Vec2;

use super::master;
use super::probe::{BehaviorContext, harvest, update_probe};
use super::state::SimulationState;

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Player thrust direction, length at most 1
    pub thrust: Vec2,
    /// Hold to boost the player's accel and speed cap
    pub boost: bool,
    /// Ask the player probe to replicate (one-shot)
    pub replicate: bool,
    /// Move the camera focus to the next probe (one-shot)
    pub cycle_focus: bool,
}

impl TickInput {
    /// Drop commands that must only fire once per frame
    pub fn clear_one_shots(&mut self) {
        self.replicate = false;
        self.cycle_focus = false;
    }
}

/// Advance the simulation by one fixed timestep
pub fn tick(state: &mut SimulationState, input: &TickInput, dt: f32) {
    state.events.clear();
    state.time_ticks += 1;

    if input.cycle_focus {
        state.cycle_focus();
    }

    // Behavior and motion
    let ctx = BehaviorContext {
        config: &state.config,
        world: state.world,
        dt,
        damping: state.damping_for(dt),
        rally_point: state.master.rally_point(),
        thrust: input.thrust,
        boost: input.boost,
    };
    for probe in &mut state.probes {
        update_probe(probe, &state.pool, &ctx, &mut state.rng);
    }

    // Harvesting
    for probe in &mut state.probes {
        harvest(probe, &mut state.pool, &state.config, dt);
    }

    // Replication: the player's request first, then every autonomous probe
    if input.replicate {
        let slot = state.player_slot();
        state.try_replicate(slot);
    }
    let parents = state.probes.len();
    for slot in 0..parents {
        if state.probes[slot].wants_to_replicate(&state.config) {
            state.try_replicate(slot);
        }
    }

    master::update(state, dt);

    state.compact_dead();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::consts::SIM_DT;
    use crate::sim::master::MasterPhase;
    use crate::sim::resource::ResourceKind;
    use crate::sim::state::SimEvent;

    fn small_config() -> SimConfig {
        SimConfig {
            world_width: 2000.0,
            world_height: 2000.0,
            initial_probes: 60,
            max_probes: 400,
            initial_spread_radius: 800.0,
            common_count: 200,
            rich_count: 20,
            cluster_count: 4,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_tick_counts_and_clears_events() {
        let mut state = SimulationState::with_seed(small_config(), 1);
        state.events.push(SimEvent::Sacrificed { id: 99 });
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.time_ticks, 1);
        assert!(!state.events.contains(&SimEvent::Sacrificed { id: 99 }));
    }

    #[test]
    fn test_resources_are_conserved_each_tick() {
        let mut state = SimulationState::with_seed(small_config(), 2);
        let mut last_remaining = state.pool.remaining_total();
        for _ in 0..600 {
            tick(&mut state, &TickInput::default(), SIM_DT);
            state.pool.assert_consistent();
            if state.master.phase == MasterPhase::Normal && state.system_index == 0 {
                assert!(state.pool.remaining_total() <= last_remaining + 1e-6);
                last_remaining = state.pool.remaining_total();
            }
        }
    }

    #[test]
    fn test_replication_never_creates_resources() {
        let config = SimConfig {
            replication_cooldown: crate::config::FloatRange::new(0.0, 0.0),
            ..small_config()
        };
        let cost = config.replication_cost;
        let child_start = config.child_start_resources;
        let mut state = SimulationState::with_layout(
            config,
            3,
            &[(ResourceKind::Common, Vec2::new(1.0, 1.0), 100.0)],
        );
        for probe in state.probes.iter_mut().skip(1).take(10) {
            probe.resources_carried = cost + 10.0;
        }
        let before = state.probes.len();
        tick(&mut state, &TickInput::default(), SIM_DT);

        let births = state
            .events
            .iter()
            .filter(|e| matches!(e, SimEvent::Replicated { .. }))
            .count();
        assert_eq!(births, 10);
        assert_eq!(state.probes.len(), before + 10);
        for event in &state.events {
            if let SimEvent::Replicated { parent, child } = *event {
                let parent = state.probes.iter().find(|p| p.id == parent).expect("parent alive");
                let child = state.probes.iter().find(|p| p.id == child).expect("child alive");
                assert!(parent.resources_carried <= 10.0 + 1e-3);
                assert_eq!(child.resources_carried, child_start);
            }
        }
    }

    #[test]
    fn test_player_replicates_on_request_only() {
        let config = small_config();
        let cost = config.replication_cost;
        let mut state = SimulationState::with_layout(
            config,
            4,
            &[(ResourceKind::Common, Vec2::new(1.0, 1.0), 100.0)],
        );
        state.player_mut().resources_carried = cost * 3.0;
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.player().resources_carried, cost * 3.0);

        let input = TickInput {
            replicate: true,
            ..Default::default()
        };
        tick(&mut state, &input, SIM_DT);
        assert!((state.player().resources_carried - cost * 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_depletion_triggers_rally_on_crossing_tick() {
        let mut state = SimulationState::with_layout(
            small_config(),
            5,
            &[(ResourceKind::Common, Vec2::new(1.0, 1.0), 100.0)],
        );
        state.pool.harvest(0, 80.0);
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.master.phase, MasterPhase::Normal);

        state.pool.harvest(0, 15.0);
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.master.phase, MasterPhase::Rally);
        assert!(state.events.contains(&SimEvent::PhaseChanged {
            from: MasterPhase::Normal,
            to: MasterPhase::Rally
        }));
    }

    #[test]
    fn test_sacrifice_accounting() {
        let mut state = SimulationState::with_layout(
            small_config(),
            6,
            &[(ResourceKind::Common, Vec2::new(1.0, 1.0), 100.0)],
        );
        state.pool.harvest(0, 100.0);
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.master.phase, MasterPhase::Rally);

        let waypoint = state.master.waypoint.expect("rally waypoint");
        for probe in &mut state.probes {
            probe.pos = waypoint;
            probe.vel = Vec2::ZERO;
        }
        let population = state.probes.len();
        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.master.phase, MasterPhase::Build);
        let quota = state.master.to_sacrifice as usize;
        assert_eq!(quota, (population - 1) / 10);
        assert!(!state.player().sacrificing);

        let mut deaths = 0;
        let mut ticks = 0;
        while state.master.phase == MasterPhase::Build {
            tick(&mut state, &TickInput::default(), SIM_DT);
            deaths += state
                .events
                .iter()
                .filter(|e| matches!(e, SimEvent::Sacrificed { .. }))
                .count();
            ticks += 1;
            assert!(ticks < 600, "sacrifices never finished");
        }
        assert_eq!(state.master.phase, MasterPhase::Charge);
        assert_eq!(deaths, quota);
        assert_eq!(state.master.sacrificed as usize, quota);
        assert_eq!(state.probes.len(), population - quota);
        assert!(state.player().is_player());
    }

    #[test]
    fn test_full_cycle_end_to_end() {
        let config = SimConfig {
            initial_probes: 30,
            max_probes: 30,
            rally_timeout: 2.0,
            rally_relaxed_fraction: 0.0,
            charge_duration: 1.0,
            ..small_config()
        };
        let mut state = SimulationState::with_layout(
            config,
            7,
            &[
                (ResourceKind::Common, Vec2::new(1000.0, 1000.0), 120.0),
                (ResourceKind::Rich, Vec2::new(1020.0, 1000.0), 600.0),
            ],
        );
        // Park the swarm on the field
        for probe in &mut state.probes {
            probe.pos = Vec2::new(1010.0, 1000.0);
        }

        let mut last_remaining = state.pool.remaining_total();
        let mut before_warp = None;
        let mut sacrificed = 0;
        for _ in 0..60 * 240 {
            tick(&mut state, &TickInput::default(), SIM_DT);
            state.pool.assert_consistent();
            if state.system_index == 0 && state.master.phase == MasterPhase::Normal {
                assert!(state.pool.remaining_total() <= last_remaining + 1e-6);
                last_remaining = state.pool.remaining_total();
            }
            if state.master.phase == MasterPhase::Rally && before_warp.is_none() {
                before_warp = Some(state.probes.len());
            }
            if state.master.phase == MasterPhase::Charge {
                sacrificed = state.master.sacrificed as usize;
            }
            if state.system_index == 1 {
                break;
            }
        }

        assert_eq!(state.system_index, 1, "cycle never completed");
        assert_eq!(state.master.phase, MasterPhase::Normal);
        let before = before_warp.expect("rally happened");
        assert_eq!(sacrificed, (before - 1) / 10);
        assert_eq!(state.probes.len(), before - sacrificed);
        assert!(state.pool.active_count() > 2);
    }
}
