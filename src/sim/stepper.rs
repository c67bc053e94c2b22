//! Fixed-step accumulator
//!
//! Converts variable frame times into whole simulation ticks.

use super::state::SimulationState;
use super::tick::{TickInput, tick};
use crate::config::SimConfig;

#[derive(Debug, Clone)]
pub struct FixedStepper {
    dt: f32,
    max_steps: u32,
    max_frame_dt: f32,
    accumulator: f32,
}

impl FixedStepper {
    pub fn new(dt: f32, max_steps: u32, max_frame_dt: f32) -> Self {
        Self {
            dt,
            max_steps: max_steps.max(1),
            max_frame_dt,
            accumulator: 0.0,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.sim_dt, config.max_steps_per_frame, config.max_frame_dt)
    }

    /// Run as many ticks as `frame_dt` pays for, up to the per-frame cap.
    ///
    /// One-shot commands in `input` are cleared after the first tick. When
    /// the cap is hit the remaining time is dropped rather than carried into
    /// the next frame. Returns the number of ticks run.
    pub fn advance(&mut self, state: &mut SimulationState, input: &mut TickInput, frame_dt: f32) -> u32 {
        self.advance_with(state, input, frame_dt, |_| {})
    }

    /// Like `advance`, calling `on_tick` after every tick while that tick's
    /// events are still in `state.events`
    pub fn advance_with<F>(
        &mut self,
        state: &mut SimulationState,
        input: &mut TickInput,
        frame_dt: f32,
        mut on_tick: F,
    ) -> u32
    where
        F: FnMut(&SimulationState),
    {
        let frame_dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, self.max_frame_dt)
        } else {
            0.0
        };
        self.accumulator += frame_dt;

        let mut steps = 0;
        while self.accumulator >= self.dt && steps < self.max_steps {
            tick(state, input, self.dt);
            on_tick(&*state);
            self.accumulator -= self.dt;
            steps += 1;

            // Clear one-shot inputs after processing
            input.clear_one_shots();
        }

        if self.accumulator >= self.dt {
            log::debug!(
                "Dropping {:.3}s of simulation time after {} steps",
                self.accumulator,
                steps
            );
            self.accumulator = 0.0;
        }
        steps
    }

    /// Fraction of a tick left in the accumulator, for interpolation
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.dt).clamp(0.0, 1.0)
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::master::MasterPhase;
    use crate::sim::resource::ResourceKind;
    use crate::sim::state::SimEvent;
    use glam::Vec2;

    fn state() -> SimulationState {
        let config = SimConfig {
            world_width: 1000.0,
            world_height: 1000.0,
            initial_probes: 5,
            common_count: 20,
            rich_count: 2,
            ..SimConfig::default()
        };
        SimulationState::with_seed(config, 9)
    }

    #[test]
    fn test_accumulates_partial_frames() {
        let mut sim = state();
        let mut input = TickInput::default();
        let mut stepper = FixedStepper::new(0.01, 8, 0.25);

        assert_eq!(stepper.advance(&mut sim, &mut input, 0.004), 0);
        assert!((stepper.alpha() - 0.4).abs() < 1e-4);
        assert_eq!(stepper.advance(&mut sim, &mut input, 0.0075), 1);
        assert_eq!(sim.time_ticks, 1);
        assert!((stepper.alpha() - 0.15).abs() < 1e-3);
    }

    #[test]
    fn test_cap_drops_leftover_time() {
        let mut sim = state();
        let mut input = TickInput::default();
        let mut stepper = FixedStepper::new(0.01, 3, 0.25);

        assert_eq!(stepper.advance(&mut sim, &mut input, 0.2), 3);
        assert_eq!(stepper.alpha(), 0.0);
        assert_eq!(sim.time_ticks, 3);
    }

    #[test]
    fn test_frame_time_is_clamped() {
        let mut sim = state();
        let mut input = TickInput::default();
        let mut stepper = FixedStepper::new(0.01, 1000, 0.05);
        let steps = stepper.advance(&mut sim, &mut input, 10.0);
        assert!((4..=5).contains(&steps));
        assert_eq!(stepper.advance(&mut sim, &mut input, f32::NAN), 0);
    }

    #[test]
    fn test_one_shots_fire_once_per_frame() {
        let mut sim = state();
        let mut input = TickInput {
            cycle_focus: true,
            replicate: true,
            ..Default::default()
        };
        let mut stepper = FixedStepper::new(0.01, 8, 0.25);
        assert_eq!(stepper.advance(&mut sim, &mut input, 0.055), 5);
        assert_eq!(sim.focus_slot(), 1);
        assert!(!input.cycle_focus);
        assert!(!input.replicate);
    }

    #[test]
    fn test_events_from_every_tick_reach_the_caller() {
        let config = SimConfig {
            world_width: 1000.0,
            world_height: 1000.0,
            initial_probes: 5,
            ..SimConfig::default()
        };
        let mut sim = SimulationState::with_layout(
            config,
            10,
            &[(ResourceKind::Common, Vec2::new(1.0, 1.0), 100.0)],
        );
        sim.pool.harvest(0, 100.0);

        // Two ticks per frame; the rally starts on the first
        let mut stepper = FixedStepper::new(0.01, 8, 0.25);
        let mut input = TickInput::default();
        let mut seen = Vec::new();
        let steps = stepper.advance_with(&mut sim, &mut input, 0.025, |s| {
            seen.extend(s.events.iter().copied())
        });
        assert_eq!(steps, 2);

        let rally = SimEvent::PhaseChanged {
            from: MasterPhase::Normal,
            to: MasterPhase::Rally,
        };
        assert!(seen.contains(&rally));
        assert!(!sim.events.contains(&rally));
    }
}
