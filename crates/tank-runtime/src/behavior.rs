//! [`BehaviorController`] – the tank's decision loop.
//!
//! Each cycle is level-triggered on the latest [`DetectionResult`]:
//!
//! 1. **Fidget** – a random, clamped gun move.
//! 2. **Observe** – poll the [`PersonSignal`].
//! 3. **Decide & act**
//!    - *Tracking*: a person is visible.  Cue `"human"`, turn the chain
//!      towards them (`current − relative_x × 1000`, clamped), then fidget
//!      again.
//!    - *Unavailable*: the camera has been silent for longer than
//!      `wait_for_camera_time` (or never delivered a frame).  One random
//!      chain move, then a `time_scale` pause.
//!    - *Idle*: the camera works but nobody is there.  Nothing more; the
//!      next cycle starts immediately.
//!
//! Every move is optimistic: the command is sent, [`AxisState`] is updated,
//! and the estimated travel time is slept through.  No hardware feedback is
//! consulted.  A rejected command ends the loop with
//! [`TankError::Transport`]; the axis keeps the value it had before the
//! failed move.
//!
//! Shutdown is only observed between cycles, so a move that has been issued
//! is always waited out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tank_hal::{AxisLimits, AxisState, Clock, MotionClient, linear_move};
use tank_perception::PersonSignal;
use tank_types::{Axis, DetectionResult, PhraseCue, TankError};
use tracing::{debug, info, info_span};

use crate::speech_cue::SpeechCue;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Motion and pacing parameters for [`BehaviorController`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub chain: AxisLimits,
    pub gun: AxisLimits,
    /// Feed rate for chain moves (`F` word).
    pub chain_speed: u32,
    /// Feed rate for gun moves (`F` word).
    pub gun_speed: u32,
    /// Largest random gun step per fidget, in axis units.
    pub gun_max_per_move: i64,
    /// Pause after an idle move while the camera is unavailable.
    pub time_scale: Duration,
    /// How long the camera may stay silent before it is considered gone.
    pub wait_for_camera_time: Duration,
    /// Interval between `"heartbeat"` cues; `None` disables them.
    pub heartbeat_interval: Option<Duration>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cycle outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Which branch a cycle took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleState {
    Tracking { relative_x: f32 },
    Idle,
    Unavailable,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub state: CycleState,
    /// Chain target commanded this cycle, if any.
    pub chain_target: Option<i64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorController
// ─────────────────────────────────────────────────────────────────────────────

pub struct BehaviorController {
    config: ControllerConfig,
    motion: MotionClient,
    axes: AxisState,
    person: PersonSignal,
    speech: SpeechCue,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    last_heartbeat: Instant,
    cycles: u64,
}

impl BehaviorController {
    /// Build a controller around an already initialized [`MotionClient`].
    ///
    /// The bring-up batch zeroes both axes, so the controller starts from a
    /// homed [`AxisState`].
    pub fn new(
        config: ControllerConfig,
        motion: MotionClient,
        person: PersonSignal,
        speech: SpeechCue,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let axes = AxisState::homed(config.chain, config.gun);
        let last_heartbeat = clock.now();
        Self {
            config,
            motion,
            axes,
            person,
            speech,
            clock,
            rng: StdRng::from_entropy(),
            last_heartbeat,
            cycles: 0,
        }
    }

    /// Replace the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn axes(&self) -> &AxisState {
        &self.axes
    }

    /// Number of cycles completed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run tracking cycles until `shutdown` is set or a move fails.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), TankError> {
        info!("behavior loop started");
        while !shutdown.load(Ordering::SeqCst) {
            let span = info_span!("cycle", n = self.cycles);
            let _enter = span.enter();
            self.tick()?;
        }
        info!(cycles = self.cycles, "behavior loop stopped");
        Ok(())
    }

    /// Run random chain moves paced by `time_scale` until `shutdown` is set
    /// or a move fails.  The camera is never consulted.
    pub fn run_random(&mut self, shutdown: &AtomicBool) -> Result<(), TankError> {
        info!("random loop started");
        while !shutdown.load(Ordering::SeqCst) {
            let span = info_span!("cycle", n = self.cycles);
            let _enter = span.enter();
            self.random_chain_move()?;
            self.clock.sleep(self.config.time_scale);
            self.cycles += 1;
        }
        info!(cycles = self.cycles, "random loop stopped");
        Ok(())
    }

    /// One full cycle, including all of its waits.
    pub fn tick(&mut self) -> Result<CycleReport, TankError> {
        self.maybe_heartbeat();
        self.fidget_gun()?;

        let result = self.person.poll();
        let report = match result.relative_x {
            Some(relative_x) => {
                self.speech.fire(&PhraseCue::Human);
                let target = self.tracking_target(relative_x);
                self.move_axis(Axis::Chain, target)?;
                self.fidget_gun()?;
                CycleReport {
                    state: CycleState::Tracking { relative_x },
                    chain_target: Some(target),
                }
            }
            None if self.camera_unavailable(&result) => {
                info!("camera unavailable, moving at random");
                let target = self.random_chain_move()?;
                self.clock.sleep(self.config.time_scale);
                CycleReport {
                    state: CycleState::Unavailable,
                    chain_target: Some(target),
                }
            }
            None => CycleReport {
                state: CycleState::Idle,
                chain_target: None,
            },
        };

        self.cycles += 1;
        debug!(state = ?report.state, "cycle complete");
        Ok(report)
    }

    fn tracking_target(&self, relative_x: f32) -> i64 {
        let offset = (f64::from(relative_x) * 1000.0).round() as i64;
        self.config
            .chain
            .clamp(self.axes.position(Axis::Chain) - offset)
    }

    fn camera_unavailable(&self, result: &DetectionResult) -> bool {
        match result.camera_last_seen {
            None => true,
            Some(seen) => {
                self.clock.now().saturating_duration_since(seen) > self.config.wait_for_camera_time
            }
        }
    }

    fn maybe_heartbeat(&mut self) {
        let Some(interval) = self.config.heartbeat_interval else {
            return;
        };
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_heartbeat) >= interval {
            self.last_heartbeat = now;
            self.speech.fire(&PhraseCue::Heartbeat);
        }
    }

    fn fidget_gun(&mut self) -> Result<(), TankError> {
        let step = self.config.gun_max_per_move;
        let delta = self.rng.gen_range(-step..=step);
        let target = self.config.gun.clamp(self.axes.position(Axis::Gun) + delta);
        self.move_axis(Axis::Gun, target)?;
        Ok(())
    }

    fn random_chain_move(&mut self) -> Result<i64, TankError> {
        let target = self
            .rng
            .gen_range(self.config.chain.min()..=self.config.chain.max());
        self.move_axis(Axis::Chain, target)?;
        Ok(target)
    }

    /// Send the move, record it, and wait for it to finish.
    fn move_axis(&mut self, axis: Axis, target: i64) -> Result<Duration, TankError> {
        let speed = match axis {
            Axis::Chain => self.config.chain_speed,
            Axis::Gun => self.config.gun_speed,
        };
        self.motion.send([linear_move(axis, target, speed)])?;
        let from = self.axes.position(axis);
        let duration = self.axes.estimate_and_set(axis, target);
        info!(%axis, from, to = target, ?duration, "moving");
        self.clock.sleep(duration);
        Ok(duration)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
