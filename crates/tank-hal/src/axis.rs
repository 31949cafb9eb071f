//! Believed axis positions and move-duration estimation.
//!
//! The motion controller reports nothing back once a move is accepted, so
//! [`AxisState`] is an open-loop model: it stores the last commanded target
//! of each axis and predicts how long a move takes from the configured
//! travel time per 1000 position units.  If a physical move is interrupted
//! or runs slower than modelled, the stored position silently disagrees with
//! the hardware until the next homing.

use std::time::Duration;

use tank_types::{Axis, TankError};

/// Travel bounds and speed model for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    min: i64,
    max: i64,
    time_per_1000: f64,
}

impl AxisLimits {
    /// Build limits for `axis`.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::Config`] when `min > max` or when
    /// `time_per_1000` (seconds of travel per 1000 units) is negative or not
    /// finite.
    pub fn new(axis: Axis, min: i64, max: i64, time_per_1000: f64) -> Result<Self, TankError> {
        if min > max {
            return Err(TankError::Config(format!(
                "{axis}_min ({min}) must not exceed {axis}_max ({max})"
            )));
        }
        if !time_per_1000.is_finite() || time_per_1000 < 0.0 {
            return Err(TankError::Config(format!(
                "{axis}_time_per_1000 must be a non-negative number, got {time_per_1000}"
            )));
        }
        Ok(Self {
            min,
            max,
            time_per_1000,
        })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn time_per_1000(&self) -> f64 {
        self.time_per_1000
    }

    pub fn clamp(&self, target: i64) -> i64 {
        target.clamp(self.min, self.max)
    }

    /// Predicted travel time between two positions.
    pub fn travel_time(&self, from: i64, to: i64) -> Duration {
        let distance = from.abs_diff(to) as f64;
        Duration::from_secs_f64(distance / 1000.0 * self.time_per_1000)
    }
}

/// The controller's belief of where each axis currently is.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisState {
    chain_position: i64,
    gun_position: i64,
    chain_limits: AxisLimits,
    gun_limits: AxisLimits,
}

impl AxisState {
    /// State right after the homing sequence: both axes at zero.
    pub fn homed(chain_limits: AxisLimits, gun_limits: AxisLimits) -> Self {
        Self {
            chain_position: 0,
            gun_position: 0,
            chain_limits,
            gun_limits,
        }
    }

    pub fn position(&self, axis: Axis) -> i64 {
        match axis {
            Axis::Chain => self.chain_position,
            Axis::Gun => self.gun_position,
        }
    }

    pub fn limits(&self, axis: Axis) -> &AxisLimits {
        match axis {
            Axis::Chain => &self.chain_limits,
            Axis::Gun => &self.gun_limits,
        }
    }

    /// Record that `axis` was commanded to `target` and return how long the
    /// move is expected to take.
    ///
    /// Gun targets are clamped into the gun limits here; chain targets are
    /// stored as given because the caller clamps them before issuing the
    /// command.
    pub fn estimate_and_set(&mut self, axis: Axis, target: i64) -> Duration {
        let target = match axis {
            Axis::Chain => target,
            Axis::Gun => self.gun_limits.clamp(target),
        };
        let current = self.position(axis);
        let duration = self.limits(axis).travel_time(current, target);
        match axis {
            Axis::Chain => self.chain_position = target,
            Axis::Gun => self.gun_position = target,
        }
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(axis: Axis, min: i64, max: i64, t: f64) -> AxisLimits {
        AxisLimits::new(axis, min, max, t).unwrap()
    }

    fn state() -> AxisState {
        AxisState::homed(
            limits(Axis::Chain, 0, 2000, 1.0),
            limits(Axis::Gun, 0, 2000, 4.0),
        )
    }

    #[test]
    fn homed_state_is_zeroed() {
        let s = state();
        assert_eq!(s.position(Axis::Chain), 0);
        assert_eq!(s.position(Axis::Gun), 0);
    }

    #[test]
    fn duration_is_proportional_to_distance() {
        let mut s = state();
        s.estimate_and_set(Axis::Chain, 1000);
        let d = s.estimate_and_set(Axis::Chain, 800);
        assert!((d.as_secs_f64() - 0.2).abs() < 1e-9);
        assert_eq!(s.position(Axis::Chain), 800);
    }

    #[test]
    fn duration_uses_absolute_distance() {
        let mut s = state();
        let forward = s.estimate_and_set(Axis::Chain, 500);
        let back = s.estimate_and_set(Axis::Chain, 0);
        assert_eq!(forward, back);
        assert!((back.as_secs_f64() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn each_axis_uses_its_own_rate() {
        let mut s = state();
        let d = s.estimate_and_set(Axis::Gun, 250);
        assert!((d.as_secs_f64() - 1.0).abs() < 1e-9);
        assert_eq!(s.position(Axis::Chain), 0);
    }

    #[test]
    fn zero_distance_move_takes_no_time() {
        let mut s = state();
        assert_eq!(s.estimate_and_set(Axis::Chain, 0), Duration::ZERO);
    }

    #[test]
    fn gun_target_is_clamped() {
        let mut s = state();
        let d = s.estimate_and_set(Axis::Gun, 5000);
        assert_eq!(s.position(Axis::Gun), 2000);
        assert!((d.as_secs_f64() - 8.0).abs() < 1e-9);

        s.estimate_and_set(Axis::Gun, -40);
        assert_eq!(s.position(Axis::Gun), 0);
    }

    #[test]
    fn chain_target_is_stored_as_given() {
        let mut s = state();
        s.estimate_and_set(Axis::Chain, 2500);
        assert_eq!(s.position(Axis::Chain), 2500);
    }

    #[test]
    fn every_in_range_target_round_trips() {
        let mut s = state();
        for target in (0..=2000).step_by(125) {
            let previous = s.position(Axis::Chain);
            let d = s.estimate_and_set(Axis::Chain, target);
            let expected = (target - previous).abs() as f64 / 1000.0;
            assert!((d.as_secs_f64() - expected).abs() < 1e-9);
            assert_eq!(s.position(Axis::Chain), target);
        }
    }

    #[test]
    fn limits_reject_inverted_range() {
        let err = AxisLimits::new(Axis::Chain, 10, 0, 1.0).unwrap_err();
        assert!(matches!(err, TankError::Config(msg) if msg.contains("chain_min")));
    }

    #[test]
    fn limits_reject_negative_rate() {
        assert!(AxisLimits::new(Axis::Gun, 0, 10, -1.0).is_err());
        assert!(AxisLimits::new(Axis::Gun, 0, 10, f64::NAN).is_err());
    }

    #[test]
    fn clamp_respects_bounds() {
        let l = limits(Axis::Chain, -100, 100, 1.0);
        assert_eq!(l.clamp(-500), -100);
        assert_eq!(l.clamp(42), 42);
        assert_eq!(l.clamp(500), 100);
    }
}
