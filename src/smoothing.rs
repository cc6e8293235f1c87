use serde::{Deserialize, Serialize};

use crate::{MixerError, MixerResult};

pub const DEFAULT_CORNER_HZ: f32 = 920.0;
pub const DEFAULT_SNAP_THRESHOLD: f32 = 1e-6;
pub const DEFAULT_DRIFT_EPSILON: f32 = 1e-10;

/// One-pole gain smoothing, evaluated once per chunk.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Smoothing {
    pub corner_hz: f32,
    pub snap_threshold: f32,
    /// Forcing term added on every step so the approach never stalls.
    pub drift_epsilon: f32,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            corner_hz: DEFAULT_CORNER_HZ,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            drift_epsilon: DEFAULT_DRIFT_EPSILON,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Settled,
    Converging,
}

impl CellState {
    pub fn of(applied: f32, target: f32) -> Self {
        if applied == target {
            CellState::Settled
        } else {
            CellState::Converging
        }
    }
}

impl Smoothing {
    pub fn corner(&mut self, hz: f32) -> &mut Self {
        self.corner_hz = hz.max(f32::MIN_POSITIVE);
        self
    }

    pub fn snap(&mut self, threshold: f32) -> &mut Self {
        self.snap_threshold = threshold.max(0.0);
        self
    }

    pub fn epsilon(&mut self, epsilon: f32) -> &mut Self {
        self.drift_epsilon = epsilon;
        self
    }

    /// Filter coefficient for `sample_rate`, capped at 1 (jump straight to target).
    pub fn coefficient(&self, sample_rate: f64) -> MixerResult<f32> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(MixerError::InvalidSampleRate(sample_rate));
        }
        Ok((self.corner_hz as f64 / sample_rate).min(1.0) as f32)
    }

    #[inline]
    pub fn step(&self, applied: f32, target: f32, lpf: f32) -> f32 {
        if (applied - target).abs() < self.snap_threshold {
            return target;
        }
        let next = applied + lpf * (target - applied) + self.drift_epsilon;
        // The increment can round away to nothing just outside the snap
        // threshold; finish the approach instead of stalling there.
        if next == applied { target } else { next }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coefficient_at_48k() {
        let lpf = Smoothing::default().coefficient(48000.0).unwrap();
        assert!((lpf - 0.019_166_667).abs() < 1e-6);
    }

    #[test]
    fn test_coefficient_rejects_bad_rates() {
        let s = Smoothing::default();
        assert!(s.coefficient(0.0).is_err());
        assert!(s.coefficient(-44100.0).is_err());
        assert!(s.coefficient(f64::NAN).is_err());
        assert!(s.coefficient(f64::INFINITY).is_err());
    }

    #[test]
    fn test_coefficient_capped_for_low_rates() {
        let lpf = Smoothing::default().coefficient(100.0).unwrap();
        assert_eq!(lpf, 1.0);
    }

    #[test]
    fn test_step_snaps_inside_threshold() {
        let s = Smoothing::default();
        assert_eq!(s.step(0.999_999_5, 1.0, 0.02), 1.0);
        assert_eq!(s.step(1.0, 1.0, 0.02), 1.0);
    }

    #[test]
    fn test_step_moves_toward_target() {
        let s = Smoothing::default();
        let next = s.step(0.0, 1.0, 0.02);
        assert!((next - 0.02).abs() < 1e-7);
        let next = s.step(1.0, 0.0, 0.02);
        assert!((next - 0.98).abs() < 1e-7);
    }

    #[test]
    fn test_rising_and_falling_targets_settle_exactly() {
        let s = Smoothing::default();
        for rate in [44100.0, 48000.0, 96000.0, 192000.0] {
            let lpf = s.coefficient(rate).unwrap();
            for (start, target) in [(0.0, 0.8), (0.0, 1.0), (0.0, -1.0), (0.0, 2.0), (2.0, -0.5), (1.0, 0.0)] {
                let mut applied = start;
                let mut steps = 0;
                while applied != target {
                    let next = s.step(applied, target, lpf);
                    assert!(
                        (next - target).abs() <= (applied - target).abs(),
                        "{start} -> {target} at {rate} Hz moved away"
                    );
                    applied = next;
                    steps += 1;
                    assert!(steps < 20_000, "{start} -> {target} at {rate} Hz stalled at {applied}");
                }
            }
        }
    }

    #[test]
    fn test_step_never_rounds_to_no_progress() {
        let s = Smoothing::default();
        let lpf = s.coefficient(48000.0).unwrap();
        // 1.2e-6 below unity: the plain increment is under half an ulp here
        let applied = 0.999_998_8f32;
        assert_eq!(s.step(applied, 1.0, lpf), 1.0);
    }

    #[test]
    fn test_epsilon_is_tunable() {
        let mut s = Smoothing::default();
        s.epsilon(0.0);
        assert_eq!(s.step(0.0, 1.0, 0.5), 0.5);
        s.epsilon(0.25);
        assert_eq!(s.step(0.0, 1.0, 0.5), 0.75);
    }

    #[test]
    fn test_cell_state() {
        assert_eq!(CellState::of(1.0, 1.0), CellState::Settled);
        assert_eq!(CellState::of(0.5, 1.0), CellState::Converging);
    }
}
