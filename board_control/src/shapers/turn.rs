//! Turn tilt shaper (third shaper, after nose-angling and ATR).
//!
//! Adds a pitch offset proportional to yaw rate so the board leans into
//! turns, boosted by speed and by sustained yaw, capped by a limit, and
//! suppressed both by the "cutback" condition (banked hard into the turn)
//! and by ATR interference (heavy accel/brake).

use board_common::config::BoardConfig;

use crate::director::step_towards;
use crate::inputs::Samples;

#[derive(Debug, Clone, Copy, Default)]
pub struct TurnTiltOutput {
    pub interp: f64,
    pub cutback: bool,
    /// True when ATR interference scaled turn tilt's target all the way to
    /// zero this tick — the caller (the input sampler) should reset
    /// `yaw_aggregate` in response.
    pub reset_yaw_aggregate: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TurnTilt {
    target: f64,
    interp: f64,
}

impl TurnTilt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn interp(&self) -> f64 {
        self.interp
    }

    /// `torquetilt_target` is ATR's EMA target (not its interpolant) —
    /// ATR interference keys off `torquetilt_target`, not ATR's own
    /// interpolant. `noseangling_interp` is used by the accel/brake freeze
    /// predicate.
    pub fn tick(
        &mut self,
        samples: &Samples,
        cfg: &BoardConfig,
        torquetilt_target: f64,
        noseangling_interp: f64,
        running: bool,
    ) -> TurnTiltOutput {
        if !running {
            self.target = 0.0;
            let step = cfg.turntilt_speed / cfg.hz;
            self.interp = step_towards(self.interp, self.target, step);
            return TurnTiltOutput {
                interp: self.interp,
                cutback: false,
                reset_yaw_aggregate: false,
            };
        }

        let abs_yaw_scaled = 100.0 * samples.yaw_change.abs();
        let cutback = detect_cutback(samples, abs_yaw_scaled);

        let mut target = if abs_yaw_scaled < cfg.turntilt_start_angle {
            0.0
        } else {
            let mut t = samples.yaw_change.abs() * cfg.turntilt_strength;

            let boost_frac = cfg.turntilt_erpm_boost / 100.0;
            let boost = if samples.abs_erpm < cfg.turntilt_erpm_boost_end {
                1.0 + boost_frac * (samples.abs_erpm / cfg.turntilt_erpm_boost_end)
            } else {
                1.0 + boost_frac
            };
            t *= boost;

            let damper = if samples.abs_erpm < 2000.0 { 0.5 } else { 1.0 };
            let agg_boost = (1.0
                + damper * samples.yaw_aggregate.abs() / cfg.turntilt_yaw_aggregate_target)
                .min(2.0);
            t *= agg_boost;

            t = t.clamp(-cfg.turntilt_angle_limit, cfg.turntilt_angle_limit);

            if samples.abs_erpm < cfg.turntilt_start_erpm {
                0.0
            } else {
                t * samples.erpm.signum()
            }
        };

        let mut reset_yaw_aggregate = false;
        let atr_mag = torquetilt_target.abs();
        let signs_oppose = target != 0.0 && torquetilt_target.signum() != target.signum();
        let atr_min = if signs_oppose { 1.0 } else { 2.0 };
        let atr_max = if signs_oppose { 4.0 } else { 5.0 };
        if atr_mag > atr_min {
            let scale = if atr_mag >= atr_max {
                0.0
            } else {
                1.0 - (atr_mag - atr_min) / (atr_max - atr_min)
            };
            target *= scale;
            if scale == 0.0 {
                reset_yaw_aggregate = true;
            }
        }

        if (samples.pitch - noseangling_interp).abs() > 4.0 {
            target = 0.0;
        }

        self.target = target;
        let step = cfg.turntilt_speed / cfg.hz;
        self.interp = step_towards(self.interp, self.target, step);

        TurnTiltOutput {
            interp: self.interp,
            cutback,
            reset_yaw_aggregate,
        }
    }
}

/// Cutback: the board is banked hard into a turn it's actively carving
/// out of. Exposed so [`super::Shapers::tick`] can compute it once, ahead
/// of the ATR shaper, without introducing a circular dependency.
pub fn detect_cutback(samples: &Samples, abs_yaw_scaled: f64) -> bool {
    if samples.roll_aggregate.abs() <= 5000.0 {
        return false;
    }
    if abs_yaw_scaled <= 5.0 {
        return false;
    }
    if samples.roll.abs() < 1e-6 {
        return false;
    }
    (samples.yaw_change * 100.0 / samples.roll) < 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_start_angle_targets_zero() {
        let cfg = BoardConfig {
            turntilt_start_angle: 3.0,
            ..BoardConfig::default()
        };
        let mut t = TurnTilt::new();
        let s = Samples {
            yaw_change: 0.001,
            abs_erpm: 1000.0,
            erpm: 1000.0,
            ..Default::default()
        };
        let out = t.tick(&s, &cfg, 0.0, 0.0, true);
        assert_eq!(out.interp, 0.0);
    }

    #[test]
    fn not_running_decays_to_zero() {
        let cfg = BoardConfig::default();
        let mut t = TurnTilt::new();
        let s = Samples::default();
        let out = t.tick(&s, &cfg, 0.0, 0.0, false);
        assert_eq!(out.interp, 0.0);
        assert!(!out.cutback);
    }

    #[test]
    fn atr_interference_suppresses_target_and_flags_reset() {
        let cfg = BoardConfig {
            turntilt_start_angle: 0.0,
            turntilt_start_erpm: 0.0,
            turntilt_strength: 10.0,
            turntilt_angle_limit: 10.0,
            ..BoardConfig::default()
        };
        let mut t = TurnTilt::new();
        let s = Samples {
            yaw_change: 1.0,
            abs_erpm: 500.0,
            erpm: 500.0,
            ..Default::default()
        };
        // Large opposing torquetilt_target should scale turn tilt to 0.
        let out = t.tick(&s, &cfg, -6.0, 0.0, true);
        assert_eq!(out.interp, 0.0);
    }
}
