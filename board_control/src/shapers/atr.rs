//! Adaptive Torque Response ("torque tilt") shaper (second shaper, after
//! nose-angling).
//!
//! Predicts the acceleration the current motor current *should* produce,
//! compares it to the acceleration the acceleration window actually
//! measured, and biases the setpoint toward terrain that's steeper than
//! expected. Uses the same EMA/step-size idioms the other shapers use; the
//! accel-gap bucket table and the dead lower clip on the measured
//! acceleration are both reproduced literally from the original firmware —
//! see `DESIGN.md` for the rationale.

use board_common::config::BoardConfig;
use board_common::consts::ATR_CURRENT_SPLIT_A;

use crate::director::step_towards;
use crate::inputs::Samples;

/// Result of one ATR tick: the interpolated torque-tilt offset plus the
/// "static climb" flag turn tilt's ATR-interference logic also needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtrOutput {
    pub interp: f64,
    pub target: f64,
    pub static_climb: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Atr {
    accel_gap: f64,
    last_gap_sign: f64,
    accel_gap_aggregate: f64,
    target: f64,
    interp: f64,
}

impl Atr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn accel_gap_aggregate(&self) -> f64 {
        self.accel_gap_aggregate
    }

    /// `proportional` is the PID proportional term computed against the
    /// setpoint accumulated so far this tick (pre-ATR); `cutback` comes from
    /// the turn-tilt shaper's cutback detector.
    pub fn tick(
        &mut self,
        samples: &Samples,
        cfg: &BoardConfig,
        setpoint_so_far: f64,
        proportional: f64,
        braking: bool,
        cutback: bool,
    ) -> AtrOutput {
        let expected = expected_acceleration(samples.motor_current, cfg);
        // The original firmware clips the measured acceleration with
        // fmaxf(acc,-5) then immediately overwrites with fminf(acc,5); only
        // the upper clip is observable. Preserved literally: no lower bound
        // is applied here.
        let measured_acc = samples.acceleration.min(board_common::consts::ACCEL_CLIP);
        let acc_diff = expected - measured_acc;

        let (weight, hard_reset, static_climb) =
            select_weight(samples.abs_erpm, expected, self.accel_gap);
        if hard_reset {
            self.accel_gap = 0.0;
        } else {
            self.accel_gap = (1.0 - weight) * self.accel_gap + weight * acc_diff;
        }

        let new_sign = self.accel_gap.signum();
        if new_sign != 0.0 && self.last_gap_sign != 0.0 && new_sign != self.last_gap_sign {
            self.accel_gap_aggregate = 0.0;
        } else {
            self.accel_gap_aggregate += self.accel_gap;
        }
        self.last_gap_sign = new_sign;

        let mut new_ttt = cfg.torquetilt_strength * self.accel_gap;

        if cutback && samples.abs_erpm > 2000.0 {
            if new_ttt.signum() == samples.erpm.signum() {
                new_ttt *= 0.25;
            } else {
                new_ttt *= 1.5;
            }
        }

        if braking && samples.abs_erpm > 1000.0 && proportional.signum() != samples.erpm.signum()
        {
            let downhill_damper = (cfg.downhill_strength_pct / 100.0).max(1e-6);
            new_ttt +=
                (samples.pitch - setpoint_so_far) / cfg.ttt_brake_ratio() / downhill_damper;
        }

        self.target = (0.95 * self.target + 0.05 * new_ttt)
            .clamp(-cfg.torquetilt_angle_limit, cfg.torquetilt_angle_limit);

        let on = cfg.torquetilt_speed / cfg.hz;
        let step = torquetilt_step_size(
            self.interp,
            self.target,
            on,
            self.accel_gap,
            braking,
            static_climb,
            cutback,
            samples.erpm,
        );
        self.interp = step_towards(self.interp, self.target, step);

        AtrOutput {
            interp: self.interp,
            target: self.target,
            static_climb,
        }
    }
}

/// Expected acceleration from filtered motor current: linear below
/// `ATR_CURRENT_SPLIT_A`, piecewise (`accel_factor2 = accel_factor*1.3`)
/// above it, after subtracting the configured start-current offset.
fn expected_acceleration(current: f64, cfg: &BoardConfig) -> f64 {
    let above_threshold = current.abs() - cfg.torquetilt_start_current;
    if above_threshold <= 0.0 {
        return 0.0;
    }
    let signed = above_threshold * current.signum();
    if current.abs() < ATR_CURRENT_SPLIT_A {
        signed / cfg.accel_factor
    } else {
        signed / cfg.accel_factor2()
    }
}

/// EMA weight bucketed by `abs_erpm`/`expected`. Returns
/// `(weight, hard_reset, static_climb)`.
fn select_weight(abs_erpm: f64, expected: f64, prev_gap: f64) -> (f64, bool, bool) {
    if abs_erpm > 2000.0 {
        return (0.10, false, false);
    }
    if abs_erpm > 1000.0 {
        return (0.05, false, false);
    }
    if abs_erpm > 250.0 {
        return (0.02, false, false);
    }
    if expected.abs() < 1.0 {
        return (0.0, true, false);
    }
    if expected.abs() < 1.5 {
        let static_climb = prev_gap.abs() > 1.0;
        return (if static_climb { 0.10 } else { 0.01 }, false, static_climb);
    }
    let static_climb = prev_gap.abs() > 1.0;
    (if static_climb { 0.10 } else { 0.05 }, false, static_climb)
}

/// Step-size decision for the torque-tilt interpolant.
///
/// The original firmware's full case table covers more terrain-slope
/// combinations than are reproduced here; this implements the rule that
/// matters operationally — downward motion always uses `off` unless the
/// board is reversing course — with a conservative ordering of the
/// remaining cases. See `DESIGN.md` for the rationale.
fn torquetilt_step_size(
    interp: f64,
    target: f64,
    on: f64,
    accel_gap: f64,
    braking: bool,
    static_climb: bool,
    cutback: bool,
    erpm: f64,
) -> f64 {
    let delta = target - interp;
    if delta == 0.0 {
        return 0.0;
    }
    let going_up = delta > 0.0;
    let reversing_course = going_up != (erpm >= 0.0);

    if !going_up && !reversing_course {
        return 0.0;
    }
    if cutback {
        return on * 1.5;
    }
    if braking {
        return on / 3.0;
    }
    if static_climb {
        return on / 2.0;
    }
    if accel_gap.abs() < 0.5 {
        return on / 2.0;
    }
    on
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(erpm: f64, motor_current: f64, acceleration: f64) -> Samples {
        Samples {
            erpm,
            abs_erpm: erpm.abs(),
            motor_current,
            acceleration,
            ..Default::default()
        }
    }

    #[test]
    fn expected_acceleration_zero_below_start_current() {
        let cfg = BoardConfig::default();
        assert_eq!(expected_acceleration(1.0, &cfg), 0.0);
    }

    #[test]
    fn expected_acceleration_uses_split_factor() {
        let cfg = BoardConfig {
            torquetilt_start_current: 0.0,
            accel_factor: 50.0,
            ..BoardConfig::default()
        };
        let low = expected_acceleration(10.0, &cfg);
        assert!((low - 10.0 / 50.0).abs() < 1e-9);
        let high = expected_acceleration(30.0, &cfg);
        assert!((high - 30.0 / (50.0 * 1.3)).abs() < 1e-9);
    }

    #[test]
    fn converges_toward_uphill_gap() {
        let cfg = BoardConfig {
            torquetilt_strength: 0.15,
            accel_factor: 55.0,
            torquetilt_start_current: 0.0,
            torquetilt_angle_limit: 10.0,
            ..BoardConfig::default()
        };
        let mut atr = Atr::new();
        let s = samples(3000.0, 30.0, 0.0);
        let mut out = AtrOutput::default();
        for _ in 0..1000 {
            out = atr.tick(&s, &cfg, 0.0, 0.0, false, false);
        }
        assert!(out.interp > 0.0);
        assert!(out.interp <= cfg.torquetilt_angle_limit + 1e-9);
    }

    #[test]
    fn accel_gap_aggregate_resets_on_sign_change() {
        let cfg = BoardConfig::default();
        let mut atr = Atr::new();
        let uphill = samples(3000.0, 30.0, 0.0);
        for _ in 0..50 {
            atr.tick(&uphill, &cfg, 0.0, 0.0, false, false);
        }
        assert!(atr.accel_gap_aggregate() != 0.0);

        let downhill = samples(3000.0, -30.0, 0.0);
        // Drive the gap negative until the sign flips; on that exact tick
        // the aggregate must be zero.
        let mut saw_reset = false;
        for _ in 0..2000 {
            atr.tick(&downhill, &cfg, 0.0, 0.0, false, false);
            if atr.accel_gap_aggregate() == 0.0 {
                saw_reset = true;
                break;
            }
        }
        assert!(saw_reset);
    }
}
