//! Nose-angling bias (first shaper, before ATR and turn tilt).
//!
//! A small pitch offset proportional to speed, so the board noses down
//! slightly as it accelerates. Grounded in the same interpolant idiom as
//! [`crate::director`]: a target is recomputed every tick, then eased
//! toward at a fixed step size.

use board_common::config::BoardConfig;

use crate::director::step_towards;
use crate::inputs::Samples;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoseAngling {
    target: f64,
    interp: f64,
}

impl NoseAngling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn interp(&self) -> f64 {
        self.interp
    }

    pub fn tick(&mut self, samples: &Samples, cfg: &BoardConfig) -> f64 {
        let variable = if samples.erpm.abs() > cfg.tiltback_variable_max_erpm {
            cfg.tiltback_variable_max * samples.erpm.signum()
        } else {
            cfg.tiltback_variable * samples.erpm
        };
        let constant = if samples.erpm.abs() > cfg.tiltback_constant_erpm {
            cfg.tiltback_constant * samples.erpm.signum()
        } else {
            0.0
        };
        let mut target = variable + constant;

        // Zeroed when riding forward into a heavy down-tilt target (or vice
        // versa) — the bias would otherwise fight the rider's own lean.
        let half_max = cfg.tiltback_variable_max / 2.0;
        if (samples.erpm > 0.0 && target < -half_max) || (samples.erpm < 0.0 && target > half_max)
        {
            target = 0.0;
        }

        self.target = target;
        let step = cfg.noseangling_speed / cfg.hz;
        self.interp = step_towards(self.interp, self.target, step);
        self.interp
    }
}
