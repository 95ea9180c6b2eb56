//! Setpoint director.
//!
//! Chooses a `SetpointMode` and a target pitch setpoint each tick, in strict
//! priority order, and tracks the interpolant that eases `setpoint_target`
//! toward that target at a per-mode step size. Follows the same
//! `TransitionResult`/priority-cascade idiom the ride state machine uses,
//! applied here to a setpoint instead of a discrete state.

use board_common::config::BoardConfig;
use board_common::consts::{REVERSE_STOP_ERPM_TO_DEGREES, START_GRACE_PERIOD_MS};
use board_common::state::{BeepToken, SetpointMode};

use crate::inputs::Samples;

/// Move `current` toward `target` by at most `step_size` per tick, snapping
/// when within one step: `|interp - target| <= step_size` always holds.
#[inline]
pub fn step_towards(current: f64, target: f64, step_size: f64) -> f64 {
    if step_size <= 0.0 {
        return target;
    }
    let delta = target - current;
    if delta.abs() <= step_size {
        target
    } else {
        current + step_size * delta.signum()
    }
}

/// What the director decided this tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectorOutput {
    pub mode: SetpointMode,
    pub setpoint_target_interp: f64,
    /// True on the tick REVERSESTOP hands back to TILTBACK_NONE. The PID
    /// integral resets on any transition out of RUNNING or on entering
    /// REVERSESTOP — the latter is handled by the caller.
    pub reset_integral: bool,
    pub beep: Option<BeepToken>,
}

/// Owns the setpoint director's persistent state across ticks.
#[derive(Debug, Clone)]
pub struct SetpointDirector {
    mode: SetpointMode,
    setpoint_target: f64,
    setpoint_target_interp: f64,
    reverse_total_erpm: f64,
    centering_grace_ms: f64,
    hv_hold_ms: f64,
}

impl Default for SetpointDirector {
    fn default() -> Self {
        Self {
            mode: SetpointMode::Centering,
            setpoint_target: 0.0,
            setpoint_target_interp: 0.0,
            reverse_total_erpm: 0.0,
            centering_grace_ms: 0.0,
            hv_hold_ms: 0.0,
        }
    }
}

impl SetpointDirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the entry state used on every transition into RUNNING.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn mode(&self) -> SetpointMode {
        self.mode
    }

    pub fn setpoint_target_interp(&self) -> f64 {
        self.setpoint_target_interp
    }

    /// Accumulated reverse eRPM while `mode == ReverseStop`; meaningless
    /// otherwise. Exposed so [`crate::faults::detect`]'s REVERSESTOP
    /// escalation can read it without the director owning the fault timers
    /// too.
    pub fn reverse_total_erpm(&self) -> f64 {
        self.reverse_total_erpm
    }

    /// Advance the director by one tick. `soft_start_enabled` gates whether
    /// CENTERING's grace period is observed or skipped.
    pub fn tick(
        &mut self,
        samples: &Samples,
        cfg: &BoardConfig,
        soft_start_enabled: bool,
        dt_ms: f64,
    ) -> DirectorOutput {
        let mut out = DirectorOutput {
            mode: self.mode,
            setpoint_target_interp: 0.0,
            reset_integral: false,
            beep: None,
        };

        match self.mode {
            SetpointMode::Centering => self.tick_centering(soft_start_enabled, dt_ms),
            SetpointMode::ReverseStop => {
                self.tick_reverse_stop(samples, cfg, &mut out);
            }
            _ => self.tick_tiltback_cascade(samples, cfg, dt_ms, &mut out),
        }

        let step = self.step_size(cfg);
        self.setpoint_target_interp =
            step_towards(self.setpoint_target_interp, self.setpoint_target, step);

        out.mode = self.mode;
        out.setpoint_target_interp = self.setpoint_target_interp;
        out
    }

    fn tick_centering(&mut self, soft_start_enabled: bool, dt_ms: f64) {
        let reached = (self.setpoint_target_interp - self.setpoint_target).abs() < 1e-9;
        if !reached {
            self.centering_grace_ms = 0.0;
            return;
        }
        if !soft_start_enabled {
            self.mode = SetpointMode::TiltbackNone;
            self.centering_grace_ms = 0.0;
            return;
        }
        self.centering_grace_ms += dt_ms;
        if self.centering_grace_ms > START_GRACE_PERIOD_MS as f64 {
            self.mode = SetpointMode::TiltbackNone;
            self.centering_grace_ms = 0.0;
        }
    }

    fn tick_reverse_stop(
        &mut self,
        samples: &Samples,
        cfg: &BoardConfig,
        out: &mut DirectorOutput,
    ) {
        self.reverse_total_erpm += samples.erpm;
        let sum = self.reverse_total_erpm;
        if sum.abs() > cfg.reverse_tolerance {
            let magnitude = 10.0 * (sum.abs() - cfg.reverse_tolerance)
                / REVERSE_STOP_ERPM_TO_DEGREES;
            self.setpoint_target = magnitude;
        }
        if sum.abs() <= cfg.reverse_tolerance / 2.0 && samples.erpm >= 0.0 {
            self.mode = SetpointMode::TiltbackNone;
            self.setpoint_target = 0.0;
            self.reverse_total_erpm = 0.0;
            out.reset_integral = true;
        }
    }

    fn tick_tiltback_cascade(
        &mut self,
        samples: &Samples,
        cfg: &BoardConfig,
        dt_ms: f64,
        out: &mut DirectorOutput,
    ) {
        let direction = if samples.erpm >= 0.0 { 1.0 } else { -1.0 };

        if samples.duty.abs() > cfg.tiltback_duty {
            self.mode = SetpointMode::TiltbackDuty;
            self.setpoint_target = cfg.tiltback_duty_angle * direction;
            self.hv_hold_ms = 0.0;
            return;
        }

        if samples.input_voltage > cfg.tiltback_hv {
            self.hv_hold_ms += dt_ms;
            let over_by_1v = samples.input_voltage > cfg.tiltback_hv + 1.0;
            if over_by_1v || self.hv_hold_ms > 500.0 {
                self.mode = SetpointMode::TiltbackHv;
                self.setpoint_target = cfg.tiltback_hv_angle * direction;
                out.beep = Some(BeepToken::Alert {
                    count: 3,
                    long: false,
                });
            }
            return;
        }
        self.hv_hold_ms = 0.0;

        if samples.input_voltage < cfg.tiltback_lv {
            self.mode = SetpointMode::TiltbackLv;
            self.setpoint_target = cfg.tiltback_lv_angle * direction;
            out.beep = Some(BeepToken::Alert {
                count: 3,
                long: false,
            });
            return;
        }

        if fet_temp_tiltback_active(samples) {
            self.mode = SetpointMode::TiltbackLv;
            self.setpoint_target = cfg.tiltback_lv_angle * direction;
            out.beep = Some(BeepToken::Alert {
                count: 3,
                long: true,
            });
            return;
        }

        self.mode = SetpointMode::TiltbackNone;
        self.setpoint_target = 0.0;
        if cfg.startup_mode().reverse_stop && samples.erpm < 0.0 {
            self.mode = SetpointMode::ReverseStop;
            self.reverse_total_erpm = 0.0;
        }
    }

    fn step_size(&self, cfg: &BoardConfig) -> f64 {
        let speed = match self.mode {
            SetpointMode::Centering => cfg.centering_speed,
            SetpointMode::ReverseStop => cfg.reversestop_speed,
            SetpointMode::TiltbackNone => cfg.tiltback_return_speed,
            SetpointMode::TiltbackDuty => cfg.tiltback_duty_speed,
            SetpointMode::TiltbackHv => cfg.tiltback_hv_speed,
            SetpointMode::TiltbackLv => cfg.tiltback_lv_speed,
        };
        speed / cfg.hz
    }
}

/// FET-temperature tiltback predicate: trips `1 °C` above
/// `fet_temp_start - 2`.
fn fet_temp_tiltback_active(samples: &Samples) -> bool {
    samples.fet_temp > samples.fet_temp_start - 2.0 + 1.0
}
