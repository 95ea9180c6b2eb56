//! PID core.
//!
//! Proportional/integral/derivative control with anti-windup via a
//! torque-tilt-aware integrator, a PT1-filtered derivative, adaptive gain
//! scheduling driven by how hard ATR is biasing the setpoint, a P+D brake
//! clamp, output smoothing, and the final safety clamp that leaves 3 A of
//! headroom inside the motor's configured current limits. Built on the same
//! backward-Euler-plus-anti-windup shape used elsewhere in this crate's
//! control math, extended here with the adaptive-gain and brake-clamp
//! stages balance control needs.

use board_common::config::BoardConfig;
use board_common::consts::{CLICK_TICKS, CURRENT_CLAMP_HEADROOM_A, START_CENTER_DELAY_MS};
use board_common::ports::MotorConfiguration;
use board_common::state::SetpointMode;

use crate::filters::{pt1_apply, Pt1State};
use crate::inputs::Samples;

/// One tick's PID result.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidOutput {
    /// The clamped current command, amps — always within
    /// `[current_min+3, current_max-3]`.
    pub current: f64,
    /// True if the final clamp actually reduced the magnitude this tick —
    /// the output actuator beeps and reports `current_limiting` when set.
    pub current_limiting: bool,
}

#[derive(Debug, Clone)]
pub struct PidCore {
    integral: f64,
    last_pitch: f64,
    d_pt1: Pt1State,
    pid_value: f64,
    kp: f64,
    ki: f64,
    kd: f64,
    ms_since_running: f64,
    click_remaining: u32,
    initialized: bool,
}

impl Default for PidCore {
    fn default() -> Self {
        Self {
            integral: 0.0,
            last_pitch: 0.0,
            d_pt1: Pt1State::default(),
            pid_value: 0.0,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            ms_since_running: 0.0,
            click_remaining: CLICK_TICKS,
            initialized: false,
        }
    }
}

impl PidCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `reset_vars()` — called on every transition into RUNNING.
    pub fn reset(&mut self, cfg: &BoardConfig) {
        *self = Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            ..Self::default()
        };
    }

    /// Narrower than [`Self::reset`]: only the integrator, raised on
    /// REVERSESTOP's own exit back to `TiltbackNone`.
    pub fn reset_integral(&mut self) {
        self.integral = 0.0;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        samples: &Samples,
        cfg: &BoardConfig,
        setpoint: f64,
        mode: SetpointMode,
        phase_is_centering: bool,
        soft_start_enabled: bool,
        stealth_start: bool,
        torquetilt_interp: f64,
        motor_cfg: MotorConfiguration,
        dt_ms: f64,
    ) -> PidOutput {
        if !self.initialized {
            self.last_pitch = samples.pitch;
            self.initialized = true;
        }

        let proportional = setpoint - samples.pitch;
        let braking =
            samples.motor_current != 0.0 && samples.motor_current.signum() != samples.erpm.signum();

        let tt_impact = if torquetilt_interp < 0.0 {
            cfg.integral_tt_impact_downhill()
        } else {
            let mut impact = cfg.integral_tt_impact_uphill();
            if samples.abs_erpm < 2500.0 {
                impact *= (samples.abs_erpm / 2500.0).max(0.3);
            }
            impact
        };
        self.integral += proportional - torquetilt_interp * tt_impact;

        let derivative_raw = self.last_pitch - samples.pitch;
        self.last_pitch = samples.pitch;
        let derivative = pt1_apply(&mut self.d_pt1, cfg.kd_filter_hz, derivative_raw, dt_ms / 1000.0);

        self.update_gains(cfg, mode, phase_is_centering, torquetilt_interp, proportional);

        if !phase_is_centering {
            self.ms_since_running += dt_ms;
        }

        if phase_is_centering && soft_start_enabled {
            self.integral = 0.0;
            let pd_raw = self.kp * proportional + self.kd * derivative;
            self.pid_value = 0.05 * pd_raw + 0.95 * self.pid_value;
        } else {
            let pid_prop = self.normal_pid_prop(cfg, proportional, braking);
            let d_term = (self.kd * derivative).clamp(-cfg.max_derivative(), cfg.max_derivative());
            let pd = self.brake_clamp(pid_prop + d_term, pid_prop, cfg, samples, torquetilt_interp);
            let integral_term = self.ki * self.integral;
            self.pid_value = 0.2 * (pd + integral_term) + 0.8 * self.pid_value;
        }

        let with_click = self.apply_startup_click(self.pid_value, cfg, stealth_start);

        let lower = motor_cfg.current_min + CURRENT_CLAMP_HEADROOM_A;
        let upper = motor_cfg.current_max - CURRENT_CLAMP_HEADROOM_A;
        let clamped = with_click.clamp(lower, upper);
        let current_limiting = (clamped - with_click).abs() > 1e-9;

        PidOutput {
            current: clamped,
            current_limiting,
        }
    }

    fn update_gains(
        &mut self,
        cfg: &BoardConfig,
        mode: SetpointMode,
        phase_is_centering: bool,
        torquetilt_interp: f64,
        proportional: f64,
    ) {
        if mode == SetpointMode::ReverseStop {
            self.kp = 2.0;
            self.kd = 400.0;
            self.ki = 0.0;
            self.integral = 0.0;
            return;
        }

        let (kp_target, ki_target, kd_target) = if torquetilt_interp.abs() > 2.0 {
            let mut p_mult = torquetilt_interp.abs() / 6.0 * cfg.tt_pid_intensity;
            let di_mult = (1.0 + p_mult / 2.0).min(1.7);
            p_mult = (1.0 + p_mult).min(2.0);
            let kd_t = if proportional.abs() > cfg.center_boost_angle + 0.5 {
                cfg.kd * (di_mult / 1.7)
            } else {
                cfg.kd
            };
            (cfg.kp * p_mult, cfg.ki * di_mult, kd_t)
        } else {
            (cfg.kp, cfg.ki, cfg.kd)
        };

        if phase_is_centering {
            self.kp = ease(self.kp, kp_target, 0.005, 0.005);
            self.ki = ease(self.ki, ki_target, 0.005, 0.005);
            self.kd = ease(self.kd, kd_target, 0.005, 0.005);
        } else {
            self.kp = ease(self.kp, kp_target, 0.02, 0.002);
            self.ki = ease(self.ki, ki_target, 0.02, 0.002);
            self.kd = ease(self.kd, kd_target, 0.02, 0.02);
        }
    }

    fn normal_pid_prop(&mut self, cfg: &BoardConfig, proportional: f64, braking: bool) -> f64 {
        let ramp = if self.ms_since_running < START_CENTER_DELAY_MS as f64 {
            self.ms_since_running / START_CENTER_DELAY_MS as f64
        } else {
            1.0
        };

        let center_boost = cfg.center_boost_kp_adder
            * proportional.abs().min(cfg.center_boost_angle)
            * proportional.signum()
            * ramp;

        let center_jerk = if self.ms_since_running < cfg.center_jerk_duration_ms {
            let phase = self.ms_since_running / cfg.center_jerk_duration_ms.max(1.0) * std::f64::consts::TAU;
            cfg.center_jerk_strength * phase.sin()
        } else {
            0.0
        };

        let mut pid_prop = self.kp * proportional + center_boost + center_jerk;

        if self.ms_since_running >= START_CENTER_DELAY_MS as f64 {
            let over = proportional.abs() - cfg.accel_boost_threshold;
            if over > 0.0 && !braking {
                let mut boost = cfg.accel_boost_intensity * self.kp * over;
                if proportional.abs() > cfg.accel_boost_threshold2 {
                    boost *= 2.0;
                }
                pid_prop += boost * proportional.signum();
            }
        }

        pid_prop
    }

    /// Clamp `pid_prop + d_term` (the "P+D" sum) when it opposes the
    /// direction of travel.
    fn brake_clamp(
        &self,
        pd: f64,
        pid_prop: f64,
        cfg: &BoardConfig,
        samples: &Samples,
        torquetilt_interp: f64,
    ) -> f64 {
        if samples.erpm == 0.0 || pd.signum() == samples.erpm.signum() {
            return pd;
        }
        let mut pid_max = cfg.max_brake_amps().max(pid_prop.abs());
        if torquetilt_interp.abs() > 2.0 {
            pid_max *= 0.75 + torquetilt_interp.abs() / 8.0;
        }
        if samples.abs_erpm > 2000.0 {
            pid_max *= 0.8 + samples.abs_erpm / 10_000.0;
        }
        pd.clamp(-pid_max, pid_max)
    }

    /// Startup "engage click" — a small tactile current kick applied over
    /// the first `CLICK_TICKS` ticks after `reset()`, unless stealth-start
    /// is configured. `click_current` is derived from `brake_current`'s
    /// truncated fractional part.
    fn apply_startup_click(&mut self, value: f64, cfg: &BoardConfig, stealth_start: bool) -> f64 {
        if stealth_start || self.click_remaining == 0 {
            return value;
        }
        let click_current = (cfg.brake_current.fract() * 100.0).trunc();
        let sign = if self.click_remaining % 2 == 0 { 1.0 } else { -1.0 };
        self.click_remaining -= 1;
        value + click_current * sign
    }
}

fn ease(current: f64, target: f64, up_rate: f64, down_rate: f64) -> f64 {
    if target > current {
        (current + up_rate).min(target)
    } else {
        (current - down_rate).max(target)
    }
}
