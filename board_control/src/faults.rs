//! Fault detector.
//!
//! Each named fault is a hold-off timer plus a predicate: the timer resets
//! to zero the instant the predicate goes false, and the fault only fires
//! once the predicate has held continuously past its configured delay. The
//! same debounce idiom as the rest of this crate's fault-timer fields,
//! generalized to the six fault predicates below, evaluated in priority
//! order.

use board_common::config::BoardConfig;
use board_common::state::{FaultKind, SetpointMode, SwitchState};

use crate::inputs::Samples;

/// Hold-off timers for every fault predicate, in elapsed milliseconds.
/// Owned by the supervisor and threaded through `detect()` every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultTimers {
    switch_full_ms: f64,
    switch_half_ms: f64,
    pitch_ms: f64,
    roll_ms: f64,
    duty_ms: f64,
    reverse10_ms: f64,
    reverse5_ms: f64,
}

impl FaultTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Evaluate all fault predicates for one tick and return the
/// highest-priority fault that fired, if any.
///
/// `reverse_total_erpm` is only meaningful while `setpoint_mode ==
/// ReverseStop`; callers in other modes may pass `0.0`.
pub fn detect(
    timers: &mut FaultTimers,
    samples: &Samples,
    setpoint_mode: SetpointMode,
    reverse_total_erpm: f64,
    cfg: &BoardConfig,
    dt_ms: f64,
) -> Option<FaultKind> {
    if switch_full(timers, samples, cfg, dt_ms) {
        return Some(FaultKind::SwitchFull);
    }

    if setpoint_mode == SetpointMode::ReverseStop {
        if let Some(kind) = reverse_stop(timers, samples, reverse_total_erpm, cfg, dt_ms) {
            return Some(kind);
        }
    }

    if switch_half(timers, samples, cfg, dt_ms) {
        return Some(FaultKind::SwitchHalf);
    }
    if angle_pitch(timers, samples, cfg, dt_ms) {
        return Some(FaultKind::AnglePitch);
    }
    if angle_roll(timers, samples, cfg, dt_ms) {
        return Some(FaultKind::AngleRoll);
    }
    if duty(timers, samples, cfg, dt_ms) {
        return Some(FaultKind::Duty);
    }
    None
}

/// SWITCH_FULL: pads fully released. Also fires early on a "quick stop"
/// (slow + heavily pitched) and on a slower debounce once speed has
/// dropped below `4*half_erpm`. Suppressed at high speed when the
/// configuration forbids high-speed full-switch faults.
fn switch_full(timers: &mut FaultTimers, samples: &Samples, cfg: &BoardConfig, dt_ms: f64) -> bool {
    let off = samples.switch_state == SwitchState::Off;
    if off {
        timers.switch_full_ms += dt_ms;
    } else {
        timers.switch_full_ms = 0.0;
        return false;
    }

    if samples.abs_erpm > 3000.0 && cfg.forbid_high_speed_full_switch_fault() {
        timers.switch_full_ms = 0.0;
        return false;
    }

    if samples.abs_erpm < cfg.half_erpm && samples.pitch.abs() > 15.0 {
        return true;
    }
    if timers.switch_full_ms > cfg.fault_delay_switch_full_ms as f64 {
        return true;
    }
    if samples.abs_erpm < 4.0 * cfg.half_erpm
        && timers.switch_full_ms > cfg.fault_delay_switch_half_ms as f64
    {
        return true;
    }
    false
}

/// REVERSESTOP's own escalation to a hard fault. Only evaluated while
/// `setpoint_mode == ReverseStop`.
fn reverse_stop(
    timers: &mut FaultTimers,
    samples: &Samples,
    reverse_total_erpm: f64,
    cfg: &BoardConfig,
    dt_ms: f64,
) -> Option<FaultKind> {
    if samples.switch_state == SwitchState::Off {
        return Some(FaultKind::SwitchFull);
    }
    if samples.pitch.abs() > 15.0 {
        return Some(FaultKind::Reverse);
    }

    if samples.pitch.abs() > 10.0 {
        timers.reverse10_ms += dt_ms;
        if timers.reverse10_ms > 500.0 {
            return Some(FaultKind::Reverse);
        }
    } else {
        timers.reverse10_ms = 0.0;
    }

    if samples.pitch.abs() > 5.0 {
        timers.reverse5_ms += dt_ms;
        if timers.reverse5_ms > 1000.0 {
            return Some(FaultKind::Reverse);
        }
    } else {
        timers.reverse5_ms = 0.0;
        timers.reverse10_ms = 0.0;
    }

    if reverse_total_erpm.abs() > 3.0 * cfg.reverse_tolerance {
        return Some(FaultKind::Reverse);
    }
    None
}

/// SWITCH_HALF: pads not fully engaged while slow.
fn switch_half(timers: &mut FaultTimers, samples: &Samples, cfg: &BoardConfig, dt_ms: f64) -> bool {
    let predicate = (samples.switch_state == SwitchState::Half
        || samples.switch_state == SwitchState::Off)
        && samples.abs_erpm < cfg.half_erpm;
    if predicate {
        timers.switch_half_ms += dt_ms;
    } else {
        timers.switch_half_ms = 0.0;
    }
    predicate && timers.switch_half_ms > cfg.fault_delay_switch_half_ms as f64
}

/// ANGLE_PITCH: pitch out of bounds past its debounce.
fn angle_pitch(timers: &mut FaultTimers, samples: &Samples, cfg: &BoardConfig, dt_ms: f64) -> bool {
    let predicate = samples.pitch.abs() > cfg.fault_pitch;
    if predicate {
        timers.pitch_ms += dt_ms;
    } else {
        timers.pitch_ms = 0.0;
    }
    predicate && timers.pitch_ms > cfg.fault_delay_pitch_ms as f64
}

/// ANGLE_ROLL: roll out of bounds past its debounce.
fn angle_roll(timers: &mut FaultTimers, samples: &Samples, cfg: &BoardConfig, dt_ms: f64) -> bool {
    let predicate = samples.roll.abs() > cfg.fault_roll;
    if predicate {
        timers.roll_ms += dt_ms;
    } else {
        timers.roll_ms = 0.0;
    }
    predicate && timers.roll_ms > cfg.fault_delay_roll_ms as f64
}

/// DUTY: duty cycle saturated past its debounce. Stickiness (cleared only
/// by another fault firing) is a supervisor-level concern, not part of the
/// per-tick predicate evaluated here.
fn duty(timers: &mut FaultTimers, samples: &Samples, cfg: &BoardConfig, dt_ms: f64) -> bool {
    let predicate = samples.duty.abs() > cfg.fault_duty;
    if predicate {
        timers.duty_ms += dt_ms;
    } else {
        timers.duty_ms = 0.0;
    }
    predicate && timers.duty_ms > cfg.fault_delay_duty_ms as f64
}
