//! Output / safety actuator.
//!
//! The only component that ever writes to [`MotorController`]. Normal drive
//! feeds the motor's own watchdog with a `current_off_delay` of
//! `20·loop_period` so a single missed tick doesn't trip the controller's
//! timeout; fault drive issues `brake()`, which is suppressed once the board
//! has been stationary past a timeout so a parked board doesn't hold brake
//! current indefinitely. This is a two-mode (drive / brake) actuator —
//! there's no deceleration ramp to model, only the immediate PID-clamped
//! current or the fixed brake current, so it drives the motor differently
//! once a stop condition holds rather than ramping toward one.

use board_common::config::BoardConfig;
use board_common::consts::{BRAKE_TIMEOUT_S, CURRENT_OFF_DELAY_LOOPS};
use board_common::ports::{Buzzer, Lights, MotorController};
use board_common::state::{BeepToken, LightCmd};

use crate::inputs::Samples;
use crate::pid::PidOutput;

/// What the actuator did this tick, for the caller's telemetry/beep sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriveOutput {
    pub beep: Option<BeepToken>,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputActuator {
    /// Seconds remaining before brake current is suppressed; re-armed to
    /// `BRAKE_TIMEOUT_S` every tick the board is still moving.
    brake_timeout_remaining_s: f64,
}

impl Default for OutputActuator {
    fn default() -> Self {
        Self {
            brake_timeout_remaining_s: BRAKE_TIMEOUT_S,
        }
    }
}

impl OutputActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Normal (non-fault) drive: write the PID-clamped current, feeding the
    /// motor-side watchdog.
    pub fn drive(&self, motor: &mut dyn MotorController, cfg: &BoardConfig, pid: PidOutput) -> DriveOutput {
        let off_delay_s = CURRENT_OFF_DELAY_LOOPS / cfg.hz;
        motor.set_current_off_delay(off_delay_s);
        motor.set_current(pid.current, off_delay_s);

        DriveOutput {
            beep: pid.current_limiting.then_some(BeepToken::Alert {
                count: 1,
                long: false,
            }),
        }
    }

    /// Fault-state drive: `set_brake_current`, suppressed once the brake
    /// timeout has elapsed while stationary. The only way current ever
    /// reaches the motor in a fault phase.
    pub fn brake(&mut self, motor: &mut dyn MotorController, cfg: &BoardConfig, samples: &Samples, dt_ms: f64) {
        if samples.abs_erpm > 1.0 {
            self.brake_timeout_remaining_s = BRAKE_TIMEOUT_S;
        } else if self.brake_timeout_remaining_s > 0.0 {
            self.brake_timeout_remaining_s -= dt_ms / 1000.0;
        }

        if samples.abs_erpm > 1.0 || self.brake_timeout_remaining_s > 0.0 {
            motor.set_brake_current(cfg.brake_current);
        }
    }

    /// Cancellation sequence: `brake_off`, `beep_off(force)`, `brake()`.
    pub fn shutdown(
        &self,
        motor: &mut dyn MotorController,
        lights: &mut dyn Lights,
        buzzer: &mut dyn Buzzer,
        cfg: &BoardConfig,
    ) {
        lights.light(LightCmd::BrakeOff);
        buzzer.beep(BeepToken::Off { force: true });
        motor.set_brake_current(cfg.brake_current);
    }
}
