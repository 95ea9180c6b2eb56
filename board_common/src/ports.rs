//! Host-capability traits.
//!
//! The control loop never talks to hardware directly. Every external
//! collaborator — motor controller, IMU, pad ADC, buzzer, lights,
//! persistence, terminal — is a thin trait here; this crate is the only
//! place their contracts are written down. Concrete drivers implement these
//! against real hardware or a bench simulator; neither lives in this crate.

use crate::state::{BeepToken, DebugField, LightCmd};

/// Motor controller configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorConfiguration {
    /// Minimum (most negative, braking) motor current \[A\].
    pub current_min: f64,
    /// Maximum motor current \[A\].
    pub current_max: f64,
    /// True if the motor controller reports direction-inverted telemetry.
    pub invert_direction: bool,
    /// True if the motor configuration is still at factory defaults —
    /// the supervisor refuses to leave `Startup` while this holds.
    pub is_default_motor_config: bool,
    /// FET temperature at which thermal tiltback begins to ramp in, °C.
    pub fet_temp_start: f64,
    /// Commutation switching frequency, Hz.
    pub switching_frequency_hz: f64,
    /// Auxiliary output mode, passed through opaquely.
    pub aux_output_mode: u8,
}

/// Motor/telemetry capability set.
pub trait MotorController {
    /// Signed electrical RPM.
    fn rpm(&self) -> f64;
    /// Instantaneous duty cycle, signed, `[-1.0, 1.0]`.
    fn duty_now(&self) -> f64;
    /// Direction-filtered total motor current \[A\], signed.
    fn total_current_directional_filtered(&self) -> f64;
    /// Smoothed electrical RPM (as used by the acceleration estimator).
    fn smooth_erpm(&self) -> f64;
    /// Filtered FET temperature, °C.
    fn temp_fet_filtered(&self) -> f64;
    /// Battery voltage, V.
    fn input_voltage(&self) -> f64;
    /// Static configuration snapshot.
    fn configuration(&self) -> MotorConfiguration;

    /// Request a motor current \[A\], with a watchdog timeout \[s\].
    fn set_current(&mut self, amps: f64, timeout_s: f64);
    /// Request a brake current \[A\].
    fn set_brake_current(&mut self, amps: f64);
    /// Configure the motor-side watchdog's "current off" delay \[s\].
    fn set_current_off_delay(&mut self, delay_s: f64);
    /// Change the commutation switching frequency.
    fn change_sw(&mut self, freq_hz: f64);
}

/// IMU capability set.
pub trait Imu {
    /// Pitch, radians.
    fn pitch(&self) -> f64;
    /// Roll, radians.
    fn roll(&self) -> f64;
    /// Yaw, radians.
    fn yaw(&self) -> f64;
    /// Fills `out` with `[gx, gy, gz]`, deg/s.
    fn gyro(&self, out: &mut [f64; 3]);
    /// True once the IMU's own startup/calibration sequence has completed.
    fn startup_done(&self) -> bool;
}

/// Pad ADC front-end.
///
/// Two configurable voltage thresholds, `fault_adc1`/`fault_adc2`; a
/// threshold of zero disables that pad.
pub trait PadAdc {
    /// Raw 12-bit reading on pad 1, scaled to volts by `V_REG`.
    fn pad1_voltage(&self) -> f64;
    /// Raw 12-bit reading on pad 2, scaled to volts by `V_REG`.
    fn pad2_voltage(&self) -> f64;
}

/// Audible feedback sink.
pub trait Buzzer {
    fn beep(&mut self, token: BeepToken);
}

/// Visual feedback sink.
pub trait Lights {
    fn light(&mut self, cmd: LightCmd);
}

/// Flash-persisted configuration sink.
///
/// `commands_balance_lock` persists only when the host's configured NRF
/// channel equals [`crate::consts::LOCK_PERSIST_MAGIC_CHANNEL`] — the core
/// itself only ever calls this port, never touches flash.
pub trait PersistenceSink {
    fn commands_balance_lock(&mut self, locked: bool);
}

/// Host terminal/CLI surface.
///
/// Models the three `app_balance_*` terminal commands as typed calls so the
/// core can expose debug streaming without knowing about any concrete
/// terminal implementation.
pub trait TerminalPort {
    /// `app_balance_render <field> [graph]`.
    fn render(&mut self, field: DebugField, graph: Option<u8>, value: f64);
    /// `app_balance_sample <field> <count>` — one sample of a capped run.
    fn sample(&mut self, field: DebugField, value: f64);
    /// `app_balance_experiment <field> <graph>`.
    fn experiment(&mut self, field: DebugField, graph: u8, value: f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubMotor;
    impl MotorController for StubMotor {
        fn rpm(&self) -> f64 {
            0.0
        }
        fn duty_now(&self) -> f64 {
            0.0
        }
        fn total_current_directional_filtered(&self) -> f64 {
            0.0
        }
        fn smooth_erpm(&self) -> f64 {
            0.0
        }
        fn temp_fet_filtered(&self) -> f64 {
            25.0
        }
        fn input_voltage(&self) -> f64 {
            60.0
        }
        fn configuration(&self) -> MotorConfiguration {
            MotorConfiguration {
                current_min: -60.0,
                current_max: 60.0,
                invert_direction: false,
                is_default_motor_config: false,
                fet_temp_start: 80.0,
                switching_frequency_hz: 30000.0,
                aux_output_mode: 0,
            }
        }
        fn set_current(&mut self, _amps: f64, _timeout_s: f64) {}
        fn set_brake_current(&mut self, _amps: f64) {}
        fn set_current_off_delay(&mut self, _delay_s: f64) {}
        fn change_sw(&mut self, _freq_hz: f64) {}
    }

    #[test]
    fn motor_controller_trait_is_object_safe() {
        let m: Box<dyn MotorController> = Box::new(StubMotor);
        assert_eq!(m.rpm(), 0.0);
        assert!(!m.configuration().is_default_motor_config);
    }
}
