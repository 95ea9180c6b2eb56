//! System-wide constants.

use static_assertions::const_assert;

/// Size of the acceleration history ring buffer used by the ATR shaper.
pub const ACCEL_HIST_SIZE: usize = 40;

/// Grace period after centering completes before switching to `TiltbackNone`,
/// in milliseconds.
pub const START_GRACE_PERIOD_MS: u32 = 100;

/// Window, in milliseconds, over which the center-boost term ramps from 0 to
/// full strength after entering `RUNNING`.
pub const START_CENTER_DELAY_MS: u32 = 1000;

/// Headroom, in amps, left inside `current_min`/`current_max` after clamping
/// the PID output.
pub const CURRENT_CLAMP_HEADROOM_A: f64 = 3.0;

/// Number of ticks over which the startup "engage click" current offset is
/// applied.
pub const CLICK_TICKS: u32 = 2;

/// Cap applied to any single extreme acceleration sample, amps/s^2-equivalent
/// units as used by the ATR shaper.
pub const ACCEL_CLIP: f64 = 5.0;

/// Reverse-stop fault magic value: `nrf_conf.channel` equal to this permits
/// persisting the lock flag through the host callback.
pub const LOCK_PERSIST_MAGIC_CHANNEL: u8 = 99;

/// Pad ADC reference voltage used to scale the 12-bit raw reading.
pub const V_REG: f64 = 3.3;

/// `accel_factor` vs. `accel_factor2` (×1.3) split point, amps.
pub const ATR_CURRENT_SPLIT_A: f64 = 25.0;

/// Divisor turning excess reverse eRPM into a setpoint angle, °/eRPM.
pub const REVERSE_STOP_ERPM_TO_DEGREES: f64 = 50_000.0;

/// Debounce between lock-gesture pad transitions, milliseconds.
pub const LOCK_GESTURE_DEBOUNCE_MS: u32 = 50;

/// Number of steps (0..=8) in the lock gesture sequence.
pub const LOCK_GESTURE_STEPS: i8 = 8;

/// Current-off-delay and motor-watchdog timeout, expressed in multiples of
/// `loop_period`.
pub const CURRENT_OFF_DELAY_LOOPS: f64 = 20.0;

/// Brake-timeout grace period, seconds, re-armed every tick the board is
/// still moving. No configuration field carries this value in the original
/// firmware's layout, so it is modeled as this fixed constant; see
/// `DESIGN.md` for the rationale.
pub const BRAKE_TIMEOUT_S: f64 = 3.0;

/// Interval between repeated inactivity triple-beeps while a fault persists
/// past `inactivity_timeout`.
pub const INACTIVITY_BEEP_PERIOD_S: f64 = 10.0;

const_assert!(CLICK_TICKS < START_CENTER_DELAY_MS);
const_assert!(LOCK_GESTURE_STEPS >= 0);
const_assert!(ACCEL_HIST_SIZE > 0);

