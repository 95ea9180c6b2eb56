//! Hard-realtime self-balancing motor controller core.
//!
//! A fixed-rate control loop reads an IMU and motor/battery telemetry,
//! computes a target motor current that keeps the board's pitch at a
//! commanded setpoint, and writes that current to an underlying motor
//! controller. The loop also runs a supervisory state machine that decides
//! when riding is permitted, applies safety tilt-backs, and enforces a
//! lockout gesture.
//!
//! ## Module map
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`filters`] | fixed-point-style biquad/PT1 filters |
//! | [`inputs`] | IMU/motor/pad sampling |
//! | [`faults`] | per-fault debounce timers |
//! | [`director`] | setpoint director |
//! | [`shapers`] | centering, nose-angle, ATR, turn tilt |
//! | [`pid`] | PID core |
//! | [`supervisor`] | ride/fault state machine |
//! | [`lock`] | lock gesture recognizer |
//! | [`output`] | current clamping / safety actuator |
//! | [`config`] | TOML loader, step-size derivation |
//! | [`cycle`] | RT setup + cycle runner |

pub mod config;
pub mod cycle;
pub mod director;
pub mod faults;
pub mod filters;
pub mod inputs;
pub mod lock;
pub mod output;
pub mod pid;
pub mod shapers;
pub mod supervisor;
