//! Shared types for the balance-board control core.
//!
//! Mirrors the split the control loop itself uses: this crate holds the
//! wire-stable enums, the configuration schema, and the host-capability
//! traits (motor, IMU, pads, buzzer, lights, persistence). The control loop
//! logic — state machines, filters, PID, setpoint shaping — lives in
//! `board_control`.

pub mod config;
pub mod consts;
pub mod ports;
pub mod prelude;
pub mod state;
