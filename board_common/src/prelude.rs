//! Convenience re-exports for crates consuming `board_common`.

pub use crate::config::{BoardConfig, StartupMode};
pub use crate::consts::*;
pub use crate::ports::{Buzzer, Imu, Lights, MotorConfiguration, MotorController, PadAdc, PersistenceSink, TerminalPort};
pub use crate::state::{BeepToken, DebugField, FaultKind, LightCmd, Phase, SetpointMode, SwitchState};
