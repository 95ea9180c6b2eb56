//! Wire-stable enums shared between the control loop and its host collaborators.
//!
//! These mirror the per-cycle state machine vocabulary of the balance core:
//! the top-level ride `Phase`, the `SetpointMode` the setpoint director picked,
//! pad `SwitchState`, and the `FaultKind` taxonomy the fault detector raises.

use serde::{Deserialize, Serialize};

/// Top-level ride phase, driven by the supervisor's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for the IMU to report `startup_done()` and for motor
    /// configuration to leave factory defaults.
    Startup,
    /// Riding normally; setpoint mode is tracked separately.
    Running,
    /// Riding with an active duty-cycle tiltback.
    RunningTiltbackDuty,
    /// Riding with an active high-voltage tiltback.
    RunningTiltbackHv,
    /// Riding with an active low-voltage tiltback.
    RunningTiltbackLv,
    /// Pitch angle fault.
    FaultAnglePitch,
    /// Roll angle fault.
    FaultAngleRoll,
    /// One pad released while still moving.
    FaultSwitchHalf,
    /// Both pads released (or quick-stop condition).
    FaultSwitchFull,
    /// Duty cycle fault — sticky, cleared only by another fault.
    FaultDuty,
    /// Startup refused because motor configuration is unsafe.
    FaultStartup,
    /// Reverse-stop escalated into a hard fault.
    FaultReverse,
}

impl Phase {
    /// True for any `Fault*` member, including `FaultStartup`.
    #[inline]
    pub const fn is_fault(&self) -> bool {
        matches!(
            self,
            Phase::FaultAnglePitch
                | Phase::FaultAngleRoll
                | Phase::FaultSwitchHalf
                | Phase::FaultSwitchFull
                | Phase::FaultDuty
                | Phase::FaultStartup
                | Phase::FaultReverse
        )
    }

    /// True for `Running` and any `RunningTiltback*` member.
    #[inline]
    pub const fn is_running(&self) -> bool {
        matches!(
            self,
            Phase::Running
                | Phase::RunningTiltbackDuty
                | Phase::RunningTiltbackHv
                | Phase::RunningTiltbackLv
        )
    }
}

/// Setpoint adjustment mode chosen by the setpoint director.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetpointMode {
    /// Centering ramp after entering `Running` from `Startup`/fault recovery.
    #[default]
    Centering,
    /// Reverse-stop gradual tiltback while riding backwards.
    ReverseStop,
    /// No active tiltback.
    TiltbackNone,
    /// Duty-cycle tiltback.
    TiltbackDuty,
    /// High-voltage tiltback.
    TiltbackHv,
    /// Low-voltage tiltback.
    TiltbackLv,
}

impl SetpointMode {
    /// The `Phase` a `Running`-family phase should carry while in this mode.
    #[inline]
    pub const fn running_phase(&self) -> Phase {
        match self {
            SetpointMode::TiltbackDuty => Phase::RunningTiltbackDuty,
            SetpointMode::TiltbackHv => Phase::RunningTiltbackHv,
            SetpointMode::TiltbackLv => Phase::RunningTiltbackLv,
            _ => Phase::Running,
        }
    }
}

/// Pad switch state derived from the ADC front-end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchState {
    /// No pad pressed.
    #[default]
    Off,
    /// One pad pressed (dual-pad configuration only).
    Half,
    /// All configured pads pressed.
    On,
}

/// Fault taxonomy raised by the fault detector.
///
/// Errors are states, not exceptions — each variant maps 1:1 onto a
/// `Phase::Fault*` member; see [`FaultKind::phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// `|pitch| > fault_pitch` beyond `fault_delay_pitch`.
    AnglePitch,
    /// `|roll| > fault_roll` beyond `fault_delay_roll`.
    AngleRoll,
    /// Pads half-released below `half_erpm`.
    SwitchHalf,
    /// Pads fully released (or quick-stop).
    SwitchFull,
    /// `|duty| > fault_duty` beyond `fault_delay_duty`. Sticky.
    Duty,
    /// Reverse-stop escalated past its pitch/erpm tolerances.
    Reverse,
}

impl FaultKind {
    /// The `Phase` this fault routes the supervisor to.
    #[inline]
    pub const fn phase(&self) -> Phase {
        match self {
            FaultKind::AnglePitch => Phase::FaultAnglePitch,
            FaultKind::AngleRoll => Phase::FaultAngleRoll,
            FaultKind::SwitchHalf => Phase::FaultSwitchHalf,
            FaultKind::SwitchFull => Phase::FaultSwitchFull,
            FaultKind::Duty => Phase::FaultDuty,
            FaultKind::Reverse => Phase::FaultReverse,
        }
    }
}

/// Debug/telemetry field identifiers exposed to the host terminal.
///
/// Numbered to match the three CLI tokens' `<field>` argument
/// (`app_balance_render`, `app_balance_sample`, `app_balance_experiment`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DebugField {
    MotorPosition = 1,
    Setpoint = 2,
    FilteredMotorCurrent = 3,
    Derivative = 4,
    DeltaPitch = 5,
    MotorCurrent = 6,
    Erpm = 7,
    AbsErpm = 8,
    LoopPeriod = 9,
    TickDt = 10,
    LoopOvershoot = 11,
    FilteredOvershoot = 12,
    FilteredDt = 13,
}

/// A single beep token emitted through the `Buzzer` port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BeepToken {
    /// Turn the continuous tone on.
    On,
    /// Turn the continuous tone off; `force` bypasses any hold-off.
    Off { force: bool },
    /// `count` short beeps; `long` stretches each beep's duration.
    Alert { count: u8, long: bool },
}

/// A light command emitted through the `Lights` port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightCmd {
    BrakeOn,
    BrakeOff,
    ForwardOn,
    ForwardOff,
}
