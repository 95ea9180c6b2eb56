//! Ride supervisor.
//!
//! Top-level state machine: `Startup` / `Running{,±tiltback}` / `Fault*`.
//! Wraps the setpoint director and fault detector, decides whether the lock
//! recognizer runs this tick, and orchestrates `reset_vars()` on every
//! transition into `Running` (and, per the transition table, on
//! `Startup -> FaultStartup` too). Follows the same priority-match
//! transition table idiom this crate's other state machines use, adapted
//! from a discrete command-driven machine to a tick-sampled-predicate one.
//! The fault-state rule that the motor is driven only by `brake()` is left
//! for [`crate::output`] to enforce by reading [`Supervisor::phase`].

use board_common::config::BoardConfig;
use board_common::consts::INACTIVITY_BEEP_PERIOD_S;
use board_common::ports::{MotorConfiguration, PadAdc};
use board_common::state::{BeepToken, FaultKind, Phase, SetpointMode, SwitchState};

use crate::director::SetpointDirector;
use crate::faults::{self, FaultTimers};
use crate::inputs::Samples;
use crate::lock::{LockOutput, LockRecognizer};

/// What happened this tick, for the cycle runner to act on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupervisorOutput {
    pub phase: Phase,
    /// Only meaningful while `phase.is_running()`.
    pub mode: SetpointMode,
    pub setpoint_target_interp: f64,
    /// `reset_vars()`: the cycle runner must reset the PID core, shapers,
    /// and input sampler this tick.
    pub reset_vars: bool,
    /// Narrower than `reset_vars`: only the PID integral, raised on
    /// REVERSESTOP's own exit back to TILTBACK_NONE.
    pub reset_integral: bool,
    pub entered_running: bool,
    pub beep: Option<BeepToken>,
    pub lock: LockOutput,
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    phase: Phase,
    director: SetpointDirector,
    faults: FaultTimers,
    lock: LockRecognizer,
    startup_warn_ms: f64,
    inactivity_ms: f64,
    inactivity_beep_ms: f64,
}

impl Supervisor {
    pub fn new(cfg: &BoardConfig) -> Self {
        Self {
            phase: Phase::Startup,
            director: SetpointDirector::new(),
            faults: FaultTimers::new(),
            lock: LockRecognizer::new(cfg),
            startup_warn_ms: 0.0,
            inactivity_ms: 0.0,
            inactivity_beep_ms: 0.0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// `setpoint_target_interp` for downstream shapers, valid while running.
    pub fn setpoint_target_interp(&self) -> f64 {
        self.director.setpoint_target_interp()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        samples: &Samples,
        pads: &dyn PadAdc,
        cfg: &BoardConfig,
        motor_cfg: MotorConfiguration,
        imu_startup_done: bool,
        soft_start_enabled: bool,
        dt_ms: f64,
    ) -> SupervisorOutput {
        let mut out = SupervisorOutput {
            phase: self.phase,
            ..Default::default()
        };

        // The lock recognizer runs in every fault state and while waiting
        // out Startup; it does not run while actually Running.
        if !self.phase.is_running() {
            out.lock = self.lock.tick(pads, cfg, dt_ms);
        }

        match self.phase {
            Phase::Startup => self.tick_startup(imu_startup_done, motor_cfg, dt_ms, &mut out),
            p if p.is_fault() => self.tick_fault(samples, cfg, dt_ms, &mut out),
            _ => self.tick_running(samples, cfg, soft_start_enabled, dt_ms, &mut out),
        }

        out.phase = self.phase;
        out
    }

    fn tick_startup(
        &mut self,
        imu_startup_done: bool,
        motor_cfg: MotorConfiguration,
        dt_ms: f64,
        out: &mut SupervisorOutput,
    ) {
        if imu_startup_done && !motor_cfg.is_default_motor_config {
            self.director.reset();
            self.faults.reset();
            self.phase = Phase::FaultStartup;
            out.reset_vars = true;
            // Stand-in for "play tune, battery-low beeps": a single long
            // double-beep marks the startup-complete handoff into
            // FAULT_STARTUP, same token family the lock gesture uses.
            out.beep = Some(BeepToken::Alert {
                count: 2,
                long: true,
            });
            return;
        }

        self.startup_warn_ms += dt_ms;
        if self.startup_warn_ms >= 1000.0 {
            self.startup_warn_ms = 0.0;
            out.beep = Some(BeepToken::Alert {
                count: 1,
                long: false,
            });
        }
    }

    fn tick_fault(&mut self, samples: &Samples, cfg: &BoardConfig, dt_ms: f64, out: &mut SupervisorOutput) {
        self.tick_inactivity(samples, cfg, dt_ms, out);

        let fault = faults::detect(
            &mut self.faults,
            samples,
            self.director.mode(),
            self.director.reverse_total_erpm(),
            cfg,
            dt_ms,
        );

        if let Some(kind) = fault {
            self.phase = kind.phase();
            return;
        }

        if self.recoverable(samples, cfg) {
            self.enter_running(out);
        }
        // else: stays in the current fault phase. FAULT_DUTY's stickiness
        // falls out of this unconditionally: with no new fault firing and
        // recovery not yet met, the phase is simply unchanged regardless of
        // which fault it is.
    }

    fn tick_running(
        &mut self,
        samples: &Samples,
        cfg: &BoardConfig,
        soft_start_enabled: bool,
        dt_ms: f64,
        out: &mut SupervisorOutput,
    ) {
        let fault = faults::detect(
            &mut self.faults,
            samples,
            self.director.mode(),
            self.director.reverse_total_erpm(),
            cfg,
            dt_ms,
        );
        if let Some(kind) = fault {
            self.phase = kind.phase();
            out.phase = self.phase;
            return;
        }

        let director_out = self.director.tick(samples, cfg, soft_start_enabled, dt_ms);
        self.phase = director_out.mode.running_phase();
        out.mode = director_out.mode;
        out.setpoint_target_interp = director_out.setpoint_target_interp;
        out.reset_integral = director_out.reset_integral;
        out.beep = director_out.beep;
    }

    /// In any `FAULT_*` except `FAULT_STARTUP` (or `FAULT_STARTUP` when the
    /// battery is under `tiltback_lv + 2`), the inactivity timer runs; after
    /// `inactivity_timeout` it emits a triple-beep every
    /// `INACTIVITY_BEEP_PERIOD_S` until the fault clears.
    fn tick_inactivity(&mut self, samples: &Samples, cfg: &BoardConfig, dt_ms: f64, out: &mut SupervisorOutput) {
        let active = cfg.inactivity_timeout_s > 0.0
            && (self.phase != Phase::FaultStartup || samples.input_voltage < cfg.tiltback_lv + 2.0);

        if !active {
            self.inactivity_ms = 0.0;
            self.inactivity_beep_ms = 0.0;
            return;
        }

        let timeout_ms = cfg.inactivity_timeout_s * 1000.0;
        let was_timed_out = self.inactivity_ms >= timeout_ms;
        self.inactivity_ms += dt_ms;
        if self.inactivity_ms < timeout_ms {
            return;
        }

        if !was_timed_out {
            self.inactivity_beep_ms = 0.0;
            out.beep = Some(BeepToken::Alert {
                count: 3,
                long: false,
            });
            return;
        }

        self.inactivity_beep_ms += dt_ms;
        if self.inactivity_beep_ms >= INACTIVITY_BEEP_PERIOD_S * 1000.0 {
            self.inactivity_beep_ms = 0.0;
            out.beep = Some(BeepToken::Alert {
                count: 3,
                long: false,
            });
        }
    }

    /// Common `FAULT_* -> RUNNING` recovery predicate.
    fn recoverable(&self, samples: &Samples, cfg: &BoardConfig) -> bool {
        !self.lock.is_locked()
            && samples.pitch.abs() < cfg.startup_pitch_tolerance
            && samples.roll.abs() < cfg.startup_roll_tolerance
            && samples.switch_state == SwitchState::On
    }

    fn enter_running(&mut self, out: &mut SupervisorOutput) {
        self.director.reset();
        self.faults.reset();
        self.inactivity_ms = 0.0;
        self.inactivity_beep_ms = 0.0;
        self.phase = Phase::Running;
        out.reset_vars = true;
        out.entered_running = true;
        out.mode = self.director.mode();
        out.setpoint_target_interp = self.director.setpoint_target_interp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubPads {
        v1: f64,
        v2: f64,
    }
    impl PadAdc for StubPads {
        fn pad1_voltage(&self) -> f64 {
            self.v1
        }
        fn pad2_voltage(&self) -> f64 {
            self.v2
        }
    }

    fn motor_cfg(is_default: bool) -> MotorConfiguration {
        MotorConfiguration {
            current_min: -60.0,
            current_max: 60.0,
            invert_direction: false,
            is_default_motor_config: is_default,
            fet_temp_start: 80.0,
            switching_frequency_hz: 30_000.0,
            aux_output_mode: 0,
        }
    }

    const RELEASED: f64 = 3.3;

    fn good_samples() -> Samples {
        Samples {
            pitch: 1.0,
            roll: 1.0,
            switch_state: SwitchState::On,
            ..Default::default()
        }
    }

    #[test]
    fn startup_waits_on_factory_default_motor_config() {
        let cfg = BoardConfig::default();
        let mut sup = Supervisor::new(&cfg);
        let pads = StubPads { v1: RELEASED, v2: RELEASED };
        let out = sup.tick(&good_samples(), &pads, &cfg, motor_cfg(true), true, true, 1.0);
        assert_eq!(sup.phase(), Phase::Startup);
        assert_eq!(out.phase, Phase::Startup);
    }

    #[test]
    fn startup_transitions_to_fault_startup_once_ready() {
        let cfg = BoardConfig::default();
        let mut sup = Supervisor::new(&cfg);
        let pads = StubPads { v1: RELEASED, v2: RELEASED };
        let out = sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        assert_eq!(sup.phase(), Phase::FaultStartup);
        assert!(out.reset_vars);
    }

    #[test]
    fn fault_startup_recovers_to_running_when_conditions_met() {
        let cfg = BoardConfig::default();
        let mut sup = Supervisor::new(&cfg);
        let pads = StubPads { v1: RELEASED, v2: RELEASED };
        sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        assert_eq!(sup.phase(), Phase::FaultStartup);

        let out = sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        assert!(out.entered_running);
        assert!(sup.phase().is_running());
    }

    #[test]
    fn locked_board_never_recovers_from_fault() {
        let cfg = BoardConfig {
            multi_esc: true, // repurposed persistent is_locked flag
            ..BoardConfig::default()
        };
        let mut sup = Supervisor::new(&cfg);
        assert!(sup.is_locked());
        let pads = StubPads { v1: RELEASED, v2: RELEASED };
        sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        let out = sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        assert!(!out.entered_running);
        assert!(sup.phase().is_fault());
    }

    #[test]
    fn running_fault_predicate_routes_to_matching_phase() {
        let cfg = BoardConfig::default();
        let mut sup = Supervisor::new(&cfg);
        let pads = StubPads { v1: RELEASED, v2: RELEASED };
        sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        assert!(sup.phase().is_running());

        let bad = Samples {
            pitch: cfg.fault_pitch + 5.0,
            switch_state: SwitchState::On,
            ..Default::default()
        };
        let mut faulted = false;
        for _ in 0..((cfg.fault_delay_pitch_ms as u32) + 20) {
            let out = sup.tick(&bad, &pads, &cfg, motor_cfg(false), true, true, 1.0);
            if out.phase == Phase::FaultAnglePitch {
                faulted = true;
                break;
            }
        }
        assert!(faulted);
    }

    #[test]
    fn fault_duty_is_sticky_until_recovered() {
        let cfg = BoardConfig::default();
        let mut sup = Supervisor::new(&cfg);
        let pads = StubPads { v1: RELEASED, v2: RELEASED };
        sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        assert!(sup.phase().is_running());

        let hot = Samples {
            duty: cfg.fault_duty + 0.05,
            switch_state: SwitchState::On,
            ..Default::default()
        };
        for _ in 0..(cfg.fault_delay_duty_ms as u32 + 5) {
            sup.tick(&hot, &pads, &cfg, motor_cfg(false), true, true, 1.0);
        }
        assert_eq!(sup.phase(), Phase::FaultDuty);

        // Predicate clears, but the phase must remain FaultDuty (sticky)
        // until the common recovery condition is satisfied.
        let cold_but_not_recovered = Samples {
            switch_state: SwitchState::Off,
            ..Default::default()
        };
        sup.tick(&cold_but_not_recovered, &pads, &cfg, motor_cfg(false), true, true, 1.0);
        assert_eq!(sup.phase(), Phase::FaultDuty);

        let out = sup.tick(&good_samples(), &pads, &cfg, motor_cfg(false), true, true, 1.0);
        assert!(out.entered_running);
    }
}
