//! RT setup + cycle runner.
//!
//! Orchestrates one tick — [`crate::inputs::InputSampler`] →
//! [`crate::supervisor::Supervisor`] → [`crate::shapers::Shapers`] →
//! [`crate::pid::PidCore`] → [`crate::output::OutputActuator`] — behind a
//! fixed-rate loop. RT setup and cycle-timing bookkeeping are hardware/OS
//! concerns independent of what the cycle body actually computes, so the
//! `rt_mlockall`/`rt_set_affinity`/`rt_set_scheduler`/`rt_setup` sequence and
//! the `CycleStats`/`CycleError` shapes are kept generic across both build
//! modes. `run_rt_loop` paces itself against an absolute-time
//! `clock_nanosleep` schedule and treats any overrun as fatal; `run_sim_loop`
//! instead corrects a relative `std::thread::sleep` against `loop_period -
//! filtered_overshoot`, since that loop — unlike the `rt` build's
//! drift-free absolute-time schedule — is exactly where that correction
//! matters.

use board_common::config::BoardConfig;
use board_common::ports::{Buzzer, Imu, Lights, MotorController, PadAdc, PersistenceSink};
use board_common::state::SetpointMode;
use tracing::{debug, info, warn};

use crate::config::LoadedConfig;
use crate::inputs::InputSampler;
use crate::output::OutputActuator;
use crate::pid::PidCore;
use crate::shapers::Shapers;
use crate::supervisor::Supervisor;

/// EMA coefficient for the overshoot correction the sim loop's pacing uses.
/// The original firmware calls this `loop_time_filter`, but no configuration
/// slot carries it through, so it's a fixed constant here instead — a
/// fixed-period timer plus an EMA correction reproduces the same pacing.
const OVERSHOOT_EMA_ALPHA: f64 = 0.1;

/// O(1) per-cycle timing statistics, exposed to the host terminal as debug
/// fields 9–13: `loop_period`, `tick dt`, `loop overshoot`, `filtered
/// overshoot`, `filtered dt`.
#[derive(Debug, Clone, Copy)]
pub struct CycleStats {
    pub cycle_count: u64,
    /// Field 10 — this tick's duration, ns.
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    sum_cycle_ns: i64,
    /// Cycles whose duration exceeded the configured budget.
    pub overruns: u64,
    /// RT-build only; always 0 in the sim build (no wake-latency to measure).
    pub max_latency_ns: i64,
    /// Field 11 — `max(0, duration - budget)` for the most recent tick.
    pub loop_overshoot_ns: i64,
    /// Field 12 — EMA of `loop_overshoot_ns`.
    pub filtered_overshoot_ns: f64,
    /// Field 13 — EMA of `last_cycle_ns`.
    pub filtered_dt_ns: f64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
            loop_overshoot_ns: 0,
            filtered_overshoot_ns: 0.0,
            filtered_dt_ns: 0.0,
        }
    }

    /// Record one cycle's timing. O(1), no allocation.
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64, budget_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
        if latency_ns > self.max_latency_ns {
            self.max_latency_ns = latency_ns;
        }

        self.loop_overshoot_ns = (duration_ns - budget_ns).max(0);
        self.filtered_overshoot_ns = OVERSHOOT_EMA_ALPHA * self.loop_overshoot_ns as f64
            + (1.0 - OVERSHOOT_EMA_ALPHA) * self.filtered_overshoot_ns;
        self.filtered_dt_ns = OVERSHOOT_EMA_ALPHA * duration_ns as f64
            + (1.0 - OVERSHOOT_EMA_ALPHA) * self.filtered_dt_ns;
    }

    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }

    /// `loop_period - filtered_overshoot`, floored at 0.
    pub fn next_sleep_ns(&self, budget_ns: i64) -> i64 {
        (budget_ns as f64 - self.filtered_overshoot_ns).max(0.0) as i64
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Every per-tick component, pre-allocated once and never reallocated on the
/// hot path.
pub struct RuntimeState {
    pub supervisor: Supervisor,
    pub inputs: InputSampler,
    pub shapers: Shapers,
    pub pid: PidCore,
    pub output: OutputActuator,
    pub stats: CycleStats,
}

impl RuntimeState {
    pub fn new(cfg: &BoardConfig) -> Self {
        Self {
            supervisor: Supervisor::new(cfg),
            inputs: InputSampler::new(),
            shapers: Shapers::new(),
            pid: PidCore::new(),
            output: OutputActuator::new(),
            stats: CycleStats::new(),
        }
    }
}

/// Errors during RT setup or cycle execution.
#[derive(Debug)]
pub enum CycleError {
    /// An RT system call failed during [`rt_setup`].
    RtSetup(String),
    /// A single cycle exceeded its budget (fatal only in the `rt` build).
    CycleOverrun { actual_ns: i64, budget_ns: i64 },
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RtSetup(msg) => write!(f, "RT setup error: {msg}"),
            Self::CycleOverrun {
                actual_ns,
                budget_ns,
            } => write!(f, "cycle overrun: {actual_ns}ns > {budget_ns}ns budget"),
        }
    }
}

impl std::error::Error for CycleError {}

/// Lock all current and future memory pages. No-op without the `rt` feature.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{mlockall, MlockallFlags};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch a large stack allocation to prefault its pages ahead of the loop.
fn prefault_stack() {
    let mut buf = [0u8; 1024 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to a specific CPU core. No-op without `rt`.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Set `SCHED_FIFO` with the given RT priority. No-op without `rt`.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence: lock memory, prefault the stack, pin to a CPU
/// core, then raise the scheduling class. Must run once before [`CycleRunner::run`].
/// Every step is a no-op in the default (simulation) build.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

/// The main deterministic cycle runner. Owns the loaded configuration, the
/// host port collaborators, and all pre-allocated runtime state.
pub struct CycleRunner {
    config: LoadedConfig,
    motor: Box<dyn MotorController>,
    imu: Box<dyn Imu>,
    pads: Box<dyn PadAdc>,
    buzzer: Box<dyn Buzzer>,
    lights: Box<dyn Lights>,
    persistence: Box<dyn PersistenceSink>,
    state: RuntimeState,
    cycle_time_ns: i64,
}

impl CycleRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: LoadedConfig,
        motor: Box<dyn MotorController>,
        imu: Box<dyn Imu>,
        pads: Box<dyn PadAdc>,
        buzzer: Box<dyn Buzzer>,
        lights: Box<dyn Lights>,
        persistence: Box<dyn PersistenceSink>,
    ) -> Self {
        let state = RuntimeState::new(&config.board);
        let cycle_time_ns = (1.0e9 / config.board.hz).round() as i64;
        Self {
            config,
            motor,
            imu,
            pads,
            buzzer,
            lights,
            persistence,
            state,
            cycle_time_ns,
        }
    }

    pub fn stats(&self) -> &CycleStats {
        &self.state.stats
    }

    /// Enter the cycle loop. Never returns under normal operation.
    pub fn run(&mut self) -> Result<(), CycleError> {
        info!(hz = self.config.board.hz, "entering board_control cycle loop");

        #[cfg(feature = "rt")]
        {
            self.run_rt_loop()
        }
        #[cfg(not(feature = "rt"))]
        {
            self.run_sim_loop()
        }
    }

    /// RT loop using absolute-time `clock_nanosleep(TIMER_ABSTIME)` pacing.
    /// A single overrun is fatal and surfaces as `CycleError::CycleOverrun`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::time::{clock_gettime, clock_nanosleep, ClockId, ClockNanosleepFlags};

        let clock = ClockId::CLOCK_MONOTONIC;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        loop {
            next_wake = timespec_add_ns(next_wake, self.cycle_time_ns);

            let cycle_start = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let wake_latency_ns = timespec_diff_ns(&cycle_start, &next_wake).abs();

            self.cycle_body();

            let cycle_end = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
            self.state
                .stats
                .record(duration_ns, wake_latency_ns, self.cycle_time_ns);

            if duration_ns > self.cycle_time_ns {
                self.state.stats.overruns += 1;
                warn!(duration_ns, budget_ns = self.cycle_time_ns, "cycle overrun");
                return Err(CycleError::CycleOverrun {
                    actual_ns: duration_ns,
                    budget_ns: self.cycle_time_ns,
                });
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
    }

    /// Simulation loop using relative `std::thread::sleep`, paced by
    /// `loop_period - filtered_overshoot`. Overruns are counted, not fatal —
    /// there's no isolated RT core to miss a deadline on.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) -> Result<(), CycleError> {
        use std::time::Instant;

        loop {
            let cycle_start = Instant::now();

            self.cycle_body();

            let duration_ns = cycle_start.elapsed().as_nanos() as i64;
            self.state
                .stats
                .record(duration_ns, 0, self.cycle_time_ns);

            if duration_ns > self.cycle_time_ns {
                self.state.stats.overruns += 1;
                debug!(
                    duration_ns,
                    budget_ns = self.cycle_time_ns,
                    "cycle overrun (non-fatal in sim build)"
                );
            }

            let sleep_ns = self.state.stats.next_sleep_ns(self.cycle_time_ns);
            if sleep_ns > 0 {
                std::thread::sleep(std::time::Duration::from_nanos(sleep_ns as u64));
            }
        }
    }

    /// One tick: read → decide → write.
    fn cycle_body(&mut self) {
        let riding = self.state.supervisor.phase().is_running();
        let samples = self.state.inputs.sample(
            self.imu.as_ref(),
            self.motor.as_ref(),
            self.pads.as_ref(),
            &self.config.board,
            riding,
        );
        let motor_cfg = self.motor.configuration();
        let dt_ms = self.dt_ms();

        // soft_start_enabled gates the centering grace period; no config
        // slot maps onto it, unlike stealth_start (the startup-click
        // suppression), so it is always on.
        let soft_start_enabled = true;
        let stealth_start = self.config.board.startup_mode().stealth_start;

        let sup_out = self.state.supervisor.tick(
            &samples,
            self.pads.as_ref(),
            &self.config.board,
            motor_cfg,
            self.imu.startup_done(),
            soft_start_enabled,
            dt_ms,
        );

        if sup_out.reset_vars {
            self.state.pid.reset(&self.config.board);
            self.state.shapers.reset();
            self.state.inputs.reset();
        }
        if sup_out.reset_integral {
            self.state.pid.reset_integral();
        }

        if let Some(beep) = sup_out.beep {
            self.buzzer.beep(beep);
        }
        if let Some(beep) = sup_out.lock.beep {
            self.buzzer.beep(beep);
        }
        if let Some(toggled) = sup_out.lock.toggled {
            if self.config.board.lock_persistence_allowed() {
                self.persistence.commands_balance_lock(toggled);
            }
        }

        if sup_out.phase.is_running() {
            let shaper_out = self.state.shapers.tick(
                &samples,
                &self.config.board,
                sup_out.setpoint_target_interp,
                true,
            );
            if shaper_out.reset_yaw_aggregate {
                self.state.inputs.reset_yaw_aggregate();
            }
            let phase_is_centering = sup_out.mode == SetpointMode::Centering;
            let pid_out = self.state.pid.tick(
                &samples,
                &self.config.board,
                shaper_out.setpoint,
                sup_out.mode,
                phase_is_centering,
                soft_start_enabled,
                stealth_start,
                shaper_out.torquetilt_interp,
                motor_cfg,
                dt_ms,
            );
            let drive_out = self
                .state
                .output
                .drive(self.motor.as_mut(), &self.config.board, pid_out);
            if let Some(beep) = drive_out.beep {
                self.buzzer.beep(beep);
            }
        } else {
            self.state
                .output
                .brake(self.motor.as_mut(), &self.config.board, &samples, dt_ms);
        }
    }

    fn dt_ms(&self) -> f64 {
        1000.0 / self.config.board.hz
    }

    /// Cancellation sequence: `brake_off`, `beep_off(force)`, `brake()`.
    pub fn shutdown(&mut self) {
        self.state.output.shutdown(
            self.motor.as_mut(),
            self.lights.as_mut(),
            self.buzzer.as_mut(),
            &self.config.board,
        );
    }
}

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}
