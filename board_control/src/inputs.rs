//! Inputs sampler.
//!
//! Reads the IMU, motor telemetry, and pad ADC once per tick and derives the
//! yaw-rate EMA, roll aggregate, acceleration window, and pad switch state
//! that every downstream component consumes. Follows the read-phase idiom
//! used across this crate's per-tick components: one struct owns all
//! derived-from-raw-feedback state, updated in place, never reallocated.

use board_common::config::BoardConfig;
use board_common::consts::ACCEL_HIST_SIZE;
use board_common::ports::{Imu, MotorController, PadAdc};
use board_common::state::SwitchState;

/// One tick's worth of derived sensor data, handed to every downstream
/// component: fault detection, the setpoint director, the shapers, PID.
#[derive(Debug, Clone, Copy, Default)]
pub struct Samples {
    /// Pitch, degrees.
    pub pitch: f64,
    /// Roll, degrees.
    pub roll: f64,
    /// Yaw, degrees.
    pub yaw: f64,
    /// Gyro rates, deg/s.
    pub gyro: [f64; 3],
    /// Signed electrical RPM.
    pub erpm: f64,
    /// `|erpm|`.
    pub abs_erpm: f64,
    /// Signed duty cycle.
    pub duty: f64,
    /// Direction-filtered total motor current, A.
    pub motor_current: f64,
    /// Battery voltage, V.
    pub input_voltage: f64,
    /// FET temperature, °C.
    pub fet_temp: f64,
    /// FET temperature at which thermal tiltback begins to ramp in, °C
    /// (from the motor configuration snapshot).
    pub fet_temp_start: f64,
    /// Smoothed, EMA-filtered yaw rate.
    pub yaw_change: f64,
    /// Accumulator of `yaw_change` since the last sign flip.
    pub yaw_aggregate: f64,
    /// Accumulator of `roll` while `|roll| > 8`.
    pub roll_aggregate: f64,
    /// Mean of the last `ACCEL_HIST_SIZE` acceleration samples.
    pub acceleration: f64,
    /// Pad switch state.
    pub switch_state: SwitchState,
    /// True when the audible "pads released while riding fast" alert
    /// should be force-asserted this tick.
    pub switch_alert: bool,
}

/// Owns all per-tick derived state that must persist across ticks
/// (yaw EMA, roll/yaw aggregates, acceleration ring buffer).
#[derive(Debug, Clone)]
pub struct InputSampler {
    last_yaw: f64,
    last_raw_yaw_change: f64,
    yaw_change: f64,
    yaw_aggregate: f64,
    roll_aggregate: f64,
    last_smooth_erpm: f64,
    accelhist: [f64; ACCEL_HIST_SIZE],
    accel_idx: usize,
    accel_sum: f64,
    accel_filled: bool,
    switch_alert: bool,
    initialized: bool,
}

impl Default for InputSampler {
    fn default() -> Self {
        Self {
            last_yaw: 0.0,
            last_raw_yaw_change: 0.0,
            yaw_change: 0.0,
            yaw_aggregate: 0.0,
            roll_aggregate: 0.0,
            last_smooth_erpm: 0.0,
            accelhist: [0.0; ACCEL_HIST_SIZE],
            accel_idx: 0,
            accel_sum: 0.0,
            accel_filled: false,
            switch_alert: false,
            initialized: false,
        }
    }
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the yaw/roll/acceleration accumulators, e.g. on a transition
    /// into `Running`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Zero `yaw_aggregate` in isolation, leaving the rest of the sampler's
    /// state untouched. Called when turn tilt's ATR-interference scales its
    /// target all the way to zero.
    pub fn reset_yaw_aggregate(&mut self) {
        self.yaw_aggregate = 0.0;
    }

    /// Sample IMU + motor + pads for one tick and derive every field every
    /// downstream component consumes. `riding` gates the switch-alert
    /// predicate (only asserted while the board believes it's being ridden
    /// above `fault_adc_half_erpm`).
    pub fn sample(
        &mut self,
        imu: &dyn Imu,
        motor: &dyn MotorController,
        pads: &dyn PadAdc,
        cfg: &BoardConfig,
        riding: bool,
    ) -> Samples {
        let pitch = imu.pitch().to_degrees();
        let roll = imu.roll().to_degrees();
        let yaw = imu.yaw().to_degrees();
        let mut gyro = [0.0; 3];
        imu.gyro(&mut gyro);

        let erpm = motor.rpm();
        let abs_erpm = erpm.abs();
        let duty = motor.duty_now();
        let motor_current = motor.total_current_directional_filtered();

        self.sample_yaw(yaw);
        self.sample_roll(roll);
        let acceleration = self.sample_acceleration(motor, cfg);

        let switch_state = derive_switch_state(pads, cfg);
        if switch_state == SwitchState::Off && riding && abs_erpm > cfg.fault_adc_half_erpm {
            self.switch_alert = true;
        } else if switch_state != SwitchState::Off {
            self.switch_alert = false;
        }

        Samples {
            pitch,
            roll,
            yaw,
            gyro,
            erpm,
            abs_erpm,
            duty,
            motor_current,
            input_voltage: motor.input_voltage(),
            fet_temp: motor.temp_fet_filtered(),
            fet_temp_start: motor.configuration().fet_temp_start,
            yaw_change: self.yaw_change,
            yaw_aggregate: self.yaw_aggregate,
            roll_aggregate: self.roll_aggregate,
            acceleration,
            switch_state,
            switch_alert: self.switch_alert,
        }
    }

    fn sample_yaw(&mut self, yaw: f64) {
        if !self.initialized {
            self.last_yaw = yaw;
            self.initialized = true;
        }
        let mut raw_change = yaw - self.last_yaw;
        let mut unchanged = false;
        // Wrap-around at +-180 degrees, or an exact-zero sample (stalled
        // IMU update) both substitute the previous change.
        if raw_change == 0.0 || raw_change.abs() > 100.0 {
            raw_change = self.last_raw_yaw_change.clamp(-0.10, 0.10);
            unchanged = true;
        }
        self.last_raw_yaw_change = raw_change;
        self.last_yaw = yaw;

        let prev_sign = self.yaw_change.signum();
        self.yaw_change = 0.8 * self.yaw_change + 0.2 * raw_change;
        let new_sign = self.yaw_change.signum();
        if prev_sign != 0.0 && new_sign != 0.0 && prev_sign != new_sign {
            self.yaw_aggregate = 0.0;
        }
        if self.yaw_change.abs() > 0.04 && !unchanged {
            self.yaw_aggregate += self.yaw_change;
        }
    }

    fn sample_roll(&mut self, roll: f64) {
        if roll.abs() > 8.0 {
            self.roll_aggregate += roll;
        } else {
            self.roll_aggregate = 0.0;
        }
    }

    fn sample_acceleration(&mut self, motor: &dyn MotorController, cfg: &BoardConfig) -> f64 {
        let invert = motor.configuration().invert_direction;
        let smooth = if invert {
            -motor.smooth_erpm()
        } else {
            motor.smooth_erpm()
        };
        let _ = cfg;
        let acc_raw = smooth - self.last_smooth_erpm;
        self.last_smooth_erpm = smooth;

        let old = self.accelhist[self.accel_idx];
        self.accelhist[self.accel_idx] = acc_raw;
        self.accel_sum += acc_raw - old;
        self.accel_idx = (self.accel_idx + 1) % ACCEL_HIST_SIZE;
        if self.accel_idx == 0 {
            self.accel_filled = true;
        }

        let n = if self.accel_filled {
            ACCEL_HIST_SIZE
        } else {
            self.accel_idx.max(1)
        };
        self.accel_sum / n as f64
    }
}

/// Derive `SwitchState` from the pad ADC front-end.
///
/// A threshold of 0 disables that pad. No enabled pads means "no switch" —
/// always reads `On`. One enabled pad toggles `On`/`Off`. Two enabled pads
/// add the intermediate `Half` state.
pub fn derive_switch_state(pads: &dyn PadAdc, cfg: &BoardConfig) -> SwitchState {
    let p1_enabled = cfg.fault_adc1 > 0.0;
    let p2_enabled = cfg.fault_adc2 > 0.0;
    let p1_pressed = p1_enabled && pads.pad1_voltage() < cfg.fault_adc1;
    let p2_pressed = p2_enabled && pads.pad2_voltage() < cfg.fault_adc2;

    match (p1_enabled, p2_enabled) {
        (false, false) => SwitchState::On,
        (true, false) => {
            if p1_pressed {
                SwitchState::On
            } else {
                SwitchState::Off
            }
        }
        (false, true) => {
            if p2_pressed {
                SwitchState::On
            } else {
                SwitchState::Off
            }
        }
        (true, true) => {
            if p1_pressed && p2_pressed {
                SwitchState::On
            } else if p1_pressed || p2_pressed {
                SwitchState::Half
            } else {
                SwitchState::Off
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_common::ports::MotorConfiguration;

    struct StubImu {
        pitch: f64,
        roll: f64,
        yaw: f64,
    }
    impl Imu for StubImu {
        fn pitch(&self) -> f64 {
            self.pitch
        }
        fn roll(&self) -> f64 {
            self.roll
        }
        fn yaw(&self) -> f64 {
            self.yaw
        }
        fn gyro(&self, out: &mut [f64; 3]) {
            *out = [0.0, 0.0, 0.0];
        }
        fn startup_done(&self) -> bool {
            true
        }
    }

    struct StubMotor {
        erpm: f64,
        smooth_erpm: f64,
        invert: bool,
    }
    impl MotorController for StubMotor {
        fn rpm(&self) -> f64 {
            self.erpm
        }
        fn duty_now(&self) -> f64 {
            0.1
        }
        fn total_current_directional_filtered(&self) -> f64 {
            5.0
        }
        fn smooth_erpm(&self) -> f64 {
            self.smooth_erpm
        }
        fn temp_fet_filtered(&self) -> f64 {
            30.0
        }
        fn input_voltage(&self) -> f64 {
            60.0
        }
        fn configuration(&self) -> MotorConfiguration {
            MotorConfiguration {
                current_min: -60.0,
                current_max: 60.0,
                invert_direction: self.invert,
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

    #[test]
    fn switch_state_no_switch_always_on() {
        let cfg = BoardConfig {
            fault_adc1: 0.0,
            fault_adc2: 0.0,
            ..BoardConfig::default()
        };
        let pads = StubPads { v1: 3.3, v2: 3.3 };
        assert_eq!(derive_switch_state(&pads, &cfg), SwitchState::On);
    }

    #[test]
    fn switch_state_dual_pad_half_when_one_pressed() {
        let cfg = BoardConfig {
            fault_adc1: 2.0,
            fault_adc2: 2.0,
            ..BoardConfig::default()
        };
        let pads = StubPads { v1: 0.5, v2: 3.0 };
        assert_eq!(derive_switch_state(&pads, &cfg), SwitchState::Half);
    }

    #[test]
    fn switch_state_dual_pad_off_when_neither_pressed() {
        let cfg = BoardConfig {
            fault_adc1: 2.0,
            fault_adc2: 2.0,
            ..BoardConfig::default()
        };
        let pads = StubPads { v1: 3.0, v2: 3.0 };
        assert_eq!(derive_switch_state(&pads, &cfg), SwitchState::Off);
    }

    #[test]
    fn yaw_change_wraparound_substitutes_previous() {
        let mut s = InputSampler::new();
        let imu1 = StubImu {
            pitch: 0.0,
            roll: 0.0,
            yaw: 179.0,
        };
        let motor = StubMotor {
            erpm: 0.0,
            smooth_erpm: 0.0,
            invert: false,
        };
        let pads = StubPads { v1: 3.3, v2: 3.3 };
        let cfg = BoardConfig::default();
        s.sample(&imu1, &motor, &pads, &cfg, false);

        // Jump past the wrap point: raw_change would be huge; must substitute.
        let imu2 = StubImu {
            pitch: 0.0,
            roll: 0.0,
            yaw: -179.0,
        };
        let before = s.yaw_change;
        s.sample(&imu2, &motor, &pads, &cfg, false);
        // yaw_change must stay bounded (no huge jump ingested).
        assert!((s.yaw_change - before).abs() < 1.0);
    }

    #[test]
    fn roll_aggregate_resets_below_threshold() {
        let mut s = InputSampler::new();
        let motor = StubMotor {
            erpm: 0.0,
            smooth_erpm: 0.0,
            invert: false,
        };
        let pads = StubPads { v1: 3.3, v2: 3.3 };
        let cfg = BoardConfig::default();

        let imu_high_roll = StubImu {
            pitch: 0.0,
            roll: 10.0,
            yaw: 0.0,
        };
        s.sample(&imu_high_roll, &motor, &pads, &cfg, false);
        assert!(s.roll_aggregate > 0.0);

        let imu_low_roll = StubImu {
            pitch: 0.0,
            roll: 2.0,
            yaw: 0.0,
        };
        s.sample(&imu_low_roll, &motor, &pads, &cfg, false);
        assert_eq!(s.roll_aggregate, 0.0);
    }

    #[test]
    fn acceleration_is_running_mean_of_ring_buffer() {
        let mut s = InputSampler::new();
        let imu = StubImu {
            pitch: 0.0,
            roll: 0.0,
            yaw: 0.0,
        };
        let pads = StubPads { v1: 3.3, v2: 3.3 };
        let cfg = BoardConfig::default();

        let mut last = 0.0;
        let mut expected_sum = 0.0;
        for i in 1..=10 {
            let motor = StubMotor {
                erpm: 0.0,
                smooth_erpm: i as f64 * 10.0,
                invert: false,
            };
            let out = s.sample(&imu, &motor, &pads, &cfg, false);
            expected_sum += i as f64 * 10.0 - last;
            last = i as f64 * 10.0;
            assert!((out.acceleration - expected_sum / i as f64).abs() < 1e-9);
        }
    }
}
