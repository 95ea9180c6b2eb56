//! Raw configuration schema for the balance core.
//!
//! `BoardConfig` is the wire-stable TOML schema: every field a rider's
//! configuration tool would expose, including a handful of slots repurposed
//! for newer behavior that must stay bit-for-bit compatible with the
//! original firmware's layout on upgrade. `board_control::config` layers
//! loading, clamping, and step-size derivation on top of this schema —
//! the schema itself stays a plain data type so it can be deserialized,
//! defaulted, and persisted without pulling in any of the control logic.

use serde::{Deserialize, Serialize};

/// Startup-speed sub-field semantics: the fractional part of
/// `startup_speed` is repurposed to select reverse-stop / stealth-start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupMode {
    pub reverse_stop: bool,
    pub stealth_start: bool,
}

impl StartupMode {
    /// Decode from `startup_speed`'s fractional part:
    /// `.1` = reverse-stop, `.2` = stealth-start, `.3` = both.
    pub fn from_startup_speed(startup_speed: f64) -> Self {
        let frac = (startup_speed.abs() * 10.0).round() as i64 % 10;
        match frac {
            1 => StartupMode {
                reverse_stop: true,
                stealth_start: false,
            },
            2 => StartupMode {
                reverse_stop: false,
                stealth_start: true,
            },
            3 => StartupMode {
                reverse_stop: true,
                stealth_start: true,
            },
            _ => StartupMode {
                reverse_stop: false,
                stealth_start: false,
            },
        }
    }
}

fn default_hz() -> f64 {
    1000.0
}
fn default_startup_pitch_tolerance() -> f64 {
    5.0
}
fn default_startup_roll_tolerance() -> f64 {
    25.0
}
fn default_half_erpm() -> f64 {
    750.0
}
fn default_fault_adc_half_erpm() -> f64 {
    1500.0
}
fn default_fault_pitch() -> f64 {
    45.0
}
fn default_fault_roll() -> f64 {
    60.0
}
fn default_fault_duty() -> f64 {
    0.9
}
fn default_fault_delay_pitch_ms() -> u32 {
    50
}
fn default_fault_delay_roll_ms() -> u32 {
    50
}
fn default_fault_delay_switch_half_ms() -> u32 {
    300
}
fn default_fault_delay_switch_full_ms() -> u32 {
    30
}
fn default_fault_delay_duty_ms() -> u32 {
    50
}
fn default_fault_adc1() -> f64 {
    2.5
}
fn default_fault_adc2() -> f64 {
    2.5
}
fn default_tiltback_duty() -> f64 {
    0.9
}
fn default_tiltback_duty_angle() -> f64 {
    12.0
}
fn default_tiltback_duty_speed() -> f64 {
    3.0
}
fn default_tiltback_hv() -> f64 {
    67.0
}
fn default_tiltback_hv_angle() -> f64 {
    10.0
}
fn default_tiltback_hv_speed() -> f64 {
    3.0
}
fn default_tiltback_lv() -> f64 {
    42.0
}
fn default_tiltback_lv_angle() -> f64 {
    10.0
}
fn default_tiltback_lv_speed() -> f64 {
    3.0
}
fn default_tiltback_return_speed() -> f64 {
    4.0
}
fn default_centering_speed() -> f64 {
    4.0
}
fn default_reversestop_speed() -> f64 {
    4.0
}
fn default_reverse_tolerance() -> f64 {
    300_000.0
}
fn default_torquetilt_strength() -> f64 {
    0.15
}
fn default_torquetilt_angle_limit() -> f64 {
    10.0
}
fn default_torquetilt_start_current() -> f64 {
    4.0
}
fn default_torquetilt_speed() -> f64 {
    7.0
}
fn default_turntilt_strength() -> f64 {
    1.0
}
fn default_turntilt_angle_limit() -> f64 {
    4.0
}
fn default_turntilt_start_angle() -> f64 {
    3.0
}
fn default_turntilt_start_erpm() -> f64 {
    250.0
}
fn default_turntilt_speed() -> f64 {
    4.0
}
fn default_turntilt_erpm_boost() -> f64 {
    50.0
}
fn default_turntilt_erpm_boost_end() -> f64 {
    4000.0
}
fn default_turntilt_yaw_aggregate_target() -> f64 {
    700.0
}
fn default_tiltback_variable() -> f64 {
    0.0
}
fn default_tiltback_variable_max() -> f64 {
    4.0
}
fn default_tiltback_variable_max_erpm() -> f64 {
    4000.0
}
fn default_tiltback_constant() -> f64 {
    0.0
}
fn default_tiltback_constant_erpm() -> f64 {
    400.0
}
fn default_noseangling_speed() -> f64 {
    5.0
}
fn default_kp() -> f64 {
    9.0
}
fn default_ki() -> f64 {
    0.0
}
fn default_kd() -> f64 {
    0.6
}
fn default_kd_filter_hz() -> f64 {
    10.0
}
fn default_brake_current() -> f64 {
    3.0
}
fn default_integral_tt_impact_downhill_pct() -> f64 {
    60.0
}
fn default_integral_tt_impact_uphill_pct() -> f64 {
    100.0
}
fn default_ttt_brake_ratio_raw() -> f64 {
    11.0
}
fn default_center_boost_angle() -> f64 {
    10.0
}
fn default_center_boost_kp_adder() -> f64 {
    0.0
}
fn default_tt_pid_intensity() -> f64 {
    1.0
}
fn default_accel_boost_threshold() -> f64 {
    15.0
}
fn default_accel_boost_threshold2() -> f64 {
    25.0
}
fn default_accel_boost_intensity() -> f64 {
    0.0
}
fn default_center_jerk_duration_ms() -> f64 {
    0.0
}
fn default_center_jerk_strength() -> f64 {
    0.0
}
fn default_yaw_aggregate_target() -> f64 {
    700.0
}
fn default_downhill_strength_pct() -> f64 {
    100.0
}
fn default_accel_factor() -> f64 {
    55.0
}
fn default_inactivity_timeout_s() -> f64 {
    0.0
}
fn default_multi_esc() -> bool {
    false
}
fn default_nrf_channel() -> u8 {
    0
}
fn default_nrf_retry_delay_us() -> u32 {
    0
}
fn default_nrf_retries() -> u8 {
    0
}
fn default_roll_steer_kp() -> f64 {
    15.04
}

/// Top-level balance-core configuration, loaded from TOML.
///
/// Several slots are deliberately overloaded for backward-compatible wire
/// format — decoded helpers (e.g. [`BoardConfig::startup_mode`],
/// [`BoardConfig::forbid_high_speed_full_switch_fault`]) are provided instead
/// of separate fields so the raw TOML shape matches the original firmware's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Control loop sample rate, Hz (typical 832 or 1000).
    #[serde(default = "default_hz")]
    pub hz: f64,

    // ── Startup / ride-gate thresholds ──
    #[serde(default = "default_startup_pitch_tolerance")]
    pub startup_pitch_tolerance: f64,
    #[serde(default = "default_startup_roll_tolerance")]
    pub startup_roll_tolerance: f64,
    /// Fractional part repurposed; see [`StartupMode`].
    #[serde(default)]
    pub startup_speed: f64,

    // ── Switch / pad thresholds ──
    #[serde(default = "default_half_erpm")]
    pub half_erpm: f64,
    #[serde(default = "default_fault_adc_half_erpm")]
    pub fault_adc_half_erpm: f64,
    #[serde(default = "default_fault_adc1")]
    pub fault_adc1: f64,
    #[serde(default = "default_fault_adc2")]
    pub fault_adc2: f64,

    // ── Fault thresholds & debounce delays ──
    #[serde(default = "default_fault_pitch")]
    pub fault_pitch: f64,
    #[serde(default = "default_fault_roll")]
    pub fault_roll: f64,
    #[serde(default = "default_fault_duty")]
    pub fault_duty: f64,
    #[serde(default = "default_fault_delay_pitch_ms")]
    pub fault_delay_pitch_ms: u32,
    #[serde(default = "default_fault_delay_roll_ms")]
    pub fault_delay_roll_ms: u32,
    #[serde(default = "default_fault_delay_switch_half_ms")]
    pub fault_delay_switch_half_ms: u32,
    /// `mod 10 == 1` forbids high-speed full-switch faults.
    #[serde(default = "default_fault_delay_switch_full_ms")]
    pub fault_delay_switch_full_ms: u32,
    #[serde(default = "default_fault_delay_duty_ms")]
    pub fault_delay_duty_ms: u32,
    /// Reverse-stop tolerance, accumulated eRPM.
    #[serde(default = "default_reverse_tolerance")]
    pub reverse_tolerance: f64,

    // ── Duty/HV/LV tiltback ──
    #[serde(default = "default_tiltback_duty")]
    pub tiltback_duty: f64,
    #[serde(default = "default_tiltback_duty_angle")]
    pub tiltback_duty_angle: f64,
    #[serde(default = "default_tiltback_duty_speed")]
    pub tiltback_duty_speed: f64,
    #[serde(default = "default_tiltback_hv")]
    pub tiltback_hv: f64,
    #[serde(default = "default_tiltback_hv_angle")]
    pub tiltback_hv_angle: f64,
    #[serde(default = "default_tiltback_hv_speed")]
    pub tiltback_hv_speed: f64,
    #[serde(default = "default_tiltback_lv")]
    pub tiltback_lv: f64,
    #[serde(default = "default_tiltback_lv_angle")]
    pub tiltback_lv_angle: f64,
    #[serde(default = "default_tiltback_lv_speed")]
    pub tiltback_lv_speed: f64,
    #[serde(default = "default_tiltback_return_speed")]
    pub tiltback_return_speed: f64,

    // ── Centering / reverse-stop step sizes ──
    #[serde(default = "default_centering_speed")]
    pub centering_speed: f64,
    #[serde(default = "default_reversestop_speed")]
    pub reversestop_speed: f64,

    // ── Nose-angle bias ──
    #[serde(default = "default_tiltback_variable")]
    pub tiltback_variable: f64,
    #[serde(default = "default_tiltback_variable_max")]
    pub tiltback_variable_max: f64,
    #[serde(default = "default_tiltback_variable_max_erpm")]
    pub tiltback_variable_max_erpm: f64,
    #[serde(default = "default_tiltback_constant")]
    pub tiltback_constant: f64,
    #[serde(default = "default_tiltback_constant_erpm")]
    pub tiltback_constant_erpm: f64,
    #[serde(default = "default_noseangling_speed")]
    pub noseangling_speed: f64,

    // ── ATR / torque tilt ──
    #[serde(default = "default_torquetilt_strength")]
    pub torquetilt_strength: f64,
    #[serde(default = "default_torquetilt_angle_limit")]
    pub torquetilt_angle_limit: f64,
    #[serde(default = "default_torquetilt_start_current")]
    pub torquetilt_start_current: f64,
    #[serde(default = "default_torquetilt_speed")]
    pub torquetilt_speed: f64,
    /// Repurposed from `yaw_kd`: linear accel-factor below 25A;
    /// ×1.3 is used above 25A.
    #[serde(default = "default_accel_factor")]
    pub accel_factor: f64,
    /// Repurposed from `yaw_kp`: downhill strength multiplier, %.
    #[serde(default = "default_downhill_strength_pct")]
    pub downhill_strength_pct: f64,

    // ── Turn tilt ──
    #[serde(default = "default_turntilt_strength")]
    pub turntilt_strength: f64,
    #[serde(default = "default_turntilt_angle_limit")]
    pub turntilt_angle_limit: f64,
    #[serde(default = "default_turntilt_start_angle")]
    pub turntilt_start_angle: f64,
    #[serde(default = "default_turntilt_start_erpm")]
    pub turntilt_start_erpm: f64,
    #[serde(default = "default_turntilt_speed")]
    pub turntilt_speed: f64,
    #[serde(default = "default_turntilt_erpm_boost")]
    pub turntilt_erpm_boost: f64,
    #[serde(default = "default_turntilt_erpm_boost_end")]
    pub turntilt_erpm_boost_end: f64,
    /// Repurposed from `yaw_ki`: yaw-aggregate boost target.
    #[serde(default = "default_turntilt_yaw_aggregate_target")]
    pub turntilt_yaw_aggregate_target: f64,

    // ── PID core ──
    #[serde(default = "default_kp")]
    pub kp: f64,
    #[serde(default = "default_ki")]
    pub ki: f64,
    #[serde(default = "default_kd")]
    pub kd: f64,
    /// D-term lowpass cutoff, Hz, clamped to `[1, 30]`.
    #[serde(default = "default_kd_filter_hz")]
    pub kd_filter_hz: f64,
    #[serde(default = "default_brake_current")]
    pub brake_current: f64,
    /// Repurposed from `kd_biquad_lowpass`: `1 - val/100` is the downhill
    /// integral-TT impact.
    #[serde(default = "default_integral_tt_impact_downhill_pct")]
    pub integral_tt_impact_downhill_pct: f64,
    /// Repurposed from `kd_biquad_highpass`: `1 - val/100` is the uphill
    /// integral-TT impact.
    #[serde(default = "default_integral_tt_impact_uphill_pct")]
    pub integral_tt_impact_uphill_pct: f64,
    /// Repurposed from `kd_pt1_highpass_frequency`, clamped `1..20`, mapped
    /// to `ttt_brake_ratio = (21 - v) / 4`.
    #[serde(default = "default_ttt_brake_ratio_raw")]
    pub ttt_brake_ratio_raw: f64,

    // ── Adaptive gain / center boost ──
    /// Repurposed from `booster_angle`.
    #[serde(default = "default_center_boost_angle")]
    pub center_boost_angle: f64,
    /// Repurposed from `booster_ramp`.
    #[serde(default = "default_center_boost_kp_adder")]
    pub center_boost_kp_adder: f64,
    /// Repurposed from `booster_current`.
    #[serde(default = "default_tt_pid_intensity")]
    pub tt_pid_intensity: f64,
    #[serde(default = "default_accel_boost_threshold")]
    pub accel_boost_threshold: f64,
    #[serde(default = "default_accel_boost_threshold2")]
    pub accel_boost_threshold2: f64,
    #[serde(default = "default_accel_boost_intensity")]
    pub accel_boost_intensity: f64,
    /// Repurposed from `roll_steer_erpm_kp`.
    #[serde(default = "default_center_jerk_duration_ms")]
    pub center_jerk_duration_ms: f64,
    /// Repurposed from `yaw_current_clamp`.
    #[serde(default = "default_center_jerk_strength")]
    pub center_jerk_strength: f64,

    // ── Inactivity / lock ──
    #[serde(default = "default_inactivity_timeout_s")]
    pub inactivity_timeout_s: f64,
    /// Repurposed: persistent `is_locked` flag storage.
    #[serde(default = "default_multi_esc")]
    pub multi_esc: bool,
    /// `nrf_conf.channel == 99` permits lock persistence.
    #[serde(default = "default_nrf_channel")]
    pub nrf_channel: u8,
    #[serde(default = "default_nrf_retry_delay_us")]
    pub nrf_retry_delay_us: u32,
    #[serde(default = "default_nrf_retries")]
    pub nrf_retries: u8,

    /// Repurposed: integer part is `max_brake_amps`, fractional part ×100
    /// is `max_derivative`.
    #[serde(default = "default_roll_steer_kp")]
    pub roll_steer_kp: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        // Every field has a `default_*` fn; deserializing `{}` reproduces it.
        toml::from_str("").expect("BoardConfig defaults must parse")
    }
}

impl BoardConfig {
    /// Decode `startup_speed`'s repurposed fractional part.
    pub fn startup_mode(&self) -> StartupMode {
        StartupMode::from_startup_speed(self.startup_speed)
    }

    /// `fault_delay_switch_full_ms mod 10 == 1` forbids high-speed
    /// full-switch faults.
    pub fn forbid_high_speed_full_switch_fault(&self) -> bool {
        self.fault_delay_switch_full_ms % 10 == 1
    }

    /// `nrf_conf.channel == 99` permits persisting the lock flag.
    pub fn lock_persistence_allowed(&self) -> bool {
        self.nrf_channel == crate::consts::LOCK_PERSIST_MAGIC_CHANNEL
    }

    /// `retry_delay == 3750us` and `retries == 13` enable the boost-threshold
    /// override. `address[0..2]` is not modeled here; this returns whether
    /// the override is *armed*.
    pub fn boost_threshold_override_armed(&self) -> bool {
        self.nrf_retry_delay_us == 3750 && self.nrf_retries == 13
    }

    /// Decode `roll_steer_kp`'s repurposed integer/fractional split.
    pub fn max_brake_amps(&self) -> f64 {
        self.roll_steer_kp.trunc()
    }

    /// Decode `roll_steer_kp`'s repurposed fractional split.
    pub fn max_derivative(&self) -> f64 {
        (self.roll_steer_kp.fract() * 100.0).round()
    }

    /// `ttt_brake_ratio`, clamped `1..20`, mapped `(21 - v) / 4`.
    pub fn ttt_brake_ratio(&self) -> f64 {
        let v = self.ttt_brake_ratio_raw.clamp(1.0, 20.0);
        (21.0 - v) / 4.0
    }

    /// `1 - val/100` integral-TT impact, downhill side.
    pub fn integral_tt_impact_downhill(&self) -> f64 {
        1.0 - self.integral_tt_impact_downhill_pct / 100.0
    }

    /// `1 - val/100` integral-TT impact, uphill side.
    pub fn integral_tt_impact_uphill(&self) -> f64 {
        1.0 - self.integral_tt_impact_uphill_pct / 100.0
    }

    /// `accel_factor2` is `accel_factor * 1.3`.
    pub fn accel_factor2(&self) -> f64 {
        self.accel_factor * 1.3
    }

    /// Clamp out-of-range fields at `configure()` time. The guard-default
    /// branches below intentionally reset a few fields to their shipped
    /// default rather than clamp to the nearer bound — that asymmetry
    /// matches the original firmware and is kept rather than "fixed" to a
    /// symmetric clamp.
    pub fn clamp(&mut self) {
        if self.hz <= 0.0 {
            self.hz = default_hz();
        }
        self.kd_filter_hz = self.kd_filter_hz.clamp(1.0, 30.0);
        // shedfactor analogue: torquetilt_strength out of [0, 1] resets to
        // the shipped default rather than clamping to the nearer bound.
        if !(0.0..=1.0).contains(&self.torquetilt_strength) {
            self.torquetilt_strength = default_torquetilt_strength();
        }
        // center_boost_kp_adder analogue: negative values are nonsensical
        // and reset to 0 rather than clamp.
        if self.center_boost_kp_adder < 0.0 {
            self.center_boost_kp_adder = 0.0;
        }
        // tt_strength_uphill analogue: tt_pid_intensity out of [0, 2]
        // resets to the shipped default.
        if !(0.0..=2.0).contains(&self.tt_pid_intensity) {
            self.tt_pid_intensity = default_tt_pid_intensity();
        }
        self.nrf_retries = self.nrf_retries.min(15);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cfg = BoardConfig::default();
        assert_eq!(cfg.hz, 1000.0);
        assert_eq!(cfg.kp, 9.0);
    }

    #[test]
    fn startup_mode_decoding() {
        assert_eq!(
            StartupMode::from_startup_speed(400.1),
            StartupMode {
                reverse_stop: true,
                stealth_start: false
            }
        );
        assert_eq!(
            StartupMode::from_startup_speed(400.2),
            StartupMode {
                reverse_stop: false,
                stealth_start: true
            }
        );
        assert_eq!(
            StartupMode::from_startup_speed(400.3),
            StartupMode {
                reverse_stop: true,
                stealth_start: true
            }
        );
        assert_eq!(
            StartupMode::from_startup_speed(400.0),
            StartupMode {
                reverse_stop: false,
                stealth_start: false
            }
        );
    }

    #[test]
    fn roll_steer_kp_repurposing() {
        let mut cfg = BoardConfig::default();
        cfg.roll_steer_kp = 15.04;
        assert_eq!(cfg.max_brake_amps(), 15.0);
        assert_eq!(cfg.max_derivative(), 4.0);
    }

    #[test]
    fn ttt_brake_ratio_clamped_and_mapped() {
        let mut cfg = BoardConfig::default();
        cfg.ttt_brake_ratio_raw = 100.0;
        assert_eq!(cfg.ttt_brake_ratio(), (21.0 - 20.0) / 4.0);
        cfg.ttt_brake_ratio_raw = -5.0;
        assert_eq!(cfg.ttt_brake_ratio(), (21.0 - 1.0) / 4.0);
    }

    #[test]
    fn forbid_high_speed_full_switch_fault_flag() {
        let mut cfg = BoardConfig::default();
        cfg.fault_delay_switch_full_ms = 201;
        assert!(cfg.forbid_high_speed_full_switch_fault());
        cfg.fault_delay_switch_full_ms = 200;
        assert!(!cfg.forbid_high_speed_full_switch_fault());
    }

    #[test]
    fn lock_persistence_magic_channel() {
        let mut cfg = BoardConfig::default();
        cfg.nrf_channel = 99;
        assert!(cfg.lock_persistence_allowed());
        cfg.nrf_channel = 5;
        assert!(!cfg.lock_persistence_allowed());
    }

    #[test]
    fn clamp_resets_out_of_range_torquetilt_strength() {
        let mut cfg = BoardConfig::default();
        cfg.torquetilt_strength = 5.0;
        cfg.clamp();
        assert_eq!(cfg.torquetilt_strength, default_torquetilt_strength());
    }

    #[test]
    fn clamp_keeps_in_range_torquetilt_strength() {
        let mut cfg = BoardConfig::default();
        cfg.torquetilt_strength = 0.3;
        cfg.clamp();
        assert_eq!(cfg.torquetilt_strength, 0.3);
    }
}
