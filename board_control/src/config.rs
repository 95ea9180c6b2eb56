//! Configuration loader.
//!
//! Parses TOML into [`BoardConfig`], clamps out-of-range fields, and derives
//! the per-feature step sizes every shaper and the setpoint director need
//! (`speed / hz`). Follows the load → validate → derive pipeline shape
//! used elsewhere in the crate's configuration handling, down to the
//! manual-`Display` `ConfigError` enum and the bundled `LoadedConfig` —
//! simplified here to this core's single "axis": there's no coupling graph
//! or I/O-role validation to perform, only the board's own parameter bounds.

use std::fmt;
use std::fs;
use std::path::Path;

use board_common::config::BoardConfig;

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    /// File I/O error.
    IoError(String),
    /// TOML parse error.
    ParseError(String),
    /// Parameter validation error.
    ValidationError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "config I/O error: {e}"),
            Self::ParseError(e) => write!(f, "config parse error: {e}"),
            Self::ValidationError(e) => write!(f, "config validation: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Per-feature step sizes, all derived as `speed / hz`: the maximum change
/// in the corresponding interpolant per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSizes {
    pub centering: f64,
    pub reversestop: f64,
    pub tiltback_return: f64,
    pub tiltback_duty: f64,
    pub tiltback_hv: f64,
    pub tiltback_lv: f64,
    pub noseangling: f64,
    pub torquetilt: f64,
    pub turntilt: f64,
}

impl StepSizes {
    fn derive(cfg: &BoardConfig) -> Self {
        Self {
            centering: cfg.centering_speed / cfg.hz,
            reversestop: cfg.reversestop_speed / cfg.hz,
            tiltback_return: cfg.tiltback_return_speed / cfg.hz,
            tiltback_duty: cfg.tiltback_duty_speed / cfg.hz,
            tiltback_hv: cfg.tiltback_hv_speed / cfg.hz,
            tiltback_lv: cfg.tiltback_lv_speed / cfg.hz,
            noseangling: cfg.noseangling_speed / cfg.hz,
            torquetilt: cfg.torquetilt_speed / cfg.hz,
            turntilt: cfg.turntilt_speed / cfg.hz,
        }
    }
}

/// Complete validated configuration bundle, ready for the cycle runner.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub board: BoardConfig,
    pub step_sizes: StepSizes,
}

/// Load and validate a [`BoardConfig`] from a TOML file on disk.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    load_config_from_str(&text)
}

/// Load and validate a [`BoardConfig`] from an in-memory TOML string —
/// the path the test suite and `tests/scenarios.rs` exercise, kept separate
/// from [`load_config`] so tests never touch the filesystem.
pub fn load_config_from_str(text: &str) -> Result<LoadedConfig, ConfigError> {
    let mut board: BoardConfig = toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    board.clamp();
    validate(&board)?;
    let step_sizes = StepSizes::derive(&board);
    Ok(LoadedConfig { board, step_sizes })
}

/// Parameter-bounds validation over this core's single set of scalar
/// fields — no coupling graph or per-axis checks to run, just range checks.
fn validate(cfg: &BoardConfig) -> Result<(), ConfigError> {
    if cfg.hz <= 0.0 {
        return Err(ConfigError::ValidationError("hz must be positive".into()));
    }

    let speeds: [(&str, f64); 9] = [
        ("centering_speed", cfg.centering_speed),
        ("reversestop_speed", cfg.reversestop_speed),
        ("tiltback_return_speed", cfg.tiltback_return_speed),
        ("tiltback_duty_speed", cfg.tiltback_duty_speed),
        ("tiltback_hv_speed", cfg.tiltback_hv_speed),
        ("tiltback_lv_speed", cfg.tiltback_lv_speed),
        ("noseangling_speed", cfg.noseangling_speed),
        ("torquetilt_speed", cfg.torquetilt_speed),
        ("turntilt_speed", cfg.turntilt_speed),
    ];
    for (name, value) in speeds {
        if value < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be non-negative, got {value}"
            )));
        }
    }

    if cfg.fault_pitch <= 0.0 || cfg.fault_roll <= 0.0 {
        return Err(ConfigError::ValidationError(
            "fault_pitch and fault_roll must be positive".into(),
        ));
    }

    Ok(())
}
