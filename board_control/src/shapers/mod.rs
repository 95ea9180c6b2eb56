//! Setpoint shapers.
//!
//! Three independent shapers — nose-angling bias, Adaptive Torque Response,
//! and turn tilt — each contribute an additive pitch offset on top of the
//! director's `setpoint_target_interp`. Bundled here so the cycle runner
//! only has to own and reset one struct.

pub mod atr;
pub mod nose;
pub mod turn;

use board_common::config::BoardConfig;

use crate::inputs::Samples;

/// Everything the PID core needs from this tick's shapers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaperOutput {
    pub noseangling_interp: f64,
    pub torquetilt_interp: f64,
    pub torquetilt_target: f64,
    pub turntilt_interp: f64,
    pub setpoint: f64,
    /// True when ATR interference scaled turn tilt's target to zero this
    /// tick — the caller must reset the input sampler's `yaw_aggregate`
    /// in response.
    pub reset_yaw_aggregate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Shapers {
    pub nose: nose::NoseAngling,
    pub atr: atr::Atr,
    pub turn: turn::TurnTilt,
}

impl Shapers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.nose.reset();
        self.atr.reset();
        self.turn.reset();
    }

    /// Run all three shapers for one tick. `setpoint_target_interp` comes
    /// from [`crate::director::SetpointDirector`]; `running` gates turn
    /// tilt, which only runs in RUNNING.
    pub fn tick(
        &mut self,
        samples: &Samples,
        cfg: &BoardConfig,
        setpoint_target_interp: f64,
        running: bool,
    ) -> ShaperOutput {
        let noseangling_interp = self.nose.tick(samples, cfg);

        let setpoint_before_atr = setpoint_target_interp + noseangling_interp;
        let proportional = setpoint_before_atr - samples.pitch;
        let braking =
            samples.motor_current != 0.0 && samples.motor_current.signum() != samples.erpm.signum();

        // Turn tilt's cutback detector is a pure function of this tick's
        // samples (no ATR dependency), so it can be computed once, ahead
        // of ATR, even though ATR's cutback override needs it and turn
        // tilt's own ATR-interference needs ATR's target in return.
        let abs_yaw_scaled = 100.0 * samples.yaw_change.abs();
        let cutback = turn::detect_cutback(samples, abs_yaw_scaled);

        let atr_out = self.atr.tick(
            samples,
            cfg,
            setpoint_before_atr,
            proportional,
            braking,
            cutback,
        );
        let turn_out = self
            .turn
            .tick(samples, cfg, atr_out.target, noseangling_interp, running);

        let setpoint =
            setpoint_target_interp + noseangling_interp + atr_out.interp + turn_out.interp;

        ShaperOutput {
            noseangling_interp,
            torquetilt_interp: atr_out.interp,
            torquetilt_target: atr_out.target,
            turntilt_interp: turn_out.interp,
            setpoint,
            reset_yaw_aggregate: turn_out.reset_yaw_aggregate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_combines_all_three_shapers() {
        let cfg = BoardConfig::default();
        let mut shapers = Shapers::new();
        let samples = Samples::default();
        let out = shapers.tick(&samples, &cfg, 0.0, true);
        assert_eq!(
            out.setpoint,
            out.noseangling_interp + out.torquetilt_interp + out.turntilt_interp
        );
    }

    #[test]
    fn reset_clears_all_interpolants() {
        let cfg = BoardConfig::default();
        let mut shapers = Shapers::new();
        let samples = Samples {
            erpm: 3000.0,
            abs_erpm: 3000.0,
            motor_current: 30.0,
            ..Default::default()
        };
        for _ in 0..200 {
            shapers.tick(&samples, &cfg, 0.0, true);
        }
        shapers.reset();
        assert_eq!(shapers.nose.interp(), 0.0);
        assert_eq!(shapers.turn.interp(), 0.0);
    }
}
