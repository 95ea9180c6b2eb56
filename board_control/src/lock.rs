//! Lock gesture recognizer.
//!
//! Tracks a 9-step foot-pad sequence — **pad ON → OFF → adc1 → OFF → adc2 →
//! OFF → adc1 → OFF → adc2** — that toggles a persistent ride-disable flag.
//! Any pad event that doesn't match the next expected step in the sequence
//! resets progress to the floor (`step == -1`); reaching the final step
//! toggles the flag and reports a beep pattern for the caller to play and a
//! persistence request for the caller to apply, gated by the host's
//! channel-99 NRF configuration. Uses the same hold-off/debounce idiom as
//! [`crate::faults`], keyed off a classified pad event instead of a single
//! boolean predicate.

use board_common::config::BoardConfig;
use board_common::consts::{LOCK_GESTURE_DEBOUNCE_MS, LOCK_GESTURE_STEPS};
use board_common::ports::PadAdc;
use board_common::state::BeepToken;

/// A classified pad state, distinguishing which single pad is pressed —
/// `SwitchState` collapses that distinction into `Half`, so the gesture
/// reads the ADCs directly instead of going through `derive_switch_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PadEvent {
    Off,
    Adc1Only,
    Adc2Only,
    On,
}

/// Index `i` is the event required to advance from step `i - 1` to step `i`
/// (index 0 covers the `-1 -> 0` transition out of the floor state).
const EXPECTED: [PadEvent; 9] = [
    PadEvent::On,
    PadEvent::Off,
    PadEvent::Adc1Only,
    PadEvent::Off,
    PadEvent::Adc2Only,
    PadEvent::Off,
    PadEvent::Adc1Only,
    PadEvent::Off,
    PadEvent::Adc2Only,
];

/// What happened this tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockOutput {
    /// `Some(new_state)` on the tick the gesture completes.
    pub toggled: Option<bool>,
    pub beep: Option<BeepToken>,
}

#[derive(Debug, Clone)]
pub struct LockRecognizer {
    step: i8,
    is_locked: bool,
    current_event: Option<PadEvent>,
    hold_ms: f64,
    committed: bool,
}

impl LockRecognizer {
    /// `multi_esc` repurposes the persistent `is_locked` flag.
    pub fn new(cfg: &BoardConfig) -> Self {
        Self {
            step: -1,
            is_locked: cfg.multi_esc,
            current_event: None,
            hold_ms: 0.0,
            committed: false,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// Advance the gesture recognizer by one tick.
    pub fn tick(&mut self, pads: &dyn PadAdc, cfg: &BoardConfig, dt_ms: f64) -> LockOutput {
        let event = classify(pads, cfg);

        if self.current_event == Some(event) {
            self.hold_ms += dt_ms;
        } else {
            self.current_event = Some(event);
            self.hold_ms = 0.0;
            self.committed = false;
        }

        if self.committed || self.hold_ms < LOCK_GESTURE_DEBOUNCE_MS as f64 {
            return LockOutput::default();
        }
        self.committed = true;

        let idx = (self.step + 1) as usize;
        if event == EXPECTED[idx] {
            self.step += 1;
            if self.step == LOCK_GESTURE_STEPS {
                self.step = -1;
                self.is_locked = !self.is_locked;
                let beep = if self.is_locked {
                    BeepToken::Alert {
                        count: 2,
                        long: true,
                    }
                } else {
                    BeepToken::Alert {
                        count: 3,
                        long: false,
                    }
                };
                return LockOutput {
                    toggled: Some(self.is_locked),
                    beep: Some(beep),
                };
            }
        } else if self.step != -1 {
            self.step = -1;
        }

        LockOutput::default()
    }
}

fn classify(pads: &dyn PadAdc, cfg: &BoardConfig) -> PadEvent {
    let p1_enabled = cfg.fault_adc1 > 0.0;
    let p2_enabled = cfg.fault_adc2 > 0.0;
    let p1 = p1_enabled && pads.pad1_voltage() < cfg.fault_adc1;
    let p2 = p2_enabled && pads.pad2_voltage() < cfg.fault_adc2;
    match (p1, p2) {
        (true, true) => PadEvent::On,
        (true, false) => PadEvent::Adc1Only,
        (false, true) => PadEvent::Adc2Only,
        (false, false) => PadEvent::Off,
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

    fn cfg() -> BoardConfig {
        BoardConfig {
            fault_adc1: 2.0,
            fault_adc2: 2.0,
            ..BoardConfig::default()
        }
    }

    const PRESSED: f64 = 0.5;
    const RELEASED: f64 = 3.3;

    fn drive(lock: &mut LockRecognizer, cfg: &BoardConfig, v1: f64, v2: f64) -> LockOutput {
        let pads = StubPads { v1, v2 };
        let mut last = LockOutput::default();
        // A few ticks at >= debounce spacing so the plateau is recognized
        // exactly once.
        for i in 0..3 {
            let dt = if i == 0 {
                LOCK_GESTURE_DEBOUNCE_MS as f64 + 1.0
            } else {
                0.0
            };
            last = lock.tick(&pads, cfg, dt);
        }
        last
    }

    #[test]
    fn canonical_sequence_toggles_lock_once() {
        let cfg = cfg();
        let mut lock = LockRecognizer::new(&cfg);
        assert!(!lock.is_locked());

        drive(&mut lock, &cfg, PRESSED, PRESSED); // ON
        drive(&mut lock, &cfg, RELEASED, RELEASED); // OFF
        drive(&mut lock, &cfg, PRESSED, RELEASED); // adc1
        drive(&mut lock, &cfg, RELEASED, RELEASED); // OFF
        drive(&mut lock, &cfg, RELEASED, PRESSED); // adc2
        drive(&mut lock, &cfg, RELEASED, RELEASED); // OFF
        drive(&mut lock, &cfg, PRESSED, RELEASED); // adc1
        drive(&mut lock, &cfg, RELEASED, RELEASED); // OFF
        let out = drive(&mut lock, &cfg, RELEASED, PRESSED); // adc2 -> complete

        assert_eq!(out.toggled, Some(true));
        assert!(lock.is_locked());
        assert_eq!(
            out.beep,
            Some(BeepToken::Alert {
                count: 2,
                long: true
            })
        );
    }

    #[test]
    fn deviating_event_resets_to_floor() {
        let cfg = cfg();
        let mut lock = LockRecognizer::new(&cfg);

        drive(&mut lock, &cfg, PRESSED, PRESSED); // ON -> step 0
        drive(&mut lock, &cfg, RELEASED, RELEASED); // OFF -> step 1
        // Wrong: ON again instead of adc1-only. Must reset to -1, so the
        // rest of the canonical sequence (minus the initial ON) fails to
        // complete it.
        drive(&mut lock, &cfg, PRESSED, PRESSED);
        drive(&mut lock, &cfg, RELEASED, RELEASED);
        drive(&mut lock, &cfg, PRESSED, RELEASED);
        drive(&mut lock, &cfg, RELEASED, RELEASED);
        drive(&mut lock, &cfg, RELEASED, PRESSED);
        drive(&mut lock, &cfg, RELEASED, RELEASED);
        let out = drive(&mut lock, &cfg, RELEASED, PRESSED);

        assert_eq!(out.toggled, None);
        assert!(!lock.is_locked());
    }
}
