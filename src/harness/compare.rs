//! Model-versus-silicon comparison.
//!
//! After every event the model's read byte and output levels are compared
//! with what was observed on the real chip. A mismatch on a channel whose
//! count is undefined is expected and only counted. Any other mismatch is a
//! [`Divergence`].

use crate::harness::event::Event;
use crate::pit::{Pit, PitType, CHANNEL_COUNT};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::warn;

/// Values sampled after one event.
///
/// `None` means the value was not sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte: Option<u8>,
    #[serde(default)]
    pub outputs: [Option<bool>; CHANNEL_COUNT],
}

impl Observation {
    pub fn is_empty(&self) -> bool {
        self.byte.is_none() && self.outputs.iter().all(Option::is_none)
    }
}

/// Outcome of a comparison that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Everything sampled agreed with the model.
    Match,
    /// Something disagreed, but only on a channel with an undefined count.
    Inconclusive,
}

/// A mismatch the model cannot explain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Divergence {
    #[error("step {step}: channel {channel} output is {observed}, model says {model}")]
    Output {
        step: usize,
        channel: usize,
        model: bool,
        observed: bool,
    },

    #[error("step {step}: channel {channel} read {observed:#04X}, model says {model:#04X}")]
    Data {
        step: usize,
        channel: usize,
        model: u8,
        observed: u8,
    },
}

impl Divergence {
    pub fn step(&self) -> usize {
        match *self {
            Divergence::Output { step, .. } | Divergence::Data { step, .. } => step,
        }
    }
}

/// Running totals for a comparison session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub matched: usize,
    pub inconclusive: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.matched + self.inconclusive
    }

    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Match => self.matched += 1,
            Verdict::Inconclusive => self.inconclusive += 1,
        }
    }
}

/// Runs the model alongside observed values and judges each step.
#[derive(Debug, Clone)]
pub struct Checker {
    model: Pit,
    watched: [bool; CHANNEL_COUNT],
    step: usize,
    tally: Tally,
}

impl Checker {
    /// A checker that samples every channel's output.
    pub fn new(pit_type: PitType) -> Self {
        Self::watching(pit_type, [true; CHANNEL_COUNT])
    }

    /// A checker that samples only the given channels' outputs.
    pub fn watching(pit_type: PitType, watched: [bool; CHANNEL_COUNT]) -> Self {
        Self {
            model: Pit::new(pit_type),
            watched,
            step: 0,
            tally: Tally::default(),
        }
    }

    pub fn model(&self) -> &Pit {
        &self.model
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn is_watched(&self, channel: usize) -> bool {
        self.watched.get(channel).copied().unwrap_or(false)
    }

    /// Index of the next step.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Apply an event to the model and sample it.
    ///
    /// Returns what the model produced, with outputs for watched channels.
    pub fn advance(&mut self, event: &Event) -> Observation {
        let byte = event.apply(&mut self.model);
        let mut outputs = [None; CHANNEL_COUNT];
        for (c, out) in outputs.iter_mut().enumerate() {
            if self.watched[c] {
                *out = Some(self.model.output(c));
            }
        }
        self.step += 1;
        Observation { byte, outputs }
    }

    /// Apply an event to the model and compare against what the chip did.
    ///
    /// Only values present in `observed` are compared.
    pub fn check(&mut self, event: &Event, observed: &Observation) -> Result<Verdict, Divergence> {
        let step = self.step;
        let model = self.advance(event);
        let mut verdict = Verdict::Match;

        if let (Some(model_byte), Some(observed_byte), Some(channel)) =
            (model.byte, observed.byte, event.channel())
        {
            if model_byte != observed_byte {
                if !self.model.is_count_undefined(channel) {
                    return Err(Divergence::Data {
                        step,
                        channel,
                        model: model_byte,
                        observed: observed_byte,
                    });
                }
                warn!(
                    step,
                    channel,
                    model_byte,
                    observed_byte,
                    "read differs while count undefined"
                );
                verdict = Verdict::Inconclusive;
            }
        }

        for channel in 0..CHANNEL_COUNT {
            let (Some(model_out), Some(observed_out)) =
                (model.outputs[channel], observed.outputs[channel])
            else {
                continue;
            };
            if model_out == observed_out {
                continue;
            }
            if !self.model.is_count_undefined(channel) {
                return Err(Divergence::Output {
                    step,
                    channel,
                    model: model_out,
                    observed: observed_out,
                });
            }
            warn!(step, channel, model_out, observed_out, "output differs while count undefined");
            verdict = Verdict::Inconclusive;
        }

        self.tally.record(verdict);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(levels: [bool; 3]) -> Observation {
        Observation {
            byte: None,
            outputs: levels.map(Some),
        }
    }

    #[test]
    fn test_matching_steps() {
        let mut checker = Checker::new(PitType::Model8254);
        let verdict = checker
            .check(&Event::Command { byte: 0b10_01_010_0 }, &outputs([false, false, true]))
            .unwrap();
        assert_eq!(verdict, Verdict::Match);
        assert_eq!(checker.tally().matched, 1);
        assert_eq!(checker.step(), 1);
    }

    #[test]
    fn test_output_mismatch_is_divergence() {
        let mut checker = Checker::new(PitType::Model8254);
        let err = checker
            .check(&Event::Command { byte: 0b00_01_000_0 }, &outputs([true, false, false]))
            .unwrap_err();
        assert_eq!(
            err,
            Divergence::Output { step: 0, channel: 0, model: false, observed: true }
        );
    }

    #[test]
    fn test_data_mismatch_is_divergence() {
        let mut checker = Checker::watching(PitType::Model8253, [false; 3]);
        for ev in [
            Event::Command { byte: 0b01_01_000_0 },
            Event::Write { channel: 1, byte: 0x40 },
            Event::Tick { count: 1 },
        ] {
            checker.check(&ev, &Observation::default()).unwrap();
        }

        let observed = Observation { byte: Some(0x41), ..Default::default() };
        let err = checker.check(&Event::Read { channel: 1 }, &observed).unwrap_err();
        assert_eq!(err, Divergence::Data { step: 3, channel: 1, model: 0x40, observed: 0x41 });
        assert_eq!(err.step(), 3);
    }

    #[test]
    fn test_undefined_window_is_inconclusive() {
        let mut checker = Checker::watching(PitType::Model8254, [false, false, true]);
        for ev in [
            Event::Command { byte: 0b10_01_101_0 },
            Event::Write { channel: 2, byte: 0x80 },
            Event::Tick { count: 1 },
        ] {
            checker.check(&ev, &Observation::default()).unwrap();
        }
        assert!(checker.model().is_count_undefined(2));

        let observed = Observation { byte: Some(0x7F), ..Default::default() };
        let verdict = checker.check(&Event::Read { channel: 2 }, &observed).unwrap();
        assert_eq!(verdict, Verdict::Inconclusive);
        assert_eq!(checker.tally().inconclusive, 1);
    }

    #[test]
    fn test_unsampled_values_are_not_compared() {
        let mut checker = Checker::watching(PitType::Model8254, [true, false, false]);
        let observed = outputs([false, true, true]);
        assert_eq!(checker.check(&Event::Reset, &observed).unwrap(), Verdict::Match);
    }

    #[test]
    fn test_observation_serde_skips_missing_byte() {
        let obs = Observation { byte: None, outputs: [Some(true), None, Some(false)] };
        let json = serde_json::to_string(&obs).unwrap();
        assert_eq!(json, r#"{"outputs":[true,null,false]}"#);
        assert!(!obs.is_empty());
        assert!(Observation::default().is_empty());
    }
}
