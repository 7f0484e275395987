//! Drives a chip and the model with the same events.

use crate::harness::bus::PitBus;
use crate::harness::compare::{Checker, Divergence, Observation, Tally, Verdict};
use crate::harness::event::Event;
use crate::pit::{PitType, CHANNEL_COUNT};
use tracing::debug;

/// Feeds every event to a bus and to the model, sampling the bus after each
/// one and comparing.
pub struct Lockstep<B: PitBus> {
    checker: Checker,
    bus: B,
}

impl<B: PitBus> Lockstep<B> {
    /// Watch every channel's output.
    pub fn new(pit_type: PitType, bus: B) -> Self {
        Self::watching(pit_type, bus, [true; CHANNEL_COUNT])
    }

    /// Watch only the given channels' outputs.
    pub fn watching(pit_type: PitType, bus: B, watched: [bool; CHANNEL_COUNT]) -> Self {
        Self {
            checker: Checker::watching(pit_type, watched),
            bus,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    /// Run one event on both sides.
    ///
    /// # Panics
    ///
    /// Panics if the event addresses a channel above 2.
    pub fn step(&mut self, event: &Event) -> Result<(Verdict, Observation), Divergence> {
        let byte = event.apply(&mut self.bus);
        let mut outputs = [None; CHANNEL_COUNT];
        for (c, out) in outputs.iter_mut().enumerate() {
            if self.checker.is_watched(c) {
                *out = Some(self.bus.output(c));
            }
        }
        let observed = Observation { byte, outputs };
        let verdict = self.checker.check(event, &observed)?;
        Ok((verdict, observed))
    }

    /// Run events until the first divergence.
    pub fn run<'a, I>(&mut self, events: I) -> Result<Tally, Divergence>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        for event in events {
            self.step(event)?;
        }
        let tally = self.checker.tally();
        debug!(matched = tally.matched, inconclusive = tally.inconclusive, "lockstep finished");
        Ok(tally)
    }
}
