//! The three-channel timer chip.
//!
//! Owns the channels, decodes control words and fans the clock out.

use crate::pit::channel::Channel;
use crate::pit::mode::{AccessMode, Command, PitType, ReadBack, TimerMode};
use serde::{Serialize, Deserialize};
use std::fmt;
use tracing::{debug, trace};

/// Number of channels on the chip.
pub const CHANNEL_COUNT: usize = 3;

/// An 8253 or 8254.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pit {
    pit_type: PitType,
    channels: [Channel; CHANNEL_COUNT],
    /// Clock pulses since creation or the last reset.
    ticks: u64,
}

impl Pit {
    /// Create a chip with all channels in their power-on state.
    pub fn new(pit_type: PitType) -> Self {
        Self {
            pit_type,
            channels: [0, 1, 2].map(|i| Channel::new(i, pit_type)),
            ticks: 0,
        }
    }

    /// Reset every channel. Gate levels are kept.
    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.reset();
        }
        self.ticks = 0;
        debug!(pit_type = %self.pit_type, "reset");
    }

    pub fn pit_type(&self) -> PitType {
        self.pit_type
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn channels(&self) -> &[Channel; CHANNEL_COUNT] {
        &self.channels
    }

    /// # Panics
    ///
    /// Panics if `index` is not 0, 1 or 2.
    pub fn channel(&self, index: usize) -> &Channel {
        assert!(index < CHANNEL_COUNT, "channel index {} out of range", index);
        &self.channels[index]
    }

    /// # Panics
    ///
    /// Panics if `index` is not 0, 1 or 2.
    pub fn channel_mut(&mut self, index: usize) -> &mut Channel {
        assert!(index < CHANNEL_COUNT, "channel index {} out of range", index);
        &mut self.channels[index]
    }

    /// Program a channel directly, bypassing the control word.
    pub fn set_mode(&mut self, channel: usize, access: AccessMode, mode: TimerMode, bcd: bool) {
        self.channel_mut(channel).set_mode(access, mode, bcd);
    }

    /// Write a byte to the control register.
    pub fn set_mode_byte(&mut self, byte: u8) {
        let command = Command::decode(byte);
        trace!(byte, ?command, "control word");

        match command {
            Command::SetMode { channel, access, mode, bcd } => {
                self.channels[channel].set_mode(access, mode, bcd);
            }
            Command::Latch { channel } => self.channels[channel].latch(),
            Command::ReadBack(rb) => self.read_back(rb),
        }
    }

    /// Execute a read-back command.
    ///
    /// Status is latched before count so a following read returns the
    /// status byte first. The 8253 has no read-back and ignores the command.
    pub fn read_back(&mut self, rb: ReadBack) {
        if !self.pit_type.has_read_back() {
            debug!(?rb, "read-back ignored on 8253");
            return;
        }

        debug!(?rb, "read-back");
        for c in rb.selected() {
            let ch = &mut self.channels[c];
            if rb.latch_status {
                ch.latch_status();
            }
            if rb.latch_count {
                ch.latch();
            }
        }
    }

    /// Write one byte to a channel's data port.
    pub fn write_data(&mut self, channel: usize, byte: u8) {
        self.channel_mut(channel).send_reload_byte(byte);
    }

    /// Read one byte from a channel's data port.
    pub fn read_data(&mut self, channel: usize) -> u8 {
        self.channel_mut(channel).read_byte()
    }

    /// Drive a channel's gate input.
    pub fn set_gate(&mut self, channel: usize, level: bool) {
        self.channel_mut(channel).set_gate(level);
    }

    /// Latch a channel's count, as the latch control word would.
    pub fn latch(&mut self, channel: usize) {
        self.channel_mut(channel).latch();
    }

    pub fn output(&self, channel: usize) -> bool {
        self.channel(channel).output()
    }

    pub fn is_count_undefined(&self, channel: usize) -> bool {
        self.channel(channel).is_count_undefined()
    }

    /// Clock all three channels once, lowest index first.
    pub fn tick(&mut self) {
        for ch in &mut self.channels {
            ch.tick();
        }
        self.ticks += 1;
    }

    /// Clock `n` times.
    pub fn run(&mut self, n: u32) {
        for _ in 0..n {
            self.tick();
        }
    }
}

impl fmt::Display for Pit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} @ tick {}", self.pit_type, self.ticks)?;
        for ch in &self.channels {
            writeln!(f, "  {}", ch)?;
        }
        Ok(())
    }
}
