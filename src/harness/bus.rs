//! The logical bus a timer is driven through.
//!
//! A real chip sits behind a driver that turns each call into one physical
//! transaction. The model implements the same trait, so the harness can
//! drive either one, or both side by side.

use crate::pit::Pit;

/// One logical operation per physical transaction, in program order.
pub trait PitBus {
    /// Write a byte to the control register.
    fn write_command(&mut self, byte: u8);

    /// Write a byte to a channel's data port.
    fn write_data(&mut self, channel: usize, byte: u8);

    /// Read a byte from a channel's data port.
    fn read_data(&mut self, channel: usize) -> u8;

    /// Drive a gate input.
    fn set_gate(&mut self, channel: usize, level: bool);

    /// Pulse the clock once.
    fn clock(&mut self);

    /// Sample an output pin.
    fn output(&mut self, channel: usize) -> bool;

    /// Return the chip to its power-on state.
    fn reset(&mut self);
}

impl PitBus for Pit {
    fn write_command(&mut self, byte: u8) {
        self.set_mode_byte(byte);
    }

    fn write_data(&mut self, channel: usize, byte: u8) {
        Pit::write_data(self, channel, byte);
    }

    fn read_data(&mut self, channel: usize) -> u8 {
        Pit::read_data(self, channel)
    }

    fn set_gate(&mut self, channel: usize, level: bool) {
        Pit::set_gate(self, channel, level);
    }

    fn clock(&mut self) {
        self.tick();
    }

    fn output(&mut self, channel: usize) -> bool {
        Pit::output(self, channel)
    }

    fn reset(&mut self) {
        Pit::reset(self);
    }
}
