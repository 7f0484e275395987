//! Cycle-accurate model of the 8253/8254 programmable interval timer.
//!
//! This module implements the chip as seen from its pins:
//! - three independent 16-bit down-counters with gate inputs and outputs
//! - six counting modes, binary or BCD
//! - the control-word decoder, including the 8254 read-back command

pub mod count;
pub mod mode;
pub mod channel;
pub mod controller;

pub use mode::{AccessMode, Command, PitType, ReadBack, TimerMode, UnknownVariant};
pub use channel::{Channel, CountingState, LoadState, ReadState, UNDEFINED_COUNT};
pub use controller::{Pit, CHANNEL_COUNT};
