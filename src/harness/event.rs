//! Logical bus events.

use crate::harness::bus::PitBus;
use serde::{Serialize, Deserialize};
use std::fmt;

fn one() -> u32 {
    1
}

/// A single logical operation on the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Event {
    /// Control-word write.
    Command { byte: u8 },
    /// Data-port write.
    Write { channel: usize, byte: u8 },
    /// Data-port read.
    Read { channel: usize },
    /// Gate level change.
    Gate { channel: usize, level: bool },
    /// One or more clock pulses.
    Tick {
        #[serde(default = "one")]
        count: u32,
    },
    Reset,
}

impl Event {
    /// Apply the event to a bus. Returns the byte for a read.
    pub fn apply<B: PitBus + ?Sized>(&self, bus: &mut B) -> Option<u8> {
        match *self {
            Event::Command { byte } => bus.write_command(byte),
            Event::Write { channel, byte } => bus.write_data(channel, byte),
            Event::Read { channel } => return Some(bus.read_data(channel)),
            Event::Gate { channel, level } => bus.set_gate(channel, level),
            Event::Tick { count } => {
                for _ in 0..count {
                    bus.clock();
                }
            }
            Event::Reset => bus.reset(),
        }
        None
    }

    /// The channel this event addresses, if it addresses one.
    pub fn channel(&self) -> Option<usize> {
        match *self {
            Event::Write { channel, .. }
            | Event::Read { channel }
            | Event::Gate { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// Whether the event names a channel that doesn't exist.
    pub fn is_out_of_range(&self) -> bool {
        self.channel().map_or(false, |c| c >= crate::pit::CHANNEL_COUNT)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Command { byte } => write!(f, "CMD  {:02X}", byte),
            Event::Write { channel, byte } => write!(f, "WR{}  {:02X}", channel, byte),
            Event::Read { channel } => write!(f, "RD{}", channel),
            Event::Gate { channel, level } => {
                write!(f, "GATE{} {}", channel, if *level { "HI" } else { "LO" })
            }
            Event::Tick { count } if *count == 1 => write!(f, "TICK"),
            Event::Tick { count } => write!(f, "TICK x{}", count),
            Event::Reset => write!(f, "RESET"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pit::{Pit, PitType};

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&Event::Write { channel: 2, byte: 0xEF }).unwrap();
        assert_eq!(json, r#"{"op":"write","channel":2,"byte":239}"#);

        let ev: Event = serde_json::from_str(r#"{"op":"tick"}"#).unwrap();
        assert_eq!(ev, Event::Tick { count: 1 });

        let ev: Event = serde_json::from_str(r#"{"op":"reset"}"#).unwrap();
        assert_eq!(ev, Event::Reset);
    }

    #[test]
    fn test_apply_to_model() {
        let mut pit = Pit::new(PitType::Model8254);
        let events = [
            Event::Command { byte: 0b10_11_000_0 },
            Event::Write { channel: 2, byte: 0xEF },
            Event::Write { channel: 2, byte: 0xBE },
            Event::Tick { count: 1 },
        ];
        for ev in &events {
            assert_eq!(ev.apply(&mut pit), None);
        }
        assert_eq!(Event::Read { channel: 2 }.apply(&mut pit), Some(0xEF));
        assert_eq!(Event::Read { channel: 2 }.apply(&mut pit), Some(0xBE));
    }

    #[test]
    fn test_channel_range() {
        assert!(Event::Read { channel: 3 }.is_out_of_range());
        assert!(!Event::Gate { channel: 2, level: true }.is_out_of_range());
        assert!(!Event::Command { byte: 0xFF }.is_out_of_range());
    }

    #[test]
    fn test_display() {
        assert_eq!(Event::Gate { channel: 1, level: true }.to_string(), "GATE1 HI");
        assert_eq!(Event::Tick { count: 4 }.to_string(), "TICK x4");
        assert_eq!(Event::Command { byte: 0x36 }.to_string(), "CMD  36");
    }
}
