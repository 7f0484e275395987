//! Channel configuration and the control-word decoder.
//!
//! Every byte written to the control register is one of three commands:
//!
//! ```text
//!  d7  d6 | d5  d4 | d3 d2 d1 | d0
//!  channel| access |   mode   | bcd
//! ```
//!
//! - channel 0..=2 with access `00` latches that channel's count,
//! - channel 0..=2 with any other access programs the channel,
//! - channel 3 is the 8254 read-back command.

use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which silicon is being modelled.
///
/// The variants differ in exactly two places: how Square-Wave-Generator
/// handles an odd reload value, and whether the read-back command exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitType {
    /// The earlier part. Odd values reach the counting element; no read-back.
    #[serde(rename = "8253")]
    Model8253,
    /// The later part. Square-wave reloads are forced even; read-back supported.
    #[serde(rename = "8254")]
    Model8254,
}

impl PitType {
    /// Whether the channel-3 read-back command does anything.
    pub fn has_read_back(self) -> bool {
        matches!(self, PitType::Model8254)
    }
}

impl fmt::Display for PitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PitType::Model8253 => write!(f, "8253"),
            PitType::Model8254 => write!(f, "8254"),
        }
    }
}

impl FromStr for PitType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "8253" => Ok(PitType::Model8253),
            "8254" => Ok(PitType::Model8254),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A variant name that is neither `8253` nor `8254`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown PIT variant '{0}' (expected 8253 or 8254)")]
pub struct UnknownVariant(pub String);

/// The six counting modes, in control-word order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerMode {
    /// Mode 0.
    InterruptOnTerminalCount,
    /// Mode 1.
    HardwareRetriggerableOneShot,
    /// Mode 2.
    RateGenerator,
    /// Mode 3.
    SquareWaveGenerator,
    /// Mode 4.
    SoftwareTriggeredStrobe,
    /// Mode 5.
    HardwareTriggeredStrobe,
}

/// What a falling gate edge does to a counting channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFall {
    /// No effect.
    Ignore,
    /// Counting stops; output is left alone.
    Stop,
    /// Counting stops and output is forced high.
    StopForceHigh,
}

impl TimerMode {
    /// All modes, in control-word order.
    pub const ALL: [TimerMode; 6] = [
        TimerMode::InterruptOnTerminalCount,
        TimerMode::HardwareRetriggerableOneShot,
        TimerMode::RateGenerator,
        TimerMode::SquareWaveGenerator,
        TimerMode::SoftwareTriggeredStrobe,
        TimerMode::HardwareTriggeredStrobe,
    ];

    /// Decode the three mode bits (d3..d1, already shifted down).
    ///
    /// `6` and `7` are don't-care aliases of modes 2 and 3.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => TimerMode::InterruptOnTerminalCount,
            1 => TimerMode::HardwareRetriggerableOneShot,
            2 | 6 => TimerMode::RateGenerator,
            3 | 7 => TimerMode::SquareWaveGenerator,
            4 => TimerMode::SoftwareTriggeredStrobe,
            _ => TimerMode::HardwareTriggeredStrobe,
        }
    }

    /// The canonical three-bit encoding.
    pub fn bits(self) -> u8 {
        match self {
            TimerMode::InterruptOnTerminalCount => 0,
            TimerMode::HardwareRetriggerableOneShot => 1,
            TimerMode::RateGenerator => 2,
            TimerMode::SquareWaveGenerator => 3,
            TimerMode::SoftwareTriggeredStrobe => 4,
            TimerMode::HardwareTriggeredStrobe => 5,
        }
    }

    /// Output level immediately after the mode is programmed.
    pub fn initial_output(self) -> bool {
        !matches!(self, TimerMode::InterruptOnTerminalCount)
    }

    /// Output level set on the tick that loads the counting element.
    pub fn output_on_reload(self) -> bool {
        match self {
            TimerMode::InterruptOnTerminalCount => false,
            TimerMode::HardwareRetriggerableOneShot => false,
            TimerMode::RateGenerator => true,
            TimerMode::SquareWaveGenerator => true,
            TimerMode::SoftwareTriggeredStrobe => true,
            TimerMode::HardwareTriggeredStrobe => true,
        }
    }

    /// The first load waits for a rising gate edge instead of the next tick.
    pub fn waits_for_trigger(self) -> bool {
        matches!(
            self,
            TimerMode::HardwareRetriggerableOneShot | TimerMode::HardwareTriggeredStrobe
        )
    }

    /// A completed write after the first one is loaded on the very next tick.
    ///
    /// Every other mode picks the new value up at terminal count or retrigger.
    pub fn reloads_on_write(self) -> bool {
        matches!(
            self,
            TimerMode::InterruptOnTerminalCount | TimerMode::SoftwareTriggeredStrobe
        )
    }

    /// A rising gate edge schedules a reload on the next tick.
    pub fn gate_rising_reloads(self) -> bool {
        match self {
            TimerMode::InterruptOnTerminalCount => false,
            TimerMode::HardwareRetriggerableOneShot => true,
            TimerMode::RateGenerator => true,
            TimerMode::SquareWaveGenerator => true,
            TimerMode::SoftwareTriggeredStrobe => false,
            TimerMode::HardwareTriggeredStrobe => true,
        }
    }

    /// Effect of a falling gate edge.
    pub fn gate_fall(self) -> GateFall {
        match self {
            TimerMode::InterruptOnTerminalCount => GateFall::Ignore,
            TimerMode::HardwareRetriggerableOneShot => GateFall::Ignore,
            TimerMode::RateGenerator => GateFall::StopForceHigh,
            TimerMode::SquareWaveGenerator => GateFall::StopForceHigh,
            TimerMode::SoftwareTriggeredStrobe => GateFall::Stop,
            TimerMode::HardwareTriggeredStrobe => GateFall::Ignore,
        }
    }

    /// Counting only happens while the gate is high.
    pub fn is_gated(self) -> bool {
        match self {
            TimerMode::InterruptOnTerminalCount => true,
            TimerMode::HardwareRetriggerableOneShot => false,
            TimerMode::RateGenerator => true,
            TimerMode::SquareWaveGenerator => true,
            TimerMode::SoftwareTriggeredStrobe => true,
            TimerMode::HardwareTriggeredStrobe => false,
        }
    }
}

/// How the data port is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// `00`: not a real access mode; in a control word it means "latch".
    Latch,
    /// `01`: low byte only.
    Lsb,
    /// `10`: high byte only.
    Msb,
    /// `11`: low byte, then high byte.
    LsbMsb,
}

impl AccessMode {
    /// Decode the two access bits (d5..d4, already shifted down).
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => AccessMode::Latch,
            1 => AccessMode::Lsb,
            2 => AccessMode::Msb,
            _ => AccessMode::LsbMsb,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            AccessMode::Latch => 0,
            AccessMode::Lsb => 1,
            AccessMode::Msb => 2,
            AccessMode::LsbMsb => 3,
        }
    }
}

/// Selection carried by a read-back command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadBack {
    /// Latch the count of each selected channel (`!COUNT` was 0).
    pub latch_count: bool,
    /// Latch the status byte of each selected channel (`!STATUS` was 0).
    pub latch_status: bool,
    /// Channels 0, 1, 2 selected by d1, d2, d3.
    pub channels: [bool; 3],
}

impl ReadBack {
    /// Selected channel indices, lowest first.
    pub fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(c, _)| c)
    }
}

/// A decoded control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Program a channel.
    SetMode {
        channel: usize,
        access: AccessMode,
        mode: TimerMode,
        bcd: bool,
    },
    /// Latch a channel's counting element.
    Latch { channel: usize },
    /// Channel field 3. Only meaningful on the 8254.
    ReadBack(ReadBack),
}

impl Command {
    /// Decode a control word. Every byte decodes to something.
    pub fn decode(byte: u8) -> Self {
        let channel = (byte >> 6) as usize;
        if channel == 3 {
            return Command::ReadBack(ReadBack {
                latch_count: byte & 0x20 == 0,
                latch_status: byte & 0x10 == 0,
                channels: [byte & 0x02 != 0, byte & 0x04 != 0, byte & 0x08 != 0],
            });
        }

        let access = AccessMode::from_bits(byte >> 4);
        if access == AccessMode::Latch {
            return Command::Latch { channel };
        }

        Command::SetMode {
            channel,
            access,
            mode: TimerMode::from_bits(byte >> 1),
            bcd: byte & 0x01 != 0,
        }
    }

    /// Build the control word for this command.
    pub fn encode(&self) -> u8 {
        match *self {
            Command::SetMode { channel, access, mode, bcd } => {
                ((channel as u8 & 0x03) << 6)
                    | (access.bits() << 4)
                    | (mode.bits() << 1)
                    | bcd as u8
            }
            Command::Latch { channel } => (channel as u8 & 0x03) << 6,
            Command::ReadBack(rb) => {
                let mut byte = 0xC0;
                if !rb.latch_count {
                    byte |= 0x20;
                }
                if !rb.latch_status {
                    byte |= 0x10;
                }
                for (i, &on) in rb.channels.iter().enumerate() {
                    if on {
                        byte |= 0x02 << i;
                    }
                }
                byte
            }
        }
    }
}

/// Assemble an 8254 status byte.
///
/// `d7` output, `d6` null count, `d5-d4` access, `d3-d1` mode, `d0` BCD.
pub fn status_byte(
    output: bool,
    null_count: bool,
    access: AccessMode,
    mode: TimerMode,
    bcd: bool,
) -> u8 {
    ((output as u8) << 7)
        | ((null_count as u8) << 6)
        | (access.bits() << 4)
        | (mode.bits() << 1)
        | bcd as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_set_mode() {
        // Channel 2, LSB then MSB, mode 3, binary.
        let cmd = Command::decode(0b10_11_011_0);
        assert_eq!(
            cmd,
            Command::SetMode {
                channel: 2,
                access: AccessMode::LsbMsb,
                mode: TimerMode::SquareWaveGenerator,
                bcd: false,
            }
        );
    }

    #[test]
    fn test_access_bit_order() {
        assert_eq!(AccessMode::from_bits(1), AccessMode::Lsb);
        assert_eq!(AccessMode::from_bits(2), AccessMode::Msb);
        assert_eq!(AccessMode::from_bits(3), AccessMode::LsbMsb);
    }

    #[test]
    fn test_latch_ignores_low_bits() {
        assert_eq!(Command::decode(0x40), Command::Latch { channel: 1 });
        assert_eq!(Command::decode(0x4F), Command::Latch { channel: 1 });
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!(TimerMode::from_bits(6), TimerMode::RateGenerator);
        assert_eq!(TimerMode::from_bits(7), TimerMode::SquareWaveGenerator);
        for mode in TimerMode::ALL {
            assert_eq!(TimerMode::from_bits(mode.bits()), mode);
        }
    }

    #[test]
    fn test_decode_read_back() {
        // Latch count only, channels 0 and 2.
        let cmd = Command::decode(0b11_0_1_101_0);
        match cmd {
            Command::ReadBack(rb) => {
                assert!(rb.latch_count);
                assert!(!rb.latch_status);
                assert_eq!(rb.channels, [true, false, true]);
                assert_eq!(rb.selected().collect::<Vec<_>>(), vec![0, 2]);
            }
            other => panic!("expected read-back, got {:?}", other),
        }
        assert_eq!(cmd.encode(), 0b11_0_1_101_0);
    }

    #[test]
    fn test_encode_every_set_mode_byte() {
        for byte in 0u8..0xC0 {
            let cmd = Command::decode(byte);
            if let Command::SetMode { mode, .. } = cmd {
                // Aliased mode bits re-encode canonically.
                let canonical = (byte & !0x0E) | (mode.bits() << 1);
                assert_eq!(cmd.encode(), canonical, "byte {:#04X}", byte);
            }
        }
    }

    #[test]
    fn test_only_itc_starts_low() {
        for mode in TimerMode::ALL {
            assert_eq!(mode.initial_output(), mode != TimerMode::InterruptOnTerminalCount);
        }
    }

    #[test]
    fn test_status_byte_layout() {
        let status = status_byte(true, false, AccessMode::LsbMsb, TimerMode::RateGenerator, true);
        assert_eq!(status, 0b1_0_11_010_1);
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!("8253".parse::<PitType>(), Ok(PitType::Model8253));
        assert_eq!(" 8254".parse::<PitType>(), Ok(PitType::Model8254));
        assert!("8259".parse::<PitType>().is_err());
        assert!(!PitType::Model8253.has_read_back());
    }
}
