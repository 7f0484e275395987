//! The counting element's decrement.
//!
//! Binary counting wraps `0 -> 0xFFFF`. BCD counting treats the word as four
//! packed decimal digits and wraps `0 -> 0x9999`. A word holding non-decimal
//! nibbles is not rejected: the same borrow arithmetic runs on it, which is
//! what the silicon does with an invalid BCD reload.

/// Decrement once.
#[inline]
pub fn count(value: u16, bcd: bool) -> u16 {
    if !bcd {
        return value.wrapping_sub(1);
    }

    if value == 0 {
        0x9999
    } else if value & 0x000F != 0 {
        // Ones digit is non-zero.
        value - 1
    } else if value & 0x00F0 != 0 {
        // Borrow from tens: 0x10 - 0x07 = 0x09.
        value - 0x0007
    } else if value & 0x0F00 != 0 {
        // Borrow from hundreds: 0x100 - 0x67 = 0x99.
        value - 0x0067
    } else {
        // Borrow from thousands: 0x1000 - 0x667 = 0x999.
        value - 0x0667
    }
}

/// Decrement `steps` times.
#[inline]
pub fn count_by(value: u16, bcd: bool, steps: u8) -> u16 {
    (0..steps).fold(value, |v, _| count(v, bcd))
}

/// Interpret a packed BCD word as a decimal number.
///
/// Returns `None` if any nibble is above 9.
pub fn bcd_to_decimal(value: u16) -> Option<u16> {
    let mut out = 0u16;
    for shift in [12, 8, 4, 0] {
        let digit = (value >> shift) & 0xF;
        if digit > 9 {
            return None;
        }
        out = out * 10 + digit;
    }
    Some(out)
}

/// Pack a decimal number below 10000 as BCD.
pub fn decimal_to_bcd(value: u16) -> u16 {
    let value = value % 10_000;
    ((value / 1000) << 12) | (((value / 100) % 10) << 8) | (((value / 10) % 10) << 4) | (value % 10)
}
