// Bit numbering follows ISO/IEC 7816-4: bit 1 is the least significant bit,
// bit 8 the most significant one.

/// Byte with only bit `n` set, 0 when `n` is outside 1..=8.
pub const fn bit(n: u8) -> u8 {
    if n < 1 || n > 8 {
        return 0;
    }
    1 << (n - 1)
}

pub fn is_set(byte: u8, n: u8) -> bool {
    byte & bit(n) != 0
}

pub fn set(byte: u8, n: u8) -> u8 {
    byte | bit(n)
}

/// Value held in bits `high..=low`, shifted down to bit 1.
///
/// `get_range(0b0000_1100, 4, 3)` is `0b11`. Out of order or out of range
/// bounds yield 0.
pub fn get_range(byte: u8, high: u8, low: u8) -> u8 {
    if high < low || high > 8 || low < 1 {
        return 0;
    }
    let width = high - low + 1;
    let mask = ((1u16 << width) - 1) as u8;
    (byte >> (low - 1)) & mask
}
