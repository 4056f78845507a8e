use bitflags::bitflags;
use snafu::ensure;

use crate::bits::{bit, get_range};
use crate::error::{ChannelOutOfRangeSnafu, InvalidClassSnafu, Result, UnsupportedSecureMessagingSnafu};

// Class byte (CLA)
// ISO/IEC 7816-4 section 5.4.1
//
// 0b1xxx_xxxx  proprietary
// 0b000x_xxxx  first interindustry: chaining bit 5, SM bits 4-3, channel bits 2-1
// 0b01xx_xxxx  further interindustry: SM bit 6, chaining bit 5, channel - 4 on bits 4-1
// 0b001x_xxxx  reserved for future use, decoded as first interindustry
//
pub const MAX_CHANNEL: u8 = 19;
const FIRST_INTERINDUSTRY_MAX_CHANNEL: u8 = 3;
const FURTHER_CHANNEL_OFFSET: u8 = 4;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Indicators: u8 {
        const PROPRIETARY = bit(8);
        const FURTHER_INTERINDUSTRY = bit(7);
        /// Secure messaging in the further range, RFU marker in the first range
        const BIT_6 = bit(6);
        const CHAINING = bit(5);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecureMessaging {
    /// No SM or no indication
    #[default]
    None = 0,
    /// Proprietary SM format, first interindustry only
    Proprietary = 1,
    /// ISO SM, command header not processed
    HeaderNoProc = 2,
    /// ISO SM, command header authenticated, first interindustry only
    HeaderAuth = 3,
}

impl SecureMessaging {
    fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::None,
            1 => Self::Proprietary,
            2 => Self::HeaderNoProc,
            _ => Self::HeaderAuth,
        }
    }
}

/// Decoded CLA byte. Immutable once built, `encode` is the inverse of `decode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassByte {
    raw: u8,
    proprietary: bool,
    chained: bool,
    secure_messaging: SecureMessaging,
    channel: u8,
    reserved_range: bool,
}

impl ClassByte {
    pub fn decode(raw: u8) -> Result<Self> {
        ensure!(raw != 0xFF, InvalidClassSnafu { raw });

        let indicators = Indicators::from_bits_truncate(raw);
        let mut class = Self {
            raw,
            proprietary: false,
            chained: false,
            secure_messaging: SecureMessaging::None,
            channel: 0,
            reserved_range: false,
        };

        if indicators.contains(Indicators::PROPRIETARY) {
            class.proprietary = true;
            return Ok(class);
        }

        class.chained = indicators.contains(Indicators::CHAINING);

        if indicators.contains(Indicators::FURTHER_INTERINDUSTRY) {
            class.secure_messaging = if indicators.contains(Indicators::BIT_6) {
                SecureMessaging::HeaderNoProc
            } else {
                SecureMessaging::None
            };
            class.channel = get_range(raw, 4, 1) + FURTHER_CHANNEL_OFFSET;
        } else {
            class.secure_messaging = SecureMessaging::from_bits(get_range(raw, 4, 3));
            class.channel = get_range(raw, 2, 1);
            class.reserved_range = indicators.contains(Indicators::BIT_6);
        }

        Ok(class)
    }

    /// Interindustry class built from its components. Channels 0-3 use the first
    /// interindustry layout, channels 4-19 the further one.
    pub fn new(chained: bool, secure_messaging: SecureMessaging, channel: u8) -> Result<Self> {
        ensure!(channel <= MAX_CHANNEL, ChannelOutOfRangeSnafu { channel });
        ensure!(
            channel <= FIRST_INTERINDUSTRY_MAX_CHANNEL
                || !matches!(secure_messaging, SecureMessaging::Proprietary | SecureMessaging::HeaderAuth),
            UnsupportedSecureMessagingSnafu {
                secure_messaging,
                channel
            }
        );

        let mut class = Self {
            raw: 0,
            proprietary: false,
            chained,
            secure_messaging,
            channel,
            reserved_range: false,
        };
        class.raw = class.encode();
        Ok(class)
    }

    pub fn encode(&self) -> u8 {
        if self.proprietary {
            return self.raw;
        }

        let mut indicators = Indicators::empty();
        if self.chained {
            indicators.insert(Indicators::CHAINING);
        }

        if self.channel <= FIRST_INTERINDUSTRY_MAX_CHANNEL {
            if self.reserved_range {
                indicators.insert(Indicators::BIT_6);
            }
            indicators.bits() | ((self.secure_messaging as u8) << 2) | self.channel
        } else {
            indicators.insert(Indicators::FURTHER_INTERINDUSTRY);
            if self.secure_messaging == SecureMessaging::HeaderNoProc {
                indicators.insert(Indicators::BIT_6);
            }
            indicators.bits() | (self.channel - FURTHER_CHANNEL_OFFSET)
        }
    }

    /// Same class on the same logical channel, with the chaining bit cleared.
    pub fn without_chaining(&self) -> Self {
        if self.proprietary || !self.chained {
            return *self;
        }
        let mut class = Self { chained: false, ..*self };
        class.raw = class.encode();
        class
    }

    pub fn raw(&self) -> u8 {
        self.raw
    }

    pub fn is_proprietary(&self) -> bool {
        self.proprietary
    }

    pub fn is_chained(&self) -> bool {
        self.chained
    }

    pub fn secure_messaging(&self) -> SecureMessaging {
        self.secure_messaging
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }
}

impl TryFrom<u8> for ClassByte {
    type Error = crate::error::Error;

    fn try_from(raw: u8) -> Result<Self> {
        Self::decode(raw)
    }
}

impl Default for ClassByte {
    fn default() -> Self {
        Self {
            raw: 0x00,
            proprietary: false,
            chained: false,
            secure_messaging: SecureMessaging::None,
            channel: 0,
            reserved_range: false,
        }
    }
}
