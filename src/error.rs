use snafu::{Snafu, Whatever};

use crate::packets::class::SecureMessaging;
use crate::packets::instruction::InstructionCode;
use crate::packets::status::StatusWord;
use crate::transport::trace::Trace;

/// Error returned by a card transport, kept opaque.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid CLA 0x{raw:02X}: 0xFF is reserved"))]
    InvalidClass { raw: u8 },

    #[snafu(display("Logical channel {channel} out of range (max 19)"))]
    ChannelOutOfRange { channel: u8 },

    #[snafu(display("Secure messaging {secure_messaging:?} cannot be encoded for logical channel {channel}"))]
    UnsupportedSecureMessaging { secure_messaging: SecureMessaging, channel: u8 },

    #[snafu(display("Invalid INS 0x{raw:02X}: 6X and 9X are reserved"))]
    ReservedInstruction { raw: u8 },

    #[snafu(display("Command cannot be encoded: Nc = {nc}, Ne = {ne}"))]
    LengthOutOfRange { nc: usize, ne: usize },

    #[snafu(display("Short file identifier {sfi} out of range (1 to 30, 0 for the current EF)"))]
    InvalidShortFileIdentifier { sfi: u8 },

    #[snafu(display("Response too short: length {length}"))]
    ResponseTooShort { length: usize },

    #[snafu(display("Mandatory tag '{tag}' not found"))]
    MandatoryTagMissing { tag: &'static str },

    #[snafu(display("BER-TLV decode failed: {source}"))]
    TlvDecodeFailure { source: Whatever },

    #[snafu(display("Tag {tag} cannot be mapped: {reason}"))]
    MappingTargetInvalid { tag: String, reason: String },

    #[snafu(display("Transmission error: {source}"))]
    TransportFailure { source: TransportError },

    #[snafu(display("Card kept requesting follow-up commands beyond the limit of {limit}"))]
    ProtocolLoopExceeded { limit: usize },

    #[snafu(display("Exchange aborted after {} transaction(s): {source}", trace.len()))]
    ExchangeAborted {
        trace: Trace,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display("Cannot create a result from an empty trace"))]
    EmptyTrace,

    #[snafu(display("Trace must start with {expected} (got {found})"))]
    UnexpectedInstruction { expected: InstructionCode, found: InstructionCode },

    #[snafu(display("Operation failed: {}", status_text(status)))]
    SelectionFailed { status: Option<StatusWord> },

    #[snafu(display("No response data found"))]
    NoResponseData,
}

fn status_text(status: &Option<StatusWord>) -> String {
    match status {
        Some(status) => status.to_string(),
        None => "no response".to_string(),
    }
}

impl Error {
    /// Transactions that reached the wire before an exchange was aborted.
    pub fn trace(&self) -> Option<&Trace> {
        match self {
            Error::ExchangeAborted { trace, .. } => Some(trace),
            _ => None,
        }
    }
}
