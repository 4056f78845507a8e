//! ISO/IEC 7816-4 smart card client.
//!
//! Command and response APDU codec, status word interpretation, a client
//! running the GET RESPONSE and wrong length follow-ups on top of any
//! [`CardTransport`], and tag directed mapping of BER-TLV data onto typed
//! structures (file control information, EMV templates).
pub mod bits;
pub mod emv;
pub mod error;
pub mod files;
pub mod packets;
pub mod tlv;
pub mod transport;

pub use error::{Error, Result};
pub use files::{FileControlInfo, ReadRecordResult, SelectResult};
pub use packets::apdu::{CommandApdu, ResponseApdu};
pub use packets::class::ClassByte;
pub use packets::instruction::{Ins, InstructionCode};
pub use packets::status::StatusWord;
pub use transport::client::{Client, DEFAULT_FOLLOW_UP_LIMIT};
pub use transport::trace::{Trace, Transaction};
pub use transport::CardTransport;
