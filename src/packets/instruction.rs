use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use snafu::ensure;
use std::fmt;

use crate::bits::{get_range, is_set};
use crate::error::{ReservedInstructionSnafu, Result};

// Instruction byte (INS)
// ISO/IEC 7816-4 section 5.4.2
//
// With the interindustry class, bit 1 set asks for BER-TLV encoded data
// (READ BINARY B0 vs B1). 6X and 9X are taken by SW1 and the transport
// procedure bytes of ISO/IEC 7816-3.
//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum Ins {
    DeactivateFile = 0x04,
    EraseRecord = 0x0C,
    EraseBinary = 0x0E,
    EraseBinaryBer = 0x0F,
    PerformScqlOperation = 0x10,
    PerformTransactionOperation = 0x12,
    PerformUserOperation = 0x14,
    Verify = 0x20,
    VerifyBer = 0x21,
    ManageSecurityEnvironment = 0x22,
    ChangeReferenceData = 0x24,
    DisableVerificationRequirement = 0x26,
    EnableVerificationRequirement = 0x28,
    PerformSecurityOperation = 0x2A,
    ResetRetryCounter = 0x2C,
    ActivateFile = 0x44,
    GenerateAsymmetricKeyPair = 0x46,
    ManageChannel = 0x70,
    ExternalAuthenticate = 0x82,
    GetChallenge = 0x84,
    GeneralAuthenticate = 0x86,
    GeneralAuthenticateBer = 0x87,
    InternalAuthenticate = 0x88,
    SearchBinary = 0xA0,
    SearchBinaryBer = 0xA1,
    SearchRecord = 0xA2,
    Select = 0xA4,
    ReadBinary = 0xB0,
    ReadBinaryBer = 0xB1,
    ReadRecord = 0xB2,
    ReadRecordBer = 0xB3,
    GetResponse = 0xC0,
    Envelope = 0xC2,
    EnvelopeBer = 0xC3,
    GetData = 0xCA,
    GetDataBer = 0xCB,
    WriteBinary = 0xD0,
    WriteBinaryBer = 0xD1,
    WriteRecord = 0xD2,
    UpdateBinary = 0xD6,
    UpdateBinaryBer = 0xD7,
    PutData = 0xDA,
    PutDataBer = 0xDB,
    UpdateRecord = 0xDC,
    UpdateRecordBer = 0xDD,
    CreateFile = 0xE0,
    AppendRecord = 0xE2,
    DeleteFile = 0xE4,
    TerminateDf = 0xE6,
    TerminateEf = 0xE8,
    TerminateCardUsage = 0xFE,
}

impl Ins {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Ins::DeactivateFile => "DEACTIVATE FILE",
            Ins::EraseRecord => "ERASE RECORD",
            Ins::EraseBinary | Ins::EraseBinaryBer => "ERASE BINARY",
            Ins::PerformScqlOperation => "PERFORM SCQL OPERATION",
            Ins::PerformTransactionOperation => "PERFORM TRANSACTION OPERATION",
            Ins::PerformUserOperation => "PERFORM USER OPERATION",
            Ins::Verify | Ins::VerifyBer => "VERIFY",
            Ins::ManageSecurityEnvironment => "MANAGE SECURITY ENVIRONMENT",
            Ins::ChangeReferenceData => "CHANGE REFERENCE DATA",
            Ins::DisableVerificationRequirement => "DISABLE VERIFICATION REQUIREMENT",
            Ins::EnableVerificationRequirement => "ENABLE VERIFICATION REQUIREMENT",
            Ins::PerformSecurityOperation => "PERFORM SECURITY OPERATION",
            Ins::ResetRetryCounter => "RESET RETRY COUNTER",
            Ins::ActivateFile => "ACTIVATE FILE",
            Ins::GenerateAsymmetricKeyPair => "GENERATE ASYMMETRIC KEY PAIR",
            Ins::ManageChannel => "MANAGE CHANNEL",
            Ins::ExternalAuthenticate => "EXTERNAL AUTHENTICATE",
            Ins::GetChallenge => "GET CHALLENGE",
            Ins::GeneralAuthenticate | Ins::GeneralAuthenticateBer => "GENERAL AUTHENTICATE",
            Ins::InternalAuthenticate => "INTERNAL AUTHENTICATE",
            Ins::SearchBinary | Ins::SearchBinaryBer => "SEARCH BINARY",
            Ins::SearchRecord => "SEARCH RECORD",
            Ins::Select => "SELECT",
            Ins::ReadBinary | Ins::ReadBinaryBer => "READ BINARY",
            Ins::ReadRecord | Ins::ReadRecordBer => "READ RECORD",
            Ins::GetResponse => "GET RESPONSE",
            Ins::Envelope | Ins::EnvelopeBer => "ENVELOPE",
            Ins::GetData | Ins::GetDataBer => "GET DATA",
            Ins::WriteBinary | Ins::WriteBinaryBer => "WRITE BINARY",
            Ins::WriteRecord => "WRITE RECORD",
            Ins::UpdateBinary | Ins::UpdateBinaryBer => "UPDATE BINARY",
            Ins::PutData | Ins::PutDataBer => "PUT DATA",
            Ins::UpdateRecord | Ins::UpdateRecordBer => "UPDATE RECORD",
            Ins::CreateFile => "CREATE FILE",
            Ins::AppendRecord => "APPEND RECORD",
            Ins::DeleteFile => "DELETE FILE",
            Ins::TerminateDf => "TERMINATE DF",
            Ins::TerminateEf => "TERMINATE EF",
            Ins::TerminateCardUsage => "TERMINATE CARD USAGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionCode {
    raw: u8,
    prefers_ber_tlv: bool,
}

impl InstructionCode {
    pub fn decode(raw: u8) -> Result<Self> {
        let high_nibble = get_range(raw, 8, 5);
        ensure!(high_nibble != 0x6 && high_nibble != 0x9, ReservedInstructionSnafu { raw });

        Ok(Self {
            raw,
            prefers_ber_tlv: is_set(raw, 1),
        })
    }

    pub fn raw(&self) -> u8 {
        self.raw
    }

    pub fn prefers_ber_tlv(&self) -> bool {
        self.prefers_ber_tlv
    }

    /// Named ISO instruction, `None` for proprietary or unassigned codes
    pub fn ins(&self) -> Option<Ins> {
        Ins::from_u8(self.raw)
    }

    pub fn mnemonic(&self) -> Option<&'static str> {
        self.ins().map(|ins| ins.mnemonic())
    }
}

impl From<Ins> for InstructionCode {
    fn from(ins: Ins) -> Self {
        let raw = ins as u8;
        Self {
            raw,
            prefers_ber_tlv: is_set(raw, 1),
        }
    }
}

impl TryFrom<u8> for InstructionCode {
    type Error = crate::error::Error;

    fn try_from(raw: u8) -> Result<Self> {
        Self::decode(raw)
    }
}

impl PartialEq<Ins> for InstructionCode {
    fn eq(&self, other: &Ins) -> bool {
        self.raw == *other as u8
    }
}

impl fmt::Display for InstructionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(mnemonic) => write!(f, "{} ({:02X})", mnemonic, self.raw),
            None => write!(f, "INS {:02X}", self.raw),
        }
    }
}
