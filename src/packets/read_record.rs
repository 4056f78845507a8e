use snafu::ensure;
use std::fmt;

use crate::bits::get_range;
use crate::error::{InvalidShortFileIdentifierSnafu, Result};
use crate::packets::apdu::{CommandApdu, MAX_SHORT_LE};
use crate::packets::class::ClassByte;
use crate::packets::instruction::Ins;

// READ RECORD command (INS B2)
// ISO/IEC 7816-4 section 11.4.3
//
// P1  record number or record identifier
// P2  bits 8-4 SFI (0 = current EF), bits 3-1 mode
//
pub const MAX_SHORT_FILE_IDENTIFIER: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRecordMode {
    FirstOccurrence,
    LastOccurrence,
    NextOccurrence,
    PreviousOccurrence,
    /// Record number P1
    RecordP1,
    /// All records from P1 up to the last
    AllFromP1,
    /// All records from the last down to P1
    AllFromLastToP1,
    Reserved,
}

impl ReadRecordMode {
    pub fn from_p2(p2: u8) -> Self {
        match get_range(p2, 3, 1) {
            0b000 => ReadRecordMode::FirstOccurrence,
            0b001 => ReadRecordMode::LastOccurrence,
            0b010 => ReadRecordMode::NextOccurrence,
            0b011 => ReadRecordMode::PreviousOccurrence,
            0b100 => ReadRecordMode::RecordP1,
            0b101 => ReadRecordMode::AllFromP1,
            0b110 => ReadRecordMode::AllFromLastToP1,
            _ => ReadRecordMode::Reserved,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ReadRecordMode::FirstOccurrence => 0b000,
            ReadRecordMode::LastOccurrence => 0b001,
            ReadRecordMode::NextOccurrence => 0b010,
            ReadRecordMode::PreviousOccurrence => 0b011,
            ReadRecordMode::RecordP1 => 0b100,
            ReadRecordMode::AllFromP1 => 0b101,
            ReadRecordMode::AllFromLastToP1 => 0b110,
            ReadRecordMode::Reserved => 0b111,
        }
    }

    /// P1 holds a record number rather than a record identifier
    pub fn by_number(&self) -> bool {
        self.bits() & 0b100 != 0
    }
}

impl fmt::Display for ReadRecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReadRecordMode::FirstOccurrence => "Record ID: first occurrence",
            ReadRecordMode::LastOccurrence => "Record ID: last occurrence",
            ReadRecordMode::NextOccurrence => "Record ID: next occurrence",
            ReadRecordMode::PreviousOccurrence => "Record ID: previous occurrence",
            ReadRecordMode::RecordP1 => "Record number: read record P1",
            ReadRecordMode::AllFromP1 => "Record number: read all from P1",
            ReadRecordMode::AllFromLastToP1 => "Record number: read all from last to P1",
            ReadRecordMode::Reserved => "Reserved mode",
        };
        write!(f, "{}", text)
    }
}

/// READ RECORD with `sfi` 0 for the current EF. A case 2 command, Le is the
/// full short length.
pub fn read_record_command(class: ClassByte, sfi: u8, p1: u8, mode: ReadRecordMode) -> Result<CommandApdu> {
    ensure!(sfi <= MAX_SHORT_FILE_IDENTIFIER, InvalidShortFileIdentifierSnafu { sfi });
    let p2 = (sfi << 3) | mode.bits();
    CommandApdu::new(class, Ins::ReadRecord.into(), p1, p2, Vec::new(), MAX_SHORT_LE)
}

pub fn read_record(class: ClassByte, sfi: u8, record_number: u8) -> Result<CommandApdu> {
    read_record_command(class, sfi, record_number, ReadRecordMode::RecordP1)
}

pub fn read_all_records(class: ClassByte, sfi: u8, first_record_number: u8) -> Result<CommandApdu> {
    read_record_command(class, sfi, first_record_number, ReadRecordMode::AllFromP1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn first_record_of_sfi_1() {
        let cmd = read_record(ClassByte::default(), 1, 1).unwrap();
        assert_eq!(cmd.encode(), hex::decode("00B2010C00").unwrap());
        assert_eq!(cmd.ne(), 256);
    }

    #[test]
    fn all_records() {
        let cmd = read_all_records(ClassByte::default(), 2, 3).unwrap();
        assert_eq!(cmd.p1(), 3);
        assert_eq!(cmd.p2(), (2 << 3) | 0b101);
        assert_eq!(ReadRecordMode::from_p2(cmd.p2()), ReadRecordMode::AllFromP1);
    }

    #[test]
    fn current_ef() {
        let cmd = read_record_command(ClassByte::default(), 0, 0x07, ReadRecordMode::NextOccurrence).unwrap();
        assert_eq!(cmd.p2(), 0b0000_0010);
        assert!(!ReadRecordMode::NextOccurrence.by_number());
    }

    #[test]
    fn sfi_out_of_range() {
        assert!(matches!(
            read_record(ClassByte::default(), 31, 1),
            Err(Error::InvalidShortFileIdentifier { sfi: 31 })
        ));
    }

    #[test]
    fn mode_bits() {
        for p2 in 0..=0b111u8 {
            assert_eq!(ReadRecordMode::from_p2(p2).bits(), p2);
        }
    }
}
