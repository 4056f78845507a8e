use std::fmt;

use crate::bits::get_range;
use crate::error::Result;
use crate::packets::apdu::{CommandApdu, MAX_SHORT_LE};
use crate::packets::class::ClassByte;
use crate::packets::instruction::Ins;

// SELECT command (INS A4)
// ISO/IEC 7816-4 section 11.2.2
//
// P1  selection method
// P2  bits 4-3 response requested, bits 2-1 file occurrence
//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
    FileId,
    ChildDf,
    EfUnderCurrentDf,
    ParentDf,
    /// Select by DF name (AID)
    DfName,
    PathFromMf,
    PathFromCurrentDf,
    Other(u8),
}

impl SelectionMethod {
    pub fn p1(&self) -> u8 {
        match self {
            SelectionMethod::FileId => 0x00,
            SelectionMethod::ChildDf => 0x01,
            SelectionMethod::EfUnderCurrentDf => 0x02,
            SelectionMethod::ParentDf => 0x03,
            SelectionMethod::DfName => 0x04,
            SelectionMethod::PathFromMf => 0x08,
            SelectionMethod::PathFromCurrentDf => 0x09,
            SelectionMethod::Other(p1) => *p1,
        }
    }
}

impl From<u8> for SelectionMethod {
    fn from(p1: u8) -> Self {
        match p1 {
            0x00 => SelectionMethod::FileId,
            0x01 => SelectionMethod::ChildDf,
            0x02 => SelectionMethod::EfUnderCurrentDf,
            0x03 => SelectionMethod::ParentDf,
            0x04 => SelectionMethod::DfName,
            0x08 => SelectionMethod::PathFromMf,
            0x09 => SelectionMethod::PathFromCurrentDf,
            other => SelectionMethod::Other(other),
        }
    }
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMethod::FileId => write!(f, "Select by file ID"),
            SelectionMethod::ChildDf => write!(f, "Select child DF"),
            SelectionMethod::EfUnderCurrentDf => write!(f, "Select EF under current DF"),
            SelectionMethod::ParentDf => write!(f, "Select parent DF"),
            SelectionMethod::DfName => write!(f, "Select by DF name (AID)"),
            SelectionMethod::PathFromMf => write!(f, "Select path from MF"),
            SelectionMethod::PathFromCurrentDf => write!(f, "Select path from current DF"),
            SelectionMethod::Other(p1) => write!(f, "Unknown method (0x{:02X})", p1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileOccurrence {
    #[default]
    FirstOrOnly = 0b00,
    Last = 0b01,
    Next = 0b10,
    Previous = 0b11,
}

impl FileOccurrence {
    pub fn from_p2(p2: u8) -> Self {
        match get_range(p2, 2, 1) {
            0b00 => FileOccurrence::FirstOrOnly,
            0b01 => FileOccurrence::Last,
            0b10 => FileOccurrence::Next,
            _ => FileOccurrence::Previous,
        }
    }
}

/// Response requested by a SELECT, bits 4-3 of P2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionControl {
    /// FCI template, optional use of FCI tag and length
    #[default]
    Fci = 0b00,
    /// FCP template mandatory
    Fcp = 0b01,
    /// FMD template mandatory
    Fmd = 0b10,
    /// No response data if Le absent, proprietary otherwise
    NoData = 0b11,
}

impl SelectionControl {
    pub fn from_p2(p2: u8) -> Self {
        match get_range(p2, 4, 3) {
            0b00 => SelectionControl::Fci,
            0b01 => SelectionControl::Fcp,
            0b10 => SelectionControl::Fmd,
            _ => SelectionControl::NoData,
        }
    }

    pub fn p2_bits(&self) -> u8 {
        (*self as u8) << 2
    }
}

impl fmt::Display for SelectionControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionControl::Fci => write!(f, "Return FCI"),
            SelectionControl::Fcp => write!(f, "Return FCP"),
            SelectionControl::Fmd => write!(f, "Return FMD"),
            SelectionControl::NoData => write!(f, "No response data"),
        }
    }
}

/// SELECT command.
///
/// With command data Ne is left at 0: a T=0 reader cannot send Lc and Le
/// together, the card answers 61XX and the client fetches the data. Without
/// data the full short Le (256) is requested unless no response is wanted.
pub fn select(
    class: ClassByte,
    method: SelectionMethod,
    occurrence: FileOccurrence,
    control: SelectionControl,
    data: Vec<u8>,
) -> Result<CommandApdu> {
    let p2 = control.p2_bits() | occurrence as u8;
    let ne = if data.is_empty() && control != SelectionControl::NoData {
        MAX_SHORT_LE
    } else {
        0
    };

    CommandApdu::new(class, Ins::Select.into(), method.p1(), p2, data, ne)
}

pub fn select_by_aid(class: ClassByte, aid: &[u8]) -> Result<CommandApdu> {
    select(
        class,
        SelectionMethod::DfName,
        FileOccurrence::FirstOrOnly,
        SelectionControl::Fci,
        aid.to_vec(),
    )
}

pub fn select_master_file(class: ClassByte) -> Result<CommandApdu> {
    select(
        class,
        SelectionMethod::FileId,
        FileOccurrence::FirstOrOnly,
        SelectionControl::Fci,
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_pse_by_name() {
        let cmd = select_by_aid(ClassByte::default(), b"1PAY.SYS.DDF01").unwrap();
        assert_eq!(
            cmd.encode(),
            hex::decode("00A404000E315041592E5359532E4444463031").unwrap(),
            "Case 3, no Le sent with the AID"
        );
        assert_eq!(cmd.ne(), 0);
    }

    #[test]
    fn select_master_file_requests_data() {
        let cmd = select_master_file(ClassByte::default()).unwrap();
        assert_eq!(cmd.encode(), hex::decode("00A4000000").unwrap());
        assert_eq!(cmd.ne(), 256);
    }

    #[test]
    fn p2_layout() {
        let cmd = select(
            ClassByte::default(),
            SelectionMethod::FileId,
            FileOccurrence::Next,
            SelectionControl::Fmd,
            vec![0x3F, 0x00],
        )
        .unwrap();
        assert_eq!(cmd.p2(), 0b0000_10_10);
        assert_eq!(SelectionControl::from_p2(cmd.p2()), SelectionControl::Fmd);
        assert_eq!(FileOccurrence::from_p2(cmd.p2()), FileOccurrence::Next);

        let cmd = select(
            ClassByte::default(),
            SelectionMethod::FileId,
            FileOccurrence::FirstOrOnly,
            SelectionControl::NoData,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(cmd.ne(), 0, "No Le when no response data is wanted");
        assert_eq!(cmd.encode(), hex::decode("00A4000C").unwrap());
    }

    #[test]
    fn methods() {
        assert_eq!(SelectionMethod::from(0x04), SelectionMethod::DfName);
        assert_eq!(SelectionMethod::from(0x08).p1(), 0x08);
        assert_eq!(SelectionMethod::from(0x42), SelectionMethod::Other(0x42));
        assert_eq!(SelectionMethod::Other(0x42).to_string(), "Unknown method (0x42)");
    }
}
