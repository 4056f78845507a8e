use byteorder::{BigEndian, ByteOrder};
use snafu::ensure;
use std::fmt;

use crate::error::{LengthOutOfRangeSnafu, ResponseTooShortSnafu, Result};
use crate::packets::class::ClassByte;
use crate::packets::instruction::{Ins, InstructionCode};
use crate::packets::status::StatusWord;

// Application Protocol Data Unit (APDU)
// ISO/IEC 7816-3 section 12.1, ISO/IEC 7816-4 section 5.1
//
// Command:  CLA INS P1 P2 [Lc Data] [Le]
//
//   case 1  header only
//   case 2  header + Le
//   case 3  header + Lc + data
//   case 4  header + Lc + data + Le
//
// Short lengths use one byte (Le 0x00 = 256). Extended lengths use a 0x00
// marker followed by two bytes (Le 0x0000 = 65536). Extended mode is used as
// soon as Nc > 255 or Ne > 256.
//
// Response: [Data] SW1 SW2
//
pub const MAX_SHORT_LC: usize = 255;
pub const MAX_SHORT_LE: usize = 256;
pub const MAX_EXTENDED_LC: usize = 65535;
pub const MAX_EXTENDED_LE: usize = 65536;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandApdu {
    class: ClassByte,
    instruction: InstructionCode,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    ne: usize,
}

impl CommandApdu {
    /// `ne` is the maximum number of response bytes expected, 0 when none.
    pub fn new(class: ClassByte, instruction: InstructionCode, p1: u8, p2: u8, data: Vec<u8>, ne: usize) -> Result<Self> {
        ensure!(
            data.len() <= MAX_EXTENDED_LC && ne <= MAX_EXTENDED_LE,
            LengthOutOfRangeSnafu { nc: data.len(), ne }
        );

        Ok(Self {
            class,
            instruction,
            p1,
            p2,
            data,
            ne,
        })
    }

    /// GET RESPONSE on the logical channel of `class`, chaining cleared.
    pub fn get_response(class: &ClassByte, ne: usize) -> Result<Self> {
        Self::new(class.without_chaining(), Ins::GetResponse.into(), 0x00, 0x00, Vec::new(), ne)
    }

    /// Copy of this command expecting `ne` response bytes.
    pub fn with_ne(&self, ne: usize) -> Result<Self> {
        Self::new(self.class, self.instruction, self.p1, self.p2, self.data.clone(), ne)
    }

    pub fn class(&self) -> &ClassByte {
        &self.class
    }

    pub fn instruction(&self) -> &InstructionCode {
        &self.instruction
    }

    pub fn p1(&self) -> u8 {
        self.p1
    }

    pub fn p2(&self) -> u8 {
        self.p2
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn ne(&self) -> usize {
        self.ne
    }

    pub fn is_extended(&self) -> bool {
        self.data.len() > MAX_SHORT_LC || self.ne > MAX_SHORT_LE
    }

    pub fn encode(&self) -> Vec<u8> {
        let nc = self.data.len();
        let extended = self.is_extended();

        let mut packet = Vec::with_capacity(4 + 3 + nc + 2);
        packet.extend_from_slice(&[self.class.encode(), self.instruction.raw(), self.p1, self.p2]);

        if nc > 0 {
            if extended {
                let mut lc = [0u8; 2];
                BigEndian::write_u16(&mut lc, nc as u16);
                packet.push(0x00);
                packet.extend_from_slice(&lc);
            } else {
                packet.push(nc as u8);
            }
            packet.extend_from_slice(&self.data);
        }

        if self.ne > 0 {
            if extended {
                if nc == 0 {
                    packet.push(0x00);
                }
                // 65536 wraps to 0x0000
                let mut le = [0u8; 2];
                BigEndian::write_u16(&mut le, (self.ne % MAX_EXTENDED_LE) as u16);
                packet.extend_from_slice(&le);
            } else {
                // 256 wraps to 0x00
                packet.push((self.ne % MAX_SHORT_LE) as u8);
            }
        }

        packet
    }
}

impl fmt::Display for CommandApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | P1: {:02X}, P2: {:02X} | Lc: {} | Le: {}",
            self.instruction,
            self.p1,
            self.p2,
            self.data.len(),
            self.ne
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    data: Vec<u8>,
    status: StatusWord,
}

impl ResponseApdu {
    pub fn new(data: Vec<u8>, status: StatusWord) -> Self {
        Self { data, status }
    }

    pub fn parse(raw: &[u8]) -> Result<Self> {
        ensure!(raw.len() >= 2, ResponseTooShortSnafu { length: raw.len() });

        let (data, trailer) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            status: StatusWord::from_bytes(trailer[0], trailer[1]),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn status(&self) -> StatusWord {
        self.status
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut packet = self.data.clone();
        packet.extend_from_slice(&[self.status.sw1(), self.status.sw2()]);
        packet
    }
}

impl fmt::Display for ResponseApdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data ({} bytes) | Status: {}", self.data.len(), self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn command(ins: u8, p1: u8, p2: u8, data: Vec<u8>, ne: usize) -> CommandApdu {
        CommandApdu::new(ClassByte::default(), InstructionCode::decode(ins).unwrap(), p1, p2, data, ne).unwrap()
    }

    #[test]
    fn case_1() {
        let cmd = command(0xA4, 0x01, 0x02, vec![], 0);
        assert_eq!(cmd.encode(), hex::decode("00A40102").unwrap());
    }

    #[test]
    fn case_2_short() {
        let cmd = command(0xB0, 0x00, 0x00, vec![], 256);
        assert_eq!(cmd.encode(), hex::decode("00B0000000").unwrap(), "Le 256 is encoded as 00");

        let cmd = command(0xB0, 0x00, 0x00, vec![], 16);
        assert_eq!(cmd.encode(), hex::decode("00B0000010").unwrap());
    }

    #[test]
    fn case_3_short() {
        let cmd = command(0xA4, 0x04, 0x00, vec![0xA0, 0x00], 0);
        assert_eq!(cmd.encode(), hex::decode("00A4040002A000").unwrap());
    }

    #[test]
    fn case_4_short() {
        let cmd = command(0xA4, 0x00, 0x00, vec![0x01], 10);
        assert_eq!(cmd.encode(), hex::decode("00A4000001010A").unwrap());
    }

    #[test]
    fn case_2_extended() {
        let cmd = command(0xB0, 0x00, 0x00, vec![], 65536);
        assert_eq!(cmd.encode(), hex::decode("00B00000000000").unwrap(), "Le 65536 is encoded as 00 0000");

        let cmd = command(0xB0, 0x00, 0x00, vec![], 257);
        assert_eq!(cmd.encode(), hex::decode("00B00000000101").unwrap());
    }

    #[test]
    fn case_3_extended() {
        let cmd = command(0xA4, 0x00, 0x00, vec![0u8; 260], 0);
        let encoded = cmd.encode();
        assert_eq!(&encoded[..7], &hex::decode("00A40000000104").unwrap()[..]);
        assert_eq!(encoded.len(), 7 + 260);
        assert!(encoded[7..].iter().all(|b| *b == 0));
    }

    #[test]
    fn case_4_extended() {
        let cmd = command(0xA4, 0x00, 0x00, vec![0x01, 0x02], 300);
        assert_eq!(
            cmd.encode(),
            hex::decode("00A400000000020102012C").unwrap(),
            "No disambiguator before Le when data was written"
        );
    }

    #[test]
    fn extended_iff_lengths_exceed_short_range() {
        for nc in [0usize, 1, 255, 256, 300] {
            for ne in [0usize, 1, 256, 257, 65536] {
                let cmd = command(0xB0, 0x00, 0x00, vec![0x11; nc], ne);
                assert_eq!(cmd.is_extended(), nc > 255 || ne > 256, "nc {nc}, ne {ne}");

                let encoded = cmd.encode();
                let body = &encoded[4..];
                let short_len = usize::from(nc > 0) + nc + usize::from(ne > 0);
                if cmd.is_extended() {
                    assert_ne!(body.len(), short_len, "nc {nc}, ne {ne} must not use short lengths");
                } else {
                    assert_eq!(body.len(), short_len, "nc {nc}, ne {ne} must use short lengths");
                }
            }
        }
    }

    #[test]
    fn lengths_out_of_range() {
        let result = CommandApdu::new(ClassByte::default(), Ins::ReadBinary.into(), 0, 0, vec![], 65537);
        assert!(matches!(result, Err(Error::LengthOutOfRange { ne: 65537, .. })));

        let result = CommandApdu::new(ClassByte::default(), Ins::UpdateBinary.into(), 0, 0, vec![0; 65536], 0);
        assert!(matches!(result, Err(Error::LengthOutOfRange { nc: 65536, .. })));
    }

    #[test]
    fn corrected_ne_leaves_original_untouched() {
        let original = command(0xB2, 0x01, 0x0C, vec![], 256);
        let corrected = original.with_ne(5).unwrap();
        assert_eq!(original.ne(), 256);
        assert_eq!(corrected.ne(), 5);
        assert_eq!(corrected.encode(), hex::decode("00B2010C05").unwrap());
    }

    #[test]
    fn get_response_keeps_channel() {
        let class = ClassByte::decode(0x13).unwrap();
        let cmd = CommandApdu::get_response(&class, 0x2B).unwrap();
        assert_eq!(cmd.encode(), hex::decode("03C000002B").unwrap(), "Chaining cleared, channel 3 kept");
    }

    #[test]
    fn parse_response() {
        let response = ResponseApdu::parse(&hex::decode("01029000").unwrap()).unwrap();
        assert_eq!(response.data(), &[0x01, 0x02]);
        assert_eq!(response.status(), StatusWord::NO_ERROR);

        let response = ResponseApdu::parse(&[0x6A, 0x82]).unwrap();
        assert!(response.data().is_empty());
        assert_eq!(response.status().sw1(), 0x6A);
        assert_eq!(response.status().sw2(), 0x82);
        assert_eq!(response.encode(), vec![0x6A, 0x82]);
    }

    #[test]
    fn response_too_short() {
        assert!(matches!(ResponseApdu::parse(&[0x90]), Err(Error::ResponseTooShort { length: 1 })));
        assert!(matches!(ResponseApdu::parse(&[]), Err(Error::ResponseTooShort { length: 0 })));
    }

    #[test]
    fn display() {
        let cmd = CommandApdu::new(ClassByte::default(), Ins::Select.into(), 0x04, 0x00, vec![0xA0; 7], 256).unwrap();
        assert_eq!(cmd.to_string(), "SELECT (A4) | P1: 04, P2: 00 | Lc: 7 | Le: 256");
    }
}
