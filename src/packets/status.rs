use std::fmt;

use crate::bits::get_range;

// Status word (SW1 SW2)
// ISO/IEC 7816-4 section 5.6
//
// Dynamic ranges carry a value in SW2:
//   61XX  process completed, XX more bytes available with GET RESPONSE
//   6CXX  wrong Le, XX is the exact length
//   62XX  warning triggered by the card, XX in 02..=80
//   64XX  error triggered by the card, XX in 02..=80
//   63CX  NV memory changed, X is a counter (retries left)
//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
    Unknown,
}

/// Interpretation of a status word, the first matching rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 62XX / 64XX with XX in 02..=80, the card expects a query of XX bytes
    TriggeringByCard { error: bool, length: u8 },
    /// 63CX
    Counter(u8),
    /// 61XX
    MoreAvailable(u8),
    /// 6CXX
    WrongLength(u8),
    /// 9000
    Success,
    /// 62XX, 63XX
    Warning,
    /// 64XX to 6FXX
    Error,
    Unclassified,
}

impl Classification {
    pub fn severity(&self) -> Severity {
        match self {
            Classification::TriggeringByCard { error: true, .. } => Severity::Error,
            Classification::TriggeringByCard { error: false, .. } => Severity::Warning,
            Classification::Counter(_) => Severity::Warning,
            Classification::MoreAvailable(_) => Severity::Success,
            Classification::WrongLength(_) => Severity::Error,
            Classification::Success => Severity::Success,
            Classification::Warning => Severity::Warning,
            Classification::Error => Severity::Error,
            Classification::Unclassified => Severity::Unknown,
        }
    }
}

impl StatusWord {
    pub const NO_ERROR: Self = Self(0x9000);

    pub const WARN_NO_INFO: Self = Self(0x6200);
    pub const WARN_TRIGGERING_BY_CARD: Self = Self(0x6202);
    pub const WARN_DATA_CORRUPTED: Self = Self(0x6281);
    pub const WARN_EOF_REACHED: Self = Self(0x6282);
    pub const WARN_FILE_DEACTIVATED: Self = Self(0x6283);
    pub const WARN_FCI_BAD_FORMAT: Self = Self(0x6284);
    pub const WARN_TERMINATION_STATE: Self = Self(0x6285);
    pub const WARN_NO_INPUT_FROM_SENSOR: Self = Self(0x6286);

    pub const WARN_NV_CHANGED_NO_INFO: Self = Self(0x6300);
    pub const WARN_FILE_FILLED: Self = Self(0x6381);
    pub const WARN_COUNTER_0: Self = Self(0x63C0);

    pub const EXEC_NO_INFO: Self = Self(0x6400);
    pub const EXEC_IMMEDIATE_RESPONSE: Self = Self(0x6401);
    pub const EXEC_TRIGGERING_BY_CARD: Self = Self(0x6402);

    pub const NV_CHANGED_NO_INFO: Self = Self(0x6500);
    pub const MEMORY_FAILURE: Self = Self(0x6581);
    pub const SECURITY_ISSUE: Self = Self(0x6600);

    pub const WRONG_LENGTH: Self = Self(0x6700);
    pub const CHECKING_NO_INFO: Self = Self(0x6800);
    pub const LOGICAL_CHANNEL_NOT_SUPPORTED: Self = Self(0x6881);
    pub const SECURE_MESSAGING_NOT_SUPPORTED: Self = Self(0x6882);
    pub const LAST_COMMAND_EXPECTED: Self = Self(0x6883);
    pub const CHAINING_NOT_SUPPORTED: Self = Self(0x6884);

    pub const COMMAND_NOT_ALLOWED: Self = Self(0x6900);
    pub const COMMAND_INCOMPATIBLE_FILE: Self = Self(0x6981);
    pub const SECURITY_STATUS_NOT_SATISFIED: Self = Self(0x6982);
    pub const AUTHENTICATION_METHOD_BLOCKED: Self = Self(0x6983);
    pub const REFERENCE_DATA_NOT_USABLE: Self = Self(0x6984);
    pub const CONDITIONS_OF_USE_NOT_SATISFIED: Self = Self(0x6985);
    pub const COMMAND_NOT_ALLOWED_NO_EF: Self = Self(0x6986);
    pub const SM_OBJECTS_MISSING: Self = Self(0x6987);
    pub const SM_OBJECTS_INCORRECT: Self = Self(0x6988);

    pub const WRONG_PARAMETERS: Self = Self(0x6A00);
    pub const INCORRECT_PARAMETERS_DATA: Self = Self(0x6A80);
    pub const FUNCTION_NOT_SUPPORTED: Self = Self(0x6A81);
    pub const FILE_NOT_FOUND: Self = Self(0x6A82);
    pub const RECORD_NOT_FOUND: Self = Self(0x6A83);
    pub const NOT_ENOUGH_MEMORY: Self = Self(0x6A84);
    pub const NC_INCONSISTENT_WITH_TLV: Self = Self(0x6A85);
    pub const INCORRECT_P1_P2: Self = Self(0x6A86);
    pub const NC_INCONSISTENT_WITH_P1_P2: Self = Self(0x6A87);
    pub const REFERENCE_DATA_NOT_FOUND: Self = Self(0x6A88);
    pub const FILE_ALREADY_EXISTS: Self = Self(0x6A89);
    pub const DF_NAME_ALREADY_EXISTS: Self = Self(0x6A8A);

    pub const WRONG_P1_P2: Self = Self(0x6B00);
    pub const INS_NOT_SUPPORTED: Self = Self(0x6D00);
    pub const CLA_NOT_SUPPORTED: Self = Self(0x6E00);
    pub const NO_PRECISE_DIAGNOSIS: Self = Self(0x6F00);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn from_bytes(sw1: u8, sw2: u8) -> Self {
        Self((sw1 as u16) << 8 | sw2 as u16)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn sw1(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn sw2(&self) -> u8 {
        self.0 as u8
    }

    pub fn classify(&self) -> Classification {
        let sw1 = self.sw1();
        let sw2 = self.sw2();

        match sw1 {
            0x62 | 0x64 if (0x02..=0x80).contains(&sw2) => Classification::TriggeringByCard {
                error: sw1 == 0x64,
                length: sw2,
            },
            0x63 if get_range(sw2, 8, 5) == 0x0C => Classification::Counter(get_range(sw2, 4, 1)),
            0x61 => Classification::MoreAvailable(sw2),
            0x6C => Classification::WrongLength(sw2),
            _ if *self == Self::NO_ERROR => Classification::Success,
            0x62 | 0x63 => Classification::Warning,
            0x64..=0x6F => Classification::Error,
            _ => Classification::Unclassified,
        }
    }

    /// 9000 or 61XX
    pub fn is_success(&self) -> bool {
        *self == Self::NO_ERROR || self.sw1() == 0x61
    }

    pub fn is_warning(&self) -> bool {
        self.classify().severity() == Severity::Warning
    }

    pub fn is_error(&self) -> bool {
        self.classify().severity() == Severity::Error
    }

    /// Bytes still available with GET RESPONSE (61XX)
    pub fn bytes_available(&self) -> Option<u8> {
        match self.classify() {
            Classification::MoreAvailable(length) => Some(length),
            _ => None,
        }
    }

    /// Exact Le to retry with (6CXX)
    pub fn correct_length(&self) -> Option<u8> {
        match self.classify() {
            Classification::WrongLength(length) => Some(length),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&'static str> {
        DESCRIPTIONS
            .iter()
            .find(|(status, _)| *status == *self)
            .map(|(_, description)| *description)
    }

    fn category_description(&self) -> &'static str {
        match self.sw1() {
            0x62 => "Warning: NV memory unchanged",
            0x63 => "Warning: NV memory changed",
            0x64 => "Execution error: NV memory unchanged",
            0x65 => "Execution error: NV memory changed",
            0x66 => "Execution error: security issue",
            0x68 => "Checking error: function not supported",
            0x69 => "Checking error: command not allowed",
            0x6A => "Checking error: wrong parameters",
            _ => "Unknown status",
        }
    }
}

impl From<u16> for StatusWord {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.0
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.classify() {
            Classification::TriggeringByCard { error: false, length } => {
                write!(f, "Warning (triggering): card expects query of {} bytes", length)
            }
            Classification::TriggeringByCard { error: true, length } => {
                write!(f, "Error/abort (triggering): card expects query of {} bytes", length)
            }
            Classification::Counter(counter) => write!(f, "Warning: state changed, counter = {}", counter),
            Classification::MoreAvailable(length) => write!(f, "Process completed, {} bytes available", length),
            Classification::WrongLength(length) => write!(f, "Wrong length, correct Le is {}", length),
            _ => match self.description() {
                Some(description) => write!(f, "[{:04X}] {}", self.0, description),
                None => write!(f, "[{:04X}] {}", self.0, self.category_description()),
            },
        }
    }
}

static DESCRIPTIONS: &[(StatusWord, &str)] = &[
    (StatusWord::NO_ERROR, "Process completed normally"),
    (StatusWord::WARN_NO_INFO, "Warning: no information given"),
    (StatusWord::WARN_TRIGGERING_BY_CARD, "Warning: triggering by the card"),
    (StatusWord::WARN_DATA_CORRUPTED, "Warning: part of returned data may be corrupted"),
    (StatusWord::WARN_EOF_REACHED, "Warning: end of file or record reached before reading Ne bytes"),
    (StatusWord::WARN_FILE_DEACTIVATED, "Warning: selected file deactivated"),
    (StatusWord::WARN_FCI_BAD_FORMAT, "Warning: file control information not formatted"),
    (StatusWord::WARN_TERMINATION_STATE, "Warning: selected file in termination state"),
    (StatusWord::WARN_NO_INPUT_FROM_SENSOR, "Warning: no input data available from a sensor"),
    (StatusWord::WARN_NV_CHANGED_NO_INFO, "Warning: NV memory changed, no information given"),
    (StatusWord::WARN_FILE_FILLED, "Warning: file filled up by the last write"),
    (StatusWord::WARN_COUNTER_0, "Warning: counter reached 0"),
    (StatusWord::EXEC_NO_INFO, "Execution error: NV memory unchanged, no information given"),
    (StatusWord::EXEC_IMMEDIATE_RESPONSE, "Execution error: immediate response required by the card"),
    (StatusWord::EXEC_TRIGGERING_BY_CARD, "Execution error: triggering by the card"),
    (StatusWord::NV_CHANGED_NO_INFO, "Execution error: NV memory changed, no information given"),
    (StatusWord::MEMORY_FAILURE, "Execution error: memory failure"),
    (StatusWord::SECURITY_ISSUE, "Execution error: security issue"),
    (StatusWord::WRONG_LENGTH, "Wrong length, no further indication"),
    (StatusWord::CHECKING_NO_INFO, "Checking error: function in CLA not supported"),
    (StatusWord::LOGICAL_CHANNEL_NOT_SUPPORTED, "Checking error: logical channel not supported"),
    (StatusWord::SECURE_MESSAGING_NOT_SUPPORTED, "Checking error: secure messaging not supported"),
    (StatusWord::LAST_COMMAND_EXPECTED, "Checking error: last command of the chain expected"),
    (StatusWord::CHAINING_NOT_SUPPORTED, "Checking error: command chaining not supported"),
    (StatusWord::COMMAND_NOT_ALLOWED, "Checking error: command not allowed"),
    (StatusWord::COMMAND_INCOMPATIBLE_FILE, "Checking error: command incompatible with file structure"),
    (StatusWord::SECURITY_STATUS_NOT_SATISFIED, "Checking error: security status not satisfied"),
    (StatusWord::AUTHENTICATION_METHOD_BLOCKED, "Checking error: authentication method blocked"),
    (StatusWord::REFERENCE_DATA_NOT_USABLE, "Checking error: reference data not usable"),
    (StatusWord::CONDITIONS_OF_USE_NOT_SATISFIED, "Checking error: conditions of use not satisfied"),
    (StatusWord::COMMAND_NOT_ALLOWED_NO_EF, "Checking error: command not allowed, no current EF"),
    (StatusWord::SM_OBJECTS_MISSING, "Checking error: expected secure messaging data objects missing"),
    (StatusWord::SM_OBJECTS_INCORRECT, "Checking error: incorrect secure messaging data objects"),
    (StatusWord::WRONG_PARAMETERS, "Checking error: wrong parameters, no information given"),
    (StatusWord::INCORRECT_PARAMETERS_DATA, "Checking error: incorrect parameters in the command data field"),
    (StatusWord::FUNCTION_NOT_SUPPORTED, "Checking error: function not supported"),
    (StatusWord::FILE_NOT_FOUND, "Checking error: file or application not found"),
    (StatusWord::RECORD_NOT_FOUND, "Checking error: record not found"),
    (StatusWord::NOT_ENOUGH_MEMORY, "Checking error: not enough memory space in the file"),
    (StatusWord::NC_INCONSISTENT_WITH_TLV, "Checking error: Nc inconsistent with TLV structure"),
    (StatusWord::INCORRECT_P1_P2, "Checking error: incorrect parameters P1-P2"),
    (StatusWord::NC_INCONSISTENT_WITH_P1_P2, "Checking error: Nc inconsistent with parameters P1-P2"),
    (StatusWord::REFERENCE_DATA_NOT_FOUND, "Checking error: referenced data or reference data not found"),
    (StatusWord::FILE_ALREADY_EXISTS, "Checking error: file already exists"),
    (StatusWord::DF_NAME_ALREADY_EXISTS, "Checking error: DF name already exists"),
    (StatusWord::WRONG_P1_P2, "Checking error: wrong parameters P1-P2"),
    (StatusWord::INS_NOT_SUPPORTED, "Checking error: instruction code not supported or invalid"),
    (StatusWord::CLA_NOT_SUPPORTED, "Checking error: class not supported"),
    (StatusWord::NO_PRECISE_DIAGNOSIS, "Checking error: no precise diagnosis"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split() {
        let status = StatusWord::from_bytes(0x6A, 0x82);
        assert_eq!(status, StatusWord::FILE_NOT_FOUND);
        assert_eq!(status.sw1(), 0x6A);
        assert_eq!(status.sw2(), 0x82);
        assert_eq!(u16::from(status), 0x6A82);
    }

    #[test]
    fn dynamic_classes() {
        assert_eq!(
            StatusWord::new(0x6210).classify(),
            Classification::TriggeringByCard { error: false, length: 0x10 }
        );
        assert_eq!(
            StatusWord::new(0x6480).classify(),
            Classification::TriggeringByCard { error: true, length: 0x80 }
        );
        assert_eq!(StatusWord::new(0x63C3).classify(), Classification::Counter(3));
        assert_eq!(StatusWord::new(0x612B).classify(), Classification::MoreAvailable(0x2B));
        assert_eq!(StatusWord::new(0x6C05).classify(), Classification::WrongLength(5));
    }

    #[test]
    fn triggering_bounds() {
        assert_eq!(StatusWord::new(0x6201).classify(), Classification::Warning, "01 is below the triggering range");
        assert_eq!(StatusWord::new(0x6281).classify(), Classification::Warning, "81 is above the triggering range");
        assert_eq!(StatusWord::new(0x6401).classify(), Classification::Error);
    }

    #[test]
    fn generic_classes() {
        assert_eq!(StatusWord::NO_ERROR.classify(), Classification::Success);
        assert_eq!(StatusWord::new(0x6300).classify(), Classification::Warning);
        assert_eq!(StatusWord::FILE_NOT_FOUND.classify(), Classification::Error);
        assert_eq!(StatusWord::new(0x6F00).classify(), Classification::Error);
        assert_eq!(StatusWord::new(0x9001).classify(), Classification::Unclassified);
        assert_eq!(StatusWord::new(0x7000).classify(), Classification::Unclassified);
    }

    #[test]
    fn success() {
        assert!(StatusWord::NO_ERROR.is_success());
        assert!(StatusWord::new(0x6110).is_success());
        assert!(!StatusWord::new(0x6C05).is_success());
        assert!(!StatusWord::WARN_EOF_REACHED.is_success());
        assert!(StatusWord::new(0x6C05).is_error());
    }

    #[test]
    fn exclusive_severity() {
        for value in 0..=u16::MAX {
            let status = StatusWord::new(value);
            let flags = [status.is_success(), status.is_warning(), status.is_error()];
            assert!(
                flags.iter().filter(|flag| **flag).count() <= 1,
                "{value:04X} has more than one severity"
            );
        }
    }

    #[test]
    fn display_prefers_dynamic_interpretation() {
        assert_eq!(StatusWord::new(0x612B).to_string(), "Process completed, 43 bytes available");
        assert_eq!(StatusWord::new(0x6C05).to_string(), "Wrong length, correct Le is 5");
        assert_eq!(StatusWord::new(0x63C2).to_string(), "Warning: state changed, counter = 2");
        assert_eq!(
            StatusWord::WARN_TRIGGERING_BY_CARD.to_string(),
            "Warning (triggering): card expects query of 2 bytes",
            "Dynamic range wins over the static table"
        );
        assert_eq!(
            StatusWord::new(0x6405).to_string(),
            "Error/abort (triggering): card expects query of 5 bytes"
        );
    }

    #[test]
    fn display_static_and_category() {
        assert_eq!(StatusWord::NO_ERROR.to_string(), "[9000] Process completed normally");
        assert_eq!(StatusWord::FILE_NOT_FOUND.to_string(), "[6A82] Checking error: file or application not found");
        assert_eq!(StatusWord::new(0x6A90).to_string(), "[6A90] Checking error: wrong parameters");
        assert_eq!(StatusWord::new(0x6581).to_string(), "[6581] Execution error: memory failure");
        assert_eq!(StatusWord::new(0x6599).to_string(), "[6599] Execution error: NV memory changed");
        assert_eq!(StatusWord::new(0x9100).to_string(), "[9100] Unknown status");
    }
}
