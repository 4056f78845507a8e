use snafu::{ensure, OptionExt};

use crate::error::{EmptyTraceSnafu, Result, UnexpectedInstructionSnafu};
use crate::packets::instruction::Ins;
use crate::packets::read_record::ReadRecordMode;
use crate::transport::trace::Trace;

#[derive(Debug, Clone)]
pub struct ReadRecordResult {
    trace: Trace,
    p1: u8,
    p2: u8,
}

impl ReadRecordResult {
    pub fn new(trace: Trace) -> Result<Self> {
        let first = trace.first().context(EmptyTraceSnafu)?;
        let found = *first.command().instruction();
        ensure!(
            found == Ins::ReadRecord,
            UnexpectedInstructionSnafu {
                expected: Ins::ReadRecord,
                found
            }
        );
        let (p1, p2) = (first.command().p1(), first.command().p2());
        Ok(Self { trace, p1, p2 })
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn into_trace(self) -> Trace {
        self.trace
    }

    pub fn is_success(&self) -> bool {
        self.trace.is_success()
    }

    /// 0 addresses the currently selected EF
    pub fn short_file_identifier(&self) -> u8 {
        self.p2 >> 3
    }

    pub fn mode(&self) -> ReadRecordMode {
        ReadRecordMode::from_p2(self.p2)
    }

    /// Record number or identifier, depending on [`Self::mode`]
    pub fn record(&self) -> u8 {
        self.p1
    }

    /// Payload of the final response, empty when there is none.
    pub fn data(&self) -> &[u8] {
        self.trace.final_response().map(|response| response.data()).unwrap_or_default()
    }
}
