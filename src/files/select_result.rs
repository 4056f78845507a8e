use snafu::{ensure, OptionExt};

use crate::error::{EmptyTraceSnafu, NoResponseDataSnafu, Result, SelectionFailedSnafu, UnexpectedInstructionSnafu};
use crate::files::fci::{resolve_select_response, FileControlInfo};
use crate::packets::instruction::Ins;
use crate::packets::select::{FileOccurrence, SelectionControl, SelectionMethod};
use crate::transport::trace::Trace;

/// Trace of a SELECT and of the follow-up commands it needed.
#[derive(Debug, Clone)]
pub struct SelectResult {
    trace: Trace,
    p1: u8,
    p2: u8,
}

impl SelectResult {
    pub fn new(trace: Trace) -> Result<Self> {
        let first = trace.first().context(EmptyTraceSnafu)?;
        let found = *first.command().instruction();
        ensure!(
            found == Ins::Select,
            UnexpectedInstructionSnafu {
                expected: Ins::Select,
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

    pub fn method(&self) -> SelectionMethod {
        SelectionMethod::from(self.p1)
    }

    pub fn occurrence(&self) -> FileOccurrence {
        FileOccurrence::from_p2(self.p2)
    }

    pub fn control(&self) -> SelectionControl {
        SelectionControl::from_p2(self.p2)
    }

    /// Content of the final response, read with the selection control of
    /// the initial SELECT.
    pub fn file_control_info(&self) -> Result<FileControlInfo> {
        ensure!(
            self.is_success(),
            SelectionFailedSnafu {
                status: self.trace.final_status()
            }
        );

        let data = self
            .trace
            .final_response()
            .map(|response| response.data())
            .filter(|data| !data.is_empty())
            .context(NoResponseDataSnafu)?;

        resolve_select_response(data, self.control())
    }
}
