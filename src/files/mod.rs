pub mod fci;
pub mod read_record_result;
pub mod select_result;

pub use fci::{parse_select_data, resolve_select_response, Fcp, FileControlInfo, Fmd};
pub use read_record_result::ReadRecordResult;
pub use select_result::SelectResult;
