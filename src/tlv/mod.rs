pub mod ber;
pub mod mapper;

use snafu::ResultExt;

pub use ber::TagNode;
pub use mapper::{map_nodes, nested, Cardinality, DataObject, Field, Format, Schema};

use crate::error::{Result, TlvDecodeFailureSnafu};

pub fn decode(data: &[u8]) -> Result<Vec<TagNode>> {
    ber::decode(data).context(TlvDecodeFailureSnafu)
}

pub fn encode(nodes: &[TagNode]) -> Result<Vec<u8>> {
    ber::encode(nodes).context(TlvDecodeFailureSnafu)
}

/// Effective value of the first top level data object tagged `tag`, `None`
/// when absent.
pub fn value_of(data: &[u8], tag: &str) -> Result<Option<Vec<u8>>> {
    ber::value_of(data, tag).context(TlvDecodeFailureSnafu)
}
