use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use encoding::all::ISO_8859_1;
use encoding::{DecoderTrap, Encoding};
use log::trace;
use snafu::{ensure, ResultExt, Whatever};
use std::io::Cursor;

use crate::error::{MappingTargetInvalidSnafu, Result, TlvDecodeFailureSnafu};
use crate::tlv::ber::{read_length, read_tag, TagNode};

// Tag directed mapping
//
// A schema is a static table of fields. Fields are matched in declaration
// order against the sibling nodes not consumed yet: a single field takes the
// first match, a repeated field every match. Whatever is left goes to the
// schema catch-all, in encounter order, or is dropped when there is none.
//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Repeated,
}

/// How a value is rendered in logs. The mapped value is the same whatever
/// the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Hex,
    Ascii,
    Int,
}

/// Element of a data object list: a tag and the length expected for it,
/// without value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataObject {
    pub tag: String,
    pub length: usize,
}

pub enum Decoder<T> {
    /// Big endian unsigned integer, 1 to 8 bytes
    Integer(fn(&mut T, u64)),
    /// ISO 8859-1 text
    Text(fn(&mut T, String)),
    /// Tag and length pairs (PDOL, CDOL, ...)
    DataObjectList(fn(&mut T, Vec<DataObject>)),
}

pub enum Kind<T> {
    /// Raw value, or the children encoded back for constructed nodes
    Bytes(fn(&mut T, Vec<u8>)),
    /// Upper case hex of the raw value
    HexString(fn(&mut T, String)),
    /// Mapped with another schema, see [`nested`]
    Nested(fn(&mut T, &TagNode) -> Result<()>),
    Custom(Decoder<T>),
}

pub struct Field<T> {
    pub tag: &'static str,
    pub name: &'static str,
    pub cardinality: Cardinality,
    pub kind: Kind<T>,
    pub format: Format,
}

impl<T> Field<T> {
    fn new(tag: &'static str, name: &'static str, kind: Kind<T>) -> Self {
        Self {
            tag,
            name,
            cardinality: Cardinality::Single,
            kind,
            format: Format::Hex,
        }
    }

    pub fn bytes(tag: &'static str, name: &'static str, set: fn(&mut T, Vec<u8>)) -> Self {
        Self::new(tag, name, Kind::Bytes(set))
    }

    pub fn hex_string(tag: &'static str, name: &'static str, set: fn(&mut T, String)) -> Self {
        Self::new(tag, name, Kind::HexString(set))
    }

    pub fn nested(tag: &'static str, name: &'static str, set: fn(&mut T, &TagNode) -> Result<()>) -> Self {
        Self::new(tag, name, Kind::Nested(set))
    }

    pub fn integer(tag: &'static str, name: &'static str, set: fn(&mut T, u64)) -> Self {
        Self::new(tag, name, Kind::Custom(Decoder::Integer(set))).format(Format::Int)
    }

    pub fn text(tag: &'static str, name: &'static str, set: fn(&mut T, String)) -> Self {
        Self::new(tag, name, Kind::Custom(Decoder::Text(set))).format(Format::Ascii)
    }

    pub fn data_object_list(tag: &'static str, name: &'static str, set: fn(&mut T, Vec<DataObject>)) -> Self {
        Self::new(tag, name, Kind::Custom(Decoder::DataObjectList(set)))
    }

    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    fn apply(&self, target: &mut T, node: &TagNode) -> Result<()> {
        match &self.kind {
            Kind::Bytes(set) => {
                let value = node.effective_value().context(TlvDecodeFailureSnafu)?;
                trace!("{} ({}) = {}", self.name, self.tag, render(self.format, &value));
                set(target, value);
            }
            Kind::HexString(set) => {
                trace!("{} ({}) = {}", self.name, self.tag, render(self.format, &node.value));
                set(target, hex::encode_upper(&node.value));
            }
            Kind::Nested(set) => {
                trace!("{} ({}) mapped as template", self.name, self.tag);
                set(target, node)?;
            }
            Kind::Custom(decoder) => {
                let value = node.effective_value().context(TlvDecodeFailureSnafu)?;
                trace!("{} ({}) = {}", self.name, self.tag, render(self.format, &value));
                decoder.decode(target, self.tag, &value)?;
            }
        }
        Ok(())
    }
}

impl<T> Decoder<T> {
    fn decode(&self, target: &mut T, tag: &str, value: &[u8]) -> Result<()> {
        match self {
            Decoder::Integer(set) => {
                ensure!(
                    !value.is_empty() && value.len() <= 8,
                    MappingTargetInvalidSnafu {
                        tag,
                        reason: format!("{} bytes do not fit an integer", value.len()),
                    }
                );
                set(target, BigEndian::read_uint(value, value.len()));
            }
            Decoder::Text(set) => {
                let text = ISO_8859_1
                    .decode(value, DecoderTrap::Strict)
                    .map_err(|e| MappingTargetInvalidSnafu { tag, reason: e.to_string() }.build())?;
                set(target, text);
            }
            Decoder::DataObjectList(set) => {
                let list = parse_data_object_list(value).map_err(|e| {
                    MappingTargetInvalidSnafu {
                        tag,
                        reason: e.to_string(),
                    }
                    .build()
                })?;
                set(target, list);
            }
        }
        Ok(())
    }
}

pub fn parse_data_object_list(data: &[u8]) -> std::result::Result<Vec<DataObject>, Whatever> {
    let mut reader = Cursor::new(data);
    let mut list = Vec::new();

    while (reader.position() as usize) < data.len() {
        let first = reader.read_u8().whatever_context("Unable to read data object tag")?;
        let tag = read_tag(first, &mut reader)?;
        let length = read_length(&mut reader)?;
        list.push(DataObject { tag, length });
    }

    Ok(list)
}

fn render(format: Format, value: &[u8]) -> String {
    match format {
        Format::Hex => hex::encode_upper(value),
        Format::Ascii => format!("\"{}\"", String::from_utf8_lossy(value)),
        Format::Int if !value.is_empty() && value.len() <= 8 => BigEndian::read_uint(value, value.len()).to_string(),
        Format::Int => hex::encode_upper(value),
    }
}

/// Structure a tag tree can be mapped onto.
pub trait Schema: Default + 'static {
    const NAME: &'static str;

    fn fields() -> &'static [Field<Self>];

    /// Slot receiving the nodes no field consumed
    fn unknown(&mut self) -> Option<&mut Vec<TagNode>> {
        None
    }
}

pub fn map_nodes<S: Schema>(nodes: &[TagNode]) -> Result<S> {
    let mut target = S::default();
    let mut consumed = vec![false; nodes.len()];

    for field in S::fields() {
        for (index, node) in nodes.iter().enumerate() {
            if consumed[index] || !node.has_tag(field.tag) {
                continue;
            }
            consumed[index] = true;
            field.apply(&mut target, node)?;
            if field.cardinality == Cardinality::Single {
                break;
            }
        }
    }

    let leftovers = nodes
        .iter()
        .zip(&consumed)
        .filter(|(_, consumed)| !**consumed)
        .map(|(node, _)| node);
    match target.unknown() {
        Some(unknown) => unknown.extend(leftovers.cloned()),
        None => {
            for node in leftovers {
                trace!("{}: dropping unmapped tag {}", S::NAME, node.tag);
            }
        }
    }

    Ok(target)
}

/// Decodes `data` and maps the top level nodes onto `S`.
pub fn decode<S: Schema>(data: &[u8]) -> Result<S> {
    let nodes = crate::tlv::decode(data)?;
    map_nodes(&nodes)
}

/// Maps the content of a template: its children, or its raw value decoded
/// again when the template came in as a primitive node.
pub fn nested<S: Schema>(node: &TagNode) -> Result<S> {
    if node.children.is_empty() {
        decode(&node.value)
    } else {
        map_nodes(&node.children)
    }
}
