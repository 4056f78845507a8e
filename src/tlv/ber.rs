use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use snafu::{ensure_whatever, whatever, ResultExt, Whatever};
use std::io::{Cursor, Read};

use crate::bits::{bit, is_set};

// BER-TLV
// ISO/IEC 8825-1, ISO/IEC 7816-4 section 5.2
//
// Tag     first byte: bits 8-7 class, bit 6 constructed, bits 5-1 number.
//         Number 11111 continues on the next bytes while their bit 8 is set.
// Length  00..7F short form, 81..84 followed by 1 to 4 length bytes.
//         80 (indefinite form) is not used by ISO/IEC 7816.
// Value   for constructed tags a sequence of data objects.
//
// 00 and FF may pad the space between data objects.
//
const TAG_NUMBER_MASK: u8 = 0x1F;
const MAX_TAG_LENGTH: usize = 4;
const MAX_LENGTH_BYTES: u8 = 4;
/// Templates enclosing the deepest data object accepted by [`decode`]
pub const MAX_NESTING_DEPTH: usize = 32;

/// Decoded data object.
///
/// Constructed objects keep their content as `children` and an empty
/// `value`, primitive objects the other way round.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagNode {
    /// Upper case hex of the tag bytes, `"9F38"`
    pub tag: String,
    pub value: Vec<u8>,
    pub children: Vec<TagNode>,
}

impl TagNode {
    pub fn primitive(tag: &str, value: Vec<u8>) -> Self {
        Self {
            tag: tag.to_ascii_uppercase(),
            value,
            children: Vec::new(),
        }
    }

    pub fn constructed(tag: &str, children: Vec<TagNode>) -> Self {
        Self {
            tag: tag.to_ascii_uppercase(),
            value: Vec::new(),
            children,
        }
    }

    /// Tag comparison ignoring hex digit case
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    /// Raw value, or the children encoded back when there is none.
    pub fn effective_value(&self) -> Result<Vec<u8>, Whatever> {
        if !self.value.is_empty() || self.children.is_empty() {
            return Ok(self.value.clone());
        }
        encode(&self.children)
    }
}

/// First node of `nodes` carrying `tag`
pub fn find<'a>(nodes: &'a [TagNode], tag: &str) -> Option<&'a TagNode> {
    nodes.iter().find(|node| node.has_tag(tag))
}

pub fn decode(data: &[u8]) -> Result<Vec<TagNode>, Whatever> {
    decode_nested(data, 0)
}

fn decode_nested(data: &[u8], depth: usize) -> Result<Vec<TagNode>, Whatever> {
    ensure_whatever!(
        depth <= MAX_NESTING_DEPTH,
        "Templates nested deeper than {} levels",
        MAX_NESTING_DEPTH
    );

    let mut reader = Cursor::new(data);
    let mut nodes = Vec::new();

    while (reader.position() as usize) < data.len() {
        let first = reader.read_u8().whatever_context("Unable to read tag")?;
        if first == 0x00 || first == 0xFF {
            continue;
        }

        let tag = read_tag(first, &mut reader)?;
        let length = read_length(&mut reader).with_whatever_context(|_| format!("Unable to read length of tag {}", tag))?;

        let remaining = data.len() - reader.position() as usize;
        ensure_whatever!(
            length <= remaining,
            "Tag {} announces {} bytes but only {} remain",
            tag,
            length,
            remaining
        );

        let mut value = vec![0u8; length];
        reader
            .read_exact(&mut value)
            .with_whatever_context(|_| format!("Unable to read value of tag {}", tag))?;

        let node = if is_set(first, 6) {
            let children = decode_nested(&value, depth + 1)
                .with_whatever_context(|_| format!("Invalid content in template {}", tag))?;
            TagNode {
                tag,
                value: Vec::new(),
                children,
            }
        } else {
            TagNode {
                tag,
                value,
                children: Vec::new(),
            }
        };
        nodes.push(node);
    }

    Ok(nodes)
}

pub(crate) fn read_tag(first: u8, reader: &mut Cursor<&[u8]>) -> Result<String, Whatever> {
    let mut tag = vec![first];

    if first & TAG_NUMBER_MASK == TAG_NUMBER_MASK {
        loop {
            let next = match reader.read_u8() {
                Ok(next) => next,
                Err(e) => whatever!("Unable to read subsequent byte of tag {}: {:?}", hex::encode_upper(&tag), e),
            };
            tag.push(next);
            ensure_whatever!(
                tag.len() <= MAX_TAG_LENGTH,
                "Tag {} is longer than {} bytes",
                hex::encode_upper(&tag),
                MAX_TAG_LENGTH
            );
            if next & bit(8) == 0 {
                break;
            }
        }
    }

    Ok(hex::encode_upper(tag))
}

pub(crate) fn read_length(reader: &mut Cursor<&[u8]>) -> Result<usize, Whatever> {
    let first = reader.read_u8().whatever_context("Unable to read length")?;

    if first & bit(8) == 0 {
        return Ok(first as usize);
    }

    let count = first & 0x7F;
    ensure_whatever!(count != 0, "Indefinite length is not supported");
    ensure_whatever!(count <= MAX_LENGTH_BYTES, "Length on {} bytes is not supported", count);

    let mut length = 0usize;
    for _ in 0..count {
        let byte = reader.read_u8().whatever_context("Unable to read long form length")?;
        length = (length << 8) | byte as usize;
    }
    Ok(length)
}

pub fn encode(nodes: &[TagNode]) -> Result<Vec<u8>, Whatever> {
    let mut packet = Vec::new();
    for node in nodes {
        encode_node(node, &mut packet)?;
    }
    Ok(packet)
}

fn encode_node(node: &TagNode, packet: &mut Vec<u8>) -> Result<(), Whatever> {
    let tag = hex::decode(&node.tag).with_whatever_context(|_| format!("Invalid tag '{}'", node.tag))?;
    ensure_whatever!(
        !tag.is_empty() && tag.len() <= MAX_TAG_LENGTH,
        "Invalid tag length for '{}'",
        node.tag
    );

    let content = node.effective_value()?;
    packet.extend_from_slice(&tag);
    write_length(content.len(), packet)?;
    packet.extend_from_slice(&content);
    Ok(())
}

fn write_length(length: usize, packet: &mut Vec<u8>) -> Result<(), Whatever> {
    if length < 0x80 {
        packet.push(length as u8);
        return Ok(());
    }

    let length = match u32::try_from(length) {
        Ok(length) => length,
        Err(_) => whatever!("Length {} cannot be encoded", length),
    };
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, length);
    let skip = bytes.iter().take_while(|byte| **byte == 0).count();
    packet.push(0x80 | (4 - skip) as u8);
    packet.extend_from_slice(&bytes[skip..]);
    Ok(())
}

/// Effective value of the first top level object tagged `tag`.
pub fn value_of(data: &[u8], tag: &str) -> Result<Option<Vec<u8>>, Whatever> {
    let nodes = decode(data)?;
    match find(&nodes, tag) {
        Some(node) => Ok(Some(node.effective_value()?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_and_constructed() {
        let nodes = decode(&hex::decode("8402112250034142439F0201AAA5038201FF").unwrap()).unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], TagNode::primitive("84", vec![0x11, 0x22]));
        assert_eq!(nodes[1].value, b"ABC");
        assert_eq!(nodes[2].tag, "9F02", "Two byte tag");
        assert_eq!(nodes[3].tag, "A5");
        assert!(nodes[3].value.is_empty(), "Constructed value is held by its children");
        assert_eq!(nodes[3].children, vec![TagNode::primitive("82", vec![0xFF])]);
    }

    #[test]
    fn three_byte_tag() {
        let nodes = decode(&hex::decode("DF810102AABB").unwrap()).unwrap();
        assert_eq!(nodes[0].tag, "DF8101");
        assert_eq!(nodes[0].value, vec![0xAA, 0xBB]);
    }

    #[test]
    fn long_form_lengths() {
        let mut data = hex::decode("5A8180").unwrap();
        data.extend_from_slice(&[0x11; 0x80]);
        let nodes = decode(&data).unwrap();
        assert_eq!(nodes[0].value.len(), 0x80);

        let mut data = hex::decode("5A820100").unwrap();
        data.extend_from_slice(&[0x22; 0x100]);
        let nodes = decode(&data).unwrap();
        assert_eq!(nodes[0].value.len(), 0x100);
        assert_eq!(encode(&nodes).unwrap(), data, "Minimal long form is kept");
    }

    #[test]
    fn padding_is_skipped() {
        let nodes = decode(&hex::decode("00500141FF00870101").unwrap()).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].tag, "50");
        assert_eq!(nodes[1].tag, "87");
    }

    #[test]
    fn malformed_input() {
        assert!(decode(&hex::decode("6F0584").unwrap()).is_err(), "Value shorter than announced");
        assert!(decode(&hex::decode("50").unwrap()).is_err(), "Missing length");
        assert!(decode(&hex::decode("9F").unwrap()).is_err(), "Missing subsequent tag byte");
        assert!(decode(&hex::decode("508001020000").unwrap()).is_err(), "Indefinite length");
        assert!(decode(&hex::decode("508501").unwrap()).is_err(), "Five length bytes");
        assert!(decode(&hex::decode("A503500541").unwrap()).is_err(), "Broken template content");
    }

    fn nest(levels: usize) -> Vec<u8> {
        let mut data = hex::decode("8001FF").unwrap();
        for _ in 0..levels {
            let length = data.len();
            let mut template = vec![0xA5, 0x82, (length >> 8) as u8, length as u8];
            template.append(&mut data);
            data = template;
        }
        data
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let nodes = decode(&nest(MAX_NESTING_DEPTH)).unwrap();
        let mut node = &nodes[0];
        for _ in 1..MAX_NESTING_DEPTH {
            node = &node.children[0];
        }
        assert_eq!(node.children, vec![TagNode::primitive("80", vec![0xFF])]);

        assert!(decode(&nest(MAX_NESTING_DEPTH + 1)).is_err(), "One template too deep");

        let data = nest(16_000);
        assert!(data.len() <= 65_536);
        assert!(decode(&data).is_err(), "Fails without exhausting the stack");
    }

    #[test]
    fn encode_children() {
        let node = TagNode::constructed(
            "a5",
            vec![TagNode::primitive("88", vec![0x01]), TagNode::primitive("5f2d", b"fren".to_vec())],
        );
        assert_eq!(node.tag, "A5");
        assert_eq!(node.effective_value().unwrap(), hex::decode("8801015F2D046672656E").unwrap());
        assert_eq!(encode(&[node]).unwrap(), hex::decode("A50A8801015F2D046672656E").unwrap());
    }

    #[test]
    fn encode_rejects_invalid_tag() {
        assert!(encode(&[TagNode::primitive("XY", vec![0x01])]).is_err());
        assert!(encode(&[TagNode::primitive("", vec![0x01])]).is_err());
    }

    #[test]
    fn lookup() {
        let data = hex::decode("840E315041592E5359532E4444463031A5088801025F2D02656E").unwrap();
        assert_eq!(value_of(&data, "84").unwrap().unwrap(), b"1PAY.SYS.DDF01");
        assert_eq!(value_of(&data, "a5").unwrap().unwrap(), hex::decode("8801025F2D02656E").unwrap());
        assert_eq!(value_of(&data, "9F38").unwrap(), None);
        assert!(value_of(&hex::decode("6F0584").unwrap(), "84").is_err());
    }
}
