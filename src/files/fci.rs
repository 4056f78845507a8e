use log::debug;
use snafu::OptionExt;
use std::sync::LazyLock;

use crate::error::{MandatoryTagMissingSnafu, Result};
use crate::packets::select::SelectionControl;
use crate::tlv::ber::find;
use crate::tlv::{self, map_nodes, nested, Field, Format, Schema, TagNode};

// File control information
// ISO/IEC 7816-4 section 7.4
//
// 6F  FCI template, wraps 62 and/or 64 or holds their content flat
// 62  FCP template, logical and security attributes of the file
// 64  FMD template, application data
//
// The content is requested by bits 4-3 of the SELECT P2, see
// [`SelectionControl`].
//
pub const FCI_TEMPLATE: &str = "6F";
pub const FCP_TEMPLATE: &str = "62";
pub const FMD_TEMPLATE: &str = "64";

/// First byte from which a response is taken as proprietary data instead
/// of a BER-TLV structure.
pub const PROPRIETARY_THRESHOLD: u8 = 0xC0;

/// File control parameters, template 62
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fcp {
    pub data_size_excluding_structure: Option<Vec<u8>>,
    pub total_file_size: Option<Vec<u8>>,
    pub file_descriptor: Option<Vec<u8>>,
    pub file_identifier: Option<String>,
    pub df_name: Option<Vec<u8>>,
    pub proprietary_information: Option<Vec<u8>>,
    pub security_attribute_proprietary: Option<Vec<u8>>,
    pub extended_fci_file_identifier: Option<Vec<u8>>,
    pub short_ef_identifier: Option<Vec<u8>>,
    pub life_cycle_status: Option<Vec<u8>>,
    pub security_attribute_referenced: Option<Vec<u8>>,
    pub security_attribute_compact: Option<Vec<u8>>,
    pub security_environment_identifier: Option<Vec<u8>>,
    pub channel_security_attribute: Option<Vec<u8>>,
    pub security_attribute_template_data: Option<Vec<u8>>,
    pub security_attribute_template_proprietary: Option<Vec<u8>>,
    pub data_object_pairs: Option<Vec<u8>>,
    pub proprietary_template: Option<Vec<u8>>,
    pub security_attribute_expanded: Option<Vec<u8>>,
    pub cryptographic_mechanism_identifier: Option<Vec<u8>>,
    pub unknown: Vec<TagNode>,
}

static FCP_FIELDS: LazyLock<Vec<Field<Fcp>>> = LazyLock::new(|| {
    type F = Field<Fcp>;
    vec![
        F::bytes("80", "Data size excluding structural information", |t, v| {
            t.data_size_excluding_structure = Some(v)
        })
        .format(Format::Int),
        F::bytes("81", "Total file size", |t, v| t.total_file_size = Some(v)).format(Format::Int),
        F::bytes("82", "File descriptor", |t, v| t.file_descriptor = Some(v)),
        F::hex_string("83", "File identifier", |t, v| t.file_identifier = Some(v)),
        F::bytes("84", "DF name", |t, v| t.df_name = Some(v)).format(Format::Ascii),
        F::bytes("85", "Proprietary information", |t, v| t.proprietary_information = Some(v)),
        F::bytes("86", "Security attribute in proprietary format", |t, v| {
            t.security_attribute_proprietary = Some(v)
        }),
        F::bytes("87", "Extended FCI file identifier", |t, v| t.extended_fci_file_identifier = Some(v)),
        F::bytes("88", "Short EF identifier", |t, v| t.short_ef_identifier = Some(v)),
        F::bytes("8A", "Life cycle status", |t, v| t.life_cycle_status = Some(v)),
        F::bytes("8B", "Security attribute referencing the expanded format", |t, v| {
            t.security_attribute_referenced = Some(v)
        }),
        F::bytes("8C", "Security attribute in compact format", |t, v| t.security_attribute_compact = Some(v)),
        F::bytes("8D", "Security environment template identifier", |t, v| {
            t.security_environment_identifier = Some(v)
        }),
        F::bytes("8E", "Channel security attribute", |t, v| t.channel_security_attribute = Some(v)),
        F::bytes("A0", "Security attribute template for data objects", |t, v| {
            t.security_attribute_template_data = Some(v)
        }),
        F::bytes("A1", "Security attribute template in proprietary format", |t, v| {
            t.security_attribute_template_proprietary = Some(v)
        }),
        F::bytes("A2", "Identifier and reference pairs", |t, v| t.data_object_pairs = Some(v)),
        F::bytes("A5", "Proprietary information in BER-TLV", |t, v| t.proprietary_template = Some(v)),
        F::bytes("AB", "Security attribute in expanded format", |t, v| {
            t.security_attribute_expanded = Some(v)
        }),
        F::bytes("AC", "Cryptographic mechanism identifier template", |t, v| {
            t.cryptographic_mechanism_identifier = Some(v)
        }),
    ]
});

impl Schema for Fcp {
    const NAME: &'static str = "FCP";

    fn fields() -> &'static [Field<Self>] {
        &FCP_FIELDS
    }

    fn unknown(&mut self) -> Option<&mut Vec<TagNode>> {
        Some(&mut self.unknown)
    }
}

/// File management data, template 64
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fmd {
    pub application_identifier: Option<Vec<u8>>,
    pub application_label: Option<Vec<u8>>,
    pub discretionary_data: Option<Vec<u8>>,
    pub discretionary_template: Option<Vec<u8>>,
    pub unknown: Vec<TagNode>,
}

static FMD_FIELDS: LazyLock<Vec<Field<Fmd>>> = LazyLock::new(|| {
    type F = Field<Fmd>;
    vec![
        F::bytes("84", "Application identifier", |t, v| t.application_identifier = Some(v)).format(Format::Ascii),
        F::bytes("50", "Application label", |t, v| t.application_label = Some(v)).format(Format::Ascii),
        F::bytes("53", "Discretionary data", |t, v| t.discretionary_data = Some(v)),
        F::bytes("73", "Discretionary template", |t, v| t.discretionary_template = Some(v)),
    ]
});

impl Schema for Fmd {
    const NAME: &'static str = "FMD";

    fn fields() -> &'static [Field<Self>] {
        &FMD_FIELDS
    }

    fn unknown(&mut self) -> Option<&mut Vec<TagNode>> {
        Some(&mut self.unknown)
    }
}

/// Content returned by a SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileControlInfo {
    pub fcp: Option<Fcp>,
    pub fmd: Option<Fmd>,
    /// Tags matching neither FCP nor FMD, only filled for flat FCI content
    pub unknown: Vec<TagNode>,
    /// Response not structured as BER-TLV
    pub proprietary: Option<Vec<u8>>,
}

impl FileControlInfo {
    /// DF name of the FCP, else the application identifier of the FMD.
    pub fn application_identifier(&self) -> Option<&[u8]> {
        let df_name = self.df_name().filter(|name| !name.is_empty());
        df_name.or_else(|| {
            self.fmd
                .as_ref()
                .and_then(|fmd| fmd.application_identifier.as_deref())
                .filter(|aid| !aid.is_empty())
        })
    }

    pub fn df_name(&self) -> Option<&[u8]> {
        self.fcp.as_ref().and_then(|fcp| fcp.df_name.as_deref())
    }

    pub fn application_label(&self) -> Option<&[u8]> {
        self.fmd.as_ref().and_then(|fmd| fmd.application_label.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Interprets the data field of a SELECT response for the given selection
/// control.
pub fn resolve_select_response(data: &[u8], control: SelectionControl) -> Result<FileControlInfo> {
    if data.is_empty() {
        return Ok(FileControlInfo::default());
    }

    if data[0] >= PROPRIETARY_THRESHOLD {
        debug!("First byte {:02X} is not a template, keeping {} bytes as proprietary data", data[0], data.len());
        return Ok(FileControlInfo {
            proprietary: Some(data.to_vec()),
            ..Default::default()
        });
    }

    match control {
        SelectionControl::Fcp => {
            let nodes = tlv::decode(data)?;
            let template = find(&nodes, FCP_TEMPLATE).context(MandatoryTagMissingSnafu { tag: FCP_TEMPLATE })?;
            Ok(FileControlInfo {
                fcp: Some(nested(template)?),
                ..Default::default()
            })
        }
        SelectionControl::Fmd => {
            let nodes = tlv::decode(data)?;
            let template = find(&nodes, FMD_TEMPLATE).context(MandatoryTagMissingSnafu { tag: FMD_TEMPLATE })?;
            Ok(FileControlInfo {
                fmd: Some(nested(template)?),
                ..Default::default()
            })
        }
        SelectionControl::Fci => {
            let nodes = tlv::decode(data)?;
            resolve_fci(&nodes)
        }
        SelectionControl::NoData => {
            debug!("No data requested, ignoring {} bytes", data.len());
            Ok(FileControlInfo::default())
        }
    }
}

/// Same as [`resolve_select_response`] with the selection control taken from
/// the P2 of the SELECT command.
pub fn parse_select_data(data: &[u8], p2: u8) -> Result<FileControlInfo> {
    resolve_select_response(data, SelectionControl::from_p2(p2))
}

fn resolve_fci(nodes: &[TagNode]) -> Result<FileControlInfo> {
    let working_set = match find(nodes, FCI_TEMPLATE) {
        Some(wrapper) if !wrapper.children.is_empty() => wrapper.children.clone(),
        Some(wrapper) => tlv::decode(&wrapper.value)?,
        None => nodes.to_vec(),
    };

    let fcp = find(&working_set, FCP_TEMPLATE);
    let fmd = find(&working_set, FMD_TEMPLATE);

    if fcp.is_some() || fmd.is_some() {
        debug!("FCI with explicit templates (FCP: {}, FMD: {})", fcp.is_some(), fmd.is_some());
        return Ok(FileControlInfo {
            fcp: fcp.map(nested).transpose()?,
            fmd: fmd.map(nested).transpose()?,
            ..Default::default()
        });
    }

    debug!("Flat FCI, {} data objects", working_set.len());
    let mut fcp: Fcp = map_nodes(&working_set)?;
    let leftovers = std::mem::take(&mut fcp.unknown);
    let mut fmd: Fmd = map_nodes(&leftovers)?;
    let unknown = std::mem::take(&mut fmd.unknown);

    Ok(FileControlInfo {
        fcp: Some(fcp),
        fmd: Some(fmd),
        unknown,
        proprietary: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const PSE_FCI: &str = "6F29840E315041592E5359532E4444463031A5178801015F2D046672656EBF0C0ABF0E07D2054C42503431";

    #[test]
    fn flat_fci() {
        let _ = env_logger::try_init();

        let data = hex::decode("82013850035445539902CAFE").unwrap();
        let fci = resolve_select_response(&data, SelectionControl::Fci).unwrap();

        let fcp = fci.fcp.as_ref().unwrap();
        assert_eq!(fcp.file_descriptor, Some(vec![0x38]));
        assert!(fcp.unknown.is_empty(), "Leftovers move on to the FMD");
        assert_eq!(fci.application_label(), Some(&b"TES"[..]));
        assert!(fci.fmd.as_ref().unwrap().unknown.is_empty());
        assert_eq!(fci.unknown, vec![TagNode::primitive("99", vec![0xCA, 0xFE])]);
    }

    #[test]
    fn fci_wrapper_without_templates() {
        let data = hex::decode(PSE_FCI).unwrap();
        let fci = resolve_select_response(&data, SelectionControl::Fci).unwrap();

        assert_eq!(fci.df_name(), Some(&b"1PAY.SYS.DDF01"[..]));
        assert_eq!(fci.application_identifier(), Some(&b"1PAY.SYS.DDF01"[..]));
        let fcp = fci.fcp.unwrap();
        assert_eq!(
            fcp.proprietary_template,
            Some(hex::decode("8801015F2D046672656EBF0C0ABF0E07D2054C42503431").unwrap())
        );
        assert!(fci.unknown.is_empty());
    }

    #[test]
    fn fci_with_explicit_templates() {
        let data = hex::decode("6F0F620783023F00990101640450025858").unwrap();
        let fci = resolve_select_response(&data, SelectionControl::Fci).unwrap();

        let fcp = fci.fcp.as_ref().unwrap();
        assert_eq!(fcp.file_identifier.as_deref(), Some("3F00"));
        assert_eq!(fcp.unknown, vec![TagNode::primitive("99", vec![0x01])], "Unknown tags stay in their template");
        assert_eq!(fci.application_label(), Some(&b"XX"[..]));
        assert!(fci.unknown.is_empty());
    }

    #[test]
    fn fcp_mandatory() {
        let data = hex::decode("620B8202012183023F008A0105").unwrap();
        let fci = resolve_select_response(&data, SelectionControl::Fcp).unwrap();
        let fcp = fci.fcp.unwrap();
        assert_eq!(fcp.file_descriptor, Some(vec![0x01, 0x21]));
        assert_eq!(fcp.life_cycle_status, Some(vec![0x05]));
        assert!(fci.fmd.is_none());
    }

    #[test]
    fn mandatory_template_missing() {
        let data = hex::decode("6405500358595A").unwrap();
        let result = resolve_select_response(&data, SelectionControl::Fcp);
        assert!(matches!(result, Err(Error::MandatoryTagMissing { tag: "62" })));

        let data = hex::decode("620382013F").unwrap();
        let result = resolve_select_response(&data, SelectionControl::Fmd);
        assert!(matches!(result, Err(Error::MandatoryTagMissing { tag: "64" })));
    }

    #[test]
    fn fmd_mandatory() {
        let data = hex::decode("640B8407A00000000410105300").unwrap();
        let fci = resolve_select_response(&data, SelectionControl::Fmd).unwrap();
        assert_eq!(fci.application_identifier(), Some(&hex::decode("A0000000041010").unwrap()[..]));
        assert_eq!(fci.fmd.unwrap().discretionary_data, Some(vec![]));
    }

    #[test]
    fn proprietary_data() {
        let data = hex::decode("C0010203").unwrap();
        let fci = resolve_select_response(&data, SelectionControl::Fcp).unwrap();
        assert_eq!(fci.proprietary, Some(data));
        assert!(fci.fcp.is_none());
    }

    #[test]
    fn empty_and_no_data() {
        assert!(resolve_select_response(&[], SelectionControl::Fcp).unwrap().is_empty());
        let data = hex::decode("620382013F").unwrap();
        assert!(resolve_select_response(&data, SelectionControl::NoData).unwrap().is_empty());
    }

    #[test]
    fn decode_failure() {
        let result = resolve_select_response(&hex::decode("6F0584").unwrap(), SelectionControl::Fci);
        assert!(matches!(result, Err(Error::TlvDecodeFailure { .. })));
    }

    #[test]
    fn control_from_p2() {
        let data = hex::decode("6405500358595A").unwrap();
        assert!(matches!(parse_select_data(&data, 0x04), Err(Error::MandatoryTagMissing { .. })));
        assert_eq!(parse_select_data(&data, 0x08).unwrap().application_label(), Some(&b"XYZ"[..]));
    }
}
