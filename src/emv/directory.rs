use snafu::ensure;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{MandatoryTagMissingSnafu, NoResponseDataSnafu, Result};
use crate::tlv::{self, nested, Field, Format, Schema, TagNode};

pub const RECORD_TEMPLATE: &str = "70";

/// Record of a payment system directory file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub applications: Vec<ApplicationTemplate>,
    pub unknown: Vec<TagNode>,
}

static RECORD_FIELDS: LazyLock<Vec<Field<DirectoryRecord>>> = LazyLock::new(|| {
    type F = Field<DirectoryRecord>;
    vec![F::nested("61", "Application template", |t, node| {
        t.applications.push(nested(node)?);
        Ok(())
    })
    .repeated()]
});

impl Schema for DirectoryRecord {
    const NAME: &'static str = "Directory record";

    fn fields() -> &'static [Field<Self>] {
        &RECORD_FIELDS
    }

    fn unknown(&mut self) -> Option<&mut Vec<TagNode>> {
        Some(&mut self.unknown)
    }
}

/// Directory entry, template 61
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationTemplate {
    pub aid: Option<Vec<u8>>,
    pub application_label: Option<String>,
    pub application_priority_indicator: Option<u64>,
    pub discretionary_data: Option<DirectoryDiscretionaryTemplate>,
    pub application_preferred_name: Option<String>,
    pub ddf_name: Option<Vec<u8>>,
    pub unknown: Vec<TagNode>,
}

static APPLICATION_FIELDS: LazyLock<Vec<Field<ApplicationTemplate>>> = LazyLock::new(|| {
    type F = Field<ApplicationTemplate>;
    vec![
        F::bytes("4F", "ADF name", |t, v| t.aid = Some(v)),
        F::text("50", "Application label", |t, v| t.application_label = Some(v)),
        F::integer("87", "Application priority indicator", |t, v| {
            t.application_priority_indicator = Some(v)
        }),
        F::nested("73", "Directory discretionary template", |t, node| {
            t.discretionary_data = Some(nested(node)?);
            Ok(())
        }),
        F::text("9F12", "Application preferred name", |t, v| t.application_preferred_name = Some(v)),
        F::bytes("9D", "DDF name", |t, v| t.ddf_name = Some(v)).format(Format::Ascii),
    ]
});

impl Schema for ApplicationTemplate {
    const NAME: &'static str = "Application template";

    fn fields() -> &'static [Field<Self>] {
        &APPLICATION_FIELDS
    }

    fn unknown(&mut self) -> Option<&mut Vec<TagNode>> {
        Some(&mut self.unknown)
    }
}

/// Template 73
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryDiscretionaryTemplate {
    pub registered_proprietary_data: Option<Vec<u8>>,
    pub issuer_country_code_alpha3: Option<String>,
    pub issuer_country_code_alpha2: Option<String>,
    pub bank_identifier_code: Option<String>,
    pub iban: Option<String>,
    pub issuer_url: Option<String>,
    pub issuer_identification_number: Option<Vec<u8>>,
    pub issuer_identification_number_extended: Option<Vec<u8>>,
    pub log_entry: Option<Vec<u8>>,
    pub unknown: Vec<TagNode>,
}

static DISCRETIONARY_FIELDS: LazyLock<Vec<Field<DirectoryDiscretionaryTemplate>>> = LazyLock::new(|| {
    type F = Field<DirectoryDiscretionaryTemplate>;
    vec![
        F::bytes("9F0A", "Application selection registered proprietary data", |t, v| {
            t.registered_proprietary_data = Some(v)
        }),
        F::text("5F56", "Issuer country code (alpha 3)", |t, v| t.issuer_country_code_alpha3 = Some(v)),
        F::text("5F55", "Issuer country code (alpha 2)", |t, v| t.issuer_country_code_alpha2 = Some(v)),
        F::text("5F54", "Bank identifier code", |t, v| t.bank_identifier_code = Some(v)),
        F::text("5F53", "IBAN", |t, v| t.iban = Some(v)),
        F::text("5F50", "Issuer URL", |t, v| t.issuer_url = Some(v)),
        F::bytes("42", "Issuer identification number", |t, v| t.issuer_identification_number = Some(v)),
        F::bytes("9F0C", "Issuer identification number extended", |t, v| {
            t.issuer_identification_number_extended = Some(v)
        }),
        F::bytes("9F4D", "Log entry", |t, v| t.log_entry = Some(v)),
    ]
});

impl Schema for DirectoryDiscretionaryTemplate {
    const NAME: &'static str = "Directory discretionary template";

    fn fields() -> &'static [Field<Self>] {
        &DISCRETIONARY_FIELDS
    }

    fn unknown(&mut self) -> Option<&mut Vec<TagNode>> {
        Some(&mut self.unknown)
    }
}

impl DirectoryRecord {
    /// Maps a record read from the directory EF. The record must start with
    /// the record template 70.
    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure!(!data.is_empty(), NoResponseDataSnafu);

        let nodes = tlv::decode(data)?;
        match nodes.first() {
            Some(template) if template.has_tag(RECORD_TEMPLATE) => nested(template),
            _ => MandatoryTagMissingSnafu { tag: RECORD_TEMPLATE }.fail(),
        }
    }
}

impl fmt::Display for DirectoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Directory record | {} application(s)", self.applications.len())?;
        for (index, application) in self.applications.iter().enumerate() {
            write!(f, " | #{}", index + 1)?;
            if let Some(aid) = &application.aid {
                write!(f, " AID: {}", hex::encode_upper(aid))?;
            }
            if let Some(label) = &application.application_label {
                write!(f, " Label: {}", label)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn record_with_unknown_tags() {
        let _ = env_logger::try_init();

        let data = hex::decode(
            "702E9902DEAF61284F07A0000000031010500456495341\
             73175F500E7777772E6D795F62616E6B2E6575990411223344",
        )
        .unwrap();
        let record = DirectoryRecord::parse(&data).unwrap();

        assert_eq!(record.applications.len(), 1);
        assert_eq!(record.unknown, vec![TagNode::primitive("99", vec![0xDE, 0xAF])]);

        let application = &record.applications[0];
        assert_eq!(application.aid, Some(hex::decode("A0000000031010").unwrap()));
        assert_eq!(application.application_label.as_deref(), Some("VISA"));
        assert!(application.unknown.is_empty());

        let discretionary = application.discretionary_data.as_ref().unwrap();
        assert_eq!(discretionary.issuer_url.as_deref(), Some("www.my_bank.eu"));
        assert_eq!(discretionary.unknown, vec![TagNode::primitive("99", vec![0x11, 0x22, 0x33, 0x44])]);

        assert_eq!(
            record.to_string(),
            "Directory record | 1 application(s) | #1 AID: A0000000031010 Label: VISA"
        );
    }

    #[test]
    fn several_applications() {
        let data = hex::decode("701661084F03010203870102610884030405068701019D00").unwrap();
        let record = DirectoryRecord::parse(&data).unwrap();

        assert_eq!(record.applications.len(), 2, "Every 61 template is kept, in order");
        assert_eq!(record.applications[0].aid, Some(vec![0x01, 0x02, 0x03]));
        assert_eq!(record.applications[0].application_priority_indicator, Some(2));
        assert_eq!(record.applications[1].aid, None);
        assert_eq!(record.applications[1].unknown, vec![TagNode::primitive("84", vec![0x04, 0x05, 0x06])]);
        assert!(record.unknown.len() == 1 && record.unknown[0].tag == "9D");
    }

    #[test]
    fn record_template_mandatory() {
        let data = hex::decode("61054F03010203").unwrap();
        assert!(matches!(
            DirectoryRecord::parse(&data),
            Err(Error::MandatoryTagMissing { tag: "70" })
        ));
        assert!(matches!(DirectoryRecord::parse(&[]), Err(Error::NoResponseData)));
        assert!(matches!(
            DirectoryRecord::parse(&hex::decode("7005610342").unwrap()),
            Err(Error::TlvDecodeFailure { .. })
        ));
    }
}
