use snafu::ensure;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{NoResponseDataSnafu, Result};
use crate::files::fci::FCI_TEMPLATE;
use crate::tlv::{self, map_nodes, nested, DataObject, Field, Format, Schema, TagNode};

/// FCI returned by the selection of the PSE or of an application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fci {
    pub df_name: Option<Vec<u8>>,
    pub proprietary_template: Option<ProprietaryTemplate>,
}

static FCI_FIELDS: LazyLock<Vec<Field<Fci>>> = LazyLock::new(|| {
    type F = Field<Fci>;
    vec![
        F::bytes("84", "DF name", |t, v| t.df_name = Some(v)).format(Format::Ascii),
        F::nested("A5", "FCI proprietary template", |t, node| {
            t.proprietary_template = Some(nested(node)?);
            Ok(())
        }),
    ]
});

impl Schema for Fci {
    const NAME: &'static str = "FCI";

    fn fields() -> &'static [Field<Self>] {
        &FCI_FIELDS
    }
}

/// Template A5
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProprietaryTemplate {
    pub application_label: Option<String>,
    pub application_priority_indicator: Option<u64>,
    pub short_file_identifier: Option<Vec<u8>>,
    /// Processing options data object list
    pub pdol: Option<Vec<DataObject>>,
    pub language_preference: Option<String>,
    pub issuer_code_table_index: Option<u64>,
    pub application_preferred_name: Option<String>,
    pub issuer_discretionary_data: Option<IssuerDiscretionaryData>,
    pub unknown: Vec<TagNode>,
}

static PROPRIETARY_FIELDS: LazyLock<Vec<Field<ProprietaryTemplate>>> = LazyLock::new(|| {
    type F = Field<ProprietaryTemplate>;
    vec![
        F::text("50", "Application label", |t, v| t.application_label = Some(v)),
        F::integer("87", "Application priority indicator", |t, v| {
            t.application_priority_indicator = Some(v)
        }),
        F::bytes("88", "SFI of the directory elementary file", |t, v| {
            t.short_file_identifier = Some(v)
        }),
        F::data_object_list("9F38", "PDOL", |t, v| t.pdol = Some(v)),
        F::text("5F2D", "Language preference", |t, v| t.language_preference = Some(v)),
        F::integer("9F11", "Issuer code table index", |t, v| t.issuer_code_table_index = Some(v)),
        F::text("9F12", "Application preferred name", |t, v| {
            t.application_preferred_name = Some(v)
        }),
        F::nested("BF0C", "FCI issuer discretionary data", |t, node| {
            t.issuer_discretionary_data = Some(nested(node)?);
            Ok(())
        }),
    ]
});

impl Schema for ProprietaryTemplate {
    const NAME: &'static str = "FCI proprietary template";

    fn fields() -> &'static [Field<Self>] {
        &PROPRIETARY_FIELDS
    }

    fn unknown(&mut self) -> Option<&mut Vec<TagNode>> {
        Some(&mut self.unknown)
    }
}

/// Template BF0C
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuerDiscretionaryData {
    pub log_entry: Option<Vec<u8>>,
    pub issuer_identification_number_extended: Option<Vec<u8>>,
    pub issuer_country_code_alpha3: Option<String>,
    pub issuer_country_code_alpha2: Option<String>,
    pub bank_identifier_code: Option<String>,
    pub iban: Option<String>,
    pub issuer_url: Option<String>,
    pub issuer_identification_number: Option<Vec<u8>>,
    pub unknown: Vec<TagNode>,
}

static DISCRETIONARY_FIELDS: LazyLock<Vec<Field<IssuerDiscretionaryData>>> = LazyLock::new(|| {
    type F = Field<IssuerDiscretionaryData>;
    vec![
        F::bytes("9F4D", "Log entry", |t, v| t.log_entry = Some(v)),
        F::bytes("9F0C", "Issuer identification number extended", |t, v| {
            t.issuer_identification_number_extended = Some(v)
        }),
        F::text("5F56", "Issuer country code (alpha 3)", |t, v| t.issuer_country_code_alpha3 = Some(v)),
        F::text("5F55", "Issuer country code (alpha 2)", |t, v| t.issuer_country_code_alpha2 = Some(v)),
        F::text("5F54", "Bank identifier code", |t, v| t.bank_identifier_code = Some(v)),
        F::text("5F53", "IBAN", |t, v| t.iban = Some(v)),
        F::text("5F50", "Issuer URL", |t, v| t.issuer_url = Some(v)),
        F::bytes("42", "Issuer identification number", |t, v| t.issuer_identification_number = Some(v)),
    ]
});

impl Schema for IssuerDiscretionaryData {
    const NAME: &'static str = "FCI issuer discretionary data";

    fn fields() -> &'static [Field<Self>] {
        &DISCRETIONARY_FIELDS
    }

    fn unknown(&mut self) -> Option<&mut Vec<TagNode>> {
        Some(&mut self.unknown)
    }
}

impl Fci {
    /// Maps the data field of a SELECT response, with or without the
    /// enclosing FCI template.
    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure!(!data.is_empty(), NoResponseDataSnafu);

        let nodes = tlv::decode(data)?;
        match nodes.first() {
            Some(wrapper) if wrapper.has_tag(FCI_TEMPLATE) => nested(wrapper),
            _ => map_nodes(&nodes),
        }
    }

    pub fn application_label(&self) -> Option<&str> {
        self.proprietary_template
            .as_ref()
            .and_then(|template| template.application_label.as_deref())
    }
}

impl fmt::Display for Fci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FCI")?;
        if let Some(df_name) = &self.df_name {
            write!(f, " | DF name: {}", hex::encode_upper(df_name))?;
        }
        let Some(template) = &self.proprietary_template else {
            return Ok(());
        };
        if let Some(label) = &template.application_label {
            write!(f, " | Label: {}", label)?;
        }
        if let Some(priority) = template.application_priority_indicator {
            write!(f, " | Priority: {}", priority)?;
        }
        if let Some(sfi) = &template.short_file_identifier {
            write!(f, " | SFI: {}", hex::encode_upper(sfi))?;
        }
        if let Some(language) = &template.language_preference {
            write!(f, " | Language: {}", language)?;
        }
        if let Some(url) = template.issuer_discretionary_data.as_ref().and_then(|data| data.issuer_url.as_ref()) {
            write!(f, " | Issuer URL: {}", url)?;
        }
        Ok(())
    }
}
