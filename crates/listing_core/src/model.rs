use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Currency a listing price is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Currency {
    /// Chilean peso, the local currency.
    #[serde(rename = "CLP")]
    Clp,
    /// Unidad de Fomento, the inflation-indexed unit of account.
    #[serde(rename = "UF")]
    Uf,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Clp => write!(f, "CLP"),
            Currency::Uf => write!(f, "UF"),
            Currency::Unknown => write!(f, "unknown"),
        }
    }
}

/// A listing attribute the resolver knows how to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Title,
    Price,
    Address,
    Bedrooms,
    Bathrooms,
    Area,
}

/// How a field's matched text is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Price,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Title,
        Field::Price,
        Field::Address,
        Field::Bedrooms,
        Field::Bathrooms,
        Field::Area,
    ];

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Title | Field::Address => FieldKind::Text,
            Field::Price => FieldKind::Price,
            Field::Bedrooms | Field::Bathrooms | Field::Area => FieldKind::Integer,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Price => "price",
            Field::Address => "address",
            Field::Bedrooms => "bedrooms",
            Field::Bathrooms => "bathrooms",
            Field::Area => "area",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One property listing as extracted from a result page.
///
/// Absent fields are `None`; the resolver never writes placeholder numbers.
/// `raw_text` always holds the listing element's text so records can be
/// re-resolved later without refetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: Option<String>,
    pub price: Option<u64>,
    pub currency: Currency,
    pub address: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub area_m2: Option<u32>,
    pub features: BTreeSet<String>,
    pub raw_text: String,
    pub extracted_at: DateTime<Utc>,
}
