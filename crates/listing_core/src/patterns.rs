//! Selector and pattern configuration for listing fields.
//!
//! A [`PatternSpec`] is plain, serializable data. [`PatternRegistry::compile`]
//! turns it into compiled selectors and regexes, failing on the first invalid
//! entry. Entry order is precedence: callers try entries strictly in sequence.

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::model::{Currency, Field};

/// A textual pattern. The first capture group, when present, holds the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    /// Currency implied by a price match of this pattern.
    #[serde(default)]
    pub currency: Option<Currency>,
}

impl PatternEntry {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            currency: None,
        }
    }

    pub fn with_currency(pattern: impl Into<String>, currency: Currency) -> Self {
        Self {
            pattern: pattern.into(),
            currency: Some(currency),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldPatterns {
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<PatternEntry>,
}

impl FieldPatterns {
    fn new(selectors: &[&str], patterns: Vec<PatternEntry>) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            patterns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    /// Selectors that locate candidate listing elements on a result page.
    pub containers: Vec<String>,
    pub title: FieldPatterns,
    pub price: FieldPatterns,
    pub address: FieldPatterns,
    pub bedrooms: FieldPatterns,
    pub bathrooms: FieldPatterns,
    pub area: FieldPatterns,
    /// Tokens that mark a price as quoted in UF.
    pub unit_markers: Vec<String>,
    pub feature_keywords: Vec<String>,
    /// Shortest text accepted from a structural title or address match.
    pub min_text_chars: usize,
}

const TITLE_SELECTORS: &[&str] = &[
    ".poly-component__title",
    "h3",
    "h2",
    "h1",
    ".ui-search-item__title",
    "[class*=\"title\"]",
    "[class*=\"name\"]",
];

const PRICE_SELECTORS: &[&str] = &[
    ".poly-component__price .andes-money-amount__fraction",
    ".andes-money-amount__fraction",
    ".ui-search-price__part",
    ".ui-search-price",
    "[class*=\"price\"]",
    ".andes-money-amount",
];

const ADDRESS_SELECTORS: &[&str] = &[
    ".poly-component__location",
    "[class*=\"location\"]",
    "[class*=\"address\"]",
    "[class*=\"neighborhood\"]",
];

const AREA_SELECTORS: &[&str] = &[
    ".poly-attributes_list__item",
    "[class*=\"size\"]",
    "[class*=\"area\"]",
    "[class*=\"meters\"]",
];

const BEDROOM_SELECTORS: &[&str] = &[
    ".poly-attributes_list__item",
    "[class*=\"bedroom\"]",
    "[class*=\"room\"]",
    ".ui-search-item__group__element",
];

const BATHROOM_SELECTORS: &[&str] = &[
    ".poly-attributes_list__item",
    "[class*=\"bathroom\"]",
    "[class*=\"room\"]",
    ".ui-search-item__group__element",
];

const RESULT_CONTAINERS: &[&str] = &[
    "article",
    ".ui-search-result",
    ".ui-search-result__wrapper",
    "[data-testid*=\"result\"]",
    ".ui-search-result__content",
    "div[class*=\"result\"]",
    "div[class*=\"item\"]",
    "div[class*=\"property\"]",
    "div[class*=\"listing\"]",
];

const FEATURE_KEYWORDS: &[&str] = &[
    "jardín",
    "estacionamiento",
    "piscina",
    "parrilla",
    "alarma",
    "aire acondicionado",
    "gimnasio",
    "quincho",
];

fn entries(patterns: &[&str]) -> Vec<PatternEntry> {
    patterns.iter().map(|p| PatternEntry::new(*p)).collect()
}

fn price_patterns() -> Vec<PatternEntry> {
    vec![
        PatternEntry::new(r"\$\s*(\d[\d.,]*)"),
        PatternEntry::with_currency(r"UF\s*(\d[\d.,]*)", Currency::Uf),
        PatternEntry::with_currency(r"(\d[\d.,]*)\s*pesos", Currency::Clp),
        PatternEntry::with_currency(r"(\d[\d.,]*)\s*CLP", Currency::Clp),
    ]
}

fn title_patterns() -> Vec<PatternEntry> {
    entries(&[
        r"(?i)\b((?:casa|departamento|parcela|terreno|oficina|local)\s+en\s+[^,$\d|]+)",
    ])
}

fn bedroom_patterns() -> Vec<PatternEntry> {
    entries(&[
        r"(\d+)\s*dormitorio",
        r"(\d+)\s*habitaci[oó]n",
        r"(\d+)\s*pieza",
    ])
}

fn bathroom_patterns() -> Vec<PatternEntry> {
    entries(&[r"(\d+)\s*baño"])
}

impl PatternSpec {
    /// Patterns for the Villa Los Jardines / Villa Los Presidentes sales search.
    pub fn villa_los_jardines() -> Self {
        let mut containers = RESULT_CONTAINERS.to_vec();
        containers.extend(["li[class*=\"result\"]", "div[class*=\"card\"]"]);
        Self {
            containers: containers.iter().map(|s| s.to_string()).collect(),
            title: FieldPatterns::new(TITLE_SELECTORS, title_patterns()),
            price: FieldPatterns::new(PRICE_SELECTORS, price_patterns()),
            address: FieldPatterns::new(
                ADDRESS_SELECTORS,
                entries(&[
                    r"[A-Z][a-z]+.*?Ñuñoa",
                    r"[A-Z][a-z]+.*?Villa Los Jard[ií]nes",
                    r"[A-Z][a-z]+.*?Villa Los Presidentes",
                    r"[A-Z][a-z]+.*?Región Metropolitana",
                ]),
            ),
            bedrooms: FieldPatterns::new(BEDROOM_SELECTORS, bedroom_patterns()),
            bathrooms: FieldPatterns::new(BATHROOM_SELECTORS, bathroom_patterns()),
            area: FieldPatterns::new(
                AREA_SELECTORS,
                entries(&[
                    r"(\d[\d.]*)\s*m²\s*útiles",
                    r"(\d[\d.]*)\s*m²",
                    r"(\d[\d.]*)\s*metros",
                    r"(\d[\d.]*)\s*m2",
                ]),
            ),
            unit_markers: vec!["UF".to_string()],
            feature_keywords: FEATURE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            min_text_chars: 6,
        }
    }

    /// Patterns for the metropolitan-area rental search, which relies on
    /// free-text matching far more than on structural selectors.
    pub fn santiago_rentals() -> Self {
        Self {
            containers: RESULT_CONTAINERS.iter().map(|s| s.to_string()).collect(),
            title: FieldPatterns::new(TITLE_SELECTORS, title_patterns()),
            price: FieldPatterns::new(&[], price_patterns()),
            address: FieldPatterns::new(
                &[],
                entries(&[
                    r"(Santiago.*?)(?:\$|\d+\s*m²)",
                    r"(Barrio.*?)(?:\$|\d+\s*m²)",
                    r"[A-Z][a-z]+.*?Santiago",
                    r"[A-Z][a-z]+.*?RM",
                ]),
            ),
            bedrooms: FieldPatterns::new(&[], bedroom_patterns()),
            bathrooms: FieldPatterns::new(&[], bathroom_patterns()),
            area: FieldPatterns::new(
                &[],
                entries(&[
                    r"(\d[\d.]*)\s*m²",
                    r"(\d[\d.]*)\s*metros",
                    r"(\d[\d.]*)\s*m2",
                ]),
            ),
            unit_markers: vec!["UF".to_string()],
            feature_keywords: FEATURE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            min_text_chars: 6,
        }
    }

    pub fn field(&self, field: Field) -> &FieldPatterns {
        match field {
            Field::Title => &self.title,
            Field::Price => &self.price,
            Field::Address => &self.address,
            Field::Bedrooms => &self.bedrooms,
            Field::Bathrooms => &self.bathrooms,
            Field::Area => &self.area,
        }
    }
}

impl Default for PatternSpec {
    fn default() -> Self {
        Self::villa_los_jardines()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid {scope} selector {selector:?}: {message}")]
    InvalidSelector {
        scope: String,
        selector: String,
        message: String,
    },
    #[error("invalid {field} pattern {pattern:?}: {message}")]
    InvalidPattern {
        field: Field,
        pattern: String,
        message: String,
    },
    #[error("no container selectors configured")]
    NoContainers,
}

#[derive(Debug, Clone)]
pub struct CompiledSelector {
    pub source: String,
    pub selector: Selector,
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub source: String,
    pub regex: Regex,
    pub currency: Option<Currency>,
}

#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    pub selectors: Vec<CompiledSelector>,
    pub patterns: Vec<CompiledPattern>,
}

/// Compiled, read-only form of a [`PatternSpec`].
///
/// Shared across extraction workers behind an `Arc`; nothing mutates it
/// after [`PatternRegistry::compile`] returns.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    containers: Vec<CompiledSelector>,
    title: FieldRules,
    price: FieldRules,
    address: FieldRules,
    bedrooms: FieldRules,
    bathrooms: FieldRules,
    area: FieldRules,
    unit_markers: Vec<String>,
    feature_keywords: Vec<String>,
    min_text_chars: usize,
}

impl PatternRegistry {
    pub fn compile(spec: &PatternSpec) -> Result<Self, RegistryError> {
        if spec.containers.is_empty() {
            return Err(RegistryError::NoContainers);
        }
        let containers = spec
            .containers
            .iter()
            .map(|s| compile_selector("container", s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            containers,
            title: compile_rules(Field::Title, &spec.title)?,
            price: compile_rules(Field::Price, &spec.price)?,
            address: compile_rules(Field::Address, &spec.address)?,
            bedrooms: compile_rules(Field::Bedrooms, &spec.bedrooms)?,
            bathrooms: compile_rules(Field::Bathrooms, &spec.bathrooms)?,
            area: compile_rules(Field::Area, &spec.area)?,
            unit_markers: spec
                .unit_markers
                .iter()
                .filter(|m| !m.is_empty())
                .cloned()
                .collect(),
            feature_keywords: spec
                .feature_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            min_text_chars: spec.min_text_chars,
        })
    }

    pub fn containers(&self) -> &[CompiledSelector] {
        &self.containers
    }

    pub fn rules(&self, field: Field) -> &FieldRules {
        match field {
            Field::Title => &self.title,
            Field::Price => &self.price,
            Field::Address => &self.address,
            Field::Bedrooms => &self.bedrooms,
            Field::Bathrooms => &self.bathrooms,
            Field::Area => &self.area,
        }
    }

    pub fn min_text_chars(&self) -> usize {
        self.min_text_chars
    }

    /// Currency implied by a text segment: UF when a unit marker appears as
    /// a standalone token, the local currency otherwise.
    pub fn classify_currency(&self, segment: &str) -> Currency {
        if self
            .unit_markers
            .iter()
            .any(|marker| contains_token(segment, marker))
        {
            Currency::Uf
        } else {
            Currency::Clp
        }
    }

    /// True when `text` is nothing but a currency sign or a unit marker.
    pub fn is_currency_symbol(&self, text: &str) -> bool {
        let text = text.trim();
        text == "$"
            || self
                .unit_markers
                .iter()
                .any(|marker| marker.eq_ignore_ascii_case(text))
    }

    /// Keywords contained in `text`, compared case-insensitively.
    pub fn matching_features(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.feature_keywords
            .iter()
            .filter(|keyword| haystack.contains(keyword.as_str()))
            .cloned()
            .collect()
    }
}

fn compile_selector(scope: &str, source: &str) -> Result<CompiledSelector, RegistryError> {
    let selector = Selector::parse(source).map_err(|err| RegistryError::InvalidSelector {
        scope: scope.to_string(),
        selector: source.to_string(),
        message: err.to_string(),
    })?;
    Ok(CompiledSelector {
        source: source.to_string(),
        selector,
    })
}

fn compile_rules(field: Field, patterns: &FieldPatterns) -> Result<FieldRules, RegistryError> {
    let selectors = patterns
        .selectors
        .iter()
        .map(|s| compile_selector(field.name(), s))
        .collect::<Result<Vec<_>, _>>()?;
    let patterns = patterns
        .patterns
        .iter()
        .map(|entry| {
            Regex::new(&entry.pattern)
                .map(|regex| CompiledPattern {
                    source: entry.pattern.clone(),
                    regex,
                    currency: entry.currency,
                })
                .map_err(|err| RegistryError::InvalidPattern {
                    field,
                    pattern: entry.pattern.clone(),
                    message: err.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FieldRules {
        selectors,
        patterns,
    })
}

/// True when `token` occurs in `text` without a letter directly before or after it.
fn contains_token(text: &str, token: &str) -> bool {
    text.match_indices(token).any(|(start, matched)| {
        let before = text[..start].chars().next_back();
        let after = text[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphabetic) && !after.is_some_and(char::is_alphabetic)
    })
}
