//! Cascading field resolution.
//!
//! One resolver serves every field: the field only selects which compiled
//! selectors and patterns from the [`PatternRegistry`] are tried.

use scraper::ElementRef;

use crate::model::{Currency, Field, FieldKind};
use crate::patterns::{CompiledPattern, PatternRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(u32),
    Price { amount: u64, currency: Currency },
}

/// Which step of the cascade produced a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// The text of a structural match, read directly.
    Selector { selector: String },
    /// A pattern applied to the text of a structural match.
    SelectorPattern { selector: String, pattern: String },
    /// A pattern applied to the listing's full text.
    FallbackPattern { pattern: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { value: FieldValue, strategy: Strategy },
    Unresolved,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            Resolution::Resolved { value, .. } => Some(value),
            Resolution::Unresolved => None,
        }
    }

    pub fn strategy(&self) -> Option<&Strategy> {
        match self {
            Resolution::Resolved { strategy, .. } => Some(strategy),
            Resolution::Unresolved => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Resolution::Resolved {
                value: FieldValue::Text(text),
                ..
            } => Some(text),
            _ => None,
        }
    }

    pub fn into_integer(self) -> Option<u32> {
        match self {
            Resolution::Resolved {
                value: FieldValue::Integer(n),
                ..
            } => Some(n),
            _ => None,
        }
    }

    pub fn into_price(self) -> Option<(u64, Currency)> {
        match self {
            Resolution::Resolved {
                value: FieldValue::Price { amount, currency },
                ..
            } => Some((amount, currency)),
            _ => None,
        }
    }
}

pub struct FieldResolver<'r> {
    registry: &'r PatternRegistry,
}

impl<'r> FieldResolver<'r> {
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `field` inside `element`, falling back to `fallback_text`.
    ///
    /// Structural selectors are tried first, in order, against every match in
    /// the element; each match is read directly and then through the field's
    /// patterns. Only when no selector yields a value are the patterns run
    /// against `fallback_text`. The first success wins.
    pub fn resolve(
        &self,
        field: Field,
        element: ElementRef<'_>,
        fallback_text: &str,
    ) -> Resolution {
        let rules = self.registry.rules(field);

        for compiled in &rules.selectors {
            for matched in element.select(&compiled.selector) {
                let text = element_text(matched);
                if text.is_empty() {
                    continue;
                }

                if let Some(value) = self.read_direct(field, matched, &text) {
                    return Resolution::Resolved {
                        value,
                        strategy: Strategy::Selector {
                            selector: compiled.source.clone(),
                        },
                    };
                }

                if let Some((value, pattern)) = self.match_patterns(field, &rules.patterns, &text) {
                    return Resolution::Resolved {
                        value,
                        strategy: Strategy::SelectorPattern {
                            selector: compiled.source.clone(),
                            pattern: pattern.source.clone(),
                        },
                    };
                }
            }
        }

        match self.match_patterns(field, &rules.patterns, fallback_text) {
            Some((value, pattern)) => Resolution::Resolved {
                value,
                strategy: Strategy::FallbackPattern {
                    pattern: pattern.source.clone(),
                },
            },
            None => Resolution::Unresolved,
        }
    }

    fn read_direct(&self, field: Field, matched: ElementRef<'_>, text: &str) -> Option<FieldValue> {
        match field.kind() {
            FieldKind::Text => (text.chars().count() >= self.registry.min_text_chars())
                .then(|| FieldValue::Text(text.to_string())),
            FieldKind::Integer => parse_count(text).map(FieldValue::Integer),
            FieldKind::Price => parse_integer(text).map(|amount| FieldValue::Price {
                amount,
                currency: self.registry.classify_currency(&self.price_segment(matched, text)),
            }),
        }
    }

    /// A bare amount plus any currency symbol sitting next to it in the same
    /// wrapper, as in `<span>UF</span><span>5.200</span>`.
    fn price_segment(&self, matched: ElementRef<'_>, amount: &str) -> String {
        let Some(wrapper) = matched.parent().and_then(ElementRef::wrap) else {
            return amount.to_string();
        };
        let mut segment: Vec<String> = wrapper
            .child_elements()
            .filter(|sibling| sibling.id() != matched.id())
            .map(element_text)
            .filter(|symbol| self.registry.is_currency_symbol(symbol))
            .collect();
        segment.push(amount.to_string());
        segment.join(" ")
    }

    /// Run `patterns` over `text`. A price's currency comes from the pattern's
    /// hint, otherwise from the regex match itself.
    fn match_patterns<'p>(
        &self,
        field: Field,
        patterns: &'p [CompiledPattern],
        text: &str,
    ) -> Option<(FieldValue, &'p CompiledPattern)> {
        for pattern in patterns {
            for caps in pattern.regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let captured = caps.get(1).unwrap_or(whole).as_str();
                let value = match field.kind() {
                    FieldKind::Text => {
                        let trimmed = captured.trim();
                        (!trimmed.is_empty()).then(|| FieldValue::Text(trimmed.to_string()))
                    }
                    FieldKind::Integer => parse_count(captured).map(FieldValue::Integer),
                    FieldKind::Price => parse_integer(captured).map(|amount| FieldValue::Price {
                        amount,
                        currency: pattern
                            .currency
                            .unwrap_or_else(|| self.registry.classify_currency(whole.as_str())),
                    }),
                };
                if let Some(value) = value {
                    return Some((value, pattern));
                }
            }
        }
        None
    }
}

/// Parse a number written with `.`/`,` grouping separators.
///
/// Both separators are removed; anything other than ASCII digits left over
/// makes the text a non-match.
pub fn parse_integer(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '.' | ','))
        .collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_count(text: &str) -> Option<u32> {
    parse_integer(text).and_then(|n| u32::try_from(n).ok())
}

/// Visible text of an element: trimmed text nodes joined by single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
