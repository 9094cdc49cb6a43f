use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Currency, ListingRecord};

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub min: u64,
    pub max: u64,
}

impl Bound {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Acceptance ranges, selected per market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationBounds {
    pub clp_price: Bound,
    pub uf_price: Bound,
    pub area_m2: Bound,
    #[serde(default)]
    pub bedrooms: Option<Bound>,
    #[serde(default)]
    pub bathrooms: Option<Bound>,
}

impl ValidationBounds {
    /// House sales around Villa Los Jardines.
    pub fn villa_los_jardines() -> Self {
        Self {
            clp_price: Bound::new(10_000_000, 1_000_000_000),
            uf_price: Bound::new(100, 50_000),
            area_m2: Bound::new(20, 1000),
            bedrooms: None,
            bathrooms: None,
        }
    }

    /// Monthly rentals in the metropolitan area.
    pub fn santiago_rentals() -> Self {
        Self {
            clp_price: Bound::new(100_000, 10_000_000),
            uf_price: Bound::new(100, 50_000),
            area_m2: Bound::new(20, 500),
            bedrooms: None,
            bathrooms: None,
        }
    }

    /// Reject inverted ranges and a UF range that overlaps the CLP one.
    pub fn check(&self) -> Result<(), BoundsError> {
        let named = [
            ("clp_price", Some(self.clp_price)),
            ("uf_price", Some(self.uf_price)),
            ("area_m2", Some(self.area_m2)),
            ("bedrooms", self.bedrooms),
            ("bathrooms", self.bathrooms),
        ];
        for (name, bound) in named {
            if let Some(bound) = bound {
                if bound.min > bound.max {
                    return Err(BoundsError::Inverted { name, bound });
                }
            }
        }
        if self.uf_price.max >= self.clp_price.min {
            return Err(BoundsError::OverlappingCurrencies {
                uf_max: self.uf_price.max,
                clp_min: self.clp_price.min,
            });
        }
        Ok(())
    }
}

impl Default for ValidationBounds {
    fn default() -> Self {
        Self::villa_los_jardines()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoundsError {
    #[error("{name} bound is inverted: min {} > max {}", bound.min, bound.max)]
    Inverted { name: &'static str, bound: Bound },
    #[error("UF maximum {uf_max} must stay below the CLP minimum {clp_min}")]
    OverlappingCurrencies { uf_max: u64, clp_min: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingPriceAndTitle,
    PriceOutOfRange { price: u64, currency: Currency },
    UnknownCurrency { price: u64 },
    AreaOutOfRange(u32),
    BedroomsOutOfRange(u32),
    BathroomsOutOfRange(u32),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingPriceAndTitle => write!(f, "no price and no title"),
            RejectReason::PriceOutOfRange { price, currency } => {
                write!(f, "price {price} {currency} out of range")
            }
            RejectReason::UnknownCurrency { price } => {
                write!(f, "price {price} has no known currency")
            }
            RejectReason::AreaOutOfRange(area) => write!(f, "area {area} m² out of range"),
            RejectReason::BedroomsOutOfRange(n) => write!(f, "{n} bedrooms out of range"),
            RejectReason::BathroomsOutOfRange(n) => write!(f, "{n} bathrooms out of range"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone)]
pub struct RecordValidator {
    bounds: ValidationBounds,
}

impl RecordValidator {
    pub fn new(bounds: ValidationBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &ValidationBounds {
        &self.bounds
    }

    pub fn validate(&self, record: &ListingRecord) -> Verdict {
        match self.first_violation(record) {
            Some(reason) => Verdict::Reject(reason),
            None => Verdict::Accept,
        }
    }

    fn first_violation(&self, record: &ListingRecord) -> Option<RejectReason> {
        if record.price.is_none() && record.title.is_none() {
            return Some(RejectReason::MissingPriceAndTitle);
        }

        if let Some(price) = record.price {
            let bound = match record.currency {
                Currency::Clp => self.bounds.clp_price,
                Currency::Uf => self.bounds.uf_price,
                Currency::Unknown => return Some(RejectReason::UnknownCurrency { price }),
            };
            if !bound.contains(price) {
                return Some(RejectReason::PriceOutOfRange {
                    price,
                    currency: record.currency,
                });
            }
        }

        if let Some(area) = record.area_m2 {
            if !self.bounds.area_m2.contains(u64::from(area)) {
                return Some(RejectReason::AreaOutOfRange(area));
            }
        }

        if let (Some(bound), Some(n)) = (self.bounds.bedrooms, record.bedrooms) {
            if !bound.contains(u64::from(n)) {
                return Some(RejectReason::BedroomsOutOfRange(n));
            }
        }

        if let (Some(bound), Some(n)) = (self.bounds.bathrooms, record.bathrooms) {
            if !bound.contains(u64::from(n)) {
                return Some(RejectReason::BathroomsOutOfRange(n));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_consistent() {
        assert_eq!(ValidationBounds::villa_los_jardines().check(), Ok(()));
        assert_eq!(ValidationBounds::santiago_rentals().check(), Ok(()));
    }

    #[test]
    fn inverted_bound_is_reported_by_name() {
        let mut bounds = ValidationBounds::default();
        bounds.bedrooms = Some(Bound::new(5, 1));
        assert_eq!(
            bounds.check(),
            Err(BoundsError::Inverted {
                name: "bedrooms",
                bound: Bound::new(5, 1)
            })
        );
    }

    #[test]
    fn uf_range_must_sit_below_clp_range() {
        let mut bounds = ValidationBounds::default();
        bounds.uf_price = Bound::new(100, 20_000_000);
        assert!(matches!(
            bounds.check(),
            Err(BoundsError::OverlappingCurrencies { .. })
        ));
    }

    #[test]
    fn bound_is_inclusive() {
        let bound = Bound::new(20, 1000);
        assert!(bound.contains(20));
        assert!(bound.contains(1000));
        assert!(!bound.contains(19));
        assert!(!bound.contains(1001));
    }
}
