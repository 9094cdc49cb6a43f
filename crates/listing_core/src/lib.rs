//! Listing core: pattern registry, field resolution, validation and record extraction.
//!
//! Everything here is pure. Fetching, decoding and export live in `listing_engine`.
mod discover;
mod extract;
mod model;
mod patterns;
mod resolve;
mod stats;
mod validate;

pub use discover::{discover_listings, Discovery};
pub use extract::{Clock, ExtractOutcome, RecordExtractor};
pub use model::{Currency, Field, FieldKind, ListingRecord};
pub use patterns::{
    CompiledPattern, CompiledSelector, FieldPatterns, FieldRules, PatternEntry, PatternRegistry,
    PatternSpec, RegistryError,
};
pub use resolve::{element_text, parse_integer, FieldResolver, FieldValue, Resolution, Strategy};
pub use stats::{RangeStats, RunStats, UnitPriceStats};
pub use validate::{Bound, BoundsError, RecordValidator, RejectReason, ValidationBounds, Verdict};
