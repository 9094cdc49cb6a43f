use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use scraper::ElementRef;

use crate::model::{Currency, Field, ListingRecord};
use crate::patterns::PatternRegistry;
use crate::resolve::{element_text, FieldResolver};
use crate::validate::{RecordValidator, RejectReason, Verdict};

/// Source of extraction timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Accepted(ListingRecord),
    /// The assembled record failed validation. `draft` is kept for diagnostics
    /// and never reaches the accumulator.
    Rejected {
        reason: RejectReason,
        draft: Box<ListingRecord>,
    },
}

/// Builds validated [`ListingRecord`]s from listing elements.
///
/// Cheap to clone; every clone shares the same compiled registry.
#[derive(Clone)]
pub struct RecordExtractor {
    registry: Arc<PatternRegistry>,
    validator: RecordValidator,
    clock: Clock,
}

impl RecordExtractor {
    pub fn new(registry: Arc<PatternRegistry>, validator: RecordValidator) -> Self {
        Self::with_clock(registry, validator, Arc::new(Utc::now))
    }

    pub fn with_clock(
        registry: Arc<PatternRegistry>,
        validator: RecordValidator,
        clock: Clock,
    ) -> Self {
        Self {
            registry,
            validator,
            clock,
        }
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn extract(&self, element: ElementRef<'_>) -> Option<ListingRecord> {
        match self.extract_outcome(element) {
            ExtractOutcome::Accepted(record) => Some(record),
            ExtractOutcome::Rejected { .. } => None,
        }
    }

    pub fn extract_outcome(&self, element: ElementRef<'_>) -> ExtractOutcome {
        let raw_text = element_text(element);
        let resolver = FieldResolver::new(&self.registry);
        let resolve = |field| resolver.resolve(field, element, &raw_text);

        let (price, currency) = match resolve(Field::Price).into_price() {
            Some((amount, currency)) => (Some(amount), currency),
            None => (None, Currency::Unknown),
        };

        let record = ListingRecord {
            title: resolve(Field::Title).into_text(),
            price,
            currency,
            address: resolve(Field::Address).into_text(),
            bedrooms: resolve(Field::Bedrooms).into_integer(),
            bathrooms: resolve(Field::Bathrooms).into_integer(),
            area_m2: resolve(Field::Area).into_integer(),
            features: self
                .registry
                .matching_features(&raw_text)
                .into_iter()
                .collect::<BTreeSet<_>>(),
            extracted_at: (self.clock)(),
            raw_text,
        };

        match self.validator.validate(&record) {
            Verdict::Accept => ExtractOutcome::Accepted(record),
            Verdict::Reject(reason) => ExtractOutcome::Rejected {
                reason,
                draft: Box::new(record),
            },
        }
    }
}

impl std::fmt::Debug for RecordExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordExtractor")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}
