//! End-of-run summary over accepted records.

use std::fmt;

use crate::model::{Currency, ListingRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeStats {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

impl RangeStats {
    fn from_values(values: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let (mut count, mut min, mut max, mut sum) = (1usize, first, first, u128::from(first));
        for value in iter {
            count += 1;
            min = min.min(value);
            max = max.max(value);
            sum += u128::from(value);
        }
        Some(Self {
            count,
            min,
            max,
            mean: sum as f64 / count as f64,
        })
    }
}

/// Distribution of CLP price per m², with linearly interpolated quantiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitPriceStats {
    pub count: usize,
    pub mean: f64,
    pub q10: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub q90: f64,
}

impl UnitPriceStats {
    fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let count = values.len();
        Some(Self {
            count,
            mean: values.iter().sum::<f64>() / count as f64,
            q10: quantile(&values, 0.10),
            q25: quantile(&values, 0.25),
            median: quantile(&values, 0.50),
            q75: quantile(&values, 0.75),
            q90: quantile(&values, 0.90),
        })
    }
}

/// `sorted` must be non-empty and ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunStats {
    pub records: usize,
    pub clp_price: Option<RangeStats>,
    pub uf_price: Option<RangeStats>,
    pub bedrooms: Option<RangeStats>,
    pub area_m2: Option<RangeStats>,
    /// CLP price per m² over records carrying both values.
    pub clp_per_m2: Option<UnitPriceStats>,
}

impl RunStats {
    pub fn from_records(records: &[ListingRecord]) -> Self {
        let price_in = |currency: Currency| {
            RangeStats::from_values(
                records
                    .iter()
                    .filter(|r| r.currency == currency)
                    .filter_map(|r| r.price),
            )
        };

        let per_m2: Vec<f64> = records
            .iter()
            .filter(|r| r.currency == Currency::Clp)
            .filter_map(|r| match (r.price, r.area_m2) {
                (Some(price), Some(area)) if area > 0 => Some(price as f64 / f64::from(area)),
                _ => None,
            })
            .collect();

        Self {
            records: records.len(),
            clp_price: price_in(Currency::Clp),
            uf_price: price_in(Currency::Uf),
            bedrooms: RangeStats::from_values(
                records.iter().filter_map(|r| r.bedrooms.map(u64::from)),
            ),
            area_m2: RangeStats::from_values(
                records.iter().filter_map(|r| r.area_m2.map(u64::from)),
            ),
            clp_per_m2: UnitPriceStats::from_values(per_m2),
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total properties: {}", self.records)?;
        if let Some(s) = &self.clp_price {
            writeln!(
                f,
                "CLP prices ({}): ${} - ${}, average ${:.0}",
                s.count, s.min, s.max, s.mean
            )?;
        }
        if let Some(s) = &self.uf_price {
            writeln!(
                f,
                "UF prices ({}): UF {} - UF {}, average UF {:.1}",
                s.count, s.min, s.max, s.mean
            )?;
        }
        if let Some(s) = &self.bedrooms {
            writeln!(f, "Bedrooms: {} - {}, average {:.1}", s.min, s.max, s.mean)?;
        }
        if let Some(s) = &self.area_m2 {
            writeln!(f, "Area: {} - {} m², average {:.0} m²", s.min, s.max, s.mean)?;
        }
        if let Some(u) = &self.clp_per_m2 {
            writeln!(f, "Average price per m²: ${:.0}", u.mean)?;
            writeln!(
                f,
                "Price per m² percentiles: p10 ${:.0}, p25 ${:.0}, median ${:.0}, p75 ${:.0}, p90 ${:.0}",
                u.q10, u.q25, u.median, u.q75, u.q90
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn record(
        price: Option<u64>,
        currency: Currency,
        area: Option<u32>,
        bedrooms: Option<u32>,
    ) -> ListingRecord {
        ListingRecord {
            title: Some("Casa".to_string()),
            price,
            currency,
            address: None,
            bedrooms,
            bathrooms: None,
            area_m2: area,
            features: BTreeSet::new(),
            raw_text: String::new(),
            extracted_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn empty_run_has_only_a_count() {
        let stats = RunStats::from_records(&[]);
        assert_eq!(stats, RunStats::default());
        assert_eq!(stats.to_string(), "Total properties: 0\n");
    }

    #[test]
    fn currencies_are_summarised_separately() {
        let records = [
            record(Some(100_000_000), Currency::Clp, Some(100), Some(3)),
            record(Some(200_000_000), Currency::Clp, Some(50), Some(4)),
            record(Some(5_000), Currency::Uf, None, None),
            record(None, Currency::Unknown, Some(80), None),
        ];
        let stats = RunStats::from_records(&records);

        assert_eq!(stats.records, 4);
        let clp = stats.clp_price.unwrap();
        assert_eq!((clp.count, clp.min, clp.max), (2, 100_000_000, 200_000_000));
        assert_eq!(clp.mean, 150_000_000.0);
        assert_eq!(stats.uf_price.unwrap().count, 1);
        assert_eq!(stats.area_m2.unwrap().count, 3);
        assert_eq!(stats.bedrooms.unwrap().mean, 3.5);
        // (1_000_000 + 4_000_000) / 2
        let per_m2 = stats.clp_per_m2.unwrap();
        assert_eq!(per_m2.mean, 2_500_000.0);
        assert_eq!(per_m2.median, 2_500_000.0);
    }

    #[test]
    fn unit_price_quantiles_interpolate_between_neighbours() {
        // 1, 2, 3, 4, 5 million CLP per m²
        let records: Vec<_> = (1..=5)
            .map(|m| record(Some(m * 100_000_000), Currency::Clp, Some(100), None))
            .collect();
        let per_m2 = RunStats::from_records(&records).clp_per_m2.unwrap();

        assert_eq!(per_m2.count, 5);
        assert_eq!(per_m2.median, 3_000_000.0);
        assert_eq!(per_m2.q25, 2_000_000.0);
        assert_eq!(per_m2.q75, 4_000_000.0);
        assert!((per_m2.q10 - 1_400_000.0).abs() < 1e-6);
        assert!((per_m2.q90 - 4_600_000.0).abs() < 1e-6);
    }

    #[test]
    fn summary_lists_unit_price_percentiles() {
        let stats = RunStats::from_records(&[record(
            Some(100_000_000),
            Currency::Clp,
            Some(100),
            Some(3),
        )]);
        let summary = stats.to_string();
        assert!(summary.contains("Average price per m²: $1000000"));
        assert!(summary.contains("median $1000000"));
    }
}
