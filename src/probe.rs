//! Feasibility probing over aggregated provider statistics (SPEC_FULL.md §4.6).

use crate::intent::SearchIntent;
use crate::orchestrator::Orchestrator;
use crate::providers::YearHistogram;
use std::collections::HashMap;

/// Total-count feasibility bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeasibilityBand {
    TooNarrow,
    Feasible,
    Borderline,
    TooBroad,
}

impl FeasibilityBand {
    #[must_use]
    pub fn classify(total_count: u64) -> Self {
        match total_count {
            0..=49 => FeasibilityBand::TooNarrow,
            50..=500 => FeasibilityBand::Feasible,
            501..=2000 => FeasibilityBand::Borderline,
            _ => FeasibilityBand::TooBroad,
        }
    }

    #[must_use]
    pub fn suggestions(self) -> Vec<&'static str> {
        match self {
            FeasibilityBand::TooNarrow => vec![
                "drop one or more query terms",
                "remove year or venue restrictions",
            ],
            FeasibilityBand::Feasible => Vec::new(),
            FeasibilityBand::Borderline => vec![
                "consider adding a concept filter to narrow results",
                "consider a tighter year range",
            ],
            FeasibilityBand::TooBroad => vec![
                "add concept filters to narrow the topic",
                "restrict to a year range",
                "restrict to a venue whitelist",
            ],
        }
    }
}

/// Feasibility and trend metrics for one query (SPEC_FULL.md §4.6).
#[derive(Debug, Clone)]
pub struct SignalMetrics {
    pub total_count: u64,
    pub band: FeasibilityBand,
    pub rising: bool,
    pub suggestions: Vec<&'static str>,
    pub year_histogram: YearHistogram,
}

pub struct Probe<'a> {
    orchestrator: &'a Orchestrator,
}

impl<'a> Probe<'a> {
    #[must_use]
    pub fn new(orchestrator: &'a Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Requests aggregated statistics, classifies feasibility, and computes
    /// the rising/falling trend signal.
    pub async fn signal_strength(&self, intent: &SearchIntent) -> SignalMetrics {
        let stats = self.orchestrator.get_stats(intent).await;
        let band = FeasibilityBand::classify(stats.total_count);
        let rising = is_rising(&stats.year_histogram);
        SignalMetrics {
            total_count: stats.total_count,
            band,
            rising,
            suggestions: band.suggestions(),
            year_histogram: stats.year_histogram,
        }
    }

    /// Returns the raw per-year histogram, optionally clipped to `[year_start, year_end]`.
    pub async fn trend_line(&self, intent: &SearchIntent, year_start: Option<i32>, year_end: Option<i32>) -> YearHistogram {
        let stats = self.orchestrator.get_stats(intent).await;
        stats
            .year_histogram
            .into_iter()
            .filter(|(year, _)| year_start.map_or(true, |from| *year >= from) && year_end.map_or(true, |to| *year <= to))
            .collect()
    }

    /// Runs a probe for each query concurrently, returning a map keyed by
    /// the original query string.
    pub async fn compare(&self, intents: Vec<SearchIntent>) -> HashMap<String, SignalMetrics> {
        let mut out = HashMap::new();
        let results = futures::future::join_all(intents.iter().map(|intent| self.signal_strength(intent))).await;
        for (intent, metrics) in intents.into_iter().zip(results) {
            out.insert(intent.query, metrics);
        }
        out
    }
}

/// Rising iff the mean count of the last two years in the histogram exceeds
/// the mean of the two prior years by more than 5% (SPEC_FULL.md §4.6).
fn is_rising(histogram: &YearHistogram) -> bool {
    let years: Vec<i32> = histogram.keys().copied().collect();
    if years.len() < 4 {
        return false;
    }
    let latest_two = &years[years.len() - 2..];
    let prior_two = &years[years.len() - 4..years.len() - 2];

    let mean_of = |ys: &[i32]| -> f64 {
        let sum: u64 = ys.iter().map(|y| *histogram.get(y).unwrap_or(&0)).sum();
        sum as f64 / ys.len() as f64
    };

    let recent_mean = mean_of(latest_two);
    let prior_mean = mean_of(prior_two);
    if prior_mean <= 0.0 {
        return recent_mean > 0.0;
    }
    (recent_mean - prior_mean) / prior_mean > 0.05
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(years: &[(i32, u64)]) -> YearHistogram {
        years.iter().copied().collect()
    }

    #[test]
    fn classifies_feasibility_bands() {
        assert_eq!(FeasibilityBand::classify(10), FeasibilityBand::TooNarrow);
        assert_eq!(FeasibilityBand::classify(49), FeasibilityBand::TooNarrow);
        assert_eq!(FeasibilityBand::classify(50), FeasibilityBand::Feasible);
        assert_eq!(FeasibilityBand::classify(500), FeasibilityBand::Feasible);
        assert_eq!(FeasibilityBand::classify(501), FeasibilityBand::Borderline);
        assert_eq!(FeasibilityBand::classify(2000), FeasibilityBand::Borderline);
        assert_eq!(FeasibilityBand::classify(2001), FeasibilityBand::TooBroad);
    }

    #[test]
    fn detects_rising_trend() {
        let hist = histogram(&[(2020, 10), (2021, 10), (2022, 20), (2023, 22)]);
        assert!(is_rising(&hist));
    }

    #[test]
    fn flat_trend_is_not_rising() {
        let hist = histogram(&[(2020, 10), (2021, 10), (2022, 10), (2023, 10)]);
        assert!(!is_rising(&hist));
    }

    #[test]
    fn insufficient_history_is_not_rising() {
        let hist = histogram(&[(2022, 10), (2023, 50)]);
        assert!(!is_rising(&hist));
    }
}
