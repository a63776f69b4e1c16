use crate::error::AnalyticsError;
use core_types::{ActivityReport, Candidate};
use rust_decimal::{Decimal, RoundingStrategy};

/// Mean of the `n` largest gains, rounded to 2 dp. When fewer than `n`
/// candidates exist all of them are averaged. Empty input or `n == 0` gives 0.
pub fn average_gain(candidates: &[Candidate], n: usize) -> Decimal {
    let take = n.min(candidates.len());
    if take == 0 {
        return Decimal::ZERO;
    }

    let mut gains: Vec<Decimal> = candidates.iter().map(|c| c.increment_price_gain).collect();
    gains.sort_unstable_by(|a, b| b.cmp(a));

    let total: Decimal = gains.iter().take(take).sum();
    (total / Decimal::from(take)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A stateless calculator for the per-cycle market activity summary.
#[derive(Debug, Default, Clone)]
pub struct AnalyticsEngine {
    top_averages: Vec<usize>,
}

impl AnalyticsEngine {
    pub fn new(top_averages: Vec<usize>) -> Self {
        Self { top_averages }
    }

    /// Builds the report for one activity-filter result.
    ///
    /// The first three configured N values feed the A/B/C top averages. Each is 0
    /// unless at least N candidates exist.
    pub fn activity_report(
        &self,
        timestamp: i64,
        candidates: &[Candidate],
    ) -> Result<ActivityReport, AnalyticsError> {
        if self.top_averages.is_empty() {
            return Err(AnalyticsError::NotEnoughData(
                "no top-average sizes configured".to_string(),
            ));
        }

        let top = |slot: usize| match self.top_averages.get(slot) {
            Some(&n) if n > 0 && candidates.len() >= n => average_gain(candidates, n),
            _ => Decimal::ZERO,
        };

        let report = ActivityReport {
            timestamp,
            pairs_count: candidates.len(),
            avg_gain: average_gain(candidates, candidates.len()),
            top_a_gain: top(0),
            top_b_gain: top(1),
            top_c_gain: top(2),
        };
        tracing::debug!(?report, "Activity report built.");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gainers(gains: &[Decimal]) -> Vec<Candidate> {
        gains
            .iter()
            .enumerate()
            .map(|(i, g)| Candidate::new(format!("PAIR{i}USDT"), *g))
            .collect()
    }

    #[test]
    fn averages_the_largest_gains() {
        let candidates = gainers(&[dec!(1), dec!(5), dec!(3), dec!(4)]);
        assert_eq!(average_gain(&candidates, 2), dec!(4.5));
        assert_eq!(average_gain(&candidates, 3), dec!(4));
    }

    #[test]
    fn rounds_to_two_places() {
        let candidates = gainers(&[dec!(1), dec!(1), dec!(2)]);
        assert_eq!(average_gain(&candidates, 3), dec!(1.33));
    }

    #[test]
    fn degenerate_inputs_give_zero() {
        assert_eq!(average_gain(&[], 3), Decimal::ZERO);
        assert_eq!(average_gain(&gainers(&[dec!(2)]), 0), Decimal::ZERO);
    }

    #[test]
    fn short_lists_average_everything() {
        assert_eq!(average_gain(&gainers(&[dec!(2), dec!(4)]), 10), dec!(3));
    }

    #[test]
    fn report_only_fills_tops_with_enough_candidates() {
        let engine = AnalyticsEngine::new(vec![3, 5, 10]);
        let candidates = gainers(&[dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)]);

        let report = engine.activity_report(600, &candidates).unwrap();
        assert_eq!(report.timestamp, 600);
        assert_eq!(report.pairs_count, 5);
        assert_eq!(report.avg_gain, dec!(3));
        assert_eq!(report.top_a_gain, dec!(4));
        assert_eq!(report.top_b_gain, dec!(3));
        assert_eq!(report.top_c_gain, Decimal::ZERO);
    }

    #[test]
    fn missing_sizes_are_rejected() {
        let err = AnalyticsEngine::new(Vec::new()).activity_report(0, &[]).unwrap_err();
        assert!(matches!(err, AnalyticsError::NotEnoughData(_)));
    }
}
