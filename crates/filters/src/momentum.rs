use crate::error::FilterError;
use core_types::{Candidate, StrategyConfig, frame_timestamp, percentage_change};
use database::SnapshotSource;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// The per-strategy inputs of the momentum stage. Windows are in five-minute frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumParams {
    pub short_window: usize,
    pub long_window: usize,
    pub threshold: Decimal,
}

impl MomentumParams {
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.short_window == 0 || self.short_window > self.long_window {
            return Err(FilterError::InvalidWindows {
                short: self.short_window,
                long: self.long_window,
            });
        }
        Ok(())
    }
}

impl From<&StrategyConfig> for MomentumParams {
    fn from(strategy: &StrategyConfig) -> Self {
        Self {
            short_window: strategy.short_window,
            long_window: strategy.long_window,
            threshold: strategy.momentum_threshold,
        }
    }
}

/// Per-symbol accumulator, rebuilt on every invocation.
#[derive(Debug, Default)]
struct RollingWindow {
    running_total: Decimal,
    sample_count: usize,
    short_total: Option<Decimal>,
    long_total: Option<Decimal>,
}

impl RollingWindow {
    fn add(&mut self, price: Decimal) {
        self.running_total += price;
        self.sample_count += 1;
    }

    fn averages(&self, params: &MomentumParams) -> Option<(Decimal, Decimal)> {
        let short = self.short_total? / Decimal::from(params.short_window);
        let long = self.long_total? / Decimal::from(params.long_window);
        Some((short, long))
    }
}

/// Walks frames `0..=long_window` back from `base_timestamp`, accumulating each
/// candidate's price, and sets `sma_price_gain` on candidates whose short average
/// is above the long average by more than the threshold.
///
/// The cumulative total at frame `short_window - 1` (resp. `long_window - 1`) is
/// the basis of the short (resp. long) average; it is only captured when the
/// symbol is present in that frame. Missing frames are tolerated as gaps.
pub async fn momentum_filter<S: SnapshotSource + ?Sized>(
    source: &S,
    base_timestamp: i64,
    mut candidates: Vec<Candidate>,
    params: MomentumParams,
) -> Result<Vec<Candidate>, FilterError> {
    params.validate()?;

    let mut windows: HashMap<String, RollingWindow> = candidates
        .iter()
        .map(|c| (c.symbol.clone(), RollingWindow::default()))
        .collect();

    for frame in 0..=params.long_window {
        let timestamp = frame_timestamp(base_timestamp, frame);
        let snapshot = match source.read_snapshot(timestamp).await {
            Ok(snapshot) if !snapshot.is_empty() => snapshot,
            Ok(_) => {
                tracing::warn!(timestamp, frame, "Missing snapshot frame, treating as gap.");
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    timestamp,
                    frame,
                    error = %e,
                    "Snapshot frame unreadable, treating as gap."
                );
                continue;
            }
        };

        for price in &snapshot.prices {
            let Some(window) = windows.get_mut(&price.symbol) else {
                continue;
            };
            let Ok(value) = price.decimal_price() else {
                tracing::debug!(symbol = %price.symbol, timestamp, "Unparsable historical price.");
                continue;
            };
            window.add(value);
            if frame + 1 == params.short_window {
                window.short_total = Some(window.running_total);
            }
            if frame + 1 == params.long_window {
                window.long_total = Some(window.running_total);
            }
        }
    }

    for candidate in candidates.iter_mut() {
        let Some(window) = windows.get(&candidate.symbol) else {
            continue;
        };
        let Some((short, long)) = window.averages(&params) else {
            tracing::debug!(
                symbol = %candidate.symbol,
                samples = window.sample_count,
                "Insufficient history for momentum."
            );
            continue;
        };
        if short <= long {
            continue;
        }
        match percentage_change(long, short) {
            Ok(gain) if gain > params.threshold => {
                tracing::debug!(
                    symbol = %candidate.symbol,
                    %short,
                    %long,
                    %gain,
                    "Momentum promoted."
                );
                candidate.sma_price_gain = Some(gain);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    symbol = %candidate.symbol,
                    error = %e,
                    "Momentum gain not computable."
                );
            }
        }
    }

    Ok(candidates)
}

/// The promoted subset of a momentum result, in filter order.
pub fn promoted(candidates: &[Candidate]) -> Vec<Candidate> {
    candidates.iter().filter(|c| c.is_promoted()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{InstrumentPrice, MarketSnapshot};
    use database::MemoryStore;
    use rust_decimal_macros::dec;

    const BASE: i64 = 1_700_000_100;

    async fn store_with_frames(symbol: &str, newest_first: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for (frame, price) in newest_first.iter().enumerate() {
            store
                .insert_snapshot(MarketSnapshot::new(
                    frame_timestamp(BASE, frame),
                    vec![InstrumentPrice::new(symbol, *price)],
                ))
                .await;
        }
        store
    }

    fn params(short: usize, long: usize, threshold: Decimal) -> MomentumParams {
        MomentumParams {
            short_window: short,
            long_window: long,
            threshold,
        }
    }

    #[tokio::test]
    async fn fading_trend_is_not_promoted() {
        let store = store_with_frames("BTCUSDT", &["100", "102", "104", "101", "99"]).await;
        let result = momentum_filter(
            &store,
            BASE,
            vec![Candidate::new("BTCUSDT", dec!(1))],
            params(2, 4, dec!(0)),
        )
        .await
        .unwrap();

        assert!(promoted(&result).is_empty());
    }

    #[tokio::test]
    async fn rising_prices_are_promoted_with_their_gain() {
        let store = store_with_frames("ETHUSDT", &["110", "108", "106", "104", "102"]).await;
        let result = momentum_filter(
            &store,
            BASE,
            vec![Candidate::new("ETHUSDT", dec!(1))],
            params(2, 4, dec!(0.5)),
        )
        .await
        .unwrap();

        // short = 109, long = 107
        assert_eq!(result[0].sma_price_gain, Some(dec!(1.87)));
    }

    #[tokio::test]
    async fn threshold_comparison_is_strict() {
        let store = store_with_frames("ETHUSDT", &["110", "108", "106", "104", "102"]).await;
        let result = momentum_filter(
            &store,
            BASE,
            vec![Candidate::new("ETHUSDT", dec!(1))],
            params(2, 4, dec!(1.87)),
        )
        .await
        .unwrap();

        assert!(!result[0].is_promoted());
    }

    #[tokio::test]
    async fn strictly_increasing_series_has_short_above_long() {
        for (short, long) in [(1, 2), (1, 5), (2, 5), (3, 6), (5, 6)] {
            let prices: Vec<String> = (0..=long).map(|f| (1000 - f * 7).to_string()).collect();
            let refs: Vec<&str> = prices.iter().map(String::as_str).collect();
            let store = store_with_frames("SOLUSDT", &refs).await;

            let result = momentum_filter(
                &store,
                BASE,
                vec![Candidate::new("SOLUSDT", dec!(1))],
                params(short, long, Decimal::ZERO),
            )
            .await
            .unwrap();
            assert!(result[0].is_promoted(), "short={short} long={long}");
        }
    }

    #[tokio::test]
    async fn gap_at_long_boundary_leaves_symbol_unpromoted() {
        let store = MemoryStore::new();
        for (frame, price) in [(0, "110"), (1, "108"), (2, "106")] {
            store
                .insert_snapshot(MarketSnapshot::new(
                    frame_timestamp(BASE, frame),
                    vec![InstrumentPrice::new("ETHUSDT", price)],
                ))
                .await;
        }

        let result = momentum_filter(
            &store,
            BASE,
            vec![Candidate::new("ETHUSDT", dec!(1))],
            params(2, 4, Decimal::ZERO),
        )
        .await
        .unwrap();
        assert!(!result[0].is_promoted());
    }

    #[tokio::test]
    async fn missing_middle_frame_still_divides_by_the_full_window() {
        let store = MemoryStore::new();
        for (frame, price) in [(0, "110"), (2, "106"), (3, "104")] {
            store
                .insert_snapshot(MarketSnapshot::new(
                    frame_timestamp(BASE, frame),
                    vec![InstrumentPrice::new("ETHUSDT", price)],
                ))
                .await;
        }

        let result = momentum_filter(
            &store,
            BASE,
            vec![Candidate::new("ETHUSDT", dec!(1))],
            params(1, 4, Decimal::ZERO),
        )
        .await
        .unwrap();

        // short = 110, long = (110 + 106 + 104) / 4 = 80
        assert_eq!(result[0].sma_price_gain, Some(dec!(37.5)));
    }

    #[tokio::test]
    async fn candidate_order_is_preserved() {
        let store = MemoryStore::new();
        for frame in 0..=2 {
            let up = (200 - frame * 10).to_string();
            let down = (100 + frame * 10).to_string();
            store
                .insert_snapshot(MarketSnapshot::new(
                    frame_timestamp(BASE, frame),
                    vec![
                        InstrumentPrice::new("DOWNUSDT", down),
                        InstrumentPrice::new("UPUSDT", up),
                    ],
                ))
                .await;
        }

        let result = momentum_filter(
            &store,
            BASE,
            vec![Candidate::new("UPUSDT", dec!(2)), Candidate::new("DOWNUSDT", dec!(1))],
            params(1, 2, Decimal::ZERO),
        )
        .await
        .unwrap();

        let symbols: Vec<_> = result.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["UPUSDT", "DOWNUSDT"]);
        assert!(result[0].is_promoted());
        assert!(!result[1].is_promoted());
    }

    #[tokio::test]
    async fn invalid_windows_are_rejected() {
        let store = MemoryStore::new();
        let err = momentum_filter(&store, BASE, Vec::new(), params(5, 3, Decimal::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidWindows { short: 5, long: 3 }));
    }
}
