use core_types::{Candidate, MarketSnapshot};
use rust_decimal::Decimal;

/// Keeps every instrument whose change is at least `threshold`, in snapshot order.
pub fn activity_filter(snapshot: &MarketSnapshot, threshold: Decimal) -> Vec<Candidate> {
    snapshot
        .prices
        .iter()
        .filter_map(|price| match price.percentage_change {
            Some(change) if change >= threshold => {
                Some(Candidate::new(price.symbol.clone(), change))
            }
            _ => None,
        })
        .collect()
}
