use core_types::{InstrumentPrice, MarketSnapshot, percentage_change};
use std::collections::HashMap;

/// Annotates every price in `current` with its percentage change against
/// `previous`. Instruments missing from `previous`, or whose prices cannot be
/// parsed, keep `percentage_change = None`.
pub fn enrich(current: &MarketSnapshot, previous: &MarketSnapshot) -> MarketSnapshot {
    let previous_prices: HashMap<&str, &InstrumentPrice> = previous
        .prices
        .iter()
        .map(|p| (p.symbol.as_str(), p))
        .collect();

    let prices = current
        .prices
        .iter()
        .map(|price| {
            let mut enriched = InstrumentPrice::new(price.symbol.clone(), price.price.clone());
            if let Some(before) = previous_prices.get(price.symbol.as_str()) {
                enriched.percentage_change = change_between(before, price);
            }
            enriched
        })
        .collect();

    MarketSnapshot::new(current.timestamp, prices)
}

fn change_between(
    before: &InstrumentPrice,
    after: &InstrumentPrice,
) -> Option<rust_decimal::Decimal> {
    let from = before.decimal_price().ok()?;
    let to = after.decimal_price().ok()?;
    match percentage_change(from, to) {
        Ok(change) => Some(change),
        Err(e) => {
            tracing::debug!(symbol = %after.symbol, error = %e, "Skipping change calculation.");
            None
        }
    }
}
