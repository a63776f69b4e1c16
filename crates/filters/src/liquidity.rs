use core_types::Candidate;
use database::StatsSource;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Keeps candidates whose latest liquidity estimate is at least `threshold`.
///
/// Missing records, empty or non-numeric estimates and lookup failures drop the
/// candidate without failing the batch. Survivors keep their relative order.
pub async fn liquidity_filter<S: StatsSource + ?Sized>(
    stats: &S,
    candidates: Vec<Candidate>,
    threshold: Decimal,
) -> Vec<Candidate> {
    let mut retained = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let estimate = match stats.latest_liquidity(&candidate.symbol).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(symbol = %candidate.symbol, "No liquidity record, skipping.");
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %candidate.symbol,
                    error = %e,
                    "Liquidity lookup failed, skipping."
                );
                continue;
            }
        };

        let Some(liquidity) = parse_estimate(&estimate) else {
            tracing::warn!(
                symbol = %candidate.symbol,
                estimate = %estimate,
                "Unusable liquidity estimate, skipping."
            );
            continue;
        };

        if liquidity >= threshold {
            retained.push(candidate);
        }
    }

    retained
}

fn parse_estimate(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}
