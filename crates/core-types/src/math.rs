use crate::error::CoreError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Percentage move from `from` to `to`, rounded half away from zero to 2 decimal places.
///
/// Returns an error when `from` is zero or the intermediate result overflows.
pub fn percentage_change(from: Decimal, to: Decimal) -> Result<Decimal, CoreError> {
    if from.is_zero() {
        return Err(CoreError::Calculation(
            "percentage change from a zero base".to_string(),
        ));
    }

    let change = (to - from)
        .checked_div(from)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .ok_or_else(|| {
            CoreError::Calculation(format!("overflow computing change {from} -> {to}"))
        })?;

    Ok(change.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
