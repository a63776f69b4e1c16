use rust_decimal::{Decimal, RoundingStrategy};

const BALANCE_DP: u32 = 8;

/// Balance after a simulated round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeOutcome {
    pub final_balance: Decimal,
    /// Buy fee plus sell fee.
    pub fees_paid: Decimal,
    /// Whether the final balance beats the balance before the buy fee.
    pub net_gain: bool,
}

/// Takes `fee_pct` of the balance before the move, applies `change_pct`, then takes
/// `fee_pct` of what is left. Amounts are kept to 8 dp.
pub fn apply_round_trip_fees(
    balance: Decimal,
    change_pct: Decimal,
    fee_pct: Decimal,
) -> FeeOutcome {
    let hundred = Decimal::ONE_HUNDRED;

    let buy_fee = balance * fee_pct / hundred;
    let invested = balance - buy_fee;
    let moved = invested * (Decimal::ONE + change_pct / hundred);
    let sell_fee = moved * fee_pct / hundred;
    let final_balance = moved - sell_fee;

    let round =
        |d: Decimal| d.round_dp_with_strategy(BALANCE_DP, RoundingStrategy::MidpointAwayFromZero);
    let final_balance = round(final_balance);

    FeeOutcome {
        final_balance,
        fees_paid: round(buy_fee + sell_fee),
        net_gain: final_balance > balance,
    }
}
