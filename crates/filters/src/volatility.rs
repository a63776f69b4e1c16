use core_types::Candidate;

/// Final selection stage applied to a strategy's promoted candidates.
pub trait VolatilityFilter: Send + Sync {
    fn select<'a>(&self, promoted: &'a [Candidate]) -> Option<&'a Candidate>;
}

/// Performs no volatility check and takes the first promoted candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct BypassVolatility;

impl VolatilityFilter for BypassVolatility {
    fn select<'a>(&self, promoted: &'a [Candidate]) -> Option<&'a Candidate> {
        promoted.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn bypass_takes_first_in_filter_order() {
        let promoted = vec![Candidate::new("ZUSDT", dec!(1)), Candidate::new("AUSDT", dec!(9))];
        assert_eq!(BypassVolatility.select(&promoted).map(|c| c.symbol.as_str()), Some("ZUSDT"));
        assert!(BypassVolatility.select(&[]).is_none());
    }
}
