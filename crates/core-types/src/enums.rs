use serde::{Deserialize, Serialize};
use std::fmt;

/// The terminal label of a paper trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeKind {
    Win,
    Loss,
    Timeout,
}

impl OutcomeKind {
    /// Returns the label stored alongside trade outcome reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Win => "WIN",
            OutcomeKind::Loss => "LOSS",
            OutcomeKind::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutcomeKind {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIN" => Ok(OutcomeKind::Win),
            "LOSS" => Ok(OutcomeKind::Loss),
            "TIMEOUT" => Ok(OutcomeKind::Timeout),
            other => Err(crate::CoreError::InvalidInput(
                "outcome".to_string(),
                other.to_string(),
            )),
        }
    }
}
