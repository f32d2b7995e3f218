//! Continuation verdict types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the per-iteration continuation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContinuationVerdict {
    /// Run another iteration
    Continue,
    /// Execution reported zero failures
    StopSuccess,
    /// Iteration budget exhausted
    StopMaxReached,
    /// Too few improvement proposals left to justify another pass
    StopLowImprovement,
}

impl ContinuationVerdict {
    pub fn is_stop(&self) -> bool {
        !matches!(self, ContinuationVerdict::Continue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContinuationVerdict::Continue => "continue",
            ContinuationVerdict::StopSuccess => "stop-success",
            ContinuationVerdict::StopMaxReached => "stop-max-reached",
            ContinuationVerdict::StopLowImprovement => "stop-low-improvement",
        }
    }
}

impl fmt::Display for ContinuationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_stop() {
        assert!(!ContinuationVerdict::Continue.is_stop());
        assert!(ContinuationVerdict::StopSuccess.is_stop());
        assert!(ContinuationVerdict::StopMaxReached.is_stop());
        assert!(ContinuationVerdict::StopLowImprovement.is_stop());
    }

    #[test]
    fn test_serialization_matches_display() {
        for verdict in [
            ContinuationVerdict::Continue,
            ContinuationVerdict::StopSuccess,
            ContinuationVerdict::StopMaxReached,
            ContinuationVerdict::StopLowImprovement,
        ] {
            let json = serde_json::to_string(&verdict).unwrap();
            assert_eq!(json, format!("\"{}\"", verdict));
        }
    }
}
