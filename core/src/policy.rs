use serde::{Deserialize, Serialize};

use crate::decision::{Confidence, DecisionRecord};

pub const FAILED_ROOT_CAUSE: &str = "Analysis failed: unable to analyze";
pub const FAILED_REMEDIATION: &str = "Unable to provide remediation";

/// What verdict to report when no trustworthy analysis could be produced.
///
/// `FailOpen` keeps the caller's rollout moving (promote, zero confidence).
/// `FailClosed` halts it (abort, zero confidence). Confidence is zero either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    FailOpen,
    FailClosed,
}

impl FailurePolicy {
    /// Parse a configuration value. Unknown values keep the default.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fail_open" | "fail-open" | "open" => Some(FailurePolicy::FailOpen),
            "fail_closed" | "fail-closed" | "closed" => Some(FailurePolicy::FailClosed),
            _ => None,
        }
    }

    pub fn promote_on_failure(&self) -> bool {
        matches!(self, FailurePolicy::FailOpen)
    }

    /// Synthetic record standing in for an analysis that faulted.
    pub fn failure_record(&self, fault: &dyn std::fmt::Display) -> DecisionRecord {
        DecisionRecord {
            analysis: format!("Error processing analysis request: {fault}"),
            root_cause: FAILED_ROOT_CAUSE.to_string(),
            remediation: FAILED_REMEDIATION.to_string(),
            fix_link: None,
            promote: self.promote_on_failure(),
            confidence: Confidence::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_fails_open_with_zero_confidence() {
        let record = FailurePolicy::default().failure_record(&"upstream returned 503");
        assert!(record.promote);
        assert_eq!(record.confidence, Confidence::ZERO);
        assert!(record.analysis.contains("upstream returned 503"));
        assert_eq!(record.root_cause, FAILED_ROOT_CAUSE);
        assert_eq!(record.remediation, FAILED_REMEDIATION);
        assert!(record.fix_link.is_none());
    }

    #[test]
    fn fail_closed_blocks_promotion() {
        let record = FailurePolicy::FailClosed.failure_record(&"timeout");
        assert!(!record.promote);
        assert_eq!(record.confidence.value(), 0);
    }

    #[test]
    fn parse_accepts_common_spellings() {
        assert_eq!(FailurePolicy::parse("FAIL_CLOSED"), Some(FailurePolicy::FailClosed));
        assert_eq!(FailurePolicy::parse(" fail-open "), Some(FailurePolicy::FailOpen));
        assert_eq!(FailurePolicy::parse("sometimes"), None);
    }
}
