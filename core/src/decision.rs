use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Placeholder for a section the analysis did not label.
pub const SEE_ANALYSIS: &str = "See analysis";

/// Confidence used when the verdict is to continue the rollout.
pub const PROMOTE_CONFIDENCE: u8 = 80;
/// Confidence used when the verdict is to abort or roll back.
pub const HOLD_CONFIDENCE: u8 = 50;

/// Confidence score, 0 to 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct Confidence(u8);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0);
    pub const MAX: u8 = 100;

    /// Saturates at 100.
    pub fn saturating(value: u8) -> Self {
        Confidence(value.min(Self::MAX))
    }

    pub fn new(value: u32) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Confidence)
    }

    /// The value implied by a verdict when the text states no number.
    pub fn for_verdict(promote: bool) -> Self {
        if promote {
            Confidence(PROMOTE_CONFIDENCE)
        } else {
            Confidence(HOLD_CONFIDENCE)
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u32::deserialize(deserializer)?;
        Confidence::new(raw).ok_or_else(|| {
            serde::de::Error::custom(format!("confidence must be between 0 and 100, got {raw}"))
        })
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured verdict derived from free-form analysis text.
///
/// The JSON shape is what the deployment controller reads: `analysis`,
/// `rootCause`, `remediation`, `prLink`, `promote`, `confidence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    /// Full analysis text from the reasoning engine, or an error explanation
    pub analysis: String,
    /// Identified root cause (never empty)
    pub root_cause: String,
    /// Suggested remediation (never empty)
    pub remediation: String,
    /// Link to a submitted fix, when one was mentioned in the analysis
    #[serde(rename = "prLink", default, skip_serializing_if = "Option::is_none")]
    pub fix_link: Option<String>,
    /// true = continue the rollout, false = abort / roll back
    pub promote: bool,
    /// Confidence in the verdict, 0-100
    #[schema(value_type = u8, minimum = 0, maximum = 100)]
    pub confidence: Confidence,
}

impl DecisionRecord {
    /// Plain-text rendering used as the human-readable artifact part.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Analysis:\n");
        out.push_str(&self.analysis);
        out.push_str("\n\nRoot Cause:\n");
        out.push_str(&self.root_cause);
        out.push_str("\n\nRemediation:\n");
        out.push_str(&self.remediation);
        if let Some(link) = &self.fix_link {
            out.push_str("\n\nPR Link: ");
            out.push_str(link);
        }
        out.push_str(&format!(
            "\n\nPromote: {}\nConfidence: {}%",
            self.promote, self.confidence
        ));
        out
    }
}
