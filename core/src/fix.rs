use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A code fix to publish as a pull request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixRequest {
    pub repo_url: String,
    /// Repository-relative path -> full new file content
    pub file_changes: BTreeMap<String, String>,
    pub fix_description: String,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub pod_name: Option<String>,
    #[serde(default)]
    pub testing_recommendations: Option<String>,
}

impl FixRequest {
    /// Name of the first missing required argument.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.repo_url.trim().is_empty() {
            Some("repoUrl")
        } else if self.file_changes.is_empty() {
            Some("fileChanges")
        } else if self.fix_description.trim().is_empty() {
            Some("fixDescription")
        } else {
            None
        }
    }
}

/// Outcome of a fix submission. All-or-nothing: either a link or an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    Submitted {
        url: String,
        number: u64,
        branch: String,
    },
    Rejected {
        error: String,
    },
}

impl FixOutcome {
    pub fn rejected(error: impl Into<String>) -> Self {
        FixOutcome::Rejected {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FixOutcome::Submitted { .. })
    }

    /// Tool-result shape handed back to the reasoning engine.
    pub fn to_value(&self) -> Value {
        match self {
            FixOutcome::Submitted {
                url,
                number,
                branch,
            } => json!({
                "success": true,
                "prUrl": url,
                "prNumber": number,
                "branch": branch,
            }),
            FixOutcome::Rejected { error } => json!({
                "success": false,
                "error": error,
            }),
        }
    }
}

#[async_trait]
pub trait FixSubmitter: Send + Sync {
    async fn create_fix(&self, request: FixRequest) -> FixOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_reports_first_gap() {
        let mut request = FixRequest::default();
        assert_eq!(request.missing_field(), Some("repoUrl"));
        request.repo_url = "https://github.com/acme/shop".to_string();
        assert_eq!(request.missing_field(), Some("fileChanges"));
        request
            .file_changes
            .insert("src/app.rs".to_string(), "fn main() {}".to_string());
        assert_eq!(request.missing_field(), Some("fixDescription"));
        request.fix_description = "raise pool size".to_string();
        assert_eq!(request.missing_field(), None);
    }

    #[test]
    fn outcome_values_match_tool_contract() {
        let ok = FixOutcome::Submitted {
            url: "https://github.com/acme/shop/pull/12".to_string(),
            number: 12,
            branch: "fix/k8s-issue-1".to_string(),
        };
        assert!(ok.is_success());
        assert_eq!(ok.to_value()["prNumber"], 12);

        let err = FixOutcome::rejected("GITHUB_TOKEN environment variable is required");
        assert_eq!(
            err.to_value(),
            json!({"success": false, "error": "GITHUB_TOKEN environment variable is required"})
        );
    }
}
