//! Fix submission through the GitHub REST API.
//!
//! The git workflow is deterministic: branch off the default branch, write
//! each changed file through the contents API, open a pull request. Only the
//! file contents and the description come from the reasoning engine.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use rollout_core::fix::{FixOutcome, FixRequest, FixSubmitter};
use serde_json::{Value, json};
use url::Url;

use crate::config::GitHubConfig;

const USER_AGENT: &str = concat!("rollout-agent/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("GITHUB_TOKEN environment variable is required")]
    NotConfigured,
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Not a GitHub repository URL: {0}")]
    InvalidRepoUrl(String),
    #[error("GitHub request failed: {0}")]
    Transport(String),
    #[error("GitHub returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("GitHub returned an unexpected response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FixError {
    fn from(err: reqwest::Error) -> Self {
        FixError::Transport(err.to_string())
    }
}

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Accepts `https://github.com/o/r(.git)`, `git@github.com:o/r.git` and `o/r`.
    pub fn parse(repo_url: &str) -> Result<Self, FixError> {
        let trimmed = repo_url.trim();
        let path = if let Some(rest) = trimmed.strip_prefix("git@") {
            rest.split_once(':').map(|(_, path)| path.to_string())
        } else if trimmed.contains("://") {
            Url::parse(trimmed).ok().map(|url| url.path().to_string())
        } else {
            Some(trimmed.to_string())
        };
        let invalid = || FixError::InvalidRepoUrl(repo_url.to_string());
        let path = path.ok_or_else(invalid)?;
        let mut parts = path
            .trim_matches('/')
            .split('/')
            .filter(|part| !part.is_empty());
        let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

pub fn branch_name(now_millis: i64) -> String {
    format!("fix/k8s-issue-{now_millis}")
}

/// Pull request description built from the analysis.
pub fn pr_body(request: &FixRequest) -> String {
    let or = |value: &Option<String>, fallback: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    let files: Vec<&str> = request.file_changes.keys().map(String::as_str).collect();
    let changes = if files.is_empty() {
        "No files changed".to_string()
    } else {
        files.join(", ")
    };

    format!(
        "## Root Cause Analysis\n{root_cause}\n\n\
         ## Changes Made\nModified files: {changes}\n\n{description}\n\n\
         ## Testing Recommendations\n{testing}\n\n\
         ## Related Kubernetes Resources\n\
         - **Namespace**: `{namespace}`\n\
         - **Pod**: `{pod}`\n\n\
         ---\n\
         *This PR was automatically generated by the rollout analysis agent*\n\
         *Review carefully before merging*\n",
        root_cause = or(&request.root_cause, "Not available"),
        description = request.fix_description.trim(),
        testing = or(&request.testing_recommendations, "Run existing test suite"),
        namespace = or(&request.namespace, "unknown"),
        pod = or(&request.pod_name, "unknown"),
    )
}

pub struct GitHubFixSubmitter {
    http: reqwest::Client,
    config: GitHubConfig,
}

impl GitHubFixSubmitter {
    pub fn new(config: GitHubConfig) -> Result<Self, FixError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        if config.token.is_none() {
            tracing::warn!("GITHUB_TOKEN environment variable not set; fix pull requests disabled");
        }
        Ok(Self { http, config })
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled()
    }

    fn endpoint(&self, repo: &RepoRef, tail: &[&str]) -> Result<Url, FixError> {
        let mut url = self.config.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| FixError::InvalidRepoUrl(self.config.api_url.to_string()))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn call(
        &self,
        request: reqwest::RequestBuilder,
        allow_missing: bool,
    ) -> Result<Option<Value>, FixError> {
        let token = self.config.token.as_deref().ok_or(FixError::NotConfigured)?;
        let response = request
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;
        let status = response.status();
        if allow_missing && status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(FixError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(Some(response.json::<Value>().await?))
    }

    async fn call_required(&self, request: reqwest::RequestBuilder) -> Result<Value, FixError> {
        self.call(request, false)
            .await?
            .ok_or_else(|| FixError::Malformed("empty response".to_string()))
    }

    async fn submit(&self, request: &FixRequest) -> Result<FixOutcome, FixError> {
        if !self.enabled() {
            return Err(FixError::NotConfigured);
        }
        if let Some(field) = request.missing_field() {
            return Err(FixError::MissingParameter(field));
        }
        let repo = RepoRef::parse(&request.repo_url)?;
        let branch = branch_name(chrono::Utc::now().timestamp_millis());
        tracing::info!(owner = %repo.owner, repo = %repo.name, branch = %branch, "Creating fix pull request");

        let repo_doc = self
            .call_required(self.http.get(self.endpoint(&repo, &[])?))
            .await?;
        let base = repo_doc
            .get("default_branch")
            .and_then(Value::as_str)
            .ok_or_else(|| FixError::Malformed("repository has no default_branch".to_string()))?
            .to_string();

        let base_ref = self
            .call_required(
                self.http
                    .get(self.endpoint(&repo, &["git", "ref", "heads", base.as_str()])?),
            )
            .await?;
        let base_sha = base_ref
            .pointer("/object/sha")
            .and_then(Value::as_str)
            .ok_or_else(|| FixError::Malformed("branch ref has no sha".to_string()))?;

        self.call_required(
            self.http
                .post(self.endpoint(&repo, &["git", "refs"])?)
                .json(&json!({ "ref": format!("refs/heads/{branch}"), "sha": base_sha })),
        )
        .await?;

        let commit_message = format!("fix: {}", request.fix_description.trim());
        for (path, content) in &request.file_changes {
            let mut tail = vec!["contents"];
            tail.extend(path.split('/').filter(|s| !s.is_empty()));

            let existing = self
                .call(
                    self.http
                        .get(self.endpoint(&repo, &tail)?)
                        .query(&[("ref", branch.as_str())]),
                    true,
                )
                .await?;
            let mut body = json!({
                "message": commit_message,
                "content": BASE64.encode(content.as_bytes()),
                "branch": branch,
            });
            if let Some(sha) = existing.as_ref().and_then(|doc| doc.get("sha")) {
                body["sha"] = sha.clone();
            }
            self.call_required(self.http.put(self.endpoint(&repo, &tail)?).json(&body))
                .await?;
            tracing::debug!(path = %path, "Committed file change");
        }

        let pr = self
            .call_required(self.http.post(self.endpoint(&repo, &["pulls"])?).json(&json!({
                "title": format!("Fix: {}", request.fix_description.trim()),
                "head": branch,
                "base": base,
                "body": pr_body(request),
            })))
            .await?;
        let url = pr
            .get("html_url")
            .and_then(Value::as_str)
            .ok_or_else(|| FixError::Malformed("pull request has no html_url".to_string()))?
            .to_string();
        let number = pr
            .get("number")
            .and_then(Value::as_u64)
            .ok_or_else(|| FixError::Malformed("pull request has no number".to_string()))?;
        tracing::info!(url = %url, "Created fix pull request");

        Ok(FixOutcome::Submitted {
            url,
            number,
            branch,
        })
    }
}

#[async_trait]
impl FixSubmitter for GitHubFixSubmitter {
    async fn create_fix(&self, request: FixRequest) -> FixOutcome {
        match self.submit(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "Failed to create pull request");
                FixOutcome::rejected(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn submitter(token: Option<&str>) -> GitHubFixSubmitter {
        GitHubFixSubmitter::new(GitHubConfig {
            token: token.map(str::to_string),
            api_url: Url::parse("http://127.0.0.1:1").unwrap(),
        })
        .unwrap()
    }

    #[test]
    fn repo_urls_in_common_forms() {
        let expected = RepoRef {
            owner: "acme".into(),
            name: "shop".into(),
        };
        for raw in [
            "https://github.com/acme/shop",
            "https://github.com/acme/shop.git",
            "https://github.com/acme/shop/",
            "git@github.com:acme/shop.git",
            "acme/shop",
        ] {
            assert_eq!(RepoRef::parse(raw).unwrap(), expected, "{raw}");
        }
        assert!(RepoRef::parse("https://github.com/acme").is_err());
        assert!(RepoRef::parse("https://github.com/acme/shop/tree/main").is_err());
    }

    #[test]
    fn branch_names_are_timestamped() {
        assert_eq!(branch_name(1714557600000), "fix/k8s-issue-1714557600000");
    }

    #[test]
    fn pr_body_fills_defaults() {
        let mut files = BTreeMap::new();
        files.insert("deploy/web.yaml".to_string(), "kind: Deployment".to_string());
        files.insert("src/pool.rs".to_string(), "const SIZE: usize = 32;".to_string());
        let request = FixRequest {
            repo_url: "acme/shop".into(),
            file_changes: files,
            fix_description: "Raise connection pool size".into(),
            root_cause: Some("Pool exhaustion under canary load".into()),
            pod_name: Some("web-canary-1".into()),
            ..FixRequest::default()
        };

        let body = pr_body(&request);
        assert!(body.starts_with("## Root Cause Analysis\nPool exhaustion under canary load\n"));
        assert!(body.contains("Modified files: deploy/web.yaml, src/pool.rs"));
        assert!(body.contains("Raise connection pool size"));
        assert!(body.contains("Run existing test suite"));
        assert!(body.contains("- **Namespace**: `unknown`"));
        assert!(body.contains("- **Pod**: `web-canary-1`"));
    }

    #[test]
    fn endpoint_nests_under_repo() {
        let repo = RepoRef::parse("acme/shop").unwrap();
        let url = submitter(Some("t"))
            .endpoint(&repo, &["contents", "src", "main.rs"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:1/repos/acme/shop/contents/src/main.rs");
    }

    #[tokio::test]
    async fn missing_token_is_rejected_without_request() {
        let outcome = submitter(None)
            .create_fix(FixRequest {
                repo_url: "acme/shop".into(),
                ..FixRequest::default()
            })
            .await;
        assert_eq!(
            outcome,
            FixOutcome::rejected("GITHUB_TOKEN environment variable is required")
        );
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected_without_request() {
        let outcome = submitter(Some("t")).create_fix(FixRequest::default()).await;
        assert_eq!(
            outcome,
            FixOutcome::rejected("Missing required parameter: repoUrl")
        );
    }
}
