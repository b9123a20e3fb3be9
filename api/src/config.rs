use rollout_core::policy::FailurePolicy;
use rollout_core::task::DEFAULT_TASK_CAPACITY;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";

/// Process-level settings for the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    /// Externally reachable base URL, advertised in the agent card.
    pub public_url: Option<String>,
    pub failure_policy: FailurePolicy,
    pub explicit_confidence: bool,
    pub cors_origins: Vec<String>,
    /// Finished tasks kept for `tasks/get` before the oldest are evicted.
    pub task_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            public_url: None,
            failure_policy: FailurePolicy::default(),
            explicit_confidence: false,
            cors_origins: vec![DEFAULT_CORS_ORIGINS.to_string()],
            task_capacity: DEFAULT_TASK_CAPACITY,
        }
    }
}

fn parse_env_bool_flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let failure_policy = match lookup("ROLLOUT_FAILURE_POLICY") {
            None => FailurePolicy::default(),
            Some(raw) => FailurePolicy::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Unknown ROLLOUT_FAILURE_POLICY, using fail_open");
                FailurePolicy::default()
            }),
        };

        let origins = lookup("ROLLOUT_CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string());
        let cors_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            port,
            public_url: lookup("ROLLOUT_PUBLIC_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            failure_policy,
            explicit_confidence: parse_env_bool_flag(lookup("ROLLOUT_EXPLICIT_CONFIDENCE"), false),
            cors_origins,
            task_capacity: lookup("ROLLOUT_TASK_CAPACITY")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_TASK_CAPACITY),
        }
    }

    /// URL advertised to A2A clients.
    pub fn agent_url(&self) -> String {
        match &self.public_url {
            Some(url) => format!("{url}/"),
            None => format!("http://localhost:{}/", self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> ServiceConfig {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        ServiceConfig::from_lookup(|key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults() {
        assert_eq!(config(&[]), ServiceConfig::default());
        assert_eq!(config(&[]).agent_url(), "http://localhost:8080/");
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("PORT", "9000"),
            ("ROLLOUT_PUBLIC_URL", "https://rollout.example.com/"),
            ("ROLLOUT_FAILURE_POLICY", "fail_closed"),
            ("ROLLOUT_EXPLICIT_CONFIDENCE", "true"),
            ("ROLLOUT_CORS_ORIGINS", "https://a.example, ,https://b.example"),
            ("ROLLOUT_TASK_CAPACITY", "500"),
        ]);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.agent_url(), "https://rollout.example.com/");
        assert_eq!(cfg.failure_policy, FailurePolicy::FailClosed);
        assert!(cfg.explicit_confidence);
        assert_eq!(cfg.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(cfg.task_capacity, 500);
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = config(&[
            ("PORT", "http"),
            ("ROLLOUT_FAILURE_POLICY", "maybe"),
            ("ROLLOUT_TASK_CAPACITY", "0"),
        ]);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.task_capacity, DEFAULT_TASK_CAPACITY);
        assert_eq!(cfg.failure_policy, FailurePolicy::FailOpen);
    }
}
