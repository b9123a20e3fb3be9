use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MEMORY_WINDOW: usize = 20;
pub const DEFAULT_MEMORY_SESSIONS: usize = 1000;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {value}")]
    InvalidUrl { var: &'static str, value: String },
    #[error("{var} has an invalid value: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("no Kubernetes API endpoint: set KUBE_API_URL or run in-cluster")]
    NoClusterEndpoint,
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_url(var: &'static str, raw: Option<String>, default: &str) -> Result<Url, ConfigError> {
    let value = non_empty(raw).unwrap_or_else(|| default.to_string());
    Url::parse(&value).map_err(|_| ConfigError::InvalidUrl { var, value })
}

fn parse_bounded<T>(var: &'static str, raw: Option<String>, min: T, max: T, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Copy,
{
    match non_empty(raw) {
        None => Ok(default),
        Some(value) => match value.parse::<T>() {
            Ok(parsed) if parsed >= min && parsed <= max => Ok(parsed),
            _ => Err(ConfigError::InvalidValue { var, value }),
        },
    }
}

/// Settings for the chat-completions reasoning engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_url: Url,
    /// Absent key is not a startup error; every call then fails as not configured.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
    /// Non-system messages kept per session key.
    pub memory_window: usize,
    /// Session keys remembered before the least recently used is dropped.
    pub memory_sessions: usize,
    pub max_tool_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_LLM_API_URL).expect("valid default LLM API URL"),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: None,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            memory_window: DEFAULT_MEMORY_WINDOW,
            memory_sessions: DEFAULT_MEMORY_SESSIONS,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let temperature = non_empty(lookup("ROLLOUT_LLM_TEMPERATURE"))
            .map(|value| parse_bounded("ROLLOUT_LLM_TEMPERATURE", Some(value), 0.0_f32, 2.0, 0.0))
            .transpose()?;

        Ok(Self {
            api_url: parse_url(
                "ROLLOUT_LLM_API_URL",
                lookup("ROLLOUT_LLM_API_URL"),
                DEFAULT_LLM_API_URL,
            )?,
            api_key: non_empty(lookup("ROLLOUT_LLM_API_KEY")),
            model: non_empty(lookup("ROLLOUT_LLM_MODEL"))
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            temperature,
            timeout: Duration::from_secs(parse_bounded(
                "ROLLOUT_LLM_TIMEOUT_SECS",
                lookup("ROLLOUT_LLM_TIMEOUT_SECS"),
                1,
                3600,
                DEFAULT_LLM_TIMEOUT_SECS,
            )?),
            memory_window: parse_bounded(
                "ROLLOUT_MEMORY_WINDOW",
                lookup("ROLLOUT_MEMORY_WINDOW"),
                1,
                1000,
                DEFAULT_MEMORY_WINDOW,
            )?,
            memory_sessions: parse_bounded(
                "ROLLOUT_MEMORY_SESSIONS",
                lookup("ROLLOUT_MEMORY_SESSIONS"),
                1,
                1_000_000,
                DEFAULT_MEMORY_SESSIONS,
            )?,
            max_tool_rounds: parse_bounded(
                "ROLLOUT_MAX_TOOL_ROUNDS",
                lookup("ROLLOUT_MAX_TOOL_ROUNDS"),
                0,
                64,
                DEFAULT_MAX_TOOL_ROUNDS,
            )?,
        })
    }
}

/// Where and how to reach the Kubernetes API server.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub api_url: Url,
    pub token: Option<String>,
    /// PEM bundle trusted in addition to the system roots.
    pub ca_cert: Option<PathBuf>,
}

impl ClusterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let sa_dir = Path::new(SERVICE_ACCOUNT_DIR);
        let token_file = std::fs::read_to_string(sa_dir.join("token")).ok();
        let ca_path = sa_dir.join("ca.crt");
        let ca_cert = ca_path.exists().then_some(ca_path);
        Self::from_lookup(|var| std::env::var(var).ok(), token_file, ca_cert)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        service_account_token: Option<String>,
        service_account_ca: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let api_url = match non_empty(lookup("KUBE_API_URL")) {
            Some(value) => {
                Url::parse(&value).map_err(|_| ConfigError::InvalidUrl {
                    var: "KUBE_API_URL",
                    value,
                })?
            }
            None => {
                let host = non_empty(lookup("KUBERNETES_SERVICE_HOST"))
                    .ok_or(ConfigError::NoClusterEndpoint)?;
                let port = non_empty(lookup("KUBERNETES_SERVICE_PORT"))
                    .unwrap_or_else(|| "443".to_string());
                // IPv6 service hosts need brackets.
                let host = if host.contains(':') && !host.starts_with('[') {
                    format!("[{host}]")
                } else {
                    host
                };
                let value = format!("https://{host}:{port}");
                Url::parse(&value).map_err(|_| ConfigError::InvalidUrl {
                    var: "KUBERNETES_SERVICE_HOST",
                    value,
                })?
            }
        };

        Ok(Self {
            api_url,
            token: non_empty(lookup("KUBE_TOKEN")).or_else(|| non_empty(service_account_token)),
            ca_cert: non_empty(lookup("KUBE_CA_CERT"))
                .map(PathBuf::from)
                .or(service_account_ca),
        })
    }
}

/// Credentials for opening fix pull requests.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_url: Url,
}

impl GitHubConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            token: non_empty(lookup("GITHUB_TOKEN")),
            api_url: parse_url(
                "GITHUB_API_URL",
                lookup("GITHUB_API_URL"),
                DEFAULT_GITHUB_API_URL,
            )?,
        })
    }

    pub fn enabled(&self) -> bool {
        self.token.is_some()
    }
}
