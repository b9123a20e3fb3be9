pub mod cluster;
pub mod config;
pub mod github;
pub mod openai;
pub mod tools;

use std::sync::Arc;

pub use cluster::{ClusterInspector, InspectionError};
pub use config::{ClusterConfig, ConfigError, EngineConfig, GitHubConfig};
pub use github::{FixError, GitHubFixSubmitter};
pub use openai::ChatCompletionsEngine;
pub use tools::Toolbox;

use rollout_core::engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Inspection(#[from] InspectionError),
    #[error(transparent)]
    Fix(#[from] FixError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Toolbox from the environment: cluster tools when an API server is
/// reachable by configuration, the fix tool when a GitHub token is set.
pub fn toolbox_from_env() -> Result<Toolbox, SetupError> {
    let mut toolbox = Toolbox::new();

    match ClusterConfig::from_env() {
        Ok(cluster) => {
            tracing::info!(api = %cluster.api_url, "Kubernetes inspection tools enabled");
            toolbox = toolbox.with_cluster(ClusterInspector::new(&cluster)?);
        }
        Err(ConfigError::NoClusterEndpoint) => {
            tracing::warn!("No Kubernetes API endpoint configured; inspection tools disabled");
        }
        Err(err) => return Err(err.into()),
    }

    let github = GitHubConfig::from_env()?;
    if github.enabled() {
        tracing::info!("GitHub fix tool enabled");
        toolbox = toolbox.with_fixes(Arc::new(GitHubFixSubmitter::new(github)?));
    } else {
        tracing::warn!("GITHUB_TOKEN environment variable not set; fix tool disabled");
    }

    Ok(toolbox)
}

/// Chat-completions engine wired from the environment.
pub fn engine_from_env() -> Result<ChatCompletionsEngine, SetupError> {
    let config = EngineConfig::from_env()?;
    tracing::info!(
        api = %config.api_url,
        model = %config.model,
        memory_window = config.memory_window,
        memory_sessions = config.memory_sessions,
        max_tool_rounds = config.max_tool_rounds,
        "Reasoning engine configured"
    );
    if config.api_key.is_none() {
        tracing::warn!("ROLLOUT_LLM_API_KEY not set");
    }
    Ok(ChatCompletionsEngine::new(config, toolbox_from_env()?)?)
}
