use std::sync::Arc;

use rollout_core::fix::{FixRequest, FixSubmitter};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::cluster::{ClusterInspector, EventsArgs, LogsArgs, PodArgs, ResourcesArgs};

pub const GET_POD_LOGS: &str = "get_pod_logs";
pub const GET_EVENTS: &str = "get_kubernetes_events";
pub const DEBUG_POD: &str = "debug_kubernetes_pod";
pub const INSPECT_RESOURCES: &str = "inspect_kubernetes_resources";
pub const GET_POD_METRICS: &str = "get_pod_metrics";
pub const CREATE_GITHUB_PR: &str = "create_github_pr";

fn error(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

fn function(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

fn pod_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "namespace": {"type": "string", "description": "Kubernetes namespace"},
            "podName": {"type": "string", "description": "Pod name"}
        },
        "required": ["namespace", "podName"]
    })
}

/// Tools the reasoning engine may call while analyzing a rollout.
///
/// Dispatch never fails: bad arguments, unknown tools and upstream errors all
/// come back as a JSON `error` field for the model to read.
#[derive(Clone, Default)]
pub struct Toolbox {
    cluster: Option<ClusterInspector>,
    fixes: Option<Arc<dyn FixSubmitter>>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(mut self, cluster: ClusterInspector) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Advertise `create_github_pr`. Callers pass a submitter only when it
    /// has credentials.
    pub fn with_fixes(mut self, fixes: Arc<dyn FixSubmitter>) -> Self {
        self.fixes = Some(fixes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cluster.is_none() && self.fixes.is_none()
    }

    /// Function definitions in chat-completions `tools` format.
    pub fn definitions(&self) -> Vec<Value> {
        let mut tools = Vec::new();
        if self.cluster.is_some() {
            tools.push(function(
                GET_POD_LOGS,
                "Get logs from a Kubernetes pod, with a summary of error patterns",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Kubernetes namespace"},
                        "podName": {"type": "string", "description": "Pod name"},
                        "containerName": {"type": "string", "description": "Container name; all containers when omitted"},
                        "previous": {"type": "boolean", "description": "Logs of the previous terminated instance"},
                        "tailLines": {"type": "integer", "description": "Number of lines from the end (default 100)"}
                    },
                    "required": ["namespace", "podName"]
                }),
            ));
            tools.push(function(
                GET_EVENTS,
                "Get Kubernetes events for a namespace or specific pod, newest first",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Kubernetes namespace"},
                        "podName": {"type": "string", "description": "Only events about this pod"},
                        "limit": {"type": "integer", "description": "Maximum number of events (default 50)"}
                    },
                    "required": ["namespace"]
                }),
            ));
            tools.push(function(
                DEBUG_POD,
                "Debug a Kubernetes pod to get detailed information about its status and conditions",
                pod_parameters(),
            ));
            tools.push(function(
                INSPECT_RESOURCES,
                "Inspect deployments, services and configmaps in a namespace",
                json!({
                    "type": "object",
                    "properties": {
                        "namespace": {"type": "string", "description": "Kubernetes namespace"},
                        "resourceType": {"type": "string", "enum": ["deployment", "service", "configmap"]},
                        "resourceName": {"type": "string", "description": "Only this resource"}
                    },
                    "required": ["namespace"]
                }),
            ));
            tools.push(function(
                GET_POD_METRICS,
                "Get resource usage, requests and limits for a Kubernetes pod",
                pod_parameters(),
            ));
        }
        if self.fixes.is_some() {
            tools.push(function(
                CREATE_GITHUB_PR,
                "Create a GitHub pull request with code fixes",
                json!({
                    "type": "object",
                    "properties": {
                        "repoUrl": {"type": "string", "description": "GitHub repository URL"},
                        "fileChanges": {
                            "type": "object",
                            "description": "Map of repository-relative file path to full new content",
                            "additionalProperties": {"type": "string"}
                        },
                        "fixDescription": {"type": "string"},
                        "rootCause": {"type": "string"},
                        "namespace": {"type": "string"},
                        "podName": {"type": "string"},
                        "testingRecommendations": {"type": "string"}
                    },
                    "required": ["repoUrl", "fileChanges", "fixDescription"]
                }),
            ));
        }
        tools
    }

    /// Run one tool call. `arguments` is the raw JSON string from the model.
    pub async fn dispatch(&self, name: &str, arguments: &str) -> Value {
        tracing::info!(tool = name, "Executing tool");
        let result = match name {
            GET_POD_LOGS | GET_EVENTS | DEBUG_POD | INSPECT_RESOURCES | GET_POD_METRICS => {
                match &self.cluster {
                    Some(cluster) => inspect(cluster, name, arguments).await,
                    None => error("Kubernetes API is not configured"),
                }
            }
            CREATE_GITHUB_PR => match &self.fixes {
                Some(fixes) => match parse_args::<FixRequest>(arguments) {
                    Ok(request) => fixes.create_fix(request).await.to_value(),
                    Err(err) => json!({ "success": false, "error": err.to_string() }),
                },
                None => json!({
                    "success": false,
                    "error": "GITHUB_TOKEN environment variable is required",
                }),
            },
            other => error(format!("Unknown tool: {other}")),
        };
        if let Some(message) = result.get("error") {
            tracing::warn!(tool = name, error = %message, "Tool returned an error");
        }
        result
    }
}

async fn inspect(cluster: &ClusterInspector, name: &str, arguments: &str) -> Value {
    let outcome = match name {
        GET_POD_LOGS => match parse_args::<LogsArgs>(arguments) {
            Ok(args) => cluster.pod_logs(&args).await,
            Err(err) => return error(err),
        },
        GET_EVENTS => match parse_args::<EventsArgs>(arguments) {
            Ok(args) => cluster.events(&args).await,
            Err(err) => return error(err),
        },
        DEBUG_POD => match parse_args::<PodArgs>(arguments) {
            Ok(args) => cluster.debug_pod(&args).await,
            Err(err) => return error(err),
        },
        INSPECT_RESOURCES => match parse_args::<ResourcesArgs>(arguments) {
            Ok(args) => cluster.inspect_resources(&args).await,
            Err(err) => return error(err),
        },
        GET_POD_METRICS => match parse_args::<PodArgs>(arguments) {
            Ok(args) => cluster.pod_metrics(&args).await,
            Err(err) => return error(err),
        },
        other => return error(format!("Unknown tool: {other}")),
    };
    outcome.unwrap_or_else(error)
}

/// Empty argument strings count as `{}`.
fn parse_args<T: DeserializeOwned>(arguments: &str) -> Result<T, String> {
    let raw = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(raw).map_err(|e| format!("Invalid tool arguments: {e}"))
}
