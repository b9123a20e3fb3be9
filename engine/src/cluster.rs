//! Read-only Kubernetes inspection over the REST API.
//!
//! Every operation returns a JSON document shaped for the reasoning engine.
//! Failures surface as [`InspectionError`]; the toolbox renders them as
//! `{"error": message}` so nothing escapes a tool call.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

use crate::config::ClusterConfig;

pub const DEFAULT_TAIL_LINES: u32 = 100;
pub const DEFAULT_EVENT_LIMIT: usize = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const METRICS_SERVER_NOTE: &str = "Install metrics-server for real-time CPU/Memory usage";

#[derive(Debug, thiserror::Error)]
pub enum InspectionError {
    #[error("{0}")]
    MissingArgument(&'static str),
    #[error("Unsupported resourceType: {0} (expected deployment, service or configmap)")]
    UnsupportedResource(String),
    #[error("Pod not found: {namespace}/{pod}")]
    PodNotFound { namespace: String, pod: String },
    #[error("Kubernetes API request failed: {0}")]
    Transport(String),
    #[error("Kubernetes API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Cannot read CA certificate: {0}")]
    Certificate(String),
}

impl From<reqwest::Error> for InspectionError {
    fn from(err: reqwest::Error) -> Self {
        InspectionError::Transport(err.to_string())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsArgs {
    pub namespace: Option<String>,
    pub pod_name: Option<String>,
    pub container_name: Option<String>,
    pub previous: Option<bool>,
    pub tail_lines: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsArgs {
    pub namespace: Option<String>,
    pub pod_name: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodArgs {
    pub namespace: Option<String>,
    pub pod_name: Option<String>,
}

impl PodArgs {
    fn require(&self) -> Result<(&str, &str), InspectionError> {
        match (present(&self.namespace), present(&self.pod_name)) {
            (Some(namespace), Some(pod)) => Ok((namespace, pod)),
            _ => Err(InspectionError::MissingArgument(
                "namespace and podName are required",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesArgs {
    pub namespace: Option<String>,
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceKind {
    Deployment,
    Service,
    ConfigMap,
}

impl ResourceKind {
    const ALL: [ResourceKind; 3] = [
        ResourceKind::Deployment,
        ResourceKind::Service,
        ResourceKind::ConfigMap,
    ];

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "deployment" | "deployments" => Some(ResourceKind::Deployment),
            "service" | "services" => Some(ResourceKind::Service),
            "configmap" | "configmaps" => Some(ResourceKind::ConfigMap),
            _ => None,
        }
    }

    fn segments(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Deployment => &["apis", "apps", "v1"],
            ResourceKind::Service | ResourceKind::ConfigMap => &["api", "v1"],
        }
    }

    fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployments",
            ResourceKind::Service => "services",
            ResourceKind::ConfigMap => "configmaps",
        }
    }

    fn result_key(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployments",
            ResourceKind::Service => "services",
            ResourceKind::ConfigMap => "configMaps",
        }
    }

    fn summarize(&self, item: &Value) -> Value {
        match self {
            ResourceKind::Deployment => summarize_deployment(item),
            ResourceKind::Service => summarize_service(item),
            ResourceKind::ConfigMap => summarize_config_map(item),
        }
    }
}

/// Thin client for the handful of read-only endpoints the tools need.
#[derive(Debug, Clone)]
pub struct ClusterInspector {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl ClusterInspector {
    pub fn new(config: &ClusterConfig) -> Result<Self, InspectionError> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path)
                .map_err(|e| InspectionError::Certificate(format!("{}: {e}", path.display())))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| InspectionError::Certificate(format!("{}: {e}", path.display())))?;
            builder = builder.add_root_certificate(cert);
        }
        Ok(Self {
            http: builder.build()?,
            base: config.api_url.clone(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InspectionError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| InspectionError::Transport(format!("unusable API base URL {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET a JSON document; `Ok(None)` when the object does not exist.
    async fn get_json(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Option<Value>, InspectionError> {
        let response = self
            .request(self.endpoint(segments)?)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error(status, response.text().await.unwrap_or_default()));
        }
        Ok(Some(response.json::<Value>().await?))
    }

    async fn get_text(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<String, InspectionError> {
        let response = self
            .request(self.endpoint(segments)?)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response.text().await.unwrap_or_default()));
        }
        Ok(response.text().await?)
    }

    async fn fetch_pod(&self, namespace: &str, pod: &str) -> Result<Value, InspectionError> {
        self.get_json(&["api", "v1", "namespaces", namespace, "pods", pod], &[])
            .await?
            .ok_or_else(|| InspectionError::PodNotFound {
                namespace: namespace.to_string(),
                pod: pod.to_string(),
            })
    }

    async fn container_log(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        previous: bool,
        lines: u32,
    ) -> Result<String, InspectionError> {
        self.get_text(
            &["api", "v1", "namespaces", namespace, "pods", pod, "log"],
            &[
                ("container", container.to_string()),
                ("tailLines", lines.to_string()),
                ("previous", previous.to_string()),
            ],
        )
        .await
    }

    pub async fn pod_logs(&self, args: &LogsArgs) -> Result<Value, InspectionError> {
        let (namespace, pod) = PodArgs {
            namespace: args.namespace.clone(),
            pod_name: args.pod_name.clone(),
        }
        .require()
        .map(|(n, p)| (n.to_string(), p.to_string()))?;
        let previous = args.previous.unwrap_or(false);
        let lines = args
            .tail_lines
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_TAIL_LINES);
        tracing::info!(namespace = %namespace, pod = %pod, previous, lines, "Getting pod logs");

        let pod_doc = self.fetch_pod(&namespace, &pod).await?;

        if let Some(container) = present(&args.container_name) {
            let logs = self
                .container_log(&namespace, &pod, container, previous, lines)
                .await?;
            let logs = if logs.is_empty() {
                "(no logs available)".to_string()
            } else {
                logs
            };
            tracing::info!(chars = logs.len(), "Retrieved container logs");
            return Ok(json!({
                "namespace": namespace,
                "podName": pod,
                "container": container,
                "previous": previous,
                "analysis": analyze_logs(&logs),
                "logs": logs,
            }));
        }

        let statuses = pod_doc
            .pointer("/status/containerStatuses")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut containers = Vec::with_capacity(statuses.len());
        for status in &statuses {
            let name = status.get("name").and_then(Value::as_str).unwrap_or_default();
            let restarts = status.get("restartCount").and_then(Value::as_i64).unwrap_or(0);
            match self
                .container_log(&namespace, &pod, name, previous, lines)
                .await
            {
                Ok(logs) => {
                    let mut entry = json!({
                        "containerName": name,
                        "restartCount": restarts,
                        "analysis": analyze_logs(&logs),
                        "logs": if logs.is_empty() { "No logs available".to_string() } else { logs },
                    });
                    if previous && restarts > 0 {
                        entry["note"] = json!(format!(
                            "Container has restarted {restarts} times; logs are from the previous instance."
                        ));
                    }
                    containers.push(entry);
                }
                Err(err) => {
                    tracing::warn!(container = name, error = %err, "Error getting container logs");
                    containers.push(json!({
                        "containerName": name,
                        "error": err.to_string(),
                    }));
                }
            }
        }
        tracing::info!(containers = containers.len(), "Retrieved logs");

        Ok(json!({
            "namespace": namespace,
            "podName": pod,
            "containers": containers,
        }))
    }

    pub async fn events(&self, args: &EventsArgs) -> Result<Value, InspectionError> {
        let namespace = present(&args.namespace)
            .ok_or(InspectionError::MissingArgument("namespace is required"))?;
        let limit = args
            .limit
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_EVENT_LIMIT);
        let pod = present(&args.pod_name);
        tracing::info!(namespace, pod = pod.unwrap_or("<all>"), "Getting events");

        let list = self
            .get_json(&["api", "v1", "namespaces", namespace, "events"], &[])
            .await?
            .unwrap_or_else(|| json!({"items": []}));
        let items = list
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let events = recent_events(items, pod, limit);
        tracing::info!(count = events.len(), "Retrieved events");

        Ok(json!({
            "namespace": namespace,
            "eventCount": events.len(),
            "events": events,
        }))
    }

    pub async fn debug_pod(&self, args: &PodArgs) -> Result<Value, InspectionError> {
        let (namespace, pod) = args.require()?;
        tracing::info!(namespace, pod, "Debugging pod");
        let doc = self.fetch_pod(namespace, pod).await?;
        Ok(summarize_pod(namespace, pod, &doc))
    }

    pub async fn inspect_resources(&self, args: &ResourcesArgs) -> Result<Value, InspectionError> {
        let namespace = present(&args.namespace)
            .ok_or(InspectionError::MissingArgument("namespace is required"))?;
        let kinds: Vec<ResourceKind> = match present(&args.resource_type) {
            None => ResourceKind::ALL.to_vec(),
            Some(raw) => vec![
                ResourceKind::parse(raw)
                    .ok_or_else(|| InspectionError::UnsupportedResource(raw.to_string()))?,
            ],
        };
        let name = present(&args.resource_name);
        tracing::info!(namespace, ?kinds, name = name.unwrap_or("<all>"), "Inspecting resources");

        let mut result = Map::new();
        result.insert("namespace".to_string(), json!(namespace));
        for kind in kinds {
            let mut segments: Vec<&str> = kind.segments().to_vec();
            segments.extend(["namespaces", namespace, kind.plural()]);
            if let Some(name) = name {
                segments.push(name);
            }
            let items = match self.get_json(&segments, &[]).await? {
                None => Vec::new(),
                Some(doc) if name.is_some() => vec![doc],
                Some(doc) => doc
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            };
            let summaries: Vec<Value> = items.iter().map(|item| kind.summarize(item)).collect();
            result.insert(kind.result_key().to_string(), Value::Array(summaries));
        }
        Ok(Value::Object(result))
    }

    pub async fn pod_metrics(&self, args: &PodArgs) -> Result<Value, InspectionError> {
        let (namespace, pod) = args.require()?;
        tracing::info!(namespace, pod, "Getting pod metrics");
        let doc = self.fetch_pod(namespace, pod).await?;

        let mut result = json!({
            "podName": pod,
            "namespace": namespace,
            "containers": container_resources(&doc),
        });

        let usage = self
            .get_json(
                &["apis", "metrics.k8s.io", "v1beta1", "namespaces", namespace, "pods", pod],
                &[],
            )
            .await;
        match usage {
            Ok(Some(metrics)) => {
                result["usage"] = metrics
                    .get("containers")
                    .cloned()
                    .unwrap_or_else(|| json!([]));
                if let Some(window) = metrics.get("window") {
                    result["window"] = window.clone();
                }
            }
            Ok(None) => result["note"] = json!(METRICS_SERVER_NOTE),
            Err(err) => {
                tracing::debug!(error = %err, "Metrics server not available");
                result["note"] = json!(METRICS_SERVER_NOTE);
            }
        }
        Ok(result)
    }
}

fn api_error(status: StatusCode, body: String) -> InspectionError {
    // Kubernetes wraps failures in a Status object with a readable message.
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    InspectionError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Flags common failure patterns in a log excerpt.
pub fn analyze_logs(logs: &str) -> Value {
    if logs.is_empty() {
        return json!({ "hasErrors": false });
    }
    let lower = logs.to_lowercase();
    let has_errors = ["error", "exception", "fatal", "panic"]
        .iter()
        .any(|needle| lower.contains(needle));
    let error_count = lower
        .lines()
        .filter(|line| line.contains("error") || line.contains("exception"))
        .count();
    let oom_detected = lower.contains("out of memory") || lower.contains("oomkilled");
    let connection_issues = ["connection refused", "connection timeout", "unable to connect"]
        .iter()
        .any(|needle| lower.contains(needle));

    json!({
        "hasErrors": has_errors,
        "hasWarnings": lower.contains("warn"),
        "errorCount": error_count,
        "oomDetected": oom_detected,
        "connectionIssues": connection_issues,
    })
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

fn event_timestamp(event: &Value) -> &str {
    let last = str_at(event, "/lastTimestamp");
    if last.is_empty() {
        str_at(event, "/metadata/creationTimestamp")
    } else {
        last
    }
}

/// Newest first, optionally narrowed to one pod, at most `limit` entries.
pub fn recent_events(items: &[Value], pod: Option<&str>, limit: usize) -> Vec<Value> {
    let mut events: Vec<&Value> = items
        .iter()
        .filter(|event| pod.is_none_or(|pod| str_at(event, "/involvedObject/name") == pod))
        .collect();
    // RFC 3339 timestamps order lexicographically.
    events.sort_by(|a, b| event_timestamp(b).cmp(event_timestamp(a)));
    events
        .into_iter()
        .take(limit)
        .map(|event| {
            let kind = event.pointer("/involvedObject/kind");
            let name = event.pointer("/involvedObject/name");
            let involved = match (kind, name) {
                (Some(kind), Some(name)) => json!({ "kind": kind, "name": name }),
                _ => json!({}),
            };
            let event_type = str_at(event, "/type");
            json!({
                "type": if event_type.is_empty() { "Normal" } else { event_type },
                "reason": str_at(event, "/reason"),
                "message": str_at(event, "/message"),
                "count": event.get("count").and_then(Value::as_i64).unwrap_or(1),
                "firstTimestamp": str_at(event, "/firstTimestamp"),
                "lastTimestamp": str_at(event, "/lastTimestamp"),
                "involvedObject": involved,
            })
        })
        .collect()
}

fn container_state(status: &Value) -> Map<String, Value> {
    let mut info = Map::new();
    let state = status.get("state").cloned().unwrap_or(Value::Null);
    if let Some(running) = state.get("running") {
        info.insert("state".into(), json!("Running"));
        info.insert("startedAt".into(), running.get("startedAt").cloned().unwrap_or(Value::Null));
    } else if let Some(waiting) = state.get("waiting") {
        info.insert("state".into(), json!("Waiting"));
        info.insert("reason".into(), waiting.get("reason").cloned().unwrap_or(Value::Null));
        info.insert("message".into(), waiting.get("message").cloned().unwrap_or(Value::Null));
    } else if let Some(terminated) = state.get("terminated") {
        info.insert("state".into(), json!("Terminated"));
        info.insert("reason".into(), terminated.get("reason").cloned().unwrap_or(Value::Null));
        info.insert("message".into(), terminated.get("message").cloned().unwrap_or(Value::Null));
        info.insert("exitCode".into(), terminated.get("exitCode").cloned().unwrap_or(Value::Null));
    }
    if let Some(last) = status.pointer("/lastState/terminated") {
        info.insert(
            "lastTerminated".into(),
            json!({
                "reason": str_at(last, "/reason"),
                "exitCode": last.get("exitCode").cloned().unwrap_or(Value::Null),
                "message": str_at(last, "/message"),
            }),
        );
    }
    info
}

/// Status, conditions and per-container state of a pod document.
pub fn summarize_pod(namespace: &str, pod: &str, doc: &Value) -> Value {
    let status = doc.get("status").cloned().unwrap_or(Value::Null);
    let conditions: Vec<Value> = status
        .get("conditions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|c| {
                    json!({
                        "type": str_at(c, "/type"),
                        "status": str_at(c, "/status"),
                        "reason": str_at(c, "/reason"),
                        "message": str_at(c, "/message"),
                        "lastTransitionTime": str_at(c, "/lastTransitionTime"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let containers: Vec<Value> = status
        .get("containerStatuses")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|cs| {
                    let mut info = Map::new();
                    info.insert("name".into(), json!(str_at(cs, "/name")));
                    info.insert("ready".into(), cs.get("ready").cloned().unwrap_or(json!(false)));
                    info.insert(
                        "restartCount".into(),
                        cs.get("restartCount").cloned().unwrap_or(json!(0)),
                    );
                    info.insert("image".into(), json!(str_at(cs, "/image")));
                    info.extend(container_state(cs));
                    Value::Object(info)
                })
                .collect()
        })
        .unwrap_or_default();

    let mut summary = json!({
        "podName": pod,
        "namespace": namespace,
        "phase": status.get("phase").cloned().unwrap_or(Value::Null),
        "reason": status.get("reason").cloned().unwrap_or(Value::Null),
        "message": status.get("message").cloned().unwrap_or(Value::Null),
        "hostIP": status.get("hostIP").cloned().unwrap_or(Value::Null),
        "podIP": status.get("podIP").cloned().unwrap_or(Value::Null),
        "startTime": status.get("startTime").cloned().unwrap_or(Value::Null),
        "conditions": conditions,
        "containerStatuses": containers,
        "labels": doc.pointer("/metadata/labels").cloned().unwrap_or_else(|| json!({})),
    });
    if let Some(owners) = doc
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .filter(|owners| !owners.is_empty())
    {
        summary["owners"] = owners
            .iter()
            .map(|o| json!({ "kind": str_at(o, "/kind"), "name": str_at(o, "/name") }))
            .collect();
    }
    summary
}

/// Declared requests and limits per container.
pub fn container_resources(doc: &Value) -> Vec<Value> {
    doc.pointer("/spec/containers")
        .and_then(Value::as_array)
        .map(|containers| {
            containers
                .iter()
                .map(|c| {
                    let mut entry = json!({ "containerName": str_at(c, "/name") });
                    if let Some(requests) = c.pointer("/resources/requests") {
                        entry["requests"] = requests.clone();
                    }
                    if let Some(limits) = c.pointer("/resources/limits") {
                        entry["limits"] = limits.clone();
                    }
                    entry
                })
                .collect()
        })
        .unwrap_or_default()
}

fn summarize_deployment(item: &Value) -> Value {
    json!({
        "name": str_at(item, "/metadata/name"),
        "replicas": item.pointer("/spec/replicas").and_then(Value::as_i64).unwrap_or(0),
        "availableReplicas": item.pointer("/status/availableReplicas").and_then(Value::as_i64).unwrap_or(0),
        "readyReplicas": item.pointer("/status/readyReplicas").and_then(Value::as_i64).unwrap_or(0),
        "labels": item.pointer("/metadata/labels").cloned().unwrap_or_else(|| json!({})),
    })
}

fn summarize_service(item: &Value) -> Value {
    let ports: Vec<Value> = item
        .pointer("/spec/ports")
        .and_then(Value::as_array)
        .map(|ports| {
            ports
                .iter()
                .map(|p| {
                    let target = match p.get("targetPort") {
                        Some(Value::String(s)) => s.clone(),
                        Some(Value::Number(n)) => n.to_string(),
                        _ => String::new(),
                    };
                    let protocol = str_at(p, "/protocol");
                    json!({
                        "name": str_at(p, "/name"),
                        "port": p.get("port").cloned().unwrap_or(Value::Null),
                        "targetPort": target,
                        "protocol": if protocol.is_empty() { "TCP" } else { protocol },
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    json!({
        "name": str_at(item, "/metadata/name"),
        "type": str_at(item, "/spec/type"),
        "clusterIP": str_at(item, "/spec/clusterIP"),
        "ports": ports,
        "selector": item.pointer("/spec/selector").cloned().unwrap_or_else(|| json!({})),
    })
}

/// Only key names: config values may hold secrets.
fn summarize_config_map(item: &Value) -> Value {
    let keys: Vec<&str> = item
        .get("data")
        .and_then(Value::as_object)
        .map(|data| data.keys().map(String::as_str).collect())
        .unwrap_or_default();
    json!({
        "name": str_at(item, "/metadata/name"),
        "dataKeys": keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_logs_flags_patterns() {
        let logs = "INFO start\nERROR db connection refused\nWARN slow\njava.lang.Exception: boom\nOOMKilled";
        let analysis = analyze_logs(logs);
        assert_eq!(analysis["hasErrors"], true);
        assert_eq!(analysis["hasWarnings"], true);
        assert_eq!(analysis["errorCount"], 2);
        assert_eq!(analysis["oomDetected"], true);
        assert_eq!(analysis["connectionIssues"], true);
    }

    #[test]
    fn analyze_logs_clean_and_empty() {
        assert_eq!(analyze_logs(""), json!({"hasErrors": false}));
        let analysis = analyze_logs("listening on :8080\nready");
        assert_eq!(analysis["hasErrors"], false);
        assert_eq!(analysis["errorCount"], 0);
        assert_eq!(analysis["oomDetected"], false);
    }

    #[test]
    fn events_are_filtered_sorted_and_limited() {
        let items = vec![
            json!({"type": "Warning", "reason": "BackOff", "lastTimestamp": "2024-05-01T10:00:00Z",
                   "involvedObject": {"kind": "Pod", "name": "web-canary"}, "count": 4}),
            json!({"reason": "Pulled", "metadata": {"creationTimestamp": "2024-05-01T11:00:00Z"},
                   "involvedObject": {"kind": "Pod", "name": "web-canary"}}),
            json!({"reason": "Scheduled", "lastTimestamp": "2024-05-01T12:00:00Z",
                   "involvedObject": {"kind": "Pod", "name": "web-stable"}}),
        ];

        let events = recent_events(&items, Some("web-canary"), 10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["reason"], "Pulled");
        assert_eq!(events[0]["type"], "Normal");
        assert_eq!(events[0]["count"], 1);
        assert_eq!(events[1]["count"], 4);

        let newest = recent_events(&items, None, 1);
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0]["reason"], "Scheduled");
    }

    #[test]
    fn pod_summary_reports_crash_loop_details() {
        let doc = json!({
            "metadata": {
                "labels": {"app": "web", "track": "canary"},
                "ownerReferences": [{"kind": "ReplicaSet", "name": "web-abc"}]
            },
            "status": {
                "phase": "Running",
                "conditions": [{"type": "Ready", "status": "False", "reason": "ContainersNotReady"}],
                "containerStatuses": [{
                    "name": "app", "ready": false, "restartCount": 5, "image": "web:2",
                    "state": {"waiting": {"reason": "CrashLoopBackOff", "message": "back-off"}},
                    "lastState": {"terminated": {"reason": "OOMKilled", "exitCode": 137}}
                }]
            }
        });

        let summary = summarize_pod("shop", "web-canary", &doc);
        assert_eq!(summary["phase"], "Running");
        assert_eq!(summary["conditions"][0]["reason"], "ContainersNotReady");
        let container = &summary["containerStatuses"][0];
        assert_eq!(container["state"], "Waiting");
        assert_eq!(container["reason"], "CrashLoopBackOff");
        assert_eq!(container["lastTerminated"]["reason"], "OOMKilled");
        assert_eq!(container["lastTerminated"]["exitCode"], 137);
        assert_eq!(summary["owners"][0]["kind"], "ReplicaSet");
        assert_eq!(summary["labels"]["track"], "canary");
    }

    #[test]
    fn container_resources_lists_requests_and_limits() {
        let doc = json!({"spec": {"containers": [
            {"name": "app", "resources": {"requests": {"cpu": "100m"}, "limits": {"memory": "256Mi"}}},
            {"name": "sidecar"}
        ]}});
        let resources = container_resources(&doc);
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["requests"]["cpu"], "100m");
        assert_eq!(resources[0]["limits"]["memory"], "256Mi");
        assert!(resources[1].get("requests").is_none());
    }

    #[test]
    fn config_maps_expose_keys_only() {
        let summary = summarize_config_map(&json!({
            "metadata": {"name": "web-config"},
            "data": {"DB_PASSWORD": "hunter2", "LOG_LEVEL": "info"}
        }));
        assert_eq!(summary["dataKeys"], json!(["DB_PASSWORD", "LOG_LEVEL"]));
        assert!(!summary.to_string().contains("hunter2"));
    }

    #[test]
    fn services_render_ports() {
        let summary = summarize_service(&json!({
            "metadata": {"name": "web"},
            "spec": {"type": "ClusterIP", "clusterIP": "10.0.0.5",
                     "ports": [{"port": 80, "targetPort": 8080}], "selector": {"app": "web"}}
        }));
        assert_eq!(summary["ports"][0]["targetPort"], "8080");
        assert_eq!(summary["ports"][0]["protocol"], "TCP");
    }

    #[test]
    fn resource_kinds_parse_case_insensitively() {
        assert_eq!(ResourceKind::parse("Deployment"), Some(ResourceKind::Deployment));
        assert_eq!(ResourceKind::parse("configmaps"), Some(ResourceKind::ConfigMap));
        assert_eq!(ResourceKind::parse("secret"), None);
    }

    fn inspector() -> ClusterInspector {
        let config = ClusterConfig {
            api_url: Url::parse("http://127.0.0.1:1").unwrap(),
            token: None,
            ca_cert: None,
        };
        ClusterInspector::new(&config).unwrap()
    }

    #[test]
    fn endpoint_escapes_segments() {
        let url = inspector()
            .endpoint(&["api", "v1", "namespaces", "a b", "pods"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:1/api/v1/namespaces/a%20b/pods");
    }

    #[tokio::test]
    async fn missing_arguments_fail_before_any_request() {
        let inspector = inspector();
        let err = inspector.debug_pod(&PodArgs::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "namespace and podName are required");

        let err = inspector.events(&EventsArgs::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "namespace is required");

        let err = inspector
            .inspect_resources(&ResourcesArgs {
                namespace: Some("shop".into()),
                resource_type: Some("secret".into()),
                resource_name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, InspectionError::UnsupportedResource(_)));
    }
}
