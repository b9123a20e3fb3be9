use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub const PROTOCOL_VERSION: &str = "0.3.0";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/.well-known/agent.json", get(agent_card))
        .route("/.well-known/agent-card.json", get(agent_card))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: &'static str,
    pub description: &'static str,
    pub url: String,
    pub version: &'static str,
    pub protocol_version: &'static str,
    pub preferred_transport: &'static str,
    pub capabilities: AgentCapabilities,
    pub default_input_modes: Vec<&'static str>,
    pub default_output_modes: Vec<&'static str>,
    pub skills: Vec<AgentSkill>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub push_notifications: bool,
    pub state_transition_history: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentSkill {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tags: Vec<&'static str>,
    pub examples: Vec<&'static str>,
}

fn card(url: String) -> AgentCard {
    AgentCard {
        name: "Rollout Diagnostic Agent",
        description: "Analyzes canary rollouts on Kubernetes and recommends whether to promote or abort.",
        url,
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: PROTOCOL_VERSION,
        preferred_transport: "JSONRPC",
        capabilities: AgentCapabilities {
            streaming: false,
            push_notifications: false,
            state_transition_history: false,
        },
        default_input_modes: vec!["text"],
        default_output_modes: vec!["text"],
        skills: vec![
            AgentSkill {
                id: "canary-analysis",
                name: "Canary analysis",
                description: "Compares canary and stable behavior and returns a promote/abort decision with root cause and remediation.",
                tags: vec!["kubernetes", "canary", "rollout"],
                examples: vec!["Analyze the canary rollout of deployment web in namespace shop"],
            },
            AgentSkill {
                id: "kubernetes-diagnostics",
                name: "Kubernetes diagnostics",
                description: "Reads pod logs, events, status, resources and metrics to explain failures.",
                tags: vec!["kubernetes", "debugging"],
                examples: vec!["Why is pod web-canary-7d9f crash looping?"],
            },
        ],
    }
}

/// A2A agent card.
pub async fn agent_card(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=300")],
        Json(card(state.config.agent_url())),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::state::testing::{ScriptedEngine, state_with};

    #[tokio::test]
    async fn card_is_served_on_both_well_known_paths() {
        let state = state_with(ScriptedEngine::answering(&[]));
        for path in ["/.well-known/agent.json", "/.well-known/agent-card.json"] {
            let response = super::router()
                .with_state(state.clone())
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body: Value =
                serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap())
                    .unwrap();
            assert_eq!(body["url"], "http://localhost:8080/");
            assert_eq!(body["capabilities"]["streaming"], false);
            assert_eq!(body["defaultInputModes"][0], "text");
            let skills: Vec<&str> = body["skills"]
                .as_array()
                .unwrap()
                .iter()
                .map(|s| s["id"].as_str().unwrap())
                .collect();
            assert_eq!(skills, ["canary-analysis", "kubernetes-diagnostics"]);
        }
    }
}
