//! Reasoning engine over an OpenAI-compatible `/chat/completions` endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rollout_core::engine::{EngineError, ReasoningEngine};
use rollout_core::identity::SessionKey;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{DEFAULT_LLM_API_URL, EngineConfig};
use crate::tools::Toolbox;

pub const SYSTEM_PROMPT: &str = "You are an expert Kubernetes SRE specializing in canary deployment analysis.\n\
Analyze the provided metrics and logs to determine if a canary deployment is healthy.\n\
Be thorough but concise in your analysis.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text("assistant", content)
    }

    pub fn tool_result(call_id: &str, result: &Value) -> Self {
        Self {
            tool_call_id: Some(call_id.to_string()),
            ..Self::text("tool", result.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

/// One chat-completions round trip.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, body: &Value) -> Result<ChatMessage, EngineError>;
}

pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: EngineConfig,
}

impl HttpCompletionClient {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::NotConfigured(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, body: &Value) -> Result<ChatMessage, EngineError> {
        let mut request = self.http.post(self.config.api_url.clone()).json(body);
        match &self.config.api_key {
            Some(key) => request = request.bearer_auth(key),
            // Local OpenAI-compatible servers run without a key; the hosted API does not.
            None if self.config.api_url.as_str() == DEFAULT_LLM_API_URL => {
                return Err(EngineError::NotConfigured(
                    "ROLLOUT_LLM_API_KEY is not set".to_string(),
                ));
            }
            None => {}
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                EngineError::Transport(format!("Request timed out: {err}"))
            } else if err.is_connect() {
                EngineError::Transport(format!("Connection failed: {err}"))
            } else {
                EngineError::Transport(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        first_choice(parsed)
    }
}

fn first_choice(response: ChatCompletionResponse) -> Result<ChatMessage, EngineError> {
    if let Some(usage) = &response.usage {
        tracing::debug!(total_tokens = usage.total_tokens, "Chat completion finished");
    }
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| EngineError::Malformed("no choices returned".to_string()))
}

/// Per-session chat history, bounded to the most recent messages.
///
/// Only user prompts and final answers are kept; tool traffic stays inside
/// a single call. Concurrent calls on one key may interleave their turns.
/// At most `max_sessions` keys are held; recording a new key when full drops
/// the least recently used one.
#[derive(Debug)]
pub struct ConversationMemory {
    window: usize,
    max_sessions: usize,
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    clock: u64,
    sessions: HashMap<String, (u64, Vec<ChatMessage>)>,
}

impl MemoryInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl ConversationMemory {
    pub fn new(window: usize, max_sessions: usize) -> Self {
        Self {
            window: window.max(1),
            max_sessions: max_sessions.max(1),
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    pub fn history(&self, key: &str) -> Vec<ChatMessage> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = inner.tick();
        match inner.sessions.get_mut(key) {
            Some((used, history)) => {
                *used = now;
                history.clone()
            }
            None => Vec::new(),
        }
    }

    pub fn record(&self, key: &str, prompt: &str, answer: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = inner.tick();
        if !inner.sessions.contains_key(key) && inner.sessions.len() >= self.max_sessions {
            let oldest = inner
                .sessions
                .iter()
                .min_by_key(|(_, (used, _))| *used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(session = %oldest, "Evicting least recently used conversation");
                inner.sessions.remove(&oldest);
            }
        }
        let (used, history) = inner.sessions.entry(key.to_string()).or_default();
        *used = now;
        history.push(ChatMessage::user(prompt));
        history.push(ChatMessage::assistant(answer));
        if history.len() > self.window {
            let excess = history.len() - self.window;
            history.drain(..excess);
        }
        // A window must not open on an orphaned answer.
        while history.first().is_some_and(|m| m.role != "user") {
            history.remove(0);
        }
    }

    pub fn sessions(&self) -> usize {
        self.inner.lock().map(|i| i.sessions.len()).unwrap_or(0)
    }
}

pub struct ChatCompletionsEngine {
    client: Arc<dyn CompletionClient>,
    toolbox: Toolbox,
    memory: ConversationMemory,
    model: String,
    temperature: Option<f32>,
    max_tool_rounds: usize,
}

impl ChatCompletionsEngine {
    pub fn new(config: EngineConfig, toolbox: Toolbox) -> Result<Self, EngineError> {
        let client = Arc::new(HttpCompletionClient::new(config.clone())?);
        Ok(Self::with_client(config, toolbox, client))
    }

    pub fn with_client(
        config: EngineConfig,
        toolbox: Toolbox,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            client,
            toolbox,
            memory: ConversationMemory::new(config.memory_window, config.memory_sessions),
            model: config.model,
            temperature: config.temperature,
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[Value]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        body
    }

    /// Run the tool loop until the model gives a plain answer.
    async fn converse(&self, mut messages: Vec<ChatMessage>) -> Result<String, EngineError> {
        let tools = self.toolbox.definitions();
        let mut round = 0;
        loop {
            let reply = self
                .client
                .complete(&self.request_body(&messages, &tools))
                .await?;

            if reply.tool_calls.is_empty() {
                return match reply.content {
                    Some(answer) if !answer.trim().is_empty() => Ok(answer),
                    _ => Err(EngineError::Malformed("empty answer".to_string())),
                };
            }
            if round >= self.max_tool_rounds {
                return Err(EngineError::ToolBudgetExhausted(self.max_tool_rounds));
            }
            round += 1;

            let calls = reply.tool_calls.clone();
            messages.push(reply);
            for call in &calls {
                tracing::debug!(tool = %call.function.name, round, "Model requested tool");
                let result = self
                    .toolbox
                    .dispatch(&call.function.name, &call.function.arguments)
                    .await;
                messages.push(ChatMessage::tool_result(&call.id, &result));
            }
        }
    }
}

#[async_trait]
impl ReasoningEngine for ChatCompletionsEngine {
    async fn chat(&self, session: &SessionKey, prompt: &str) -> Result<String, EngineError> {
        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        messages.extend(self.memory.history(session.as_str()));
        messages.push(ChatMessage::user(prompt));
        tracing::debug!(session = %session, history = messages.len() - 2, "Sending chat request");

        let answer = self.converse(messages).await?;
        self.memory.record(session.as_str(), prompt, &answer);
        Ok(answer)
    }

    async fn chat_stateless(&self, prompt: &str) -> Result<String, EngineError> {
        self.converse(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use rollout_core::identity;

    use super::*;

    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<ChatMessage>>,
        bodies: Mutex<Vec<Value>>,
    }

    impl ScriptedClient {
        fn replying(replies: Vec<ChatMessage>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                bodies: Mutex::new(Vec::new()),
            })
        }

        fn bodies(&self) -> Vec<Value> {
            self.bodies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, body: &Value) -> Result<ChatMessage, EngineError> {
            self.bodies.lock().unwrap().push(body.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| EngineError::Transport("script exhausted".to_string()))
        }
    }

    fn tool_call_reply(name: &str, arguments: &str) -> ChatMessage {
        ChatMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call_{name}"),
                kind: function_kind(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
            tool_call_id: None,
        }
    }

    fn engine(client: Arc<ScriptedClient>, config: EngineConfig) -> ChatCompletionsEngine {
        ChatCompletionsEngine::with_client(config, Toolbox::new(), client)
    }

    fn session(id: &str) -> SessionKey {
        let mut metadata = serde_json::Map::new();
        metadata.insert("memoryId".into(), json!(id));
        identity::resolve(Some(&metadata), None)
    }

    #[test]
    fn response_parsing_takes_first_choice() {
        let raw = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "All good"}, "finish_reason": "stop"},
                {"message": {"role": "assistant", "content": "ignored"}}
            ],
            "usage": {"total_tokens": 42}
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let message = first_choice(parsed).unwrap();
        assert_eq!(message.content.as_deref(), Some("All good"));

        let empty: ChatCompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(first_choice(empty), Err(EngineError::Malformed(_))));
    }

    #[test]
    fn tool_calls_deserialize_from_wire() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "c1", "type": "function",
                            "function": {"name": "get_pod_logs", "arguments": "{\"namespace\":\"shop\"}"}}]
        }))
        .unwrap();
        assert_eq!(message.tool_calls[0].function.name, "get_pod_logs");

        let tool = ChatMessage::tool_result("c1", &json!({"ok": true}));
        let wire = serde_json::to_value(&tool).unwrap();
        assert_eq!(wire["tool_call_id"], "c1");
        assert_eq!(wire["content"], "{\"ok\":true}");
        assert!(wire.get("tool_calls").is_none());
    }

    #[test]
    fn memory_keeps_a_bounded_window() {
        let memory = ConversationMemory::new(4, 10);
        for turn in 0..5 {
            memory.record("m1", &format!("q{turn}"), &format!("a{turn}"));
        }
        let history = memory.history("m1");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content.as_deref(), Some("q3"));
        assert_eq!(history[3].content.as_deref(), Some("a4"));
        assert!(memory.history("other").is_empty());
    }

    #[test]
    fn memory_evicts_least_recently_used_session() {
        let memory = ConversationMemory::new(4, 2);
        memory.record("m1", "q0", "a0");
        memory.record("m2", "q0", "a0");
        // Reading m1 makes m2 the stalest key.
        assert_eq!(memory.history("m1").len(), 2);
        memory.record("m3", "q0", "a0");

        assert_eq!(memory.sessions(), 2);
        assert!(memory.history("m2").is_empty());
        assert_eq!(memory.history("m1").len(), 2);
        assert_eq!(memory.history("m3").len(), 2);
    }

    #[test]
    fn odd_window_never_starts_with_an_answer() {
        let memory = ConversationMemory::new(3, 10);
        memory.record("m1", "q0", "a0");
        memory.record("m1", "q1", "a1");
        let history = memory.history("m1");
        assert_eq!(history[0].role, "user");
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn chat_threads_history_per_session() {
        let client = ScriptedClient::replying(vec![
            ChatMessage::assistant("first"),
            ChatMessage::assistant("second"),
            ChatMessage::assistant("third"),
        ]);
        let engine = engine(client.clone(), EngineConfig::default());

        engine.chat(&session("m1"), "hello").await.unwrap();
        engine.chat(&session("m1"), "again").await.unwrap();
        engine.chat(&session("m2"), "other").await.unwrap();

        let bodies = client.bodies();
        assert_eq!(bodies[0]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(bodies[1]["messages"].as_array().unwrap().len(), 4);
        assert_eq!(bodies[1]["messages"][2]["content"], "first");
        assert_eq!(bodies[2]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(bodies[0]["model"], "gpt-4o-mini");
        assert!(bodies[0].get("tools").is_none());
        assert_eq!(engine.memory().sessions(), 2);
    }

    #[tokio::test]
    async fn stateless_chat_reads_and_writes_nothing() {
        let client = ScriptedClient::replying(vec![
            ChatMessage::assistant("seed"),
            ChatMessage::assistant("one-off"),
        ]);
        let engine = engine(client.clone(), EngineConfig::default());
        engine.chat(&session("default"), "seed").await.unwrap();

        let answer = engine.chat_stateless("question").await.unwrap();
        assert_eq!(answer, "one-off");
        assert_eq!(client.bodies()[1]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(engine.memory().history("default").len(), 2);
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let client = ScriptedClient::replying(vec![
            tool_call_reply("get_pod_logs", r#"{"namespace":"shop","podName":"web"}"#),
            ChatMessage::assistant("Root cause found"),
        ]);
        let engine = engine(client.clone(), EngineConfig::default());

        let answer = engine.chat_stateless("analyze").await.unwrap();
        assert_eq!(answer, "Root cause found");
        let second = &client.bodies()[1]["messages"];
        assert_eq!(second[2]["tool_calls"][0]["id"], "call_get_pod_logs");
        assert_eq!(second[3]["role"], "tool");
        assert_eq!(second[3]["tool_call_id"], "call_get_pod_logs");
        // No cluster configured, so the tool reports an error value.
        assert!(second[3]["content"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn tool_loop_is_bounded() {
        let config = EngineConfig {
            max_tool_rounds: 2,
            ..EngineConfig::default()
        };
        let client = ScriptedClient::replying(vec![
            tool_call_reply("debug_kubernetes_pod", "{}"),
            tool_call_reply("debug_kubernetes_pod", "{}"),
            tool_call_reply("debug_kubernetes_pod", "{}"),
        ]);
        let engine = engine(client.clone(), config);

        let err = engine.chat(&session("m1"), "loop").await.unwrap_err();
        assert!(matches!(err, EngineError::ToolBudgetExhausted(2)));
        assert_eq!(client.bodies().len(), 3);
        assert!(engine.memory().history("m1").is_empty());
    }

    #[tokio::test]
    async fn blank_answer_is_malformed() {
        let client = ScriptedClient::replying(vec![ChatMessage::assistant("  ")]);
        let engine = engine(client, EngineConfig::default());
        assert!(matches!(
            engine.chat_stateless("x").await,
            Err(EngineError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn hosted_api_requires_key() {
        let client = HttpCompletionClient::new(EngineConfig::default()).unwrap();
        let err = client.complete(&json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::NotConfigured(_)));
    }
}
