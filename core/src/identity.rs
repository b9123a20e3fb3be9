use serde::Serialize;
use serde_json::{Map, Value};

/// Key used when nothing else identifies the conversation. Every caller that
/// lands here shares one memory in the reasoning engine.
pub const SHARED_SESSION_KEY: &str = "default";

/// Metadata keys consulted, highest priority first.
pub const MEMORY_ID_KEY: &str = "memoryId";
pub const USER_ID_KEY: &str = "userId";
pub const SESSION_ID_KEY: &str = "sessionId";

/// Where a session key came from. Variant order is resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    MemoryId,
    UserId,
    SessionId,
    TaskId,
    SharedDefault,
}

/// How much a resolved key can be trusted to scope conversation memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSeverity {
    /// Caller supplied a stable identifier.
    Stable,
    /// Task-scoped key: history is not carried across requests.
    Degraded,
    /// Shared key: memory leaks between unrelated callers.
    Hazard,
}

impl SessionSource {
    pub fn metadata_key(&self) -> Option<&'static str> {
        match self {
            SessionSource::MemoryId => Some(MEMORY_ID_KEY),
            SessionSource::UserId => Some(USER_ID_KEY),
            SessionSource::SessionId => Some(SESSION_ID_KEY),
            SessionSource::TaskId | SessionSource::SharedDefault => None,
        }
    }

    pub fn severity(&self) -> ResolutionSeverity {
        match self {
            SessionSource::MemoryId | SessionSource::UserId | SessionSource::SessionId => {
                ResolutionSeverity::Stable
            }
            SessionSource::TaskId => ResolutionSeverity::Degraded,
            SessionSource::SharedDefault => ResolutionSeverity::Hazard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionSource::MemoryId => "memory_id",
            SessionSource::UserId => "user_id",
            SessionSource::SessionId => "session_id",
            SessionSource::TaskId => "task_id",
            SessionSource::SharedDefault => "shared_default",
        }
    }
}

/// The key that scopes conversational memory inside the reasoning engine,
/// together with the signal it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionKey {
    value: String,
    source: SessionSource,
}

impl SessionKey {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> SessionSource {
        self.source
    }

    pub fn severity(&self) -> ResolutionSeverity {
        self.source.severity()
    }

    pub fn is_shared(&self) -> bool {
        self.source == SessionSource::SharedDefault
    }

    /// Operator-facing explanation for keys that are not stable, `None` otherwise.
    pub fn warning(&self) -> Option<String> {
        match self.source {
            SessionSource::TaskId => Some(format!(
                "No persistent identifier found in metadata, falling back to task ID '{}'. \
                 Conversation history will NOT carry over to later requests.",
                self.value
            )),
            SessionSource::SharedDefault => Some(format!(
                "No memory identifier found, using '{}'. \
                 Conversation history will be shared across all callers.",
                SHARED_SESSION_KEY
            )),
            _ => None,
        }
    }

    /// Emit the resolution at a level matching its severity.
    pub fn log_resolution(&self) {
        match self.severity() {
            ResolutionSeverity::Stable => tracing::debug!(
                session_key = %self.value,
                session_source = self.source.as_str(),
                "Resolved session key"
            ),
            ResolutionSeverity::Degraded => tracing::warn!(
                session_key = %self.value,
                session_source = self.source.as_str(),
                "{}",
                self.warning().unwrap_or_default()
            ),
            ResolutionSeverity::Hazard => tracing::error!(
                session_key = %self.value,
                session_source = self.source.as_str(),
                "{}",
                self.warning().unwrap_or_default()
            ),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// Derive the session key for a request.
///
/// First non-empty signal wins: `memoryId`, `userId`, `sessionId` from the
/// metadata, then the id of a task that already existed for this exchange,
/// then the shared default. Null and blank values count as absent. Non-string
/// scalars are rendered with their JSON text.
pub fn resolve(metadata: Option<&Map<String, Value>>, existing_task_id: Option<&str>) -> SessionKey {
    if let Some(metadata) = metadata {
        for source in [
            SessionSource::MemoryId,
            SessionSource::UserId,
            SessionSource::SessionId,
        ] {
            let Some(key) = source.metadata_key() else {
                continue;
            };
            if let Some(value) = metadata.get(key).and_then(signal_text) {
                return SessionKey { value, source };
            }
        }
    }

    if let Some(task_id) = existing_task_id.map(str::trim).filter(|id| !id.is_empty()) {
        return SessionKey {
            value: task_id.to_string(),
            source: SessionSource::TaskId,
        };
    }

    SessionKey {
        value: SHARED_SESSION_KEY.to_string(),
        source: SessionSource::SharedDefault,
    }
}

fn signal_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() { None } else { Some(text) }
}
