use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::decision::DecisionRecord;
use crate::message::{Message, Part};

pub const DECISION_ARTIFACT_NAME: &str = "canary-analysis";

/// Lifecycle of one unit of work. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Created,
    Submitted,
    Working,
    Completed,
    Canceled,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Canceled | TaskState::Failed
        )
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Created, Submitted)
                | (Created, Canceled)
                | (Submitted, Working)
                | (Submitted, Canceled)
                | (Submitted, Failed)
                | (Working, Completed)
                | (Working, Canceled)
                | (Working, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::Completed => "completed",
            TaskState::Canceled => "canceled",
            TaskState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task '{task_id}' not found")]
    NotFound { task_id: String },
    #[error("task '{task_id}' already exists")]
    AlreadyExists { task_id: String },
    #[error("task '{task_id}' is {state} and cannot be canceled")]
    NotCancelable { task_id: String, state: TaskState },
    #[error("task '{task_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskState,
        to: TaskState,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl TaskStatus {
    fn now(state: TaskState, message: Option<Message>) -> Self {
        Self {
            state,
            timestamp: Utc::now(),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parts: Vec<Part>,
}

impl Artifact {
    /// Text rendering for people plus the JSON record for machines.
    pub fn decision(record: &DecisionRecord) -> Self {
        let data = serde_json::to_value(record).unwrap_or(Value::Null);
        Self {
            artifact_id: Uuid::now_v7().to_string(),
            name: Some(DECISION_ARTIFACT_NAME.to_string()),
            parts: vec![Part::text(record.render_text()), Part::data(data)],
        }
    }

    /// The decision record carried by this artifact, if any.
    pub fn decision_record(&self) -> Option<DecisionRecord> {
        self.parts.iter().find_map(|part| match part {
            Part::Data { data } => serde_json::from_value(data.clone()).ok(),
            _ => None,
        })
    }
}

fn task_kind() -> String {
    "task".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default = "task_kind")]
    pub kind: String,
}

impl Task {
    pub fn new(id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::now(TaskState::Created, None),
            artifacts: Vec::new(),
            history: Vec::new(),
            metadata: None,
            kind: task_kind(),
        }
    }

    pub fn state(&self) -> TaskState {
        self.status.state
    }

    pub fn transition(&mut self, next: TaskState, message: Option<Message>) -> Result<(), TaskError> {
        let current = self.status.state;
        if !current.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                task_id: self.id.clone(),
                from: current,
                to: next,
            });
        }
        self.status = TaskStatus::now(next, message);
        Ok(())
    }

    /// Decision record of the first decision artifact, if the task has one.
    pub fn decision(&self) -> Option<DecisionRecord> {
        self.artifacts.iter().find_map(Artifact::decision_record)
    }
}

/// Task store of the surrounding protocol.
///
/// `update` is atomic: the closure sees a copy of the task and the copy is
/// stored only when the closure returns `Ok`.
pub trait TaskRegistry: Send + Sync {
    fn insert(&self, task: Task) -> Result<(), TaskError>;

    fn get(&self, task_id: &str) -> Option<Task>;

    fn update(
        &self,
        task_id: &str,
        apply: &mut dyn FnMut(&mut Task) -> Result<(), TaskError>,
    ) -> Result<Task, TaskError>;

    fn transition(
        &self,
        task_id: &str,
        next: TaskState,
        message: Option<Message>,
    ) -> Result<Task, TaskError> {
        let mut message = message;
        self.update(task_id, &mut |task| task.transition(next, message.take()))
    }

    /// Cancel a task that has not reached a terminal state.
    fn cancel(&self, task_id: &str) -> Result<Task, TaskError> {
        self.update(task_id, &mut |task| {
            let state = task.state();
            if state.is_terminal() {
                return Err(TaskError::NotCancelable {
                    task_id: task.id.clone(),
                    state,
                });
            }
            task.transition(TaskState::Canceled, None)
        })
    }
}

pub const DEFAULT_TASK_CAPACITY: usize = 10_000;

/// Registry kept in process memory.
///
/// Holds at most `capacity` tasks once any of them has finished: inserting
/// into a full registry evicts the terminal task with the oldest status
/// timestamp. Live tasks are never evicted, so a registry full of live tasks
/// grows past its capacity.
#[derive(Debug)]
pub struct InMemoryTaskRegistry {
    tasks: Mutex<HashMap<String, Task>>,
    capacity: usize,
}

impl Default for InMemoryTaskRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TASK_CAPACITY)
    }
}

impl InMemoryTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskRegistry for InMemoryTaskRegistry {
    fn insert(&self, task: Task) -> Result<(), TaskError> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if tasks.contains_key(&task.id) {
            return Err(TaskError::AlreadyExists { task_id: task.id });
        }
        if tasks.len() >= self.capacity {
            let oldest = tasks
                .values()
                .filter(|t| t.state().is_terminal())
                .min_by_key(|t| t.status.timestamp)
                .map(|t| t.id.clone());
            match oldest {
                Some(evicted) => {
                    tasks.remove(&evicted);
                    tracing::debug!(task_id = %evicted, "Evicted finished task");
                }
                None => tracing::warn!(
                    capacity = self.capacity,
                    "Task registry full of live tasks; growing past capacity"
                ),
            }
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn get(&self, task_id: &str) -> Option<Task> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.get(task_id).cloned()
    }

    fn update(
        &self,
        task_id: &str,
        apply: &mut dyn FnMut(&mut Task) -> Result<(), TaskError>,
    ) -> Result<Task, TaskError> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let stored = tasks.get_mut(task_id).ok_or_else(|| TaskError::NotFound {
            task_id: task_id.to_string(),
        })?;
        let mut draft = stored.clone();
        apply(&mut draft)?;
        *stored = draft.clone();
        Ok(draft)
    }
}
