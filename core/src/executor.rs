//! Task Lifecycle Controller.
//!
//! Drives one request from submission to a terminal state around a single
//! reasoning-engine call. Engine faults never cross the task boundary: they
//! become a synthetic decision record and the task still completes.

use std::sync::Arc;

use serde::Serialize;

use crate::decision::DecisionRecord;
use crate::engine::ReasoningEngine;
use crate::identity::{self, SessionKey};
use crate::interpreter::ResponseInterpreter;
use crate::message::Message;
use crate::policy::FailurePolicy;
use crate::prompt::build_prompt;
use crate::task::{Artifact, Task, TaskError, TaskRegistry, TaskState};

pub const EMPTY_MESSAGE_REASON: &str = "Request contained no text to analyze";

/// Which caller surface a request came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Protocol-driven task; conversation memory follows identity resolution.
    Conversational,
    /// Single request/response call; never writes to the shared memory key.
    OneShot,
}

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Identifier assigned by the protocol layer.
    pub task_id: String,
    pub context_id: String,
    /// The task was already registered before this message arrived.
    pub existing_task: bool,
    pub message: Message,
    pub mode: ExecutionMode,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Task snapshot after the controller finished with it.
    pub task: Task,
    /// Record attached to the task; `None` when the task failed before
    /// analysis or was canceled mid-flight.
    pub decision: Option<DecisionRecord>,
    pub session: Option<SessionKey>,
    /// Engine fault converted by the failure policy, if any.
    pub fault: Option<String>,
}

impl ExecutionOutcome {
    pub fn degraded(&self) -> bool {
        self.fault.is_some()
    }
}

#[derive(Clone)]
pub struct AnalysisExecutor {
    engine: Arc<dyn ReasoningEngine>,
    registry: Arc<dyn TaskRegistry>,
    interpreter: ResponseInterpreter,
    policy: FailurePolicy,
}

impl AnalysisExecutor {
    pub fn new(engine: Arc<dyn ReasoningEngine>, registry: Arc<dyn TaskRegistry>) -> Self {
        Self {
            engine,
            registry,
            interpreter: ResponseInterpreter::default(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: ResponseInterpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<dyn TaskRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run a request to a terminal state.
    ///
    /// Errors are protocol-level only (unknown task, task in the wrong state);
    /// analysis failures are reported inside the outcome.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, TaskError> {
        let ExecutionRequest {
            task_id,
            context_id,
            existing_task,
            message,
            mode,
        } = request;

        tracing::info!(task_id = %task_id, existing_task, ?mode, "Processing analysis request");

        if !existing_task {
            let mut task = Task::new(&task_id, &context_id);
            task.metadata = message.metadata.clone();
            self.registry.insert(task)?;
            self.registry.transition(&task_id, TaskState::Submitted, None)?;
        }

        // Visible to `cancel` before the engine call starts. Re-entry into a
        // task that is already working is accepted as is.
        let mut incoming = Some(message.clone());
        self.registry.update(&task_id, &mut |task| {
            if task.state() != TaskState::Working {
                task.transition(TaskState::Working, None)?;
            }
            if let Some(incoming) = incoming.take() {
                task.history.push(incoming);
            }
            Ok(())
        })?;

        let content = message.text_content();
        tracing::debug!(task_id = %task_id, content = %content, "Extracted message content");

        let (decision, fault, session) = if content.is_empty() {
            tracing::warn!(task_id = %task_id, "{}", EMPTY_MESSAGE_REASON);
            (
                self.policy.failure_record(&EMPTY_MESSAGE_REASON),
                Some(EMPTY_MESSAGE_REASON.to_string()),
                None,
            )
        } else {
            let prior_task = existing_task.then_some(task_id.as_str());
            let session = identity::resolve(message.metadata.as_ref(), prior_task);
            session.log_resolution();

            let prompt = build_prompt(&content, message.context_map());
            tracing::debug!(task_id = %task_id, prompt = %prompt, "Built prompt");

            let answer = if mode == ExecutionMode::OneShot && session.is_shared() {
                tracing::info!(task_id = %task_id, "No caller identity on one-shot request, using stateless chat");
                self.engine.chat_stateless(&prompt).await
            } else {
                self.engine.chat(&session, &prompt).await
            };

            match answer {
                Ok(raw) => {
                    tracing::info!(task_id = %task_id, "Reasoning engine answered");
                    let decision = self.interpreter.interpret(&raw);
                    tracing::debug!(task_id = %task_id, ?decision, "Parsed response");
                    (decision, None, Some(session))
                }
                Err(err) => {
                    tracing::error!(task_id = %task_id, error = %err, "Error processing analysis request");
                    (self.policy.failure_record(&err), Some(err.to_string()), Some(session))
                }
            }
        };

        let artifact = Artifact::decision(&decision);
        let mut pending = Some(artifact);
        let task = self.registry.update(&task_id, &mut |task| {
            if task.state() == TaskState::Canceled {
                return Ok(());
            }
            task.transition(TaskState::Completed, None)?;
            if let Some(artifact) = pending.take() {
                task.artifacts.push(artifact);
            }
            Ok(())
        })?;

        if task.state() == TaskState::Canceled {
            tracing::info!(task_id = %task_id, "Task was canceled while the engine was working; result discarded");
            return Ok(ExecutionOutcome {
                task,
                decision: None,
                session,
                fault,
            });
        }

        Ok(ExecutionOutcome {
            task,
            decision: Some(decision),
            session,
            fault,
        })
    }

    pub fn cancel(&self, task_id: &str) -> Result<Task, TaskError> {
        match self.registry.cancel(task_id) {
            Ok(task) => {
                tracing::info!(task_id = %task_id, "Task canceled");
                Ok(task)
            }
            Err(err) => {
                tracing::warn!(task_id = %task_id, error = %err, "Cancel rejected");
                Err(err)
            }
        }
    }

    pub fn get(&self, task_id: &str) -> Result<Task, TaskError> {
        self.registry.get(task_id).ok_or_else(|| TaskError::NotFound {
            task_id: task_id.to_string(),
        })
    }
}
