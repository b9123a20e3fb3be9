//! A2A JSON-RPC endpoint: `message/send`, `tasks/get`, `tasks/cancel`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use rollout_core::executor::{ExecutionMode, ExecutionRequest};
use rollout_core::message::Message;
use rollout_core::task::{Task, TaskError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(jsonrpc_post))
        .route("/a2a", post(jsonrpc_post))
}

#[derive(Debug, Clone, PartialEq)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "Parse error".to_string(),
            data: None,
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }

    fn task_not_found(task_id: &str) -> Self {
        Self {
            code: -32001,
            message: "Task not found".to_string(),
            data: Some(json!({ "taskId": task_id })),
        }
    }

    fn task_not_cancelable(task_id: &str, state: &str) -> Self {
        Self {
            code: -32002,
            message: "Task cannot be canceled".to_string(),
            data: Some(json!({ "taskId": task_id, "state": state })),
        }
    }
}

impl From<TaskError> for RpcError {
    fn from(err: TaskError) -> Self {
        match &err {
            TaskError::NotFound { task_id } => RpcError::task_not_found(task_id),
            TaskError::NotCancelable { task_id, state } => {
                RpcError::task_not_cancelable(task_id, state.as_str())
            }
            TaskError::AlreadyExists { .. } | TaskError::InvalidTransition { .. } => {
                RpcError::invalid_params(err.to_string())
            }
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageSendParams {
    message: Message,
    /// Request-level metadata; used when the message carries none.
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskQueryParams {
    id: String,
    #[serde(default)]
    history_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TaskIdParams {
    id: String,
}

fn parse_params<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params)
        .map_err(|e| RpcError::invalid_params(format!("Invalid params for {method}: {e}")))
}

fn task_value(task: &Task) -> Result<Value, RpcError> {
    serde_json::to_value(task).map_err(|e| RpcError::internal(e.to_string()))
}

async fn jsonrpc_post(State(state): State<AppState>, body: Bytes) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            return (
                StatusCode::OK,
                Json(error_response(Value::Null, RpcError::parse_error())),
            )
                .into_response();
        }
    };

    let mut responses = handle_incoming_message(&state, incoming).await;

    match responses.len() {
        0 => StatusCode::ACCEPTED.into_response(),
        1 => (StatusCode::OK, Json(responses.remove(0))).into_response(),
        _ => (StatusCode::OK, Json(Value::Array(responses))).into_response(),
    }
}

async fn handle_incoming_message(state: &AppState, incoming: Value) -> Vec<Value> {
    let mut responses = Vec::new();

    if let Some(batch) = incoming.as_array() {
        if batch.is_empty() {
            responses.push(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
            return responses;
        }
        for item in batch {
            if let Some(response) = handle_single_message(state, item.clone()).await {
                responses.push(response);
            }
        }
        return responses;
    }

    if let Some(response) = handle_single_message(state, incoming).await {
        responses.push(response);
    }
    responses
}

async fn handle_single_message(state: &AppState, incoming: Value) -> Option<Value> {
    let Some(obj) = incoming.as_object() else {
        return Some(error_response(
            Value::Null,
            RpcError::invalid_request("Request must be a JSON object"),
        ));
    };

    let id = obj.get("id").cloned();
    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Some(error_response(
            id.unwrap_or(Value::Null),
            RpcError::invalid_request("jsonrpc must be '2.0'"),
        ));
    }

    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        return Some(error_response(
            id.unwrap_or(Value::Null),
            RpcError::invalid_request("Request must have a string 'method'"),
        ));
    };

    let Some(id) = id else {
        tracing::debug!(method, "Ignoring JSON-RPC notification");
        return None;
    };

    let params = obj.get("params").cloned().unwrap_or(Value::Null);
    Some(match handle_request(state, method, params).await {
        Ok(payload) => success_response(id, payload),
        Err(err) => {
            tracing::warn!(method, code = err.code, message = %err.message, "JSON-RPC request failed");
            error_response(id, err)
        }
    })
}

async fn handle_request(state: &AppState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "message/send" => message_send(state, parse_params(method, params)?).await,
        "tasks/get" => tasks_get(state, parse_params(method, params)?),
        "tasks/cancel" => tasks_cancel(state, parse_params(method, params)?),
        _ => Err(RpcError::method_not_found(method)),
    }
}

async fn message_send(state: &AppState, params: MessageSendParams) -> Result<Value, RpcError> {
    let MessageSendParams {
        mut message,
        metadata,
    } = params;
    if message.metadata.is_none() {
        message.metadata = metadata;
    }

    let (task_id, context_id, existing_task) = match message.task_id.clone() {
        Some(task_id) => {
            let task = state
                .executor
                .get(&task_id)
                .map_err(|_| RpcError::task_not_found(&task_id))?;
            (task_id, task.context_id, true)
        }
        None => {
            let context_id = message
                .context_id
                .clone()
                .unwrap_or_else(|| Uuid::now_v7().to_string());
            (Uuid::now_v7().to_string(), context_id, false)
        }
    };
    message.task_id = Some(task_id.clone());
    message.context_id = Some(context_id.clone());

    let outcome = state
        .executor
        .execute(ExecutionRequest {
            task_id,
            context_id,
            existing_task,
            message,
            mode: ExecutionMode::Conversational,
        })
        .await?;
    task_value(&outcome.task)
}

fn tasks_get(state: &AppState, params: TaskQueryParams) -> Result<Value, RpcError> {
    let mut task = state.executor.get(&params.id)?;
    if let Some(keep) = params.history_length {
        let excess = task.history.len().saturating_sub(keep);
        task.history.drain(..excess);
    }
    task_value(&task)
}

fn tasks_cancel(state: &AppState, params: TaskIdParams) -> Result<Value, RpcError> {
    let task = state.executor.cancel(&params.id)?;
    task_value(&task)
}
