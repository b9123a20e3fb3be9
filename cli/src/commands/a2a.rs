use clap::{Args, Subcommand};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::util::{
    EXIT_CLIENT_ERROR, EXIT_SERVER_ERROR, exit_code_for_status, print_response, send_request,
};

const RPC_PATH: &str = "/a2a";

#[derive(Args)]
pub struct SendArgs {
    /// Message text
    #[arg(long)]
    pub message: String,
    /// Conversation memory id (metadata.memoryId)
    #[arg(long)]
    pub memory_id: Option<String>,
    /// Caller user id (metadata.userId)
    #[arg(long)]
    pub user_id: Option<String>,
    /// Caller session id (metadata.sessionId)
    #[arg(long)]
    pub session_id: Option<String>,
    /// Continue an existing task
    #[arg(long)]
    pub task_id: Option<String>,
    /// Context id to group related tasks
    #[arg(long)]
    pub context_id: Option<String>,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Fetch a task with its status and artifacts
    Get {
        /// Task id
        id: String,
        /// Keep only the last N history messages
        #[arg(long)]
        history_length: Option<usize>,
    },
    /// Cancel a task that has not finished
    Cancel {
        /// Task id
        id: String,
    },
}

pub fn rpc_envelope(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": Uuid::now_v7().to_string(),
        "method": method,
        "params": params
    })
}

pub fn message_params(args: &SendArgs) -> Value {
    let mut metadata = Map::new();
    for (key, value) in [
        ("memoryId", &args.memory_id),
        ("userId", &args.user_id),
        ("sessionId", &args.session_id),
    ] {
        if let Some(value) = value {
            metadata.insert(key.to_string(), json!(value));
        }
    }

    let mut message = json!({
        "kind": "message",
        "role": "user",
        "messageId": Uuid::now_v7().to_string(),
        "parts": [{"kind": "text", "text": args.message}]
    });
    if let Some(task_id) = &args.task_id {
        message["taskId"] = json!(task_id);
    }
    if let Some(context_id) = &args.context_id {
        message["contextId"] = json!(context_id);
    }
    if !metadata.is_empty() {
        message["metadata"] = Value::Object(metadata);
    }
    json!({ "message": message })
}

/// JSON-RPC errors arrive with HTTP 200; map them onto the CLI exit codes.
pub fn rpc_exit_code(status: u16, body: &Value) -> i32 {
    let code = exit_code_for_status(status);
    if code != 0 {
        return code;
    }
    match body.get("error").and_then(|e| e.get("code")).and_then(Value::as_i64) {
        None => code,
        Some(-32603) => EXIT_SERVER_ERROR,
        Some(_) => EXIT_CLIENT_ERROR,
    }
}

async fn call(api_url: &str, method: &str, params: Value, raw: bool) -> i32 {
    match send_request(api_url, reqwest::Method::POST, RPC_PATH, Some(rpc_envelope(method, params)))
        .await
    {
        Ok((status, body)) => {
            let exit_code = rpc_exit_code(status, &body);
            print_response(exit_code, &body, raw);
            exit_code
        }
        Err(code) => code,
    }
}

pub async fn send(api_url: &str, args: SendArgs, raw: bool) -> i32 {
    call(api_url, "message/send", message_params(&args), raw).await
}

pub async fn task(api_url: &str, command: TaskCommands, raw: bool) -> i32 {
    match command {
        TaskCommands::Get { id, history_length } => {
            let mut params = json!({ "id": id });
            if let Some(n) = history_length {
                params["historyLength"] = json!(n);
            }
            call(api_url, "tasks/get", params, raw).await
        }
        TaskCommands::Cancel { id } => call(api_url, "tasks/cancel", json!({ "id": id }), raw).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_carries_identity_metadata() {
        let params = message_params(&SendArgs {
            message: "Analyze".to_string(),
            memory_id: None,
            user_id: Some("u1".to_string()),
            session_id: Some("s1".to_string()),
            task_id: Some("t1".to_string()),
            context_id: None,
        });
        let message = &params["message"];
        assert_eq!(message["role"], "user");
        assert_eq!(message["parts"][0]["text"], "Analyze");
        assert_eq!(message["taskId"], "t1");
        assert!(message.get("contextId").is_none());
        assert_eq!(message["metadata"], json!({"userId": "u1", "sessionId": "s1"}));
    }

    #[test]
    fn anonymous_message_has_no_metadata() {
        let params = message_params(&SendArgs {
            message: "Analyze".to_string(),
            memory_id: None,
            user_id: None,
            session_id: None,
            task_id: None,
            context_id: None,
        });
        assert!(params["message"].get("metadata").is_none());
    }

    #[test]
    fn rpc_errors_become_exit_codes() {
        assert_eq!(rpc_exit_code(200, &json!({"result": {}})), 0);
        assert_eq!(rpc_exit_code(200, &json!({"error": {"code": -32001}})), EXIT_CLIENT_ERROR);
        assert_eq!(rpc_exit_code(200, &json!({"error": {"code": -32603}})), EXIT_SERVER_ERROR);
        assert_eq!(rpc_exit_code(503, &json!({})), EXIT_SERVER_ERROR);
        assert_eq!(rpc_envelope("tasks/get", json!({}))["jsonrpc"], "2.0");
    }
}
