use clap::Args;
use serde_json::{Map, Value, json};

use crate::util::{api_request, exit_error, parse_key_value};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// What to analyze (e.g. "Analyze canary rollout of web in namespace shop")
    #[arg(long)]
    pub prompt: String,
    /// Context entries (repeatable: key=value, e.g. namespace=shop)
    #[arg(long = "context", short = 'c')]
    pub context: Vec<String>,
    /// Caller user id (memory key when no memory id is given)
    #[arg(long)]
    pub user_id: Option<String>,
    /// Explicit conversation memory id
    #[arg(long)]
    pub memory_id: Option<String>,
    /// Session id of the caller
    #[arg(long)]
    pub session_id: Option<String>,
}

pub fn build_request(args: &AnalyzeArgs) -> Result<Value, String> {
    let mut body = json!({ "prompt": args.prompt });

    if !args.context.is_empty() {
        let mut context = Map::new();
        for entry in &args.context {
            let (key, value) = parse_key_value(entry)?;
            context.insert(key, value);
        }
        body["context"] = Value::Object(context);
    }
    if let Some(user_id) = &args.user_id {
        body["userId"] = json!(user_id);
    }
    if let Some(memory_id) = &args.memory_id {
        body["memoryId"] = json!(memory_id);
    }
    if let Some(session_id) = &args.session_id {
        body["sessionId"] = json!(session_id);
    }
    Ok(body)
}

pub async fn run(api_url: &str, args: AnalyzeArgs, raw: bool) -> i32 {
    let body = match build_request(&args) {
        Ok(body) => body,
        Err(e) => exit_error(&e, Some("Pass context as --context key=value")),
    };
    api_request(api_url, reqwest::Method::POST, "/a2a/analyze", Some(body), raw).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(context: &[&str]) -> AnalyzeArgs {
        AnalyzeArgs {
            prompt: "Analyze canary".to_string(),
            context: context.iter().map(|s| s.to_string()).collect(),
            user_id: None,
            memory_id: Some("m1".to_string()),
            session_id: None,
        }
    }

    #[test]
    fn request_uses_wire_field_names() {
        let body = build_request(&args(&["namespace=shop", "replicas=3"])).unwrap();
        assert_eq!(
            body,
            json!({
                "prompt": "Analyze canary",
                "context": {"namespace": "shop", "replicas": 3},
                "memoryId": "m1"
            })
        );
    }

    #[test]
    fn bad_context_entry_is_rejected() {
        assert!(build_request(&args(&["namespace"])).is_err());
    }
}
