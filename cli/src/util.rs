use serde_json::{Value, json};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CLIENT_ERROR: i32 = 1;
pub const EXIT_SERVER_ERROR: i32 = 2;
pub const EXIT_CONNECTION_ERROR: i32 = 3;
pub const EXIT_USAGE_ERROR: i32 = 4;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", pretty(&err));
    std::process::exit(EXIT_USAGE_ERROR);
}

/// Parse a repeatable `key=value` flag. Values that parse as JSON keep their
/// type (`replicas=3` is a number); everything else is a string.
pub fn parse_key_value(input: &str) -> Result<(String, Value), String> {
    let (key, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("Expected key=value, got '{input}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Empty key in '{input}'"));
    }
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(raw.to_string()),
    };
    Ok((key.to_string(), value))
}

pub fn exit_code_for_status(status: u16) -> i32 {
    match status {
        200..=299 => EXIT_SUCCESS,
        400..=499 => EXIT_CLIENT_ERROR,
        _ => EXIT_SERVER_ERROR,
    }
}

/// Send a request to the agent and return `(status, body)`.
///
/// Connection and URL problems are printed and turned into an exit code.
pub async fn send_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<(u16, Value), i32> {
    let url = match reqwest::Url::parse(&format!("{}{path}", api_url.trim_end_matches('/'))) {
        Ok(u) => u,
        Err(e) => {
            let err = json!({
                "error": "cli_error",
                "message": format!("Invalid URL: {api_url}{path}: {e}")
            });
            eprintln!("{}", pretty(&err));
            return Err(EXIT_USAGE_ERROR);
        }
    };

    let mut req = client().request(method, url);
    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            let err = json!({
                "error": "connection_error",
                "message": format!("{e}"),
                "docs_hint": "Is the agent running? Check ROLLOUT_API_URL."
            });
            eprintln!("{}", pretty(&err));
            return Err(EXIT_CONNECTION_ERROR);
        }
    };

    let status = resp.status().as_u16();
    let resp_body: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => json!({"raw_error": format!("Failed to parse response as JSON: {e}")}),
    };
    Ok((status, resp_body))
}

/// Print a response to stdout on success, stderr otherwise.
pub fn print_response(exit_code: i32, body: &Value, raw: bool) {
    let formatted = if raw {
        body.to_string()
    } else {
        pretty(body)
    };
    if exit_code == EXIT_SUCCESS {
        println!("{formatted}");
    } else {
        eprintln!("{formatted}");
    }
}

/// Execute a request, print the response, exit with a structured code.
///
/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub async fn api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
    raw: bool,
) -> i32 {
    match send_request(api_url, method, path, body).await {
        Ok((status, body)) => {
            let exit_code = exit_code_for_status(status);
            print_response(exit_code, &body, raw);
            exit_code
        }
        Err(code) => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_keeps_scalar_types() {
        assert_eq!(
            parse_key_value("namespace=shop").unwrap(),
            ("namespace".to_string(), json!("shop"))
        );
        assert_eq!(
            parse_key_value("replicas=3").unwrap(),
            ("replicas".to_string(), json!(3))
        );
        assert_eq!(
            parse_key_value("paused=false").unwrap(),
            ("paused".to_string(), json!(false))
        );
        assert_eq!(
            parse_key_value("selector=app=web").unwrap(),
            ("selector".to_string(), json!("app=web"))
        );
    }

    #[test]
    fn key_value_rejects_malformed_input() {
        assert!(parse_key_value("namespace").is_err());
        assert!(parse_key_value("=shop").is_err());
    }

    #[test]
    fn status_codes_map_to_exit_codes() {
        assert_eq!(exit_code_for_status(200), EXIT_SUCCESS);
        assert_eq!(exit_code_for_status(202), EXIT_SUCCESS);
        assert_eq!(exit_code_for_status(404), EXIT_CLIENT_ERROR);
        assert_eq!(exit_code_for_status(500), EXIT_SERVER_ERROR);
    }
}
