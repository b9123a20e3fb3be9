use serde_json::{Map, Value};

const TOOL_GUIDANCE: &str = "\nYou have access to Kubernetes tools. Use them to gather information:\n\
1. Use get_pod_logs to fetch pod logs for analysis\n\
2. Use get_kubernetes_events to see recent events\n\
3. Use debug_kubernetes_pod to check pod status\n\
4. Use get_pod_metrics and inspect_kubernetes_resources for resource usage and configuration\n\
5. Compare stable vs canary pod behavior\n";

const RESPONSE_GUIDANCE: &str = "\nProvide a structured response with:\n\
- analysis: Detailed analysis text\n\
- rootCause: Identified root cause, under a \"## Root Cause\" heading\n\
- remediation: Suggested remediation steps, under a \"## Remediation\" heading\n\
- prLink: GitHub PR link if applicable (can be null)\n\
- promote: true to promote canary, false to abort (say \"Do not promote\" explicitly)\n\
- confidence: Confidence level 0-100\n";

/// Assemble the prompt sent to the reasoning engine.
pub fn build_prompt(content: &str, context: Option<&Map<String, Value>>) -> String {
    let mut prompt = String::with_capacity(content.len() + 1024);
    prompt.push_str(content);
    prompt.push_str("\n\n");

    if let Some(context) = context {
        prompt.push_str("Context:\n");
        for (key, value) in context {
            let rendered = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            prompt.push_str("- ");
            prompt.push_str(key);
            prompt.push_str(": ");
            prompt.push_str(&rendered);
            prompt.push('\n');
        }
    }

    prompt.push_str(TOOL_GUIDANCE);
    prompt.push_str(RESPONSE_GUIDANCE);
    prompt
}
