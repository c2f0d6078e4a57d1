//! Forwarding path for models whose family is `PromptFamily::OpenAiCompatible`:
//! these deployments already speak the OpenAI chat-completions wire format
//! over plain HTTP, so instead of the Triton tensor protocol this path goes
//! out over `reqwest` to `http://{host}:{port}/v1/chat/completions`.
//!
//! A system/developer preamble is still injected ahead of the caller's
//! messages: a short channel directive plus, when tools are present, their
//! signatures rendered as TypeScript-like call shapes. The upstream echoes
//! tool invocations back as `<|channel|>commentary to=NAME ...<|call|>`
//! markers in its own completion text, which [`crate::tool_calls::extract_channel_tagged`]
//! picks apart on the way out.

use futures_util::{stream, Stream, StreamExt};
use gateway_config::ModelDescriptor;
use gateway_core::AppError;
use serde_json::{json, Value};

use crate::openai::{ChatCompletionRequest, Tool};

fn tool_channel_note(tools: &[Tool]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let mut note = String::from("Calls to these tools must go to commentary channel, for example:\n");
    for tool in tools {
        note.push_str(&format!("    commentary to={}\n", tool.function.name));
    }
    note
}

fn tool_signatures(tools: &[Tool]) -> String {
    let mut out = String::new();
    for tool in tools {
        let f = &tool.function;
        out.push_str(&format!("// {}\n", f.description.as_deref().unwrap_or("")));

        let props = f.parameters.get("properties").and_then(|p| p.as_object());
        match props {
            Some(props) if !props.is_empty() => {
                out.push_str(&format!("{} = (_: {{\n", f.name));
                for (key, value) in props {
                    let prop_type = value
                        .get("enum")
                        .and_then(|e| e.as_array())
                        .map(|vals| {
                            vals.iter()
                                .map(|v| v.to_string())
                                .collect::<Vec<_>>()
                                .join(" | ")
                        })
                        .or_else(|| value.get("type").and_then(|t| t.as_str()).map(String::from))
                        .unwrap_or_else(|| "any".to_string());
                    let desc = value.get("description").and_then(|d| d.as_str()).unwrap_or("");
                    out.push_str(&format!("    {key}: {prop_type}, // {desc}\n"));
                }
                out.push_str("}) => any;\n\n");
            }
            _ => out.push_str(&format!("{} = () => any;\n\n", f.name)),
        }
    }
    out
}

fn system_prompt(tools: &[Tool]) -> String {
    format!(
        "You are a helpful assistant. Current date and time: {}\n\n\
         Reasoning: medium\n\n\
         # Valid channels: analysis, commentary, final. Channel must be included for every message.\n{}",
        chrono::Utc::now().to_rfc3339(),
        tool_channel_note(tools),
    )
}

fn developer_prompt(instructions: &str, tools: &[Tool]) -> String {
    format!("# Instructions\n\n{instructions}\n\n# Tools\n\n{}", tool_signatures(tools))
}

fn build_body(model_name: &str, req: &ChatCompletionRequest) -> Value {
    let tools = req.tools.as_deref().unwrap_or(&[]);
    let instructions = req
        .messages
        .iter()
        .find(|m| m.role == "system")
        .and_then(|m| m.content.as_ref())
        .map(|c| c.as_text())
        .unwrap_or_default();

    let mut messages = vec![
        json!({"role": "system", "content": system_prompt(tools)}),
        json!({"role": "developer", "content": developer_prompt(&instructions, tools)}),
    ];
    for m in &req.messages {
        if m.role == "system" {
            continue;
        }
        messages.push(json!({
            "role": m.role,
            "content": m.content.as_ref().map(|c| c.as_text()).unwrap_or_default(),
        }));
    }

    let mut body = json!({
        "model": model_name,
        "messages": messages,
        "max_tokens": req.max_tokens,
        "top_p": req.top_p,
        "temperature": req.temperature,
        "stream": req.stream,
    });
    if let Some(stop) = &req.stop {
        body["stop"] = json!(stop);
    }
    if let Some(rf) = &req.response_format {
        body["response_format"] = json!({"type": rf.kind});
    }
    body
}

/// Posts the forwarded request and returns the raw response for the caller
/// to either collect (non-streaming) or drive as an event stream.
pub async fn send(
    client: &reqwest::Client,
    model: &ModelDescriptor,
    model_name: &str,
    req: &ChatCompletionRequest,
) -> Result<reqwest::Response, AppError> {
    let url = format!("http://{}/v1/chat/completions", model.endpoint());
    let body = build_body(model_name, req);
    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("upstream request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Internal(format!(
            "upstream returned {status}: {body}"
        )));
    }
    Ok(response)
}

/// Parses a non-streaming chat-completions response body into the
/// generated text and, when present, the prompt token count the upstream
/// reported (its own completion-token count is recomputed locally so usage
/// accounting stays uniform across dispatch families).
pub async fn collect_aggregated(response: reqwest::Response) -> Result<(String, Option<i64>), AppError> {
    let body: Value = response
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("invalid upstream response body: {e}")))?;

    let text = body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let prompt_tokens = body["usage"]["prompt_tokens"].as_i64();
    Ok((text, prompt_tokens))
}

/// Turns a streaming response into a stream of incremental text deltas,
/// unwrapping the upstream's own `data: {...}` SSE framing and stopping at
/// its `[DONE]` sentinel.
pub fn stream_deltas(
    response: reqwest::Response,
) -> impl Stream<Item = Result<String, AppError>> {
    let body = response.bytes_stream();
    stream::unfold((body, String::new()), |(mut body, mut buf)| async move {
        loop {
            if let Some(pos) = buf.find("\n\n") {
                let event = buf[..pos].to_string();
                buf.drain(..=pos + 1);

                let Some(data) = event.lines().find_map(|line| line.strip_prefix("data:")) else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    return None;
                }
                let Ok(value) = serde_json::from_str::<Value>(data) else {
                    continue;
                };
                let delta = value["choices"][0]["delta"]["content"]
                    .as_str()
                    .map(|s| s.to_string());
                if let Some(text) = delta {
                    return Some((Ok(text), (body, buf)));
                }
                continue;
            }

            match body.next().await {
                Some(Ok(bytes)) => buf.push_str(&String::from_utf8_lossy(&bytes)),
                Some(Err(e)) => {
                    return Some((
                        Err(AppError::Internal(format!("upstream stream error: {e}"))),
                        (body, buf),
                    ))
                }
                None => return None,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::{ChatMessage, FunctionDef, MessageContent};

    fn tool(name: &str) -> Tool {
        Tool {
            kind: "function".to_string(),
            function: FunctionDef {
                name: name.to_string(),
                description: Some("does a thing".to_string()),
                parameters: json!({
                    "properties": {"city": {"type": "string", "description": "city name"}},
                }),
            },
        }
    }

    #[test]
    fn signatures_render_typescript_like_shape() {
        let rendered = tool_signatures(std::slice::from_ref(&tool("get_weather")));
        assert!(rendered.contains("get_weather = (_: {"));
        assert!(rendered.contains("city: string, // city name"));
    }

    #[test]
    fn no_tools_means_empty_signatures_and_channel_note() {
        assert!(tool_signatures(&[]).is_empty());
        assert!(tool_channel_note(&[]).is_empty());
    }

    #[test]
    fn build_body_carries_sampling_params_and_injects_preamble() {
        let req = ChatCompletionRequest {
            model: "trtllm/demo".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(MessageContent::Text("hi".to_string())),
            }],
            tools: None,
            parallel_tool_calls: true,
            response_format: None,
            stop: None,
            n: 1,
            stream: false,
            max_tokens: 256,
            top_p: 0.9,
            temperature: 0.5,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            seed: None,
        };
        let body = build_body("demo", &req);
        assert_eq!(body["model"], "demo");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "developer");
        assert_eq!(body["messages"][2]["role"], "user");
        assert_eq!(body["max_tokens"], 256);
    }
}
