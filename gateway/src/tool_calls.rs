//! Post-completion tool-call extraction: scans generated text for balanced
//! JSON objects (brace nesting depth <= 2) carrying both a `name` and an
//! `arguments` key, and builds `{type:"function", function:{name,arguments}}`
//! entries from each match.

use serde_json::Value;
use uuid::Uuid;

use crate::openai::{ToolCall, ToolCallFunction};

/// Finds every substring of `text` that is a syntactically balanced JSON
/// object nested no deeper than two levels of `{`. Returns the raw slices
/// in order of appearance.
fn balanced_json_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            let mut depth = 0i32;
            let mut max_depth = 0i32;
            let mut j = i;
            let mut in_string = false;
            let mut escaped = false;
            let mut closed_at = None;
            while j < bytes.len() {
                let c = bytes[j];
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if c == b'\\' {
                        escaped = true;
                    } else if c == b'"' {
                        in_string = false;
                    }
                } else {
                    match c {
                        b'"' => in_string = true,
                        b'{' => {
                            depth += 1;
                            max_depth = max_depth.max(depth);
                        }
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                closed_at = Some(j);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                j += 1;
            }
            if let Some(end) = closed_at {
                if max_depth <= 2 {
                    found.push(&text[i..=end]);
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    found
}

/// Extracts tool calls from completion text. When `parallel_tool_calls` is
/// false, only the first match is kept.
pub fn extract(text: &str, parallel_tool_calls: bool) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for candidate in balanced_json_objects(text) {
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        let Some(name) = value.get("name").and_then(|n| n.as_str()) else {
            continue;
        };
        let Some(arguments) = value.get("arguments") else {
            continue;
        };
        let arguments_str = if arguments.is_string() {
            arguments.as_str().unwrap().to_string()
        } else {
            serde_json::to_string(arguments).unwrap_or_default()
        };
        calls.push(ToolCall {
            id: format!("call_{}", Uuid::new_v4().simple()),
            kind: "function",
            function: ToolCallFunction {
                name: name.to_string(),
                arguments: arguments_str,
            },
        });
        if !parallel_tool_calls {
            break;
        }
    }
    calls
}

/// Extracts tool calls from TRT-LLM/OpenAI-compatible channel-tagged output:
/// `<|channel|>commentary to=NAME <|constrain|>json<|message|>ARGS<|call|>`.
/// Unlike [`extract`], arguments are the raw text between the tags, not
/// re-serialized JSON — the upstream already emits them as a JSON string.
pub fn extract_channel_tagged(text: &str, parallel_tool_calls: bool) -> Vec<ToolCall> {
    const BEGIN: &str = "<|channel|>commentary to=";
    const MID: &str = " <|constrain|>json<|message|>";
    const END: &str = "<|call|>";

    let mut calls = Vec::new();
    let mut cursor = 0usize;
    while let Some(begin_rel) = text[cursor..].find(BEGIN) {
        let name_start = cursor + begin_rel + BEGIN.len();
        let Some(mid_rel) = text[name_start..].find(MID) else {
            break;
        };
        let name = text[name_start..name_start + mid_rel].trim();
        let args_start = name_start + mid_rel + MID.len();
        let Some(end_rel) = text[args_start..].find(END) else {
            break;
        };
        let arguments = text[args_start..args_start + end_rel].to_string();

        calls.push(ToolCall {
            id: format!("call_{}", Uuid::new_v4().simple()),
            kind: "function",
            function: ToolCallFunction {
                name: name.to_string(),
                arguments,
            },
        });

        cursor = args_start + end_rel + END.len();
        if !parallel_tool_calls {
            break;
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_channel_tagged_call() {
        let text = "preamble <|channel|>commentary to=get_weather <|constrain|>json<|message|>{\"city\":\"Paris\"}<|call|>";
        let calls = extract_channel_tagged(text, true);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_weather");
        assert!(calls[0].function.arguments.contains("Paris"));
    }

    #[test]
    fn channel_tagged_stops_after_first_when_not_parallel() {
        let text = "<|channel|>commentary to=a <|constrain|>json<|message|>{}<|call|> and <|channel|>commentary to=b <|constrain|>json<|message|>{}<|call|>";
        let calls = extract_channel_tagged(text, false);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "a");
    }

    #[test]
    fn extracts_single_tool_call() {
        let text = r#"Sure. {"name":"get_weather","arguments":{"city":"Paris"}}"#;
        let calls = extract(text, true);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_weather");
        assert!(calls[0].function.arguments.contains("Paris"));
    }

    #[test]
    fn ignores_objects_missing_required_keys() {
        let text = r#"{"foo": "bar"} plain text {"name": "x"}"#;
        assert!(extract(text, true).is_empty());
    }

    #[test]
    fn keeps_only_first_when_parallel_disabled() {
        let text = r#"{"name":"a","arguments":{}} and {"name":"b","arguments":{}}"#;
        let calls = extract(text, false);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "a");
    }

    #[test]
    fn depth_beyond_two_is_rejected() {
        let text = r#"{"name":"a","arguments":{"nested":{"deeper":{"x":1}}}}"#;
        assert!(extract(text, true).is_empty());
    }

    #[test]
    fn no_tool_calls_in_plain_prose() {
        let text = "The weather in Paris is sunny today.";
        assert!(extract(text, true).is_empty());
    }
}
