//! Llama-3 role-delimited prompt serialization, carried over verbatim in
//! intent from the token format and tool-preamble text this gateway's
//! upstream Llama-3 deployments expect: `<|begin_of_text|>`, a header per
//! role, `<|eot_id|>` closing every turn, and a final open assistant header
//! the model continues from.

use crate::openai::{ChatMessage, ResponseFormat, Tool};

const BEGIN_OF_TEXT: &str = "<|begin_of_text|>";
const START_HEADER: &str = "<|start_header_id|>";
const END_HEADER: &str = "<|end_header_id|>";
const END_OF_TURN: &str = "<|eot_id|>";

fn format_tools(tools: &[Tool]) -> String {
    tools
        .iter()
        .map(|tool| {
            let f = &tool.function;
            let mut s = format!("Tool: {}\n", f.name);
            if let Some(desc) = &f.description {
                s.push_str(&format!("Description: {desc}\n"));
            }
            if let Some(props) = f.parameters.get("properties").and_then(|p| p.as_object()) {
                let required: Vec<&str> = f
                    .parameters
                    .get("required")
                    .and_then(|r| r.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
                    .unwrap_or_default();
                s.push_str("Parameters:\n");
                for (name, details) in props {
                    let param_type = details.get("type").and_then(|t| t.as_str()).unwrap_or("unknown");
                    let param_desc = details.get("description").and_then(|t| t.as_str()).unwrap_or("");
                    let status = if required.contains(&name.as_str()) { "required" } else { "optional" };
                    s.push_str(&format!("  - {name} ({param_type}, {status}): {param_desc}\n"));
                    if let Some(enum_values) = details.get("enum").and_then(|e| e.as_array()) {
                        let joined = enum_values
                            .iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            .join(", ");
                        s.push_str(&format!("    Allowed values: [{joined}]\n"));
                    }
                }
            }
            s
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tool_instructions(tools: &[Tool], parallel_tool_calls: bool) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let tool_string = format_tools(tools);
    let parallel_note = if parallel_tool_calls {
        "\n\nYou can call multiple tools in parallel. "
    } else {
        "\n\nYou can call one tool at a time. "
    };
    format!(
        "\n\nYou have access to the following tools:\n\n{tool_string}\n\nTo use a tool, respond with a message containing a valid JSON object with these required attributes:\n- \"name\": the exact function name to call\n- \"arguments\": an object containing all required parameters for the function\n\nExample format:\n```json\n{{\n  \"name\": \"tool_name\",\n  \"arguments\": {{\n    \"param1\": \"value1\",\n    \"param2\": \"value2\"\n  }}\n}}\n```{parallel_note}"
    )
}

fn format_instructions(response_format: Option<&ResponseFormat>) -> String {
    match response_format {
        Some(rf) if rf.kind == "json_object" => {
            let mut s = "You must respond in JSON format. ".to_string();
            if let Some(schema) = &rf.json_schema {
                let schema_str = serde_json::to_string_pretty(schema).unwrap_or_default();
                s.push_str(&format!("The JSON should follow this schema:\n{schema_str}"));
            } else {
                s.push_str("The response should be valid JSON.");
            }
            s
        }
        _ => String::new(),
    }
}

fn format_system_message(system_content: Option<&str>, tool_instr: &str, format_instr: &str) -> String {
    let base = system_content.unwrap_or("You are a helpful, harmless, and precise assistant.");
    if !tool_instr.is_empty() && !format_instr.is_empty() {
        format!("{tool_instr}\n{format_instr}\n\n{base}")
    } else {
        format!("{tool_instr}{format_instr}\n\n{base}")
    }
}

/// Serializes a chat request into the Llama-3 token format. Returns the
/// full prompt ready for `text_input`; when `response_format` requests a
/// JSON object, the assistant scaffold is left open at `{"name":` so the
/// model continues the structure rather than starting fresh.
pub fn serialize(
    messages: &[ChatMessage],
    tools: &[Tool],
    parallel_tool_calls: bool,
    response_format: Option<&ResponseFormat>,
) -> String {
    let mut out = format!("{BEGIN_OF_TEXT}\n");

    let tool_instr = tool_instructions(tools, parallel_tool_calls);
    let format_instr = format_instructions(response_format);

    let system_content = messages
        .iter()
        .find(|m| m.role == "system")
        .and_then(|m| m.content.as_ref())
        .map(|c| c.as_text());
    out.push_str(&format!(
        "{START_HEADER}system{END_HEADER}\n{}\n{END_OF_TURN}\n",
        format_system_message(system_content.as_deref(), &tool_instr, &format_instr)
    ));

    let mut seen_system = false;
    for message in messages {
        if message.role == "system" {
            if seen_system {
                continue;
            }
            seen_system = true;
            continue;
        }
        out.push_str(&format!("{START_HEADER}{}{END_HEADER}\n", message.role));
        let content = message.content.as_ref().map(|c| c.as_text()).unwrap_or_default();
        if content.is_empty() {
            out.push_str(&format!("{END_OF_TURN}\n"));
        } else {
            out.push_str(&format!("{content}\n{END_OF_TURN}\n"));
        }
    }

    out.push_str(&format!("{START_HEADER}assistant{END_HEADER}\n"));
    if matches!(response_format, Some(rf) if rf.kind == "json_object") {
        out.push_str("{\n\"name\":");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::MessageContent;

    fn msg(role: &str, text: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: Some(MessageContent::Text(text.to_string())),
        }
    }

    #[test]
    fn wraps_begin_and_end_markers() {
        let prompt = serialize(&[msg("user", "hi")], &[], true, None);
        assert!(prompt.starts_with(BEGIN_OF_TEXT));
        assert!(prompt.contains("<|start_header_id|>user<|end_header_id|>"));
        assert!(prompt.contains("hi\n<|eot_id|>"));
        assert!(prompt.ends_with("<|start_header_id|>assistant<|end_header_id|>\n"));
    }

    #[test]
    fn default_system_message_used_when_absent() {
        let prompt = serialize(&[msg("user", "hi")], &[], true, None);
        assert!(prompt.contains("You are a helpful, harmless, and precise assistant."));
    }

    #[test]
    fn json_response_format_opens_assistant_scaffold() {
        let rf = ResponseFormat {
            kind: "json_object".to_string(),
            json_schema: None,
        };
        let prompt = serialize(&[msg("user", "hi")], &[], true, Some(&rf));
        assert!(prompt.ends_with("{\n\"name\":"));
        assert!(prompt.contains("You must respond in JSON format."));
    }
}
