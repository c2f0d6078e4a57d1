//! "Home-made agent" family serialization: a plain `{"messages": [...]}`
//! JSON object, no Llama-3 token scaffolding and no tool preamble.

use serde_json::json;

use crate::openai::ChatMessage;

pub fn serialize(messages: &[ChatMessage]) -> String {
    let formatted: Vec<_> = messages
        .iter()
        .map(|m| {
            let content = m.content.as_ref().map(|c| c.as_text()).unwrap_or_default();
            json!({ "role": m.role, "content": content })
        })
        .collect();
    serde_json::to_string(&json!({ "messages": formatted })).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::MessageContent;

    #[test]
    fn serializes_plain_message_list() {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: Some(MessageContent::Text("hello".to_string())),
        }];
        let out = serialize(&messages);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["messages"][0]["role"], "user");
        assert_eq!(parsed["messages"][0]["content"], "hello");
    }
}
