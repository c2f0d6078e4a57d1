use serde::Deserialize;

/// A capability a backend model advertises. Drives `/v1/models` filtering
/// and route dispatch in the gateway binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    #[serde(alias = "chat")]
    ChatBase,
    #[serde(alias = "embeddings")]
    EmbeddingsBase,
    #[serde(alias = "audio")]
    AudioTranscription,
    Vision,
}

/// Which prompt-serialization family a chat model expects. Drives dispatch
/// in the gateway binary's chat handler; meaningless for embeddings/audio
/// models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptFamily {
    #[default]
    Llama3,
    HomeMadeAgent,
    OpenAiCompatible,
}

/// In-memory model descriptor, populated from the `models.<name>` YAML
/// section at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDescriptor {
    pub host: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub family: PromptFamily,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

impl ModelDescriptor {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}
