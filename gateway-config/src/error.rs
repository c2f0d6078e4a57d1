#[derive(Debug)]
pub enum ConfigError {
    Load(String),
    Parse(String),
    ModelNotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "failed to load config: {msg}"),
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {msg}"),
            ConfigError::ModelNotFound(name) => write!(f, "unknown model: {name}"),
        }
    }
}

impl std::error::Error for ConfigError {}
