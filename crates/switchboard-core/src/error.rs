use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwitchboardError {
    // Generation errors
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Generation process exited with status {code}: {stderr}")]
    GenerationExit { code: i32, stderr: String },

    #[error("Generation provider not supported: {0}")]
    UnsupportedProvider(String),

    // Specialist errors
    #[error("Specialist not registered: {0}")]
    UnknownSpecialist(String),

    #[error("Specialist {specialist} has no endpoint configured")]
    MissingEndpoint { specialist: String },

    // Session errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SwitchboardError>;
