use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErgonError {
    #[error("API key not configured. Set GOOGLE_API_KEY (or GEMINI_API_KEY) or run: ergon config set googleApiKey <your-key>")]
    MissingApiKey,

    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("Invalid {name} '{value}'. Valid values: {expected}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        expected: String,
    },

    #[error("API error: {message}")]
    Api {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not find a free file name after {attempts} attempts; every candidate already exists")]
    PathExhausted { attempts: u32 },

    #[error("Preset '{0}' is built-in and cannot be modified or deleted")]
    PresetReadOnly(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Audio encoding error: {0}")]
    Audio(String),

    #[error("Image processing error: {0}")]
    Image(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl ErgonError {
    pub fn invalid(name: &'static str, value: impl Into<String>, expected: impl Into<String>) -> Self {
        ErgonError::InvalidParameter {
            name,
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Short machine-readable code for the JSON error envelope
    pub fn code(&self) -> &'static str {
        match self {
            ErgonError::MissingApiKey => "MISSING_API_KEY",
            ErgonError::InvalidApiKey(_) => "INVALID_API_KEY",
            ErgonError::InvalidParameter { .. } => "INVALID_PARAMETER",
            ErgonError::Api { .. } => "API_ERROR",
            ErgonError::InvalidResponse(_) => "INVALID_RESPONSE",
            ErgonError::GenerationFailed(_) => "GENERATION_FAILED",
            ErgonError::Io(_) => "IO_ERROR",
            ErgonError::PathExhausted { .. } => "PATH_EXHAUSTED",
            ErgonError::PresetReadOnly(_) => "PRESET_READ_ONLY",
            ErgonError::PresetNotFound(_) => "PRESET_NOT_FOUND",
            ErgonError::Audio(_) => "AUDIO_ERROR",
            ErgonError::Image(_) => "IMAGE_ERROR",
            ErgonError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<reqwest::Error> for ErgonError {
    fn from(err: reqwest::Error) -> Self {
        ErgonError::Api {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ErgonError {
    fn from(err: serde_json::Error) -> Self {
        ErgonError::InvalidResponse(err.to_string())
    }
}
