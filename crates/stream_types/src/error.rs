use thiserror::Error;

/// Errors raised while loading or validating a device profile.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Invalid device profile '{device}': {message}")]
    Invalid { device: String, message: String },

    #[error("Invalid field type '{0}', expected 'uint:<bits>' or 'int:<bits>'")]
    BadFieldType(String),

    #[error("Unsupported profile file extension: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type ProfileResult<T> = Result<T, ProfileError>;
