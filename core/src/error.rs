use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Malformed file '{name}': {reason}")]
    MalformedFile { name: String, reason: String },

    #[error("Refusing to overwrite existing object '{name}' (overwrite not requested)")]
    WriteConflict { name: String },

    #[error("Could not mint a fresh entity key after {attempts} attempts; key space too small")]
    KeySpaceExhausted { attempts: u32 },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;
