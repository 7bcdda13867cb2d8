use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColligoError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(u64),

    #[error("Image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ColligoError>;
