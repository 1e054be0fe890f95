use thiserror::Error;

#[derive(Error, Debug)]
pub enum KwachaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Malformed extraction: {0}")]
    Extraction(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Directory refresh failed: {0}")]
    Directory(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KwachaError>;
