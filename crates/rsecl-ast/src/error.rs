use thiserror::Error;

/// Errors raised while exchanging syntax trees with an external parser.
#[derive(Debug, Error)]
pub enum AstError {
    #[error("invalid syntax tree JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AstError>;
