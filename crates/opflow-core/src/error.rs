/// Store-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("flow not found: {0}")]
    FlowNotFound(String),

    #[error("record already exists: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
