use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The host asked for something the master block type does not allow.
    /// This is a programming error on the host side, not an editing state.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("invalid catalog json: {0}")]
    Json(#[from] serde_json::Error),
}
