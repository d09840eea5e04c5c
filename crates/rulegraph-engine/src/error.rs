use rulegraph_catalog::CatalogError;
use thiserror::Error;

use crate::block::BlockId;

/// Errors that escape the engine.
///
/// Stale references and invalid connection attempts are not here on purpose:
/// propagation heals them in place and the host never sees them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The host asked for a capability the master block type does not allow.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The graph emits no operations; nothing to save or dry-run.
    #[error("nothing to run: the graph emits no operations")]
    EmptyScript,

    #[error("unknown block type `{0}`")]
    UnknownBlockType(String),

    #[error("no block {0} in the graph")]
    UnknownBlock(BlockId),

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("field edit `{edit}` does not apply to a `{block_type}` block")]
    FieldMismatch { edit: String, block_type: String },

    #[error(transparent)]
    Diagram(#[from] DiagramError),

    #[error("invalid catalog: {0}")]
    Catalog(#[source] CatalogError),

    #[error("invalid editor config: {0}")]
    Config(#[source] serde_json::Error),
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnsupportedConfiguration(msg) => EngineError::UnsupportedConfiguration(msg),
            other => EngineError::Catalog(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("malformed diagram xml at byte {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("diagram root must be <xml>, found <{0}>")]
    UnexpectedRoot(String),

    #[error("diagram is empty")]
    Empty,
}
