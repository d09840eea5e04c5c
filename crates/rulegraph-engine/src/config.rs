use serde::{Deserialize, Serialize};

use crate::block::Position;
use crate::error::EngineError;

/// Editor-session configuration.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Identifier the emitted script binds the host context to.
    pub context_identifier: String,
    /// Expression that produces the host context at script start.
    pub context_import: String,
    /// Offset applied to a block severed from an invalid connection, relative
    /// to the root of its former parent.
    pub bump_offset: Position,
    /// One level of indentation in emitted statement bodies.
    pub indent: String,
    /// Upper bound on propagation rounds per mutation cycle.
    pub max_propagation_rounds: usize,
    /// Place one getter per protected variable on an empty canvas.
    pub seed_getters: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            context_identifier: "ctx".to_string(),
            context_import: "host.context()".to_string(),
            bump_offset: Position { x: 25, y: 25 },
            indent: "  ".to_string(),
            max_propagation_rounds: 16,
            seed_getters: true,
        }
    }
}

impl EditorConfig {
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text).map_err(EngineError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{"context_identifier": "lumen", "bump_offset": {"x": 40, "y": 0}}"#).unwrap();
        assert_eq!(config.context_identifier, "lumen");
        assert_eq!(config.bump_offset, Position { x: 40, y: 0 });
        assert_eq!(config.indent, "  ");
        assert_eq!(config.max_propagation_rounds, 16);
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(
            EditorConfig::from_json("{nope"),
            Err(EngineError::Config(_))
        ));
    }
}
