//! Screen document — the screen id and the triggers attached to it.

use std::path::Path;

use serde::Deserialize;

use screenstate_domain::id::ScreenId;
use screenstate_domain::trigger::Trigger;

#[derive(Debug, Deserialize)]
pub struct ScreenDocument {
    pub screen_id: ScreenId,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

impl ScreenDocument {
    /// Read a JSON screen document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid document.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a JSON screen document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if `content` does not describe a document.
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Screen document errors.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read screen document")]
    Io(#[from] std::io::Error),
    #[error("malformed screen document")]
    Json(#[from] serde_json::Error),
}
