//! Error taxonomy shared by the recorder, the replay executor and the
//! macro repository.

use crate::model::Locator;
use thiserror::Error;
use uuid::Uuid;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, MacroError>;

#[derive(Error, Debug)]
pub enum MacroError {
    /// The capture listener went away mid-recording; the partial session is discarded.
    #[error("capture listener disconnected: {0}")]
    Capture(String),

    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("no recording session is active")]
    NotRecording,

    #[error("recording captured no steps")]
    EmptyMacro,

    #[error("a replay is already running")]
    AlreadyRunning,

    #[error("no unique element matched [{}] after {attempts} attempt(s)", format_candidates(.candidates))]
    LocatorNotFound {
        candidates: Vec<Locator>,
        attempts: u32,
    },

    #[error("option '{option}' is not offered by the target (available: {available:?})")]
    OptionNotFound {
        option: String,
        available: Vec<String>,
    },

    #[error("element reference is stale")]
    StaleReference,

    #[error("target element is disabled")]
    ElementDisabled,

    #[error("a macro named '{0}' already exists")]
    DuplicateName(String),

    #[error("a macro with id {0} is already stored")]
    DuplicateId(Uuid),

    #[error("macro not found: {0}")]
    NotFound(String),

    #[error("browser session lost: {0}")]
    DriverSession(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("invalid macro: {0}")]
    InvalidMacro(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage format error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MacroError {
    /// Errors the locator resolver may retry inside its backoff window
    pub fn is_transient(&self) -> bool {
        matches!(self, MacroError::StaleReference | MacroError::Driver(_))
    }

    /// Errors reported as a locator failure at replay time
    pub fn is_locator_failure(&self) -> bool {
        matches!(
            self,
            MacroError::LocatorNotFound { .. } | MacroError::OptionNotFound { .. }
        )
    }
}

fn format_candidates(candidates: &[Locator]) -> String {
    candidates
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_not_found_lists_candidates() {
        let err = MacroError::LocatorNotFound {
            candidates: vec![
                Locator::Id("login".to_string()),
                Locator::Text("Sign in".to_string()),
            ],
            attempts: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("id=\"login\""));
        assert!(msg.contains("text=\"Sign in\""));
        assert!(msg.contains("5 attempt"));
        assert!(err.is_locator_failure());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(MacroError::StaleReference.is_transient());
        assert!(MacroError::Driver("timeout".into()).is_transient());
        assert!(!MacroError::DriverSession("closed".into()).is_transient());
    }
}
