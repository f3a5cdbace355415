//! Raw interaction events and the listener seam that produces them

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What the page tells us about the element an event fired on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementDescriptor {
    pub id: Option<String>,
    pub css_path: Option<String>,
    pub text: Option<String>,
    /// Lowercase tag name
    pub tag: Option<String>,
    /// `type` attribute for inputs
    pub input_type: Option<String>,
}

impl ElementDescriptor {
    /// Whether two descriptors denote the same element
    pub fn same_element(&self, other: &ElementDescriptor) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) if !a.is_empty() => a == b,
            _ => self.css_path.is_some() && self.css_path == other.css_path,
        }
    }

    pub fn is_select(&self) -> bool {
        self.tag.as_deref() == Some("select")
    }

    pub fn is_checkable(&self) -> bool {
        matches!(self.input_type.as_deref(), Some("checkbox") | Some("radio"))
    }

    /// Whether typing into the element edits a text value
    pub fn is_text_entry(&self) -> bool {
        if self.is_select() || self.is_checkable() || self.tag.as_deref() == Some("button") {
            return false;
        }
        !matches!(
            self.input_type.as_deref(),
            Some("button" | "submit" | "reset" | "image" | "file")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawEventKind {
    Click,
    Change,
    Keyup,
    /// Focus left the element
    Blur,
}

/// One interaction event as reported by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub kind: RawEventKind,
    pub target: ElementDescriptor,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub checked: Option<bool>,
}

impl RawEvent {
    pub fn click(target: ElementDescriptor) -> Self {
        Self {
            kind: RawEventKind::Click,
            target,
            value: None,
            checked: None,
        }
    }

    pub fn change(target: ElementDescriptor, value: impl Into<String>) -> Self {
        Self {
            kind: RawEventKind::Change,
            target,
            value: Some(value.into()),
            checked: None,
        }
    }

    pub fn keyup(target: ElementDescriptor, value: impl Into<String>) -> Self {
        Self {
            kind: RawEventKind::Keyup,
            target,
            value: Some(value.into()),
            checked: None,
        }
    }

    pub fn toggle(target: ElementDescriptor, checked: bool) -> Self {
        Self {
            kind: RawEventKind::Change,
            target,
            value: None,
            checked: Some(checked),
        }
    }

    pub fn blur(target: ElementDescriptor) -> Self {
        Self {
            kind: RawEventKind::Blur,
            target,
            value: None,
            checked: None,
        }
    }
}

/// Source of raw interaction events for an active recording
///
/// The listener owns whatever page instrumentation it needs; the recorder
/// only consumes what it hands over.
#[async_trait]
pub trait CaptureListener: Send {
    /// Drain the events observed since the previous call, in arrival order
    ///
    /// Fails with `MacroError::Capture` once the listener is disconnected.
    async fn poll_events(&mut self) -> Result<Vec<RawEvent>>;
}
