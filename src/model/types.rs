use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{MacroError, Result};

/// Kind of recorded action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Click,
    Input,
    Select,
    CheckboxToggle,
}

impl StepKind {
    /// Whether steps of this kind carry a `value` payload
    pub fn carries_value(&self) -> bool {
        matches!(self, StepKind::Input | StepKind::Select)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Click => "click",
            StepKind::Input => "input",
            StepKind::Select => "select",
            StepKind::CheckboxToggle => "checkbox-toggle",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy for finding a live element.
///
/// Variants are listed in replay priority order: stable identifier,
/// structural path, then content match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value", rename_all = "camelCase")]
pub enum Locator {
    /// Element `id` attribute
    Id(String),
    /// CSS path from the nearest ancestor with an id (or the document root)
    CssPath(String),
    /// Trimmed visible text of the element
    Text(String),
}

impl Locator {
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Id(_) => "id",
            Locator::CssPath(_) => "cssPath",
            Locator::Text(_) => "text",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Id(v) | Locator::CssPath(v) | Locator::Text(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.strategy(), self.value())
    }
}

/// One recorded, replayable action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub kind: StepKind,
    /// Locator candidates, tried in order at replay time
    pub target: Vec<Locator>,
    /// Text payload for `input`, option identifier for `select`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Intended checked-state for `checkbox-toggle`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Position within the owning macro
    pub sequence: usize,
}

impl Step {
    pub fn click(target: Vec<Locator>) -> Self {
        Self::build(StepKind::Click, target, None, None)
    }

    pub fn input(target: Vec<Locator>, text: impl Into<String>) -> Self {
        Self::build(StepKind::Input, target, Some(text.into()), None)
    }

    pub fn select(target: Vec<Locator>, option: impl Into<String>) -> Self {
        Self::build(StepKind::Select, target, Some(option.into()), None)
    }

    pub fn checkbox(target: Vec<Locator>, checked: bool) -> Self {
        Self::build(StepKind::CheckboxToggle, target, None, Some(checked))
    }

    fn build(
        kind: StepKind,
        target: Vec<Locator>,
        value: Option<String>,
        checked: Option<bool>,
    ) -> Self {
        Self {
            kind,
            target,
            value,
            checked,
            sequence: 0,
        }
    }

    /// Check the per-step invariants
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(MacroError::InvalidMacro(format!(
                "step {} has no locator candidates",
                self.sequence
            )));
        }
        if self.kind.carries_value() != self.value.is_some() {
            return Err(MacroError::InvalidMacro(format!(
                "step {} ({}) {} a value",
                self.sequence,
                self.kind,
                if self.value.is_some() {
                    "must not carry"
                } else {
                    "requires"
                }
            )));
        }
        if (self.kind == StepKind::CheckboxToggle) != self.checked.is_some() {
            return Err(MacroError::InvalidMacro(format!(
                "step {} ({}) has an inconsistent checked-state",
                self.sequence, self.kind
            )));
        }
        Ok(())
    }

    /// Short human-readable description used in logs and console output
    pub fn describe(&self) -> String {
        let target = self
            .target
            .first()
            .map(|l| l.to_string())
            .unwrap_or_default();
        match (self.kind, &self.value, self.checked) {
            (StepKind::Input, Some(v), _) => format!("{} {} \"{}\"", self.kind, target, v),
            (StepKind::Select, Some(v), _) => format!("{} {} -> {}", self.kind, target, v),
            (StepKind::CheckboxToggle, _, Some(c)) => {
                format!("{} {} -> {}", self.kind, target, c)
            }
            _ => format!("{} {}", self.kind, target),
        }
    }
}

/// A named capture session outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macro {
    pub id: Uuid,
    pub name: String,
    pub start_url: String,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<Step>,
}

impl Macro {
    /// Create a macro with a fresh identity, renumbering steps in the given order
    pub fn new(name: impl Into<String>, start_url: impl Into<String>, steps: Vec<Step>) -> Self {
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(sequence, step)| Step { sequence, ..step })
            .collect();

        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            start_url: start_url.into(),
            created_at: Utc::now(),
            steps,
        }
    }

    /// Check the macro-level invariants: named, non-empty, contiguous sequences
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MacroError::InvalidMacro("macro name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(MacroError::EmptyMacro);
        }

        let mut sequences: Vec<usize> = self.steps.iter().map(|s| s.sequence).collect();
        sequences.sort_unstable();
        if sequences.iter().enumerate().any(|(i, seq)| i != *seq) {
            return Err(MacroError::InvalidMacro(format!(
                "step sequences of '{}' are not contiguous from 0",
                self.name
            )));
        }

        self.steps.iter().try_for_each(Step::validate)
    }

    /// Steps in replay order
    pub fn ordered_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.sequence);
        steps
    }

    pub fn summary(&self) -> MacroSummary {
        MacroSummary {
            id: self.id,
            name: self.name.clone(),
            start_url: self.start_url.clone(),
            step_count: self.steps.len(),
            created_at: self.created_at,
        }
    }
}

/// Listing entry for a stored macro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroSummary {
    pub id: Uuid,
    pub name: String,
    pub start_url: String,
    pub step_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Reference to a stored macro, by identity or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroRef {
    Id(Uuid),
    Name(String),
}

impl MacroRef {
    pub fn matches(&self, m: &Macro) -> bool {
        match self {
            MacroRef::Id(id) => m.id == *id,
            MacroRef::Name(name) => m.name == *name,
        }
    }
}

impl FromStr for MacroRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match Uuid::parse_str(s) {
            Ok(id) => MacroRef::Id(id),
            Err(_) => MacroRef::Name(s.to_string()),
        })
    }
}

impl fmt::Display for MacroRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroRef::Id(id) => write!(f, "{}", id),
            MacroRef::Name(name) => write!(f, "'{}'", name),
        }
    }
}
