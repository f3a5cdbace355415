//! Step and macro data model

pub mod types;

pub use types::{Locator, Macro, MacroRef, MacroSummary, Step, StepKind};
