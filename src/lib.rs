pub mod commands;
pub mod driver;
pub mod error;
pub mod model;
pub mod recorder;
pub mod runner;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export common items
pub use commands::MacroStudio;
pub use error::{MacroError, Result};
pub use model::{Locator, Macro, MacroRef, MacroSummary, Step, StepKind};
pub use storage::{JsonMacroRepository, MacroRepository, SaveMode};
