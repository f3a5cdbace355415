//! Macro persistence
//!
//! `MacroRepository` is the contract the rest of the crate talks to. Two
//! implementations ship: a JSON document store and an in-memory store.

pub mod json;
pub mod memory;

use uuid::Uuid;

use crate::error::{MacroError, Result};
use crate::model::{Macro, MacroRef, MacroSummary};

pub use json::JsonMacroRepository;
pub use memory::InMemoryRepository;

/// How `save` treats a name or id that is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Fail with `DuplicateName`
    #[default]
    CreateOnly,
    /// Replace the record carrying that name, or that id when the name is new
    Overwrite,
}

/// Durable store of macros, keyed by id and unique by name
///
/// Deleting an id that is not stored fails with `NotFound`, on every call.
pub trait MacroRepository: Send + Sync {
    fn save(&self, macro_: &Macro, mode: SaveMode) -> Result<()>;

    fn load(&self, reference: &MacroRef) -> Result<Macro>;

    /// Summaries of one snapshot of the store; call again to restart
    fn list(&self) -> Result<Box<dyn Iterator<Item = MacroSummary> + Send + '_>>;

    fn delete(&self, id: Uuid) -> Result<()>;

    /// Fail with `DuplicateName` when `name` is already stored
    fn ensure_name_free(&self, name: &str) -> Result<()> {
        match self.load(&MacroRef::Name(name.to_string())) {
            Ok(_) => Err(MacroError::DuplicateName(name.to_string())),
            Err(MacroError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Apply a save to an in-memory record list, shared by both stores
///
/// A stored record is never replaced without `SaveMode::Overwrite`, whether
/// it collides by name or by id.
pub(crate) fn apply_save(records: &mut Vec<Macro>, macro_: &Macro, mode: SaveMode) -> Result<()> {
    macro_.validate()?;
    let by_name = records.iter().position(|m| m.name == macro_.name);
    let by_id = records.iter().position(|m| m.id == macro_.id);

    match mode {
        SaveMode::CreateOnly => {
            if by_name.is_some() {
                return Err(MacroError::DuplicateName(macro_.name.clone()));
            }
            if by_id.is_some() {
                return Err(MacroError::DuplicateId(macro_.id));
            }
            records.push(macro_.clone());
        }
        SaveMode::Overwrite => match by_name.or(by_id) {
            Some(index) => {
                records[index] = macro_.clone();
                // One record per id
                let mut position = 0;
                records.retain(|m| {
                    let keep = position == index || m.id != macro_.id;
                    position += 1;
                    keep
                });
            }
            None => records.push(macro_.clone()),
        },
    }
    Ok(())
}

/// Look a record up by id or name
///
/// An id with no record also matches a macro literally named after it, so
/// a UUID-shaped name stays reachable from the command line.
pub(crate) fn find(records: &[Macro], reference: &MacroRef) -> Result<Macro> {
    let found = records.iter().find(|m| reference.matches(m)).or_else(|| match reference {
        MacroRef::Id(id) => {
            let name = id.to_string();
            records.iter().find(|m| m.name == name)
        }
        MacroRef::Name(_) => None,
    });
    found
        .cloned()
        .ok_or_else(|| MacroError::NotFound(reference.to_string()))
}

pub(crate) fn apply_delete(records: &mut Vec<Macro>, id: Uuid) -> Result<()> {
    let before = records.len();
    records.retain(|m| m.id != id);
    if records.len() == before {
        return Err(MacroError::NotFound(id.to_string()));
    }
    Ok(())
}
