use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{apply_delete, apply_save, find, MacroRepository, SaveMode};
use crate::error::Result;
use crate::model::{Macro, MacroRef, MacroSummary};

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: Mutex<Vec<Macro>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<Macro>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MacroRepository for InMemoryRepository {
    fn save(&self, macro_: &Macro, mode: SaveMode) -> Result<()> {
        apply_save(&mut self.records(), macro_, mode)
    }

    fn load(&self, reference: &MacroRef) -> Result<Macro> {
        find(&self.records(), reference)
    }

    fn list(&self) -> Result<Box<dyn Iterator<Item = MacroSummary> + Send + '_>> {
        let snapshot = self.records().clone();
        Ok(Box::new(snapshot.into_iter().map(|m| m.summary())))
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        apply_delete(&mut self.records(), id)
    }
}
