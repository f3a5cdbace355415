use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{apply_delete, apply_save, find, MacroRepository, SaveMode};
use crate::error::Result;
use crate::model::{Macro, MacroRef, MacroSummary};

/// Macro store kept as one JSON array document
///
/// The document is re-read on every operation so that edits from another
/// process are picked up. Writes land in a sibling temp file first and are
/// then renamed over the document.
#[derive(Debug)]
pub struct JsonMacroRepository {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonMacroRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_all(&self) -> Result<Vec<Macro>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, records: &[Macro]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;

        debug!("Wrote {} macro(s) to {}", records.len(), self.path.display());
        Ok(())
    }

    fn update<T>(&self, f: impl FnOnce(&mut Vec<Macro>) -> Result<T>) -> Result<T> {
        let _guard = self.guard();
        let mut records = self.read_all()?;
        let out = f(&mut records)?;
        self.write_all(&records)?;
        Ok(out)
    }
}

impl MacroRepository for JsonMacroRepository {
    fn save(&self, macro_: &Macro, mode: SaveMode) -> Result<()> {
        self.update(|records| apply_save(records, macro_, mode))?;
        info!("Saved macro '{}' ({})", macro_.name, macro_.id);
        Ok(())
    }

    fn load(&self, reference: &MacroRef) -> Result<Macro> {
        let _guard = self.guard();
        find(&self.read_all()?, reference)
    }

    fn list(&self) -> Result<Box<dyn Iterator<Item = MacroSummary> + Send + '_>> {
        let snapshot = {
            let _guard = self.guard();
            self.read_all()?
        };
        Ok(Box::new(snapshot.into_iter().map(|m| m.summary())))
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        self.update(|records| apply_delete(records, id))?;
        info!("Deleted macro {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MacroError;
    use crate::model::{Locator, Step};

    fn sample(name: &str) -> Macro {
        Macro::new(
            name,
            "https://example.test/form",
            vec![
                Step::input(vec![Locator::Id("q".into())], "rust"),
                Step::select(
                    vec![
                        Locator::CssPath("form > select:nth-of-type(1)".into()),
                        Locator::Text("Sort".into()),
                    ],
                    "newest",
                ),
                Step::checkbox(vec![Locator::Id("safe".into())], false),
                Step::click(vec![Locator::Text("Search".into())]),
            ],
        )
    }

    fn store() -> (tempfile::TempDir, JsonMacroRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonMacroRepository::new(dir.path().join("nested").join("macros.json"));
        (dir, repo)
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let (_dir, repo) = store();
        let m = sample("search");
        repo.save(&m, SaveMode::CreateOnly).unwrap();

        assert_eq!(repo.load(&MacroRef::Id(m.id)).unwrap(), m);
        assert_eq!(repo.load(&MacroRef::Name("search".into())).unwrap(), m);
    }

    #[test]
    fn test_document_uses_camel_case_fields() {
        let (_dir, repo) = store();
        repo.save(&sample("search"), SaveMode::CreateOnly).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(repo.path()).unwrap()).unwrap();
        let record = &doc[0];
        assert!(record["startUrl"].is_string());
        assert!(record["createdAt"].is_string());
        assert_eq!(record["steps"][1]["kind"], "select");
        assert_eq!(record["steps"][1]["target"][0]["strategy"], "cssPath");
        assert!(record["steps"][3].get("value").is_none());
    }

    #[test]
    fn test_duplicate_save_leaves_file_unchanged() {
        let (_dir, repo) = store();
        repo.save(&sample("search"), SaveMode::CreateOnly).unwrap();
        let before = fs::read_to_string(repo.path()).unwrap();

        let err = repo
            .save(&sample("search"), SaveMode::CreateOnly)
            .unwrap_err();
        assert!(matches!(err, MacroError::DuplicateName(_)));
        assert_eq!(fs::read_to_string(repo.path()).unwrap(), before);
    }

    #[test]
    fn test_overwrite_keeps_one_record() {
        let (_dir, repo) = store();
        repo.save(&sample("search"), SaveMode::CreateOnly).unwrap();
        repo.save(&sample("other"), SaveMode::CreateOnly).unwrap();
        let replacement = sample("search");
        repo.save(&replacement, SaveMode::Overwrite).unwrap();

        let names: Vec<String> = repo.list().unwrap().map(|s| s.name).collect();
        assert_eq!(names, vec!["search".to_string(), "other".to_string()]);
        assert_eq!(
            repo.load(&MacroRef::Name("search".into())).unwrap().id,
            replacement.id
        );
    }

    #[test]
    fn test_same_id_under_new_name_leaves_file_unchanged() {
        let (_dir, repo) = store();
        let original = sample("search");
        repo.save(&original, SaveMode::CreateOnly).unwrap();
        let before = fs::read_to_string(repo.path()).unwrap();

        let mut renamed = original.clone();
        renamed.name = "renamed".into();
        let err = repo.save(&renamed, SaveMode::CreateOnly).unwrap_err();
        assert!(matches!(err, MacroError::DuplicateId(_)));
        assert_eq!(fs::read_to_string(repo.path()).unwrap(), before);
        assert_eq!(
            repo.load(&MacroRef::Name("search".into())).unwrap(),
            original
        );
    }

    #[test]
    fn test_overwrite_by_name_drops_other_record_with_same_id() {
        let (_dir, repo) = store();
        let first = sample("first");
        let second = sample("second");
        repo.save(&first, SaveMode::CreateOnly).unwrap();
        repo.save(&second, SaveMode::CreateOnly).unwrap();

        let mut moved = first.clone();
        moved.name = "second".into();
        repo.save(&moved, SaveMode::Overwrite).unwrap();

        let summaries: Vec<MacroSummary> = repo.list().unwrap().collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, first.id);
        assert_eq!(summaries[0].name, "second");
    }

    #[test]
    fn test_list_is_restartable() {
        let (_dir, repo) = store();
        repo.save(&sample("a"), SaveMode::CreateOnly).unwrap();
        repo.save(&sample("b"), SaveMode::CreateOnly).unwrap();

        let first: Vec<MacroSummary> = repo.list().unwrap().collect();
        let second: Vec<MacroSummary> = repo.list().unwrap().collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first[0].step_count, 4);
    }

    #[test]
    fn test_missing_or_empty_file_is_empty_store() {
        let (_dir, repo) = store();
        assert_eq!(repo.list().unwrap().count(), 0);

        fs::create_dir_all(repo.path().parent().unwrap()).unwrap();
        fs::write(repo.path(), "  \n").unwrap();
        assert_eq!(repo.list().unwrap().count(), 0);
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let (_dir, repo) = store();
        fs::create_dir_all(repo.path().parent().unwrap()).unwrap();
        fs::write(repo.path(), "{ not json").unwrap();

        assert!(matches!(
            repo.list().map(|it| it.count()),
            Err(MacroError::Serialization(_))
        ));
        assert!(repo.save(&sample("x"), SaveMode::CreateOnly).is_err());
        assert_eq!(fs::read_to_string(repo.path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_delete_then_delete_again() {
        let (_dir, repo) = store();
        let m = sample("gone");
        repo.save(&m, SaveMode::CreateOnly).unwrap();

        repo.delete(m.id).unwrap();
        assert!(matches!(
            repo.load(&MacroRef::Id(m.id)),
            Err(MacroError::NotFound(_))
        ));
        assert!(matches!(repo.delete(m.id), Err(MacroError::NotFound(_))));
    }
}
