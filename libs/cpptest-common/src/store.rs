//! Test record storage: one pretty-printed JSON file per test, named
//! `<name>.json`, inside a single tests directory.
//!
//! Nothing is cached. Every call goes back to disk.

use crate::types::TestRecord;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const TEST_FILE_EXTENSION: &str = "json";
pub const NO_DESCRIPTION: &str = "No description found in this test.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid test file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestStore {
    dir: PathBuf,
}

impl TestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path a test with this name is saved under
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, TEST_FILE_EXTENSION))
    }

    /// Map a CLI argument to a test file.
    ///
    /// Anything that looks like a path is taken as-is, a bare name is looked
    /// up in the tests directory.
    pub fn resolve(&self, name_or_path: &str) -> PathBuf {
        let looks_like_path = name_or_path.contains('/')
            || name_or_path.contains(std::path::MAIN_SEPARATOR)
            || name_or_path.ends_with(&format!(".{}", TEST_FILE_EXTENSION));

        if looks_like_path {
            PathBuf::from(name_or_path)
        } else {
            self.path_for(name_or_path)
        }
    }

    /// Validate and write a record, returning the file it landed in.
    ///
    /// An existing test with the same name is overwritten.
    pub fn save(&self, record: &TestRecord) -> Result<PathBuf, StoreError> {
        let name = validate_name(&record.name)?;

        let mut record = record.clone();
        record.name = name.to_string();
        record.forbidden = record
            .forbidden
            .iter()
            .map(|token| token.trim().to_string())
            .collect();

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let path = self.path_for(name);
        let json = serde_json::to_string_pretty(&record).map_err(|e| StoreError::Parse {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        fs::write(&path, json).map_err(|e| StoreError::io(&path, e))?;

        info!(test = %record.name, path = %path.display(), "Test saved");
        Ok(path)
    }

    /// Read a test file. Missing keys load as empty values.
    pub fn load(&self, path: &Path) -> Result<TestRecord, StoreError> {
        let data = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;

        let value: serde_json::Value =
            serde_json::from_str(&data).map_err(|e| StoreError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let Some(fields) = value.as_object() else {
            return Err(StoreError::Parse {
                path: path.to_path_buf(),
                reason: "expected a JSON object".to_string(),
            });
        };

        let record = record_from_fields(fields);

        debug!(test = %record.name, path = %path.display(), "Test loaded");
        Ok(record)
    }

    /// Remove a test file. A missing file is an error.
    pub fn delete(&self, path: &Path) -> Result<(), StoreError> {
        fs::remove_file(path).map_err(|e| StoreError::io(path, e))?;
        info!(path = %path.display(), "Test deleted");
        Ok(())
    }

    /// All test files in the tests directory, sorted by file name
    pub fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            let is_test = path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(TEST_FILE_EXTENSION);
            if is_test {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Text shown for "test info"
pub fn description_of(record: &TestRecord) -> &str {
    if record.description.trim().is_empty() {
        NO_DESCRIPTION
    } else {
        &record.description
    }
}

/// Read a record field by field. Missing, `null` or wrongly typed values
/// become empty, as does any non-string item of `forbidden`.
fn record_from_fields(fields: &serde_json::Map<String, serde_json::Value>) -> TestRecord {
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let forbidden = fields
        .get("forbidden")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();

    TestRecord {
        name: text("name"),
        description: text("description"),
        forbidden,
        input: text("input"),
        expected: text("expected"),
    }
}

fn validate_name(name: &str) -> Result<&str, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("Test name cannot be empty.".to_string()));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StoreError::Validation(format!(
            "Test name '{}' must not contain path separators",
            name
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, TestStore) {
        let tmp = TempDir::new().unwrap();
        let store = TestStore::new(tmp.path().join("tests"));
        (tmp, store)
    }

    fn sample() -> TestRecord {
        TestRecord::new("t1")
            .with_description("adds two numbers")
            .with_forbidden(["goto", "while"])
            .with_input("3\n4\n")
            .with_expected("7")
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let (_tmp, store) = store();
        let record = sample();

        let path = store.save(&record).unwrap();
        assert_eq!(path, store.dir().join("t1.json"));

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_save_creates_directory_idempotently() {
        let (_tmp, store) = store();
        assert!(!store.dir().exists());

        store.save(&sample()).unwrap();
        store.save(&sample()).unwrap();

        assert!(store.dir().is_dir());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_save_trims_name_and_tokens() {
        let (_tmp, store) = store();
        let mut record = sample();
        record.name = "  spaced  ".to_string();
        record.forbidden = vec!["  goto ".to_string()];

        let path = store.save(&record).unwrap();
        let loaded = store.load(&path).unwrap();

        assert_eq!(path.file_name().unwrap(), "spaced.json");
        assert_eq!(loaded.name, "spaced");
        assert_eq!(loaded.forbidden, vec!["goto"]);
    }

    #[test]
    fn test_save_rejects_empty_name() {
        let (_tmp, store) = store();
        let err = store.save(&TestRecord::new("   ")).unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
        assert!(!store.dir().exists(), "nothing should be written");
    }

    #[test]
    fn test_save_rejects_path_like_name() {
        let (_tmp, store) = store();
        for name in ["../escape", "a/b", "..", "a\\b"] {
            let err = store.save(&TestRecord::new(name)).unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "{}", name);
        }
    }

    #[test]
    fn test_collision_overwrites() {
        let (_tmp, store) = store();
        store.save(&sample()).unwrap();
        let path = store.save(&sample().with_expected("8")).unwrap();

        assert_eq!(store.load(&path).unwrap().expected, "8");
    }

    #[test]
    fn test_load_legacy_file() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let path = store.path_for("legacy");
        fs::write(&path, r#"{"name": "legacy", "forbidden": ["for"]}"#).unwrap();

        let loaded = store.load(&path).unwrap();

        assert_eq!(loaded.name, "legacy");
        assert_eq!(loaded.forbidden, vec!["for"]);
        assert!(loaded.description.is_empty());
        assert!(loaded.input.is_empty());
        assert!(loaded.expected.is_empty());
    }

    #[test]
    fn test_load_null_fields_read_as_empty() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let path = store.path_for("nulls");
        fs::write(
            &path,
            r#"{"name": "nulls", "description": null, "input": null, "forbidden": null, "expected": "7"}"#,
        )
        .unwrap();

        let loaded = store.load(&path).unwrap();

        assert_eq!(loaded.name, "nulls");
        assert!(loaded.description.is_empty());
        assert!(loaded.input.is_empty());
        assert!(loaded.forbidden.is_empty());
        assert_eq!(loaded.expected, "7");
    }

    #[test]
    fn test_load_wrongly_typed_values_read_as_empty() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let path = store.path_for("typed");
        fs::write(
            &path,
            r#"{"name": "typed", "description": 5, "forbidden": ["goto", 1, null], "expected": ["7"]}"#,
        )
        .unwrap();

        let loaded = store.load(&path).unwrap();

        assert!(loaded.description.is_empty());
        assert_eq!(loaded.forbidden, vec!["goto", "", ""]);
        assert!(loaded.expected.is_empty());
    }

    #[test]
    fn test_load_rejects_non_object() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.dir()).unwrap();

        let array = store.path_for("array");
        fs::write(&array, "[1, 2]").unwrap();
        assert!(matches!(store.load(&array), Err(StoreError::Parse { .. })));

        let broken = store.path_for("broken");
        fs::write(&broken, "{\"name\": ").unwrap();
        assert!(matches!(store.load(&broken), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let (_tmp, store) = store();
        let err = store.load(&store.path_for("nope")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_delete() {
        let (_tmp, store) = store();
        let path = store.save(&sample()).unwrap();

        store.delete(&path).unwrap();
        assert!(!path.exists());

        let err = store.delete(&path).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_list_sorted_json_only() {
        let (_tmp, store) = store();
        assert!(store.list().unwrap().is_empty());

        store.save(&TestRecord::new("b")).unwrap();
        store.save(&TestRecord::new("a")).unwrap();
        fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        let names: Vec<_> = store
            .list()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_resolve() {
        let store = TestStore::new("/srv/tests");
        assert_eq!(store.resolve("sum"), PathBuf::from("/srv/tests/sum.json"));
        assert_eq!(store.resolve("other/sum.json"), PathBuf::from("other/sum.json"));
        assert_eq!(store.resolve("sum.json"), PathBuf::from("sum.json"));
    }

    #[test]
    fn test_description_of() {
        assert_eq!(description_of(&TestRecord::new("x")), NO_DESCRIPTION);
        assert_eq!(description_of(&sample()), "adds two numbers");
    }
}
