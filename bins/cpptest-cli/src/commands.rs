// CLI commands for managing stored tests
use anyhow::{bail, Context, Result};
use cpptest_common::store::{description_of, TestStore};
use cpptest_common::types::{parse_forbidden_list, TestRecord};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Fields set by `create` and overridden by `edit`; `None` leaves a field alone
#[derive(Debug, Default)]
pub struct TestFields {
    pub description: Option<String>,
    /// Comma-separated, as typed on the command line
    pub forbidden: Option<String>,
    pub input: Option<String>,
    pub expected: Option<String>,
}

impl TestFields {
    fn apply(self, mut record: TestRecord) -> TestRecord {
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(forbidden) = self.forbidden {
            record.forbidden = parse_forbidden_list(&forbidden);
        }
        if let Some(input) = self.input {
            record.input = input;
        }
        if let Some(expected) = self.expected {
            record.expected = expected;
        }
        record
    }

    fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.forbidden.is_none()
            && self.input.is_none()
            && self.expected.is_none()
    }
}

/// Create a new test from scratch
pub fn create_test(store: &TestStore, name: &str, fields: TestFields, yes: bool) -> Result<PathBuf> {
    println!("📝 Creating test: {}", name.trim());

    let target = store.path_for(name.trim());
    if target.exists() && !yes && !confirm(&format!("Test '{}' already exists. Overwrite?", name.trim()))? {
        println!("❌ Aborted");
        return Ok(target);
    }

    let record = fields.apply(TestRecord::new(name));
    let path = store
        .save(&record)
        .with_context(|| format!("Failed to save test '{}'", name.trim()))?;

    println!("✅ Test saved to {}", path.display());
    Ok(path)
}

/// Load an existing test, override the given fields and save it back
pub fn edit_test(store: &TestStore, test: &str, fields: TestFields) -> Result<PathBuf> {
    if fields.is_empty() {
        bail!("Nothing to change: pass at least one of --description, --forbidden, --input, --expected");
    }

    let source = store.resolve(test);
    let mut record = load(store, &source)?;
    if record.name.trim().is_empty() {
        record.name = file_stem(&source);
    }

    let record = fields.apply(record);
    let path = store
        .save(&record)
        .with_context(|| format!("Failed to save test '{}'", record.name))?;

    if path != source {
        warn!(from = %source.display(), to = %path.display(), "Edited test written to the tests directory");
    }
    println!("✅ Test '{}' updated ({})", record.name, path.display());
    Ok(path)
}

/// Print a test's description
pub fn show_info(store: &TestStore, test: &str) -> Result<()> {
    let record = load(store, &store.resolve(test))?;
    println!("{}", format_info(&record));
    Ok(())
}

/// Print a test as pretty JSON
pub fn show_test(store: &TestStore, test: &str) -> Result<()> {
    let record = load(store, &store.resolve(test))?;
    let json = serde_json::to_string_pretty(&record).context("Failed to serialize test")?;
    println!("{}", json);
    Ok(())
}

/// List all tests in the tests directory
pub fn list_tests(store: &TestStore) -> Result<()> {
    let files = store
        .list()
        .with_context(|| format!("Failed to list {}", store.dir().display()))?;

    if files.is_empty() {
        println!("No tests found in {}.", store.dir().display());
        println!("\n💡 Create one with: cpptest-cli create --name <name> --expected <output>");
        return Ok(());
    }

    let rows: Vec<(String, String)> = files
        .iter()
        .map(|path| match store.load(path) {
            Ok(record) => {
                let name = if record.name.trim().is_empty() {
                    file_stem(path)
                } else {
                    record.name.clone()
                };
                (name, description_of(&record).to_string())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable test");
                (file_stem(path), format!("<unreadable: {}>", e))
            }
        })
        .collect();

    println!("📋 Tests in {}:\n", store.dir().display());
    println!("{}", format_listing(&rows));
    println!("\n✅ Total: {} test(s)", rows.len());
    Ok(())
}

/// Delete a test file, asking first unless `yes` is set.
///
/// Returns whether the file was removed.
pub fn delete_test(store: &TestStore, test: &str, yes: bool) -> Result<bool> {
    let path = store.resolve(test);

    if !yes && !confirm(&format!("Delete test {}?", path.display()))? {
        println!("❌ Aborted");
        return Ok(false);
    }

    store
        .delete(&path)
        .with_context(|| format!("Failed to delete test {}", path.display()))?;

    println!("🗑️  Deleted {}", path.display());
    Ok(true)
}

fn load(store: &TestStore, path: &Path) -> Result<TestRecord> {
    store
        .load(path)
        .with_context(|| format!("Failed to load test {}", path.display()))
}

fn format_info(record: &TestRecord) -> String {
    format!("Test info:\n{}", description_of(record))
}

fn format_listing(rows: &[(String, String)]) -> String {
    let width = rows
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Name".len());

    let mut out = format!("{:<width$}  {}\n", "Name", "Description", width = width);
    out.push_str(&"─".repeat(width + 2 + "Description".len()));

    for (name, description) in rows {
        let first_line = description.lines().next().unwrap_or_default();
        out.push_str(&format!("\n{:<width$}  {}", name, first_line, width = width));
    }
    out
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn confirm(question: &str) -> Result<bool> {
    print!("⚠️  {} (y/N): ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}
