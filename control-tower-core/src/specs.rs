//! Per-task spec documents.
//!
//! One Markdown file per task id under a directory of its own. The repository
//! never looks at the task store; callers check that a task exists before
//! writing its spec.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{Result, StoreError};
use crate::store::write_atomic;

#[derive(Debug, Clone)]
pub struct SpecRepository {
    dir: PathBuf,
}

impl SpecRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The spec text, or an empty string when there is none.
    pub fn get(&self, task_id: &str) -> Result<String> {
        let Some(path) = self.path_for(task_id) else {
            return Ok(String::new());
        };
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates or replaces the whole document.
    pub fn put(&self, task_id: &str, text: &str) -> Result<()> {
        let path = self
            .path_for(task_id)
            .ok_or_else(|| StoreError::validation("taskId", format!("unusable as a file name: {:?}", task_id)))?;
        write_atomic(&path, text.as_bytes())?;
        tracing::debug!(task_id = %task_id, bytes = text.len(), "Spec written");
        Ok(())
    }

    /// Removes the document. Absent documents are not an error.
    pub fn delete(&self, task_id: &str) -> Result<()> {
        let Some(path) = self.path_for(task_id) else {
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(task_id = %task_id, "Spec deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // Ids are opaque, so anything that could leave the directory is refused.
    fn path_for(&self, task_id: &str) -> Option<PathBuf> {
        let usable = !task_id.is_empty()
            && task_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        usable.then(|| self.dir.join(format!("{}.md", task_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_spec_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let specs = SpecRepository::new(dir.path().join("specs"));
        assert_eq!(specs.get("abc").unwrap(), "");
        assert!(!dir.path().join("specs").join("abc.md").exists());
    }

    #[test]
    fn put_replaces_whole_content() {
        let dir = TempDir::new().unwrap();
        let specs = SpecRepository::new(dir.path().join("specs"));

        specs.put("abc", "# First\n\nlong text").unwrap();
        specs.put("abc", "# Second").unwrap();
        assert_eq!(specs.get("abc").unwrap(), "# Second");
        assert!(dir.path().join("specs").join("abc.md").is_file());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let specs = SpecRepository::new(dir.path());

        specs.put("abc", "text").unwrap();
        specs.delete("abc").unwrap();
        specs.delete("abc").unwrap();
        assert_eq!(specs.get("abc").unwrap(), "");
    }

    #[test]
    fn overlapping_puts_on_one_id_never_fail() {
        let dir = TempDir::new().unwrap();
        let specs = SpecRepository::new(dir.path().join("specs"));

        std::thread::scope(|scope| {
            for i in 0..8 {
                let specs = specs.clone();
                scope.spawn(move || {
                    let body = format!("# Draft {}\n", i).repeat(10_000);
                    for _ in 0..25 {
                        specs.put("abc", &body).unwrap();
                    }
                });
            }
        });

        let text = specs.get("abc").unwrap();
        assert!(text.starts_with("# Draft "));
        let first_line = text.lines().next().unwrap();
        assert!(text.lines().all(|line| line == first_line), "torn document");
    }

    #[test]
    fn path_like_ids_are_refused() {
        let dir = TempDir::new().unwrap();
        let specs = SpecRepository::new(dir.path().join("specs"));

        assert!(specs.put("../escape", "x").unwrap_err().is_validation());
        assert_eq!(specs.get("../escape").unwrap(), "");
        assert!(!dir.path().join("escape.md").exists());
    }
}
