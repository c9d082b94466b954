//! Whole-file JSON persistence.
//!
//! Writes go to a temp file beside the target and are renamed over it, so a
//! concurrent reader (another process, or the change notifier) only ever sees
//! a complete document.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::models::Task;

/// Reads the task list, creating an empty file when none exists.
///
/// Unparseable content is logged, copied to `<file>.bak`, and read as an empty
/// list; the next write replaces it. Other I/O failures are returned so a
/// mutation never overwrites data it could not read.
pub(crate) fn read_tasks(path: &Path) -> Result<Vec<Task>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            write_atomic(path, b"[]")?;
            tracing::info!(path = %path.display(), "Created empty task file");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<Vec<Task>>(&raw) {
        Ok(tasks) => Ok(tasks),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Task file is not valid, reading as empty");
            if !raw.trim().is_empty() {
                let backup = sibling(path, "bak");
                if let Err(copy_err) = fs::write(&backup, &raw) {
                    tracing::warn!(backup = %backup.display(), error = %copy_err, "Failed to back up unreadable task file");
                }
            }
            Ok(Vec::new())
        }
    }
}

pub(crate) fn write_tasks(path: &Path, tasks: &[Task]) -> Result<()> {
    let json = serde_json::to_string_pretty(tasks)?;
    write_atomic(path, json.as_bytes())?;
    Ok(())
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write to a temp file in the same directory, fsync, then rename over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    // Unique per process and per call: concurrent writers never share a temp file.
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp_path = sibling(path, &format!("{}.{}.tmp", std::process::id(), seq));
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
