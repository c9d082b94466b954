//! File-backed task store.
//!
//! Every operation reads the whole collection, mutates it in memory and
//! writes it back before returning. An in-process mutex gives one total order
//! per process; across processes the last writer wins.

mod file;
mod paths;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::models::*;

pub use file::write_atomic;
pub use paths::{DataPaths, SPECS_DIR_NAME, TASKS_FILE_NAME};

#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TaskStore {
    /// Creates a store over `path`. Nothing touches the disk until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Every task in insertion order. Read failures are logged and yield an
    /// empty list.
    pub fn list_all(&self) -> Vec<Task> {
        let _guard = self.inner.lock.lock();
        file::read_tasks(&self.inner.path).unwrap_or_else(|e| {
            tracing::warn!(path = %self.inner.path.display(), error = %e, "Failed to read tasks");
            Vec::new()
        })
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.list_all().into_iter().find(|t| t.id == id)
    }

    pub fn create(&self, input: CreateTaskInput) -> Result<Task> {
        input.validate()?;

        let task = Task::new(input, Utc::now());
        self.mutate(|tasks| {
            tasks.push(task.clone());
            Some(())
        })?;

        tracing::info!(task_id = %task.id, title = %task.title, "Task created");
        Ok(task)
    }

    pub fn update(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>> {
        patch.validate()?;

        let updated = self.mutate(|tasks| {
            let task = tasks.iter_mut().find(|t| t.id == id)?;
            patch.apply_to(task, Utc::now());
            task.derive();
            Some(task.clone())
        })?;

        if let Some(task) = &updated {
            tracing::debug!(task_id = %task.id, status = %task.status, progress = task.progress, "Task updated");
        }
        Ok(updated)
    }

    /// Removes the task with its subtasks and logs. Spec documents are not the
    /// store's concern.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.mutate(|tasks| {
            let idx = tasks.iter().position(|t| t.id == id)?;
            tasks.remove(idx);
            Some(())
        })?;

        if deleted.is_some() {
            tracing::info!(task_id = %id, "Task deleted");
        }
        Ok(deleted.is_some())
    }

    pub fn add_subtask(&self, task_id: &str, title: &str) -> Result<Option<Subtask>> {
        validate_title(title)?;

        let added = self.mutate(|tasks| {
            let task = tasks.iter_mut().find(|t| t.id == task_id)?;
            let now = Utc::now();
            let subtask = Subtask::new(title, now);
            task.subtasks.push(subtask.clone());
            task.updated_at = now;
            // A new pending subtask grows the denominator.
            task.derive();
            Some(subtask)
        })?;

        if let Some(subtask) = &added {
            tracing::debug!(task_id = %task_id, subtask_id = %subtask.id, "Subtask added");
        }
        Ok(added)
    }

    pub fn update_subtask(
        &self,
        task_id: &str,
        subtask_id: &str,
        patch: SubtaskPatch,
    ) -> Result<Option<Subtask>> {
        patch.validate()?;

        self.mutate(|tasks| {
            let task = tasks.iter_mut().find(|t| t.id == task_id)?;
            let now = Utc::now();
            let subtask = task.subtask_mut(subtask_id)?;
            patch.apply_to(subtask, now);
            let subtask = subtask.clone();

            task.updated_at = now;
            task.derive();
            tracing::debug!(task_id = %task_id, subtask_id = %subtask_id, progress = task.progress, "Subtask updated");
            Some(subtask)
        })
    }

    /// Removes a subtask. Parent progress is re-derived only while subtasks
    /// remain.
    pub fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> Result<bool> {
        let deleted = self.mutate(|tasks| {
            let task = tasks.iter_mut().find(|t| t.id == task_id)?;
            let idx = task.subtasks.iter().position(|s| s.id == subtask_id)?;
            task.subtasks.remove(idx);
            task.updated_at = Utc::now();
            task.derive();
            Some(())
        })?;
        Ok(deleted.is_some())
    }

    /// Appends to the task's log, or to one of its subtasks' logs when
    /// `subtask_id` is given.
    pub fn append_log(&self, task_id: &str, message: &str, subtask_id: Option<&str>) -> Result<bool> {
        if message.trim().is_empty() {
            return Err(StoreError::validation("message", "must not be empty"));
        }

        let appended = self.mutate(|tasks| {
            let task = tasks.iter_mut().find(|t| t.id == task_id)?;
            let now = Utc::now();
            let entry = LogEntry::new(message, now);

            match subtask_id {
                Some(subtask_id) => {
                    let subtask = task.subtask_mut(subtask_id)?;
                    subtask.logs.push(entry);
                    subtask.updated_at = now;
                }
                None => task.logs.push(entry),
            }
            task.updated_at = now;
            Some(())
        })?;
        Ok(appended.is_some())
    }

    /// Classifies every `unclassified` task. Writes only when something
    /// changed; returns the number of tasks classified.
    pub fn backfill_topics(&self) -> Result<usize> {
        let count = self.mutate(|tasks| {
            let mut count = 0;
            for task in tasks.iter_mut().filter(|t| t.topic.is_unclassified()) {
                task.topic = classify(&task.title, &task.description);
                count += 1;
            }
            (count > 0).then_some(count)
        })?;

        let count = count.unwrap_or(0);
        if count > 0 {
            tracing::info!(count, "Backfilled task topics");
        }
        Ok(count)
    }

    /// Upserts tasks by id: same-id tasks are replaced in place, new ones are
    /// appended in the given order.
    pub fn import(&self, incoming: Vec<Task>) -> Result<ImportSummary> {
        for task in &incoming {
            validate_title(&task.title)?;
        }

        let summary = self.mutate(|tasks| {
            let mut summary = ImportSummary::default();
            for task in incoming {
                match tasks.iter_mut().find(|t| t.id == task.id) {
                    Some(existing) => {
                        *existing = task;
                        summary.replaced += 1;
                    }
                    None => {
                        tasks.push(task);
                        summary.created += 1;
                    }
                }
            }
            Some(summary)
        })?;

        let summary = summary.unwrap_or_default();
        tracing::info!(created = summary.created, replaced = summary.replaced, "Tasks imported");
        Ok(summary)
    }

    /// Read-modify-write under the store lock. `f` returning `None` means
    /// "nothing to do": the file is left untouched.
    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<Task>) -> Option<T>) -> Result<Option<T>> {
        let _guard = self.inner.lock.lock();
        let mut tasks = file::read_tasks(&self.inner.path)?;
        match f(&mut tasks) {
            Some(out) => {
                file::write_tasks(&self.inner.path, &tasks)?;
                Ok(Some(out))
            }
            None => Ok(None),
        }
    }
}
