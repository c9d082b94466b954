//! The request surface.
//!
//! One set of operations over the task store and the spec repository that
//! every entry point (HTTP, MCP, CLI) calls, so identical inputs always leave
//! identical state behind. Absent results become [`ServiceError::NotFound`].
//!
//! Store calls are blocking file I/O and run on the blocking pool, so one
//! write in flight never stalls unrelated requests.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use control_tower_core::models::*;
use control_tower_core::{DataPaths, SpecRepository, TaskStore};

use crate::error::{Result, ServiceError};
use crate::live::ChangeHandle;

#[derive(Clone)]
pub struct TaskService {
    store: TaskStore,
    specs: SpecRepository,
    // Held across "task exists" checks and the spec write or cascade that
    // follows, so a spec never outlives its task.
    spec_lock: Arc<Mutex<()>>,
    changes: Option<ChangeHandle>,
}

impl TaskService {
    pub fn new(store: TaskStore, specs: SpecRepository) -> Self {
        Self {
            store,
            specs,
            spec_lock: Arc::new(Mutex::new(())),
            changes: None,
        }
    }

    pub fn open(paths: &DataPaths) -> Self {
        Self::new(
            TaskStore::new(&paths.tasks_file),
            SpecRepository::new(&paths.specs_dir),
        )
    }

    /// Pokes `handle` after every mutation so live viewers hear about it
    /// without waiting for the file poll.
    pub fn with_change_handle(mut self, handle: ChangeHandle) -> Self {
        self.changes = Some(handle);
        self
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.blocking(|store, _| Ok(store.list_all())).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let id = id.to_string();
        self.blocking(move |store, _| store.get(&id).ok_or_else(|| ServiceError::task_not_found(id)))
            .await
    }

    pub async fn create_task(&self, input: CreateTaskInput) -> Result<Task> {
        let task = self
            .blocking(move |store, _| Ok(store.create(input)?))
            .await?;
        self.changed();
        Ok(task)
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task> {
        let id = id.to_string();
        let task = self
            .blocking(move |store, _| {
                store
                    .update(&id, patch)?
                    .ok_or_else(|| ServiceError::task_not_found(id))
            })
            .await?;
        self.changed();
        Ok(task)
    }

    /// Deletes the task, its subtasks and logs, then its spec document.
    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let spec_lock = Arc::clone(&self.spec_lock);
        self.blocking(move |store, specs| {
            let _guard = spec_lock.lock();
            if !store.delete(&id)? {
                return Err(ServiceError::task_not_found(id));
            }
            if let Err(e) = specs.delete(&id) {
                tracing::warn!(task_id = %id, error = %e, "Task deleted but its spec could not be removed");
            }
            Ok(())
        })
        .await?;
        self.changed();
        Ok(())
    }

    pub async fn add_subtask(&self, task_id: &str, title: &str) -> Result<Subtask> {
        let task_id = task_id.to_string();
        let title = title.to_string();
        let subtask = self
            .blocking(move |store, _| {
                store
                    .add_subtask(&task_id, &title)?
                    .ok_or_else(|| ServiceError::task_not_found(task_id))
            })
            .await?;
        self.changed();
        Ok(subtask)
    }

    pub async fn update_subtask(
        &self,
        task_id: &str,
        subtask_id: &str,
        patch: SubtaskPatch,
    ) -> Result<Subtask> {
        let task_id = task_id.to_string();
        let subtask_id = subtask_id.to_string();
        let subtask = self
            .blocking(move |store, _| match store.update_subtask(&task_id, &subtask_id, patch)? {
                Some(subtask) => Ok(subtask),
                None => Err(missing_subtask(store, task_id, subtask_id)),
            })
            .await?;
        self.changed();
        Ok(subtask)
    }

    pub async fn delete_subtask(&self, task_id: &str, subtask_id: &str) -> Result<()> {
        let task_id = task_id.to_string();
        let subtask_id = subtask_id.to_string();
        self.blocking(move |store, _| {
            if store.delete_subtask(&task_id, &subtask_id)? {
                Ok(())
            } else {
                Err(missing_subtask(store, task_id, subtask_id))
            }
        })
        .await?;
        self.changed();
        Ok(())
    }

    pub async fn append_log(
        &self,
        task_id: &str,
        message: &str,
        subtask_id: Option<&str>,
    ) -> Result<()> {
        let task_id = task_id.to_string();
        let message = message.to_string();
        let subtask_id = subtask_id.map(str::to_string);
        self.blocking(move |store, _| {
            if store.append_log(&task_id, &message, subtask_id.as_deref())? {
                return Ok(());
            }
            Err(match subtask_id {
                Some(subtask_id) => missing_subtask(store, task_id, subtask_id),
                None => ServiceError::task_not_found(task_id),
            })
        })
        .await?;
        self.changed();
        Ok(())
    }

    /// The task's spec text, empty when none was written.
    pub async fn get_spec(&self, task_id: &str) -> Result<String> {
        let task_id = task_id.to_string();
        self.blocking(move |store, specs| {
            if store.get(&task_id).is_none() {
                return Err(ServiceError::task_not_found(task_id));
            }
            Ok(specs.get(&task_id)?)
        })
        .await
    }

    pub async fn put_spec(&self, task_id: &str, text: String) -> Result<()> {
        let task_id = task_id.to_string();
        let spec_lock = Arc::clone(&self.spec_lock);
        self.blocking(move |store, specs| {
            let _guard = spec_lock.lock();
            if store.get(&task_id).is_none() {
                return Err(ServiceError::task_not_found(task_id));
            }
            Ok(specs.put(&task_id, &text)?)
        })
        .await
    }

    /// Every task with its spec text, stamped with the export time.
    pub async fn export_bundle(&self) -> Result<ExportBundle> {
        self.blocking(|store, specs| {
            let tasks = store
                .list_all()
                .into_iter()
                .map(|task| -> Result<ExportedTask> {
                    let spec = specs.get(&task.id)?;
                    Ok(ExportedTask { task, spec })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ExportBundle::new(tasks, Utc::now()))
        })
        .await
    }

    /// Restores an export: tasks are upserted by id and each spec is written
    /// (or removed, when empty) to match the bundle.
    pub async fn import_bundle(&self, bundle: ExportBundle) -> Result<ImportSummary> {
        if bundle.version.split('.').next() != EXPORT_FORMAT_VERSION.split('.').next() {
            return Err(ServiceError::validation(
                "version",
                format!("unsupported export version {}", bundle.version),
            ));
        }

        let spec_lock = Arc::clone(&self.spec_lock);
        let summary = self
            .blocking(move |store, specs| {
                let _guard = spec_lock.lock();
                let (tasks, spec_texts): (Vec<_>, Vec<_>) = bundle
                    .tasks
                    .into_iter()
                    .map(|item| {
                        let spec = (item.task.id.clone(), item.spec);
                        (item.task, spec)
                    })
                    .unzip();

                let summary = store.import(tasks)?;
                for (task_id, text) in spec_texts {
                    if text.is_empty() {
                        specs.delete(&task_id)?;
                    } else {
                        specs.put(&task_id, &text)?;
                    }
                }
                Ok(summary)
            })
            .await?;
        self.changed();
        Ok(summary)
    }

    /// Classifies tasks stored before topics existed. Returns how many
    /// changed.
    pub async fn backfill_topics(&self) -> Result<usize> {
        let count = self
            .blocking(|store, _| Ok(store.backfill_topics()?))
            .await?;
        if count > 0 {
            self.changed();
        }
        Ok(count)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&TaskStore, &SpecRepository) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let specs = self.specs.clone();
        tokio::task::spawn_blocking(move || f(&store, &specs)).await?
    }

    fn changed(&self) {
        if let Some(changes) = &self.changes {
            changes.poke();
        }
    }
}

/// Parses a status label as it appears on the wire (`in-progress`, ...).
pub fn parse_status(label: &str) -> Result<TaskStatus> {
    TaskStatus::from_str(label).ok_or_else(|| {
        let allowed: Vec<_> = TaskStatus::ALL.iter().map(TaskStatus::as_str).collect();
        ServiceError::validation(
            "status",
            format!("unknown status '{}' (expected one of {})", label, allowed.join(", ")),
        )
    })
}

fn missing_subtask(store: &TaskStore, task_id: String, subtask_id: String) -> ServiceError {
    if store.get(&task_id).is_none() {
        ServiceError::task_not_found(task_id)
    } else {
        ServiceError::subtask_not_found(subtask_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service() -> (TempDir, TaskService) {
        let dir = TempDir::new().unwrap();
        let service = TaskService::open(&DataPaths::in_dir(dir.path()));
        (dir, service)
    }

    #[tokio::test]
    async fn not_found_is_distinct_from_empty() {
        let (_dir, service) = service();
        assert!(service.list_tasks().await.unwrap().is_empty());

        let err = service.get_task("fake-id").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Task fake-id not found");
    }

    #[tokio::test]
    async fn subtask_errors_name_the_missing_entity() {
        let (_dir, service) = service();
        let task = service.create_task(CreateTaskInput::titled("Parent")).await.unwrap();

        let err = service
            .update_subtask(&task.id, "fake-sub", SubtaskPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "Subtask", .. }));

        let err = service.delete_subtask("fake-id", "fake-sub").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "Task", .. }));
    }

    #[tokio::test]
    async fn delete_cascades_to_the_spec() {
        let (dir, service) = service();
        let task = service.create_task(CreateTaskInput::titled("Doomed")).await.unwrap();
        service.put_spec(&task.id, "# Plan".into()).await.unwrap();

        service.delete_task(&task.id).await.unwrap();
        assert!(service.get_task(&task.id).await.unwrap_err().is_not_found());
        assert!(service.get_spec(&task.id).await.unwrap_err().is_not_found());

        let repo = SpecRepository::new(DataPaths::in_dir(dir.path()).specs_dir);
        assert_eq!(repo.get(&task.id).unwrap(), "");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn spec_write_racing_a_delete_leaves_no_orphan() {
        let (dir, service) = service();
        let repo = SpecRepository::new(DataPaths::in_dir(dir.path()).specs_dir);

        for round in 0..40 {
            let task = service
                .create_task(CreateTaskInput::titled(format!("Round {}", round)))
                .await
                .unwrap();
            let (put, delete) = tokio::join!(
                service.put_spec(&task.id, "# Plan".into()),
                service.delete_task(&task.id),
            );
            delete.unwrap();
            if let Err(e) = put {
                assert!(e.is_not_found(), "{e}");
            }
            assert_eq!(repo.get(&task.id).unwrap(), "", "orphaned spec in round {}", round);
        }
    }

    #[tokio::test]
    async fn spec_requires_an_existing_task() {
        let (_dir, service) = service();
        let err = service.put_spec("fake-id", "text".into()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn validation_errors_name_the_field() {
        let (_dir, service) = service();
        let err = service.create_task(CreateTaskInput::titled("")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "title", .. }));
    }

    #[test]
    fn status_labels_parse_or_name_the_field() {
        assert_eq!(parse_status("in-progress").unwrap(), TaskStatus::InProgress);
        let err = parse_status("finished").unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "status", .. }));
    }

    #[tokio::test]
    async fn import_rejects_other_major_versions() {
        let (_dir, service) = service();
        let mut bundle = service.export_bundle().await.unwrap();
        bundle.version = "2.0.0".into();
        let err = service.import_bundle(bundle).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "version", .. }));
    }
}
