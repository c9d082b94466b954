//! Core library for Control Tower.
//!
//! This crate owns the task data model, the JSON file store that persists it,
//! and the per-task spec documents, independent of any transport layer
//! (HTTP, WebSocket, MCP, CLI).
//!
//! # Usage
//!
//! ```no_run
//! use control_tower_core::{DataPaths, SpecRepository, TaskStore};
//! use control_tower_core::models::*;
//!
//! let paths = DataPaths::default_location();
//! let store = TaskStore::new(&paths.tasks_file);
//! let specs = SpecRepository::new(&paths.specs_dir);
//!
//! let task = store.create(CreateTaskInput::titled("Fix login redirect"))?;
//! store.add_subtask(&task.id, "Write failing test")?;
//!
//! specs.put(&task.id, "# Plan")?;
//! let tasks = store.list_all();
//! # Ok::<(), control_tower_core::StoreError>(())
//! ```

pub mod error;
pub mod models;
pub mod specs;
pub mod store;

// Re-export commonly used types at crate root
pub use error::StoreError;
pub use specs::SpecRepository;
pub use store::{DataPaths, TaskStore};
