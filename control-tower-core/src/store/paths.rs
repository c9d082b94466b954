use std::path::{Path, PathBuf};

use directories::ProjectDirs;

pub const TASKS_FILE_NAME: &str = "tasks.json";
pub const SPECS_DIR_NAME: &str = "specs";

/// Where the task file and the spec documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub tasks_file: PathBuf,
    pub specs_dir: PathBuf,
}

impl DataPaths {
    /// `<dir>/tasks.json` and `<dir>/specs/`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            tasks_file: dir.join(TASKS_FILE_NAME),
            specs_dir: dir.join(SPECS_DIR_NAME),
        }
    }

    /// The platform data directory, or `./data` when none can be determined.
    pub fn default_dir() -> PathBuf {
        ProjectDirs::from("dev", "control-tower", "control-tower")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    pub fn default_location() -> Self {
        Self::in_dir(Self::default_dir())
    }

    /// Explicit file/dir overrides win over the data directory.
    pub fn resolve(
        data_dir: Option<PathBuf>,
        tasks_file: Option<PathBuf>,
        specs_dir: Option<PathBuf>,
    ) -> Self {
        let base = Self::in_dir(data_dir.unwrap_or_else(Self::default_dir));
        Self {
            tasks_file: tasks_file.unwrap_or(base.tasks_file),
            specs_dir: specs_dir.unwrap_or(base.specs_dir),
        }
    }
}
