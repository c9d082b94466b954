mod export;
mod log;
mod subtask;
mod task;
mod topic;

pub use export::*;
pub use log::*;
pub use subtask::*;
pub use task::*;
pub use topic::*;
