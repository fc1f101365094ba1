mod history;
mod reset;
mod session;
mod task;

pub use history::HistoryEntry;
pub use reset::{ResetScope, ResetSource};
pub use session::{EndAction, SessionRecord};
pub use task::{ActiveTask, TaskStatus};
