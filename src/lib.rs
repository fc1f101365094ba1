pub mod engine;
pub mod export;
pub mod guard;
pub mod models;
pub mod reading;
pub mod sensor;
pub mod store;
mod utils;

pub use engine::{Clock, Engine, EngineConfig, EngineEvent, Snapshot, SystemClock};
pub use models::{
    ActiveTask, EndAction, HistoryEntry, ResetScope, ResetSource, SessionRecord, TaskStatus,
};
pub use reading::TimerReading;
pub use sensor::{FileSensor, PageSample, PageSensor};
pub use store::Store;
