//! File operations: the task model, its executor and the async engine.

pub mod engine;
pub mod executor;
pub mod lock;
pub mod task;

pub use engine::{OperationEngine, TaskHandle};
pub use executor::{execute, ExecutionContext, ExecutorOptions};
pub use task::{
    ConflictPolicy, ItemOutcome, ItemResult, OperationItem, OperationKind, OperationTask,
    SkipReason, TaskId, TaskReport, TaskStatus,
};
