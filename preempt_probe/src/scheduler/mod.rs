// src/scheduler/mod.rs
pub mod policy;
pub mod task;
pub mod workload;

pub use task::PriorityTask;
pub use workload::Workload;
