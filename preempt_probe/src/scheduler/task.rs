// src/scheduler/task.rs
use super::policy;
use super::workload::Workload;
use crate::device::Device;
use crate::errors::ProbeError;
use probe_types::{SchedulingSpec, TaskReport, TaskRole};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Lifecycle of a priority task: Created → Scheduled → Running →
/// (Succeeded | Failed) → Joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TaskPhase {
    Created = 0,
    Scheduled = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
    Joined = 5,
}

impl TaskPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskPhase::Created,
            1 => TaskPhase::Scheduled,
            2 => TaskPhase::Running,
            3 => TaskPhase::Succeeded,
            4 => TaskPhase::Failed,
            _ => TaskPhase::Joined,
        }
    }

    fn step(self) -> u8 {
        match self {
            TaskPhase::Created => 0,
            TaskPhase::Scheduled => 1,
            TaskPhase::Running => 2,
            TaskPhase::Succeeded | TaskPhase::Failed => 3,
            TaskPhase::Joined => 4,
        }
    }
}

#[derive(Debug)]
struct PhaseCell {
    role: TaskRole,
    phase: AtomicU8,
}

impl PhaseCell {
    fn new(role: TaskRole) -> Self {
        Self { role, phase: AtomicU8::new(TaskPhase::Created as u8) }
    }

    fn get(&self) -> TaskPhase {
        TaskPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn advance(&self, next: TaskPhase) {
        let prev = TaskPhase::from_u8(self.phase.swap(next as u8, Ordering::AcqRel));
        debug_assert_eq!(prev.step() + 1, next.step(), "{prev:?} -> {next:?} skips a phase");
        debug!(task = self.role.label(), from = ?prev, to = ?next, "phase");
    }
}

/// A workload bound to its own scheduling spec, not yet handed to the OS.
pub struct PriorityTask {
    role: TaskRole,
    spec: SchedulingSpec,
    workload: Workload,
    device: Arc<dyn Device>,
    path: PathBuf,
    phase: Arc<PhaseCell>,
}

impl PriorityTask {
    pub fn new(
        role: TaskRole,
        spec: SchedulingSpec,
        workload: Workload,
        device: Arc<dyn Device>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            role,
            spec,
            workload,
            device,
            path: path.into(),
            phase: Arc::new(PhaseCell::new(role)),
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> TaskPhase {
        self.phase.get()
    }

    /// Start the task on its own OS thread. The spec is copied into the
    /// thread here and applied there before the workload runs.
    pub fn launch(self) -> Result<RunningTask, ProbeError> {
        let Self { role, spec, workload, device, path, phase } = self;

        info!(
            task = role.label(),
            policy = %spec.policy(),
            priority = spec.priority().get(),
            explicit = spec.inherit_explicit(),
            "launching task"
        );
        phase.advance(TaskPhase::Scheduled);

        let thread_phase = Arc::clone(&phase);
        let handle = thread::Builder::new()
            .name(role.thread_name().into())
            .spawn(move || {
                let scheduling_applied = match policy::apply_to_current_thread(&spec) {
                    Ok(applied) => applied,
                    Err(e) => {
                        warn!(
                            task = role.label(),
                            policy = %spec.policy(),
                            priority = spec.priority().get(),
                            error = %e,
                            "scheduling request refused; running with inherited scheduling"
                        );
                        false
                    }
                };
                if let Ok((raw_policy, raw_prio)) = policy::current_thread_scheduling() {
                    debug!(task = role.label(), raw_policy, raw_prio, "effective scheduling");
                }

                thread_phase.advance(TaskPhase::Running);
                let result = workload.run(role, device.as_ref(), &path);
                thread_phase.advance(if result.is_success() {
                    TaskPhase::Succeeded
                } else {
                    TaskPhase::Failed
                });

                TaskReport { spec, scheduling_applied, result }
            })
            .map_err(|source| ProbeError::Spawn { role, source })?;

        Ok(RunningTask { role, phase, handle })
    }
}

/// A launched task; `join` blocks until it has run to completion.
pub struct RunningTask {
    role: TaskRole,
    phase: Arc<PhaseCell>,
    handle: JoinHandle<TaskReport>,
}

impl RunningTask {
    pub fn role(&self) -> TaskRole {
        self.role
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase.get()
    }

    pub fn join(self) -> Result<TaskReport, ProbeError> {
        let report = self
            .handle
            .join()
            .map_err(|_| ProbeError::TaskPanicked { role: self.role })?;
        let finished = self.phase.get();
        self.phase.advance(TaskPhase::Joined);

        let r = &report.result;
        if let Some(error) = r.outcome.error_text() {
            warn!(
                task = self.role.label(),
                phase = ?finished,
                error,
                elapsed_secs = format_args!("{:.6}", r.elapsed_secs),
                "task joined with failure"
            );
        } else {
            info!(
                task = self.role.label(),
                phase = ?finished,
                elapsed_secs = format_args!("{:.6}", r.elapsed_secs),
                scheduling_applied = report.scheduling_applied,
                "task joined"
            );
        }
        Ok(report)
    }
}
