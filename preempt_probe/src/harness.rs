// src/harness.rs
// builds the two contending tasks and runs them per mode
use crate::config::HarnessConfig;
use crate::device::Device;
use crate::errors::ProbeError;
use crate::scheduler::task::RunningTask;
use crate::scheduler::{PriorityTask, Workload};
use probe_types::{SchedulingSpec, TaskReport, TaskRole};

use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Both tasks, launched back to back with explicit scheduling.
    Concurrent,
    HighOnly,
    LowOnly,
    /// Unrecognised mode string: nothing runs.
    Idle,
}

impl RunMode {
    /// Map the positional arguments onto a mode. More than one is rejected.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ProbeError> {
        match args {
            [] => Ok(RunMode::Concurrent),
            [one] => Ok(match one.as_ref() {
                "1" => RunMode::HighOnly,
                "2" => RunMode::LowOnly,
                _ => RunMode::Idle,
            }),
            _ => Err(ProbeError::InvalidInvocation { args: args.len() }),
        }
    }
}

pub struct Harness {
    cfg: HarnessConfig,
    device: Arc<dyn Device>,
}

impl Harness {
    pub fn new(cfg: HarnessConfig, device: Arc<dyn Device>) -> Self {
        Self { cfg, device }
    }

    fn spec(&self, role: TaskRole, explicit: bool) -> Result<SchedulingSpec, ProbeError> {
        let priority = match role {
            TaskRole::High => self.cfg.hi_priority,
            TaskRole::Low => self.cfg.lo_priority,
        };
        Ok(SchedulingSpec::round_robin(priority)?.with_explicit(explicit))
    }

    fn task(&self, role: TaskRole, explicit: bool) -> Result<PriorityTask, ProbeError> {
        let workload = match role {
            TaskRole::High => Workload::Hold { hold: self.cfg.hold, toggle: self.cfg.toggle },
            TaskRole::Low => Workload::Read { arrival: self.cfg.arrival, buf_len: self.cfg.read_buf },
        };
        Ok(PriorityTask::new(
            role,
            self.spec(role, explicit)?,
            workload,
            Arc::clone(&self.device),
            self.cfg.device_path.clone(),
        ))
    }

    /// Launch the tasks `mode` selects and join them in launch order.
    /// Task failures come back inside the reports; only spawn/panic are errors.
    pub fn run(&self, mode: RunMode) -> Result<Vec<TaskReport>, ProbeError> {
        info!(?mode, device = %self.cfg.device_path.display(), "harness run");
        match mode {
            RunMode::Concurrent => self.run_concurrent(),
            // single-task modes inherit the creator's scheduling
            RunMode::HighOnly => Ok(vec![self.task(TaskRole::High, false)?.launch()?.join()?]),
            RunMode::LowOnly => Ok(vec![self.task(TaskRole::Low, false)?.launch()?.join()?]),
            RunMode::Idle => Ok(Vec::new()),
        }
    }

    fn run_concurrent(&self) -> Result<Vec<TaskReport>, ProbeError> {
        // both specs are built up front, each a separate value
        let hi = self.task(TaskRole::High, true)?;
        let lo = self.task(TaskRole::Low, true)?;

        let t1 = hi.launch()?;
        let t2 = match lo.launch() {
            Ok(t) => t,
            Err(e) => {
                // don't leave the first task detached
                join_abandoned(t1);
                return Err(e);
            }
        };
        info!(
            first = t1.role().label(),
            first_phase = ?t1.phase(),
            second = t2.role().label(),
            "both tasks launched"
        );

        let first = t1.join()?;
        let second = t2.join()?;
        Ok(vec![first, second])
    }
}

/// Join a task whose partner never launched. The run is already failing, so
/// the report is only logged.
fn join_abandoned(task: RunningTask) -> Option<TaskReport> {
    let role = task.role();
    match task.join() {
        Ok(report) => {
            warn!(
                task = role.label(),
                outcome = ?report.result.outcome,
                elapsed_secs = format_args!("{:.6}", report.result.elapsed_secs),
                "partner launch failed; task joined alone"
            );
            Some(report)
        }
        Err(e) => {
            warn!(task = role.label(), error = %e, "partner launch failed; task did not finish");
            None
        }
    }
}
