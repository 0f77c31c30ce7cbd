// src/scheduler/workload.rs
use crate::device::{Accessor, ControlRequest, Device, PreemptToggle};
use crate::timing::{self, TimedSection};
use probe_types::{Outcome, TaskRole, TimedResult};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::info;

/// The body a priority task runs against the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// Open the device, keep the handle for `hold`, release it. Models the
    /// task occupying the contended resource.
    Hold { hold: Duration, toggle: PreemptToggle },
    /// Arrive `arrival` after the start stamp, then open and read at most
    /// `buf_len - 1` bytes.
    Read { arrival: Duration, buf_len: usize },
}

impl Workload {
    pub fn run(&self, role: TaskRole, device: &dyn Device, path: &Path) -> TimedResult {
        let accessor = Accessor::new(device, path, role);
        match *self {
            Workload::Hold { hold, toggle } => run_hold(&accessor, role, hold, toggle),
            Workload::Read { arrival, buf_len } => run_read(&accessor, role, arrival, buf_len),
        }
    }
}

fn run_hold(accessor: &Accessor<'_>, role: TaskRole, hold: Duration, toggle: PreemptToggle) -> TimedResult {
    timing::timed(role, || {
        // opened right after the start stamp: a failed open costs no hold time
        let mut handle = match accessor.open() {
            Ok(h) => h,
            Err(outcome) => return outcome,
        };
        if toggle.is_enabled() {
            if let Err(outcome) = accessor.control(handle.as_mut(), ControlRequest::DisablePreempt) {
                return outcome;
            }
        }

        thread::sleep(hold);

        if toggle.is_enabled() {
            println!("Enabling preemption...");
            if let Err(outcome) = accessor.control(handle.as_mut(), ControlRequest::EnablePreempt) {
                return outcome;
            }
        }
        drop(handle);
        Outcome::Success
    })
}

fn run_read(accessor: &Accessor<'_>, role: TaskRole, arrival: Duration, buf_len: usize) -> TimedResult {
    let section = TimedSection::start(role);
    // late arrival happens before the open, so a failed open still pays for it
    thread::sleep(arrival);

    let mut handle = match accessor.open() {
        Ok(h) => h,
        Err(outcome) => return section.finish(outcome),
    };
    let mut buf = vec![0u8; buf_len];
    let len = match accessor.read_bounded(handle.as_mut(), &mut buf) {
        Ok(len) => len,
        Err(outcome) => return section.finish(outcome),
    };
    drop(handle);

    info!(
        task = role.label(),
        bytes = len,
        data = %String::from_utf8_lossy(&buf[..len]),
        "device read"
    );
    section.finish(Outcome::Success).with_bytes_read(len)
}
