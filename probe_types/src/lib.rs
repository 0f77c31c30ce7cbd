// lib.rs — Shared model for the preemption probe: scheduling specs, wall stamps, timed results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

// =============================== Common =====================================

pub const DEFAULT_DEVICE_PATH: &str = "/dev/mychardev-0";

/// Linux real-time priority window for `SCHED_RR` / `SCHED_FIFO`.
pub const RT_PRIORITY_MIN: u8 = 1;
pub const RT_PRIORITY_MAX: u8 = 99;

const MICROS_PER_SEC: u32 = 1_000_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("priority {priority} outside {min}..={max} for {policy} policy")]
    PriorityOutOfRange {
        policy: Policy,
        priority: u8,
        min: u8,
        max: u8,
    },
}

// =============================== Enums ======================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Real-time round-robin class.
    RoundRobin,
    /// Default time-sharing class; priority is always 0.
    Other,
}

impl Policy {
    pub fn priority_range(self) -> RangeInclusive<u8> {
        match self {
            Policy::RoundRobin => RT_PRIORITY_MIN..=RT_PRIORITY_MAX,
            Policy::Other => 0..=0,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::RoundRobin => f.write_str("round-robin"),
            Policy::Other => f.write_str("other"),
        }
    }
}

/// Which side of the contention a task plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRole {
    High,
    Low,
}

impl TaskRole {
    /// Console label used in every report line.
    pub fn label(self) -> &'static str {
        match self {
            TaskRole::High => "T1",
            TaskRole::Low => "T2",
        }
    }

    pub fn thread_name(self) -> &'static str {
        match self {
            TaskRole::High => "t1-hi",
            TaskRole::Low => "t2-lo",
        }
    }
}

impl fmt::Display for TaskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRole::High => f.write_str("high-priority"),
            TaskRole::Low => f.write_str("low-priority"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    OpenFailed(String),
    ReadFailed(String),
    /// Only reachable when the preemption toggle is enabled.
    ControlFailed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// OS error text carried by a failed outcome.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Outcome::Success => None,
            Outcome::OpenFailed(e) | Outcome::ReadFailed(e) | Outcome::ControlFailed(e) => Some(e),
        }
    }
}

// ============================== Scheduling ==================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub fn get(self) -> u8 {
        self.0
    }
}

/// Per-task scheduling request. Built fresh for every task and moved by value
/// into the thread that applies it, so a later spec never touches an earlier task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulingSpec {
    policy: Policy,
    priority: Priority,
    inherit_explicit: bool,
}

impl SchedulingSpec {
    pub fn new(policy: Policy, priority: u8, inherit_explicit: bool) -> Result<Self, SpecError> {
        let range = policy.priority_range();
        if !range.contains(&priority) {
            return Err(SpecError::PriorityOutOfRange {
                policy,
                priority,
                min: *range.start(),
                max: *range.end(),
            });
        }
        Ok(Self {
            policy,
            priority: Priority(priority),
            inherit_explicit,
        })
    }

    /// Round-robin at `priority`, applied explicitly (not inherited from the creator).
    pub fn round_robin(priority: u8) -> Result<Self, SpecError> {
        Self::new(Policy::RoundRobin, priority, true)
    }

    pub fn with_explicit(self, inherit_explicit: bool) -> Self {
        Self {
            inherit_explicit,
            ..self
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn inherit_explicit(&self) -> bool {
        self.inherit_explicit
    }

    /// True when `self` would preempt `other` under the same real-time class.
    pub fn outranks(&self, other: &SchedulingSpec) -> bool {
        match (self.policy, other.policy) {
            (Policy::RoundRobin, Policy::Other) => true,
            (Policy::Other, _) => false,
            (Policy::RoundRobin, Policy::RoundRobin) => self.priority > other.priority,
        }
    }
}

// =============================== Timing =====================================

/// Wall-clock stamp with microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallTime {
    pub secs: i64,
    pub micros: u32,
}

impl WallTime {
    pub fn new(secs: i64, micros: u32) -> Self {
        Self {
            secs: secs + i64::from(micros / MICROS_PER_SEC),
            micros: micros % MICROS_PER_SEC,
        }
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        // leap seconds report up to 1_999_999
        Self::new(dt.timestamp(), dt.timestamp_subsec_micros().min(MICROS_PER_SEC - 1))
    }

    /// Seconds from `start` to `self`, borrowing across the microsecond/second
    /// boundary. A clock that stepped backwards yields `0.0`.
    pub fn elapsed_secs_since(self, start: WallTime) -> f64 {
        let secs = (self.secs - start.secs) as f64;
        let micros = (i64::from(self.micros) - i64::from(start.micros)) as f64;
        (secs + micros / f64::from(MICROS_PER_SEC)).max(0.0)
    }
}

impl fmt::Display for WallTime {
    /// `secs.nnnnnnnnn`, nanosecond-formatted from the microsecond reading.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, u64::from(self.micros) * 1_000)
    }
}

// =============================== Results ====================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedResult {
    pub role: TaskRole,
    pub start: WallTime,
    pub stop: WallTime,
    pub elapsed_secs: f64,
    pub outcome: Outcome,
    /// Bytes returned by the bounded read; `None` when no read completed.
    pub bytes_read: Option<usize>,
}

impl TimedResult {
    pub fn new(role: TaskRole, start: WallTime, stop: WallTime, outcome: Outcome) -> Self {
        Self {
            role,
            start,
            stop,
            elapsed_secs: stop.elapsed_secs_since(start),
            outcome,
            bytes_read: None,
        }
    }

    pub fn with_bytes_read(mut self, n: usize) -> Self {
        self.bytes_read = Some(n);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// What a joined task hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub spec: SchedulingSpec,
    /// False when the spec was inherited or the OS refused it.
    pub scheduling_applied: bool,
    pub result: TimedResult,
}

// ================================ Tests =====================================
