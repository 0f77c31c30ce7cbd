// src/scheduler/policy.rs
// maps validated SchedulingSpec values onto pthread scheduling calls
use probe_types::{Policy, SchedulingSpec};
use std::io;

fn raw_policy(policy: Policy) -> libc::c_int {
    match policy {
        Policy::RoundRobin => libc::SCHED_RR,
        Policy::Other => libc::SCHED_OTHER,
    }
}

/// Apply `spec` to the calling thread.
///
/// Returns `Ok(false)` without touching the thread when the spec asks to
/// inherit its creator's scheduling, `Ok(true)` once the kernel accepted it.
pub fn apply_to_current_thread(spec: &SchedulingSpec) -> io::Result<bool> {
    if !spec.inherit_explicit() {
        return Ok(false);
    }
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = libc::c_int::from(spec.priority().get());
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), raw_policy(spec.policy()), &param) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(true)
}

/// Effective `(policy, priority)` of the calling thread.
pub fn current_thread_scheduling() -> io::Result<(libc::c_int, libc::c_int)> {
    let mut policy: libc::c_int = 0;
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::pthread_getschedparam(libc::pthread_self(), &mut policy, &mut param) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok((policy, param.sched_priority))
}
