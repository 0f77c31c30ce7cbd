//Command line interface
// runtime configuration (device path, priorities, delay windows)
use crate::device::PreemptToggle;
use crate::errors::ProbeError;
use crate::harness::RunMode;
use clap::Parser;
use probe_types::{DEFAULT_DEVICE_PATH, RT_PRIORITY_MAX, RT_PRIORITY_MIN};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: RunMode,
    pub harness: HarnessConfig,
    pub json: bool,
    pub strict_exit: bool,
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub device_path: PathBuf,
    pub hi_priority: u8,
    pub lo_priority: u8,
    /// How long the high-priority task keeps the device open.
    pub hold: Duration,
    /// Delay before the low-priority task opens the device.
    pub arrival: Duration,
    pub read_buf: usize,
    pub toggle: PreemptToggle,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            hi_priority: 50,
            lo_priority: 30,
            hold: Duration::from_secs(3),
            arrival: Duration::from_secs(1),
            read_buf: 20,
            toggle: PreemptToggle::Disabled,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), ProbeError> {
        let rt = RT_PRIORITY_MIN..=RT_PRIORITY_MAX;
        for (name, p) in [("hi-priority", self.hi_priority), ("lo-priority", self.lo_priority)] {
            if !rt.contains(&p) {
                return Err(ProbeError::InvalidConfig(format!(
                    "{name} {p} outside {RT_PRIORITY_MIN}..={RT_PRIORITY_MAX}"
                )));
            }
        }
        if self.hi_priority <= self.lo_priority {
            return Err(ProbeError::InvalidConfig(format!(
                "hi-priority ({}) must be greater than lo-priority ({})",
                self.hi_priority, self.lo_priority
            )));
        }
        if self.read_buf == 0 {
            return Err(ProbeError::InvalidConfig("read-buf must be at least 1".into()));
        }
        Ok(())
    }
}

/// Preemption probe: a high-priority holder and a low-priority reader contend
/// for one character device.
#[derive(Parser, Debug, Clone)]
#[command(name = "preempt_probe", version)]
pub struct Cli {
    /// Omit to run both tasks, `1` for the high-priority task only, `2` for the low-priority task only.
    /// Unrecognised values, including ones starting with `-`, select the idle mode.
    #[arg(value_name = "MODE", allow_hyphen_values = true)]
    pub mode: Vec<String>,
    #[arg(long, default_value = DEFAULT_DEVICE_PATH)] pub device: PathBuf,
    #[arg(long, default_value_t = 50)]               pub hi_priority: u8,
    #[arg(long, default_value_t = 30)]               pub lo_priority: u8,
    #[arg(long, default_value_t = 3000)]             pub hold_ms: u64,
    #[arg(long, default_value_t = 1000)]             pub arrival_ms: u64,
    #[arg(long, default_value_t = 20)]               pub read_buf: usize,
    /// Bracket the hold with DISABLE_PREEMPT / ENABLE_PREEMPT control requests.
    #[arg(long)]                                     pub preempt_toggle: bool,
    /// Print every task report as a JSON line once all tasks are joined.
    #[arg(long)]                                     pub json: bool,
    /// Exit with status 1 when any task reports a failure.
    #[arg(long)]                                     pub strict_exit: bool,
}

impl Cli {
    pub fn parse_and_build_config() -> Result<Config, ProbeError> {
        <Cli as Parser>::parse().build_config()
    }

    pub fn build_config(self) -> Result<Config, ProbeError> {
        // argument count is checked before anything else is looked at
        let mode = RunMode::from_args(&self.mode)?;
        let harness = HarnessConfig {
            device_path: self.device,
            hi_priority: self.hi_priority,
            lo_priority: self.lo_priority,
            hold: Duration::from_millis(self.hold_ms),
            arrival: Duration::from_millis(self.arrival_ms),
            read_buf: self.read_buf,
            toggle: if self.preempt_toggle {
                PreemptToggle::Enabled
            } else {
                PreemptToggle::Disabled
            },
        };
        harness.validate()?;
        Ok(Config {
            mode,
            harness,
            json: self.json,
            strict_exit: self.strict_exit,
        })
    }
}
