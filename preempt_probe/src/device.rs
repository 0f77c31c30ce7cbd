//! Resource accessor for the contended character device.
//!
//! The device itself is an external collaborator: this module only knows how to
//! open it read-only, issue one bounded read, and (optionally) send the two
//! preemption control requests. Every failure is turned into an [`Outcome`]
//! after its diagnostic line has been printed.
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::path::Path;

use probe_types::{Outcome, TaskRole};
use tracing::warn;

/// `_IO(kind, nr)`: no direction bits, no payload size.
pub const fn io_request(kind: u8, nr: u8) -> u64 {
    ((kind as u64) << 8) | nr as u64
}

pub const ENABLE_PREEMPT: u64 = io_request(b'a', 3);
pub const DISABLE_PREEMPT: u64 = io_request(b'a', 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    EnablePreempt,
    DisablePreempt,
}

impl ControlRequest {
    pub fn code(self) -> u64 {
        match self {
            ControlRequest::EnablePreempt => ENABLE_PREEMPT,
            ControlRequest::DisablePreempt => DISABLE_PREEMPT,
        }
    }

    fn action(self) -> &'static str {
        match self {
            ControlRequest::EnablePreempt => "enable",
            ControlRequest::DisablePreempt => "disable",
        }
    }
}

/// Whether the holding task brackets its hold with disable/enable requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreemptToggle {
    #[default]
    Disabled,
    Enabled,
}

impl PreemptToggle {
    pub fn is_enabled(self) -> bool {
        self == PreemptToggle::Enabled
    }
}

/// One open reference to the device, owned by a single task. Closed on drop.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceHandle: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn control(&mut self, request: ControlRequest) -> io::Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait Device: Send + Sync {
    /// Open `path` read-only.
    fn open(&self, path: &Path) -> io::Result<Box<dyn DeviceHandle>>;
}

/// The real character device node.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharDevice;

impl Device for CharDevice {
    fn open(&self, path: &Path) -> io::Result<Box<dyn DeviceHandle>> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Box::new(CharHandle { file }))
    }
}

struct CharHandle {
    file: File,
}

impl DeviceHandle for CharHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn control(&mut self, request: ControlRequest) -> io::Result<()> {
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), request.code() as _) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

fn open_failure_line(role: TaskRole, path: &Path, err: &io::Error) -> String {
    format!("{} open {} failed. error:{}", role.label(), path.display(), err)
}

fn read_failure_line(role: TaskRole, err: &io::Error) -> String {
    format!("{} read failed. error:{}", role.label(), err)
}

/// Task-scoped view of the device: prints the task's diagnostics and maps
/// I/O errors onto outcomes.
pub struct Accessor<'a> {
    device: &'a dyn Device,
    path: &'a Path,
    role: TaskRole,
}

impl<'a> Accessor<'a> {
    pub fn new(device: &'a dyn Device, path: &'a Path, role: TaskRole) -> Self {
        Self { device, path, role }
    }

    pub fn open(&self) -> Result<Box<dyn DeviceHandle>, Outcome> {
        self.device.open(self.path).map_err(|e| {
            println!("{}", open_failure_line(self.role, self.path, &e));
            warn!(task = self.role.label(), path = %self.path.display(), error = %e, "open failed");
            Outcome::OpenFailed(e.to_string())
        })
    }

    /// Read at most `buf.len() - 1` bytes and terminate at the returned length.
    /// The terminator is only written once the read has succeeded.
    pub fn read_bounded(&self, handle: &mut dyn DeviceHandle, buf: &mut [u8]) -> Result<usize, Outcome> {
        let cap = buf.len().saturating_sub(1);
        match handle.read(&mut buf[..cap]) {
            Ok(n) => {
                let len = n.min(cap);
                if let Some(term) = buf.get_mut(len) {
                    *term = 0;
                }
                Ok(len)
            }
            Err(e) => {
                println!("{}", read_failure_line(self.role, &e));
                warn!(task = self.role.label(), error = %e, "read failed");
                Err(Outcome::ReadFailed(e.to_string()))
            }
        }
    }

    pub fn control(&self, handle: &mut dyn DeviceHandle, request: ControlRequest) -> Result<(), Outcome> {
        handle.control(request).map_err(|e| {
            println!("Failed to {} preemption: {}", request.action(), e);
            warn!(task = self.role.label(), ?request, error = %e, "control request failed");
            Outcome::ControlFailed(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    fn eio() -> io::Error {
        io::Error::from_raw_os_error(libc::EIO)
    }

    #[test]
    fn control_codes_match_io_macro() {
        assert_eq!(ENABLE_PREEMPT, 0x6103);
        assert_eq!(DISABLE_PREEMPT, 0x6104);
        assert_eq!(ControlRequest::DisablePreempt.code(), DISABLE_PREEMPT);
    }

    #[test]
    fn open_failure_carries_os_text() {
        let mut dev = MockDevice::new();
        dev.expect_open()
            .times(1)
            .returning(|_| Err(io::Error::from_raw_os_error(libc::ENOENT)));

        let acc = Accessor::new(&dev, Path::new("/dev/missing"), TaskRole::High);
        match acc.open() {
            Err(Outcome::OpenFailed(text)) => assert!(!text.is_empty()),
            Err(other) => panic!("unexpected outcome {other:?}"),
            Ok(_) => panic!("open should fail"),
        }
    }

    #[test]
    fn failure_lines_name_task_and_os_text() {
        let enoent = io::Error::new(io::ErrorKind::NotFound, "No such file or directory");
        assert_eq!(
            open_failure_line(TaskRole::High, Path::new("/dev/mychardev-0"), &enoent),
            "T1 open /dev/mychardev-0 failed. error:No such file or directory"
        );
        let eio = io::Error::other("Input/output error");
        assert_eq!(read_failure_line(TaskRole::Low, &eio), "T2 read failed. error:Input/output error");
    }

    #[test]
    fn bounded_read_leaves_room_for_terminator() {
        let mut handle = MockDeviceHandle::new();
        handle
            .expect_read()
            .withf(|buf| buf.len() == 19)
            .times(1)
            .returning(|buf| {
                buf.fill(b'x');
                Ok(buf.len())
            });

        let dev = MockDevice::new();
        let acc = Accessor::new(&dev, Path::new("/dev/x"), TaskRole::Low);
        let mut buf = [0xffu8; 20];
        let n = acc.read_bounded(&mut handle, &mut buf).unwrap();
        assert_eq!(n, 19);
        assert_eq!(buf[19], 0);
        assert!(buf[..19].iter().all(|&b| b == b'x'));
    }

    #[test]
    fn failed_read_never_writes_terminator() {
        let mut handle = MockDeviceHandle::new();
        handle.expect_read().times(1).returning(|_| Err(eio()));

        let dev = MockDevice::new();
        let acc = Accessor::new(&dev, Path::new("/dev/x"), TaskRole::Low);
        let mut buf = [0xffu8; 20];
        let out = acc.read_bounded(&mut handle, &mut buf);
        assert!(matches!(out, Err(Outcome::ReadFailed(ref t)) if !t.is_empty()));
        assert!(buf.iter().all(|&b| b == 0xff));
    }

    #[test]
    fn overlong_read_report_is_clamped() {
        let mut handle = MockDeviceHandle::new();
        handle.expect_read().returning(|_| Ok(4096));

        let dev = MockDevice::new();
        let acc = Accessor::new(&dev, Path::new("/dev/x"), TaskRole::Low);
        let mut buf = [1u8; 8];
        assert_eq!(acc.read_bounded(&mut handle, &mut buf).unwrap(), 7);
        assert_eq!(buf[7], 0);
    }

    #[test]
    fn control_failure_maps_to_outcome() {
        let mut handle = MockDeviceHandle::new();
        handle
            .expect_control()
            .withf(|r| *r == ControlRequest::DisablePreempt)
            .times(1)
            .returning(|_| Err(io::Error::from_raw_os_error(libc::ENOTTY)));

        let dev = MockDevice::new();
        let acc = Accessor::new(&dev, Path::new("/dev/x"), TaskRole::High);
        let out = acc.control(&mut handle, ControlRequest::DisablePreempt);
        assert!(matches!(out, Err(Outcome::ControlFailed(_))));
    }

    #[test]
    fn char_device_reads_regular_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello from the device").unwrap();

        let dev = CharDevice;
        let acc = Accessor::new(&dev, f.path(), TaskRole::Low);
        let mut first = acc.open().unwrap();
        let mut second = acc.open().unwrap();

        let mut buf = [0u8; 20];
        let n = acc.read_bounded(first.as_mut(), &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello from the devi");
        assert_eq!(buf[n], 0);

        // independent handle, independent offset
        let mut buf2 = [0u8; 6];
        let n2 = acc.read_bounded(second.as_mut(), &mut buf2).unwrap();
        assert_eq!(&buf2[..n2], b"hello");
    }

    #[test]
    fn ioctl_on_regular_file_is_rejected() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let mut handle = CharDevice.open(f.path()).unwrap();
        assert!(handle.control(ControlRequest::EnablePreempt).is_err());
    }

    proptest! {
        #[test]
        fn reported_length_is_clamped_and_terminated(buf_len in 1usize..64, reported in 0usize..256) {
            let mut handle = MockDeviceHandle::new();
            handle.expect_read().times(1).returning(move |_| Ok(reported));

            let dev = MockDevice::new();
            let acc = Accessor::new(&dev, Path::new("/dev/x"), TaskRole::Low);
            let mut buf = vec![0xffu8; buf_len];
            let n = acc.read_bounded(&mut handle, &mut buf).unwrap();

            prop_assert_eq!(n, reported.min(buf_len - 1));
            prop_assert_eq!(buf[n], 0);
            prop_assert!(buf[n + 1..].iter().all(|&b| b == 0xff));
        }

        #[test]
        fn failed_read_leaves_any_buffer_untouched(buf_len in 1usize..64) {
            let mut handle = MockDeviceHandle::new();
            handle.expect_read().times(1).returning(|_| Err(eio()));

            let dev = MockDevice::new();
            let acc = Accessor::new(&dev, Path::new("/dev/x"), TaskRole::Low);
            let mut buf = vec![0xffu8; buf_len];
            prop_assert!(acc.read_bounded(&mut handle, &mut buf).is_err());
            prop_assert!(buf.iter().all(|&b| b == 0xff));
        }
    }
}
