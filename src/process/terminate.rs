//! Platform termination strategies.
//!
//! POSIX-like systems get a group-wide interrupt followed, after a grace
//! period, by a group-wide kill. Elsewhere there is no user-level interrupt
//! that reaches a detached child, so the whole process tree is killed at once.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ControlError;

/// How a running process should be brought down.
pub trait Terminator: Send + Sync + fmt::Debug {
    /// Whether [`interrupt`](Self::interrupt) is meaningful and should be
    /// followed by a grace period before [`kill`](Self::kill).
    fn is_graceful(&self) -> bool;

    /// Asks the process and its descendants to stop.
    fn interrupt(&self, pid: u32) -> Result<(), ControlError>;

    /// Unconditionally ends the process and its descendants.
    fn kill(&self, pid: u32) -> Result<(), ControlError>;
}

/// Which [`Terminator`] the controller uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationMode {
    /// Group signalling where available, forced tree kill otherwise.
    #[default]
    Auto,
    GroupSignal,
    ForcedTree,
}

pub fn select(mode: TerminationMode) -> Arc<dyn Terminator> {
    match mode {
        TerminationMode::ForcedTree => Arc::new(ForcedTree),
        #[cfg(unix)]
        TerminationMode::Auto | TerminationMode::GroupSignal => Arc::new(GroupSignal),
        #[cfg(not(unix))]
        TerminationMode::Auto | TerminationMode::GroupSignal => {
            tracing::warn!("group signalling is unavailable on this platform, using forced tree kill");
            Arc::new(ForcedTree)
        }
    }
}

/// SIGINT then SIGKILL delivered to the child's process group.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupSignal;

#[cfg(unix)]
impl GroupSignal {
    fn signal(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), ControlError> {
        use nix::sys::signal::killpg;
        use nix::unistd::{getpgid, Pid};

        let pid = i32::try_from(pid).map_err(|e| ControlError::Signal(e.to_string()))?;
        let pgid = getpgid(Some(Pid::from_raw(pid))).map_err(|e| ControlError::Signal(e.to_string()))?;
        tracing::debug!("sending {:?} to process group {}", signal, pgid);
        killpg(pgid, signal).map_err(|e| ControlError::Signal(e.to_string()))
    }
}

#[cfg(unix)]
impl Terminator for GroupSignal {
    fn is_graceful(&self) -> bool {
        true
    }

    fn interrupt(&self, pid: u32) -> Result<(), ControlError> {
        Self::signal(pid, nix::sys::signal::Signal::SIGINT)
    }

    fn kill(&self, pid: u32) -> Result<(), ControlError> {
        Self::signal(pid, nix::sys::signal::Signal::SIGKILL)
    }
}

/// Immediate forced termination of the process and its descendants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForcedTree;

impl Terminator for ForcedTree {
    fn is_graceful(&self) -> bool {
        false
    }

    fn interrupt(&self, pid: u32) -> Result<(), ControlError> {
        self.kill(pid)
    }

    #[cfg(unix)]
    fn kill(&self, pid: u32) -> Result<(), ControlError> {
        GroupSignal::signal(pid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(windows)]
    fn kill(&self, pid: u32) -> Result<(), ControlError> {
        use std::os::windows::process::CommandExt;
        use std::process::{Command, Stdio};

        const CREATE_NO_WINDOW: u32 = 0x0800_0000;

        let status = Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .creation_flags(CREATE_NO_WINDOW)
            .status()
            .map_err(|e| ControlError::Signal(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(ControlError::Signal(format!("taskkill exited with {status}")))
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn kill(&self, _pid: u32) -> Result<(), ControlError> {
        Err(ControlError::Signal("process termination is not supported on this platform".to_string()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::os::unix::process::{CommandExt, ExitStatusExt};
    use std::process::{Command, Stdio};

    fn spawn_grouped(script: &str) -> std::process::Child {
        Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .unwrap()
    }

    #[test]
    fn test_group_interrupt_stops_sleeping_group() {
        let mut child = spawn_grouped("sleep 30");
        GroupSignal.interrupt(child.id()).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_group_kill_reaches_process_ignoring_interrupt() {
        let mut child = spawn_grouped("trap '' INT; sleep 30");
        GroupSignal.kill(child.id()).unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(nix::libc::SIGKILL));
    }

    #[test]
    fn test_forced_tree_is_not_graceful() {
        assert!(!ForcedTree.is_graceful());
        assert!(GroupSignal.is_graceful());

        let mut child = spawn_grouped("sleep 30");
        ForcedTree.interrupt(child.id()).unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(nix::libc::SIGKILL));
    }

    #[test]
    fn test_signal_to_missing_process_is_an_error() {
        let mut child = spawn_grouped("exit 0");
        let pid = child.id();
        child.wait().unwrap();

        let err = GroupSignal.interrupt(pid).unwrap_err();
        assert!(matches!(err, ControlError::Signal(_)));
    }

    #[test]
    fn test_auto_mode_selects_group_signal() {
        assert!(select(TerminationMode::Auto).is_graceful());
        assert!(!select(TerminationMode::ForcedTree).is_graceful());
    }
}
