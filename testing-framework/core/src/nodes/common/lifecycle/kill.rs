use std::{io, process::Child, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::monitor::{is_running, wait_for_exit};

/// How a node process is asked to stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationMode {
    /// SIGINT, then wait for a clean exit; SIGKILL once the grace period
    /// runs out.
    Gentle,
    /// SIGKILL straight away.
    Forceful,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process was running and has now exited. `forced` is set when it
    /// had to be killed.
    Stopped { forced: bool },
    /// The process had already exited; nothing was sent.
    AlreadyStopped,
}

#[derive(Debug, Error)]
pub enum TerminateError {
    #[cfg(unix)]
    #[error("failed to send SIGINT to pid {pid}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },
    #[error("failed to kill pid {pid}")]
    Kill {
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to reap pid {pid}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Forceful best-effort kill used on drop paths.
pub fn kill_child(child: &mut Child) {
    if !is_running(child) {
        return;
    }
    debug!(pid = child.id(), "killing child process");
    let _ = child.kill();
    let _ = child.wait();
}

/// Stop `child` according to `mode`. Calling it again on a stopped process
/// returns [`TerminationOutcome::AlreadyStopped`].
pub async fn terminate_child(
    child: &mut Child,
    mode: TerminationMode,
    grace_period: Duration,
) -> Result<TerminationOutcome, TerminateError> {
    let pid = child.id();
    if !is_running(child) {
        debug!(pid, "process already stopped");
        return Ok(TerminationOutcome::AlreadyStopped);
    }

    match mode {
        TerminationMode::Gentle => {
            if !send_interrupt(child)? {
                return Ok(TerminationOutcome::AlreadyStopped);
            }
            if wait_for_exit(child, grace_period).await {
                info!(pid, "process exited after SIGINT");
                return Ok(TerminationOutcome::Stopped { forced: false });
            }
            warn!(
                pid,
                grace_secs = grace_period.as_secs_f32(),
                "process ignored SIGINT, killing"
            );
            force_kill(child)?;
            Ok(TerminationOutcome::Stopped { forced: true })
        }
        TerminationMode::Forceful => {
            force_kill(child)?;
            info!(pid, "process killed");
            Ok(TerminationOutcome::Stopped { forced: true })
        }
    }
}

/// Returns false when the process vanished before the signal landed.
#[cfg(unix)]
fn send_interrupt(child: &Child) -> Result<bool, TerminateError> {
    use nix::{
        errno::Errno,
        sys::signal::{Signal, kill},
        unistd::Pid,
    };

    let pid = child.id();
    let raw = i32::try_from(pid).map_err(|_| TerminateError::Signal {
        pid,
        source: Errno::ESRCH,
    })?;

    debug!(pid, "sending SIGINT");
    match kill(Pid::from_raw(raw), Signal::SIGINT) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(TerminateError::Signal { pid, source }),
    }
}

#[cfg(not(unix))]
fn send_interrupt(child: &mut Child) -> Result<bool, TerminateError> {
    force_kill(child)?;
    Ok(true)
}

fn force_kill(child: &mut Child) -> Result<(), TerminateError> {
    let pid = child.id();
    if let Err(source) = child.kill() {
        if source.kind() != io::ErrorKind::InvalidInput {
            return Err(TerminateError::Kill { pid, source });
        }
    }
    child
        .wait()
        .map(|_| ())
        .map_err(|source| TerminateError::Wait { pid, source })
}
