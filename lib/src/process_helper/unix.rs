use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, Stdio};

use command_group::{CommandGroup, GroupChild, Signal, UnixChildExt};
use log::info;

use crate::error::Error;

/// The outcome of a finished task's process: either the exit code the process returned, or
/// the signal number that terminated it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Code(i32),
    Signal(i32),
}

/// A spawned child, owning its process group and standard-stream file descriptors.
///
/// Every signal sent through this handle targets the whole process group, so that a
/// task's entire subtree (e.g. a shell wrapping a pipeline) reacts uniformly to
/// suspend/resume/kill.
pub struct ProcessHandle {
    child: GroupChild,
    reaped: bool,
}

impl ProcessHandle {
    /// Launch `command` (first element is the executable, the rest its arguments) in a
    /// fresh process group, with `cwd`/`env` applied and stdout/stderr redirected to the
    /// given sinks.
    pub fn spawn(
        command: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
        stdout: Stdio,
        stderr: Stdio,
    ) -> Result<ProcessHandle, Error> {
        let (program, args) = command
            .split_first()
            .expect("submit validates that command is non-empty");

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .group_spawn()
            .map_err(Error::IoError)?;

        Ok(ProcessHandle {
            child,
            reaped: false,
        })
    }

    /// The OS process id of the group leader.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Deliver `signal` to the task's process group. Fails with [Error::ProcessGone] if the
    /// child has already been reaped via [ProcessHandle::wait].
    pub fn signal(&mut self, task_id: usize, signal: Signal) -> Result<(), Error> {
        if self.reaped {
            return Err(Error::ProcessGone(task_id));
        }

        self.child.signal(signal).map_err(|err| {
            info!("Signal {signal:?} to task {task_id} failed, treating as gone: {err}");
            Error::ProcessGone(task_id)
        })
    }

    /// Send the job-control stop signal (SIGSTOP) to pause the task.
    pub fn stop(&mut self, task_id: usize) -> Result<(), Error> {
        self.signal(task_id, Signal::SIGSTOP)
    }

    /// Send the job-control continue signal (SIGCONT) to resume the task.
    pub fn cont(&mut self, task_id: usize) -> Result<(), Error> {
        self.signal(task_id, Signal::SIGCONT)
    }

    /// Block until the child terminates, then release its standard-stream file descriptors.
    /// At most one call to this ever completes successfully; it correctly keeps blocking
    /// while the child is merely stopped (SIGSTOP), since `wait(2)` only wakes on
    /// termination.
    pub fn wait(&mut self) -> Result<ExitStatus, Error> {
        let status = self.child.wait().map_err(Error::IoError)?;
        self.reaped = true;
        Ok(Self::exit_status_of(status))
    }

    /// Non-blocking poll: `Ok(None)` while the child (including a merely stopped one) hasn't
    /// exited yet, `Ok(Some(_))` once it has.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, Error> {
        let status = self.child.try_wait().map_err(Error::IoError)?;
        if let Some(status) = status {
            self.reaped = true;
        }
        Ok(status.map(Self::exit_status_of))
    }

    fn exit_status_of(status: std::process::ExitStatus) -> ExitStatus {
        match status.code() {
            Some(code) => ExitStatus::Code(code),
            None => ExitStatus::Signal(status.signal().unwrap_or(0)),
        }
    }
}

/// Parse a raw `kill`-style signal number (as received over the RPC boundary) into the
/// typed [Signal] the process-group APIs expect.
pub fn signal_from_i32(raw: i32) -> Option<Signal> {
    Signal::try_from(raw).ok()
}
