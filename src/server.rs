use std::io;

use crate::config::{FanoutMode, RunConfig};
use crate::connection::outbound::Greeter;
use crate::error::{Error, Result, Stage};
use crate::logging;
use crate::worker::{PreForkResources, StopFlag, Worker};

/// The parent process: prepares what workers share, forks them, and reaps
/// them until none are left.
pub struct Supervisor {
    pub config: RunConfig,
}

pub(crate) enum Forked {
    Child,
    Parent(libc::pid_t),
}

impl Supervisor {
    pub fn start(&self) -> Result<()> {
        let config = &self.config;

        // Created before fork so every child inherits the same listener and
        // the same epoll instance.
        let shared = match config.fanout_mode {
            FanoutMode::SharedDescriptor => Some(PreForkResources::create(config)?),
            FanoutMode::ReusePort => None,
        };

        for _ in 0..config.worker_count {
            match fork()? {
                Forked::Child => std::process::exit(run_worker(config, shared.as_ref())),
                Forked::Parent(pid) => log::info!("started worker {pid}"),
            }
        }

        let reaped = reap_all()?;
        log::info!("all {reaped} workers exited");
        Ok(())
    }
}

/// Body of a forked child. Returns the exit status of the child process.
fn run_worker(config: &RunConfig, shared: Option<&PreForkResources>) -> i32 {
    let mut worker = Worker::new(config, Greeter);

    match worker.run(shared, &StopFlag::new()) {
        Ok(()) => 0,
        Err(error) => {
            logging::report_fatal(&error);
            1
        }
    }
}

pub(crate) fn fork() -> Result<Forked> {
    match unsafe { libc::fork() } {
        -1 => Err(Error::last_os(Stage::Fork)),
        0 => Ok(Forked::Child),
        pid => Ok(Forked::Parent(pid)),
    }
}

/// Blocks until every child has been reaped and returns how many were.
pub(crate) fn reap_all() -> Result<usize> {
    let mut reaped = 0;

    loop {
        let mut status = 0;
        let pid = unsafe { libc::waitpid(-1, &mut status, 0) };
        if pid > 0 {
            log::info!("worker {pid} exited with {}", describe_status(status));
            reaped += 1;
            continue;
        }

        let error = io::Error::last_os_error();
        match error.raw_os_error() {
            Some(libc::ECHILD) => return Ok(reaped),
            Some(libc::EINTR) => continue,
            _ => return Err(Error::os(Stage::Reap, error)),
        }
    }
}

fn describe_status(status: libc::c_int) -> String {
    if libc::WIFEXITED(status) {
        format!("status {}", libc::WEXITSTATUS(status))
    } else if libc::WIFSIGNALED(status) {
        format!("signal {}", libc::WTERMSIG(status))
    } else {
        format!("raw status {status:#x}")
    }
}
