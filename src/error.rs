/// Errors the harness can run into. Every variant is fatal for the process
/// that hits it; deciding to exit is left to `main` and the forked worker.
use std::{fmt, io, os::fd::RawFd, panic::Location};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The setup or runtime step an OS call failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Socket,
    ReusePort,
    NonBlocking,
    Bind { port: u16 },
    Listen,
    EpollCreate,
    EpollCtl,
    EpollWait,
    Fork,
    Reap,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Socket => write!(f, "init socket"),
            Stage::ReusePort => write!(f, "socket reuse port"),
            Stage::NonBlocking => write!(f, "set socket non-blocking"),
            Stage::Bind { port } => write!(f, "bind to 0.0.0.0:{port}"),
            Stage::Listen => write!(f, "listen socket"),
            Stage::EpollCreate => write!(f, "epoll_create"),
            Stage::EpollCtl => write!(f, "epoll_ctl"),
            Stage::EpollWait => write!(f, "epoll_wait"),
            Stage::Fork => write!(f, "fork"),
            Stage::Reap => write!(f, "wait child process"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{stage} failed [errno]:{} [errmsg]:{source}", .source.raw_os_error().unwrap_or(0))]
    Os {
        stage: Stage,
        #[source]
        source: io::Error,
        location: &'static Location<'static>,
    },

    #[error("unknown event {events:#x} on fd {fd}")]
    UnexpectedEvent {
        fd: RawFd,
        events: u32,
        location: &'static Location<'static>,
    },

    #[error("shared descriptor mode needs the listener and monitor created before fork")]
    MissingSharedResources {
        location: &'static Location<'static>,
    },
}

impl Error {
    #[track_caller]
    pub fn os(stage: Stage, source: io::Error) -> Self {
        Error::Os {
            stage,
            source,
            location: Location::caller(),
        }
    }

    /// Same as [`Error::os`] but reads `errno` of the last failed libc call.
    #[track_caller]
    pub fn last_os(stage: Stage) -> Self {
        Error::os(stage, io::Error::last_os_error())
    }

    #[track_caller]
    pub fn unexpected_event(fd: RawFd, events: u32) -> Self {
        Error::UnexpectedEvent {
            fd,
            events,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn missing_shared_resources() -> Self {
        Error::MissingSharedResources {
            location: Location::caller(),
        }
    }

    /// Where in the source the failure was detected.
    pub fn location(&self) -> &'static Location<'static> {
        match self {
            Error::Os { location, .. }
            | Error::UnexpectedEvent { location, .. }
            | Error::MissingSharedResources { location } => *location,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Os { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
