/// Thin wrapper over an epoll instance watching listening sockets.
use std::{
    io,
    os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
    time::{Duration, Instant},
};

use crate::config::{TriggerMode, MAX_EVENTS};
use crate::error::{Error, Result, Stage};

/// One entry returned by [`EventMonitor::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEvent {
    pub fd: RawFd,
    pub events: u32,
}

impl ReadyEvent {
    pub fn is_readable(&self) -> bool {
        self.events & (libc::EPOLLIN | libc::EPOLLERR) as u32 != 0
    }

    pub fn is_writable(&self) -> bool {
        self.events & libc::EPOLLOUT as u32 != 0
    }
}

/// Owns one epoll instance. After a fork every child holds the same
/// instance, so all of them block on the same ready list.
#[derive(Debug)]
pub struct EventMonitor {
    epfd: OwnedFd,
}

impl EventMonitor {
    pub fn new() -> Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(Error::last_os(Stage::EpollCreate));
        }

        // SAFETY: `fd` was just returned by epoll_create1 and nothing else owns it.
        let epfd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { epfd })
    }

    /// Adds the read (and error) interest for `source`. Edge triggering
    /// additionally sets `EPOLLET`. A descriptor can only be registered
    /// once per monitor; a second attempt fails with `EEXIST`.
    pub fn register(&self, source: &impl AsRawFd, trigger_mode: TriggerMode) -> Result<()> {
        let fd = source.as_raw_fd();
        let mut flags = libc::EPOLLIN | libc::EPOLLERR;
        if trigger_mode == TriggerMode::Edge {
            flags |= libc::EPOLLET;
        }

        let mut event = libc::epoll_event {
            events: flags as u32,
            u64: fd as u64,
        };
        let ret = unsafe {
            libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event)
        };
        if ret < 0 {
            return Err(Error::last_os(Stage::EpollCtl));
        }

        log::debug!("registered fd {fd} with {trigger_mode:?} triggering");
        Ok(())
    }

    /// Blocks until a registered descriptor is ready or `timeout` passes.
    /// Returns at most [`MAX_EVENTS`] events; the rest are picked up by the
    /// next call. A wait interrupted by a signal returns no events.
    pub fn wait(&self, timeout: Duration) -> Result<Vec<ReadyEvent>> {
        let mut raw_events = [libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

        let start = Instant::now();
        let nfds = unsafe {
            libc::epoll_wait(
                self.epfd.as_raw_fd(),
                raw_events.as_mut_ptr(),
                MAX_EVENTS as i32,
                timeout_ms,
            )
        };
        let duration = start.elapsed();

        if nfds < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                log::debug!("epoll_wait interrupted after {duration:?}");
                return Ok(vec![]);
            }
            return Err(Error::os(Stage::EpollWait, error));
        }

        log::debug!("epoll_wait returned {nfds} events. Took: {duration:?}");

        Ok(raw_events[..nfds as usize]
            .iter()
            .map(|raw| {
                let raw = *raw;
                ReadyEvent {
                    fd: raw.u64 as RawFd,
                    events: raw.events,
                }
            })
            .collect())
    }
}

impl AsRawFd for EventMonitor {
    fn as_raw_fd(&self) -> RawFd {
        self.epfd.as_raw_fd()
    }
}
