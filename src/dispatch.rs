/// Turns readiness of the listening socket into accepted connections.
///
/// How many connections one wakeup yields depends on the accept policy:
/// a single `accept` per event, or `accept` until the backlog is empty.
/// Under level triggering a wakeup that finds nothing to accept is
/// reported as a thundering herd miss: some sibling sharing the listener
/// got there first.
use std::{
    io::ErrorKind,
    ops::AddAssign,
    os::fd::AsRawFd,
    thread,
    time::{Duration, Instant},
};

use crate::config::{RunConfig, TriggerMode};
use crate::connection::{outbound::Responder, AcceptedConnection};
use crate::error::{Error, Result};
use crate::listener::ListeningSocket;
use crate::monitor::ReadyEvent;

/// What one or more dispatches did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub accepted: usize,
    pub herd_misses: usize,
}

impl AddAssign for DispatchOutcome {
    fn add_assign(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.herd_misses += other.herd_misses;
    }
}

pub struct AcceptDispatcher<R: Responder> {
    trigger_mode: TriggerMode,
    loop_accept: bool,
    post_wakeup_delay: Option<Duration>,
    responder: R,
}

impl<R: Responder> AcceptDispatcher<R> {
    pub fn new(config: &RunConfig, responder: R) -> Self {
        Self {
            trigger_mode: config.trigger_mode,
            loop_accept: config.loop_accept,
            post_wakeup_delay: config.post_wakeup_delay(),
            responder,
        }
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    /// Handles everything one wait returned. When the batch is not empty
    /// and a post-wakeup delay is configured, sleeps once before touching
    /// any event, giving sibling workers time to wake up on the same event.
    pub fn on_batch(
        &mut self,
        listener: &ListeningSocket,
        events: &[ReadyEvent],
    ) -> Result<DispatchOutcome> {
        if events.is_empty() {
            return Ok(DispatchOutcome::default());
        }

        if let Some(delay) = self.post_wakeup_delay {
            log::debug!("sleep {delay:?} before accepting");
            thread::sleep(delay);
        }

        let mut outcome = DispatchOutcome::default();
        for event in events {
            outcome += self.on_ready(listener, *event)?;
        }

        Ok(outcome)
    }

    /// Handles one ready event. Only the listener is ever registered, so an
    /// event for any other descriptor is fatal. Read readiness leads to an
    /// accept; write readiness is ignored since nothing is ever queued for
    /// sending. Any other event type is fatal too.
    pub fn on_ready(
        &mut self,
        listener: &ListeningSocket,
        event: ReadyEvent,
    ) -> Result<DispatchOutcome> {
        if event.fd != listener.as_raw_fd() {
            return Err(Error::unexpected_event(event.fd, event.events));
        }

        if event.is_readable() {
            Ok(self.accept(listener))
        } else if event.is_writable() {
            Ok(DispatchOutcome::default())
        } else {
            Err(Error::unexpected_event(event.fd, event.events))
        }
    }

    fn accept(&mut self, listener: &ListeningSocket) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let start = Instant::now();

        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    log::info!("accept connection from {}:{}", peer.ip(), peer.port());
                    outcome.accepted += 1;

                    if let Err(error) = self.responder.respond(AcceptedConnection { stream, peer })
                    {
                        log::warn!("failed to send greeting to {peer}: {error}");
                    }

                    if !self.loop_accept {
                        break;
                    }
                }
                Err(error) if error.kind() == ErrorKind::WouldBlock => {
                    // Every empty accept under level triggering counts, the
                    // one ending a loop-accept drain included. Edge triggering
                    // never promised one connection per wakeup.
                    if self.trigger_mode == TriggerMode::Level {
                        log::info!("thundering herd: woke up with nothing to accept");
                        outcome.herd_misses += 1;
                    }
                    break;
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => {
                    log::warn!("accept failed: {error}");
                    break;
                }
            }
        }

        let duration = start.elapsed();
        log::debug!("accepted {} connections. Took: {duration:?}", outcome.accepted);
        outcome
    }
}
