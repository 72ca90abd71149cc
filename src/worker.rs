/// The event loop each forked worker runs.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::config::{FanoutMode, RunConfig, WAIT_TIMEOUT};
use crate::connection::outbound::Responder;
use crate::dispatch::{AcceptDispatcher, DispatchOutcome};
use crate::error::{Error, Result};
use crate::listener::ListeningSocket;
use crate::monitor::EventMonitor;

/// A listener together with the monitor watching it. In shared descriptor
/// mode the supervisor builds one before forking and every worker gets a
/// reference to the inherited copy; in reuse port mode each worker builds
/// its own.
#[derive(Debug)]
pub struct PreForkResources {
    pub listener: ListeningSocket,
    pub monitor: EventMonitor,
}

impl PreForkResources {
    pub fn create(config: &RunConfig) -> Result<Self> {
        let listener = ListeningSocket::create(config.port, config.reuse_port())?;
        let monitor = EventMonitor::new()?;
        monitor.register(&listener, config.trigger_mode)?;

        Ok(Self { listener, monitor })
    }
}

/// Shared flag a worker loop checks before every iteration. The server
/// binary never raises it; workers only go away when their process is
/// killed.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Worker<R: Responder> {
    config: RunConfig,
    dispatcher: AcceptDispatcher<R>,
    wait_timeout: Duration,
}

impl<R: Responder> Worker<R> {
    pub fn new(config: &RunConfig, responder: R) -> Self {
        Self {
            config: *config,
            dispatcher: AcceptDispatcher::new(config, responder),
            wait_timeout: WAIT_TIMEOUT,
        }
    }

    /// Shortens the wait so tests can drive a handful of iterations.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Runs the loop until `stop` is raised. `shared` is used in shared
    /// descriptor mode and ignored in reuse port mode.
    pub fn run(
        &mut self,
        shared: Option<&PreForkResources>,
        stop: &StopFlag,
    ) -> Result<()> {
        match self.config.fanout_mode {
            FanoutMode::ReusePort => {
                let own = PreForkResources::create(&self.config)?;
                self.run_loop(&own, stop)
            }
            FanoutMode::SharedDescriptor => {
                let shared = shared.ok_or_else(|| Error::missing_shared_resources())?;
                self.run_loop(shared, stop)
            }
        }
    }

    fn run_loop(&mut self, resources: &PreForkResources, stop: &StopFlag) -> Result<()> {
        log::debug!("worker loop started");

        while !stop.is_stopped() {
            self.poll_once(resources)?;
        }

        log::debug!("worker loop stopped");
        Ok(())
    }

    /// One iteration: wait for readiness, then dispatch whatever came back.
    pub fn poll_once(&mut self, resources: &PreForkResources) -> Result<DispatchOutcome> {
        let events = resources.monitor.wait(self.wait_timeout)?;
        self.dispatcher.on_batch(&resources.listener, &events)
    }
}
