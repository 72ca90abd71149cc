use std::time::Duration;

use clap::Parser;

/// Number of worker processes the supervisor forks.
pub const WORKER_COUNT: u32 = 4;

/// Listen backlog of every listening socket.
pub const BACKLOG: i32 = 100;

/// How long a worker blocks in one wait before looping again.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Upper bound on ready events returned by one wait.
pub const MAX_EVENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutMode {
    /// One listener and one epoll instance created before fork, shared by
    /// every worker. Used to observe the thundering herd.
    SharedDescriptor,
    /// Every worker binds its own `SO_REUSEPORT` listener.
    ReusePort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    Level,
    Edge,
}

fn parse_mode(value: &str) -> Result<FanoutMode, String> {
    match value {
        "0" => Ok(FanoutMode::SharedDescriptor),
        "1" => Ok(FanoutMode::ReusePort),
        other => Err(format!(
            "expected 0 (shared descriptor) or 1 (reuse port), got `{other}`"
        )),
    }
}

#[derive(Debug, Parser)]
#[command(name = "herd_lab")]
#[command(about = "Observe how accepted connections spread across worker processes", long_about = None)]
pub struct Args {
    /// 0: workers share one listener and epoll fd (thundering herd),
    /// 1: every worker binds its own SO_REUSEPORT listener
    #[arg(long, value_parser = parse_mode)]
    pub mode: FanoutMode,

    /// Register the listener edge-triggered instead of level-triggered
    #[arg(long)]
    pub et: bool,

    /// Keep accepting after each wakeup until the backlog is empty
    #[arg(long)]
    pub loop_accept: bool,

    /// Port to listen on
    #[arg(long)]
    pub port: u16,

    /// Seconds to sleep between wakeup and accept, widens the race between workers
    #[arg(long = "sleep", default_value_t = 0)]
    pub sleep: u32,
}

/// Run parameters. Built once at startup and handed to every component;
/// each forked worker owns an independent copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub fanout_mode: FanoutMode,
    pub trigger_mode: TriggerMode,
    pub loop_accept: bool,
    pub port: u16,
    pub post_wakeup_delay_seconds: u32,
    pub worker_count: u32,
}

impl RunConfig {
    pub fn post_wakeup_delay(&self) -> Option<Duration> {
        match self.post_wakeup_delay_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(u64::from(seconds))),
        }
    }

    pub fn reuse_port(&self) -> bool {
        self.fanout_mode == FanoutMode::ReusePort
    }
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        Self {
            fanout_mode: args.mode,
            trigger_mode: if args.et {
                TriggerMode::Edge
            } else {
                TriggerMode::Level
            },
            loop_accept: args.loop_accept,
            port: args.port,
            post_wakeup_delay_seconds: args.sleep,
            worker_count: WORKER_COUNT,
        }
    }
}
