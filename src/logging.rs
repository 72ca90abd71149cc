use std::io::Write;

use env_logger::{Builder, Target, DEFAULT_FILTER_ENV};
use log::{Level, LevelFilter, Record};

use crate::error::Error;

/// Log target of fatal diagnostics. It stays enabled at `error` whatever
/// `RUST_LOG` says, so a failing process always explains itself.
pub const FATAL_TARGET: &str = "herd_lab::fatal";

/// Installs the stdout logger. Every line carries the pid of the process
/// that wrote it, so output of forked workers can be told apart.
pub fn init() {
    let filters = std::env::var(DEFAULT_FILTER_ENV).unwrap_or_else(|_| "info".to_owned());
    builder(&filters).init();
}

fn builder(filters: &str) -> Builder {
    let mut builder = Builder::new();
    builder
        .parse_filters(filters)
        .filter_module(FATAL_TARGET, LevelFilter::Error)
        .target(Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}", format_record(record)));
    builder
}

pub fn format_record(record: &Record) -> String {
    format!(
        "[{} at pid:{} {}:{}] {}",
        record.level(),
        std::process::id(),
        record.file().unwrap_or("?"),
        record.line().unwrap_or(0),
        record.args()
    )
}

/// Logs a fatal error at the place it was raised rather than where it
/// ended up, so the line points at the failing call.
pub fn report_fatal(error: &Error) {
    with_fatal_record(error, |record| log::logger().log(record));
    log::logger().flush();
}

fn with_fatal_record<T>(error: &Error, f: impl FnOnce(&Record) -> T) -> T {
    let location = error.location();
    f(&Record::builder()
        .args(format_args!("{error}"))
        .level(Level::Error)
        .target(FATAL_TARGET)
        .file(Some(location.file()))
        .line(Some(location.line()))
        .build())
}
