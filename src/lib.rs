pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
#[cfg(test)]
mod interrupter;
pub mod listener;
pub mod logging;
pub mod monitor;
pub mod server;
pub mod worker;

pub use error::{Error, Result};
