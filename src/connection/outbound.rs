/// The response side of an accepted connection. The harness does not speak
/// any protocol: it writes one greeting line and hangs up.
use std::io::{self, Write};

use super::AcceptedConnection;

pub const GREETING: &[u8] = b"Hello from server.\n";

/// Called by the dispatcher once per accepted connection. The responder
/// owns the connection and is expected to close it before returning.
pub trait Responder {
    fn respond(&mut self, connection: AcceptedConnection) -> io::Result<()>;
}

/// Writes [`GREETING`] and closes the connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct Greeter;

impl Greeter {
    pub fn greet<W: Write>(stream: &mut W) -> io::Result<()> {
        stream.write_all(GREETING)?;
        stream.flush()
    }
}

impl Responder for Greeter {
    fn respond(&mut self, connection: AcceptedConnection) -> io::Result<()> {
        let AcceptedConnection { mut stream, .. } = connection;
        let result = Greeter::greet(&mut stream);
        drop(stream);
        result
    }
}
