use std::io::{Error, ErrorKind, Write};

// This module facilitates testing
pub struct MockTcpStream {
    pub written: Vec<u8>,
    pub flushed: bool,
    broken: bool,
}

impl MockTcpStream {
    pub fn new() -> Self {
        MockTcpStream {
            written: vec![],
            flushed: false,
            broken: false,
        }
    }

    /// A stream whose peer already went away.
    pub fn broken() -> Self {
        MockTcpStream {
            broken: true,
            ..MockTcpStream::new()
        }
    }
}

impl Write for MockTcpStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if self.broken {
            return Err(Error::from(ErrorKind::BrokenPipe));
        }

        // Accept at most a few bytes per call to exercise partial writes
        let len = buf.len().min(4);
        self.written.extend_from_slice(&buf[..len]);
        Ok(len)
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.flushed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MockTcpStream;
    use std::io::{ErrorKind, Write};

    #[test]
    fn basic() {
        let mut stream = MockTcpStream::new();
        stream
            .write_all(b"Hello")
            .expect("Fail to write to MockTcpStream");

        assert_eq!(stream.written, b"Hello");
    }

    #[test]
    fn broken() {
        let mut stream = MockTcpStream::broken();
        let error = stream.write_all(b"Hello").unwrap_err();

        assert_eq!(error.kind(), ErrorKind::BrokenPipe);
        assert!(stream.written.is_empty());
    }
}
