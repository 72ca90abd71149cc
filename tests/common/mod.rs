extern crate rand;
use rand::Rng;
use std::io::{BufRead, BufReader, Read};
use std::net::TcpStream;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

pub const SERVER: &str = env!("CARGO_BIN_EXE_herd_lab");

/// A running server together with every worker it forked. All of them sit
/// in one process group which is killed on drop.
pub struct ServerProcess {
    pub port: u16,
    child: Child,
    lines: Receiver<String>,
    pub seen: Vec<String>,
}

impl ServerProcess {
    pub fn start(args: &[&str]) -> Self {
        let port = random_port();
        let mut child = Command::new(SERVER)
            .args(args)
            .args(["--port", &port.to_string()])
            .stdout(Stdio::piped())
            .process_group(0)
            .spawn()
            .expect("failed to start server");

        let stdout = child.stdout.take().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        ServerProcess {
            port,
            child,
            lines: rx,
            seen: vec![],
        }
    }

    /// Blocks until `count` listeners report they are bound.
    pub fn wait_until_listening(&mut self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.count("begin listening at") < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = self
                .lines
                .recv_timeout(remaining)
                .expect("server never started listening");
            self.seen.push(line);
        }
    }

    /// Collects whatever the server logs during `period`.
    pub fn drain_for(&mut self, period: Duration) {
        let deadline = Instant::now() + period;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(line) => self.seen.push(line),
                Err(_) => break,
            }
        }
    }

    pub fn count(&self, message: &str) -> usize {
        self.matching(message).len()
    }

    pub fn matching(&self, message: &str) -> Vec<&String> {
        self.seen
            .iter()
            .filter(|line| line.contains(message))
            .collect()
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let pgid = self.child.id() as libc::pid_t;
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
        let _ = self.child.wait();
    }
}

/// Pid in the `[LEVEL at pid:N file:line]` prefix.
pub fn pid_of(line: &str) -> u32 {
    let start = line.find("pid:").unwrap() + 4;
    let end = start + line[start..].find(' ').unwrap();
    line[start..end].parse().unwrap()
}

/// Connects `count` clients at once and returns what each one read
/// before the server closed the connection.
pub fn simultaneous_clients(port: u16, count: usize) -> Vec<Vec<u8>> {
    let barrier = Arc::new(Barrier::new(count));
    let handles: Vec<_> = (0..count)
        .map(|_| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                fetch(port)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

pub fn fetch(port: u16) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut received = vec![];
    stream.read_to_end(&mut received).unwrap();
    received
}

fn random_port() -> u16 {
    rand::thread_rng().gen_range(20000..32000)
}
