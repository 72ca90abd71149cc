use clap::Parser;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use herd_lab::connection::outbound::GREETING;

/// Fires simultaneous connections at a running herd_lab server and reports
/// what came back.
#[derive(Parser)]
#[command(name = "herd_probe")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long)]
    port: u16,

    /// Number of clients released at the same time
    #[arg(long, default_value_t = 4)]
    connections: usize,

    /// Captured server stdout, to count accepts and herd misses per worker
    #[arg(long)]
    server_log: Option<PathBuf>,
}

#[derive(Debug)]
struct ClientResult(usize, Result<Vec<u8>, String>, Duration);

#[derive(Debug, Default, PartialEq)]
struct WorkerStats {
    accepts: usize,
    herd_misses: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let results = run_clients(&cli.host, cli.port, cli.connections);

    // Print result as Markdown table
    println!("| Client | Greeting | Took |\n| --- | --- | --- |");
    for ClientResult(client, received, took) in &results {
        let greeting = match received {
            Ok(bytes) if bytes.as_slice() == GREETING => String::from("✅"),
            Ok(bytes) => format!("❌ {:?}", String::from_utf8_lossy(bytes)),
            Err(error) => format!("❌ {error}"),
        };
        println!("| {client} | {greeting} | {took:?} |");
    }

    if let Some(path) = cli.server_log {
        let stats = parse_server_log(BufReader::new(File::open(path)?))?;

        println!();
        println!("| Worker pid | Accepts | Herd misses |\n| --- | --- | --- |");
        for (pid, WorkerStats { accepts, herd_misses }) in &stats {
            println!("| {pid} | {accepts} | {herd_misses} |");
        }
    }

    Ok(())
}

fn run_clients(host: &str, port: u16, connections: usize) -> Vec<ClientResult> {
    let barrier = Arc::new(Barrier::new(connections));

    let handles: Vec<_> = (0..connections)
        .map(|client| {
            let barrier = barrier.clone();
            let addr = format!("{host}:{port}");
            thread::spawn(move || {
                barrier.wait();
                let start = Instant::now();
                let received = fetch_greeting(&addr).map_err(|error| error.to_string());
                ClientResult(client, received, start.elapsed())
            })
        })
        .collect();

    handles
        .into_iter()
        .filter_map(|handle| handle.join().ok())
        .collect()
}

fn fetch_greeting(addr: &str) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut received = vec![];
    stream.read_to_end(&mut received)?;
    Ok(received)
}

fn parse_server_log<R: BufRead>(reader: R) -> Result<BTreeMap<u32, WorkerStats>, Box<dyn Error>> {
    let re = Regex::new(r"^\[\w+ at pid:(\d+) [^\]]+\] (.*)$")?;
    let mut stats: BTreeMap<u32, WorkerStats> = BTreeMap::new();

    for line in reader.lines() {
        let line = line?;
        let Some(caps) = re.captures(&line) else {
            continue;
        };

        let pid: u32 = caps[1].parse()?;
        let message = &caps[2];
        if message.starts_with("accept connection from") {
            stats.entry(pid).or_default().accepts += 1;
        } else if message.starts_with("thundering herd") {
            stats.entry(pid).or_default().herd_misses += 1;
        }
    }

    Ok(stats)
}
