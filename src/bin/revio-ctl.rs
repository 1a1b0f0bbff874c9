//! A thin operator CLI demonstrating `revio`'s public API end to end: binds
//! a TCP echo listener, optionally forks into `--workers N` worker
//! processes, and logs lifecycle/pub-sub activity through `env_logger`.
//!
//! ```text
//! revio-ctl [--addr 127.0.0.1:7878] [--workers N] [--threads N]
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use revio::conn::{Protocol, ReactorOps, Uuid};
use revio::reactor::{CpuCount, Reactor, ReactorConfig};

struct EchoProtocol;

impl Protocol for EchoProtocol {
    fn on_data(&mut self, reactor: &dyn ReactorOps, uuid: Uuid) {
        let mut buf = [0u8; 4096];
        loop {
            match reactor.read(uuid, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if reactor.write(uuid, buf[..n].to_vec()).is_err() {
                        reactor.force_close(uuid);
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }

    fn on_close(&mut self, _reactor: &dyn ReactorOps, uuid: Uuid) {
        log::info!("connection {} closed", uuid.fd());
    }
}

struct CliArgs {
    addr: SocketAddr,
    workers: usize,
    threads: usize,
}

fn parse_args() -> CliArgs {
    let mut addr: SocketAddr = "127.0.0.1:7878".parse().unwrap();
    let mut workers = 1usize;
    let mut threads = 0usize;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--addr" => {
                if let Some(v) = args.next() {
                    match v.parse() {
                        Ok(parsed) => addr = parsed,
                        Err(err) => eprintln!("revio-ctl: invalid --addr {v:?}: {err}"),
                    }
                }
            }
            "--workers" => {
                if let Some(v) = args.next() {
                    workers = v.parse().unwrap_or(1);
                }
            }
            "--threads" => {
                if let Some(v) = args.next() {
                    threads = v.parse().unwrap_or(0);
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => eprintln!("revio-ctl: ignoring unrecognized argument {other:?}"),
        }
    }

    CliArgs { addr, workers, threads }
}

fn print_usage() {
    println!("revio-ctl [--addr HOST:PORT] [--workers N] [--threads N]");
    println!();
    println!("Runs a TCP echo server on top of the revio reactor core.");
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = parse_args();

    let config = ReactorConfig::new()
        .with_workers(CpuCount::Fixed(args.workers.max(1)))
        .with_threads(if args.threads == 0 {
            CpuCount::PerCoreSquared
        } else {
            CpuCount::Fixed(args.threads)
        });

    let addr = args.addr;
    run(config, addr)
}

fn run(config: ReactorConfig, addr: SocketAddr) -> std::io::Result<()> {
    let reactor = Reactor::new(config)?;
    let listener = reactor.listen_tcp(addr)?;
    println!("revio-ctl: echoing on {addr}");

    let accept_reactor = Arc::clone(&reactor);
    reactor.attach(listener, Box::new(AcceptLoop::new(accept_reactor, listener)));

    let result = reactor.start(|| Ok(()));
    result.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
}

/// Drives the listener's accept loop from within `on_data`, attaching a
/// fresh [`EchoProtocol`] to every accepted connection: the pattern every
/// `revio` listener is expected to follow, since `Reactor::listen_tcp`
/// itself installs no protocol.
struct AcceptLoop {
    reactor: Arc<Reactor>,
    listener: Uuid,
}

impl AcceptLoop {
    fn new(reactor: Arc<Reactor>, listener: Uuid) -> AcceptLoop {
        AcceptLoop { reactor, listener }
    }
}

impl Protocol for AcceptLoop {
    fn on_data(&mut self, _reactor: &dyn ReactorOps, _uuid: Uuid) {
        loop {
            match self.reactor.accept(self.listener) {
                Ok(Some(conn)) => {
                    self.reactor.attach(conn, Box::new(EchoProtocol));
                    log::debug!("accepted connection {}", conn.fd());
                }
                Ok(None) => break,
                Err(err) => {
                    log::warn!("accept failed: {err}");
                    break;
                }
            }
        }
    }
}

