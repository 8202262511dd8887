//! Line-oriented chat over an SRUDP link.
//!
//! One side listens, the other connects; afterwards both sides behave the
//! same: stdin lines go to the peer, peer messages go to stdout, and the
//! line `QUIT` tears the link down.
//!
//! ```text
//! srudp-chat server [-port N] [-wsize N] [-psize N] [-error PCT] [-timer USEC]
//! srudp-chat client <host[:port]> [-port N] [-wsize N] [-psize N] [-error PCT] [-timer USEC]
//! ```
//!
//! `-error` drops or corrupts the given percentage of outbound datagrams,
//! for watching the ARQ engine recover on an otherwise clean loopback.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use srudp::core::constants::{DEFAULT_PORT, DEFAULT_TIMEOUT};
use srudp::prelude::*;
use srudp::transport;

#[derive(Debug)]
enum Mode {
    Server,
    Client(String),
}

#[derive(Debug)]
struct Options {
    mode: Mode,
    port: u16,
    proposal: Proposal,
    fault_percent: u8,
    timeout: Duration,
}

fn usage() -> ! {
    eprintln!("usage: srudp-chat server [-port N] [-wsize N] [-psize N] [-error PCT] [-timer USEC]");
    eprintln!("       srudp-chat client <host[:port]> [-port N] [-wsize N] [-psize N] [-error PCT] [-timer USEC]");
    std::process::exit(2);
}

fn parse_args() -> Result<Options> {
    let mut args = std::env::args().skip(1);
    let mode = match args.next().as_deref() {
        Some("server") | Some("listen") => Mode::Server,
        Some("client") | Some("connect") => {
            let address = args.next().unwrap_or_else(|| usage());
            Mode::Client(address)
        }
        _ => usage(),
    };

    let mut options = Options {
        mode,
        port: DEFAULT_PORT,
        proposal: Proposal::default(),
        fault_percent: 0,
        timeout: DEFAULT_TIMEOUT,
    };

    while let Some(flag) = args.next() {
        let value = args
            .next()
            .with_context(|| format!("flag {flag} needs a value"))?;
        match flag.as_str() {
            "-port" => options.port = value.parse().context("-port")?,
            "-wsize" => options.proposal.window = value.parse().context("-wsize")?,
            "-psize" => options.proposal.payload = value.parse().context("-psize")?,
            "-error" => options.fault_percent = value.parse().context("-error")?,
            "-timer" => {
                options.timeout = Duration::from_micros(value.parse().context("-timer")?)
            }
            _ => usage(),
        }
    }
    Ok(options)
}

/// Accept `host:port` or bare `host` with the `-port` value filled in.
fn resolve(address: &str, port: u16) -> Result<SocketAddr> {
    let with_port = if address.contains(':') {
        address.to_string()
    } else {
        format!("{address}:{port}")
    };
    with_port
        .parse()
        .with_context(|| format!("bad address {with_port}"))
}

async fn establish(options: &Options) -> Result<Link> {
    let mut socket = match &options.mode {
        Mode::Server => {
            let bind: SocketAddr = format!("0.0.0.0:{}", options.port).parse()?;
            PeerSocket::bind(bind).await?
        }
        Mode::Client(address) => PeerSocket::connect(resolve(address, options.port)?).await?,
    };
    socket.set_timeout(options.timeout);
    if options.fault_percent > 0 {
        socket.set_fault(FaultPlan::new(options.fault_percent));
    }

    let session = match &options.mode {
        Mode::Server => {
            info!(addr = %socket.local_addr()?, "waiting for a peer");
            transport::listen(&socket, options.proposal).await?
        }
        Mode::Client(_) => transport::connect(&socket, options.proposal).await?,
    };
    info!(
        window = session.negotiated.window,
        payload = session.negotiated.payload,
        "link established"
    );
    Ok(Link::spawn(socket, session))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = parse_args()?;
    let mut link = establish(&options).await?;
    let commands = link.commands();

    // The link handle moves into the printer task; stdin keeps the command
    // channel.
    let mut printer = tokio::spawn(async move {
        while let Some(message) = link.next_message().await {
            println!("< {}", String::from_utf8_lossy(&message));
        }
        link.join().await
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let teardown = loop {
        if !stdin_open {
            // Nothing left to send; wait for the teardown to finish.
            break printer.await??;
        }
        tokio::select! {
            ended = &mut printer => break ended??,
            line = lines.next_line() => {
                match line? {
                    Some(line) if line == "QUIT" => {
                        commands.send(LinkCommand::Close).await.ok();
                        stdin_open = false;
                    }
                    Some(line) => {
                        if commands.send(LinkCommand::Send(line.into_bytes())).await.is_err() {
                            stdin_open = false;
                        }
                    }
                    None => {
                        // stdin closed; treat like QUIT.
                        commands.send(LinkCommand::Close).await.ok();
                        stdin_open = false;
                    }
                }
            }
        }
    };

    match teardown {
        Teardown::Clean => info!("link closed cleanly"),
        Teardown::TimedOut => {
            bail!("peer went silent during teardown");
        }
    }
    Ok(())
}
