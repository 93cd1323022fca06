use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::Parser;

use rdt::driver;
use rdt::Error;

#[derive(Parser, Debug)]
#[command(name = "client", version, about)]
struct Args {
    #[arg(long, default_value = "0.0.0.0:0")]
    bind: String,

    peer: String,

    #[arg(long, default_value_t = 4)]
    window: usize,

    #[arg(long, default_value_t = 200)]
    timeout_ms: u64,
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::parse();

    let bind_addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|_| Error::InvalidAddress(args.bind.clone()))?;
    let peer_addr: SocketAddr = args
        .peer
        .to_socket_addrs()
        .map_err(|_| Error::InvalidAddress(args.peer.clone()))?
        .next()
        .ok_or_else(|| Error::InvalidAddress(args.peer.clone()))?;

    driver::run(
        bind_addr,
        Some(peer_addr),
        args.window,
        Duration::from_millis(args.timeout_ms),
    )
}
