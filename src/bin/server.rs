use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use rdt::driver;
use rdt::Error;

#[derive(Parser, Debug)]
#[command(name = "server", version, about)]
struct Args {
    #[arg(long, default_value = "0.0.0.0:9090")]
    bind: String,

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

    driver::run(
        bind_addr,
        None,
        args.window,
        Duration::from_millis(args.timeout_ms),
    )
}
