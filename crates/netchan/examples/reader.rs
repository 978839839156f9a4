//! Bind an address and print every value written to it.
//!
//! Run with:
//!   cargo run -p netchan --example reader --features logging -- :9000
//!
//! In another terminal:
//!   cargo run -p netchan --example writer --features logging -- :9000 hello 'world!'

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use netchan::logging::LogArgs;
use netchan::{ChannelConfig, RecvTimeoutError, Registry};

#[derive(Parser, Debug)]
#[command(name = "reader", about = "Print values written to a netchan address")]
struct Cli {
    /// Address to bind (`host:port`, `:port` or `unix:<path>`).
    address: String,

    /// Decode workers, i.e. writers served at once.
    #[arg(long, default_value_t = netchan::channel::DEFAULT_WORKERS)]
    workers: usize,

    /// Exit after receiving N values.
    #[arg(long)]
    count: Option<usize>,

    #[command(flatten)]
    log: LogArgs,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    cli.log.init();

    let registry = Arc::new(Registry::with_config(
        ChannelConfig::default().with_workers(cli.workers),
    ));
    let reader = registry.bind::<serde_json::Value>(&cli.address)?;
    eprintln!("Listening on {}", reader.local_addr());

    {
        let registry = Arc::clone(&registry);
        let address = cli.address.clone();
        ctrlc::set_handler(move || registry.unbind(&address))?;
    }

    let mut received = 0usize;
    loop {
        let value = match reader.recv_timeout(Duration::from_secs(1)) {
            Ok(value) => value,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Closed) => break,
        };
        println!("{value}");

        received += 1;
        if cli.count.is_some_and(|count| received >= count) {
            break;
        }
    }

    registry.unbind(&cli.address);
    eprintln!("Received {received} value(s)");
    Ok(())
}
