//! Open a writer session and send values to a bound address.
//!
//! Each argument is sent as one value: arguments that parse as JSON are
//! sent as-is, anything else as a JSON string. With no arguments, lines
//! are read from stdin until EOF or Ctrl-C.
//!
//! Run with:
//!   cargo run -p netchan --example writer --features logging -- :9000 hello 42 '{"x":1}'

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use netchan::logging::LogArgs;
use netchan::{CodecConfig, WriterConfig};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "writer", about = "Send values to a netchan address")]
struct Cli {
    /// Address to dial (`host:port`, `:port` or `unix:<path>`).
    address: String,

    /// Values to send. Reads stdin when empty.
    values: Vec<String>,

    /// Largest encoded value accepted, in bytes.
    #[arg(long, default_value_t = netchan::codec::DEFAULT_MAX_VALUE_SIZE)]
    max_value_size: usize,

    #[command(flatten)]
    log: LogArgs,
}

fn to_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    cli.log.init();

    let config = WriterConfig::default()
        .with_codec(CodecConfig::default().with_max_value_size(cli.max_value_size));
    let writer = netchan::open_with_config::<Value>(&cli.address, config)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let mut sent = 0usize;
    if cli.values.is_empty() {
        for line in std::io::stdin().lock().lines() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if writer.send(to_value(&line)).is_err() {
                break;
            }
            sent += 1;
        }
    } else {
        for raw in &cli.values {
            if !running.load(Ordering::SeqCst) || writer.send(to_value(raw)).is_err() {
                break;
            }
            sent += 1;
        }
    }

    writer.close()?;
    eprintln!("Sent {sent} value(s)");
    Ok(())
}
