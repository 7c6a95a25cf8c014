//! `tuf-adminctl`: a thin developer CLI over `tuf-trustd`'s HTTP surface (spec §6 **[AMBIENT]**).
//!
//! Not part of the trust-metadata pipeline itself — just a convenience wrapper for local
//! operation, grounded in the clap-derive-plus-`reqwest` conventions of `rust-us-kv-rs`'s
//! `kvcli`.

use clap::{Parser, Subcommand};
use log::LevelFilter;

/// Talk to a running `tuf-trustd` over HTTP.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the trust server, e.g. `http://127.0.0.1:4443`.
    #[arg(long, default_value = "http://127.0.0.1:4443")]
    server: String,

    /// Override the log level.
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Page through the change feed.
    Changefeed {
        /// Restrict to one GUN. Omit for the global feed.
        #[arg(long)]
        gun: Option<String>,

        /// Resume after this change id.
        #[arg(long)]
        since: Option<i64>,

        /// Maximum records to fetch.
        #[arg(long)]
        records: Option<i64>,

        /// Return records in decreasing id order.
        #[arg(long, default_value_t = false)]
        reversed: bool,
    },

    /// Key operations.
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Debug, Subcommand)]
enum KeyAction {
    /// Get the current key for (gun, role), creating one if none exists.
    Get {
        #[arg(long)]
        gun: String,
        #[arg(long)]
        role: String,
    },
    /// Rotate the key for (gun, role).
    Rotate {
        #[arg(long)]
        gun: String,
        #[arg(long)]
        role: String,
    },
}

fn init_logging(level: &str) {
    let level: LevelFilter = level.parse().unwrap_or(LevelFilter::Warn);
    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();
    if result.is_err() {
        eprintln!("logger has already been set");
    }
}

fn changefeed_path(server: &str, gun: &Option<String>) -> String {
    match gun {
        Some(gun) => format!("{server}/v2/{gun}/_trust/changefeed"),
        None => format!("{server}/v2/_trust/changefeed"),
    }
}

fn key_path(server: &str, gun: &str, role: &str) -> Result<String, Box<dyn std::error::Error>> {
    match role {
        "snapshot" | "timestamp" => Ok(format!("{server}/v2/{gun}/_trust/tuf/{role}.key")),
        other => Err(format!("role must be 'snapshot' or 'timestamp', got {other:?}").into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let client = reqwest::Client::new();

    match &args.command {
        Command::Changefeed { gun, since, records, reversed } => {
            let mut request = client.get(changefeed_path(&args.server, gun));
            if let Some(since) = since {
                request = request.query(&[("change_id", since.to_string())]);
            }
            if let Some(records) = records {
                request = request.query(&[("records", records.to_string())]);
            }
            if *reversed {
                request = request.query(&[("reversed", "true")]);
            }
            let body: serde_json::Value = request.send().await?.error_for_status()?.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Key { action } => match action {
            KeyAction::Get { gun, role } => {
                let url = key_path(&args.server, gun, role)?;
                let body: serde_json::Value = client.get(url).send().await?.error_for_status()?.json().await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            KeyAction::Rotate { gun, role } => {
                let url = key_path(&args.server, gun, role)?;
                let body: serde_json::Value = client.post(url).send().await?.error_for_status()?.json().await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        },
    }

    Ok(())
}
