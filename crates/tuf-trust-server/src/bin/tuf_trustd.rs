//! `tuf-trustd`: the long-running process that exposes the TUF metadata update pipeline,
//! server-key endpoints, and change feed over HTTP (spec component D, `SPEC_FULL.md` §2).

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use chrono::Duration;
use clap::Parser;
use log::{info, LevelFilter};
use tonic::transport::Channel;
use tuf_signer::client::GrpcSignerClient;
use tuf_trust_server::backend::AnyMetaStore;
use tuf_trust_server::config::TrustConfig;
use tuf_trust_server::http::{self, AppState};
use tuf_trust_server::metrics::MetricsRegistry;
use tuf_trust_server::trust_pinning::TrustPinning;
use tuf_trust_server::TrustServer;

/// The trust server daemon.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the configuration file (TOML). Missing file falls back to built-in defaults.
    #[arg(short = 'c', long, default_value = "tuf-trustd.toml")]
    config: String,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: &str) {
    let level: LevelFilter = level.parse().unwrap_or(LevelFilter::Info);
    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} [{}] {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();
    if result.is_err() {
        eprintln!("logger has already been set");
    }
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = TrustConfig::load(&args.config)?;
    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(log_level);

    info!("tuf-trustd starting, listening on {}", config.listen_addr);

    let store = match &config.database_url {
        Some(url) => {
            info!("tuf-trustd using Postgres metadata store");
            AnyMetaStore::connect_postgres(url).await?
        }
        None => {
            info!("tuf-trustd using in-memory metadata store (no database_url configured)");
            AnyMetaStore::memory()
        }
    };

    let channel = Channel::from_shared(config.signer_endpoint.clone())?
        .connect()
        .await?;
    let signer = GrpcSignerClient::new(channel);

    let trust_server = Arc::new(TrustServer::new(
        Arc::new(store),
        Arc::new(signer),
        Duration::seconds(config.rotate_once_per_secs),
        TrustPinning::from_config(&config.trust_pinning),
        Arc::new(MetricsRegistry::new()),
        config.change_feed_default_page_size,
    ));
    trust_server.bootstrap().await?;

    let app_state = web::Data::new(AppState {
        server: trust_server,
        repo_prefixes: config.repo_prefixes.clone(),
    });
    let listen_addr = config.listen_addr.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(http::configure::<AnyMetaStore, GrpcSignerClient>)
    })
    .bind(&listen_addr)?
    .run()
    .await?;

    Ok(())
}
