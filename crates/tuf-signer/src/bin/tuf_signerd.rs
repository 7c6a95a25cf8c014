//! `tuf-signerd`: the long-running process that owns the key database and exposes
//! `KeyManagement`/`Signer`/`Health` over a gRPC listener (spec component C, `SPEC_FULL.md` §2).

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use log::{info, LevelFilter};
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tuf_keydb::passphrase::EnvPassphraseRetriever;
use tuf_keydb::Cache;
use tuf_signer::backend::AnyKeyDbStore;
use tuf_signer::config::SignerConfig;
use tuf_signer::proto::health_server::HealthServer;
use tuf_signer::proto::key_management_server::KeyManagementServer;
use tuf_signer::proto::signer_server::SignerServer;
use tuf_signer::service::{HealthServiceImpl, SignerServiceImpl};

/// The signing service daemon.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the configuration file (TOML). Missing file falls back to built-in defaults.
    #[arg(short = 'c', long, default_value = "tuf-signerd.toml")]
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = SignerConfig::load(&args.config)?;
    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(log_level);

    info!("tuf-signerd starting, listening on {}", config.listen_addr);

    let retriever = EnvPassphraseRetriever::new(&config.passphrase_env_prefix);
    let store = match &config.database_url {
        Some(url) => {
            info!("tuf-signerd using Postgres key store");
            AnyKeyDbStore::connect_postgres(url, retriever).await?
        }
        None => {
            info!("tuf-signerd using in-memory key store (no database_url configured)");
            AnyKeyDbStore::memory(retriever)
        }
    };
    store.health_check().await?;
    let cache = Arc::new(Cache::new(Arc::new(store)));

    let signer_service = SignerServiceImpl::new(cache.clone());
    let health_service = HealthServiceImpl::new(cache);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let mut server = Server::builder();

    if let (Some(cert_path), Some(key_path)) =
        (config.tls.cert_path.as_ref(), config.tls.key_path.as_ref())
    {
        let cert = std::fs::read(cert_path)?;
        let key = std::fs::read(key_path)?;
        let identity = Identity::from_pem(cert, key);
        let mut tls = ServerTlsConfig::new().identity(identity);
        if let Some(ca_path) = config.tls.client_ca_path.as_ref() {
            let ca = std::fs::read(ca_path)?;
            tls = tls.client_ca_root(tonic::transport::Certificate::from_pem(ca));
        }
        server = server.tls_config(tls)?;
        info!("tuf-signerd TLS enabled");
    } else {
        info!("tuf-signerd running without TLS (dev mode; configure `tls` for production)");
    }

    server
        .add_service(KeyManagementServer::new(signer_service.clone()))
        .add_service(SignerServer::new(signer_service))
        .add_service(HealthServer::new(health_service))
        .serve(addr)
        .await?;

    Ok(())
}
