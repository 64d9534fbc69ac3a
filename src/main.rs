use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use trx_intake::engine::{EngineConfig, SharedRegistry};
use trx_intake::http::{self, GenerateSignatureResponseBody};
use trx_intake::timestamp::{self, FreshnessPolicy};
use trx_intake::{Amount, Engine, StaticRegistry};

#[derive(Debug, Parser)]
#[command(name = "trx-intake", version, about = "Partner transaction intake service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the intake HTTP API
    Serve(ServeArgs),
    /// Print the signature a partner would send for the given fields
    Sign(SignArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
    /// `refno,name,secret` csv replacing the built-in partner table
    #[arg(long)]
    partners: Option<PathBuf>,
    /// Allowed distance between request timestamp and server time
    #[arg(long, default_value_t = 300)]
    freshness_secs: u32,
    #[arg(long)]
    no_freshness: bool,
    #[arg(long)]
    no_item_total_check: bool,
}

#[derive(Debug, Args)]
struct SignArgs {
    #[arg(long)]
    partner_key: String,
    #[arg(long)]
    partner_ref_no: String,
    /// Total amount in minor units
    #[arg(long, allow_negative_numbers = true)]
    amount: i64,
    /// Defaults to the current time
    #[arg(long)]
    timestamp: Option<String>,
    #[arg(long)]
    partners: Option<PathBuf>,
}

fn init_tracing(default: LevelFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_registry(path: Option<&PathBuf>) -> anyhow::Result<SharedRegistry> {
    let registry = match path {
        Some(path) => StaticRegistry::from_csv(path)
            .with_context(|| format!("loading partners from {}", path.display()))?,
        None => StaticRegistry::builtin(),
    };
    info!(partners = registry.len(), "partner registry loaded");
    Ok(Arc::new(registry))
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let registry = load_registry(args.partners.as_ref())?;

    let freshness = if args.no_freshness {
        FreshnessPolicy::disabled()
    } else {
        FreshnessPolicy::new(TimeDelta::seconds(i64::from(args.freshness_secs)))
    };
    let config = EngineConfig {
        freshness,
        check_item_total: !args.no_item_total_check,
        ..EngineConfig::default()
    };
    let engine = Arc::new(Engine::with_config(registry, config));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!(addr = %args.bind, "intake service listening");

    axum::serve(listener, http::router(engine))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("intake service stopped");
    Ok(())
}

fn sign(args: SignArgs) -> anyhow::Result<()> {
    let registry = load_registry(args.partners.as_ref())?;
    let engine = Engine::new(registry);

    let timestamp = args
        .timestamp
        .unwrap_or_else(|| timestamp::canonical(&Utc::now()));
    let stamp = engine.generate_signature(
        &args.partner_key,
        &args.partner_ref_no,
        Amount::from_minor(args.amount),
        &timestamp,
    )?;

    let body = GenerateSignatureResponseBody {
        timestamp: stamp.timestamp,
        sig: stamp.signature,
    };
    println!("{}", serde_json::to_string(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            init_tracing(LevelFilter::INFO);
            serve(args).await
        }
        Command::Sign(args) => {
            init_tracing(LevelFilter::WARN);
            sign(args)
        }
    }
}
