//! Connectivity check: opens a pool, runs a version probe and a burst of concurrent reads,
//! and optionally dumps a few rows of a table as JSON.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use table_middleware::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "PostgreSQL pool smoke test")]
struct Args {
    /// Connection URL; falls back to the POSTGRES_* variables when absent
    #[arg(long, env = "POSTGRES_URL", hide_env_values = true)]
    url: Option<String>,
    /// Override the URL's sslmode
    #[arg(long, value_enum)]
    sslmode: Option<TlsMode>,
    #[arg(long, default_value_t = 1)]
    pool_min: usize,
    #[arg(long, default_value_t = 4)]
    pool_max: usize,
    /// Seconds to wait for a free connection (0 waits forever)
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Concurrent probe queries
    #[arg(long, default_value_t = 16)]
    tasks: usize,
    /// Print the first rows of this table
    #[arg(long)]
    table: Option<String>,
    #[arg(long, default_value_t = 5)]
    limit: u64,
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .compact()
        .try_init();
}

fn descriptor(args: &Args) -> DbResult<ConnectionDescriptor> {
    let descriptor = match &args.url {
        Some(url) => ConnectionDescriptor::from_url(url)?,
        None => ConnectionDescriptor::from_env()?,
    };
    Ok(match args.sslmode {
        Some(mode) => descriptor.with_tls_mode(mode),
        None => descriptor,
    })
}

async fn run(args: Args) -> DbResult<()> {
    let descriptor = descriptor(&args)?;
    let settings = PoolSettings::sized(args.pool_min, args.pool_max).with_acquire_timeout(
        (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs)),
    );
    let client = Client::connect(&descriptor, settings).await?;

    let version = client.execute_one("SELECT version() AS version", &[]).await?;
    if let Some(text) = version
        .as_ref()
        .and_then(|row| row.get("version"))
        .and_then(RowValues::as_text)
    {
        tracing::info!(version = text, "server reachable");
    }

    let started = Instant::now();
    let probes = (0..args.tasks).map(|i| {
        let client = client.clone();
        tokio::spawn(async move {
            let n = i64::try_from(i).unwrap_or(i64::MAX);
            client.execute_all("SELECT $1::int8 AS n", &[RowValues::Int(n)]).await
        })
    });
    let mut failures = 0usize;
    for probe in probes.collect::<Vec<_>>() {
        match probe.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "probe failed");
                failures += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "probe task panicked");
                failures += 1;
            }
        }
    }
    tracing::info!(
        tasks = args.tasks,
        failures,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        status = ?client.status(),
        "concurrent probes finished"
    );

    if let Some(table) = &args.table {
        let rows = client.table(table.as_str()).limit(args.limit).execute().await?;
        println!("{}", serde_json::to_string_pretty(&rows.to_json()).unwrap_or_default());
    }

    client.close();
    if failures > 0 {
        return Err(DbError::Connection(format!("{failures} probe(s) failed")));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pg-smoke: {e}");
            ExitCode::FAILURE
        }
    }
}
