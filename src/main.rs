//! batchstore - batching, deduplication and caching demo
//!
//! Sends bursts of lookups through a simulated slow, flaky getter and prints
//! what the store saved.

use anyhow::Context;
use async_trait::async_trait;
use batchstore::utils::logging::{LogFormat, init_logging};
use batchstore::{BatchStore, Config, FetchError, Getter, IntoRecords, Records, build_info};
use clap::Parser;
use futures::future::join_all;
use rand::Rng;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

const LANGUAGES: [&str; 3] = ["en", "fr", "de"];

#[derive(Debug, Parser)]
#[command(name = "batchstore", version, about = "Batching, deduplication and caching demo")]
struct Args {
    /// YAML configuration file; BATCHSTORE_* variables are read otherwise
    #[arg(short, long, env = "BATCHSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Lookups per burst
    #[arg(long, default_value_t = 250)]
    lookups: u64,

    /// Size of the identifier space lookups draw from
    #[arg(long, default_value_t = 100)]
    ids: u64,

    #[arg(long, default_value_t = 3)]
    bursts: u32,

    /// Simulated getter latency in milliseconds
    #[arg(long, default_value_t = 20)]
    latency_ms: u64,

    /// Probability that a getter call fails
    #[arg(long, default_value_t = 0.1)]
    failure_rate: f64,

    #[arg(long, default_value = "info", env = "BATCHSTORE_LOG_LEVEL")]
    log_level: String,

    #[arg(long, default_value = "plain")]
    log_format: LogFormat,

    /// Print build information and exit
    #[arg(long)]
    build_info: bool,
}

/// Getter standing in for a slow upstream bulk API
struct SlowGetter {
    latency: Duration,
    failure_rate: f64,
    calls: AtomicU64,
}

#[async_trait]
impl Getter for SlowGetter {
    type Id = u64;
    type Params = Value;
    type Value = String;
    type Response = HashMap<u64, String>;
    type Error = String;

    async fn fetch(&self, ids: &[u64], params: &Value) -> Result<Self::Response, String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;

        if rand::random::<f64>() < self.failure_rate {
            return Err(format!("upstream timed out fetching {} ids", ids.len()));
        }

        let language = params.get("language").and_then(Value::as_str).unwrap_or("en");
        // Every 17th identifier does not exist upstream
        Ok(ids
            .iter()
            .filter(|id| *id % 17 != 0)
            .map(|id| (*id, format!("{}:{}", language, id)))
            .collect())
    }

    fn parse_response(
        &self,
        response: Self::Response,
        ids: &[u64],
        _params: &Value,
    ) -> Result<Records<u64, String>, String> {
        Ok(response.into_records(ids))
    }
}

#[derive(Debug, Default)]
struct BurstSummary {
    found: usize,
    absent: usize,
    rejected: usize,
    closed: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.build_info {
        let info = build_info();
        println!(
            "batchstore {} ({} built {} with {})",
            info.version, info.git_hash, info.build_time, info.rust_version
        );
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(args.log_format, &args.log_level) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };
    info!(
        "Partitioning batches on {:?}, limit {}, tick {}ms",
        config.unique_options, config.batch.limit, config.batch.tick_ms
    );

    let getter = SlowGetter {
        latency: Duration::from_millis(args.latency_ms),
        failure_rate: args.failure_rate.clamp(0.0, 1.0),
        calls: AtomicU64::new(0),
    };
    let store = BatchStore::new(config, getter).context("creating batch store")?;

    let event_counts = Arc::new(parking_lot::Mutex::new(HashMap::<&'static str, u64>::new()));
    let listener = {
        let mut events = store.subscribe();
        let counts = Arc::clone(&event_counts);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => *counts.lock().entry(event.name()).or_default() += 1,
                    Err(RecvError::Lagged(missed)) => warn!("Event listener lagged by {}", missed),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    for burst in 1..=args.bursts {
        let started = Instant::now();
        let lookups: Vec<_> = {
            let mut rng = rand::thread_rng();
            (0..args.lookups)
                .map(|_| {
                    let id = rng.gen_range(0..args.ids.max(1));
                    let language = LANGUAGES[rng.gen_range(0..LANGUAGES.len())];
                    store.add(id, json!({ "language": language }))
                })
                .collect()
        };

        let mut summary = BurstSummary::default();
        for outcome in join_all(lookups).await {
            match outcome {
                Ok(Some(_)) => summary.found += 1,
                Ok(None) => summary.absent += 1,
                Err(FetchError::Getter(_)) => summary.rejected += 1,
                Err(FetchError::Closed) => summary.closed += 1,
            }
        }

        info!(
            "Burst {}: {:?} in {:?}, {} getter calls so far",
            burst,
            summary,
            started.elapsed(),
            store.getter().calls.load(Ordering::Relaxed)
        );
    }

    let stats = store.stats();
    store.shutdown();
    listener.abort();

    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!("hit rate: {:.1}%", stats.hit_rate() * 100.0);
    println!("events: {:?}", event_counts.lock());
    println!(
        "{} lookups served by {} getter calls",
        args.lookups * u64::from(args.bursts),
        store.getter().calls.load(Ordering::Relaxed)
    );

    Ok(())
}
