use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keygate::config::KeygateConfig;
use keygate::ratelimit::{AdmissionStore, Credential, MemoryStore, RateLimiter};

/// Drive a credential pool through the admission limiter.
#[derive(Debug, Parser)]
#[command(name = "keygate", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of requests to get admitted
    #[arg(short, long, default_value_t = 15)]
    requests: usize,

    /// Number of concurrent workers sharing the limiter
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Upper bound for the random delay added to each retry.
const MAX_JITTER_MS: u64 = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Keygate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => KeygateConfig::load(path)?,
        None => KeygateConfig::default(),
    };
    if config.credentials.is_empty() && args.config.is_none() {
        warn!("No configuration given, using the demo credential pool");
        config.credentials = demo_credentials();
    }

    let store = open_store(&config).await?;
    let limiter = Arc::new(RateLimiter::with_config(
        config.credentials.clone(),
        config.rate_limiting.clone(),
        store,
    )?);
    info!(
        credentials = limiter.credential_ids().len(),
        workers = args.workers,
        requests = args.requests,
        "Rate limiter initialized"
    );

    let workers = args.workers.max(1);
    let tasks = (0..workers).map(|worker| {
        let limiter = limiter.clone();
        let quota = args.requests / workers + usize::from(worker < args.requests % workers);
        tokio::spawn(async move { run_worker(worker, quota, limiter).await })
    });
    for result in futures::future::join_all(tasks).await {
        result??;
    }

    let mut usage = Vec::new();
    for id in limiter.credential_ids() {
        if let Some(credential_usage) = limiter.usage(id).await? {
            usage.push(credential_usage);
        }
    }
    println!("{}", serde_json::to_string_pretty(&usage)?);

    info!("Keygate stopped");
    Ok(())
}

/// Acquire `quota` admissions, sleeping for the returned wait between
/// rejections.
async fn run_worker(worker: usize, quota: usize, limiter: Arc<RateLimiter>) -> anyhow::Result<()> {
    let mut admitted = 0;
    while admitted < quota {
        let decision = limiter.acquire().await?;
        if decision.admitted {
            admitted += 1;
            info!(
                worker,
                credential = decision.credential_id.as_deref().unwrap_or_default(),
                "Request admitted"
            );
            continue;
        }

        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS));
        info!(
            worker,
            wait_secs = decision.wait_seconds,
            "All credentials exhausted, waiting"
        );
        tokio::time::sleep(decision.wait() + jitter).await;
    }
    Ok(())
}

async fn open_store(config: &KeygateConfig) -> anyhow::Result<Arc<dyn AdmissionStore>> {
    match config.store.redis_url.as_deref() {
        #[cfg(feature = "redis-store")]
        Some(url) => Ok(Arc::new(keygate::ratelimit::RedisStore::connect(url).await?)),
        #[cfg(not(feature = "redis-store"))]
        Some(_) => anyhow::bail!("redis_url is set but keygate was built without the redis-store feature"),
        None => {
            info!("Using in-process admission store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn demo_credentials() -> Vec<Credential> {
    vec![
        Credential::new("api_key_1", 2, 5000, 100000),
        Credential::new("api_key_2", 3, 6000, 120000),
        Credential::new("api_key_3", 4, 7000, 140000),
    ]
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
