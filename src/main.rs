//! Acoustic Entropy CLI
//!
//! Command-line interface for running the extraction pipeline over a
//! synthetic sample feed and inspecting its output and run-count quality.

use acoustic_entropy::{
    capture::{FileConfig, SampleSource, SyntheticSource},
    stream::{Preference, RandomStream, StreamError},
    Trng, TrngError,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Words a full round of sample draws can consume.
const WORDS_PER_ROUND: usize = 6;

#[derive(Debug, Parser)]
#[command(name = "acoustic-entropy", version, about = "Random numbers from noisy audio samples")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of blocks to process before exiting
    #[arg(short, long)]
    blocks: Option<u32>,

    /// Samples per extraction block
    #[arg(long)]
    block_size: Option<usize>,

    /// 32-bit words per block (0 for as many as possible)
    #[arg(long)]
    output_words: Option<usize>,

    /// Longest run length tracked by the analyzer
    #[arg(long)]
    max_run_length: Option<usize>,

    /// Rounds of sample draws printed per block
    #[arg(long, default_value_t = 1)]
    draws: usize,

    /// Seed for the synthetic sample feed
    #[arg(long)]
    seed: Option<u64>,

    /// Run until interrupted
    #[arg(long)]
    continuous: bool,

    /// Metrics server port (0 to disable)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Run-count monitor on every block, overriding the config file
    #[arg(long)]
    monitor: bool,
}

impl Args {
    fn load_config(&self) -> Result<FileConfig, acoustic_entropy::capture::ConfigError> {
        let mut config = match &self.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };

        if let Some(blocks) = self.blocks {
            config.output.blocks = blocks;
        }
        if let Some(block_size) = self.block_size {
            config.trng.block_size = block_size;
        }
        if let Some(words) = self.output_words {
            config.trng.output_words = words;
        }
        if let Some(max_length) = self.max_run_length {
            config.analyzer.max_length = max_length;
        }
        if let Some(port) = self.metrics_port {
            config.output.metrics_port = port;
        }
        config.output.continuous |= self.continuous;
        config.trng.monitor |= self.monitor;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Acoustic Entropy Generator v{}", acoustic_entropy::VERSION);

    let config = match args.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut trng = match Trng::from_file_config(&config) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to create TRNG: {}", e);
            std::process::exit(1);
        }
    };
    let stream = trng.stream();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let stream = stream.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
            stream.stop();
        }) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    #[cfg(feature = "metrics")]
    let metrics_state = start_metrics_server(config.output.metrics_port);

    let seed = args.seed.unwrap_or_else(rand::random);
    info!(seed, "Using synthetic sample source");
    let mut source = SyntheticSource::new(seed);
    if let Err(e) = source.open() {
        eprintln!("Failed to open sample source: {}", e);
        std::process::exit(1);
    }

    trng.start();

    let mut chunk = vec![0.0f32; config.output.chunk_size.max(1)];
    let mut delivered_blocks: u32 = 0;

    while running.load(Ordering::SeqCst) {
        if !config.output.continuous && delivered_blocks >= config.output.blocks {
            break;
        }

        let n = match source.read(&mut chunk) {
            Ok(n) => n,
            Err(e) => {
                error!("Sample read failed: {}", e);
                break;
            }
        };

        match trng.accumulate(&chunk[..n]) {
            Ok(0) => continue,
            Ok(delivered) => {
                delivered_blocks += delivered as u32;
                print_draws(&stream, args.draws).await;
            }
            Err(TrngError::Stopped) => break,
            Err(e) => {
                error!("Extraction failed: {}", e);
                break;
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Some(state) = &metrics_state {
                let snapshot = acoustic_entropy::metrics::MetricsSnapshot::from_components(
                    &trng.stats(),
                    stream.available(),
                    trng.report(),
                );
                state
                    .write()
                    .await
                    .update(&snapshot, trng.last_violation().is_some());
            }
        }
    }

    trng.stop();

    let stats = trng.stats();
    info!(
        blocks = stats.blocks,
        truncated = stats.truncated_blocks,
        warmup = stats.warmup_blocks,
        silent_chunks = stats.silent_chunks,
        bytes = stats.bytes,
        "Pipeline finished"
    );

    match trng.report() {
        Some(report) => {
            if let Some(worst) = report.worst_run_count_diff() {
                info!(
                    analyzed_blocks = report.blocks,
                    run_length = worst.run_length,
                    diff_percent = %format!("{:.2}", worst.avg_run_count_diff),
                    "Largest run-count deviation"
                );
            }
            match report.check(&config.thresholds) {
                Ok(()) => info!("Run counts within thresholds"),
                Err(v) => warn!("Run counts outside thresholds: {}", v),
            }
        }
        None if config.trng.monitor => warn!("Not enough output for a run-count report"),
        None => info!("Run-count monitoring disabled"),
    }
}

/// Prints a few draws of each kind while the pool can cover them.
async fn print_draws(stream: &RandomStream, rounds: usize) {
    for _ in 0..rounds {
        if stream.available() < WORDS_PER_ROUND {
            break;
        }
        let result: Result<(), StreamError> = async {
            let die = stream.integer(1, 6).await?;
            let low = stream
                .linearly_weighted_integer(Preference::Low, 1, 100)
                .await?;
            let float = stream.float64().await?;
            let pick = stream.weighted_integer(&[1.0, 2.0, 3.0, 4.0]).await?;
            println!(
                "die={} low_biased={} float={:.6} weighted={}",
                die, low, float, pick
            );
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!("Draw failed: {}", e);
            break;
        }
    }
}

#[cfg(feature = "metrics")]
fn start_metrics_server(
    port: u16,
) -> Option<Arc<tokio::sync::RwLock<acoustic_entropy::metrics::MetricsState>>> {
    use acoustic_entropy::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    if port == 0 {
        return None;
    }
    let registry = match MetricsRegistry::new() {
        Ok(r) => r,
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            return None;
        }
    };
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
    let state = server.state();
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Metrics server failed: {}", e);
        }
    });
    Some(state)
}
