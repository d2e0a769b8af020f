//! Live ERD loop over an RDA receiver, a replayed recording or the simulator

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use erd_core::communication::{Sink, TcpBroadcaster};
use erd_core::config::ConfigLoader;
use erd_core::hal::{DataSource, EegSimulator, RdaClient, Recording, ReplaySource, SimulatorConfig};
use erd_core::session::LiveSession;
use erd_core::summary::SummaryTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceArg {
    Rda,
    Simulate,
    Replay,
}

#[derive(Debug, Parser)]
#[command(name = "erd-live", version, about = "Live ERD computation with result broadcasting")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "rda")]
    source: SourceArg,

    /// Recording to replay, required with `--source replay`
    #[arg(long)]
    vhdr: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Write trial records as JSON when the session ends
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(fmt::layer())
        .init();

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_file(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load_system_config()?;

    let source = match args.source {
        SourceArg::Rda => DataSource::from(RdaClient::new(
            config.live.receiver_address.clone(),
            Duration::from_millis(config.live.chunk_timeout_ms),
        )),
        SourceArg::Simulate => DataSource::from(EegSimulator::new(SimulatorConfig {
            realtime: true,
            ..SimulatorConfig::default()
        })?),
        SourceArg::Replay => {
            let path = args.vhdr.as_ref().ok_or("--vhdr is required with --source replay")?;
            DataSource::from(ReplaySource::new(Recording::from_vhdr(path)?).with_realtime(true))
        }
    };

    let sink = if config.live.broadcast_enabled {
        Sink::Tcp(TcpBroadcaster::bind(&config.live.broadcast_address)?)
    } else {
        Sink::Null
    };

    let stop = Arc::new(AtomicBool::new(false));
    if let Some(seconds) = args.duration {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
            stop.store(true, Ordering::SeqCst);
        });
    }

    let method = config.erd.method().to_string();
    let mut session = LiveSession::connect(&config, source, sink)?;
    let report = session.run(&stop)?;

    if report.max_latency_ms > config.live.latency_target_ms as f64 {
        warn!(max_latency_ms = report.max_latency_ms, "Latency target missed during session");
    }
    for policy in &config.summary.boundaries {
        let table = SummaryTable::from_trials(&method, *policy, &report.trials, config.summary.rest_outlier_range);
        println!("{}", table);
    }

    if let Some(path) = &args.output {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &report.trials)?;
        info!(path = %path.display(), trials = report.trials.len(), "Trial records written");
    }
    Ok(())
}
