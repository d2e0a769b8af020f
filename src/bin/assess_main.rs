//! Offline ERD assessment of a BrainVision recording

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use erd_core::config::ConfigLoader;
use erd_core::erd::{ErdMethod, ErdMethodKind};
use erd_core::hal::Recording;
use erd_core::session::OfflineAssessment;

#[derive(Debug, Parser)]
#[command(name = "erd-assess", version, about = "Offline ERD assessment of a recorded session")]
struct Args {
    /// BrainVision header file
    #[arg(long)]
    vhdr: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// ERD method name, or `all`
    #[arg(long, default_value = "all")]
    method: String,

    /// Moving-average window in samples
    #[arg(long)]
    window: Option<usize>,

    /// Write merged trial records as JSON
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
    let mut config = loader.load_system_config()?;
    if let Some(window) = args.window {
        config.erd.moving_average_window = window;
    }

    let kinds: Vec<ErdMethodKind> = if args.method.eq_ignore_ascii_case("all") {
        ErdMethodKind::ALL.to_vec()
    } else {
        vec![args.method.parse()?]
    };
    let methods: Vec<ErdMethod> = kinds
        .into_iter()
        .map(|kind| kind.with_moving_average(config.erd.moving_average_window, config.erd.moving_average_reducer))
        .collect();

    let recording = Recording::from_vhdr(&args.vhdr)?;
    let report = OfflineAssessment::new(config, methods).run(&recording)?;

    info!(
        epochs = report.extracted_epochs,
        candidates = report.candidate_markers,
        focus = ?report.focus_channels,
        "Assessment complete"
    );
    for method in &report.methods {
        match &method.error {
            Some(reason) => error!(method = %method.method, %reason, "Method failed"),
            None => {
                for table in &method.summaries {
                    println!("{}", table);
                }
            }
        }
    }
    for (stimulus, value) in &report.grand_average {
        match value {
            Some(value) => println!("Grand average {}: {:.2}%", stimulus, value),
            None => println!("Grand average {}: n/a", stimulus),
        }
    }

    if let Some(path) = &args.output {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &report.trial_records())?;
        info!(path = %path.display(), "Trial records written");
    }
    Ok(())
}
