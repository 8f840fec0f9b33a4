pub mod assessment;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod sensing;
pub mod settings;
pub mod utils;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use assessment::InferenceClient;
use db::{helpers::format_time, RecordSink};
use pipeline::{CycleTiming, Pipeline, PipelineController};
use sensing::SourceKind;
use settings::{Settings, SourceMode, CONFIG_ENV};
use utils::Logging;

#[derive(Parser)]
#[command(name = "vitalwatch")]
#[command(about = "Vital-sign ingestion and clinical annotation pipeline", long_about = None)]
struct Cli {
    /// Settings file (JSON). Falls back to $VITALWATCH_CONFIG, then built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the acquisition loop until interrupted
    Run {
        #[arg(long, value_enum)]
        source: Option<SourceMode>,
        /// Serial device to read when the source is `serial`
        #[arg(long)]
        device: Option<PathBuf>,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Print the most recent stored records
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the effective settings as JSON
    ShowConfig,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let mut settings = Settings::load(config_path.as_deref())?;
    settings.apply_env_overrides();
    if let Commands::Run { source, device, .. } = &cli.command {
        if let Some(mode) = source {
            settings.source.mode = *mode;
        }
        if let Some(device) = device {
            settings.source.device = device.clone();
        }
    }
    settings.validate().context("invalid settings")?;

    let logging = Logging::init(&settings.logging)?;
    log_info!(logging.context("vitalwatch"), "vitalwatch starting up...");

    let result = match cli.command {
        Commands::Run { once, .. } => run_pipeline(&settings, &logging, once).await,
        Commands::InitDb => {
            let sink = RecordSink::new(&settings.database, logging.context("db"));
            sink.initialize().await.map(|()| {
                println!("Schema ready at {}.", sink.path().display());
            })
        }
        Commands::Recent { limit } => print_recent(&settings, &logging, limit).await,
        Commands::ShowConfig => serde_json::to_string_pretty(&settings)
            .map(|json| println!("{json}"))
            .context("failed to serialize settings"),
    };

    logging.shutdown();
    result
}

async fn run_pipeline(settings: &Settings, logging: &Logging, once: bool) -> Result<()> {
    let log = logging.context("vitalwatch");

    let sink = RecordSink::new(&settings.database, logging.context("db"));
    // Every insert re-checks the schema, so a database that is down now can still recover later.
    if let Err(err) = sink.initialize().await {
        log_error!(log, "database not ready, will retry on each write: {err:#}");
    }

    let source = SourceKind::from_settings(&settings.source, logging.context("sensing"))
        .await
        .context("failed to open reading source")?;
    let assessor = InferenceClient::new(&settings.inference, logging.context("assessment"))?;

    log_info!(
        log,
        "source={} endpoint={} model={} database={}",
        source.name(),
        assessor.endpoint(),
        settings.inference.model,
        sink.path().display()
    );

    let mut pipeline = Pipeline::new(
        source,
        assessor,
        sink,
        settings.validation.clone(),
        logging.context("pipeline"),
    );

    if once {
        let outcome = pipeline.run_cycle().await;
        log_info!(log, "single cycle finished: {}", outcome.label());
        return Ok(());
    }

    let mut controller = PipelineController::new(logging.context("pipeline"));
    controller.start(pipeline, CycleTiming::from(&settings.schedule))?;

    shutdown_signal().await?;
    log_info!(log, "shutdown requested, waiting for the current cycle to finish");

    let stats = controller.stop().await?;
    log_info!(
        log,
        "stopped after {} cycles ({} records stored)",
        stats.cycles,
        stats.persisted
    );
    Ok(())
}

async fn print_recent(settings: &Settings, logging: &Logging, limit: usize) -> Result<()> {
    let sink = RecordSink::new(&settings.database, logging.context("db"));
    let records = sink
        .fetch_recent_records(limit)
        .await
        .context("failed to read stored records")?;

    if records.is_empty() {
        println!("No records stored in {}.", sink.path().display());
        return Ok(());
    }

    for record in records {
        let r = &record.reading;
        println!(
            "#{} {} {} pulse={} spo2={:.1} resp={} temp={:.1} rhythm={} A0={} BPM={}",
            record.id,
            format_time(&r.timestamp),
            r.patient_id,
            r.pulse_rate,
            r.oxygen_saturation,
            r.respiration_rate,
            r.temperature,
            r.ecg_rhythm,
            r.raw_amplitude,
            r.raw_bpm
        );
        println!("    {}", record.assessment.text);
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c"),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")
}
