pub mod dwell;
pub mod emitter;
pub mod foreground;
pub mod models;
pub mod scan;
pub mod settings;
pub mod trace;
pub mod utils;
pub mod visibility;

use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc, time::Duration};

use dwell::{DwellController, DwellEngine, MonotonicClock};
use emitter::{BeaconTransport, RecordingTransport, Transport};
use settings::DwellSettings;
use trace::{replay, Trace};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "dwelltrack",
    version = env!("CARGO_PKG_VERSION"),
    about = "Replay a recorded scroll session through the dwell engine"
)]
pub struct CliArgs {
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Record events in memory and print them instead of posting.
    #[arg(long, action)]
    pub dry_run: bool,
}

/// Host entry point: replay a recorded trace through a live engine.
/// `args` includes the binary name, as `std::env::args()` does.
pub async fn run<I>(args: I) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    let cli = match CliArgs::try_parse_from(args) {
        Ok(cli) => cli,
        // --help and --version
        Err(err) if !err.use_stderr() => {
            err.print()?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let settings = DwellSettings::load(cli.settings.as_deref())?;
    utils::init_logging(settings.debug);

    log::info!("dwelltrack starting up...");

    let trace = Trace::load(&cli.trace)?;

    let mut beacon = None;
    let mut recording = None;
    let transport: Arc<dyn Transport> = if cli.dry_run {
        let recorder = Arc::new(RecordingTransport::new());
        recording = Some(recorder.clone());
        recorder
    } else {
        BeaconTransport::check_endpoint(&settings.collect_url())
            .context("set collect_base_url (or DWELLTRACK_COLLECT_URL), or pass --dry-run")?;
        let transport = BeaconTransport::new()?;
        beacon = Some(transport.clone());
        Arc::new(transport)
    };

    let engine = DwellEngine::new(&settings, transport, Box::new(MonotonicClock::new()));
    let controller = DwellController::start(engine, settings.tick_interval());

    let replayed = replay(&controller, &trace).await;
    // Flush whatever is open even if the replay stopped early.
    let stats = controller.shutdown().await?;
    replayed?;

    if let Some(beacon) = beacon {
        beacon.drain(DRAIN_TIMEOUT).await;
    }

    if let Some(recording) = recording {
        for event in recording.events() {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    log::info!(
        "dwelltrack finished: {} of {} flushes queued",
        stats.queued,
        stats.flushes
    );
    Ok(())
}
