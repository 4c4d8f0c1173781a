//! heatctl: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RpiUart / SimulatedMeter   JsonRadiatorStore   IntentsFile    │
//! │  (TelemetrySource)          (RadiatorStore)     (IntentSource) │
//! │  RppalBus / NoBus           LogEventSink        Watchdog       │
//! │  (BusOpener)                (EventSink)         (Liveness)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Controller (pure logic)                   │    │
//! │  │  Budget · Shedding · Admission · Sync                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Listener thread (per frame) · Scheduler cycle (per tick)      │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use embassy_time::{Duration, Ticker};
use log::{error, info, warn};

use heatctl::adapters::config_file::FileConfigAdapter;
use heatctl::adapters::intents_file::IntentsFile;
use heatctl::adapters::log_sink::LogEventSink;
use heatctl::adapters::radiator_store::JsonRadiatorStore;
use heatctl::adapters::serial::SimulatedMeter;
use heatctl::app::listener::TelemetryListener;
use heatctl::app::ports::{ConfigPort, IntentSource, RadiatorStore, SchedulerDelegate, TelemetrySource};
use heatctl::app::service::Controller;
use heatctl::config::ControllerConfig;
use heatctl::drivers::mcp23017::{BusOpener, NoBus, PinDriver, SharedPinDriver};
use heatctl::drivers::watchdog::Watchdog;
use heatctl::power::PowerBudget;
use heatctl::scheduler::{Job, Schedule, Scheduler};
use heatctl::shared::{DeferredActivationQueue, TelemetryStore};

// ── Command line ──────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "heatctl", version, about = "Power-aware radiator controller")]
struct Cli {
    /// JSON config file; missing means defaults.
    #[arg(short, long, default_value = "/etc/heatctl/heatctl.json")]
    config: PathBuf,

    /// Simulate the meter and the expander.
    #[arg(
        long,
        env = "HEATCTL_UNPLUGGED",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    unplugged: bool,

    /// Meter serial device.
    #[arg(long, env = "HEATCTL_SERIAL_PORT")]
    serial_port: Option<String>,

    /// Radiator table (JSON).
    #[arg(long)]
    store: Option<PathBuf>,

    /// Heating intents file (JSON).
    #[arg(long)]
    intents: Option<PathBuf>,

    /// Write the effective config to `--config` and exit.
    #[arg(long)]
    init_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut ControllerConfig) {
        if self.unplugged {
            config.unplugged = true;
        }
        if let Some(port) = &self.serial_port {
            config.serial_port.clone_from(port);
        }
        if let Some(path) = &self.store {
            config.radiator_store_path = path.display().to_string();
        }
        if let Some(path) = &self.intents {
            config.intents_path = path.display().to_string();
        }
    }
}

// ── Scheduler delegate ────────────────────────────────────────
//
// Bridges the scheduler (which knows nothing about the controller) to
// the power check, intake and reconciliation operations.

struct CycleDelegate<'a, S: RadiatorStore + ?Sized, O: BusOpener> {
    controller: &'a Controller<S, O>,
    intents: &'a IntentsFile,
    sink: LogEventSink,
}

impl<S: RadiatorStore + ?Sized, O: BusOpener> SchedulerDelegate for CycleDelegate<'_, S, O> {
    fn on_job_due(&mut self, job: Job) {
        match job {
            Job::PowerCheck => {
                if let Err(e) = self.controller.check_power(Instant::now(), &mut self.sink) {
                    error!("Cycle: power check failed: {e}");
                }
            }
            Job::Intake => match self.intents.current_intents() {
                Ok(intents) => {
                    if let Err(e) = self.controller.submit_intents(&intents, &mut self.sink) {
                        error!("Cycle: intake failed: {e}");
                    }
                }
                Err(e) => warn!("Cycle: cannot read intents: {e}"),
            },
            Job::Reconcile => {
                if let Err(e) = self.controller.synchronize(&mut self.sink) {
                    error!("Cycle: reconciliation failed: {e}");
                }
            }
        }
    }
}

fn periodic(job: Job, interval_ms: u64, immediate: bool) -> Schedule {
    Schedule {
        job,
        interval_ms,
        immediate,
    }
}

/// File config with env/CLI overrides, validated.
fn load_config(cli: &Cli, port: &impl ConfigPort) -> heatctl::error::Result<ControllerConfig> {
    let mut config = port.load()?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    info!("╔══════════════════════════════════════╗");
    info!("║  heatctl v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1. Config: file, then env/CLI overrides ───────────────
    let config_port = FileConfigAdapter::new(&cli.config);
    let config = load_config(&cli, &config_port)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if cli.init_config {
        config_port
            .save(&config)
            .with_context(|| format!("writing {}", cli.config.display()))?;
        info!("Config written to {}", cli.config.display());
        return Ok(());
    }

    // ── 2. Radiator table ─────────────────────────────────────
    let store = Arc::new(
        JsonRadiatorStore::open(&config.radiator_store_path)
            .with_context(|| format!("opening {}", config.radiator_store_path))?,
    );

    // ── 3. Hardware or simulation ─────────────────────────────
    #[cfg(feature = "rpi")]
    {
        use heatctl::adapters::i2c::RppalBus;
        use heatctl::adapters::serial::RpiUart;

        if !config.unplugged {
            let driver = PinDriver::new(RppalBus::new(config.i2c_bus), config.mcp23017_address);
            let meter = RpiUart::open(&config).context("opening the meter line")?;
            return run(&config, store, driver, meter);
        }
    }
    #[cfg(not(feature = "rpi"))]
    {
        if !config.unplugged {
            warn!("Built without the `rpi` feature: running unplugged");
        }
    }

    let meter = SimulatedMeter::new(45, vec![8, 12, 20, 31, 24, 15])
        .paced(std::time::Duration::from_secs(1));
    run(&config, store, PinDriver::simulated(NoBus), meter)
}

fn run<O, T>(
    config: &ControllerConfig,
    store: Arc<JsonRadiatorStore>,
    driver: PinDriver<O>,
    meter: T,
) -> Result<()>
where
    O: BusOpener + Send + 'static,
    O::Bus: Send,
    T: TelemetrySource + 'static,
{
    let watchdog = Arc::new(Watchdog::from_env(config.watchdog_enabled));
    let controller = Controller::new(
        store,
        Arc::new(SharedPinDriver::new(driver)),
        Arc::new(TelemetryStore::new()),
        Arc::new(DeferredActivationQueue::new()),
        PowerBudget::from(config),
    )
    .with_liveness(watchdog.clone());

    let mut sink = LogEventSink::new();
    controller.start(&mut sink)?;
    if let Err(e) = controller.synchronize(&mut sink) {
        warn!("Initial reconciliation failed: {e}");
    }

    // ── 4. Telemetry listener thread ──────────────────────────
    let listener = TelemetryListener::new(controller.clone(), config.admission_every_n_frames)
        .spawn(meter, LogEventSink::new())
        .context("spawning the telemetry listener")?;

    watchdog.ready();
    info!("System ready. Entering periodic cycle.");

    // ── 5. Periodic cycle ─────────────────────────────────────
    let intents = IntentsFile::new(&config.intents_path);
    let mut sched = Scheduler::new(config.cycle_tick_ms);
    let tick_ms = u64::from(config.cycle_tick_ms);
    sched.add(periodic(Job::PowerCheck, tick_ms, false));
    sched.add(periodic(Job::Intake, u64::from(config.intake_interval_secs) * 1000, true));
    sched.add(periodic(
        Job::Reconcile,
        u64::from(config.reconcile_interval_secs) * 1000,
        true,
    ));
    let mut delegate = CycleDelegate {
        controller: &controller,
        intents: &intents,
        sink,
    };

    futures_lite::future::block_on(async {
        let mut ticker = Ticker::every(Duration::from_millis(tick_ms));
        loop {
            ticker.next().await;
            sched.tick(&mut delegate);
            if listener.is_finished() {
                break;
            }
        }
    });

    listener.stop();
    bail!("telemetry listener exited")
}
