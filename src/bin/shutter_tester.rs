use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shutter_tester::classifier::{NominalSpeed, ShutterReading};
use shutter_tester::config::SensorBackend;
use shutter_tester::error::{CalibrationError, MeasurementError};
use shutter_tester::monitor::MonitorReading;
use shutter_tester::{
    AppConfig, CalibrationResult, ProfileReport, Session, StopSignal, ThresholdStrategy,
};
use tokio::sync::mpsc;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/shutter_tester.json";
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "shutter_tester",
    about = "Measure mechanical camera shutter speeds with a photosensor"
)]
struct Cli {
    /// JSON configuration file (defaults to config/shutter_tester.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the configured sensor backend
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,
    /// Place the threshold this fraction of the way from closed to open
    #[arg(long, global = true)]
    bias: Option<f64>,
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Calibrate against closed and open references and print the threshold
    Calibrate,
    /// Calibrate, then measure every shutter firing until Ctrl+C
    Measure {
        /// Stop after this many readings
        #[arg(long)]
        count: Option<usize>,
    },
    /// Calibrate, then record a raw sample trace between two confirmations
    Profile,
    /// Print live sensor readings
    Monitor {
        /// Stop after this many readings
        #[arg(long)]
        count: Option<u64>,
    },
    /// List the nominal shutter speed table
    Speeds,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Ads1115,
    Simulated,
}

impl From<BackendArg> for SensorBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Ads1115 => SensorBackend::Ads1115,
            BackendArg::Simulated => SensorBackend::Simulated,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    shutter_tester::init_logging(&cli.log_level);

    let config = load_config(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building async runtime")?;
    let outcome = runtime.block_on(execute(cli, config));
    runtime.shutdown_timeout(Duration::from_millis(200));
    outcome
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AppConfig::load(),
        None => AppConfig::default(),
    };

    if let Some(backend) = cli.backend {
        config.sensor.backend = backend.into();
    }
    if let Some(fraction) = cli.bias {
        config.calibration.strategy = ThresholdStrategy::BiasedTowardClosed { fraction };
    }

    config
        .validate()
        .map_err(|reason| anyhow!("invalid configuration: {reason}"))?;
    Ok(config)
}

async fn execute(cli: Cli, config: AppConfig) -> Result<ExitCode> {
    let interrupt = StopSignal::new();
    let watcher = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping");
            watcher.assert();
        }
    });

    match cli.command {
        Commands::Speeds => print_speeds(&config, cli.json),
        Commands::Calibrate => {
            let session = connect(config, &interrupt)?;
            let Some((_, calibration)) = calibrate(session).await? else {
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            };
            print_calibration(&calibration, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Measure { count } => {
            let session = connect(config, &interrupt)?;
            let Some((session, calibration)) = calibrate(session).await? else {
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            };
            if !cli.json {
                print_calibration(&calibration, false)?;
            }
            measure(session, calibration, count, cli.json).await?;
            Ok(exit_code(&interrupt))
        }
        Commands::Profile => {
            let session = connect(config, &interrupt)?;
            let Some((session, calibration)) = calibrate(session).await? else {
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            };
            let (_, recorded) =
                blocking(session, move |session| session.record_profile(&calibration)).await?;
            match recorded {
                Ok(report) => {
                    print_profile(&report, cli.json)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(MeasurementError::Interrupted) => Ok(ExitCode::from(EXIT_INTERRUPTED)),
                Err(err) => Err(anyhow!(err)).context("recording trace"),
            }
        }
        Commands::Monitor { count } => {
            let session = connect(config, &interrupt)?;
            let json = cli.json;
            let (_, stats) = blocking(session, move |session| {
                session.monitor(count, |reading| print_reading(&reading, json))
            })
            .await?;
            let stats = stats.context("monitoring sensor")?;
            if stats.read_errors > 0 {
                warn!("{} reads failed during monitoring", stats.read_errors);
            }
            Ok(exit_code(&interrupt))
        }
    }
}

fn connect(config: AppConfig, interrupt: &StopSignal) -> Result<Session> {
    Session::connect(config, interrupt.clone()).context("opening sensor")
}

/// Run a session operation on the blocking pool and hand the session back
async fn blocking<T, E, F>(mut session: Session, op: F) -> Result<(Session, Result<T, E>)>
where
    F: FnOnce(&mut Session) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let outcome = op(&mut session);
        (session, outcome)
    })
    .await
    .context("session task failed")
}

/// `None` when the operator interrupted calibration
async fn calibrate(session: Session) -> Result<Option<(Session, CalibrationResult)>> {
    let (session, calibrated) = blocking(session, |session| session.calibrate()).await?;
    match calibrated {
        Ok(calibration) => Ok(Some((session, calibration))),
        Err(CalibrationError::Interrupted) => Ok(None),
        Err(err) => Err(anyhow!(err)).context("calibrating"),
    }
}

async fn measure(
    session: Session,
    calibration: CalibrationResult,
    count: Option<usize>,
    json: bool,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ShutterReading>();
    let worker = tokio::task::spawn_blocking(move || {
        let mut session = session;
        session.measure(&calibration, count, &tx)
    });

    while let Some(reading) = rx.recv().await {
        if json {
            println!("{}", serde_json::to_string(&reading)?);
        } else {
            println!(
                "Measured: {:.6}s | Nominal: {} | Deviation: {:+.2} EV",
                reading.duration_seconds, reading.nominal.label, reading.deviation_stops
            );
        }
    }

    let sent = worker
        .await
        .context("measurement task failed")?
        .map_err(|err| anyhow!(err))
        .context("measuring")?;
    tracing::info!("{} readings reported", sent);
    Ok(())
}

fn exit_code(interrupt: &StopSignal) -> ExitCode {
    if interrupt.is_asserted() {
        ExitCode::from(EXIT_INTERRUPTED)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_calibration(calibration: &CalibrationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(calibration)?);
    } else {
        println!(
            "Calibration complete. Closed: {:.0}, Open: {:.0}, Threshold: {:.0}",
            calibration.closed_reference, calibration.open_reference, calibration.threshold
        );
    }
    Ok(())
}

fn print_profile(report: &ProfileReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Time(ms) | ADC Value");
    println!("---------------------");
    for point in report.trace.points() {
        println!("{:8.3} | {:.0}", point.elapsed_seconds * 1_000.0, point.sample);
    }
    println!();
    println!(
        "Total recording duration: {:.3} ms",
        report.summary.total_seconds * 1_000.0
    );
    println!("Total samples: {}", report.summary.sample_count);
    println!("Effective rate: {:.0} Hz", report.summary.effective_rate_hz);
    match (&report.open_duration_seconds, &report.nominal) {
        (Some(open), Some(nominal)) => {
            println!("Open duration: {:.6}s (nearest {})", open, nominal.label)
        }
        _ => println!("Open duration: no complete open/close cycle in trace"),
    }
    Ok(())
}

fn print_reading(reading: &MonitorReading, json: bool) {
    if json {
        match serde_json::to_string(reading) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!("failed to encode reading: {}", err),
        }
        return;
    }
    match reading.volts {
        Some(volts) => println!("ADC Value: {:.0}, Voltage: {:.4} V", reading.raw, volts),
        None => println!("ADC Value: {:.0}", reading.raw),
    }
}

fn print_speeds(config: &AppConfig, json: bool) -> Result<ExitCode> {
    let speeds: Vec<NominalSpeed> = config
        .shutter_speeds
        .iter()
        .map(|&seconds| NominalSpeed::new(seconds))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&speeds)?);
    } else {
        for speed in speeds {
            println!("{:>7}  {:.6}s", speed.label, speed.seconds);
        }
    }
    Ok(ExitCode::SUCCESS)
}
