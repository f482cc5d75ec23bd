use std::path::PathBuf;
use std::time::Duration;

use airiq_core::diagnostics::{self, LinkVerdict};
use airiq_core::prelude::*;
use airiq_core::protocol::{list_ports, open_port};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

/// Time the MH-Z19C needs after a zero-point calibration
const CALIBRATION_SETTLE: Duration = Duration::from_secs(20);

#[derive(Parser)]
#[command(name = "airiq")]
#[command(about = "Poll PMS5003 and MH-Z19C air quality sensors", version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "airiq.json")]
    config: PathBuf,

    /// Serial port, overriding the configuration file
    #[arg(short, long, global = true)]
    port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports
    Ports,
    /// Read particulate matter from a PMS5003
    Pm(PollArgs),
    /// Read CO2 and temperature from an MH-Z19C
    Co2(PollArgs),
    /// Dump raw bytes from a port without decoding
    Sniff {
        /// Capture window in seconds
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
    },
    /// Zero-point calibrate an MH-Z19C in 400 ppm outdoor air
    CalibrateCo2 {
        /// Must be exactly "YES"
        #[arg(long)]
        confirm: String,
    },
}

#[derive(clap::Args)]
struct PollArgs {
    /// Seconds between reads (default from config)
    #[arg(short, long)]
    interval: Option<f64>,

    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Take a single reading and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "airiq=info,airiq_core=info".to_owned());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        AirIqConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        info!("No configuration file found, using defaults");
        AirIqConfig::default()
    };

    match cli.command {
        Command::Ports => {
            let ports = list_ports();
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                match (port.vid, port.pid) {
                    (Some(vid), Some(pid)) => println!(
                        "{}  {:04x}:{:04x}  {}",
                        port.name,
                        vid,
                        pid,
                        port.product.unwrap_or_default()
                    ),
                    _ => println!("{}", port.name),
                }
            }
        }
        Command::Pm(args) => {
            let link = resolve_link(cli.port, config.pm_link())?;
            let sensor = Pms5003::open(&link)
                .with_context(|| format!("opening PMS5003 on {}", link.port))?;
            let interval = args.interval(config.polling.pm_interval());
            poll(sensor, interval, args.duration(&config), args.once, print_pm).await?;
        }
        Command::Co2(args) => {
            let link = resolve_link(cli.port, config.co2_link())?;
            let sensor = Mhz19c::open(&link)
                .with_context(|| format!("opening MH-Z19C on {}", link.port))?;
            let interval = args.interval(config.polling.co2_interval());
            poll(sensor, interval, args.duration(&config), args.once, print_co2).await?;
        }
        Command::Sniff { seconds } => {
            let link = resolve_link(cli.port, config.pm_link())?;
            sniff(link, Duration::from_secs(seconds)).await?;
        }
        Command::CalibrateCo2 { confirm } => {
            let Some(confirmation) = CalibrationConfirmation::from_token(&confirm) else {
                bail!(
                    "calibration not confirmed; pass --confirm {}",
                    CalibrationConfirmation::TOKEN
                );
            };
            let link = resolve_link(cli.port, config.co2_link())?;
            tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                let mut sensor = Mhz19c::open(&link)?;
                sensor.calibrate_zero_point(confirmation)?;
                println!(
                    "Calibration command sent, waiting {}s",
                    CALIBRATION_SETTLE.as_secs()
                );
                std::thread::sleep(CALIBRATION_SETTLE);
                Ok(())
            })
            .await??;
            println!("Calibration complete");
        }
    }

    Ok(())
}

impl PollArgs {
    fn interval(&self, configured: Duration) -> Duration {
        self.interval
            .map(|secs| Duration::from_secs_f64(secs.max(0.0)))
            .unwrap_or(configured)
    }

    fn duration(&self, config: &AirIqConfig) -> Option<Duration> {
        self.duration
            .map(Duration::from_secs)
            .or_else(|| config.polling.duration())
    }
}

fn resolve_link(
    port: Option<String>,
    configured: Result<&SensorLinkConfig, ConfigError>,
) -> anyhow::Result<SensorLinkConfig> {
    match (port, configured) {
        (Some(port), Ok(link)) => Ok(SensorLinkConfig {
            port,
            ..link.clone()
        }),
        (Some(port), Err(_)) => Ok(SensorLinkConfig::new(port)),
        (None, Ok(link)) => Ok(link.clone()),
        (None, Err(e)) => Err(e).context("no port given; use --port or a config file"),
    }
}

async fn poll<T, F>(
    sensor: T,
    interval: Duration,
    duration: Option<Duration>,
    once: bool,
    print: F,
) -> anyhow::Result<()>
where
    T: Sensor + 'static,
    F: Fn(&T::Reading) + Send + 'static,
{
    if once {
        let mut sensor = sensor;
        let reading = tokio::task::spawn_blocking(move || sensor.read_once()).await??;
        print(&reading);
        return Ok(());
    }

    let mut reader = ContinuousReader::new(sensor, interval);
    if let Some(duration) = duration {
        reader = reader.with_duration(duration);
    }
    let cancel = reader.cancel_handle();

    let mut session = tokio::task::spawn_blocking(move || {
        for outcome in reader.by_ref() {
            match outcome {
                Ok(reading) => print(&reading),
                Err(e) => warn!(error = %e, kind = ?e.kind(), "Read failed"),
            }
        }
        (reader.stats(), reader.stop_reason())
    });

    let finished = tokio::select! {
        result = &mut session => Some(result?),
        _ = tokio::signal::ctrl_c() => None,
    };
    let (stats, reason) = match finished {
        Some(done) => done,
        None => {
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
            session.await?
        }
    };

    info!(cycles = stats.cycles, failures = stats.failures, ?reason, "Session finished");
    if reason == Some(StopReason::TransportFailure) {
        bail!("sensor link failed");
    }
    Ok(())
}

fn print_pm(reading: &PmReading) {
    println!(
        "{}  PM1.0 {:>4}  PM2.5 {:>4}  PM10 {:>4} µg/m³  [{}]",
        reading.captured_at.format("%Y-%m-%d %H:%M:%S"),
        reading.pm1_atm,
        reading.pm25_atm,
        reading.pm10_atm,
        AirQuality::classify(reading)
    );
}

fn print_co2(reading: &Co2Reading) {
    println!(
        "{}  CO2 {:>5} ppm  {:>3} °C  [{}]",
        reading.captured_at.format("%Y-%m-%d %H:%M:%S"),
        reading.co2_ppm,
        reading.temperature_c,
        Co2Level::classify(reading)
    );
}

async fn sniff(link: SensorLinkConfig, window: Duration) -> anyhow::Result<()> {
    println!("Capturing from {} for {}s", link.port, window.as_secs());

    let report = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut channel = open_port(&link)?;
        Ok(diagnostics::capture(&mut channel, window)?)
    })
    .await??;

    for line in report.hex_lines(16) {
        println!("{}", line);
    }
    println!(
        "{} bytes, {} PMS5003 start markers",
        report.bytes.len(),
        report.marker_offsets.len()
    );

    match report.verdict() {
        LinkVerdict::Silent => {
            println!("No data received. Check TX/RX wiring, power and the port name.")
        }
        LinkVerdict::Sparse => {
            println!("Very little data. Check for a loose connection or a sleeping sensor.")
        }
        LinkVerdict::Streaming => println!("Data is flowing."),
    }
    Ok(())
}
