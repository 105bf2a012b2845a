mod api;
mod buffer;
mod colormap;
mod config;
mod feed;
mod logging;
mod monitor;
mod protocol;
mod render;

use crate::api::{AcousticDataPoint, VibrationAnalysis, VibrationClient};
use crate::config::{ConfigSource, LogFormat, Settings};
use crate::monitor::{CaptureSink, FrameSink, Monitor, MonitorStatus, NullSink};
use crate::render::{Theme, legend, static_view};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aquaguard-viz")]
#[command(about = "Waveform and spectrogram rendering for the AquaGuard acoustic feed")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (default: ~/.config/aquaguard-viz/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "aquaguard_viz=trace" (RUST_LOG wins)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format: pretty or compact
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the acoustic feed and render live frames
    Stream {
        /// Feed WebSocket URL
        #[arg(long)]
        url: Option<String>,

        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        seconds: Option<u64>,

        /// Write every N-th frame (capture_every) of each view here as PNG
        #[arg(long)]
        capture_dir: Option<PathBuf>,
    },

    /// Render the static spectrogram to a PNG
    Render {
        /// Saved vibration analysis response (JSON)
        #[arg(long, conflicts_with = "samples", required_unless_present = "samples")]
        analysis: Option<PathBuf>,

        /// Accelerometer points (JSON array) to send to the analysis API
        #[arg(long)]
        samples: Option<PathBuf>,

        /// Sampling rate of the points in Hz
        #[arg(long, default_value_t = api::DEFAULT_SAMPLING_RATE)]
        sampling_rate: f64,

        /// Output PNG path
        #[arg(long, short)]
        output: PathBuf,

        /// Omit the dB legend and caption
        #[arg(long)]
        no_legend: bool,
    },

    /// Render the color legend on its own
    Legend {
        /// Output PNG path
        #[arg(long, short)]
        output: PathBuf,

        /// Legend height in pixels (default: static canvas height)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Check the vibration analysis API
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // An explicit config must load; the default location may fall back
    let (mut settings, source) = match &cli.config {
        Some(path) => (
            Settings::load_from(path)?,
            ConfigSource::File(path.clone()),
        ),
        None => Settings::load(),
    };
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        settings.log_format = format;
    }

    logging::init(&settings.log_level, settings.log_format);
    match &source {
        ConfigSource::File(path) => info!(path = %path.display(), "Loaded settings"),
        ConfigSource::Defaults { reason } => info!("Using default settings ({})", reason),
    }

    match cli.command {
        Commands::Stream {
            url,
            seconds,
            capture_dir,
        } => {
            if let Some(url) = url {
                settings.feed_url = url;
            }
            stream(settings, seconds.map(Duration::from_secs), capture_dir).await
        }

        Commands::Render {
            analysis,
            samples,
            sampling_rate,
            output,
            no_legend,
        } => {
            let analysis = match (analysis, samples) {
                (Some(path), _) => read_json::<VibrationAnalysis>(&path)?,
                (None, Some(path)) => {
                    let points = read_json::<Vec<AcousticDataPoint>>(&path)?;
                    let client = api_client(&settings)?;
                    client
                        .analyze(&points, sampling_rate)
                        .await
                        .with_context(|| format!("Analysis request to {} failed", client.base_url()))?
                }
                (None, None) => return Err(anyhow!("Either --analysis or --samples is required")),
            };
            render_static(&settings, &analysis, &output, !no_legend)
        }

        Commands::Legend { output, height } => {
            let height = height.unwrap_or(settings.static_size.height);
            let canvas = legend::render(height, Theme::from_dark_mode(settings.dark_mode))?;
            canvas.save_png(&output)?;
            println!("{}", output.display());
            Ok(())
        }

        Commands::Health => {
            let client = api_client(&settings)?;
            let health = client
                .health()
                .await
                .with_context(|| format!("Health check against {} failed", client.base_url()))?;

            println!(
                "{}: {}",
                health.service.as_deref().unwrap_or("vibration_analysis"),
                health.status
            );
            if health.is_ok() {
                Ok(())
            } else {
                Err(anyhow!("Service reported status '{}'", health.status))
            }
        }
    }
}

async fn stream(settings: Settings, limit: Option<Duration>, capture_dir: Option<PathBuf>) -> Result<()> {
    let sink: Arc<dyn FrameSink> = match capture_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create capture directory {}", dir.display()))?;
            info!(dir = %dir.display(), every = settings.capture_every, "Capturing frames");
            Arc::new(CaptureSink::new(dir, settings.capture_every))
        }
        None => Arc::new(NullSink),
    };

    let mut monitor = Monitor::new(settings, sink);
    monitor.start()?;

    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut status_tick = tokio::time::interval(Duration::from_secs(1));
    status_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => break,
            _ = status_tick.tick() => log_status(&monitor.status()),
        }
    }

    monitor.stop().await;
    log_status(&monitor.status());
    Ok(())
}

fn log_status(status: &MonitorStatus) {
    let last_update = status
        .last_update
        .map(|ts| ts.strftime("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let window = status
        .window_seconds
        .map(|w| format!("{:.2}s", w))
        .unwrap_or_else(|| "-".to_string());

    info!(
        playback = status.playback.as_str(),
        connection = status.connection.as_str(),
        samples = status.samples,
        bins = status.frequency_bins,
        window = %window,
        last_update = %last_update,
        frames = status.frames_presented,
        "Status"
    );
}

fn render_static(
    settings: &Settings,
    analysis: &VibrationAnalysis,
    output: &Path,
    with_legend: bool,
) -> Result<()> {
    let frame = analysis.spectrogram_frame()?;
    let theme = Theme::from_dark_mode(settings.dark_mode);
    let style = static_view::StaticStyle {
        width: settings.static_size.width,
        height: settings.static_size.height,
        theme,
    };

    let rendered = static_view::render(&frame, &style)?;
    if rendered.outcome == static_view::RenderOutcome::Placeholder {
        warn!("Spectrogram is empty, writing placeholder");
    }

    let canvas = if with_legend {
        let scale = legend::render(style.height, theme)?;
        let caption = static_view::axis_caption(&frame);
        legend::compose(&rendered.canvas, &scale, caption.as_deref(), theme)?
    } else {
        rendered.canvas
    };
    canvas.save_png(output)?;

    println!(
        "status={} rms={:.4} peak={:.4} frequency={:.2}Hz bins={}x{}",
        analysis.status.as_str(),
        analysis.rms,
        analysis.peak,
        analysis.frequency,
        frame.matrix.rows(),
        frame.matrix.cols()
    );
    println!("{}", output.display());
    Ok(())
}

fn api_client(settings: &Settings) -> Result<VibrationClient> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;
    Ok(VibrationClient::with_client(settings.api_base_url.clone(), http))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}
