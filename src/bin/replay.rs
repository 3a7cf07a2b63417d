use anyhow::{Context, Result};
use clap::Parser;
use qwatch::annotate::Annotator;
use qwatch::detector::{read_records, ReplayDetector};
use qwatch::effects::{AlertSink, AudioPlayer, Dispatcher, JsonLinesSink, SideEffect, SoundPlayer};
use qwatch::{Config, Engine};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "qwatch-replay",
    about = "Replay recorded detections through the behavior engine"
)]
struct Args {
    /// Recorded detections, one `<unix_millis>:<json array>` line per frame
    #[arg(long, value_name = "PATH")]
    detections: PathBuf,
    /// JSON configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 1280)]
    width: u32,
    #[arg(long, default_value_t = 720)]
    height: u32,
    /// TTF/OTF font for overlay labels
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,
    /// Write annotated frames as PNG into this directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Play alert sounds from the configured sounds directory
    #[arg(long)]
    audio: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    let file = File::open(&args.detections)
        .with_context(|| format!("opening {}", args.detections.display()))?;
    let records = read_records(BufReader::new(file))?;
    info!(frames = records.len(), "loaded detections");

    let mut engine = Engine::new(ReplayDetector::from_records(&records), config.clone());
    if let Some(font) = &args.font {
        engine = engine.with_annotator(
            Annotator::load_font(font).with_context(|| format!("loading font {}", font.display()))?,
        );
    }

    // alerts are printed in line; only sounds go through the dispatcher
    let mut sink = JsonLinesSink::new(std::io::stdout());
    let dispatcher = if args.audio {
        let audio: Box<dyn AudioPlayer> = Box::new(SoundPlayer::new(&config.sounds_dir));
        Some(Dispatcher::spawn(Some(audio), None, 256)?)
    } else {
        None
    };

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
    }

    engine.replay(&records, args.width, args.height, |idx, output| {
        for alert in &output.alerts {
            sink.deliver(alert)?;
        }

        if let Some(dispatcher) = &dispatcher {
            dispatcher.dispatch_all(
                output
                    .effects
                    .into_iter()
                    .filter(|e| matches!(e, SideEffect::PlaySound(_))),
            );
        }

        if let Some(dir) = &args.output_dir {
            output.frame.save(dir.join(format!("frame_{:06}.png", idx)))?;
        }

        Ok(())
    })?;

    if let Some(dispatcher) = dispatcher {
        dispatcher.shutdown();
    }

    info!(
        alerts = engine.alerts().len(),
        tracks = engine.tracks().len(),
        "replay finished"
    );

    if let Some(err) = engine.quiet_period_error() {
        warn!(%err, "quiet period was ignored");
    }

    if let Some(summary) = engine.scene_summary() {
        info!("{}", summary);
    }

    Ok(())
}
