use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console_geometry::{Point2D, Roi};
use edge_console::{ConsoleConfig, InferenceKind, PreviewOptions, StreamingMode};

/// Headless live preview of an edge AI camera device:
/// - pulls frames and inference results through the console backend
/// - renders boxes and labels over the image
/// - writes the last rendered surface as PNG
#[derive(Parser, Debug)]
#[command(name = "console")]
#[command(about = "Preview an edge AI camera device's image and inference stream")]
struct Args {
    /// Device id (the backend's MQTT port)
    #[arg(short = 'D', long)]
    device: u32,

    /// Console backend URL (overrides the config file)
    #[arg(short, long)]
    base_url: Option<String>,

    /// What to stream
    #[arg(short, long, value_enum, default_value_t = StreamingMode::ImageAndInferenceResult)]
    mode: StreamingMode,

    /// Expected inference schema
    #[arg(short, long, value_enum, default_value_t = InferenceKind::Detection)]
    kind: InferenceKind,

    /// Target frames per second (overrides the config file)
    #[arg(short = 'f', long)]
    fps: Option<u32>,

    /// How long to preview: 30s, 2m, 1h
    #[arg(short, long, default_value = "10s")]
    duration: String,

    /// Comma-separated class labels, indexed by class id
    #[arg(short, long, value_delimiter = ',')]
    labels: Vec<String>,

    /// Capture window as x,y,width,height in sensor pixels
    #[arg(long, value_delimiter = ',', num_args = 4)]
    roi: Option<Vec<u32>>,

    /// Surface size as WIDTHxHEIGHT
    #[arg(long, default_value = "1280x720")]
    surface: String,

    /// PNG file for the last rendered surface
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConsoleConfig::from_json_file(path)?,
        None => ConsoleConfig::default(),
    };
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(fps) = args.fps {
        config.target_fps = fps;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let mut options = PreviewOptions::new(args.device);
    options.config = config;
    options.mode = args.mode;
    options.kind = args.kind;
    options.duration = Duration::from_secs(parse_duration(&args.duration)? as u64);
    options.labels = args.labels;
    options.roi = args.roi.as_deref().map(parse_roi).transpose()?;
    options.surface = parse_surface(&args.surface)?;
    options.output = args.output;

    let report = edge_console::run_preview(options).await?;
    println!(
        "frames: {}, rendered: {}, final state: {:?}",
        report.frames, report.rendered, report.final_state
    );
    for alert in &report.alerts {
        println!("alert: {}", alert);
    }
    Ok(())
}

/// Parse duration string like "30s", "2m", "1h" into seconds
fn parse_duration(duration: &str) -> Result<u32> {
    if let Ok(seconds) = duration.parse::<u32>() {
        return Ok(seconds);
    }

    let len = duration.len();
    if len < 2 {
        return Err(anyhow::anyhow!("Invalid duration format: {}", duration));
    }

    let (num_str, unit) = duration.split_at(len - 1);
    let num: u32 = num_str
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "s" => Ok(num),
        "m" => Ok(num * 60),
        "h" => Ok(num * 3600),
        _ => Err(anyhow::anyhow!(
            "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
            unit
        )),
    }
}

fn parse_roi(values: &[u32]) -> Result<Roi> {
    match values {
        [x, y, w, h] => Ok(Roi::new(
            Point2D::new(*x as f64, *y as f64),
            Point2D::new(*w as f64, *h as f64),
        )),
        _ => Err(anyhow::anyhow!("ROI needs x,y,width,height")),
    }
}

fn parse_surface(surface: &str) -> Result<(u32, u32)> {
    let (w, h) = surface
        .split_once('x')
        .ok_or_else(|| anyhow::anyhow!("Invalid surface size: {}. Use WIDTHxHEIGHT", surface))?;
    let w: u32 = w.parse().map_err(|_| anyhow::anyhow!("Invalid surface width: {}", w))?;
    let h: u32 = h.parse().map_err(|_| anyhow::anyhow!("Invalid surface height: {}", h))?;
    if w == 0 || h == 0 {
        return Err(anyhow::anyhow!("Surface size must be non-zero"));
    }
    Ok((w, h))
}
