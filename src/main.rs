//! Headless virtual window driver.
//!
//! Feeds orientation samples read from stdin (or webcam frames with the
//! `opencv` feature) into a tracking session and logs the resulting viewpoint.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use virtual_window::arbiter::TrackingMode;
use virtual_window::config::{Config, EXAMPLE_CONFIG};
use virtual_window::constants::MIN_FACE_SIZE_PRESETS;
use virtual_window::face_detection::{ClassifierLoader, MissingClassifier};
use virtual_window::scene;
use virtual_window::sensor::SensorEvent;
use virtual_window::session::TrackingSession;

/// How long to wait for the sensor worker to pick up one stdin sample
const SAMPLE_WAIT: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Cascade classifier file (overrides the config file)
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// Tracking mode (camera, orientation)
    #[arg(short, long)]
    mode: Option<String>,

    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Requested frame width
    #[arg(long)]
    width: Option<u32>,

    /// Requested frame height
    #[arg(long)]
    height: Option<u32>,

    /// Stop after this many camera frames (0 = until the stream ends)
    #[arg(long, default_value = "0")]
    frames: u64,

    /// Scene layout (cube_room, floating_planes)
    #[arg(short, long)]
    scene: Option<String>,

    /// Minimum face size as a fraction of the frame height (0.2, 0.3, 0.4, 0.5)
    #[arg(long)]
    min_face_size: Option<f32>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    info!("Virtual Window");

    let config = build_config(&args)?;
    let scene = scene::by_name(&config.render.scene)
        .with_context(|| format!("Unknown scene '{}'", config.render.scene))?;
    let loader = classifier_loader(&config);
    let mode = config.tracking.initial_mode;
    let frames = args.frames;
    let camera_index = config.camera.index;
    let (width, height) = (config.camera.width, config.camera.height);

    let mut session = TrackingSession::start(config, loader, scene)?;

    match mode {
        TrackingMode::Orientation => run_orientation(&session)?,
        TrackingMode::Camera => run_camera(&mut session, camera_index, width, height, frames)?,
    }

    let stats = session.stats();
    if let Some(render) = session.shutdown() {
        info!("Rendered {} frames in {} ticks", render.frames_drawn, render.ticks);
    }
    info!(
        "Processed {} frames ({} dropped, {} stale), {} sensor events, {} mode switches",
        stats.frames_processed, stats.frames_dropped, stats.frames_stale, stats.sensor_events, stats.arbiter.switches
    );
    Ok(())
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = if let Some(path) = &args.config {
        info!("Loading configuration from: {}", path.display());
        match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {}. Using defaults.", e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(mode) = &args.mode {
        config.tracking.initial_mode = mode.parse()?;
    }
    if let Some(cascade) = &args.cascade {
        config.detection.cascade_path = Some(cascade.clone());
    }
    if let Some(index) = args.cam {
        config.camera.index = index;
    }
    if let Some(width) = args.width {
        config.camera.width = width;
    }
    if let Some(height) = args.height {
        config.camera.height = height;
    }
    if let Some(scene) = &args.scene {
        config.render.scene = scene.clone();
    }
    if let Some(size) = args.min_face_size {
        if !MIN_FACE_SIZE_PRESETS.contains(&size) {
            warn!("Minimum face size {} is not one of the presets {:?}", size, MIN_FACE_SIZE_PRESETS);
        }
        config.detection.min_face_size = size;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(feature = "opencv")]
fn classifier_loader(config: &Config) -> Arc<dyn ClassifierLoader> {
    use virtual_window::cascade::CascadeFile;

    match &config.detection.cascade_path {
        Some(path) => Arc::new(CascadeFile {
            path: path.clone(),
            scale_factor: config.detection.scale_factor,
            min_neighbors: config.detection.min_neighbors,
        }),
        None => Arc::new(MissingClassifier),
    }
}

#[cfg(not(feature = "opencv"))]
fn classifier_loader(config: &Config) -> Arc<dyn ClassifierLoader> {
    if config.detection.cascade_path.is_some() {
        warn!("Built without the `opencv` feature; the cascade file is ignored");
    }
    Arc::new(MissingClassifier)
}

/// Read "azimuth pitch roll" lines from stdin; `recenter` and `overlay` are commands
fn run_orientation(session: &TrackingSession) -> Result<()> {
    info!("Reading orientation samples from stdin");
    let sensors = session.sensor_sender();
    let started = Instant::now();

    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line {
            "recenter" => {
                session.recenter();
            }
            "overlay" => {
                let visible = session.toggle_show_tracking_overlay();
                info!("Tracking overlay {}", if visible { "on" } else { "off" });
                continue;
            }
            _ => {
                let values = parse_sample(line)?;
                let before = session.stats().sensor_events;
                sensors.send(SensorEvent::accelerometer(values, started.elapsed()))?;
                wait_for_sensor(session, before);
            }
        }

        let view = session.viewpoint();
        let p = view.transform.position;
        info!("Viewpoint ({:.3}, {:.3}, {:.3}) rev {}", p.x, p.y, p.z, view.revision);
    }
    Ok(())
}

fn parse_sample(line: &str) -> Result<[f32; 3]> {
    let values: Vec<f32> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse::<f32>)
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid sample '{line}'"))?;

    match values.as_slice() {
        [azimuth, pitch, roll] => Ok([*azimuth, *pitch, *roll]),
        _ => bail!("Expected 'azimuth pitch roll', got '{}'", line),
    }
}

fn wait_for_sensor(session: &TrackingSession, before: u64) {
    let deadline = Instant::now() + SAMPLE_WAIT;
    while session.stats().sensor_events == before && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(feature = "opencv")]
fn run_camera(session: &mut TrackingSession, index: i32, width: u32, height: u32, frames: u64) -> Result<()> {
    use virtual_window::camera_source::OpenCvCamera;
    use virtual_window::session::FrameOffer;

    let mut camera = OpenCvCamera::open(index, width, height)?;
    let (width, height) = camera.resolution()?;
    let sender = session.start_camera(width, height)?;

    let mut count = 0u64;
    let mut last_revision = session.viewpoint().revision;
    while frames == 0 || count < frames {
        let Some(frame) = camera.read_gray()? else {
            info!("Camera stream ended");
            break;
        };
        count += 1;
        if sender.offer(frame)? == FrameOffer::Dropped {
            continue;
        }

        let view = session.viewpoint();
        if view.revision != last_revision {
            last_revision = view.revision;
            let p = view.transform.position;
            info!("Viewpoint ({:.3}, {:.3}, {:.3})", p.x, p.y, p.z);
        }
    }

    session.stop_camera();
    Ok(())
}

#[cfg(not(feature = "opencv"))]
fn run_camera(_session: &mut TrackingSession, _index: i32, _width: u32, _height: u32, _frames: u64) -> Result<()> {
    bail!("Camera tracking needs the `opencv` feature; rebuild with --features opencv or use --mode orientation")
}
