//! Dual-stream recorder binary entry point
//!
//! Connects to a device streaming server, records its RGB and depth video
//! tracks until Ctrl+C (or `--duration-secs`), then writes one artifact
//! per stream: `.ivf` for VP8/VP9, `.h264` for H.264, `.bin` otherwise.
//!
//! # Usage
//!
//! ```bash
//! # Record with defaults (1920x1080, no model, THE_400_P, KERNEL_7x7)
//! cargo run --bin dual_stream_recorder -- --server-url http://192.168.1.20:8081
//!
//! # Run face detection on the device, subpixel depth, stop after 30s
//! cargo run --bin dual_stream_recorder -- \
//!   --nn-model face-detection-retail-0004 \
//!   --subpixel \
//!   --duration-secs 30 \
//!   --output-dir ./recordings
//!
//! # Load local settings from a file
//! cargo run --bin dual_stream_recorder -- --config ./recorder.toml
//! ```

use clap::Parser;
use remotemedia_webrtc_recorder::{
    ClientConfig, IceServerConfig, MedianFilter, MonoCameraResolution, Role, Session,
    SessionConfig,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RemoteMedia dual-stream recorder
///
/// Records the color and depth video streams of a device server over WebRTC.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Client configuration file (TOML); flags below override it
    #[arg(long, env = "RECORDER_CONFIG")]
    config: Option<PathBuf>,

    /// Device server base URL (offer is posted to <url>/offer)
    #[arg(long, env = "DEPTHAI_SERVER_URL")]
    server_url: Option<String>,

    /// Directory recordings are written to
    #[arg(long, env = "RECORDER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// STUN servers (comma-separated)
    #[arg(long, value_delimiter = ',', env = "RECORDER_STUN_SERVERS")]
    stun_servers: Vec<String>,

    /// Color camera width
    #[arg(long, default_value_t = 1920)]
    cam_width: u32,

    /// Color camera height
    #[arg(long, default_value_t = 1080)]
    cam_height: u32,

    /// Neural network model to run on the device
    #[arg(long)]
    nn_model: Option<NnModelArg>,

    /// Mono camera resolution: 400p, 720p, 800p
    #[arg(long, default_value = "400p")]
    mono_camera_resolution: MonoResolutionArg,

    /// Depth median filter: off, 3x3, 5x5, 7x7
    #[arg(long, default_value = "7x7")]
    median_filter: MedianFilterArg,

    /// Enable subpixel disparity
    #[arg(long, default_value_t = false)]
    subpixel: bool,

    /// Enable extended disparity
    #[arg(long, default_value_t = false)]
    extended_disparity: bool,

    /// Stop automatically after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,
}

/// Neural network model CLI argument wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum NnModelArg {
    #[value(name = "age-gender-recognition-retail-0013")]
    AgeGenderRecognitionRetail0013,
    #[value(name = "face-detection-adas-0001")]
    FaceDetectionAdas0001,
    #[value(name = "face-detection-retail-0004")]
    FaceDetectionRetail0004,
    #[value(name = "mobilenet-ssd")]
    MobilenetSsd,
}

impl NnModelArg {
    fn model_id(self) -> &'static str {
        match self {
            NnModelArg::AgeGenderRecognitionRetail0013 => "age-gender-recognition-retail-0013",
            NnModelArg::FaceDetectionAdas0001 => "face-detection-adas-0001",
            NnModelArg::FaceDetectionRetail0004 => "face-detection-retail-0004",
            NnModelArg::MobilenetSsd => "mobilenet-ssd",
        }
    }
}

/// Mono camera resolution CLI argument wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum MonoResolutionArg {
    #[value(name = "400p")]
    P400,
    #[value(name = "720p")]
    P720,
    #[value(name = "800p")]
    P800,
}

impl From<MonoResolutionArg> for MonoCameraResolution {
    fn from(arg: MonoResolutionArg) -> Self {
        match arg {
            MonoResolutionArg::P400 => MonoCameraResolution::The400P,
            MonoResolutionArg::P720 => MonoCameraResolution::The720P,
            MonoResolutionArg::P800 => MonoCameraResolution::The800P,
        }
    }
}

/// Median filter CLI argument wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum MedianFilterArg {
    Off,
    #[value(name = "3x3")]
    K3,
    #[value(name = "5x5")]
    K5,
    #[value(name = "7x7")]
    K7,
}

impl From<MedianFilterArg> for MedianFilter {
    fn from(arg: MedianFilterArg) -> Self {
        match arg {
            MedianFilterArg::Off => MedianFilter::Off,
            MedianFilterArg::K3 => MedianFilter::Kernel3x3,
            MedianFilterArg::K5 => MedianFilter::Kernel5x5,
            MedianFilterArg::K7 => MedianFilter::Kernel7x7,
        }
    }
}

fn build_session_config(args: &Args) -> SessionConfig {
    let mut config = SessionConfig::default()
        .with_camera_resolution(args.cam_width, args.cam_height)
        .with_mono_camera_resolution(args.mono_camera_resolution.into())
        .with_median_filter(args.median_filter.into())
        .with_subpixel(args.subpixel)
        .with_extended_disparity(args.extended_disparity);
    if let Some(model) = args.nn_model {
        config = config.with_nn_model(model.model_id());
    }
    config
}

/// Build ClientConfig: file (if any), then explicit CLI overrides
fn build_client_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading client configuration from {}", path.display());
            ClientConfig::from_toml_file(path)?
        }
        None => ClientConfig::default(),
    };

    if let Some(url) = &args.server_url {
        config.signaling_url = url.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.recording.output_dir = dir.clone();
    }
    for url in &args.stun_servers {
        config.ice_servers.push(IceServerConfig::stun(url.clone()));
    }

    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = Arc::clone(&shutdown_flag);

    ctrlc::set_handler(move || {
        let was_already_set = shutdown_flag_handler.swap(true, Ordering::SeqCst);
        if was_already_set {
            eprintln!("Shutdown already in progress, forcing exit");
            std::process::exit(1);
        }
        eprintln!("\nCtrl+C received, stopping session...");
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("recorder-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args, shutdown_flag))
}

async fn async_main(args: Args, shutdown_flag: Arc<AtomicBool>) -> anyhow::Result<()> {
    init_tracing();

    let session_config = build_session_config(&args);
    let client_config = build_client_config(&args)?;

    info!(
        version = remotemedia_webrtc_recorder::VERSION,
        server = %client_config.signaling_url,
        output_dir = %client_config.recording.output_dir.display(),
        "Dual-stream recorder starting"
    );
    info!("Session options: {}", serde_json::to_string(&session_config)?);

    let session = Session::configure(session_config, client_config).await?;

    for role in Role::ALL {
        session.on_role_ready(role, move |stream| {
            info!("{} stream ready ({})", role, stream.id());
        });
    }

    session
        .create_control_channel(
            || info!("[DC] opened"),
            || info!("[DC] closed"),
            |message| info!("[DC] message: {}", message.payload),
        )
        .await?;

    if let Err(e) = session.start().await {
        warn!("Session failed to start: {}", e);
        session.stop().await?;
        return Err(e.into());
    }

    info!("Recording. Press Ctrl+C to stop.");
    let started = Instant::now();
    let deadline = args.duration_secs.map(Duration::from_secs);

    while !shutdown_flag.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| started.elapsed() >= d) {
            info!("Recording duration reached");
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    session.stop().await?;

    let bindings = session.bindings();
    info!(
        rgb = ?bindings.bound(Role::Rgb),
        depth = ?bindings.bound(Role::Depth),
        dropped_tracks = session.anomaly_count(),
        "Recorder shut down"
    );
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
