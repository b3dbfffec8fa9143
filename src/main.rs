use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use penareia::app::Orchestrator;
use penareia::capture::{CameraSource, FfmpegCameraSource};
use penareia::config::PenareiaConfig;

#[derive(Parser, Debug)]
#[command(name = "penareia")]
#[command(about = "Pre-roll video capture daemon: ring-buffers a camera feed and saves/uploads clips on trigger")]
#[command(version)]
#[command(
    long_about = "Continuously decodes a camera or RTSP source into a fixed-length \
in-memory ring buffer. On an HTTP trigger, snapshots the buffer's tail, transcodes it \
to H.264/AAC, and durably queues it for upload to Backblaze B2 with webhook notification \
on completion."
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "penareia.ini", help = "Path to INI configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the daemon")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print the built-in default configuration in INI format and exit")]
    print_config: bool,

    /// Dry run mode - open the camera source and report its resolved session, then exit
    #[arg(long, help = "Probe the camera source and report width/height/fps without starting the daemon")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting Penareia capture daemon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match PenareiaConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        e
    })?;
    info!("Penareia configuration loaded and validated");

    if args.dry_run {
        let mut camera = FfmpegCameraSource::new(
            config.video_source(),
            config.video.force_fps,
            config.video.max_width,
            config.video.max_height,
        );
        let (width, height) = camera.open().await.map_err(|e| {
            error!("Camera probe failed: {}", e);
            e
        })?;
        camera.close().await;
        info!("Dry run probe succeeded: {}x{} @ {} fps", width, height, config.video.force_fps);
        println!("Camera source opened successfully: {}x{} @ {} fps", width, height, config.video.force_fps);
        return Ok(());
    }

    let mut orchestrator = Orchestrator::new(config).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize daemon: {}", e);
        e
    })?;

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start daemon: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("Daemon error during execution: {}", e);
        e
    })?;

    info!("Penareia capture daemon exited with code: {}", exit_code);

    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("penareia={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry().with(fmt_layer).with(env_filter).init();

    Ok(())
}

/// Print the built-in default configuration in INI format. `PenareiaConfig`
/// has no `Default` impl since required fields (camera source, webhook URL,
/// B2 credentials) have no sane default value, so this prints the template
/// an operator fills in rather than a loadable config.
fn print_default_config() {
    println!("# Penareia Configuration File");
    println!("# Required fields have no built-in default; fill in the placeholders below.");
    println!();
    println!("[VIDEO]");
    println!("SOURCE = 0");
    println!("BUFFER_SECONDS = 30");
    println!("SAVE_SECONDS = 10");
    println!("FORCE_FPS = 24");
    println!("MAX_WIDTH = 1280");
    println!("MAX_HEIGHT = 720");
    println!();
    println!("[WEBHOOK]");
    println!("URL = https://example.com/hook");
    println!();
    println!("[BACKBLAZE_B2]");
    println!("KEY_ID = your_key_id_here");
    println!("APPLICATION_KEY = your_application_key_here");
    println!("BUCKET_NAME = your_bucket_name");
    println!();
    println!("[SERVER]");
    println!("HOST = 0.0.0.0");
    println!("PORT = 5000");
    println!("DEBUG = false");
    println!("ENABLE_MDNS = false");
    println!("SERVICE_NAME = penareia");
    println!("THREADS = 4");
    println!();
    println!("[VIDEO_ENCODING]");
    println!("CODEC = libx264");
    println!("AUDIO_CODEC = aac");
    println!("PRESET = veryfast");
    println!("CRF = 23");
    println!("PIXEL_FORMAT = yuv420p");
    println!("THREADS = 2");
    println!("USE_GPU = false");
}
