//! Perch - GPS + vision gimbal tracker

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perch_gimbal::{GimbalController, HomeAxis, SerialTransport};
use perch_gps::mock::MockServerConfig;
use perch_tracker::{NullVisualSource, Tracker, TrackerConfig};

#[derive(Parser)]
#[command(name = "perch")]
#[command(about = "GPS + vision gimbal tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the integrated tracking loop
    Track {
        /// GPS relay to connect to
        #[arg(long, default_value = "ws://192.168.1.100:8765")]
        gps_uri: String,

        /// Gimbal serial port
        #[arg(long, default_value = "/dev/ttyACM0")]
        gimbal_port: String,

        /// Run without the GPS relay
        #[arg(long)]
        no_gps: bool,

        /// Run without commanding the gimbal
        #[arg(long)]
        no_gimbal: bool,

        /// Disable prediction blending
        #[arg(long)]
        no_predict: bool,

        /// Tick rate in Hz
        #[arg(long, default_value_t = 15.0)]
        fps: f64,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Write per-tick telemetry CSV here
        #[arg(long)]
        telemetry: Option<PathBuf>,
    },
    /// Serve synthetic GPS fixes for development without the phone
    MockGps {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value_t = 8765)]
        port: u16,

        /// Std-dev of per-fix position jitter, meters
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
    },
    /// Gimbal maintenance commands
    Gimbal {
        /// Gimbal serial port
        #[arg(long, default_value = "/dev/ttyACM0")]
        port: String,

        #[command(subcommand)]
        action: GimbalAction,
    },
}

#[derive(Subcommand)]
enum GimbalAction {
    /// Check the firmware answers
    Ping,
    /// Home both axes against the limit switches
    Home,
    /// Move to the center of travel
    Center,
    /// Print position and limit switch status
    Status,
    /// Move relative steps
    Jog {
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        pan: i64,

        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        tilt: i64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track {
            gps_uri,
            gimbal_port,
            no_gps,
            no_gimbal,
            no_predict,
            fps,
            duration,
            telemetry,
        } => run_track(TrackerConfig {
            gps_uri,
            gimbal_port,
            gps_enabled: !no_gps,
            gimbal_enabled: !no_gimbal,
            prediction_enabled: !no_predict,
            tick_hz: fps,
            duration_s: duration,
            telemetry_path: telemetry,
            ..TrackerConfig::default()
        }),
        Commands::MockGps { host, port, noise } => run_mock_gps(host, port, noise),
        Commands::Gimbal { port, action } => run_gimbal(&port, action),
    }
}

fn run_track(config: TrackerConfig) -> anyhow::Result<()> {
    println!("Perch GPS-Vision Tracker");
    println!("========================\n");

    tracing::info!(
        gps = config.gps_enabled,
        gimbal = config.gimbal_enabled,
        fps = config.tick_hz,
        "starting tracker"
    );

    let mut tracker = Tracker::new(config);
    let stats = tracker.run(&mut NullVisualSource)?;

    println!("\nSession stats:");
    println!("  Frames:       {}", stats.frames);
    println!("  Detections:   {}", stats.detections);
    println!("  GPS fixes:    {}", stats.gps_fixes);
    println!("  Mode changes: {}", stats.mode_changes);
    Ok(())
}

fn run_mock_gps(host: String, port: u16, noise: f64) -> anyhow::Result<()> {
    use tokio::runtime::Runtime;

    let config = MockServerConfig {
        host,
        port,
        noise_std_m: noise,
        ..MockServerConfig::default()
    };

    let rt = Runtime::new()?;
    rt.block_on(async {
        perch_gps::mock::serve(config).await?;
        Ok(())
    })
}

fn run_gimbal(port: &str, action: GimbalAction) -> anyhow::Result<()> {
    let transport = SerialTransport::open(port)?;
    let mut gimbal = GimbalController::new(transport);

    match action {
        GimbalAction::Ping => {
            gimbal.ping()?;
            println!("PONG");
        }
        GimbalAction::Home => {
            println!("Homing (up to 30 s)...");
            gimbal.home(HomeAxis::All)?;
            println!("Homed.");
        }
        GimbalAction::Center => {
            let (pan, tilt) = gimbal.center()?;
            println!("Centered at pan={pan} tilt={tilt} steps");
        }
        GimbalAction::Status => {
            let position = gimbal.position_degrees()?;
            let (pan, tilt) = position.value();
            let marker = if position.is_fresh() { "" } else { " (last known)" };
            println!("Position: pan={pan:.1}° tilt={tilt:.1}°{marker}");

            let status = gimbal.limits_status()?;
            println!("Limits:   {status:?}");
        }
        GimbalAction::Jog { pan, tilt } => {
            let (moved_pan, moved_tilt) = gimbal.move_relative(pan, tilt)?;
            println!("Moved pan={moved_pan} tilt={moved_tilt} steps");
        }
    }
    Ok(())
}
