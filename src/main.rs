//! Wood tile display driver.
//!
//! Loads the layout, brings up the PCA9685 banks, and runs the tick loop with
//! the numbered menu on stdin. Ctrl+C parks every tile at its rest angle and
//! exits.
//!
//! ## Usage
//! ```sh
//! wood-tile-display --config tiles.toml --i2c-bus /dev/i2c-1
//! wood-tile-display --dry-run --log-level debug
//! ```

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wood_tile_display::backend::{DryRunBackend, PwmBackend, initialize_banks};
use wood_tile_display::clock::MonotonicClock;
use wood_tile_display::control::ControlSurface;
use wood_tile_display::render::render_loop;
use wood_tile_display::{AnimationState, Config, RenderPolicy, Renderer, setup_signal_handler};

// ── Command line ─────────────────────────────────────────────────────

/// Drive a grid of servo-tilted wood tiles
#[derive(Parser)]
#[command(name = "wood-tile-display")]
#[command(version)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// I2C bus the PCA9685 banks are on
    #[arg(long, default_value = "/dev/i2c-1")]
    i2c_bus: PathBuf,

    /// Log servo writes instead of talking to hardware
    #[arg(long)]
    dry_run: bool,

    /// Loop tick in milliseconds (overrides the config file)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// When to write to the servos (overrides the config file)
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Default log level; RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PolicyArg {
    Always,
    OnChange,
}

impl From<PolicyArg> for RenderPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Always => RenderPolicy::Always,
            PolicyArg::OnChange => RenderPolicy::OnChange,
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(tick_ms) = args.tick_ms {
        config.timing.tick_ms = tick_ms;
    }
    if let Some(policy) = args.policy {
        config.render.policy = policy.into();
    }
    config.validate()?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    tracing::info!("Wood Tile Display v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Canvas {}x{} in {}x{} tile panels across {} banks",
        config.topology.canvas_width,
        config.topology.canvas_height,
        config.topology.tile_width,
        config.topology.tile_height,
        config.topology.bank_count()
    );
    tracing::info!(
        "Servo window {}..{} deg, pulses {}..{} (~{:.0}..{:.0} us at {} Hz)",
        config.servo.min_angle,
        config.servo.max_angle,
        config.servo.pulse_min,
        config.servo.pulse_max,
        config.servo.ticks_to_micros(config.servo.pulse_min),
        config.servo.ticks_to_micros(config.servo.pulse_max),
        config.servo.frequency_hz
    );

    if args.dry_run {
        return drive(DryRunBackend::new(), config);
    }
    hardware(&args, config)
}

// ── Backends ─────────────────────────────────────────────────────────

#[cfg(feature = "hardware")]
fn hardware(args: &Args, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    use linux_embedded_hal::{Delay, I2cdev};
    use wood_tile_display::pca9685::Pca9685Banks;

    let i2c = I2cdev::new(&args.i2c_bus).map_err(|e| {
        format!("failed to open I2C bus {}: {}", args.i2c_bus.display(), e)
    })?;
    tracing::info!(
        "Using I2C bus {} with banks at {:02x?}",
        args.i2c_bus.display(),
        config.topology.bank_addresses
    );
    let banks = Pca9685Banks::new(i2c, Delay, &config.topology.bank_addresses);
    drive(banks, config)
}

#[cfg(not(feature = "hardware"))]
fn hardware(_args: &Args, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::warn!("Built without the 'hardware' feature, falling back to --dry-run");
    drive(DryRunBackend::new(), config)
}

// ── Tick loop ────────────────────────────────────────────────────────

fn drive<B: PwmBackend>(mut backend: B, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    initialize_banks(&mut backend, config.topology.bank_count(), &config.servo)?;

    let running = setup_signal_handler()?;
    let mut control = ControlSurface::stdio()?;
    let mut state = AnimationState::new(
        config.topology.canvas_width,
        config.topology.canvas_height,
        config.timing,
    );
    let mut renderer = Renderer::new(config.topology, config.servo, config.render.policy);

    render_loop(
        &mut state,
        &mut renderer,
        &mut backend,
        &mut control,
        &MonotonicClock::new(),
        &running,
    );

    println!("\nShutting down cleanly.");
    Ok(())
}
