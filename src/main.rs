//! # vdisplay - headless virtual display manager
//!
//! Command-line front-end over the `vdisplay` library. Each subcommand maps
//! onto one orchestrator operation; `start` keeps the displays up until
//! interrupted and then shuts them down cleanly.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::mpsc;

use vdisplay::backend::{self, BackendKind};
use vdisplay::config::{ConfigStore, DisplayConfig, Orientation, DEFAULT_CONFIG_FILE};
use vdisplay::Orchestrator;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("GIT_COMMIT"),
    "\nbuilt:  ",
    env!("BUILD_DATE"),
    "\ntarget: ",
    env!("TARGET_TRIPLE"),
);

#[derive(Parser)]
#[command(name = "vdisplay")]
#[command(about = "Provision headless X11 (Xvfb) and Wayland (weston) virtual displays")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// Path to the display list
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Display server to drive; `auto` picks Wayland inside a Wayland session
    #[arg(long, value_enum, default_value_t = BackendChoice::Auto)]
    backend: BackendChoice,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    Auto,
    X11,
    Wayland,
}

impl BackendChoice {
    fn resolve(self) -> BackendKind {
        match self {
            BackendChoice::Auto => BackendKind::detect(),
            BackendChoice::X11 => BackendKind::X11,
            BackendChoice::Wayland => BackendKind::Wayland,
        }
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Show the configured displays
    List,

    /// Append a display to the list
    Add(AddArgs),

    /// Remove the last display from the list
    Remove,

    /// Check that the backend's external programs are installed
    Check,

    /// Start all displays and keep them running until interrupted
    Start,
}

#[derive(Args, Debug, PartialEq, Eq)]
struct AddArgs {
    /// Display address, e.g. ":2"
    #[arg(long)]
    display: Option<String>,

    /// Width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Colour depth in bits
    #[arg(long)]
    depth: Option<u32>,

    /// normal, left, right or inverted
    #[arg(long)]
    orientation: Option<Orientation>,

    /// Horizontal offset in the screen layout
    #[arg(long, allow_negative_numbers = true)]
    x: Option<i32>,

    /// Vertical offset in the screen layout
    #[arg(long, allow_negative_numbers = true)]
    y: Option<i32>,
}

impl AddArgs {
    /// Default settings with every given option applied
    fn into_config(self) -> DisplayConfig {
        let defaults = ConfigStore::default_settings();
        DisplayConfig {
            display_id: self.display.unwrap_or(defaults.display_id),
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            depth: self.depth.unwrap_or(defaults.depth),
            orientation: self.orientation.unwrap_or(defaults.orientation),
            position_x: self.x.unwrap_or(defaults.position_x),
            position_y: self.y.unwrap_or(defaults.position_y),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    debug!("vdisplay {} ({})", vdisplay::VERSION, env!("GIT_COMMIT"));

    let kind = cli.backend.resolve();
    let store = ConfigStore::new(&cli.config);

    match cli.command {
        Command::List => list(&store),
        Command::Add(args) => add(kind, store, args.into_config()),
        Command::Remove => remove(kind, store),
        Command::Check => check(kind),
        Command::Start => start(kind, store),
    }
}

fn list(store: &ConfigStore) -> Result<()> {
    let configs = match store.try_load() {
        Ok(configs) => configs,
        Err(e) => {
            warn!("{}; showing defaults", e);
            store.load()
        }
    };

    for (index, config) in configs.iter().enumerate() {
        println!(
            "{:>2}  {:<6} {}x{}x{:<3} {:<9} at {}",
            index,
            config.display_id,
            config.width,
            config.height,
            config.depth,
            config.orientation,
            config.position()
        );
    }
    Ok(())
}

fn add(kind: BackendKind, store: ConfigStore, config: DisplayConfig) -> Result<()> {
    let backend = backend::create(kind);
    config
        .validate(backend.supported_depths())
        .with_context(|| format!("Refusing to add display {}", config.display_id))?;

    let mut orchestrator = Orchestrator::new(backend, store);
    if orchestrator
        .configs()
        .iter()
        .any(|c| c.display_id == config.display_id)
    {
        bail!("Display {} is already configured", config.display_id);
    }

    info!("➕ Adding display {}", config.display_id);
    orchestrator.add_display(Some(config));
    orchestrator.save();
    Ok(())
}

fn remove(kind: BackendKind, store: ConfigStore) -> Result<()> {
    let mut orchestrator = Orchestrator::new(backend::create(kind), store);
    match orchestrator.remove_last_display() {
        Some(config) => {
            info!("➖ Removed display {}", config.display_id);
            orchestrator.save();
        }
        None => info!("No displays configured"),
    }
    Ok(())
}

fn check(kind: BackendKind) -> Result<()> {
    if !backend::create(kind).check_dependencies() {
        bail!("{} dependencies are missing", kind);
    }
    println!("{} dependencies are installed", kind);
    Ok(())
}

fn start(kind: BackendKind, store: ConfigStore) -> Result<()> {
    let (interrupt_tx, interrupt_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })
    .context("Failed to install interrupt handler")?;

    info!("🚀 Starting virtual displays with the {} backend", kind);
    let mut orchestrator = Orchestrator::new(backend::create(kind), store);

    let reports = orchestrator.start_all_displays();
    for report in &reports {
        match &report.outcome {
            Ok(()) => println!("{}: started", report.display),
            Err(e) => println!("{}: failed: {}", report.display, e),
        }
    }

    if !reports.iter().any(|r| r.is_ok()) {
        orchestrator.on_shutdown();
        bail!("No display could be started");
    }

    let info = orchestrator.display_info();
    println!("{} display ready at {}", info.server, info.address);
    info!("✨ Running; press Ctrl+C to stop");

    // A closed channel also means it is time to go
    let _ = interrupt_rx.recv();

    info!("📨 Interrupt received, shutting down gracefully");
    orchestrator.on_shutdown();
    info!("👋 All virtual displays stopped");
    Ok(())
}
