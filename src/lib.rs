//! # vdisplay
//!
//! Provision and manage headless virtual displays. One control surface
//! drives either an X11 virtual framebuffer (`Xvfb` configured with
//! `xrandr`) or a headless Wayland compositor (`weston`).
//!
//! ## Architecture
//!
//! - `config`: per-display settings, validation, and the JSON `ConfigStore`
//! - `backend`: the `DisplayBackend` contract and its X11 and Wayland
//!   implementations, plus child-process ownership
//! - `orchestrator`: the active backend plus the ordered display list;
//!   start-all, stop-all and shutdown
//! - `error`: typed errors for each failure domain
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vdisplay::{backend, BackendKind, ConfigStore, Orchestrator};
//!
//! let backend = backend::create(BackendKind::detect());
//! let mut orchestrator = Orchestrator::new(backend, ConfigStore::default());
//!
//! for report in orchestrator.start_all_displays() {
//!     if let Err(e) = &report.outcome {
//!         eprintln!("{}: {}", report.display, e);
//!     }
//! }
//! println!("{:?}", orchestrator.display_info());
//!
//! orchestrator.on_shutdown();
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod orchestrator;

// Re-export main types for easy access
pub use backend::{BackendKind, DisplayBackend, DisplayInfo, WaylandBackend, X11Backend};
pub use config::{ConfigStore, DisplayConfig, Orientation};
pub use error::{ApplyError, ConfigError, DisplayError, PersistenceError, StartError};
pub use orchestrator::{Orchestrator, StartReport};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
