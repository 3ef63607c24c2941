//! Display backends
//!
//! A backend launches and parametrizes one kind of third-party display
//! server. Both implementations track a single server process and share the
//! [`DisplayBackend`] contract, so the orchestrator can drive either one
//! without knowing which is active:
//!
//! - [`X11Backend`]: `Xvfb` virtual framebuffer, configured with `xrandr`
//! - [`WaylandBackend`]: `weston` running with its headless backend
//!
//! While a display is up, the backend also publishes its address in the
//! environment variable third-party clients expect (`DISPLAY` or
//! `WAYLAND_DISPLAY`).

use crate::config::DisplayConfig;
use crate::error::{ApplyError, StartError};
use std::fmt;

pub mod process;
pub mod wayland;
pub mod x11;

pub use process::{ExecutableLocator, ProcessHandle};
pub use wayland::WaylandBackend;
pub use x11::X11Backend;

/// Reported as the address when no display is running
pub const ADDRESS_NOT_SET: &str = "N/A";

/// Environment variable whose presence marks a Wayland session
pub const WAYLAND_SESSION_VAR: &str = "WAYLAND_DISPLAY";

/// The display server technologies a backend can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    X11,
    Wayland,
}

impl BackendKind {
    /// Wayland when the current session advertises a compositor, X11 otherwise
    pub fn detect() -> Self {
        Self::from_session_var(std::env::var(WAYLAND_SESSION_VAR).ok().as_deref())
    }

    fn from_session_var(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => BackendKind::Wayland,
            _ => BackendKind::X11,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::X11 => "X11",
            BackendKind::Wayland => "Wayland",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend reports about its current display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Backend kind name, "X11" or "Wayland"
    pub server: String,

    /// Address clients connect to, or [`ADDRESS_NOT_SET`]
    pub address: String,
}

impl DisplayInfo {
    pub fn new(kind: BackendKind, address: Option<&str>) -> Self {
        Self {
            server: kind.as_str().to_string(),
            address: address.unwrap_or(ADDRESS_NOT_SET).to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.address != ADDRESS_NOT_SET
    }
}

/// Capabilities every display backend provides.
///
/// All operations block; callers must serialize them per backend instance.
#[cfg_attr(test, mockall::automock)]
pub trait DisplayBackend {
    /// Which display server technology this backend drives
    fn kind(&self) -> BackendKind;

    /// Colour depths the display server accepts
    fn supported_depths(&self) -> &'static [u32];

    /// Whether every required external program can be found.
    ///
    /// Logs each missing program; never fails.
    fn check_dependencies(&self) -> bool;

    /// Launch the display server for `config` and publish its address
    fn start_display(&mut self, config: &DisplayConfig) -> Result<(), StartError>;

    /// Push orientation, position and resolution onto the running display
    fn apply_configuration(&mut self, config: &DisplayConfig) -> Result<(), ApplyError>;

    /// Terminate the display server if one is running. Idempotent.
    fn stop_display(&mut self);

    /// Backend name and current address
    fn display_info(&self) -> DisplayInfo;
}

/// Construct the backend for `kind`, looking tools up on `$PATH`
pub fn create(kind: BackendKind) -> Box<dyn DisplayBackend> {
    match kind {
        BackendKind::X11 => Box::new(X11Backend::new()),
        BackendKind::Wayland => Box::new(WaylandBackend::new()),
    }
}

/// Publish `value` under `var` for third-party tools started after us
fn publish_address(var: &str, value: &str) {
    std::env::set_var(var, value);
}

fn withdraw_address(var: &str) {
    std::env::remove_var(var);
}
