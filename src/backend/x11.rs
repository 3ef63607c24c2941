//! X11 virtual framebuffer backend
//!
//! Runs an `Xvfb` server on the configured display number and uses `xrandr`
//! to set rotation, mode and position once the server is up.

use super::{
    publish_address, withdraw_address, BackendKind, DisplayBackend, DisplayInfo,
    ExecutableLocator, ProcessHandle,
};
use crate::config::DisplayConfig;
use crate::error::{ApplyError, ConfigError, StartError};
use log::{error, info, warn};
use std::io;
use std::process::{Command, Stdio};

/// Environment variable X clients read their server address from
pub const DISPLAY_VAR: &str = "DISPLAY";

/// Colour depths Xvfb can create a screen with
pub const X11_DEPTHS: &[u32] = &[8, 16, 24, 32];

const XVFB: &str = "Xvfb";
const XRANDR: &str = "xrandr";

/// Backend driving an `Xvfb` server
#[derive(Debug, Default)]
pub struct X11Backend {
    /// Where `Xvfb` and `xrandr` are looked up
    locator: ExecutableLocator,

    /// The running framebuffer server
    xvfb_process: Option<ProcessHandle>,

    /// Display address of the running server, e.g. ":1"
    display: Option<String>,
}

impl X11Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `Xvfb` and `xrandr` through `locator` instead of `$PATH`
    pub fn with_locator(locator: ExecutableLocator) -> Self {
        Self {
            locator,
            ..Self::default()
        }
    }

    fn missing_dependencies(&self) -> Vec<&'static str> {
        self.locator.missing(&[XVFB, XRANDR])
    }

    /// A running server still holding its process, with exited ones reaped
    fn live_display(&mut self) -> Option<&str> {
        if let Some(process) = self.xvfb_process.as_mut() {
            if process.has_exited() {
                warn!(
                    "⚠️ Xvfb on {} exited unexpectedly",
                    self.display.as_deref().unwrap_or("?")
                );
                self.xvfb_process = None;
                self.display = None;
                withdraw_address(DISPLAY_VAR);
            }
        }
        self.xvfb_process.as_ref().and(self.display.as_deref())
    }
}

/// Accepts `:N` and `:N.S`
fn validate_display_address(display: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidDisplayAddress(display.to_string());

    let number = display.strip_prefix(':').ok_or_else(invalid)?;
    let (display_number, screen) = match number.split_once('.') {
        Some((d, s)) => (d, Some(s)),
        None => (number, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(display_number) || !screen.map_or(true, all_digits) {
        return Err(invalid());
    }

    Ok(())
}

impl DisplayBackend for X11Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::X11
    }

    fn supported_depths(&self) -> &'static [u32] {
        X11_DEPTHS
    }

    fn check_dependencies(&self) -> bool {
        let missing = self.missing_dependencies();
        if missing.is_empty() {
            info!("All X11 dependencies are installed");
            true
        } else {
            for tool in &missing {
                error!("❌ Required X11 dependency '{}' is missing", tool);
            }
            false
        }
    }

    fn start_display(&mut self, config: &DisplayConfig) -> Result<(), StartError> {
        if let Some(display) = self.live_display() {
            return Err(StartError::AlreadyRunning {
                address: display.to_string(),
            });
        }

        config.validate(X11_DEPTHS)?;
        validate_display_address(&config.display_id)?;

        if !self.check_dependencies() {
            return Err(StartError::DependenciesMissing {
                backend: BackendKind::X11.as_str(),
                missing: self
                    .missing_dependencies()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
        }

        let xvfb = self
            .locator
            .locate(XVFB)
            .ok_or_else(|| StartError::DependenciesMissing {
                backend: BackendKind::X11.as_str(),
                missing: vec![XVFB.to_string()],
            })?;

        let display = config.display_id.clone();
        let screen = config.screen_spec();

        let args = [display.as_str(), "-screen", "0", screen.as_str()];
        let process = ProcessHandle::spawn(&xvfb, args).map_err(|source| {
            error!("❌ Failed to start Xvfb: {}", source);
            StartError::ProcessLaunchFailed {
                program: XVFB.to_string(),
                source,
            }
        })?;

        publish_address(DISPLAY_VAR, &display);
        info!(
            "🚀 Started Xvfb with display {}, resolution {}x{}, depth {}",
            display, config.width, config.height, config.depth
        );

        self.xvfb_process = Some(process);
        self.display = Some(display);

        Ok(())
    }

    fn apply_configuration(&mut self, config: &DisplayConfig) -> Result<(), ApplyError> {
        // Only ever run the xrandr the dependency check found
        let program = self.locator.locate(XRANDR).ok_or_else(|| {
            error!("❌ Cannot apply X11 configuration: '{}' not found", XRANDR);
            ApplyError::LaunchFailed {
                program: XRANDR.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "xrandr not found"),
            }
        })?;

        let status = Command::new(&program)
            .args(["--output", config.display_id.as_str()])
            .args(["--mode", config.mode().as_str()])
            .args(["--rotate", config.orientation.as_str()])
            .args(["--pos", config.position().as_str()])
            .env(DISPLAY_VAR, &config.display_id)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| {
                error!("❌ Failed to apply xrandr configuration: {}", source);
                ApplyError::LaunchFailed {
                    program: XRANDR.to_string(),
                    source,
                }
            })?;

        if !status.success() {
            error!("❌ Failed to apply xrandr configuration: exited with {}", status);
            return Err(ApplyError::ToolFailed {
                program: XRANDR.to_string(),
                status,
            });
        }

        info!(
            "🔧 Applied X11 configuration: orientation={}, position=({},{})",
            config.orientation, config.position_x, config.position_y
        );
        Ok(())
    }

    fn stop_display(&mut self) {
        let Some(process) = self.xvfb_process.take() else {
            return;
        };

        info!("🛑 Stopping Xvfb");
        match process.terminate() {
            Ok(status) => info!("✅ Stopped Xvfb process ({})", status),
            Err(e) => error!("❌ Failed to stop Xvfb process: {}", e),
        }

        self.display = None;
        withdraw_address(DISPLAY_VAR);
    }

    fn display_info(&self) -> DisplayInfo {
        let display = self.xvfb_process.as_ref().and(self.display.as_deref());
        DisplayInfo::new(BackendKind::X11, display)
    }
}
