//! Headless Wayland backend
//!
//! Runs `weston` with its headless backend on a dedicated socket. Weston
//! takes the output size at launch and owns orientation and placement, so
//! there is nothing to apply afterwards.

use super::{
    publish_address, withdraw_address, BackendKind, DisplayBackend, DisplayInfo,
    ExecutableLocator, ProcessHandle,
};
use crate::config::DisplayConfig;
use crate::error::{ApplyError, StartError};
use log::{error, info, warn};

/// Environment variable Wayland clients read their socket name from
pub const WAYLAND_DISPLAY_VAR: &str = "WAYLAND_DISPLAY";

/// Socket used unless configured otherwise; avoids the session's `wayland-0`
pub const DEFAULT_SOCKET_NAME: &str = "wayland-1";

/// Colour depths accepted for a headless weston output
pub const WAYLAND_DEPTHS: &[u32] = &[16, 24, 32];

const WESTON: &str = "weston";

/// Backend driving a headless `weston` compositor
#[derive(Debug)]
pub struct WaylandBackend {
    locator: ExecutableLocator,
    socket_name: String,
    weston_process: Option<ProcessHandle>,
    /// Socket the running compositor listens on
    socket: Option<String>,
}

impl Default for WaylandBackend {
    fn default() -> Self {
        Self {
            locator: ExecutableLocator::default(),
            socket_name: DEFAULT_SOCKET_NAME.to_string(),
            weston_process: None,
            socket: None,
        }
    }
}

impl WaylandBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locator(locator: ExecutableLocator) -> Self {
        Self {
            locator,
            ..Self::default()
        }
    }

    pub fn with_socket_name(mut self, socket_name: impl Into<String>) -> Self {
        self.socket_name = socket_name.into();
        self
    }

    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }

    fn live_socket(&mut self) -> Option<&str> {
        if let Some(process) = self.weston_process.as_mut() {
            if process.has_exited() {
                warn!("⚠️ Weston on {} exited unexpectedly", self.socket_name);
                self.weston_process = None;
                self.socket = None;
                withdraw_address(WAYLAND_DISPLAY_VAR);
            }
        }
        self.weston_process.as_ref().and(self.socket.as_deref())
    }

    fn weston_args(&self, config: &DisplayConfig) -> Vec<String> {
        vec![
            "--backend=headless-backend.so".to_string(),
            format!("--socket={}", self.socket_name),
            format!("--width={}", config.width),
            format!("--height={}", config.height),
            "--scale=1".to_string(),
        ]
    }
}

impl DisplayBackend for WaylandBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wayland
    }

    fn supported_depths(&self) -> &'static [u32] {
        WAYLAND_DEPTHS
    }

    fn check_dependencies(&self) -> bool {
        if self.locator.locate(WESTON).is_some() {
            info!("All Wayland dependencies are installed");
            true
        } else {
            error!("❌ Required Wayland dependency '{}' is missing", WESTON);
            false
        }
    }

    fn start_display(&mut self, config: &DisplayConfig) -> Result<(), StartError> {
        if let Some(socket) = self.live_socket() {
            return Err(StartError::AlreadyRunning {
                address: socket.to_string(),
            });
        }

        config.validate(WAYLAND_DEPTHS)?;

        let weston = match self.locator.locate(WESTON) {
            Some(path) => path,
            None => {
                self.check_dependencies();
                return Err(StartError::DependenciesMissing {
                    backend: BackendKind::Wayland.as_str(),
                    missing: vec![WESTON.to_string()],
                });
            }
        };

        let process =
            ProcessHandle::spawn(&weston, self.weston_args(config)).map_err(|source| {
                error!("❌ Failed to start Weston: {}", source);
                StartError::ProcessLaunchFailed {
                    program: WESTON.to_string(),
                    source,
                }
            })?;

        publish_address(WAYLAND_DISPLAY_VAR, &self.socket_name);
        info!(
            "🚀 Started Weston with socket {}, resolution {}",
            self.socket_name,
            config.mode()
        );

        self.weston_process = Some(process);
        self.socket = Some(self.socket_name.clone());

        Ok(())
    }

    fn apply_configuration(&mut self, config: &DisplayConfig) -> Result<(), ApplyError> {
        info!(
            "Configuration for Wayland display {} is handled by the compositor and was set during startup",
            config.display_id
        );
        Ok(())
    }

    fn stop_display(&mut self) {
        let Some(process) = self.weston_process.take() else {
            return;
        };

        info!("🛑 Stopping Weston");
        match process.terminate() {
            Ok(status) => info!("✅ Stopped Weston process ({})", status),
            Err(e) => error!("❌ Failed to stop Weston process: {}", e),
        }

        self.socket = None;
        withdraw_address(WAYLAND_DISPLAY_VAR);
    }

    fn display_info(&self) -> DisplayInfo {
        let socket = self.weston_process.as_ref().and(self.socket.as_deref());
        DisplayInfo::new(BackendKind::Wayland, socket)
    }
}
