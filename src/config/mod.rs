//! Display configuration and its persistence
//!
//! This module defines the per-display settings (`DisplayConfig`), their
//! validation rules, and the `ConfigStore` that loads and saves the ordered
//! display list as a JSON file. Persistence is best-effort: a missing or
//! unreadable file falls back to a single default display, and a failed save
//! is logged instead of surfacing to the caller.

use crate::error::{ConfigError, PersistenceError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File the display list is persisted to when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "virtual_display_config.json";

/// Screen rotation, using the vocabulary `xrandr --rotate` understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Normal,
    Left,
    Right,
    Inverted,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Normal,
        Orientation::Left,
        Orientation::Right,
        Orientation::Inverted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Normal => "normal",
            Orientation::Left => "left",
            Orientation::Right => "right",
            Orientation::Inverted => "inverted",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Orientation::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("unknown orientation {s:?} (expected normal, left, right or inverted)")
            })
    }
}

/// Settings for one virtual display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Screen width (pixels)
    pub width: u32,

    /// Screen height (pixels)
    pub height: u32,

    /// Colour depth (bits per pixel)
    pub depth: u32,

    /// Backend addressing handle, e.g. ":1" for an X display
    #[serde(rename = "display")]
    pub display_id: String,

    /// Rotation applied after the display is up
    #[serde(default)]
    pub orientation: Orientation,

    /// Horizontal offset in the virtual screen layout
    #[serde(default)]
    pub position_x: i32,

    /// Vertical offset in the virtual screen layout
    #[serde(default)]
    pub position_y: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            depth: 24,
            display_id: ":1".to_string(),
            orientation: Orientation::Normal,
            position_x: 0,
            position_y: 0,
        }
    }
}

impl DisplayConfig {
    /// `WxH`, as passed to mode-setting tools
    pub fn mode(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// `WxHxD`, the Xvfb screen specification
    pub fn screen_spec(&self) -> String {
        format!("{}x{}x{}", self.width, self.height, self.depth)
    }

    /// `XxY`, as passed to `xrandr --pos`
    pub fn position(&self) -> String {
        format!("{}x{}", self.position_x, self.position_y)
    }

    /// Check the backend-independent invariants plus the depth against the
    /// set a backend supports
    pub fn validate(&self, supported_depths: &'static [u32]) -> Result<(), ConfigError> {
        if self.display_id.trim().is_empty() {
            return Err(ConfigError::EmptyDisplayId);
        }

        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }

        if !supported_depths.contains(&self.depth) {
            return Err(ConfigError::UnsupportedDepth {
                depth: self.depth,
                supported: supported_depths,
            });
        }

        Ok(())
    }
}

/// Loads and saves the ordered display list
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The settings a freshly added display starts from
    pub fn default_settings() -> DisplayConfig {
        DisplayConfig::default()
    }

    /// Load the display list, falling back to a single default display when
    /// the file is missing or unusable
    pub fn load(&self) -> Vec<DisplayConfig> {
        match self.try_load() {
            Ok(configs) => {
                info!(
                    "Loaded {} display configuration(s) from {}",
                    configs.len(),
                    self.path.display()
                );
                configs
            }
            Err(PersistenceError::NotFound { .. }) => {
                warn!(
                    "Config file {} not found, loading defaults",
                    self.path.display()
                );
                vec![Self::default_settings()]
            }
            Err(e) => {
                error!("{}, loading defaults", e);
                vec![Self::default_settings()]
            }
        }
    }

    /// Load the display list, reporting why it could not be read
    pub fn try_load(&self) -> Result<Vec<DisplayConfig>, PersistenceError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                PersistenceError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&contents).map_err(|source| PersistenceError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrite the file with `configs`; failures are logged, not returned
    pub fn save(&self, configs: &[DisplayConfig]) {
        match self.try_save(configs) {
            Ok(()) => info!(
                "Saved {} display configuration(s) to {}",
                configs.len(),
                self.path.display()
            ),
            Err(e) => error!("Failed to save settings: {}", e),
        }
    }

    /// Overwrite the file with `configs`, reporting any failure
    pub fn try_save(&self, configs: &[DisplayConfig]) -> Result<(), PersistenceError> {
        let contents = to_pretty_json(configs).map_err(PersistenceError::Serialize)?;

        fs::write(&self.path, contents).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// JSON with four-space indentation
fn to_pretty_json(configs: &[DisplayConfig]) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    configs.serialize(&mut ser)?;
    buf.push(b'\n');
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
