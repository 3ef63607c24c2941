//! Display orchestration
//!
//! The orchestrator owns the active backend and the ordered display list,
//! and is the surface a front-end (GUI or CLI) drives: add and remove
//! displays, start or stop all of them, query the active address, and shut
//! down cleanly.

use crate::backend::{DisplayBackend, DisplayInfo};
use crate::config::{ConfigStore, DisplayConfig};
use crate::error::{ConfigError, DisplayError};
use log::{debug, error, info};
use std::collections::HashSet;

/// Outcome of bringing up one configured display
#[derive(Debug)]
pub struct StartReport {
    /// The display's configured identifier
    pub display: String,
    pub outcome: Result<(), DisplayError>,
}

impl StartReport {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Coordinates the active backend with the persisted display list
pub struct Orchestrator {
    backend: Box<dyn DisplayBackend>,
    store: ConfigStore,
    configs: Vec<DisplayConfig>,
    shut_down: bool,
}

impl Orchestrator {
    /// Seed the display list from `store`
    pub fn new(backend: Box<dyn DisplayBackend>, store: ConfigStore) -> Self {
        let configs = store.load();
        Self::with_configs(backend, store, configs)
    }

    pub fn with_configs(
        backend: Box<dyn DisplayBackend>,
        store: ConfigStore,
        configs: Vec<DisplayConfig>,
    ) -> Self {
        info!(
            "🏗️ Managing {} display(s) with the {} backend",
            configs.len(),
            backend.kind()
        );
        Self {
            backend,
            store,
            configs,
            shut_down: false,
        }
    }

    pub fn configs(&self) -> &[DisplayConfig] {
        &self.configs
    }

    /// Append `config`, or the default settings when none is given
    pub fn add_display(&mut self, config: Option<DisplayConfig>) {
        let config = config.unwrap_or_else(ConfigStore::default_settings);
        debug!("Adding display {}", config.display_id);
        self.configs.push(config);
    }

    /// Drop the most recently added display; `None` when the list is empty
    pub fn remove_last_display(&mut self) -> Option<DisplayConfig> {
        let removed = self.configs.pop();
        match &removed {
            Some(config) => debug!("Removed display {}", config.display_id),
            None => debug!("No display to remove"),
        }
        removed
    }

    /// Replace the display at `index` with edited settings, provided the
    /// active backend accepts them
    pub fn update_display(
        &mut self,
        index: usize,
        config: DisplayConfig,
    ) -> Result<(), ConfigError> {
        config.validate(self.backend.supported_depths())?;

        let len = self.configs.len();
        let slot = self
            .configs
            .get_mut(index)
            .ok_or(ConfigError::IndexOutOfRange { index, len })?;
        *slot = config;
        Ok(())
    }

    /// Start every configured display in order, then persist the list.
    ///
    /// Each display is attempted independently; a failure is logged and
    /// recorded in its report but does not stop the remaining displays.
    pub fn start_all_displays(&mut self) -> Vec<StartReport> {
        let mut seen = HashSet::new();
        let mut reports = Vec::with_capacity(self.configs.len());

        for config in &self.configs {
            let outcome = if seen.insert(config.display_id.as_str()) {
                start_one(self.backend.as_mut(), config)
            } else {
                Err(ConfigError::DuplicateDisplayId(config.display_id.clone()).into())
            };

            match &outcome {
                Ok(()) => info!(
                    "✅ Started virtual display {} with resolution {}, depth {}",
                    config.display_id,
                    config.mode(),
                    config.depth
                ),
                Err(e) => error!(
                    "❌ Failed to start virtual display {}: {}",
                    config.display_id, e
                ),
            }

            reports.push(StartReport {
                display: config.display_id.clone(),
                outcome,
            });
        }

        self.store.save(&self.configs);
        reports
    }

    /// Stop the backend's display server.
    ///
    /// Both backends run a single server process, so this is backend-wide.
    pub fn stop_all_displays(&mut self) {
        self.backend.stop_display();
        info!("🛑 Stopped all virtual displays");
    }

    pub fn display_info(&self) -> DisplayInfo {
        self.backend.display_info()
    }

    /// Persist the current display list
    pub fn save(&self) {
        self.store.save(&self.configs);
    }

    /// Stop everything and persist the final list; later calls do nothing
    pub fn on_shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        info!("🔽 Shutting down");
        self.stop_all_displays();
        self.save();
    }
}

fn start_one(
    backend: &mut dyn DisplayBackend,
    config: &DisplayConfig,
) -> Result<(), DisplayError> {
    backend.start_display(config)?;
    backend.apply_configuration(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, MockDisplayBackend};
    use crate::error::{ApplyError, StartError};
    use mockall::predicate::always;
    use mockall::Sequence;
    use std::io;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use tempfile::{tempdir, TempDir};

    fn display(id: &str) -> DisplayConfig {
        DisplayConfig {
            display_id: id.to_string(),
            ..DisplayConfig::default()
        }
    }

    fn quiet_mock() -> MockDisplayBackend {
        let mut backend = MockDisplayBackend::new();
        backend.expect_kind().return_const(BackendKind::X11);
        backend
    }

    fn orchestrator(
        backend: MockDisplayBackend,
        configs: Vec<DisplayConfig>,
    ) -> (Orchestrator, TempDir) {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("displays.json"));
        (
            Orchestrator::with_configs(Box::new(backend), store, configs),
            dir,
        )
    }

    #[test]
    fn test_new_seeds_from_store() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("displays.json"));
        store.save(&[display(":3"), display(":4")]);

        let orchestrator = Orchestrator::new(Box::new(quiet_mock()), store);

        let ids: Vec<_> = orchestrator
            .configs()
            .iter()
            .map(|c| c.display_id.as_str())
            .collect();
        assert_eq!(ids, vec![":3", ":4"]);
    }

    #[test]
    fn test_add_and_remove_displays() {
        let (mut orchestrator, _dir) = orchestrator(quiet_mock(), Vec::new());

        orchestrator.add_display(None);
        orchestrator.add_display(Some(display(":7")));
        assert_eq!(orchestrator.configs().len(), 2);
        assert_eq!(orchestrator.configs()[0], ConfigStore::default_settings());

        assert_eq!(orchestrator.remove_last_display(), Some(display(":7")));
        assert_eq!(
            orchestrator.remove_last_display(),
            Some(ConfigStore::default_settings())
        );
        assert!(orchestrator.configs().is_empty());
    }

    #[test]
    fn test_remove_from_empty_list_is_noop() {
        let (mut orchestrator, _dir) = orchestrator(quiet_mock(), Vec::new());

        assert_eq!(orchestrator.remove_last_display(), None);
        assert!(orchestrator.configs().is_empty());
    }

    #[test]
    fn test_update_display() {
        const DEPTHS: &[u32] = &[16, 24];
        let mut backend = quiet_mock();
        backend.expect_supported_depths().return_const(DEPTHS);

        let (mut orchestrator, _dir) = orchestrator(backend, vec![display(":1")]);

        orchestrator.update_display(0, display(":9")).unwrap();
        assert_eq!(orchestrator.configs()[0].display_id, ":9");

        assert_eq!(
            orchestrator.update_display(3, display(":2")),
            Err(ConfigError::IndexOutOfRange { index: 3, len: 1 })
        );

        let deep = DisplayConfig {
            depth: 32,
            ..display(":9")
        };
        assert!(matches!(
            orchestrator.update_display(0, deep),
            Err(ConfigError::UnsupportedDepth { depth: 32, .. })
        ));
        assert_eq!(orchestrator.configs()[0].depth, 24);
    }

    #[test]
    fn test_start_all_starts_then_applies_in_order() {
        let mut seq = Sequence::new();
        let mut backend = quiet_mock();
        for id in [":1", ":2"] {
            backend
                .expect_start_display()
                .withf(move |c| c.display_id == id)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
            backend
                .expect_apply_configuration()
                .withf(move |c| c.display_id == id)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let (mut orchestrator, dir) = orchestrator(backend, vec![display(":1"), display(":2")]);
        let reports = orchestrator.start_all_displays();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(StartReport::is_ok));

        // The list is persisted after the batch
        let saved = ConfigStore::new(dir.path().join("displays.json")).try_load().unwrap();
        assert_eq!(saved, orchestrator.configs());
    }

    #[test]
    fn test_start_all_isolates_failures() {
        let mut backend = quiet_mock();
        backend
            .expect_start_display()
            .times(3)
            .returning(|config| match config.display_id.as_str() {
                ":2" => Err(StartError::DependenciesMissing {
                    backend: "X11",
                    missing: vec!["Xvfb".to_string()],
                }),
                ":3" => Err(StartError::ProcessLaunchFailed {
                    program: "Xvfb".to_string(),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                }),
                _ => Ok(()),
            });
        // Only the display that started gets configured
        backend
            .expect_apply_configuration()
            .withf(|c| c.display_id == ":1")
            .times(1)
            .returning(|_| Ok(()));

        let (mut orchestrator, _dir) = orchestrator(
            backend,
            vec![display(":1"), display(":2"), display(":3")],
        );
        let reports = orchestrator.start_all_displays();

        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_ok());
        assert!(matches!(
            reports[1].outcome,
            Err(DisplayError::Start(StartError::DependenciesMissing { .. }))
        ));
        assert!(matches!(
            reports[2].outcome,
            Err(DisplayError::Start(StartError::ProcessLaunchFailed { .. }))
        ));
    }

    #[test]
    fn test_apply_failure_is_reported() {
        let mut backend = quiet_mock();
        backend.expect_start_display().returning(|_| Ok(()));
        backend
            .expect_apply_configuration()
            .with(always())
            .returning(|_| {
                Err(ApplyError::ToolFailed {
                    program: "xrandr".to_string(),
                    status: ExitStatus::from_raw(1 << 8),
                })
            });

        let (mut orchestrator, _dir) = orchestrator(backend, vec![display(":1")]);
        let reports = orchestrator.start_all_displays();

        assert_eq!(reports[0].display, ":1");
        assert!(matches!(
            reports[0].outcome,
            Err(DisplayError::Apply(ApplyError::ToolFailed { .. }))
        ));
    }

    #[test]
    fn test_duplicate_display_ids_are_not_started_twice() {
        let mut backend = quiet_mock();
        backend.expect_start_display().times(1).returning(|_| Ok(()));
        backend
            .expect_apply_configuration()
            .times(1)
            .returning(|_| Ok(()));

        let (mut orchestrator, _dir) = orchestrator(backend, vec![display(":1"), display(":1")]);
        let reports = orchestrator.start_all_displays();

        assert!(reports[0].is_ok());
        assert!(matches!(
            &reports[1].outcome,
            Err(DisplayError::Config(ConfigError::DuplicateDisplayId(id))) if id == ":1"
        ));
    }

    #[test]
    fn test_stop_all_and_info_delegate_to_backend() {
        let mut backend = quiet_mock();
        backend
            .expect_display_info()
            .return_const(DisplayInfo::new(BackendKind::X11, Some(":1")));
        backend.expect_stop_display().times(1).return_const(());

        let (mut orchestrator, _dir) = orchestrator(backend, Vec::new());

        assert_eq!(orchestrator.display_info().address, ":1");
        orchestrator.stop_all_displays();
    }

    #[test]
    fn test_shutdown_stops_once_and_persists() {
        let mut backend = quiet_mock();
        backend.expect_stop_display().times(1).return_const(());

        let (mut orchestrator, dir) = orchestrator(backend, vec![display(":5")]);
        orchestrator.on_shutdown();
        orchestrator.on_shutdown();
        drop(orchestrator);

        let saved = ConfigStore::new(dir.path().join("displays.json")).try_load().unwrap();
        assert_eq!(saved, vec![display(":5")]);
    }
}
