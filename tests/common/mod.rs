// Shared fixtures: stand-in display servers written as shell scripts.
//
// Each fake records its arguments (and DISPLAY, for xrandr) in a file next
// to itself so tests can assert on the exact command lines.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use vdisplay::backend::ExecutableLocator;

pub struct FakeTools {
    pub dir: TempDir,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn locator(&self) -> ExecutableLocator {
        ExecutableLocator::with_search_path(self.dir.path())
    }

    pub fn record_path(&self, tool: &str) -> PathBuf {
        self.dir.path().join(format!("{tool}.args"))
    }

    /// A long-running server that records its arguments
    pub fn server(self, name: &str) -> Self {
        let record = self.record_path(name);
        self.script(
            name,
            &format!("echo \"$@\" > '{}'\nexec sleep 30\n", record.display()),
        )
    }

    /// A server that dies right after launch
    pub fn crashing_server(self, name: &str) -> Self {
        self.script(name, "exit 1\n")
    }

    /// A one-shot tool that records DISPLAY and its arguments, then exits
    pub fn tool(self, name: &str, exit_code: i32) -> Self {
        let record = self.record_path(name);
        self.script(
            name,
            &format!(
                "echo \"DISPLAY=$DISPLAY $@\" > '{}'\nexit {}\n",
                record.display(),
                exit_code
            ),
        )
    }

    /// An executable whose interpreter does not exist, so exec fails
    pub fn unlaunchable(self, name: &str) -> Self {
        self.write_executable(name, "#!/nonexistent/sh\nexit 0\n")
    }

    fn script(self, name: &str, body: &str) -> Self {
        self.write_executable(name, &format!("#!/bin/sh\n{body}"))
    }

    fn write_executable(self, name: &str, contents: &str) -> Self {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        self
    }

    /// Contents of a tool's record, waiting for servers that write it
    /// asynchronously
    pub fn recorded(&self, tool: &str) -> String {
        wait_for_file(&self.record_path(tool))
    }
}

pub fn wait_for_file(path: &Path) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(contents) = fs::read_to_string(path) {
            if !contents.is_empty() {
                return contents.trim_end().to_string();
            }
        }
        assert!(
            Instant::now() < deadline,
            "{} was never written",
            path.display()
        );
        thread::sleep(Duration::from_millis(20));
    }
}
