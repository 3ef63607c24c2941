//! Child process ownership and executable lookup

use log::{debug, warn};
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

/// Resolves program names the way a shell would, by walking a search path
#[derive(Debug, Clone, Default)]
pub struct ExecutableLocator {
    /// Directories to search; `None` means the `PATH` of this process at
    /// lookup time
    search_path: Option<OsString>,
}

impl ExecutableLocator {
    /// Look programs up in the given `PATH`-style list instead of `$PATH`
    pub fn with_search_path<S: Into<OsString>>(search_path: S) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    /// Full path to `program`, if it exists and is executable.
    ///
    /// Names containing a slash are checked as given.
    pub fn locate(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            let path = PathBuf::from(program);
            return is_executable(&path).then_some(path);
        }

        let search_path = match &self.search_path {
            Some(path) => path.clone(),
            None => std::env::var_os("PATH")?,
        };

        std::env::split_paths(&search_path)
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }

    /// Programs from `programs` that cannot be located
    pub fn missing<'a>(&self, programs: &[&'a str]) -> Vec<&'a str> {
        programs
            .iter()
            .copied()
            .filter(|program| self.locate(program).is_none())
            .collect()
    }
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// An owned, running child process.
///
/// Dropping the handle terminates the child and reaps it, so a handle can
/// never outlive its owner as an orphan.
#[derive(Debug)]
pub struct ProcessHandle {
    program: String,
    child: Option<Child>,
}

impl ProcessHandle {
    /// Spawn `program` with `args`; stdin is closed, output is inherited
    pub fn spawn<I, S>(program: &Path, args: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()?;

        let program = program
            .file_name()
            .unwrap_or(program.as_os_str())
            .to_string_lossy()
            .into_owned();
        debug!("Spawned {} (pid {})", program, child.id());

        Ok(Self {
            program,
            child: Some(child),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Whether the child has exited on its own (reaping it if so)
    pub fn has_exited(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                debug!("{} already exited with {}", self.program, status);
                true
            }
            Some(Ok(None)) => false,
            Some(Err(e)) => {
                warn!("Could not poll {}: {}", self.program, e);
                false
            }
            None => true,
        }
    }

    /// Ask the child to exit with SIGTERM, then wait for it
    pub fn terminate(mut self) -> io::Result<ExitStatus> {
        self.terminate_inner()
    }

    fn terminate_inner(&mut self) -> io::Result<ExitStatus> {
        let Some(mut child) = self.child.take() else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "process already reaped",
            ));
        };

        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }

        let pid = libc::pid_t::try_from(child.id())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: `pid` belongs to a child we have not reaped yet, so it
        // cannot have been recycled for another process.
        if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
            let err = io::Error::last_os_error();
            // ESRCH: exited between try_wait and kill, still needs reaping
            if err.raw_os_error() != Some(libc::ESRCH) {
                warn!("SIGTERM to {} failed: {}, killing", self.program, err);
                child.kill()?;
            }
        }

        child.wait()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.terminate_inner() {
                warn!("Failed to terminate {} on drop: {}", self.program, e);
            }
        }
    }
}
