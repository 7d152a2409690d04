// src/process.rs

//! Process lifecycle mechanics
//!
//! The OS-specific half of the lifecycle controller: side-load
//! authorization, library-search-path computation, self-replacement of the
//! process image, child spawn/wait, and post-cleanup signal re-raising.
//! The decision of *which* of these runs is made in [`crate::strategy`];
//! nothing here chooses.
//!
//! Environment hand-off to the next process image (markers, search path,
//! process name) travels through explicit key/value pairs applied to the
//! spawned or exec'd command rather than through mutations of this
//! process's own environment.

use crate::archive::signature;
use crate::error::{Error, Result};
use std::env;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Environment overrides handed to the next process image
pub type EnvOverrides = Vec<(OsString, OsString)>;

/// Verify that `executable` opted into side-loading.
///
/// Scans the executable for the shifted magic signature at any offset.
/// An unreadable executable is treated the same as a missing signature:
/// the side-load is refused.
pub fn authorize_sideload(executable: &Path) -> Result<()> {
    match signature::file_allows_sideload(executable) {
        Ok(true) => {
            debug!("side-load signature found in {}", executable.display());
            Ok(())
        }
        Ok(false) => Err(Error::UnauthorizedSideload(
            executable.display().to_string(),
        )),
        Err(err) => {
            warn!(
                "cannot scan {} for side-load signature: {}",
                executable.display(),
                err
            );
            Err(Error::UnauthorizedSideload(
                executable.display().to_string(),
            ))
        }
    }
}

/// Name of the dynamic-library search path variable on this platform
#[cfg(target_os = "macos")]
pub const SEARCH_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(all(unix, not(target_os = "macos")))]
pub const SEARCH_PATH_VAR: &str = "LD_LIBRARY_PATH";
#[cfg(not(unix))]
pub const SEARCH_PATH_VAR: &str = "PATH";

/// Compute the search-path overrides that put `dir` in front.
///
/// The pre-existing value is preserved both inside the new value (appended
/// after `dir`) and verbatim under `<VAR>_ORIG`, so the payload can restore
/// the original environment for processes it launches itself.
pub fn search_path_overrides(dir: &Path) -> Result<EnvOverrides> {
    compute_search_path(dir, env::var_os(SEARCH_PATH_VAR))
}

fn compute_search_path(dir: &Path, existing: Option<OsString>) -> Result<EnvOverrides> {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(old) = &existing {
        entries.extend(env::split_paths(old));
    }
    let joined = env::join_paths(entries)
        .map_err(|err| Error::SearchPathConfig(format!("{}: {}", dir.display(), err)))?;

    let mut overrides = vec![(OsString::from(SEARCH_PATH_VAR), joined)];
    if let Some(old) = existing {
        overrides.push((OsString::from(format!("{}_ORIG", SEARCH_PATH_VAR)), old));
    }
    debug!("library search path prepended with {}", dir.display());
    Ok(overrides)
}

/// Outcome of a supervised child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    /// Child exited on its own with this status
    Exited(i32),
    /// Child was terminated by this signal (non-Windows)
    Signaled(i32),
}

impl ChildOutcome {
    /// Exit status to report if the signal cannot be re-raised
    pub fn status(&self) -> i32 {
        match self {
            ChildOutcome::Exited(code) => *code,
            ChildOutcome::Signaled(sig) => 128 + sig,
        }
    }

    /// Terminating signal, if the child died of one
    pub fn signal(&self) -> Option<i32> {
        match self {
            ChildOutcome::Exited(_) => None,
            ChildOutcome::Signaled(sig) => Some(*sig),
        }
    }
}

/// Spawn the payload child with inherited standard streams and wait for it.
///
/// `args` is the full argv including `argv[0]`; `env` carries the marker,
/// search-path and process-name overrides for the child. The wait is
/// intentionally unbounded: the launcher supervises exactly one child for
/// exactly as long as it runs.
pub fn spawn_child(executable: &Path, args: &[OsString], env: &EnvOverrides) -> Result<ChildOutcome> {
    let mut command = Command::new(executable);
    command.args(args.iter().skip(1));
    for (key, value) in env {
        command.env(key, value);
    }
    #[cfg(unix)]
    if let Some(argv0) = args.first() {
        use std::os::unix::process::CommandExt;
        command.arg0(argv0);
    }

    debug!("spawning payload child {}", executable.display());
    let status = command.status().map_err(Error::ChildSpawn)?;

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            debug!("child terminated by signal {}", sig);
            return Ok(ChildOutcome::Signaled(sig));
        }
    }

    Ok(ChildOutcome::Exited(status.code().unwrap_or(-1)))
}

/// Replace this process image with itself.
///
/// Performs `exec()` without `fork()`: the current image is destroyed in
/// place so that the environment in `env` is in effect when the dynamic
/// loader of the new image runs. Diverges on success; the returned error is
/// therefore always a failure to exec.
#[cfg(unix)]
pub fn replace_process(executable: &Path, args: &[OsString], env: &EnvOverrides) -> Error {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new(executable);
    command.args(args.iter().skip(1));
    for (key, value) in env {
        command.env(key, value);
    }
    if let Some(argv0) = args.first() {
        command.arg0(argv0);
    }

    debug!("replacing process image with {}", executable.display());
    Error::ProcessReplace(command.exec())
}

/// Re-raise `sig` against the current process.
///
/// Restores the default disposition first so the re-raise actually
/// terminates us the way the child terminated, giving supervising shells
/// and process managers the termination status they would have observed
/// had the payload run directly. Called only after cleanup.
#[cfg(unix)]
pub fn reraise_signal(sig: i32) {
    use nix::sys::signal::{self, SigHandler, Signal};

    let Ok(signal) = Signal::try_from(sig) else {
        warn!("cannot re-raise unknown signal {}", sig);
        return;
    };
    debug!("re-raising child signal {}", signal);
    unsafe {
        let _ = signal::signal(signal, SigHandler::SigDfl);
    }
    let _ = signal::raise(signal);
}

/// Current process name, for relaying to the child (Linux)
#[cfg(target_os = "linux")]
pub fn current_process_name() -> Option<OsString> {
    match nix::sys::prctl::get_name() {
        Ok(name) => Some(OsString::from(name.to_string_lossy().into_owned())),
        Err(err) => {
            debug!("cannot read process name: {}", err);
            None
        }
    }
}

/// Apply a process name relayed by the parent launcher (Linux).
///
/// The parent stores its name before spawning so the child payload shows
/// up under the application's name rather than the launcher binary's.
/// Failure to apply a relayed name is fatal.
#[cfg(target_os = "linux")]
pub fn apply_relayed_process_name() -> Result<()> {
    use crate::context::{PROCNAME_MARKER, take_env};
    use std::ffi::CString;

    let Some(name) = take_env(PROCNAME_MARKER) else {
        return Ok(());
    };
    debug!("restoring process name {:?}", name);
    let cname = CString::new(name.clone())
        .map_err(|_| Error::Runtime(format!("invalid relayed process name {:?}", name)))?;
    nix::sys::prctl::set_name(&cname)
        .map_err(|err| Error::Runtime(format!("failed to set process name: {}", err)))
}

#[cfg(not(target_os = "linux"))]
pub fn apply_relayed_process_name() -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn argv(parts: &[&str]) -> Vec<OsString> {
        parts.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_authorize_sideload_with_signature() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        let mut bytes = vec![0x7fu8; 100];
        bytes.extend_from_slice(&signature::sideload_magic());
        bytes.extend_from_slice(&[0u8; 40]);
        fs::write(&exe, &bytes).unwrap();

        assert!(authorize_sideload(&exe).is_ok());
    }

    #[test]
    fn test_authorize_sideload_without_signature() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        // The plain archive magic must not grant side-load authorization.
        let mut bytes = vec![0x7fu8; 100];
        bytes.extend_from_slice(&signature::ARCHIVE_MAGIC);
        fs::write(&exe, &bytes).unwrap();

        assert!(matches!(
            authorize_sideload(&exe),
            Err(Error::UnauthorizedSideload(_))
        ));
    }

    #[test]
    fn test_authorize_sideload_unreadable_refused() {
        assert!(matches!(
            authorize_sideload(Path::new("/no/such/executable")),
            Err(Error::UnauthorizedSideload(_))
        ));
    }

    #[test]
    fn test_search_path_fresh_environment() {
        let overrides = compute_search_path(Path::new("/tmp/app.x1"), None).unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].0, OsString::from(SEARCH_PATH_VAR));
        assert_eq!(overrides[0].1, OsString::from("/tmp/app.x1"));
    }

    #[test]
    fn test_search_path_preserves_existing() {
        let overrides = compute_search_path(
            Path::new("/tmp/app.x1"),
            Some(OsString::from("/usr/lib:/opt/lib")),
        )
        .unwrap();
        assert_eq!(overrides[0].1, OsString::from("/tmp/app.x1:/usr/lib:/opt/lib"));
        assert_eq!(
            overrides[1].0,
            OsString::from(format!("{}_ORIG", SEARCH_PATH_VAR))
        );
        assert_eq!(overrides[1].1, OsString::from("/usr/lib:/opt/lib"));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_child_forwards_exit_code() {
        let outcome = spawn_child(
            Path::new("/bin/sh"),
            &argv(&["sh", "-c", "exit 7"]),
            &Vec::new(),
        )
        .unwrap();
        assert_eq!(outcome, ChildOutcome::Exited(7));
        assert_eq!(outcome.status(), 7);
        assert_eq!(outcome.signal(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_child_reports_signal() {
        let outcome = spawn_child(
            Path::new("/bin/sh"),
            &argv(&["sh", "-c", "kill -TERM $$"]),
            &Vec::new(),
        )
        .unwrap();
        assert_eq!(outcome, ChildOutcome::Signaled(15));
        assert_eq!(outcome.status(), 143);
        assert_eq!(outcome.signal(), Some(15));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_child_sees_env_overrides() {
        let env = vec![(OsString::from("PACKRUN_TEST_MARKER"), OsString::from("/x"))];
        let outcome = spawn_child(
            Path::new("/bin/sh"),
            &argv(&["sh", "-c", "test \"$PACKRUN_TEST_MARKER\" = /x"]),
            &env,
        )
        .unwrap();
        assert_eq!(outcome, ChildOutcome::Exited(0));
    }

    #[test]
    fn test_spawn_child_missing_executable() {
        let err = spawn_child(
            Path::new("/no/such/launcher"),
            &argv(&["launcher"]),
            &Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ChildSpawn(_)));
    }
}
