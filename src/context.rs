// src/context.rs

//! Per-invocation execution context and invocation classification
//!
//! One `LaunchContext` exists per launcher process. It is built from the
//! invoking executable's identity before anything else runs and is threaded
//! through every bootstrap stage.
//!
//! Parent and child launcher processes communicate through two environment
//! markers. Both are read exactly once, at startup, into an
//! [`InvocationKind`] value and removed from the environment immediately:
//! a subprocess launched by the hosted application (which may itself be a
//! packaged application) must never see them.

use crate::error::Result;
use crate::path::BoundedPath;
use crate::tempdir::ExtractionDir;
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Marker holding the payload directory (temp or home path) in a re-invoked
/// launcher process
pub const PAYLOAD_DIR_MARKER: &str = "PACKRUN_PAYLOAD_DIR";

/// Marker signalling that the process is a single-process restart of the
/// launcher rather than a spawned child
pub const SINGLE_PROCESS_MARKER: &str = "PACKRUN_SINGLE_PROCESS";

/// Marker relaying the parent's process name to the child (Linux)
pub const PROCNAME_MARKER: &str = "PACKRUN_PROCNAME";

/// Value of [`SINGLE_PROCESS_MARKER`] that triggers the restart reset
pub const SINGLE_PROCESS_SENTINEL: &str = "1";

/// How this launcher process was invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationKind {
    /// First run of the launcher; no marker present
    FreshParent,
    /// The launcher replaced its own image to pick up environment changes;
    /// behaves like a fresh parent except that the payload location is
    /// already decided
    RestartedParent { payload_dir: BoundedPath },
    /// Spawned child of an extracting parent; the payload is already
    /// unpacked at `payload_dir`, owned by the parent
    Child { payload_dir: BoundedPath },
}

impl InvocationKind {
    /// Payload directory carried by the marker, if any
    pub fn payload_dir(&self) -> Option<&BoundedPath> {
        match self {
            InvocationKind::FreshParent => None,
            InvocationKind::RestartedParent { payload_dir }
            | InvocationKind::Child { payload_dir } => Some(payload_dir),
        }
    }

    /// Side-load authorization already happened in the parent run
    pub fn inherits_authorization(&self) -> bool {
        !matches!(self, InvocationKind::FreshParent)
    }

    /// True only for spawned children of an extracting parent
    pub fn is_child(&self) -> bool {
        matches!(self, InvocationKind::Child { .. })
    }
}

/// Classify an invocation from the two marker values.
///
/// Pure function so the matrix is testable without touching the process
/// environment; [`classify_invocation_from_env`] is the thin wrapper that
/// reads and clears the real markers.
pub fn classify_invocation(
    payload_dir: Option<String>,
    single_process: Option<String>,
) -> Result<InvocationKind> {
    let Some(dir) = payload_dir else {
        return Ok(InvocationKind::FreshParent);
    };
    let payload_dir = BoundedPath::new(dir)?;

    if single_process.as_deref() == Some(SINGLE_PROCESS_SENTINEL) {
        Ok(InvocationKind::RestartedParent { payload_dir })
    } else {
        Ok(InvocationKind::Child { payload_dir })
    }
}

/// Read both markers from the process environment, delete them, classify.
pub fn classify_invocation_from_env() -> Result<InvocationKind> {
    let payload_dir = take_env(PAYLOAD_DIR_MARKER);
    let single_process = take_env(SINGLE_PROCESS_MARKER);
    let kind = classify_invocation(payload_dir, single_process)?;
    debug!("invocation classified as {:?}", kind);
    Ok(kind)
}

/// Read an environment variable and remove it unconditionally.
pub(crate) fn take_env(name: &str) -> Option<String> {
    let value = env::var(name).ok();
    // The launcher has not spawned any threads at this point.
    unsafe { env::remove_var(name) };
    value
}

/// Mutable record describing one bootstrap run
#[derive(Debug)]
pub struct LaunchContext {
    /// Absolute, symlink-resolved path of the invoking executable
    pub executable: BoundedPath,
    /// Side-load candidate next to the executable (`<executable>.pkg`)
    pub archive_file: BoundedPath,
    /// Directory containing the executable; extraction root for onedir
    /// layouts
    pub home: BoundedPath,
    /// Where the payload lives once the strategy has decided
    pub run_dir: Option<BoundedPath>,
    /// Extraction directory owned by this process; `Some` only in the
    /// process that created it
    pub extraction_dir: Option<ExtractionDir>,
    /// Latched once at archive-open time, never changed afterwards
    pub needs_extraction: bool,
    /// Forwarded argv; mutable because platform argument emulation may
    /// replace it
    pub command_line: Vec<OsString>,
    /// Archive options, read-only after archive open
    pub options: BTreeMap<String, String>,
    /// Archive came from the side-load candidate rather than the executable
    pub is_side_loaded: bool,
    /// Classification computed once at startup
    pub invocation: InvocationKind,
}

impl LaunchContext {
    /// Build the context from the executable's identity.
    ///
    /// The executable path is resolved so that the re-exec and child-spawn
    /// strategies always target the real binary even when invoked through a
    /// symlink.
    pub fn new(
        executable: impl AsRef<Path>,
        command_line: Vec<OsString>,
        invocation: InvocationKind,
    ) -> Result<Self> {
        let resolved = fs::canonicalize(executable.as_ref())?;
        let executable = BoundedPath::from_path(&resolved)?;
        let archive_file = BoundedPath::from_path(resolved.with_extension("pkg"))?;
        let home = BoundedPath::from_path(resolved.parent().unwrap_or(Path::new("/")))?;

        debug!(
            executable = %executable,
            archive_file = %archive_file,
            home = %home,
            "launch context created"
        );

        Ok(Self {
            executable,
            archive_file,
            home,
            run_dir: None,
            extraction_dir: None,
            needs_extraction: false,
            command_line,
            options: BTreeMap::new(),
            is_side_loaded: false,
            invocation,
        })
    }

    /// Build the context for the current process: resolved `argv[0]`,
    /// forwarded argv, markers read and cleared.
    pub fn from_env() -> Result<Self> {
        let invocation = classify_invocation_from_env()?;
        let executable = env::current_exe()?;
        Self::new(executable, env::args_os().collect(), invocation)
    }

    /// Archive option by name
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// Directory the payload runs from; falls back to `home` until a
    /// strategy has decided otherwise
    pub fn run_dir(&self) -> &BoundedPath {
        self.run_dir.as_ref().unwrap_or(&self.home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PATH_CAPACITY;

    #[test]
    fn test_classify_no_marker() {
        let kind = classify_invocation(None, None).unwrap();
        assert_eq!(kind, InvocationKind::FreshParent);
        assert!(!kind.inherits_authorization());
    }

    #[test]
    fn test_classify_single_process_ignored_without_payload_dir() {
        let kind = classify_invocation(None, Some("1".to_string())).unwrap();
        assert_eq!(kind, InvocationKind::FreshParent);
    }

    #[test]
    fn test_classify_child() {
        let kind = classify_invocation(Some("/tmp/app.x1".to_string()), None).unwrap();
        assert!(kind.is_child());
        assert_eq!(kind.payload_dir().unwrap().as_str(), "/tmp/app.x1");
        assert!(kind.inherits_authorization());
    }

    #[test]
    fn test_classify_restarted_parent() {
        let kind =
            classify_invocation(Some("/opt/app".to_string()), Some("1".to_string())).unwrap();
        assert_eq!(
            kind,
            InvocationKind::RestartedParent {
                payload_dir: BoundedPath::new("/opt/app").unwrap()
            }
        );
        assert!(!kind.is_child());
        assert!(kind.inherits_authorization());
    }

    #[test]
    fn test_classify_sentinel_mismatch_is_child() {
        // Anything other than the exact sentinel means a real child.
        let kind =
            classify_invocation(Some("/tmp/app.x1".to_string()), Some("yes".to_string())).unwrap();
        assert!(kind.is_child());
    }

    #[test]
    fn test_classify_oversized_marker_rejected() {
        let oversized = "a".repeat(PATH_CAPACITY);
        assert!(classify_invocation(Some(oversized), None).is_err());
    }

    #[test]
    fn test_context_derives_companion_paths() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();

        let ctx = LaunchContext::new(
            &exe,
            vec![OsString::from("app")],
            InvocationKind::FreshParent,
        )
        .unwrap();

        assert!(ctx.executable.as_str().ends_with("/app"));
        assert!(ctx.archive_file.as_str().ends_with("/app.pkg"));
        assert_eq!(
            ctx.home.as_path(),
            ctx.executable.as_path().parent().unwrap()
        );
        assert!(!ctx.needs_extraction);
        assert!(ctx.extraction_dir.is_none());
        assert_eq!(ctx.run_dir(), &ctx.home);
    }
}
