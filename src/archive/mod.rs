// src/archive/mod.rs

//! Payload archive boundary
//!
//! The launcher never interprets the archive container format itself; it
//! talks to the archive through the [`Archive`] trait and obtains handles
//! through an [`ArchiveOpener`]. Candidates are tried in a fixed order:
//! the archive embedded in the executable first, then the side-load
//! companion file next to it. A side-loaded archive is only accepted on a
//! first run after the executable proves it opted into side-loading.
//!
//! The in-tree [`manifest`] backend serves onedir layouts, side-load
//! development setups and the test suite; packed binary container formats
//! implement these traits outside this crate.

pub mod manifest;
pub mod signature;

use crate::context::LaunchContext;
use crate::error::{Error, Result};
use crate::process;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// An opened payload archive
pub trait Archive: std::fmt::Debug {
    /// Whether payload files must be unpacked to a temporary directory
    /// before execution (onefile layout)
    fn needs_extraction(&self) -> bool;

    /// Launch option by name
    fn option(&self, name: &str) -> Option<&str>;

    /// All launch options carried by the archive
    fn options(&self) -> &BTreeMap<String, String>;

    /// Unpack every payload file under `dest`
    fn extract_all(&mut self, dest: &Path) -> Result<()>;
}

/// Opens archive candidates
///
/// `candidate` is the file to open; when it equals `executable` the attempt
/// is for an embedded archive, otherwise for a side-load companion file.
pub trait ArchiveOpener {
    fn open(&self, candidate: &Path, executable: &Path) -> Result<Box<dyn Archive>>;
}

/// Open the payload archive for this invocation.
///
/// Tries embedded-in-executable first, then the side-load candidate. Both
/// failing is fatal. A side-loaded archive on a fresh parent run must pass
/// the side-load authorization check before anything is extracted; child
/// and restarted invocations inherit the parent's authorization.
///
/// On success the context's `options` and `needs_extraction` are latched;
/// `needs_extraction` never changes after this point.
pub fn open_with_fallback(
    opener: &dyn ArchiveOpener,
    ctx: &mut LaunchContext,
) -> Result<Box<dyn Archive>> {
    let archive = match opener.open(ctx.executable.as_path(), ctx.executable.as_path()) {
        Ok(archive) => {
            debug!("opened embedded archive in {}", ctx.executable);
            ctx.is_side_loaded = false;
            archive
        }
        Err(embedded_err) => {
            debug!(
                "no embedded archive in {}: {}",
                ctx.executable, embedded_err
            );
            let archive = opener
                .open(ctx.archive_file.as_path(), ctx.executable.as_path())
                .map_err(|sideload_err| {
                    debug!(
                        "no side-load archive at {}: {}",
                        ctx.archive_file, sideload_err
                    );
                    Error::ArchiveOpen {
                        executable: ctx.executable.to_string(),
                        sideload: ctx.archive_file.to_string(),
                    }
                })?;

            if !ctx.invocation.inherits_authorization() {
                process::authorize_sideload(ctx.executable.as_path())?;
            }
            info!("side-loading archive from {}", ctx.archive_file);
            ctx.is_side_loaded = true;
            archive
        }
    };

    ctx.options = archive.options().clone();
    ctx.needs_extraction = archive.needs_extraction();
    debug!(
        needs_extraction = ctx.needs_extraction,
        side_loaded = ctx.is_side_loaded,
        "archive open"
    );

    Ok(archive)
}
