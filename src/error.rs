// src/error.rs

//! Launcher-wide error type and fatal exit codes
//!
//! Every fatal launcher failure carries a fixed exit code so that scripts
//! and process supervisors can tell launcher failures apart from payload
//! failures. The payload's own non-zero exit (or termination by signal) is
//! not an error of the launcher and never appears here; it is forwarded as
//! the process status.

use crate::path::PathError;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort the bootstrap
#[derive(Debug, Error)]
pub enum Error {
    /// Neither the executable nor the side-load candidate holds an archive
    #[error("cannot open payload archive from executable ({executable}) or side-load file ({sideload})")]
    ArchiveOpen {
        executable: String,
        sideload: String,
    },

    /// Side-load file present, but the executable never opted into side-loading
    #[error("executable {0} is not authorized to side-load an external archive")]
    UnauthorizedSideload(String),

    /// Extraction directory could not be created
    #[error("failed to create extraction directory: {0}")]
    TempDirCreate(#[source] io::Error),

    /// Payload extraction into the temporary directory failed
    #[error("failed to extract payload: {0}")]
    Extraction(String),

    /// Library search path could not be configured for the payload
    #[error("failed to configure library search path: {0}")]
    SearchPathConfig(String),

    /// exec() of the restarted launcher image failed; only reachable on
    /// failure since success never returns
    #[error("failed to replace launcher process image: {0}")]
    ProcessReplace(#[source] io::Error),

    /// Child process could not be spawned
    #[error("failed to spawn payload child process: {0}")]
    ChildSpawn(#[source] io::Error),

    /// Payload runtime failed to come up (entry point missing, dependency
    /// unresolved); distinct from the payload itself exiting non-zero
    #[error("payload runtime error: {0}")]
    Runtime(String),

    /// Bounds-checked path construction or dependency-spec parsing failed
    #[error(transparent)]
    Path(#[from] PathError),

    /// Ambient I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Fixed per-category exit code (sysexits-style)
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ArchiveOpen { .. } => 66,
            Error::UnauthorizedSideload(_) => 77,
            Error::TempDirCreate(_) => 73,
            Error::Extraction(_) => 74,
            Error::SearchPathConfig(_) => 71,
            Error::ProcessReplace(_) => 70,
            Error::ChildSpawn(_) => 69,
            Error::Runtime(_) | Error::Path(_) | Error::Io(_) => 70,
        }
    }
}
