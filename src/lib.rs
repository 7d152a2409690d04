// src/lib.rs

//! packrun: native launcher for self-contained packaged applications
//!
//! Given a single executable (or an executable plus a side-loaded
//! companion file), the launcher locates the payload archive, decides
//! whether the payload must be extracted to a temporary location, prepares
//! the runtime environment, and executes the application in this process
//! or in a supervised child, guaranteeing cleanup of temporary state
//! however execution ends.
//!
//! # Architecture
//!
//! - One [`context::LaunchContext`] per invocation, built before anything
//!   else runs and threaded through every stage
//! - Parent/child coordination through environment markers read exactly
//!   once into [`context::InvocationKind`]
//! - A closed set of execution strategies chosen by a pure function
//!   ([`strategy`]), with OS mechanics behind [`process`]
//! - Collaborator seams as traits: [`archive`], [`runtime`], [`splash`]
//! - Bounds-checked path construction throughout ([`path`])

pub mod archive;
pub mod bootstrap;
pub mod context;
mod error;
pub mod path;
pub mod process;
pub mod runtime;
pub mod splash;
pub mod strategy;
pub mod tempdir;

pub use bootstrap::{RunOutcome, Subsystems};
pub use context::{InvocationKind, LaunchContext};
pub use error::{Error, Result};
pub use path::{BoundedPath, PathError, format_and_check_path, split_dependency_name};
pub use strategy::{ExecStrategy, PlatformCaps};
pub use tempdir::ExtractionDir;
