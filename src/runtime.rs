// src/runtime.rs

//! Payload execution boundary
//!
//! The hosted application is brought up through the [`AppRuntime`] trait:
//! `initialize`, `execute`, `finalize`, in that order, with `finalize`
//! running unconditionally even when execution fails. The launcher's final
//! status equals the payload's reported status unless a prior fatal error
//! already determined it.
//!
//! [`EntryPointRuntime`] is the reference implementation: it resolves the
//! entry program the archive declares and runs it with the forwarded
//! argv. Embedded-interpreter runtimes implement the same trait outside
//! this crate.

use crate::context::LaunchContext;
use crate::error::{Error, Result};
use crate::path::{BoundedPath, format_and_check_path, split_dependency_name};
use std::process::Command;
use tracing::{debug, info};

/// Archive option naming the payload's entry program, relative to the run
/// directory
pub const ENTRY_POINT_OPTION: &str = "entry-point";

/// Archive option listing `container:member` dependency references that
/// must resolve next to the application before the payload starts
pub const REQUIRES_OPTION: &str = "requires";

/// Environment variable telling the payload where the application lives
pub const HOME_ENV: &str = "PACKRUN_HOME";

/// The interpreter-embedding seam
pub trait AppRuntime {
    /// Prepare the payload for execution
    fn initialize(&mut self, ctx: &LaunchContext) -> Result<()>;

    /// Run the payload; the returned value is the payload's exit status,
    /// not a launcher error
    fn execute(&mut self, ctx: &LaunchContext) -> Result<i32>;

    /// Tear the runtime down; must be safe after a failed initialize
    fn finalize(&mut self, ctx: &LaunchContext);
}

/// Run the payload with the unconditional initialize/execute/finalize
/// bracket.
pub fn run_payload(runtime: &mut dyn AppRuntime, ctx: &LaunchContext) -> Result<i32> {
    if let Err(err) = runtime.initialize(ctx) {
        runtime.finalize(ctx);
        return Err(err);
    }
    let result = runtime.execute(ctx);
    runtime.finalize(ctx);
    result
}

/// Reference runtime launching the archive's declared entry program
#[derive(Debug, Default)]
pub struct EntryPointRuntime {
    entry: Option<BoundedPath>,
}

impl EntryPointRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AppRuntime for EntryPointRuntime {
    fn initialize(&mut self, ctx: &LaunchContext) -> Result<()> {
        let entry = ctx.option(ENTRY_POINT_OPTION).ok_or_else(|| {
            Error::Runtime("archive declares no entry-point option".to_string())
        })?;

        let run_dir = ctx.run_dir();
        let resolved = format_and_check_path([run_dir.as_str(), "/", entry])?;

        // Dependency references point at sibling containers next to the
        // application home; each container must exist before we start.
        if let Some(specs) = ctx.option(REQUIRES_OPTION) {
            for spec in specs.split_whitespace() {
                let (container, member) = split_dependency_name(spec)?;
                format_and_check_path([ctx.home.as_str(), "/", container.as_str()])?;
                debug!("dependency {} provides {}", container, member);
            }
        }

        info!("payload entry point {}", resolved);
        self.entry = Some(resolved);
        Ok(())
    }

    fn execute(&mut self, ctx: &LaunchContext) -> Result<i32> {
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| Error::Runtime("payload runtime not initialized".to_string()))?;

        let status = Command::new(entry.as_path())
            .args(ctx.command_line.iter().skip(1))
            .current_dir(ctx.run_dir())
            .env(HOME_ENV, ctx.home.as_str())
            .status()
            .map_err(|err| Error::Runtime(format!("failed to run {}: {}", entry, err)))?;

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return Ok(128 + sig);
            }
        }
        Ok(status.code().unwrap_or(-1))
    }

    fn finalize(&mut self, _ctx: &LaunchContext) {
        debug!("payload runtime finalized");
        self.entry = None;
    }
}
