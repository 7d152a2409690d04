// src/bootstrap.rs

//! The bootstrap orchestrator
//!
//! `run` drives one launcher invocation end to end: classify how we were
//! invoked, open the archive, decide the execution strategy, perform it,
//! and guarantee teardown of temporary state on the way out. Cleanup sits
//! on the control-flow path common to every exit, so a payload crash or a
//! fatal launcher error after extraction still removes the extraction
//! directory.
//!
//! A child's termination signal is not re-raised here: it is reported in
//! [`RunOutcome`] so the caller can re-raise after all cleanup is done and
//! the process has nothing left to lose.

use crate::archive::{self, Archive, ArchiveOpener};
use crate::context::{
    InvocationKind, LaunchContext, PAYLOAD_DIR_MARKER, PROCNAME_MARKER, SINGLE_PROCESS_MARKER,
    SINGLE_PROCESS_SENTINEL,
};
use crate::error::{Error, Result};
use crate::process::{self, EnvOverrides};
use crate::runtime::{self, AppRuntime};
use crate::splash::{self, SplashScreen};
use crate::strategy::{self, ExecStrategy, PlatformCaps};
use crate::tempdir::{ExtractionDir, RUNTIME_TMPDIR_OPTION};
use std::ffi::OsString;
use std::io;
use tracing::debug;

/// The collaborators one bootstrap run is wired with
pub struct Subsystems<'a> {
    pub opener: &'a dyn ArchiveOpener,
    pub runtime: &'a mut dyn AppRuntime,
    pub splash: &'a mut dyn SplashScreen,
    pub caps: PlatformCaps,
}

/// Result of a completed bootstrap run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// The process's exit status: the payload's reported status, or the
    /// child's forwarded one
    pub status: i32,
    /// Signal that terminated the child, to be re-raised by the caller
    /// after cleanup (non-Windows)
    pub child_signal: Option<i32>,
}

impl RunOutcome {
    fn exited(status: i32) -> Self {
        Self {
            status,
            child_signal: None,
        }
    }
}

/// Run the bootstrap to completion.
///
/// This is the single place temporary state is torn down: however
/// `run_inner` came back, the splash screen is finalized first (it may
/// hold handles into the extraction directory) and the extraction
/// directory is removed.
pub fn run(ctx: &mut LaunchContext, sys: &mut Subsystems) -> Result<RunOutcome> {
    let result = run_inner(ctx, sys);

    sys.splash.finalize(ctx);
    if let Some(dir) = ctx.extraction_dir.as_mut() {
        dir.destroy();
    }

    result
}

fn run_inner(ctx: &mut LaunchContext, sys: &mut Subsystems) -> Result<RunOutcome> {
    process::apply_relayed_process_name()?;

    let mut archive = archive::open_with_fallback(sys.opener, ctx)?;

    // Onefile parent: the extraction directory exists before any strategy
    // runs. Children never create one; they inherit the parent's by path.
    if ctx.invocation == InvocationKind::FreshParent && ctx.needs_extraction {
        let dir = ExtractionDir::create(&ctx.executable, ctx.option(RUNTIME_TMPDIR_OPTION))?;
        ctx.extraction_dir = Some(dir);
    }

    let strategy = strategy::select(&ctx.invocation, ctx.needs_extraction, sys.caps);
    debug!(?strategy, "strategy selected");

    match strategy {
        ExecStrategy::RunPayload => {
            let payload_dir = match &ctx.invocation {
                InvocationKind::Child { payload_dir }
                | InvocationKind::RestartedParent { payload_dir } => payload_dir.clone(),
                InvocationKind::FreshParent => {
                    unreachable!("RunPayload is only selected for marked invocations")
                }
            };
            ctx.run_dir = Some(payload_dir);

            // A spawned child never shows the splash; its parent does.
            if !ctx.invocation.is_child() {
                splash::bring_up(sys.splash, ctx);
            }
            run_in_process(sys.runtime, ctx)
        }

        ExecStrategy::InProcessReuse => {
            ctx.run_dir = Some(ctx.home.clone());
            splash::bring_up(sys.splash, ctx);
            run_in_process(sys.runtime, ctx)
        }

        ExecStrategy::RestartSelf => restart_self(ctx),

        ExecStrategy::ExtractThenSpawn => extract_then_spawn(ctx, sys, archive.as_mut()),
    }
}

fn run_in_process(runtime: &mut dyn AppRuntime, ctx: &LaunchContext) -> Result<RunOutcome> {
    debug!("running payload from {}", ctx.run_dir());
    let status = runtime::run_payload(runtime, ctx)?;
    Ok(RunOutcome::exited(status))
}

/// Replace this process image with itself so the search-path change is in
/// effect when the new image's dynamic loader runs. Never returns on
/// success.
fn restart_self(ctx: &mut LaunchContext) -> Result<RunOutcome> {
    debug!("no extraction needed; restarting launcher for environment changes");

    let mut env = process::search_path_overrides(ctx.home.as_path())?;
    env.push((
        OsString::from(PAYLOAD_DIR_MARKER),
        OsString::from(ctx.home.as_str()),
    ));
    env.push((
        OsString::from(SINGLE_PROCESS_MARKER),
        OsString::from(SINGLE_PROCESS_SENTINEL),
    ));

    #[cfg(unix)]
    {
        Err(process::replace_process(
            ctx.executable.as_path(),
            &ctx.command_line,
            &env,
        ))
    }
    #[cfg(not(unix))]
    {
        // Platforms without exec-style replacement report single-process
        // capability and never select this strategy.
        let _ = env;
        Err(Error::ProcessReplace(io::Error::other(
            "process replacement is not supported on this platform",
        )))
    }
}

fn extract_then_spawn(
    ctx: &mut LaunchContext,
    sys: &mut Subsystems,
    archive: &mut dyn Archive,
) -> Result<RunOutcome> {
    let (temp_path, temp_marker) = {
        let extraction = ctx
            .extraction_dir
            .as_ref()
            .ok_or_else(|| Error::TempDirCreate(io::Error::other("extraction directory missing")))?;
        (extraction.path().to_path_buf(), extraction.bounded_path()?)
    };

    // Splash first: in onefile mode its resources are unpacked ahead of
    // the payload so the window is up while extraction runs.
    splash::bring_up(sys.splash, ctx);

    archive.extract_all(&temp_path)?;
    debug!("payload extracted to {}", temp_path.display());

    let mut env: EnvOverrides = process::search_path_overrides(&temp_path)?;
    env.push((
        OsString::from(PAYLOAD_DIR_MARKER),
        OsString::from(temp_marker.as_str()),
    ));
    #[cfg(target_os = "linux")]
    if let Some(name) = process::current_process_name() {
        env.push((OsString::from(PROCNAME_MARKER), name));
    }
    #[cfg(not(target_os = "linux"))]
    let _ = PROCNAME_MARKER;

    let outcome = process::spawn_child(ctx.executable.as_path(), &ctx.command_line, &env)?;
    debug!("child finished: {:?}", outcome);

    Ok(RunOutcome {
        status: outcome.status(),
        child_signal: outcome.signal(),
    })
}
