// src/main.rs

use anyhow::Context;
use packrun::archive::manifest::ManifestOpener;
use packrun::runtime::EntryPointRuntime;
use packrun::splash::NoSplash;
use packrun::{Error, LaunchContext, PlatformCaps, RunOutcome, Subsystems, bootstrap};

/// Exit code when a fatal error cannot be attributed to a launcher
/// category (EX_SOFTWARE)
const EXIT_INTERNAL: i32 = 70;

fn run() -> anyhow::Result<RunOutcome> {
    let mut ctx = LaunchContext::from_env().context("failed to build launch context")?;

    let opener = ManifestOpener;
    let mut runtime = EntryPointRuntime::new();
    let mut splash = NoSplash;
    let mut sys = Subsystems {
        opener: &opener,
        runtime: &mut runtime,
        splash: &mut splash,
        caps: PlatformCaps::native(),
    };

    Ok(bootstrap::run(&mut ctx, &mut sys)?)
}

fn main() {
    // Diagnostics go to stderr; the payload owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(outcome) => {
            // Cleanup is complete here; make our own termination match the
            // child's so supervisors observe the signal, not an exit code.
            #[cfg(unix)]
            if let Some(sig) = outcome.child_signal {
                packrun::process::reraise_signal(sig);
            }
            std::process::exit(outcome.status);
        }
        Err(err) => {
            eprintln!("packrun: {:#}", err);
            let code = err
                .downcast_ref::<Error>()
                .map(Error::exit_code)
                .unwrap_or(EXIT_INTERNAL);
            std::process::exit(code);
        }
    }
}
