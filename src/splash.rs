// src/splash.rs

//! Splash screen boundary
//!
//! The splash subsystem is an optional collaborator: most applications
//! ship without one, and a launcher child spawned by an extracting parent
//! never shows one (the parent already does). The launcher only
//! orchestrates the calls; rendering lives outside this crate.

use crate::context::LaunchContext;
use crate::error::Result;
use tracing::{debug, warn};

/// Optional splash-screen collaborator
///
/// `finalize` may be called more than once (attach failure plus the common
/// teardown path) and must tolerate it. It runs before the extraction
/// directory is removed, since an attached splash may hold handles to
/// libraries inside it.
pub trait SplashScreen {
    /// Probe for splash resources; `false` means none are present and no
    /// further splash call is made
    fn setup(&mut self, ctx: &LaunchContext) -> bool;

    /// Extract required binaries (onefile) and attach them
    fn extract_and_attach(&mut self, ctx: &LaunchContext) -> Result<()>;

    /// Show the splash screen
    fn start(&mut self, ctx: &LaunchContext);

    /// Tear the splash screen down
    fn finalize(&mut self, ctx: &LaunchContext);
}

/// The default: no splash resources
#[derive(Debug, Default)]
pub struct NoSplash;

impl SplashScreen for NoSplash {
    fn setup(&mut self, _ctx: &LaunchContext) -> bool {
        false
    }

    fn extract_and_attach(&mut self, _ctx: &LaunchContext) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, _ctx: &LaunchContext) {}

    fn finalize(&mut self, _ctx: &LaunchContext) {}
}

/// Bring the splash screen up if resources are present.
///
/// An attach failure is not fatal to the launch; the splash is finalized
/// immediately in case libraries were partially loaded.
pub fn bring_up(splash: &mut dyn SplashScreen, ctx: &LaunchContext) {
    if !splash.setup(ctx) {
        debug!("no splash resources");
        return;
    }
    match splash.extract_and_attach(ctx) {
        Ok(()) => splash.start(ctx),
        Err(err) => {
            warn!("splash attach failed: {}", err);
            splash.finalize(ctx);
        }
    }
}
