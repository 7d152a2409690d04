// src/strategy.rs

//! Execution strategy selection
//!
//! Exactly one strategy is chosen per invocation, by a pure function of the
//! invocation kind, the extraction decision and the platform's
//! capabilities. All OS-specific mechanics live in [`crate::process`]; the
//! decision itself is platform-independent and tested as a table.

use crate::context::InvocationKind;

/// The closed set of execution strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStrategy {
    /// Marker was present: the payload is already in place, run it in this
    /// process
    RunPayload,
    /// No extraction needed and the loader picks up search-path changes at
    /// load time: run the payload here, out of the home directory
    InProcessReuse,
    /// No extraction needed but the search path is only consulted at
    /// process start: replace this process image with itself after
    /// preparing the environment
    RestartSelf,
    /// Extraction needed: unpack, then supervise a child process
    ExtractThenSpawn,
}

/// What the platform's dynamic loader allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCaps {
    /// The library search path can take effect without restarting the
    /// process (Windows `SetDllDirectory`-style redirection, macOS)
    pub single_process_onedir: bool,
}

impl PlatformCaps {
    /// Capabilities of the platform this launcher was built for
    pub const fn native() -> Self {
        Self {
            single_process_onedir: cfg!(any(target_os = "windows", target_os = "macos")),
        }
    }
}

/// Choose the strategy for this invocation.
///
/// A restarted parent is already past its environment change and must never
/// re-enter [`ExecStrategy::RestartSelf`]; like a child, it runs the
/// payload from the directory its marker named.
pub fn select(
    invocation: &InvocationKind,
    needs_extraction: bool,
    caps: PlatformCaps,
) -> ExecStrategy {
    match invocation {
        InvocationKind::Child { .. } | InvocationKind::RestartedParent { .. } => {
            ExecStrategy::RunPayload
        }
        InvocationKind::FreshParent if needs_extraction => ExecStrategy::ExtractThenSpawn,
        InvocationKind::FreshParent if caps.single_process_onedir => ExecStrategy::InProcessReuse,
        InvocationKind::FreshParent => ExecStrategy::RestartSelf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::BoundedPath;

    const SINGLE_PROCESS: PlatformCaps = PlatformCaps {
        single_process_onedir: true,
    };
    const RESTARTING: PlatformCaps = PlatformCaps {
        single_process_onedir: false,
    };

    fn child() -> InvocationKind {
        InvocationKind::Child {
            payload_dir: BoundedPath::new("/tmp/app.x1").unwrap(),
        }
    }

    fn restarted() -> InvocationKind {
        InvocationKind::RestartedParent {
            payload_dir: BoundedPath::new("/opt/app").unwrap(),
        }
    }

    #[test]
    fn test_child_always_runs_payload() {
        for caps in [SINGLE_PROCESS, RESTARTING] {
            for needs_extraction in [false, true] {
                assert_eq!(
                    select(&child(), needs_extraction, caps),
                    ExecStrategy::RunPayload
                );
            }
        }
    }

    #[test]
    fn test_restarted_parent_never_restarts_again() {
        for caps in [SINGLE_PROCESS, RESTARTING] {
            assert_eq!(select(&restarted(), false, caps), ExecStrategy::RunPayload);
        }
    }

    #[test]
    fn test_fresh_parent_extraction_spawns() {
        for caps in [SINGLE_PROCESS, RESTARTING] {
            assert_eq!(
                select(&InvocationKind::FreshParent, true, caps),
                ExecStrategy::ExtractThenSpawn
            );
        }
    }

    #[test]
    fn test_fresh_parent_onedir_by_platform() {
        assert_eq!(
            select(&InvocationKind::FreshParent, false, SINGLE_PROCESS),
            ExecStrategy::InProcessReuse
        );
        assert_eq!(
            select(&InvocationKind::FreshParent, false, RESTARTING),
            ExecStrategy::RestartSelf
        );
    }
}
