// tests/launch.rs

//! Path construction and dependency parsing against the real filesystem.
//!
//! These mirror the launcher's oldest regression suite: the overflow
//! boundary must hold regardless of filesystem state, and only the
//! existence probe may attach an OS error code.

use packrun::path::{PATH_CAPACITY, PathError};
use packrun::{format_and_check_path, split_dependency_name};

#[test]
fn format_returns_exact_concatenation_for_existing_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("payload")).unwrap();
    std::fs::write(dir.path().join("payload/app.pkg"), b"x").unwrap();

    let base = dir.path().to_str().unwrap();
    let path = format_and_check_path([base, "/payload/", "app", ".pkg"]).unwrap();
    assert_eq!(path.as_str(), format!("{}/payload/app.pkg", base));
}

#[test]
fn format_below_capacity_is_probed_with_os_error() {
    // Anything short enough to format must reach the probe; the probe's
    // failure carries a real OS error code.
    for parts in [vec!["a1", "bb", "cc", ".pkg"], vec![""]] {
        let err = format_and_check_path(parts).unwrap_err();
        assert!(matches!(err, PathError::NotFound { .. }));
        assert!(err.os_error().is_some());
    }
}

#[test]
fn format_at_capacity_overflows_even_under_existing_directory() {
    // The overflow check runs before any filesystem call, so an existing
    // prefix makes no difference.
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().to_str().unwrap();
    let filler = "a".repeat(PATH_CAPACITY);

    let err = format_and_check_path([base, "/", filler.as_str()]).unwrap_err();
    assert!(matches!(err, PathError::Overflow { .. }));
    assert_eq!(err.os_error(), None);
}

#[test]
fn format_boundary_is_exact() {
    let at_limit = "a".repeat(PATH_CAPACITY - 1);
    assert!(matches!(
        format_and_check_path([at_limit.as_str()]),
        Err(PathError::Overflow { .. })
    ));

    let under_limit = "a".repeat(PATH_CAPACITY - 2);
    let err = format_and_check_path([under_limit.as_str()]).unwrap_err();
    assert!(matches!(err, PathError::NotFound { .. }));
    assert!(err.os_error().is_some());
}

#[test]
fn split_accepts_first_colon_as_separator() {
    let (container, member) = split_dependency_name("side.pkg:lib/helper.so").unwrap();
    assert_eq!(container.as_str(), "side.pkg");
    assert_eq!(member.as_str(), "lib/helper.so");

    let (container, member) = split_dependency_name("aaa:::").unwrap();
    assert_eq!(container.as_str(), "aaa");
    assert_eq!(member.as_str(), "::");
}

#[test]
fn split_rejects_missing_or_empty_parts() {
    for spec in ["", ":", "aaa", "aaa:", ":bbb", ":::bbb"] {
        assert!(
            matches!(
                split_dependency_name(spec),
                Err(PathError::MalformedSpec(_))
            ),
            "spec {:?} should be malformed",
            spec
        );
    }
}

#[test]
fn split_container_boundary_is_exact() {
    let spec = format!("{}:member", "a".repeat(PATH_CAPACITY - 1));
    assert!(matches!(
        split_dependency_name(&spec),
        Err(PathError::Overflow { .. })
    ));

    let spec = format!("{}:member", "a".repeat(PATH_CAPACITY - 2));
    let (container, member) = split_dependency_name(&spec).unwrap();
    assert_eq!(container.len(), PATH_CAPACITY - 2);
    assert_eq!(member.as_str(), "member");
}
