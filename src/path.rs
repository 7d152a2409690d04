// src/path.rs

//! Bounds-checked path construction and dependency-name parsing
//!
//! Every path the launcher constructs from variable parts (archive
//! metadata, dependency references) goes through this module. Construction
//! either fully succeeds within the platform path-length limit or reports
//! overflow; a truncated, silently-wrong path is never produced.
//!
//! The two failure families are kept distinct because callers react
//! differently: overflow is a packaging problem and carries no OS error
//! code, while a missing path carries the underlying code and may be
//! legitimately retried against a fallback location.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Platform path-length limit, the fixed capacity for every constructed path
#[cfg(unix)]
pub const PATH_CAPACITY: usize = libc::PATH_MAX as usize;
#[cfg(not(unix))]
pub const PATH_CAPACITY: usize = 4096;

/// Errors from bounds-checked path construction and dependency parsing
#[derive(Debug, Error)]
pub enum PathError {
    /// The formatted result would not fit within [`PATH_CAPACITY`]
    #[error("path length {len} exceeds the {capacity}-byte path capacity")]
    Overflow { len: usize, capacity: usize },

    /// Dependency specification is syntactically invalid
    #[error("malformed dependency specification: {0:?}")]
    MalformedSpec(String),

    /// Formatting succeeded but the path does not exist or is inaccessible
    #[error("path {path:?} not found: {source}")]
    NotFound {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl PathError {
    /// OS error code of the underlying failure, if any.
    ///
    /// `Overflow` and `MalformedSpec` never attempt a filesystem call, so
    /// they carry no code; `NotFound` always does.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            PathError::NotFound { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// An owned path guaranteed to fit the platform path-length limit
///
/// The capacity check happens once, at construction; the value is immutable
/// afterwards, so a `BoundedPath` can be handed to OS calls without further
/// length arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundedPath {
    inner: String,
}

impl BoundedPath {
    /// Validate `path` against the capacity rule.
    ///
    /// Lengths of `PATH_CAPACITY - 1` and above are rejected: the limit
    /// must leave room for the OS-level terminator.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let inner = path.into();
        if inner.len() >= PATH_CAPACITY - 1 {
            return Err(PathError::Overflow {
                len: inner.len(),
                capacity: PATH_CAPACITY,
            });
        }
        Ok(Self { inner })
    }

    /// Validate an OS path, replacing invalid UTF-8 lossily
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PathError> {
        Self::new(path.as_ref().to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn into_string(self) -> String {
        self.inner
    }
}

impl fmt::Display for BoundedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl AsRef<Path> for BoundedPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl AsRef<str> for BoundedPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

/// Concatenate `parts` into a bounds-checked path and probe for existence.
///
/// The parts are caller-controlled and may originate from archive metadata
/// or dependency specs; they are not trusted to be bounded. Overflow is
/// reported without touching the filesystem. A formatted path is only
/// returned once a filesystem probe confirms it exists; otherwise the
/// probe's OS error is propagated in [`PathError::NotFound`].
///
/// # Examples
///
/// ```
/// use packrun::path::format_and_check_path;
///
/// let root = format_and_check_path(["/"]).unwrap();
/// assert_eq!(root.as_str(), "/");
///
/// let err = format_and_check_path(["/no", "/such", "/path.pkg"]).unwrap_err();
/// assert!(err.os_error().is_some());
/// ```
pub fn format_and_check_path<I, S>(parts: I) -> Result<BoundedPath, PathError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut formatted = String::new();
    for part in parts {
        formatted.push_str(part.as_ref());
        if formatted.len() >= PATH_CAPACITY - 1 {
            return Err(PathError::Overflow {
                len: formatted.len(),
                capacity: PATH_CAPACITY,
            });
        }
    }

    // Capacity was checked after every part; this cannot overflow.
    let path = BoundedPath { inner: formatted };

    match fs::metadata(path.as_path()) {
        Ok(_) => Ok(path),
        Err(source) => Err(PathError::NotFound {
            path: path.into_string(),
            source,
        }),
    }
}

/// Split a compound `container:member` dependency identifier.
///
/// The separator is the *first* colon: the member name may itself contain
/// colons, the container name may not. Both parts must be non-empty and
/// individually fit a [`BoundedPath`].
///
/// # Examples
///
/// ```
/// use packrun::path::split_dependency_name;
///
/// let (container, member) = split_dependency_name("libs.pkg:libssl.so.3").unwrap();
/// assert_eq!(container.as_str(), "libs.pkg");
/// assert_eq!(member.as_str(), "libssl.so.3");
///
/// assert!(split_dependency_name("no-separator").is_err());
/// ```
pub fn split_dependency_name(spec: &str) -> Result<(BoundedPath, BoundedPath), PathError> {
    let colon = spec
        .find(':')
        .ok_or_else(|| PathError::MalformedSpec(spec.to_string()))?;

    let container = &spec[..colon];
    let member = &spec[colon + 1..];

    if container.is_empty() || member.is_empty() {
        return Err(PathError::MalformedSpec(spec.to_string()));
    }

    Ok((BoundedPath::new(container)?, BoundedPath::new(member)?))
}
