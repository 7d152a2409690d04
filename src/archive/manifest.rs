// src/archive/manifest.rs

//! Manifest-backed reference archive
//!
//! A launch manifest is a small TOML file describing where the payload
//! lives and which launch options apply:
//!
//! ```toml
//! [payload]
//! source = "payload"      # directory, relative to the manifest
//! extract = true          # onefile: copy into the extraction directory
//!
//! [options]
//! entry-point = "bin/app"
//! ```
//!
//! This backend covers onedir layouts and side-loaded development setups.
//! It deliberately knows nothing about packed binary containers; those
//! implement [`Archive`]/[`ArchiveOpener`] outside this crate. When the
//! embedded-archive magic is present in the executable the opener reports
//! the candidate as unsupported so a packed-format opener can take over.

use super::signature;
use super::{Archive, ArchiveOpener};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct ManifestFile {
    payload: PayloadSpec,
    #[serde(default)]
    options: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PayloadSpec {
    /// Payload directory, absolute or relative to the manifest
    source: String,
    /// Whether the payload must be copied out before execution
    #[serde(default)]
    extract: bool,
}

/// Archive handle backed by a launch manifest and a payload directory
#[derive(Debug)]
pub struct ManifestArchive {
    source_dir: PathBuf,
    needs_extraction: bool,
    options: BTreeMap<String, String>,
}

impl ManifestArchive {
    /// Parse the manifest at `path` and resolve its payload directory.
    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let manifest: ManifestFile = toml::from_str(&text)
            .map_err(|err| Error::Extraction(format!("invalid launch manifest: {}", err)))?;

        let source_dir = {
            let source = PathBuf::from(&manifest.payload.source);
            if source.is_absolute() {
                source
            } else {
                path.parent().unwrap_or(Path::new(".")).join(source)
            }
        };

        if !source_dir.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("payload directory {} not found", source_dir.display()),
            )));
        }

        debug!(
            "launch manifest {} -> payload at {}",
            path.display(),
            source_dir.display()
        );

        Ok(Self {
            source_dir,
            needs_extraction: manifest.payload.extract,
            options: manifest.options,
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }
}

impl Archive for ManifestArchive {
    fn needs_extraction(&self) -> bool {
        self.needs_extraction
    }

    fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    fn extract_all(&mut self, dest: &Path) -> Result<()> {
        for entry in WalkDir::new(&self.source_dir).min_depth(1) {
            let entry = entry
                .map_err(|err| Error::Extraction(format!("payload walk failed: {}", err)))?;
            let relative = entry
                .path()
                .strip_prefix(&self.source_dir)
                .map_err(|err| Error::Extraction(format!("payload walk escaped root: {}", err)))?;
            let target = dest.join(relative);

            let file_type = entry.file_type();
            if file_type.is_dir() {
                fs::create_dir_all(&target)?;
            } else if file_type.is_symlink() {
                let link = fs::read_link(entry.path())?;
                #[cfg(unix)]
                std::os::unix::fs::symlink(link, &target)?;
                #[cfg(not(unix))]
                let _ = link;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target)?;
            }
        }
        debug!(
            "extracted payload from {} to {}",
            self.source_dir.display(),
            dest.display()
        );
        Ok(())
    }
}

/// Opener for manifest-backed archives
///
/// Embedded candidates are detected via the archive magic but not parsed
/// here; side-load candidates are read as launch manifests.
#[derive(Debug, Default)]
pub struct ManifestOpener;

impl ArchiveOpener for ManifestOpener {
    fn open(&self, candidate: &Path, executable: &Path) -> Result<Box<dyn Archive>> {
        if candidate == executable {
            let err = if signature::file_contains_archive_magic(candidate)? {
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    "embedded archive present but no packed-format opener is built in",
                )
            } else {
                io::Error::new(io::ErrorKind::NotFound, "no embedded archive magic")
            };
            return Err(Error::Io(err));
        }
        Ok(Box::new(ManifestArchive::open(candidate)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_payload_tree(root: &Path) {
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::create_dir_all(root.join("lib/sub")).unwrap();
        fs::write(root.join("bin/app"), b"#!/bin/sh\nexit 0\n").unwrap();
        fs::write(root.join("lib/sub/data.bin"), b"payload").unwrap();
        let mut perms = fs::metadata(root.join("bin/app")).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(root.join("bin/app"), perms).unwrap();
    }

    fn write_manifest(dir: &Path, extract: bool) -> PathBuf {
        let manifest = dir.join("app.pkg");
        fs::write(
            &manifest,
            format!(
                "[payload]\nsource = \"payload\"\nextract = {}\n\n[options]\nentry-point = \"bin/app\"\n",
                extract
            ),
        )
        .unwrap();
        manifest
    }

    #[test]
    fn test_open_resolves_relative_source() {
        let dir = tempfile::tempdir().unwrap();
        write_payload_tree(&dir.path().join("payload"));
        let manifest = write_manifest(dir.path(), false);

        let archive = ManifestArchive::open(&manifest).unwrap();
        assert!(!archive.needs_extraction());
        assert_eq!(archive.option("entry-point"), Some("bin/app"));
        assert_eq!(archive.source_dir(), dir.path().join("payload"));
    }

    #[test]
    fn test_open_rejects_missing_payload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_manifest(dir.path(), false);
        assert!(ManifestArchive::open(&manifest).is_err());
    }

    #[test]
    fn test_open_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("app.pkg");
        fs::write(&manifest, "not a manifest").unwrap();
        assert!(matches!(
            ManifestArchive::open(&manifest),
            Err(Error::Extraction(_))
        ));
    }

    #[test]
    fn test_extract_all_copies_tree_and_modes() {
        let dir = tempfile::tempdir().unwrap();
        write_payload_tree(&dir.path().join("payload"));
        let manifest = write_manifest(dir.path(), true);

        let mut archive = ManifestArchive::open(&manifest).unwrap();
        assert!(archive.needs_extraction());

        let dest = tempfile::tempdir().unwrap();
        archive.extract_all(dest.path()).unwrap();

        assert!(dest.path().join("bin/app").is_file());
        assert!(dest.path().join("lib/sub/data.bin").is_file());
        let mode = fs::metadata(dest.path().join("bin/app"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_opener_embedded_candidate_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        let mut bytes = vec![0x7fu8; 64];
        bytes.extend_from_slice(&signature::ARCHIVE_MAGIC);
        fs::write(&exe, &bytes).unwrap();

        let err = ManifestOpener.open(&exe, &exe).unwrap_err();
        assert!(err.to_string().contains("no packed-format opener"));
    }

    #[test]
    fn test_opener_sideload_candidate_reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_payload_tree(&dir.path().join("payload"));
        let manifest = write_manifest(dir.path(), false);
        let exe = dir.path().join("app");
        fs::write(&exe, b"\x7fELF").unwrap();

        let archive = ManifestOpener.open(&manifest, &exe).unwrap();
        assert_eq!(archive.option("entry-point"), Some("bin/app"));
    }
}
