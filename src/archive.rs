//! Recursive expansion of downloaded archives.
//!
//! Quarterly statements arrive as `.zip` files, sometimes with further
//! `.zip` files inside. Everything is unpacked into one working directory
//! before the tabular files are read.

use crate::error::Result;
use crate::walk::{collect_files, has_extension};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Expands every archive found under `downloads_dir` into `extracted_dir`.
///
/// A corrupt archive is logged and skipped. Returns the number of files
/// written, nested archives included.
pub fn expand_all(downloads_dir: &Path, extracted_dir: &Path) -> Result<usize> {
    fs::create_dir_all(extracted_dir)?;

    let archives: Vec<PathBuf> = collect_files(downloads_dir)?
        .into_iter()
        .filter(|p| has_extension(p, "zip"))
        .collect();
    info!(
        "Found {} archives in {}",
        archives.len(),
        downloads_dir.display()
    );

    let mut extracted = 0;
    for archive in &archives {
        match expand_archive(archive, extracted_dir) {
            Ok(count) => extracted += count,
            Err(e) => warn!("Skipping archive {}: {}", archive.display(), e),
        }
    }

    info!(
        "Extracted {} files into {}",
        extracted,
        extracted_dir.display()
    );
    Ok(extracted)
}

/// Extracts one archive into `dest`, then expands any archive it contained
/// into the directory that entry landed in.
///
/// Entries whose names would escape `dest` are skipped.
pub fn expand_archive(archive_path: &Path, dest: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut nested = Vec::new();
    let mut extracted = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = match entry.enclosed_name() {
            Some(name) => name.to_path_buf(),
            None => {
                warn!(
                    "{}: skipping entry with unsafe path {:?}",
                    archive_path.display(),
                    entry.name()
                );
                continue;
            }
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted += 1;
        debug!("Extracted {}", out_path.display());

        if has_extension(&out_path, "zip") {
            nested.push(out_path);
        }
    }

    for inner in nested {
        let parent = inner.parent().unwrap_or(dest).to_path_buf();
        match expand_archive(&inner, &parent) {
            Ok(count) => extracted += count,
            Err(e) => warn!("Skipping nested archive {}: {}", inner.display(), e),
        }
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(name.trim_end_matches('/'), FileOptions::default())
                    .unwrap();
            } else {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_expand_flat_archive() {
        let dir = TempDir::new().unwrap();
        let downloads = dir.path().join("downloads");
        let extracted = dir.path().join("extracted");
        fs::create_dir_all(&downloads).unwrap();
        fs::write(
            downloads.join("1T2025.zip"),
            zip_bytes(&[
                ("docs/", b"".as_slice()),
                ("docs/1T2025.csv", b"DATA;REG_ANS\n".as_slice()),
            ]),
        )
        .unwrap();

        let count = expand_all(&downloads, &extracted).unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            fs::read_to_string(extracted.join("docs/1T2025.csv")).unwrap(),
            "DATA;REG_ANS\n"
        );
    }

    #[test]
    fn test_expand_nested_archive() {
        let dir = TempDir::new().unwrap();
        let downloads = dir.path().join("downloads");
        let extracted = dir.path().join("extracted");
        fs::create_dir_all(&downloads).unwrap();

        let inner = zip_bytes(&[("2T2025.csv", b"x".as_slice())]);
        fs::write(
            downloads.join("outer.zip"),
            zip_bytes(&[("sub/inner.zip", inner.as_slice())]),
        )
        .unwrap();

        let count = expand_all(&downloads, &extracted).unwrap();
        assert_eq!(count, 2);
        assert!(extracted.join("sub/inner.zip").is_file());
        assert_eq!(fs::read_to_string(extracted.join("sub/2T2025.csv")).unwrap(), "x");
    }

    #[test]
    fn test_corrupt_archive_is_skipped() {
        let dir = TempDir::new().unwrap();
        let downloads = dir.path().join("downloads");
        let extracted = dir.path().join("extracted");
        fs::create_dir_all(&downloads).unwrap();
        fs::write(downloads.join("a_broken.zip"), b"not a zip").unwrap();
        fs::write(
            downloads.join("b_good.zip"),
            zip_bytes(&[("ok.csv", b"1".as_slice())]),
        )
        .unwrap();

        let count = expand_all(&downloads, &extracted).unwrap();
        assert_eq!(count, 1);
        assert!(extracted.join("ok.csv").is_file());
    }

    #[test]
    fn test_unsafe_entry_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        fs::write(
            &archive,
            zip_bytes(&[("../escape.csv", b"x".as_slice()), ("safe.csv", b"y".as_slice())]),
        )
        .unwrap();

        let dest = dir.path().join("out");
        let count = expand_archive(&archive, &dest).unwrap();
        assert_eq!(count, 1);
        assert!(!dir.path().join("escape.csv").exists());
        assert!(dest.join("safe.csv").is_file());
    }

    #[test]
    fn test_missing_downloads_dir_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(expand_all(&dir.path().join("nope"), &dir.path().join("out")).is_err());
    }
}
