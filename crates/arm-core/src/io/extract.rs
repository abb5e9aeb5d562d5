//! Archive expansion and selector filtering
//!
//! Fetched content may contain `.tar.gz` and `.zip` archives. They are
//! expanded in memory next to where they sit, merged with the loose files,
//! and the package's include/exclude selector is applied to the result.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Component, Path};

use arm_schema::{ContentSelector, File};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{ArmError, Result};

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

/// Detect archive format from the file name.
pub fn detect_format(path: &str) -> Option<ArchiveFormat> {
    let lower = path.to_lowercase();
    if lower.ends_with(".tar.gz") {
        Some(ArchiveFormat::TarGz)
    } else if lower.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else {
        None
    }
}

pub fn is_archive(path: &str) -> bool {
    detect_format(path).is_some()
}

/// Reject absolute paths and `..` components (zip-slip).
fn checked_entry_path(archive: &str, raw: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for c in raw.components() {
        match c {
            Component::Normal(p) => parts.push(p.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(ArmError::Archive {
                    path: archive.to_string(),
                    message: format!("invalid entry path: {}", raw.display()),
                });
            }
        }
    }
    Ok(parts.join("/"))
}

fn archive_err(archive: &File, e: impl std::fmt::Display) -> ArmError {
    ArmError::Archive {
        path: archive.path.clone(),
        message: e.to_string(),
    }
}

/// Entries of a `.tar.gz`, paths relative to the archive root.
fn extract_tar_gz(archive: &File) -> Result<Vec<File>> {
    let gz = flate2::read::GzDecoder::new(archive.content.as_slice());
    let mut tar = tar::Archive::new(gz);
    let mut out = Vec::new();

    for entry in tar.entries().map_err(|e| archive_err(archive, e))? {
        let mut entry = entry.map_err(|e| archive_err(archive, e))?;
        // Directories, links and devices carry no content
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let raw = entry.path().map_err(|e| archive_err(archive, e))?.into_owned();
        let rel = checked_entry_path(&archive.path, &raw)?;
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| archive_err(archive, e))?;
        out.push(File::new(rel, content));
    }
    Ok(out)
}

/// Entries of a `.zip`, paths relative to the archive root.
fn extract_zip(archive: &File) -> Result<Vec<File>> {
    let mut zip = ZipArchive::new(Cursor::new(archive.content.as_slice()))
        .map_err(|e| archive_err(archive, e))?;
    let mut out = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| archive_err(archive, e))?;
        if entry.is_dir() {
            continue;
        }
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(archive_err(
                archive,
                format!("invalid entry path: {}", entry.name()),
            ));
        };
        let rel = checked_entry_path(&archive.path, &enclosed)?;
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| archive_err(archive, e))?;
        out.push(File::new(rel, content));
    }
    Ok(out)
}

/// Expand one archive into files placed under the archive's directory.
pub fn expand(archive: &File) -> Result<Vec<File>> {
    let entries = match detect_format(&archive.path) {
        Some(ArchiveFormat::TarGz) => extract_tar_gz(archive)?,
        Some(ArchiveFormat::Zip) => extract_zip(archive)?,
        None => return Ok(vec![archive.clone()]),
    };
    let base = archive.dir();
    Ok(entries
        .into_iter()
        .map(|f| {
            if base.is_empty() {
                f
            } else {
                File::new(format!("{base}/{}", f.path), f.content)
            }
        })
        .collect())
}

/// Expand archives, merge with loose files, then apply `selector`.
///
/// Archive entries override loose files at the same path; among archives
/// the one processed last (by path order) wins. Archive files themselves do
/// not appear in the output. The result is sorted by path.
pub fn process(files: Vec<File>, selector: &ContentSelector) -> Result<Vec<File>> {
    let (archives, loose): (Vec<File>, Vec<File>) =
        files.into_iter().partition(|f| is_archive(&f.path));

    let mut merged: BTreeMap<String, File> =
        loose.into_iter().map(|f| (f.path.clone(), f)).collect();

    let mut archives = archives;
    archives.sort_by(|a, b| a.path.cmp(&b.path));
    for archive in &archives {
        let entries = expand(archive)?;
        debug!(archive = %archive.path, entries = entries.len(), "expanded archive");
        for f in entries {
            if merged.contains_key(&f.path) {
                warn!(path = %f.path, archive = %archive.path, "archive entry overrides existing file");
            }
            merged.insert(f.path.clone(), f);
        }
    }

    Ok(merged
        .into_values()
        .filter(|f| selector.matches(&f.path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let gz = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(gz);
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, content) in entries {
            w.start_file(*path, zip::write::SimpleFileOptions::default())
                .unwrap();
            w.write_all(content).unwrap();
        }
        w.finish().unwrap().into_inner()
    }

    fn yml() -> ContentSelector {
        ContentSelector::new(vec!["**/*.yml".into()], vec![])
    }

    #[test]
    fn tar_entries_land_next_to_archive() {
        let files = vec![File::new(
            "pkg/bundle.tar.gz",
            tar_gz(&[("rules/a.yml", b"a"), ("notes.txt", b"n")]),
        )];
        let out = process(files, &yml()).unwrap();
        assert_eq!(out, vec![File::new("pkg/rules/a.yml", b"a".to_vec())]);
    }

    #[test]
    fn zip_entries_override_loose_files() {
        let files = vec![
            File::new("a.yml", b"loose".to_vec()),
            File::new("b.zip", zip(&[("a.yml", b"archived")])),
        ];
        let out = process(files, &yml()).unwrap();
        assert_eq!(out, vec![File::new("a.yml", b"archived".to_vec())]);
    }

    #[test]
    fn later_archive_wins() {
        let files = vec![
            File::new("z.zip", zip(&[("x.yml", b"from z")])),
            File::new("a.tar.gz", tar_gz(&[("x.yml", b"from a")])),
        ];
        let out = process(files, &yml()).unwrap();
        assert_eq!(out, vec![File::new("x.yml", b"from z".to_vec())]);
    }

    #[test]
    fn archives_are_dropped_even_when_selected() {
        let files = vec![File::new("b.zip", zip(&[("in.md", b"m")]))];
        let everything = ContentSelector::default();
        let out = process(files, &everything).unwrap();
        assert_eq!(out, vec![File::new("in.md", b"m".to_vec())]);
    }

    #[test]
    fn traversal_is_rejected() {
        let err = checked_entry_path("x.tar.gz", Path::new("../evil.yml")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parsing);
        assert_eq!(
            checked_entry_path("x.tar.gz", Path::new("./ok/a.yml")).unwrap(),
            "ok/a.yml"
        );
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let files = vec![File::new("bad.zip", b"not a zip".to_vec())];
        let err = process(files, &yml()).unwrap_err();
        assert!(err.to_string().contains("bad.zip"));
    }

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(detect_format("A.TAR.GZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(detect_format("x.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(detect_format("x.tgz"), None);
    }
}
