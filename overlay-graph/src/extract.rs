//! Safe extraction of provider snapshot tarballs.
//!
//! Archives come from arbitrary remote hosts and are treated as hostile:
//! every entry path is checked before anything touches the disk, links may
//! only point inside the destination, nothing is written or resolved through
//! a symlink unpacked earlier, and the archive must have exactly one
//! top-level directory (the shape both GitHub and GitLab produce).

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::debug;

use crate::errors::ExtractError;

/// Name of the metadata record `git archive` puts in front of every tarball.
pub const PAX_GLOBAL_HEADER: &str = "pax_global_header";

/// Unpacks `archive` (tar.gz) into `destination` and returns the name of the
/// single top-level directory.
pub fn extract_tar_gz(archive: &Path, destination: &Path) -> Result<String, ExtractError> {
    let io_err = |source| ExtractError::Io {
        path: archive.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(io_err)?;
    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));

    let mut top: Option<String> = None;
    let mut written = 0usize;
    let mut symlinks: HashSet<PathBuf> = HashSet::new();

    for entry in tar.entries().map_err(io_err)? {
        let mut entry = entry.map_err(io_err)?;
        let kind = entry.header().entry_type();
        let raw = entry.path().map_err(io_err)?.into_owned();
        let shown = raw.to_string_lossy().into_owned();

        if kind.is_pax_global_extensions() || shown == PAX_GLOBAL_HEADER {
            debug!("skipping {} record", PAX_GLOBAL_HEADER);
            continue;
        }

        let relative =
            clean_relative(&raw).ok_or_else(|| ExtractError::PathTraversal { entry: shown.clone() })?;
        let mut components = relative.components();
        let first = match components.next() {
            Some(c) => c.as_os_str().to_string_lossy().into_owned(),
            None => continue, // "./"
        };
        if components.next().is_none() && !kind.is_dir() {
            return Err(ExtractError::NoTopLevelDir(archive.to_path_buf()));
        }

        match &top {
            None => top = Some(first),
            Some(existing) if *existing == first => {}
            Some(existing) => {
                return Err(ExtractError::MultipleTopLevelDirs {
                    archive: archive.to_path_buf(),
                    first: existing.clone(),
                    second: first,
                });
            }
        }

        if relative.ancestors().skip(1).any(|a| symlinks.contains(a)) {
            return Err(ExtractError::PathTraversal { entry: shown });
        }

        if kind.is_symlink() || kind.is_hard_link() {
            let target = entry
                .link_name()
                .map_err(io_err)?
                .map(|t| t.into_owned())
                .unwrap_or_default();
            // symlinks resolve from their own directory, hard links from the root
            let from = if kind.is_symlink() {
                relative.parent().unwrap_or(Path::new(""))
            } else {
                Path::new("")
            };
            if !link_stays_inside(from, &target, &symlinks) {
                return Err(ExtractError::PathTraversal { entry: shown });
            }
        }

        if matches!(
            kind,
            EntryType::Block | EntryType::Char | EntryType::Fifo
        ) {
            continue;
        }

        let unpacked = entry
            .unpack_in(destination)
            .map_err(|source| ExtractError::Io {
                path: destination.join(&relative),
                source,
            })?;
        if !unpacked {
            return Err(ExtractError::PathTraversal { entry: shown });
        }
        if kind.is_symlink() {
            symlinks.insert(relative);
        }
        written += 1;
    }

    let top = top.ok_or_else(|| ExtractError::NoTopLevelDir(archive.to_path_buf()))?;
    debug!(
        "extracted {} entries from {} into {}/{}",
        written,
        archive.display(),
        destination.display(),
        top
    );
    Ok(top)
}

/// Strips `.` components; `None` for absolute paths or any `..`.
fn clean_relative(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Whether `target`, resolved from the directory `from`, stays inside the
/// root. Passing through one of `symlinks` on the way counts as leaving it.
fn link_stays_inside(from: &Path, target: &Path, symlinks: &HashSet<PathBuf>) -> bool {
    let mut depth = PathBuf::new();
    for component in from.components() {
        depth.push(component);
    }
    for component in target.components() {
        if symlinks.contains(&depth) {
            return false;
        }
        match component {
            Component::Normal(part) => depth.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !depth.pop() {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}
