use std::path::Path;

use crate::archive::ArchiveCodec;
use crate::archive_diff;
use crate::compare;
use crate::config::PatcherConfig;
use crate::error::{Error, Result};
use crate::observer::PatchObserver;
use crate::patch_format::{ChangeKind, FileEntry, Patch, PatchSummary};
use crate::util::{self, TrackedFile};

fn decode_file(codec: &dyn ArchiveCodec, file: &TrackedFile) -> Result<crate::archive::Archive> {
    let raw = util::mmap_file(&file.full_path)?;
    codec.decode(&raw).map_err(|e| match e {
        Error::Format(msg) => Error::Format(format!("{}: {}", file.full_path.display(), msg)),
        other => other,
    })
}

/// Build a patch that turns the tracked files of `old_dir` into those of `new_dir`.
///
/// Paths are compared case-folded. Archives present on both sides are diffed
/// per asset; every other tracked file is compared byte for byte and carried
/// whole when it differs.
pub fn diff_trees(
    old_dir: &Path,
    new_dir: &Path,
    codec: &dyn ArchiveCodec,
    config: &PatcherConfig,
    observer: &mut dyn PatchObserver,
) -> Result<Patch> {
    let old_files = util::walk_tracked(old_dir, config)?;
    let new_files = util::walk_tracked(new_dir, config)?;
    log::debug!(
        "Tracked files: {} in {}, {} in {}",
        old_files.len(),
        old_dir.display(),
        new_files.len(),
        new_dir.display()
    );

    let mut patch = Patch::new();

    // Stage 1: paths on both sides
    for (path, old_file) in &old_files {
        let Some(new_file) = new_files.get(path) else {
            continue;
        };

        if config.is_archive(Path::new(path)) {
            let old_archive = decode_file(codec, old_file)?;
            let new_archive = decode_file(codec, new_file)?;
            let op = archive_diff::diff_archives(path, &old_archive, &new_archive)?;
            if op.is_empty() {
                continue;
            }

            observer.file(ChangeKind::Modified, path);
            for asset in op.ops() {
                observer.asset(asset.kind(), path, asset.id(), asset.name());
            }
            patch.archives.push(op);
        } else if old_file.size != new_file.size
            || !compare::files_equal(&old_file.full_path, &new_file.full_path)?
        {
            patch.modified_files.push(FileEntry {
                path: path.clone(),
                data: util::read_file(&new_file.full_path)?,
            });
            observer.file(ChangeKind::Modified, path);
        }
    }

    // Stage 2: gone from the new tree
    for path in old_files.keys() {
        if !new_files.contains_key(path) {
            patch.deleted_files.push(path.clone());
            observer.file(ChangeKind::Deleted, path);
        }
    }

    // Stage 3: new in the new tree
    for (path, new_file) in &new_files {
        if !old_files.contains_key(path) {
            patch.added_files.push(FileEntry {
                path: path.clone(),
                data: util::read_file(&new_file.full_path)?,
            });
            observer.file(ChangeKind::Added, path);
        }
    }

    Ok(patch)
}

/// Diff two trees and write the resulting patch to `output`.
pub fn create_patch(
    old_dir: &Path,
    new_dir: &Path,
    output: &Path,
    codec: &dyn ArchiveCodec,
    config: &PatcherConfig,
    observer: &mut dyn PatchObserver,
) -> Result<PatchSummary> {
    let patch = diff_trees(old_dir, new_dir, codec, config, observer)?;
    patch.save(output)?;
    Ok(patch.summary())
}
