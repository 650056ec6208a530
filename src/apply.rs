use std::collections::HashMap;
use std::path::Path;

use crate::archive::{Archive, ArchiveCodec, AssetRecord};
use crate::config::{MissingAssetPolicy, PatcherConfig};
use crate::error::{Error, Result};
use crate::observer::PatchObserver;
use crate::patch_format::{ArchiveOp, AssetEntry, ChangeKind, FileEntry, Patch, PatchSummary};
use crate::util;

/// Apply `patch` to the tree at `root` and return the patch that undoes it.
///
/// Buckets run strictly in order: added files, modified files, deleted files,
/// archives. The inverse is built from what is actually on disk at each step.
/// Two cases cannot be undone: an added file that overwrote an existing one
/// (its old content is not kept) and a modified file that did not exist (the
/// inverse does not remove it).
///
/// I/O errors abort the whole commit; operations already applied stay applied.
pub fn commit(
    patch: &Patch,
    root: &Path,
    codec: &dyn ArchiveCodec,
    config: &PatcherConfig,
    observer: &mut dyn PatchObserver,
) -> Result<Patch> {
    let root = root.canonicalize().map_err(|e| Error::io(root, e))?;

    let mut inverse = Patch {
        is_uninstall: true,
        ..Default::default()
    };

    // 1. Added files
    for file in &patch.added_files {
        let full = util::resolve_path(&root, &file.path)?;
        util::write_atomic(&full, &file.data)?;
        inverse.deleted_files.push(file.path.clone());
        observer.file(ChangeKind::Added, &file.path);
    }

    // 2. Modified files: back up the current content before overwriting
    for file in &patch.modified_files {
        let full = util::resolve_path(&root, &file.path)?;
        if full.exists() {
            inverse.modified_files.push(FileEntry {
                path: file.path.clone(),
                data: util::read_file(&full)?,
            });
        }
        util::write_atomic(&full, &file.data)?;
        observer.file(ChangeKind::Modified, &file.path);
    }

    // 3. Deleted files: missing ones are a silent no-op
    for path in &patch.deleted_files {
        let full = util::resolve_path(&root, path)?;
        if !full.exists() {
            log::debug!("Nothing to delete at {}", full.display());
            continue;
        }
        let data = util::read_file(&full)?;
        std::fs::remove_file(&full).map_err(|e| Error::io(&full, e))?;
        inverse.added_files.push(FileEntry {
            path: path.clone(),
            data,
        });
        observer.file(ChangeKind::Deleted, path);
    }

    // 4. Archives
    for op in &patch.archives {
        let backup = commit_archive(op, &root, codec, config, observer)?;
        inverse.archives.push(backup);
    }

    Ok(inverse)
}

/// Remove the record at `pos` and shift every later position in `index` down.
fn remove_indexed(archive: &mut Archive, index: &mut HashMap<u32, usize>, pos: usize) -> AssetRecord {
    let old = archive.assets.remove(pos);
    index.remove(&old.id);
    for p in index.values_mut() {
        if *p > pos {
            *p -= 1;
        }
    }
    old
}

fn commit_archive(
    op: &ArchiveOp,
    root: &Path,
    codec: &dyn ArchiveCodec,
    config: &PatcherConfig,
    observer: &mut dyn PatchObserver,
) -> Result<ArchiveOp> {
    let full = util::resolve_path(root, &op.path)?;
    // Scope the mapping so it is released before the archive is rewritten in place.
    let mut archive = {
        let raw = util::mmap_file(&full)?;
        codec.decode(&raw)?
    };
    let mut index = archive.index_by_id()?;
    let mut backup = ArchiveOp::new(op.path.clone());

    observer.file(ChangeKind::Modified, &op.path);

    for asset in &op.added {
        if index.contains_key(&asset.id) {
            return Err(Error::DuplicateAssetId { id: asset.id });
        }
        match archive.layer_mut(asset.layer) {
            Ok(layer) => layer.asset_ids.push(asset.id),
            Err(e) => log::warn!(
                "{}: added asset {:08X} left in no layer: {}",
                op.path,
                asset.id,
                e
            ),
        }
        index.insert(asset.id, archive.assets.len());
        archive.assets.push(asset.to_record());

        backup.deleted.push(asset.to_ref());
        observer.asset(ChangeKind::Added, &op.path, asset.id, &asset.name);
    }

    'ops: {
        for asset in &op.modified {
            let Some(&pos) = index.get(&asset.id) else {
                observer.asset_missing(ChangeKind::Modified, &op.path, asset.id, &asset.name);
                match config.missing_asset {
                    MissingAssetPolicy::StopArchive => break 'ops,
                    MissingAssetPolicy::SkipOp => continue,
                }
            };

            let current_layer = archive.layer_of(asset.id);
            let backup_layer = match current_layer {
                Some(layer) => i16::try_from(layer)
                    .map_err(|_| Error::capacity("layer table", layer + 1, i16::MAX as usize))?,
                None => asset.layer,
            };
            if current_layer.is_some() && backup_layer != asset.layer {
                let target_exists = usize::try_from(asset.layer).is_ok_and(|i| i < archive.layers.len());
                if target_exists {
                    archive.unlink(asset.id);
                    archive.layer_mut(asset.layer)?.asset_ids.push(asset.id);
                } else {
                    log::warn!(
                        "{}: asset {:08X} stays in layer {}, the archive has no layer {}",
                        op.path,
                        asset.id,
                        backup_layer,
                        asset.layer
                    );
                }
            }

            let mut record = asset.to_record();
            record.plus_value = archive.assets[pos].plus_value;
            let old = std::mem::replace(&mut archive.assets[pos], record);

            backup.modified.push(AssetEntry::from_record(&old, backup_layer));
            observer.asset(ChangeKind::Modified, &op.path, asset.id, &asset.name);
        }

        for asset in &op.deleted {
            let Some(&pos) = index.get(&asset.id) else {
                observer.asset_missing(ChangeKind::Deleted, &op.path, asset.id, &asset.name);
                match config.missing_asset {
                    MissingAssetPolicy::StopArchive => break 'ops,
                    MissingAssetPolicy::SkipOp => continue,
                }
            };

            let old = remove_indexed(&mut archive, &mut index, pos);
            let layer = match archive.unlink(old.id) {
                Some(layer) => i16::try_from(layer)
                    .map_err(|_| Error::capacity("layer table", layer + 1, i16::MAX as usize))?,
                None => {
                    log::warn!(
                        "{}: deleted asset {:08X} was in no layer, recording layer {}",
                        op.path,
                        old.id,
                        asset.layer
                    );
                    asset.layer
                }
            };

            backup.added.push(AssetEntry::from_record(&old, layer));
            observer.asset(ChangeKind::Deleted, &op.path, asset.id, &asset.name);
        }
    }

    archive.sync_counts();
    let bytes = codec.encode(&archive)?;
    util::write_atomic(&full, &bytes)?;

    Ok(backup)
}

/// Load the patch at `patch_path`, commit it to `target_dir`, and optionally
/// save the inverse to `uninstall_out`.
///
/// An uninstall patch never produces another uninstall file.
pub fn apply_patch(
    target_dir: &Path,
    patch_path: &Path,
    uninstall_out: Option<&Path>,
    codec: &dyn ArchiveCodec,
    config: &PatcherConfig,
    observer: &mut dyn PatchObserver,
) -> Result<PatchSummary> {
    let patch = Patch::load(patch_path)?;
    let inverse = commit(&patch, target_dir, codec, config, observer)?;

    match uninstall_out {
        Some(out) if patch.is_uninstall => {
            log::warn!(
                "{} is an uninstall patch; not writing {}",
                patch_path.display(),
                out.display()
            );
        }
        Some(out) => {
            inverse.save(out)?;
            log::info!("Uninstall patch saved to {}", out.display());
        }
        None => {}
    }

    Ok(patch.summary())
}
