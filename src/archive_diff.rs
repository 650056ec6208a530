//! Asset-level diff between two decoded archives.
//!
//! Traversal follows asset table order, never id order: modified and deleted ops
//! come out in the old archive's table order, added ops in the new archive's.

use crate::archive::Archive;
use crate::compare;
use crate::error::{Error, Result};
use crate::patch_format::{ArchiveOp, AssetEntry, AssetRef, NO_LAYER};

/// Compare `old` against `new` and collect the ops that turn one into the other.
///
/// Fails on duplicate ids in either table and on any modified or deleted asset
/// that no layer references. An added asset outside every layer is recorded with
/// layer [`NO_LAYER`].
pub fn diff_archives(path: &str, old: &Archive, new: &Archive) -> Result<ArchiveOp> {
    let old_index = old.index_by_id()?;
    let new_index = new.index_by_id()?;

    let mut op = ArchiveOp::new(path);

    for old_asset in &old.assets {
        match new_index.get(&old_asset.id) {
            Some(&pos) => {
                let new_asset = &new.assets[pos];
                if !compare::bytes_equal(&old_asset.data, &new_asset.data) {
                    let layer = new.layer_index(new_asset)?;
                    op.modified.push(AssetEntry::from_record(new_asset, layer));
                }
            }
            None => {
                op.deleted.push(AssetRef {
                    id: old_asset.id,
                    name: old_asset.debug.name.clone(),
                    layer: old.layer_index(old_asset)?,
                });
            }
        }
    }

    for new_asset in &new.assets {
        if !old_index.contains_key(&new_asset.id) {
            let layer = match new.layer_index(new_asset) {
                Err(Error::AssetNotInLayer { .. }) => NO_LAYER,
                other => other?,
            };
            op.added.push(AssetEntry::from_record(new_asset, layer));
        }
    }

    Ok(op)
}
