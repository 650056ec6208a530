mod common;

use proptest::prelude::*;

use common::*;
use hip_patcher::apply::commit;
use hip_patcher::archive::AssetRecord;
use hip_patcher::archive_diff::diff_archives;
use hip_patcher::{Archive, FileEntry, HipCodec, NullObserver, Patch, PatcherConfig};

const LAYERS: u8 = 3;

#[derive(Debug, Clone)]
enum Fate {
    Keep,
    Modify,
    Delete,
}

fn fate_strategy() -> impl Strategy<Value = Fate> {
    prop_oneof![Just(Fate::Keep), Just(Fate::Modify), Just(Fate::Delete)]
}

fn asset_strategy() -> impl Strategy<Value = (u8, Vec<u8>)> {
    (0u8..LAYERS, prop::collection::vec(any::<u8>(), 0..24))
}

fn build(assets: Vec<(u8, AssetRecord)>) -> Archive {
    let mut layers = vec![Vec::new(); LAYERS as usize];
    for (layer, record) in &assets {
        layers[*layer as usize].push(record.id);
    }
    archive(assets.into_iter().map(|(_, r)| r).collect(), layers)
}

fn sorted(archive: &Archive) -> (Vec<AssetRecord>, Vec<Vec<u32>>) {
    let mut assets = archive.assets.clone();
    assets.sort_by_key(|a| a.id);
    let layers = archive
        .layers
        .iter()
        .map(|l| {
            let mut ids = l.asset_ids.clone();
            ids.sort_unstable();
            ids
        })
        .collect();
    (assets, layers)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn commit_reaches_new_archive_and_inverse_restores_old(
        existing in prop::collection::vec((asset_strategy(), fate_strategy()), 0..12),
        added in prop::collection::vec(asset_strategy(), 0..5),
    ) {
        let mut old_assets = Vec::new();
        let mut new_assets = Vec::new();
        for (i, ((layer, data), fate)) in existing.into_iter().enumerate() {
            let id = 0x1000 + i as u32;
            let old = record(id, &format!("asset{i}"), &data);
            match fate {
                Fate::Keep => new_assets.push((layer, old.clone())),
                Fate::Modify => {
                    let mut changed = data.clone();
                    changed.push(0xEE);
                    new_assets.push((layer, record(id, &format!("asset{i}"), &changed)));
                }
                Fate::Delete => {}
            }
            old_assets.push((layer, old));
        }
        for (i, (layer, data)) in added.into_iter().enumerate() {
            let id = 0x9000 + i as u32;
            new_assets.push((layer, record(id, &format!("new{i}"), &data)));
        }

        let old = build(old_assets);
        let new = build(new_assets);

        let op = diff_archives("level.hip", &old, &new).unwrap();
        let mut patch = Patch::new();
        patch.archives.push(op);
        let patch = Patch::from_bytes(&patch.to_bytes().unwrap()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.hip");
        write_archive(&path, &old);

        let config = PatcherConfig::default();
        let inverse = commit(&patch, dir.path(), &HipCodec, &config, &mut NullObserver).unwrap();
        let committed = read_archive(&path);
        prop_assert_eq!(&committed.assets, &new.assets);
        prop_assert_eq!(&committed.layers, &new.layers);

        commit(&inverse, dir.path(), &HipCodec, &config, &mut NullObserver).unwrap();
        prop_assert_eq!(sorted(&read_archive(&path)), sorted(&old));
    }

    #[test]
    fn patch_bytes_preserve_every_field(
        is_uninstall in any::<bool>(),
        files in prop::collection::vec(("[a-z]{1,8}(/[a-z]{1,8})?\\.ini", prop::collection::vec(any::<u8>(), 0..32)), 0..6),
        deleted in prop::collection::vec("[a-z]{1,8}\\.hip", 0..4),
    ) {
        let mut patch = Patch::new();
        patch.is_uninstall = is_uninstall;
        for (i, (path, data)) in files.into_iter().enumerate() {
            let entry = FileEntry { path, data };
            if i % 2 == 0 {
                patch.added_files.push(entry);
            } else {
                patch.modified_files.push(entry);
            }
        }
        patch.deleted_files = deleted;

        let decoded = Patch::from_bytes(&patch.to_bytes().unwrap()).unwrap();
        prop_assert_eq!(decoded, patch);
    }
}
