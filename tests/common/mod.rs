#![allow(dead_code)]

use std::fs;
use std::path::Path;

use hip_patcher::archive::{AssetDebug, AssetRecord, Layer, PackInfo};
use hip_patcher::{Archive, ArchiveCodec, AssetType, HipCodec};

pub fn record(id: u32, name: &str, data: &[u8]) -> AssetRecord {
    AssetRecord {
        id,
        asset_type: AssetType::new("SND"),
        flags: 0x2,
        plus_value: 0,
        debug: AssetDebug {
            alignment: 4,
            name: name.to_string(),
            filename: format!("{}.wav", name),
            checksum: 0x5150,
        },
        data: data.to_vec(),
    }
}

pub fn archive(assets: Vec<AssetRecord>, layers: Vec<Vec<u32>>) -> Archive {
    let mut archive = Archive {
        pack: PackInfo {
            created_string: "Tue Oct 14 12:00:00 2003".to_string(),
            ..Default::default()
        },
        assets,
        layers: layers
            .into_iter()
            .enumerate()
            .map(|(i, asset_ids)| Layer {
                layer_type: i as u32,
                asset_ids,
                debug: -1,
            })
            .collect(),
    };
    archive.sync_counts();
    archive
}

pub fn write_archive(path: &Path, archive: &Archive) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, HipCodec.encode(archive).unwrap()).unwrap();
}

pub fn read_archive(path: &Path) -> Archive {
    HipCodec.decode(&fs::read(path).unwrap()).unwrap()
}

pub fn create_dir_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (rel_path, content) in files {
        let full = root.join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, content).unwrap();
    }
}

pub fn collect_dir_tree(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut entries = Vec::new();
    collect_recursive(root, root, &mut entries);
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn collect_recursive(root: &Path, current: &Path, entries: &mut Vec<(String, Vec<u8>)>) {
    let mut dir_entries: Vec<_> = fs::read_dir(current).unwrap().collect::<Result<_, _>>().unwrap();
    dir_entries.sort_by_key(|e| e.file_name());

    for entry in dir_entries {
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .unwrap()
            .to_str()
            .unwrap()
            .replace('\\', "/")
            .to_lowercase();

        if path.is_dir() {
            collect_recursive(root, &path, entries);
        } else {
            entries.push((rel, fs::read(&path).unwrap()));
        }
    }
}

pub fn copy_dir_recursive(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir_recursive(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Original and modded versions of one level archive:
/// asset 1 unchanged, asset 2 deleted, asset 3 added, asset 4 modified.
pub fn level_pair() -> (Archive, Archive) {
    let original = archive(
        vec![
            record(1, "a", b"aaaa"),
            record(4, "d", b"dddd-v1"),
            record(2, "b", b"bb"),
        ],
        vec![vec![1, 4], vec![2]],
    );
    let modded = archive(
        vec![
            record(1, "a", b"aaaa"),
            record(4, "d", b"dddd-v2-longer"),
            record(3, "c", b"ccc"),
        ],
        vec![vec![1, 4], vec![3]],
    );
    (original, modded)
}
