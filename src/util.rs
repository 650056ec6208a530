use memmap2::Mmap;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::PatcherConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct TrackedFile {
    /// Lower-cased, `/`-separated path relative to the walked root.
    pub relative_path: String,
    pub full_path: PathBuf,
    /// File size in bytes. Free from the OS directory scan.
    pub size: u64,
}

/// Walk a directory tree and collect every file the config tracks, keyed by
/// case-folded relative path.
///
/// Folding happens once here so later comparisons and the stored patch paths are
/// correct on case-insensitive filesystems. Two files that fold to the same key
/// are reported as [`Error::PathCollision`].
pub fn walk_tracked(root: &Path, config: &PatcherConfig) -> Result<BTreeMap<String, TrackedFile>> {
    let root = root.canonicalize().map_err(|e| Error::io(root, e))?;

    let mut files = BTreeMap::new();

    for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let full_path = entry.path().to_path_buf();
        if !config.is_tracked(&full_path) {
            continue;
        }

        let relative = full_path
            .strip_prefix(&root)
            .map_err(|_| Error::format(format!("{} escapes the walked root", full_path.display())))?;
        let relative_path = relative
            .to_str()
            .ok_or_else(|| Error::format(format!("Non-UTF8 path: {}", relative.display())))?
            .replace('\\', "/")
            .to_lowercase();

        let size = entry.metadata()?.len();

        if files.contains_key(&relative_path) {
            return Err(Error::PathCollision {
                path: relative_path,
            });
        }
        files.insert(
            relative_path.clone(),
            TrackedFile {
                relative_path,
                full_path,
                size,
            },
        );
    }

    Ok(files)
}

/// Map a stored patch path onto `root`, matching each component against the
/// existing directory entries ignoring ASCII case.
///
/// Components that do not exist yet keep the stored spelling. Absolute paths and
/// `..` components are rejected so a patch can never reach outside `root`.
pub fn resolve_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut current = root.to_path_buf();

    for component in relative.split(['/', '\\']).filter(|c| !c.is_empty()) {
        match Path::new(component).components().next() {
            Some(Component::Normal(_)) => {}
            _ => return Err(Error::format(format!("unsafe path in patch: {}", relative))),
        }

        let exact = current.join(component);
        if exact.exists() {
            current = exact;
            continue;
        }

        let folded = std::fs::read_dir(&current).ok().and_then(|entries| {
            entries
                .filter_map(|e| e.ok())
                .find(|e| {
                    e.file_name()
                        .to_str()
                        .is_some_and(|name| name.eq_ignore_ascii_case(component))
                })
                .map(|e| e.path())
        });
        current = folded.unwrap_or(exact);
    }

    if current == root {
        return Err(Error::format(format!("empty path in patch: {:?}", relative)));
    }
    Ok(current)
}

/// Memory-map a file for read-only access.
///
/// # Safety
/// The mapping is read-only. Callers must not concurrently truncate or replace
/// the underlying file while the `Mmap` is live.
pub fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    // SAFETY: We only read from this mapping; the tool assumes exclusive access to the tree.
    unsafe { Mmap::map(&file).map_err(|e| Error::io(path, e)) }
}

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::io(path, e))
}

/// Replace `path` with `data` through a sibling temp file, creating parent
/// directories as needed. Readers see either the old or the new content.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    tmp.write_all(data).map_err(|e| Error::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Compute the BLAKE3 hash of a byte slice.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// First `n` bytes of a digest as lowercase hex.
pub fn short_hex(digest: &[u8], n: usize) -> String {
    digest.iter().take(n).map(|b| format!("{:02x}", b)).collect()
}
