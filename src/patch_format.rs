use crate::archive::{AssetDebug, AssetRecord, AssetType};

pub const MAGIC: &[u8; 4] = b"PIPA";

/// Every list in a patch is prefixed by a signed 16-bit count.
pub const MAX_ENTRIES: usize = i16::MAX as usize;

/// Layer index stored for an asset that no layer lists.
pub const NO_LAYER: i16 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChangeKind::Added => "ADD",
            ChangeKind::Modified => "MODIFY",
            ChangeKind::Deleted => "DELETE",
        })
    }
}

/// Whole-file replacement payload. `path` is root-relative, lower-cased, `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub data: Vec<u8>,
}

/// Full asset record as carried by added and modified asset ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub id: u32,
    pub name: String,
    pub source_filename: String,
    pub asset_type: AssetType,
    pub layer: i16,
    pub flags: u32,
    pub alignment: i32,
    pub checksum: i32,
    pub data: Vec<u8>,
}

impl AssetEntry {
    pub fn from_record(record: &AssetRecord, layer: i16) -> Self {
        Self {
            id: record.id,
            name: record.debug.name.clone(),
            source_filename: record.debug.filename.clone(),
            asset_type: record.asset_type,
            layer,
            flags: record.flags,
            alignment: record.debug.alignment,
            checksum: record.debug.checksum,
            data: record.data.clone(),
        }
    }

    /// Build the archive record this entry describes. The checksum is copied, never recomputed.
    pub fn to_record(&self) -> AssetRecord {
        AssetRecord {
            id: self.id,
            asset_type: self.asset_type,
            flags: self.flags,
            plus_value: 0,
            debug: AssetDebug {
                alignment: self.alignment,
                name: self.name.clone(),
                filename: self.source_filename.clone(),
                checksum: self.checksum,
            },
            data: self.data.clone(),
        }
    }

    pub fn to_ref(&self) -> AssetRef {
        AssetRef {
            id: self.id,
            name: self.name.clone(),
            layer: self.layer,
        }
    }
}

/// Enough to locate an asset for removal; not enough to recreate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub id: u32,
    pub name: String,
    pub layer: i16,
}

/// Asset-level changes to one archive file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveOp {
    pub path: String,
    pub added: Vec<AssetEntry>,
    pub modified: Vec<AssetEntry>,
    pub deleted: Vec<AssetRef>,
}

impl ArchiveOp {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Asset ops in apply order.
    pub fn ops(&self) -> impl Iterator<Item = AssetOp<'_>> {
        self.added
            .iter()
            .map(AssetOp::Added)
            .chain(self.modified.iter().map(AssetOp::Modified))
            .chain(self.deleted.iter().map(AssetOp::Deleted))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp<'a> {
    Added(&'a FileEntry),
    Modified(&'a FileEntry),
    Deleted(&'a str),
}

impl FileOp<'_> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            FileOp::Added(_) => ChangeKind::Added,
            FileOp::Modified(_) => ChangeKind::Modified,
            FileOp::Deleted(_) => ChangeKind::Deleted,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileOp::Added(f) | FileOp::Modified(f) => &f.path,
            FileOp::Deleted(path) => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOp<'a> {
    Added(&'a AssetEntry),
    Modified(&'a AssetEntry),
    Deleted(&'a AssetRef),
}

impl AssetOp<'_> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            AssetOp::Added(_) => ChangeKind::Added,
            AssetOp::Modified(_) => ChangeKind::Modified,
            AssetOp::Deleted(_) => ChangeKind::Deleted,
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            AssetOp::Added(a) | AssetOp::Modified(a) => a.id,
            AssetOp::Deleted(d) => d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AssetOp::Added(a) | AssetOp::Modified(a) => &a.name,
            AssetOp::Deleted(d) => &d.name,
        }
    }

    pub fn data(&self) -> Option<&[u8]> {
        match self {
            AssetOp::Added(a) | AssetOp::Modified(a) => Some(&a.data),
            AssetOp::Deleted(_) => None,
        }
    }
}

/// A serializable transaction over a data tree. Bucket order is apply order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Patch {
    /// Informational: set on patches produced by a commit.
    pub is_uninstall: bool,
    pub added_files: Vec<FileEntry>,
    pub modified_files: Vec<FileEntry>,
    pub deleted_files: Vec<String>,
    pub archives: Vec<ArchiveOp>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added_files.is_empty()
            && self.modified_files.is_empty()
            && self.deleted_files.is_empty()
            && self.archives.is_empty()
    }

    /// File ops in apply order.
    pub fn file_ops(&self) -> impl Iterator<Item = FileOp<'_>> {
        self.added_files
            .iter()
            .map(FileOp::Added)
            .chain(self.modified_files.iter().map(FileOp::Modified))
            .chain(self.deleted_files.iter().map(|p| FileOp::Deleted(p.as_str())))
    }

    pub fn summary(&self) -> PatchSummary {
        let mut summary = PatchSummary {
            files_added: self.added_files.len(),
            files_modified: self.modified_files.len(),
            files_deleted: self.deleted_files.len(),
            archives_modified: self.archives.len(),
            ..Default::default()
        };
        for archive in &self.archives {
            summary.assets_added += archive.added.len();
            summary.assets_modified += archive.modified.len();
            summary.assets_deleted += archive.deleted.len();
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchSummary {
    pub files_added: usize,
    pub files_modified: usize,
    pub files_deleted: usize,
    pub archives_modified: usize,
    pub assets_added: usize,
    pub assets_modified: usize,
    pub assets_deleted: usize,
}
