//! PIPA patch file reading and writing.
//!
//! Layout (little-endian): `"PIPA"`, an uninstall flag byte, then four counted
//! lists: added files, modified files, deleted files, archives. Counts are
//! `int16`, payload lengths `int32`, strings NUL-terminated UTF-8.

use byteorder::LittleEndian;
use std::path::Path;

use crate::archive::AssetType;
use crate::byte_io::{Reader, Writer};
use crate::error::{Error, Result};
use crate::patch_format::{ArchiveOp, AssetEntry, AssetRef, FileEntry, Patch, MAGIC, MAX_ENTRIES};
use crate::util;

type PatchReader<'a> = Reader<'a, LittleEndian>;
type PatchWriter = Writer<LittleEndian>;

fn check_count(list: &str, count: usize) -> Result<()> {
    if count > MAX_ENTRIES {
        return Err(Error::capacity(list, count, MAX_ENTRIES));
    }
    Ok(())
}

fn check_len(what: &str, len: usize) -> Result<()> {
    if len > i32::MAX as usize {
        return Err(Error::capacity(what, len, i32::MAX as usize));
    }
    Ok(())
}

fn check_str(s: &str) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(Error::EmbeddedNul(s.to_string()));
    }
    Ok(())
}

fn check_asset(asset: &AssetEntry) -> Result<()> {
    check_str(&asset.name)?;
    check_str(&asset.source_filename)?;
    check_len("asset data", asset.data.len())
}

impl Patch {
    /// Reject anything the fixed-width PIPA fields cannot represent.
    ///
    /// Runs before a single byte is produced so a failing patch never leaves a
    /// truncated file behind.
    pub fn validate(&self) -> Result<()> {
        check_count("added files", self.added_files.len())?;
        check_count("modified files", self.modified_files.len())?;
        check_count("deleted files", self.deleted_files.len())?;
        check_count("archives", self.archives.len())?;

        for file in self.added_files.iter().chain(&self.modified_files) {
            check_str(&file.path)?;
            check_len("file data", file.data.len())?;
        }
        for path in &self.deleted_files {
            check_str(path)?;
        }
        for archive in &self.archives {
            check_str(&archive.path)?;
            check_count(&format!("{} added assets", archive.path), archive.added.len())?;
            check_count(&format!("{} modified assets", archive.path), archive.modified.len())?;
            check_count(&format!("{} deleted assets", archive.path), archive.deleted.len())?;
            for asset in archive.added.iter().chain(&archive.modified) {
                check_asset(asset)?;
            }
            for asset in &archive.deleted {
                check_str(&asset.name)?;
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let mut w = PatchWriter::new();
        w.bytes(MAGIC);
        w.u8(u8::from(self.is_uninstall));

        write_files(&mut w, &self.added_files)?;
        write_files(&mut w, &self.modified_files)?;

        w.i16(self.deleted_files.len() as i16);
        for path in &self.deleted_files {
            w.cstr(path)?;
        }

        w.i16(self.archives.len() as i16);
        for archive in &self.archives {
            write_archive(&mut w, archive)?;
        }

        Ok(w.into_inner())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Patch> {
        let mut r = PatchReader::new(data);

        if data.len() < MAGIC.len() || &r.tag()? != MAGIC {
            return Err(Error::format("Not a valid PIPA file: missing magic header"));
        }

        let is_uninstall = match r.u8()? {
            0 => false,
            1 => true,
            other => return Err(Error::format(format!("invalid uninstall flag {}", other))),
        };

        let added_files = read_files(&mut r, "added files")?;
        let modified_files = read_files(&mut r, "modified files")?;

        let count = read_count(&mut r, "deleted files")?;
        let mut deleted_files = Vec::with_capacity(count);
        for _ in 0..count {
            deleted_files.push(r.cstr()?);
        }

        let count = read_count(&mut r, "archives")?;
        let mut archives = Vec::with_capacity(count);
        for _ in 0..count {
            archives.push(read_archive(&mut r)?);
        }

        if !r.is_empty() {
            return Err(Error::format(format!(
                "{} trailing bytes after patch body",
                r.remaining()
            )));
        }

        Ok(Patch {
            is_uninstall,
            added_files,
            modified_files,
            deleted_files,
            archives,
        })
    }

    pub fn load(path: &Path) -> Result<Patch> {
        let raw = util::mmap_file(path)?;
        Patch::from_bytes(&raw)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        util::write_atomic(path, &bytes)
    }
}

fn write_files(w: &mut PatchWriter, files: &[FileEntry]) -> Result<()> {
    w.i16(files.len() as i16);
    for file in files {
        w.cstr(&file.path)?;
        w.i32(file.data.len() as i32);
        w.bytes(&file.data);
    }
    Ok(())
}

fn write_archive(w: &mut PatchWriter, archive: &ArchiveOp) -> Result<()> {
    w.cstr(&archive.path)?;

    w.i16(archive.added.len() as i16);
    for asset in &archive.added {
        write_asset(w, asset)?;
    }
    w.i16(archive.modified.len() as i16);
    for asset in &archive.modified {
        write_asset(w, asset)?;
    }
    w.i16(archive.deleted.len() as i16);
    for asset in &archive.deleted {
        w.u32(asset.id);
        w.cstr(&asset.name)?;
        w.i16(asset.layer);
    }
    Ok(())
}

fn write_asset(w: &mut PatchWriter, asset: &AssetEntry) -> Result<()> {
    w.u32(asset.id);
    w.cstr(&asset.name)?;
    w.cstr(&asset.source_filename)?;
    w.bytes(asset.asset_type.as_bytes());
    w.i16(asset.layer);
    w.u32(asset.flags);
    w.i32(asset.alignment);
    w.i32(asset.checksum);
    w.i32(asset.data.len() as i32);
    w.bytes(&asset.data);
    Ok(())
}

fn read_count(r: &mut PatchReader<'_>, list: &str) -> Result<usize> {
    let count = r.i16()?;
    usize::try_from(count).map_err(|_| Error::format(format!("negative count {} for {}", count, list)))
}

fn read_data(r: &mut PatchReader<'_>) -> Result<Vec<u8>> {
    let len = r.i32()?;
    let len = usize::try_from(len).map_err(|_| Error::format(format!("negative data length {}", len)))?;
    Ok(r.bytes(len)?.to_vec())
}

fn read_files(r: &mut PatchReader<'_>, list: &str) -> Result<Vec<FileEntry>> {
    let count = read_count(r, list)?;
    let mut files = Vec::with_capacity(count);
    for _ in 0..count {
        let path = r.cstr()?;
        let data = read_data(r)?;
        files.push(FileEntry { path, data });
    }
    Ok(files)
}

fn read_archive(r: &mut PatchReader<'_>) -> Result<ArchiveOp> {
    let path = r.cstr()?;

    let count = read_count(r, "added assets")?;
    let mut added = Vec::with_capacity(count);
    for _ in 0..count {
        added.push(read_asset(r)?);
    }

    let count = read_count(r, "modified assets")?;
    let mut modified = Vec::with_capacity(count);
    for _ in 0..count {
        modified.push(read_asset(r)?);
    }

    let count = read_count(r, "deleted assets")?;
    let mut deleted = Vec::with_capacity(count);
    for _ in 0..count {
        deleted.push(AssetRef {
            id: r.u32()?,
            name: r.cstr()?,
            layer: r.i16()?,
        });
    }

    Ok(ArchiveOp {
        path,
        added,
        modified,
        deleted,
    })
}

fn read_asset(r: &mut PatchReader<'_>) -> Result<AssetEntry> {
    Ok(AssetEntry {
        id: r.u32()?,
        name: r.cstr()?,
        source_filename: r.cstr()?,
        asset_type: AssetType(r.tag()?),
        layer: r.i16()?,
        flags: r.u32()?,
        alignment: r.i32()?,
        checksum: r.i32()?,
        data: read_data(r)?,
    })
}
