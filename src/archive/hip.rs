//! HIP/HOP container codec.
//!
//! A HIP file is a tree of blocks: a 4-byte ASCII id, a big-endian u32 body size,
//! then the body. The top level is always `HIPA`, `PACK`, `DICT`, `STRM`:
//!
//! ```text
//! HIPA
//! PACK  PVER PFLG PCNT PCRT PMOD [PLAT]
//! DICT  ATOC (AINF, AHDR{ADBG}*)  LTOC (LINF, LHDR{LDBG}*)
//! STRM  DHDR DPAK
//! ```
//!
//! `AHDR` records hold absolute file offsets into the `DPAK` payload area, so
//! `encode` always lays out the stream from scratch.

use byteorder::BigEndian;
use std::collections::HashSet;

use super::{Archive, ArchiveCodec, AssetDebug, AssetRecord, AssetType, Layer, PackInfo};
use crate::byte_io::{Reader, Writer};
use crate::error::{Error, Result};

type HipReader<'a> = Reader<'a, BigEndian>;
type HipWriter = Writer<BigEndian>;

const STREAM_PAD: u8 = 0x33;
/// Payload area starts on this boundary.
const STREAM_ALIGN: usize = 0x20;
const MAX_ALIGNMENT: i32 = 0x1_0000;

#[derive(Debug, Clone, Copy, Default)]
pub struct HipCodec;

impl ArchiveCodec for HipCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Archive> {
        decode_archive(bytes)
    }

    fn encode(&self, archive: &Archive) -> Result<Vec<u8>> {
        encode_archive(archive)
    }
}

fn read_block<'a>(r: &mut HipReader<'a>) -> Result<([u8; 4], &'a [u8])> {
    let tag = r.tag()?;
    let size = r.u32()? as usize;
    let body = r.bytes(size).map_err(|_| {
        Error::format(format!(
            "block {} claims {} bytes but the archive ends first",
            String::from_utf8_lossy(&tag),
            size
        ))
    })?;
    Ok((tag, body))
}

fn expect_block<'a>(r: &mut HipReader<'a>, want: &[u8; 4]) -> Result<&'a [u8]> {
    let (tag, body) = read_block(r)?;
    if &tag != want {
        return Err(Error::format(format!(
            "expected {} block, found {}",
            String::from_utf8_lossy(want),
            String::from_utf8_lossy(&tag)
        )));
    }
    Ok(body)
}

/// NUL-terminated string padded with a second NUL to an even length.
fn read_padded(r: &mut HipReader<'_>) -> Result<String> {
    let s = r.cstr()?;
    if (s.len() + 1) % 2 == 1 {
        r.skip(1)?;
    }
    Ok(s)
}

fn write_padded(w: &mut HipWriter, s: &str) -> Result<()> {
    w.cstr(s)?;
    if (s.len() + 1) % 2 == 1 {
        w.u8(0);
    }
    Ok(())
}

struct PendingAsset {
    record: AssetRecord,
    offset: usize,
    size: usize,
}

fn decode_archive(bytes: &[u8]) -> Result<Archive> {
    let mut r = HipReader::new(bytes);

    let (tag, _) = read_block(&mut r).map_err(|_| Error::format("not a HIP archive: too short"))?;
    if &tag != b"HIPA" {
        return Err(Error::format("not a HIP archive: missing HIPA block"));
    }

    let pack = decode_pack(expect_block(&mut r, b"PACK")?)?;
    let dict = expect_block(&mut r, b"DICT")?;
    expect_block(&mut r, b"STRM")?;

    let mut d = HipReader::new(dict);
    let pending = decode_atoc(expect_block(&mut d, b"ATOC")?)?;
    let layers = decode_ltoc(expect_block(&mut d, b"LTOC")?)?;

    let mut assets = Vec::with_capacity(pending.len());
    for p in pending {
        let end = p.offset.checked_add(p.size);
        let data = end.and_then(|end| bytes.get(p.offset..end)).ok_or_else(|| {
            Error::format(format!(
                "asset {:#010x} data at {}+{} lies outside the archive",
                p.record.id, p.offset, p.size
            ))
        })?;
        let mut record = p.record;
        record.data = data.to_vec();
        assets.push(record);
    }

    if pack.asset_count as usize != assets.len() {
        log::warn!(
            "PCNT lists {} assets but ATOC holds {}",
            pack.asset_count,
            assets.len()
        );
    }

    Ok(Archive {
        pack,
        assets,
        layers,
    })
}

fn decode_pack(body: &[u8]) -> Result<PackInfo> {
    let mut pack = PackInfo::default();
    let mut r = HipReader::new(body);
    while !r.is_empty() {
        let (tag, body) = read_block(&mut r)?;
        let mut b = HipReader::new(body);
        match &tag {
            b"PVER" => {
                pack.sub_version = b.u32()?;
                pack.client_version = b.u32()?;
                pack.compat_version = b.u32()?;
            }
            b"PFLG" => pack.flags = b.u32()?,
            b"PCNT" => {
                pack.asset_count = b.u32()?;
                pack.layer_count = b.u32()?;
                pack.largest_asset = b.u32()?;
                pack.largest_layer = b.u32()?;
                pack.largest_asset_in_layer = b.u32()?;
            }
            b"PCRT" => {
                pack.created = b.u32()?;
                pack.created_string = read_padded(&mut b)?;
            }
            b"PMOD" => pack.modified = b.u32()?,
            b"PLAT" => pack.platform = Some(body.to_vec()),
            other => log::debug!("Skipping unknown PACK block {}", String::from_utf8_lossy(other)),
        }
    }
    Ok(pack)
}

fn decode_atoc(body: &[u8]) -> Result<Vec<PendingAsset>> {
    let mut r = HipReader::new(body);
    expect_block(&mut r, b"AINF")?;

    let mut assets = Vec::new();
    while !r.is_empty() {
        let mut a = HipReader::new(expect_block(&mut r, b"AHDR")?);
        let id = a.u32()?;
        let asset_type = AssetType(a.tag()?);
        let offset = a.u32()? as usize;
        let size = a.u32()? as usize;
        let plus_value = a.i32()?;
        let flags = a.u32()?;

        let mut g = HipReader::new(expect_block(&mut a, b"ADBG")?);
        let debug = AssetDebug {
            alignment: g.i32()?,
            name: read_padded(&mut g)?,
            filename: read_padded(&mut g)?,
            checksum: g.i32()?,
        };

        assets.push(PendingAsset {
            record: AssetRecord {
                id,
                asset_type,
                flags,
                plus_value,
                debug,
                data: Vec::new(),
            },
            offset,
            size,
        });
    }
    Ok(assets)
}

fn decode_ltoc(body: &[u8]) -> Result<Vec<Layer>> {
    let mut r = HipReader::new(body);
    expect_block(&mut r, b"LINF")?;

    let mut layers = Vec::new();
    while !r.is_empty() {
        let mut l = HipReader::new(expect_block(&mut r, b"LHDR")?);
        let layer_type = l.u32()?;
        let count = l.u32()? as usize;
        if count > l.remaining() / 4 {
            return Err(Error::format(format!("LHDR lists {} ids but is too short", count)));
        }
        let mut asset_ids = Vec::with_capacity(count);
        for _ in 0..count {
            asset_ids.push(l.u32()?);
        }
        let mut g = HipReader::new(expect_block(&mut l, b"LDBG")?);
        layers.push(Layer {
            layer_type,
            asset_ids,
            debug: g.i32()?,
        });
    }
    Ok(layers)
}

fn begin_block(w: &mut HipWriter, tag: &[u8; 4]) -> usize {
    w.bytes(tag);
    let at = w.len();
    w.u32(0);
    at
}

fn end_block(w: &mut HipWriter, at: usize) {
    let size = w.len() - at - 4;
    w.patch_u32(at, size as u32);
}

/// Payload placement: layer order first, then assets no layer references.
fn stream_order(archive: &Archive) -> Vec<usize> {
    let positions: std::collections::HashMap<u32, usize> = archive
        .assets
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id, i))
        .collect();

    let mut placed = HashSet::new();
    let mut order = Vec::with_capacity(archive.assets.len());
    for layer in &archive.layers {
        for id in &layer.asset_ids {
            if let Some(&pos) = positions.get(id) {
                if placed.insert(pos) {
                    order.push(pos);
                }
            }
        }
    }
    for pos in 0..archive.assets.len() {
        if placed.insert(pos) {
            order.push(pos);
        }
    }
    order
}

fn align_up(value: usize, align: usize) -> usize {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

fn encode_archive(archive: &Archive) -> Result<Vec<u8>> {
    let zero_offsets = vec![0usize; archive.assets.len()];
    let header_len = encode_header(archive, &zero_offsets)?.len();

    // STRM header, DHDR block, DPAK header, padding amount
    let fixed = header_len + 8 + 12 + 8 + 4;
    let data_start = align_up(fixed, STREAM_ALIGN);
    let lead_padding = data_start - fixed;

    let order = stream_order(archive);
    let mut offsets = vec![0usize; archive.assets.len()];
    let mut cursor = data_start;
    for &pos in &order {
        let asset = &archive.assets[pos];
        let alignment = asset.debug.alignment;
        if alignment > MAX_ALIGNMENT {
            return Err(Error::format(format!(
                "asset {:#010x} requests unsupported alignment {}",
                asset.id, alignment
            )));
        }
        cursor = align_up(cursor, alignment.max(1) as usize);
        offsets[pos] = cursor;
        cursor += asset.data.len();
    }
    if u32::try_from(cursor).is_err() {
        return Err(Error::capacity("archive stream bytes", cursor, u32::MAX as usize));
    }

    let mut w = HipWriter::new();
    w.bytes(&encode_header(archive, &offsets)?);

    let strm = begin_block(&mut w, b"STRM");
    let dhdr = begin_block(&mut w, b"DHDR");
    w.u32(u32::MAX);
    end_block(&mut w, dhdr);

    let dpak = begin_block(&mut w, b"DPAK");
    w.u32(lead_padding as u32);
    w.fill(STREAM_PAD, lead_padding);
    debug_assert_eq!(w.len(), data_start);

    for pos in order {
        w.fill(STREAM_PAD, offsets[pos] - w.len());
        w.bytes(&archive.assets[pos].data);
    }
    end_block(&mut w, dpak);
    end_block(&mut w, strm);

    Ok(w.into_inner())
}

fn encode_header(archive: &Archive, offsets: &[usize]) -> Result<Vec<u8>> {
    let pack = &archive.pack;
    let mut w = HipWriter::new();

    let hipa = begin_block(&mut w, b"HIPA");
    end_block(&mut w, hipa);

    let pack_at = begin_block(&mut w, b"PACK");
    let b = begin_block(&mut w, b"PVER");
    w.u32(pack.sub_version);
    w.u32(pack.client_version);
    w.u32(pack.compat_version);
    end_block(&mut w, b);

    let b = begin_block(&mut w, b"PFLG");
    w.u32(pack.flags);
    end_block(&mut w, b);

    let b = begin_block(&mut w, b"PCNT");
    w.u32(pack.asset_count);
    w.u32(pack.layer_count);
    w.u32(pack.largest_asset);
    w.u32(pack.largest_layer);
    w.u32(pack.largest_asset_in_layer);
    end_block(&mut w, b);

    let b = begin_block(&mut w, b"PCRT");
    w.u32(pack.created);
    write_padded(&mut w, &pack.created_string)?;
    end_block(&mut w, b);

    let b = begin_block(&mut w, b"PMOD");
    w.u32(pack.modified);
    end_block(&mut w, b);

    if let Some(platform) = &pack.platform {
        let b = begin_block(&mut w, b"PLAT");
        w.bytes(platform);
        end_block(&mut w, b);
    }
    end_block(&mut w, pack_at);

    let dict = begin_block(&mut w, b"DICT");
    let atoc = begin_block(&mut w, b"ATOC");
    let b = begin_block(&mut w, b"AINF");
    w.u32(0);
    end_block(&mut w, b);

    for (asset, &offset) in archive.assets.iter().zip(offsets) {
        let ahdr = begin_block(&mut w, b"AHDR");
        w.u32(asset.id);
        w.bytes(asset.asset_type.as_bytes());
        w.u32(offset as u32);
        w.u32(asset.data.len() as u32);
        w.i32(asset.plus_value);
        w.u32(asset.flags);

        let adbg = begin_block(&mut w, b"ADBG");
        w.i32(asset.debug.alignment);
        write_padded(&mut w, &asset.debug.name)?;
        write_padded(&mut w, &asset.debug.filename)?;
        w.i32(asset.debug.checksum);
        end_block(&mut w, adbg);
        end_block(&mut w, ahdr);
    }
    end_block(&mut w, atoc);

    let ltoc = begin_block(&mut w, b"LTOC");
    let b = begin_block(&mut w, b"LINF");
    w.u32(0);
    end_block(&mut w, b);

    for layer in &archive.layers {
        let lhdr = begin_block(&mut w, b"LHDR");
        w.u32(layer.layer_type);
        w.u32(layer.asset_ids.len() as u32);
        for id in &layer.asset_ids {
            w.u32(*id);
        }
        let ldbg = begin_block(&mut w, b"LDBG");
        w.i32(layer.debug);
        end_block(&mut w, ldbg);
        end_block(&mut w, lhdr);
    }
    end_block(&mut w, ltoc);
    end_block(&mut w, dict);

    Ok(w.into_inner())
}
