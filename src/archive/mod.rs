//! Decoded archive model and the codec seam.
//!
//! The asset table is the single owner of records. Layers hold only asset ids,
//! so mutating one table never invalidates references held by the other.

pub mod hip;

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

pub use hip::HipCodec;

/// Turns raw archive bytes into an [`Archive`] and back.
///
/// `encode` must recompute every size and offset implied by the current asset
/// and layer tables; callers invoke it after each structural mutation.
pub trait ArchiveCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Archive>;
    fn encode(&self, archive: &Archive) -> Result<Vec<u8>>;
}

/// Four-byte asset type code, space-padded when shorter (`"SND "`, `"MODL"`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetType(pub [u8; 4]);

impl AssetType {
    /// Build a type code from text, padding with spaces. Longer input is truncated.
    pub fn new(code: &str) -> Self {
        let mut raw = [b' '; 4];
        for (dst, src) in raw.iter_mut().zip(code.bytes()) {
            *dst = src;
        }
        AssetType(raw)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetType({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// Debug metadata stored alongside every asset header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssetDebug {
    pub alignment: i32,
    pub name: String,
    pub filename: String,
    pub checksum: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: u32,
    pub asset_type: AssetType,
    pub flags: u32,
    /// Opaque per-asset value carried through encode/decode untouched.
    pub plus_value: i32,
    pub debug: AssetDebug,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Layer {
    pub layer_type: u32,
    pub asset_ids: Vec<u32>,
    pub debug: i32,
}

/// Package-level metadata (`PACK` block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackInfo {
    pub sub_version: u32,
    pub client_version: u32,
    pub compat_version: u32,
    pub flags: u32,
    pub asset_count: u32,
    pub layer_count: u32,
    pub largest_asset: u32,
    pub largest_layer: u32,
    pub largest_asset_in_layer: u32,
    pub created: u32,
    pub created_string: String,
    pub modified: u32,
    /// Raw `PLAT` body, when the archive carries one.
    pub platform: Option<Vec<u8>>,
}

impl Default for PackInfo {
    fn default() -> Self {
        Self {
            sub_version: 2,
            client_version: 0x000A_000F,
            compat_version: 1,
            flags: 0x2E,
            asset_count: 0,
            layer_count: 0,
            largest_asset: 0,
            largest_layer: 0,
            largest_asset_in_layer: 0,
            created: 0,
            created_string: String::new(),
            modified: 0,
            platform: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Archive {
    pub pack: PackInfo,
    pub assets: Vec<AssetRecord>,
    pub layers: Vec<Layer>,
}

impl Archive {
    /// Build an id -> position index over the asset table.
    ///
    /// Duplicate ids make the archive ambiguous and are rejected.
    pub fn index_by_id(&self) -> Result<HashMap<u32, usize>> {
        let mut index = HashMap::with_capacity(self.assets.len());
        for (pos, asset) in self.assets.iter().enumerate() {
            if index.insert(asset.id, pos).is_some() {
                return Err(Error::DuplicateAssetId { id: asset.id });
            }
        }
        Ok(index)
    }

    /// Index of the layer whose id list contains `id`.
    pub fn layer_of(&self, id: u32) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.asset_ids.contains(&id))
    }

    /// Like [`Archive::layer_of`], narrowed to the 16-bit index patches store.
    pub fn layer_index(&self, asset: &AssetRecord) -> Result<i16> {
        let layer = self.layer_of(asset.id).ok_or_else(|| Error::AssetNotInLayer {
            id: asset.id,
            name: asset.debug.name.clone(),
        })?;
        i16::try_from(layer).map_err(|_| Error::capacity("layer table", layer + 1, i16::MAX as usize))
    }

    pub fn layer_mut(&mut self, layer: i16) -> Result<&mut Layer> {
        let layers = self.layers.len();
        usize::try_from(layer)
            .ok()
            .and_then(|i| self.layers.get_mut(i))
            .ok_or(Error::LayerOutOfRange { layer, layers })
    }

    /// Remove `id` from whichever layer lists it. Returns that layer's index.
    pub fn unlink(&mut self, id: u32) -> Option<usize> {
        let layer = self.layer_of(id)?;
        self.layers[layer].asset_ids.retain(|&a| a != id);
        Some(layer)
    }

    /// Refresh the package counts and largest-size fields from the tables.
    pub fn sync_counts(&mut self) {
        let sizes: HashMap<u32, usize> = self.assets.iter().map(|a| (a.id, a.data.len())).collect();

        self.pack.asset_count = self.assets.len() as u32;
        self.pack.layer_count = self.layers.len() as u32;
        self.pack.largest_asset = sizes.values().copied().max().unwrap_or(0) as u32;

        let mut largest_layer = 0usize;
        let mut largest_in_layer = 0usize;
        for layer in &self.layers {
            let mut total = 0usize;
            for id in &layer.asset_ids {
                let size = sizes.get(id).copied().unwrap_or(0);
                total += size;
                largest_in_layer = largest_in_layer.max(size);
            }
            largest_layer = largest_layer.max(total);
        }
        self.pack.largest_layer = largest_layer as u32;
        self.pack.largest_asset_in_layer = largest_in_layer as u32;
    }
}
