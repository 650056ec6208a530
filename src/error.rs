//! Error types shared by the differ, the commit engine and both codecs.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for patcher operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed patch file or archive
    #[error("Invalid format: {0}")]
    Format(String),

    /// A list or payload does not fit the fixed-width count/length fields
    #[error("Capacity exceeded: {list} has {count} entries (limit {limit})")]
    Capacity {
        list: String,
        count: usize,
        limit: usize,
    },

    /// Two records in one asset table share an id
    #[error("Duplicate asset id {id:#010x} in archive")]
    DuplicateAssetId { id: u32 },

    /// An asset is referenced by no layer of its archive
    #[error("Asset {id:#010x} ({name}) is not in any layer")]
    AssetNotInLayer { id: u32, name: String },

    /// A layer index does not exist in the archive's layer table
    #[error("Layer {layer} out of range (archive has {layers} layers)")]
    LayerOutOfRange { layer: i16, layers: usize },

    /// A string field contains a NUL byte and cannot be NUL-terminated
    #[error("String contains an embedded NUL byte: {0:?}")]
    EmbeddedNul(String),

    /// Two files in the same tree fold to the same lower-cased path
    #[error("Paths collide after case folding: {path}")]
    PathCollision { path: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn capacity<S: Into<String>>(list: S, count: usize, limit: usize) -> Self {
        Error::Capacity {
            list: list.into(),
            count,
            limit,
        }
    }

    /// Consistency errors: the archive contradicts its own index.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            Error::DuplicateAssetId { .. }
                | Error::AssetNotInLayer { .. }
                | Error::LayerOutOfRange { .. }
        )
    }
}
