//! Patch creation and application for game data trees.
//!
//! Most tracked files are treated as opaque blobs. HIP/HOP archives are diffed
//! and patched per asset record, so a patch only carries the assets a mod touched.
//! Committing a patch returns its inverse, built from what was actually on disk,
//! which restores the previous state when applied in turn.
//!
//! ```no_run
//! use hip_patcher::{apply, create, HipCodec, LogObserver, Patch, PatcherConfig};
//! use std::path::Path;
//!
//! # fn main() -> hip_patcher::Result<()> {
//! let config = PatcherConfig::default();
//! let patch = create::diff_trees(
//!     Path::new("game/original"),
//!     Path::new("game/modded"),
//!     &HipCodec,
//!     &config,
//!     &mut LogObserver,
//! )?;
//! patch.save(Path::new("mod.patch"))?;
//!
//! let patch = Patch::load(Path::new("mod.patch"))?;
//! let uninstall = apply::commit(&patch, Path::new("game/install"), &HipCodec, &config, &mut LogObserver)?;
//! uninstall.save(Path::new("uninstall.patch"))?;
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod archive;
pub mod archive_diff;
pub mod byte_io;
pub mod compare;
pub mod config;
pub mod create;
pub mod error;
pub mod observer;
pub mod patch_format;
pub mod patch_io;
pub mod util;

pub use archive::{Archive, ArchiveCodec, AssetType, HipCodec};
pub use config::{MissingAssetPolicy, PatcherConfig};
pub use error::{Error, Result};
pub use observer::{LogObserver, NullObserver, PatchObserver};
pub use patch_format::{ArchiveOp, AssetEntry, AssetRef, ChangeKind, FileEntry, Patch, PatchSummary};
