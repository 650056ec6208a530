use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

/// What the commit engine does when a modified or deleted asset id is absent
/// from the target archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingAssetPolicy {
    /// Stop processing the remaining modified and deleted ops of that archive.
    /// Ops already applied to it stand and the archive is still written.
    #[default]
    StopArchive,
    /// Skip only the offending op and keep going.
    SkipOp,
}

/// Tool configuration. Every field has a default, so an empty TOML file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatcherConfig {
    /// Extensions diffed at the asset level.
    pub archive_extensions: Vec<String>,
    /// Plain-text settings files diffed as opaque blobs.
    pub config_extensions: Vec<String>,
    pub missing_asset: MissingAssetPolicy,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            archive_extensions: vec!["hip".to_string(), "hop".to_string()],
            config_extensions: vec!["ini".to_string()],
            missing_asset: MissingAssetPolicy::default(),
        }
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

impl PatcherConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text)
    }

    pub fn is_archive(&self, path: &Path) -> bool {
        has_extension(path, &self.archive_extensions)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.is_archive(path) || has_extension(path, &self.config_extensions)
    }
}
