//! Exact content comparison. Lengths first, then a full scan; no hashing.

use std::path::Path;

use crate::error::{Error, Result};
use crate::util;

pub fn bytes_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a == b
}

pub fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    let len_a = std::fs::metadata(a).map_err(|e| Error::io(a, e))?.len();
    let len_b = std::fs::metadata(b).map_err(|e| Error::io(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }
    if len_a == 0 {
        return Ok(true);
    }

    let map_a = util::mmap_file(a)?;
    let map_b = util::mmap_file(b)?;
    Ok(bytes_equal(&map_a, &map_b))
}
