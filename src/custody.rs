//! Chain-of-custody sidecars for extracted files.
//!
//! Each record ties an output file back to the image and the exact source
//! location it was copied from, together with its SHA-256, so a recovery can
//! be re-verified later.

use crate::error::Result;
use crate::reconstruct::ExtractionResult;
use chrono::Utc;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const SIDECAR_SUFFIX: &str = ".custody.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CustodySource {
    Offset {
        source_offset: String,
        source_offset_decimal: u64,
        max_size: u64,
    },
    Blocks {
        inode: Option<u64>,
        block_size: u32,
        blocks: Vec<u32>,
    },
}

impl CustodySource {
    pub fn offset(offset: u64, max_size: u64) -> Self {
        CustodySource::Offset {
            source_offset: format!("0x{:016X}", offset),
            source_offset_decimal: offset,
            max_size,
        }
    }

    /// Block-list source; trailing pointers after the first zero are dropped.
    pub fn blocks(inode: Option<u64>, block_size: u32, blocks: &[u32]) -> Self {
        CustodySource::Blocks {
            inode,
            block_size,
            blocks: blocks.iter().copied().take_while(|&b| b != 0).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustodyRecord {
    pub filename: String,
    pub source_image: PathBuf,
    pub source: CustodySource,
    pub file_size: u64,
    pub sha256_hash: String,
    pub recovery_timestamp: String,
}

impl CustodyRecord {
    pub fn new(source_image: &Path, result: &ExtractionResult, source: CustodySource) -> Self {
        let filename = result
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            filename,
            source_image: source_image.to_path_buf(),
            source,
            file_size: result.bytes_written,
            sha256_hash: result.sha256.clone(),
            recovery_timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// `<output>.custody.json`, next to the extracted file.
    pub fn sidecar_path(output: &Path) -> PathBuf {
        let mut name = OsString::from(output.as_os_str());
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Writes the record next to the extracted file and returns its path.
    pub fn write_sidecar(&self, output: &Path) -> Result<PathBuf> {
        let sidecar = Self::sidecar_path(output);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&sidecar, json)?;
        Ok(sidecar)
    }
}
