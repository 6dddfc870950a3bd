use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading an image or decoding its metadata.
#[derive(Debug, Error)]
pub enum ForensicError {
    #[error("Image not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Truncated {structure}: need {needed} bytes, only {available} available")]
    Truncated {
        structure: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Inode {inode} is out of range (valid: 1..={max})")]
    OutOfRange { inode: u64, max: u32 },

    #[error("Inode {inode} lives in block group {group}; only group 0 is supported")]
    UnsupportedGroup { inode: u64, group: u64 },

    #[error("Corrupt metadata: {field} = {value}")]
    Corrupt { field: &'static str, value: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ForensicError {
    pub(crate) fn truncated(structure: &'static str, needed: usize, available: usize) -> Self {
        ForensicError::Truncated {
            structure,
            needed,
            available,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForensicError>;
