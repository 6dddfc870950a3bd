//! Offline inspection of raw ext2/3/4 disk images.
//!
//! Decodes filesystem metadata without mounting, carves known file
//! signatures from anywhere in the image (unallocated space included), and
//! reconstructs candidate files with a SHA-256 for each output.

pub mod custody;
mod error;
pub mod ext;
pub mod hash;
pub mod io;
pub mod logging;
pub mod reconstruct;
pub mod scanner;
pub mod signatures;

pub use error::{ForensicError, Result};
pub use ext::{GroupDescriptor, Inode, InodeRecord, Superblock};
pub use io::{BlockSource, DiskImage};
pub use reconstruct::{ExtractionResult, OffsetExtraction};
pub use scanner::{ScanConfig, SignatureScanner};
pub use signatures::{Signature, SignatureMatch, SignatureSet};
