//! Extraction of candidate file content with integrity hashing.
//!
//! Two modes: a bounded copy from a raw byte offset (used after carving),
//! and a copy driven by an inode's block pointers. Running out of source
//! data is not an error in either mode; whatever was written is kept and
//! hashed.

use crate::error::{ForensicError, Result};
use crate::ext::InodeRecord;
use crate::hash::sha256_file;
use crate::io::{BlockSource, DiskImage};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const EXTRACTION_BUFFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_OUT_DIR: &str = "recovered";
pub const DEFAULT_EXTENSION: &str = ".bin";

/// Output file of an extraction and its SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes_written: u64,
}

/// A bounded copy starting at a raw image offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetExtraction {
    pub offset: u64,
    pub max_size: u64,
    pub out_dir: PathBuf,
    /// Appended verbatim to the file name, dot included (e.g. `.png`).
    pub ext: String,
}

impl OffsetExtraction {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            max_size: DEFAULT_MAX_SIZE,
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            ext: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.ext = ext.into();
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.out_dir.join(generate_filename(self.offset, &self.ext))
    }
}

pub fn generate_filename(offset: u64, ext: &str) -> String {
    format!("recovered_{offset}{ext}")
}

/// Copies up to `request.max_size` bytes from `request.offset`.
pub fn extract_from_offset<S: BlockSource>(
    source: &mut S,
    request: &OffsetExtraction,
) -> Result<ExtractionResult> {
    fs::create_dir_all(&request.out_dir)?;
    let out_path = request.output_path();

    let mut writer = BufWriter::new(File::create(&out_path)?);
    let mut buffer = vec![0u8; EXTRACTION_BUFFER_SIZE];
    let mut position = request.offset;
    let mut remaining = request.max_size;

    while remaining > 0 {
        let to_read = usize::try_from(remaining).map_or(buffer.len(), |r| r.min(buffer.len()));
        let n = source.read_chunk(position, &mut buffer[..to_read])?;
        if n == 0 {
            debug!(position, "source exhausted before size limit");
            break;
        }
        writer.write_all(&buffer[..n])?;
        position += n as u64;
        remaining -= n as u64;
    }
    finish(writer, out_path, position - request.offset)
}

/// Appends one block per pointer, in order, to `out_dir/filename`.
///
/// A zero pointer ends the list. A block that cannot be read in full also
/// ends it: the bytes that were available are kept and nothing after them is
/// read.
pub fn extract_from_blocks<S: BlockSource>(
    source: &mut S,
    blocks: &[u32],
    block_size: u32,
    out_dir: &Path,
    filename: &str,
) -> Result<ExtractionResult> {
    if block_size == 0 {
        return Err(ForensicError::InvalidArgument(
            "block size must be greater than zero".into(),
        ));
    }

    fs::create_dir_all(out_dir)?;
    let out_path = out_dir.join(filename);

    let mut writer = BufWriter::new(File::create(&out_path)?);
    let mut buffer = vec![0u8; block_size as usize];
    let mut written = 0u64;

    for &pointer in blocks {
        if pointer == 0 {
            debug!("zero block pointer, end of block list");
            break;
        }

        let offset = u64::from(pointer) * u64::from(block_size);
        let n = match source.read_chunk(offset, &mut buffer) {
            Ok(n) => n,
            Err(e) => {
                warn!(block = pointer, offset, error = %e, "unreadable block, stopping");
                break;
            }
        };

        writer.write_all(&buffer[..n])?;
        written += n as u64;

        if n < buffer.len() {
            warn!(
                block = pointer,
                offset,
                bytes = n,
                "short block read, keeping partial recovery"
            );
            break;
        }
    }
    finish(writer, out_path, written)
}

fn finish(
    mut writer: BufWriter<File>,
    path: PathBuf,
    bytes_written: u64,
) -> Result<ExtractionResult> {
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    let sha256 = sha256_file(&path)?;
    info!(path = %path.display(), bytes = bytes_written, sha256 = %sha256, "extraction complete");

    Ok(ExtractionResult {
        path,
        sha256,
        bytes_written,
    })
}

/// Offset-mode extraction from the image at `image_path`.
pub fn extract_offset_from_image(
    image_path: impl AsRef<Path>,
    request: &OffsetExtraction,
) -> Result<ExtractionResult> {
    let mut image = DiskImage::open(image_path)?;
    extract_from_offset(&mut image, request)
}

/// Block-list extraction from the image at `image_path`.
pub fn extract_blocks_from_image(
    image_path: impl AsRef<Path>,
    blocks: &[u32],
    block_size: u32,
    out_dir: &Path,
    filename: &str,
) -> Result<ExtractionResult> {
    let mut image = DiskImage::open(image_path)?;
    extract_from_blocks(&mut image, blocks, block_size, out_dir, filename)
}

pub fn default_inode_filename(inode_num: u64) -> String {
    format!("inode_{inode_num}_rec")
}

/// Decodes inode `inode_num` and rebuilds its content from the 15 pointer
/// slots using the superblock's block size.
///
/// Indirect and extent-mapped layouts are not resolved; the raw slots are
/// used as they are and a warning is logged for extent-mapped inodes.
pub fn recover_inode<S: BlockSource>(
    source: &mut S,
    inode_num: u64,
    out_dir: &Path,
    filename: Option<&str>,
) -> Result<(InodeRecord, ExtractionResult)> {
    let record = InodeRecord::read_from(source, inode_num)?;
    if record.inode.uses_extents() {
        warn!(
            inode = inode_num,
            "inode uses an extent tree; block slots are not plain block numbers"
        );
    }

    let filename = filename.map_or_else(|| default_inode_filename(inode_num), str::to_string);
    let result = extract_from_blocks(
        source,
        &record.inode.block,
        record.superblock.block_size,
        out_dir,
        &filename,
    )?;
    Ok((record, result))
}
