//! ext2/3/4 on-disk metadata decoding.
//!
//! Only the structures needed to locate an inode and its direct block
//! pointers are decoded: the primary superblock, the legacy 32-byte group
//! descriptor and the inode record. Everything is read straight from the
//! image without mounting it.

pub mod group;
pub mod inode;
pub mod superblock;

pub use group::{group_descriptor_table_offset, GroupDescriptor, GROUP_DESCRIPTOR_SIZE};
pub use inode::{FileKind, Inode, InodeRecord, BLOCK_POINTERS, DIRECT_BLOCKS};
pub use superblock::{
    block_size_from_log, Superblock, DEFAULT_INODE_SIZE, EXT_SUPER_MAGIC, SUPERBLOCK_OFFSET,
    SUPERBLOCK_SIZE,
};

use crate::error::{ForensicError, Result};
use crate::io::DiskImage;
use serde::Serializer;
use std::path::Path;

/// Decodes the superblock of the image at `path`.
pub fn read_superblock(path: impl AsRef<Path>) -> Result<Superblock> {
    let mut image = DiskImage::open(path)?;
    Superblock::read_from(&mut image)
}

/// Decodes group descriptor `index` of the image at `path`.
pub fn read_group_descriptor(
    path: impl AsRef<Path>,
    block_size: u32,
    index: u32,
) -> Result<GroupDescriptor> {
    let mut image = DiskImage::open(path)?;
    GroupDescriptor::read_from(&mut image, block_size, index)
}

/// Locates and decodes inode `inode_num` (1-based) of the image at `path`.
pub fn read_inode(path: impl AsRef<Path>, inode_num: u64) -> Result<InodeRecord> {
    let mut image = DiskImage::open(path)?;
    InodeRecord::read_from(&mut image, inode_num)
}

/// Little-endian field access over a fixed-size on-disk record.
pub(crate) struct FieldReader<'a> {
    data: &'a [u8],
    structure: &'static str,
}

impl<'a> FieldReader<'a> {
    /// Wraps `data`, failing with `Truncated` when it is shorter than `needed`.
    pub(crate) fn new(data: &'a [u8], needed: usize, structure: &'static str) -> Result<Self> {
        if data.len() < needed {
            return Err(ForensicError::truncated(structure, needed, data.len()));
        }
        Ok(Self { data, structure })
    }

    pub(crate) fn bytes<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        offset
            .checked_add(N)
            .and_then(|end| self.data.get(offset..end))
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| {
                ForensicError::truncated(
                    self.structure,
                    offset.saturating_add(N),
                    self.data.len(),
                )
            })
    }

    #[inline]
    pub(crate) fn u16(&self, offset: usize) -> Result<u16> {
        self.bytes::<2>(offset).map(u16::from_le_bytes)
    }

    #[inline]
    pub(crate) fn u32(&self, offset: usize) -> Result<u32> {
        self.bytes::<4>(offset).map(u32::from_le_bytes)
    }
}

pub(crate) fn serialize_hex<S, T>(bytes: T, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    T: AsRef<[u8]>,
{
    serializer.serialize_str(&hex::encode(bytes))
}
