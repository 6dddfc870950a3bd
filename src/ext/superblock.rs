use super::{serialize_hex, FieldReader};
use crate::error::{ForensicError, Result};
use crate::io::BlockSource;
use serde::Serialize;
use tracing::debug;

pub const EXT_SUPER_MAGIC: u16 = 0xEF53;
pub const SUPERBLOCK_SIZE: usize = 1024;
pub const SUPERBLOCK_OFFSET: u64 = 1024;
/// Inode record size assumed by revision 0 filesystems, which leave the field zero.
pub const DEFAULT_INODE_SIZE: u16 = 128;

// 1024 << 22 no longer fits the 32-bit block size.
const MAX_LOG_BLOCK_SIZE: u32 = 21;

/// Decoded primary superblock.
///
/// The magic is reported as found; use [`Superblock::is_valid`] when a real
/// ext2/3/4 filesystem is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Superblock {
    pub inodes_count: u32,
    pub blocks_count_lo: u32,
    pub free_blocks_count_lo: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub magic: u16,
    pub inode_size: u16,
    #[serde(serialize_with = "serialize_hex")]
    pub uuid: [u8; 16],
}

impl Superblock {
    pub fn read_from<S: BlockSource>(source: &mut S) -> Result<Self> {
        let data = source.read_vec(SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE)?;
        Self::parse(&data)
    }

    /// Decodes the 1024-byte superblock region.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let fields = FieldReader::new(data, SUPERBLOCK_SIZE, "superblock")?;

        let log_block_size = fields.u32(24)?;
        let block_size = block_size_from_log(log_block_size)?;

        let inode_size = match fields.u16(88)? {
            0 => DEFAULT_INODE_SIZE,
            size => size,
        };

        let superblock = Self {
            inodes_count: fields.u32(0)?,
            blocks_count_lo: fields.u32(4)?,
            free_blocks_count_lo: fields.u32(12)?,
            free_inodes_count: fields.u32(16)?,
            first_data_block: fields.u32(20)?,
            log_block_size,
            block_size,
            blocks_per_group: fields.u32(32)?,
            inodes_per_group: fields.u32(40)?,
            magic: fields.u16(56)?,
            inode_size,
            uuid: fields.bytes::<16>(104)?,
        };

        debug!(
            block_size = superblock.block_size,
            inode_size = superblock.inode_size,
            inodes_count = superblock.inodes_count,
            inodes_per_group = superblock.inodes_per_group,
            magic = superblock.magic,
            "decoded superblock"
        );

        Ok(superblock)
    }

    pub fn is_valid(&self) -> bool {
        self.magic == EXT_SUPER_MAGIC
    }

    pub fn uuid_hex(&self) -> String {
        hex::encode(self.uuid)
    }
}

/// Block size for a superblock `s_log_block_size` value: `1024 << log`.
pub fn block_size_from_log(log_block_size: u32) -> Result<u32> {
    if log_block_size > MAX_LOG_BLOCK_SIZE {
        return Err(ForensicError::Corrupt {
            field: "log_block_size",
            value: u64::from(log_block_size),
        });
    }
    Ok(1024u32 << log_block_size)
}
