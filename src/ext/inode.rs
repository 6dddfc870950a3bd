use super::{FieldReader, GroupDescriptor, Superblock};
use crate::error::{ForensicError, Result};
use crate::io::BlockSource;
use serde::Serialize;
use tracing::debug;

/// Number of `i_block` slots in an inode.
pub const BLOCK_POINTERS: usize = 15;
/// Leading `i_block` slots that address data blocks directly.
pub const DIRECT_BLOCKS: usize = 12;

const EXT4_EXTENTS_FL: u32 = 0x0008_0000;
const S_IFMT: u16 = 0xF000;

// The pointer array ends at byte 100; anything shorter is not an inode.
const INODE_MIN_SIZE: usize = 40 + BLOCK_POINTERS * 4;
const SIZE_HIGH_OFFSET: usize = 108;
// i_size_high is only trusted when all four of its bytes are inside the record.
const SIZE_HIGH_MIN_RECORD: usize = SIZE_HIGH_OFFSET + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Fifo,
    CharDevice,
    Directory,
    BlockDevice,
    Regular,
    Symlink,
    Socket,
    Unknown,
}

impl FileKind {
    pub fn from_mode(mode: u16) -> Self {
        match mode & S_IFMT {
            0x1000 => FileKind::Fifo,
            0x2000 => FileKind::CharDevice,
            0x4000 => FileKind::Directory,
            0x6000 => FileKind::BlockDevice,
            0x8000 => FileKind::Regular,
            0xA000 => FileKind::Symlink,
            0xC000 => FileKind::Socket,
            _ => FileKind::Unknown,
        }
    }
}

/// Fields of one on-disk inode record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inode {
    pub mode: u16,
    pub uid: u16,
    pub gid: u16,
    /// Combined `i_size_lo` / `i_size_high`.
    pub size: u64,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub links_count: u16,
    pub blocks: u32,
    pub flags: u32,
    pub block: [u32; BLOCK_POINTERS],
}

impl Inode {
    /// Decodes an inode record; `raw` must be the whole record.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let fields = FieldReader::new(raw, INODE_MIN_SIZE, "inode")?;

        let mut block = [0u32; BLOCK_POINTERS];
        for (i, slot) in block.iter_mut().enumerate() {
            *slot = fields.u32(40 + i * 4)?;
        }

        let size_lo = fields.u32(4)?;
        let size_high = if raw.len() >= SIZE_HIGH_MIN_RECORD {
            fields.u32(SIZE_HIGH_OFFSET).unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            mode: fields.u16(0)?,
            uid: fields.u16(2)?,
            gid: fields.u16(24)?,
            size: (u64::from(size_high) << 32) | u64::from(size_lo),
            atime: fields.u32(8)?,
            ctime: fields.u32(12)?,
            mtime: fields.u32(16)?,
            dtime: fields.u32(20)?,
            links_count: fields.u16(26)?,
            blocks: fields.u32(28)?,
            flags: fields.u32(32)?,
            block,
        })
    }

    pub fn file_kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    /// A non-zero deletion time marks the inode as freed.
    pub fn is_deleted(&self) -> bool {
        self.dtime != 0
    }

    /// When set, `block` holds an extent tree header rather than block numbers.
    pub fn uses_extents(&self) -> bool {
        self.flags & EXT4_EXTENTS_FL != 0
    }

    /// Direct block pointers up to the first unused (zero) slot.
    pub fn direct_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.block[..DIRECT_BLOCKS]
            .iter()
            .copied()
            .take_while(|&b| b != 0)
    }
}

/// A decoded inode together with the metadata used to locate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InodeRecord {
    pub number: u64,
    /// Absolute byte offset of the record in the image.
    pub offset: u64,
    pub record_size: u16,
    pub inode: Inode,
    pub superblock: Superblock,
    pub group_descriptor: GroupDescriptor,
}

impl InodeRecord {
    /// Locates and decodes inode `inode_num` (1-based).
    ///
    /// Only inodes in block group 0 can be located; anything else fails
    /// with [`ForensicError::UnsupportedGroup`].
    pub fn read_from<S: BlockSource>(source: &mut S, inode_num: u64) -> Result<Self> {
        let superblock = Superblock::read_from(source)?;

        if inode_num < 1 || inode_num > u64::from(superblock.inodes_count) {
            return Err(ForensicError::OutOfRange {
                inode: inode_num,
                max: superblock.inodes_count,
            });
        }
        if superblock.inodes_per_group == 0 {
            return Err(ForensicError::Corrupt {
                field: "inodes_per_group",
                value: 0,
            });
        }

        let inodes_per_group = u64::from(superblock.inodes_per_group);
        let group = (inode_num - 1) / inodes_per_group;
        let index = (inode_num - 1) % inodes_per_group;

        if group != 0 {
            return Err(ForensicError::UnsupportedGroup {
                inode: inode_num,
                group,
            });
        }

        let group_descriptor = GroupDescriptor::read_from(source, superblock.block_size, 0)?;

        let record_size = usize::from(superblock.inode_size);
        let offset = group_descriptor.inode_table_offset(superblock.block_size)
            + index * u64::from(superblock.inode_size);

        let raw = source.read_vec(offset, record_size)?;
        if raw.len() < record_size {
            return Err(ForensicError::truncated("inode", record_size, raw.len()));
        }
        let inode = Inode::parse(&raw)?;

        debug!(
            inode = inode_num,
            offset,
            size = inode.size,
            extents = inode.uses_extents(),
            "decoded inode"
        );

        Ok(Self {
            number: inode_num,
            offset,
            record_size: superblock.inode_size,
            inode,
            superblock,
            group_descriptor,
        })
    }
}
