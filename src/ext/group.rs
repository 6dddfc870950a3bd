use super::FieldReader;
use crate::error::Result;
use crate::io::BlockSource;
use serde::Serialize;

/// Size of a legacy (non-64bit) group descriptor.
pub const GROUP_DESCRIPTOR_SIZE: usize = 32;

/// Byte offset of the group descriptor table.
///
/// With 1 KiB blocks block 0 holds the boot sector and block 1 the
/// superblock, so the table starts at block 2. Larger blocks fit both in
/// block 0 and the table starts at block 1.
pub fn group_descriptor_table_offset(block_size: u32) -> u64 {
    let table_block: u64 = if block_size == 1024 { 2 } else { 1 };
    table_block * u64::from(block_size)
}

/// Legacy 32-byte block group descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupDescriptor {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
}

impl GroupDescriptor {
    pub fn read_from<S: BlockSource>(source: &mut S, block_size: u32, index: u32) -> Result<Self> {
        let offset = group_descriptor_table_offset(block_size)
            + u64::from(index) * GROUP_DESCRIPTOR_SIZE as u64;
        let data = source.read_vec(offset, GROUP_DESCRIPTOR_SIZE)?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let fields = FieldReader::new(data, GROUP_DESCRIPTOR_SIZE, "group descriptor")?;
        Ok(Self {
            block_bitmap: fields.u32(0)?,
            inode_bitmap: fields.u32(4)?,
            inode_table: fields.u32(8)?,
        })
    }

    /// Absolute byte offset of this group's inode table.
    pub fn inode_table_offset(&self, block_size: u32) -> u64 {
        u64::from(self.inode_table) * u64::from(block_size)
    }
}
