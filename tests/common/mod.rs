//! Synthetic ext images for integration tests.
//!
//! Only the fields the decoders read are populated. With 1 KiB blocks the
//! inode table sits at block 5, otherwise at block 2.

#![allow(dead_code)]

use std::io::Write;
use tempfile::NamedTempFile;

pub const EXT_MAGIC: u16 = 0xEF53;
pub const INODES: u32 = 32;

pub struct ExtImageBuilder {
    data: Vec<u8>,
    block_size: u32,
    inode_size: u16,
    inode_table: u32,
}

impl ExtImageBuilder {
    pub fn new(block_size: u32, total_blocks: u32) -> Self {
        let inode_table = if block_size == 1024 { 5 } else { 2 };
        let mut builder = Self {
            data: vec![0; block_size as usize * total_blocks as usize],
            block_size,
            inode_size: 128,
            inode_table,
        };

        builder.put_u32(1024, INODES);
        builder.put_u32(1024 + 4, total_blocks);
        builder.put_u32(1024 + 24, block_size.trailing_zeros() - 10);
        builder.put_u32(1024 + 32, 8192);
        builder.put_u32(1024 + 40, INODES);
        builder.put_u16(1024 + 56, EXT_MAGIC);
        builder.put_u16(1024 + 88, 128);
        builder.data[1024 + 104..1024 + 120].copy_from_slice(&[0xAB; 16]);

        let gdt = if block_size == 1024 { 2048 } else { block_size as usize };
        builder.put_u32(gdt, 3);
        builder.put_u32(gdt + 4, 4);
        builder.put_u32(gdt + 8, inode_table);
        builder
    }

    /// Raw `s_inode_size`; zero is stored as-is and decodes as 128.
    pub fn inode_size(mut self, size: u16) -> Self {
        self.put_u16(1024 + 88, size);
        self.inode_size = if size == 0 { 128 } else { size };
        self
    }

    pub fn inodes_count(mut self, count: u32) -> Self {
        self.put_u32(1024, count);
        self
    }

    pub fn inodes_per_group(mut self, count: u32) -> Self {
        self.put_u32(1024 + 40, count);
        self
    }

    pub fn inode_offset(&self, num: u32) -> usize {
        self.inode_table as usize * self.block_size as usize
            + (num as usize - 1) * self.inode_size as usize
    }

    pub fn inode(mut self, num: u32, mode: u16, size: u64, pointers: &[u32]) -> Self {
        let at = self.inode_offset(num);
        self.put_u16(at, mode);
        self.put_u32(at + 4, size as u32);
        self.put_u16(at + 26, 1);
        for (i, &p) in pointers.iter().take(15).enumerate() {
            self.put_u32(at + 40 + i * 4, p);
        }
        if self.inode_size >= 112 {
            self.put_u32(at + 108, (size >> 32) as u32);
        }
        self
    }

    pub fn deleted(mut self, num: u32, dtime: u32) -> Self {
        let at = self.inode_offset(num);
        self.put_u32(at + 20, dtime);
        self
    }

    pub fn flags(mut self, num: u32, flags: u32) -> Self {
        let at = self.inode_offset(num);
        self.put_u32(at + 32, flags);
        self
    }

    pub fn block(mut self, n: u32, content: &[u8]) -> Self {
        let at = n as usize * self.block_size as usize;
        self.data[at..at + content.len()].copy_from_slice(content);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    pub fn write_temp(self) -> NamedTempFile {
        write_temp(&self.data)
    }

    fn put_u16(&mut self, at: usize, value: u16) {
        self.data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, at: usize, value: u32) {
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

pub fn write_temp(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}
