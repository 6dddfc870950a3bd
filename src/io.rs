//! Random-access readers over raw disk images.

use crate::error::{ForensicError, Result};
use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A source of raw bytes, typically a disk image file.
///
/// Every decoder, the scanner and the reconstructor are written against this
/// trait so the same logic runs over image files and in-memory buffers.
pub trait BlockSource {
    /// Reads into `buffer` starting at `offset`.
    ///
    /// Returns the number of bytes read, which is smaller than `buffer.len()`
    /// only when the end of the source is reached (zero past the end).
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize>;

    /// Total size of the source in bytes.
    fn size(&self) -> Result<u64>;

    /// Reads up to `length` bytes at `offset` into a fresh buffer.
    ///
    /// The allocation is clamped to what the source can actually supply.
    fn read_vec(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let available = self.size()?.saturating_sub(offset);
        let len = usize::try_from(available).map_or(length, |a| a.min(length));
        let mut buffer = vec![0u8; len];
        let n = self.read_chunk(offset, &mut buffer)?;
        buffer.truncate(n);
        Ok(buffer)
    }
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(offset, buffer)
    }

    fn size(&self) -> Result<u64> {
        (**self).size()
    }
}

impl<T: AsRef<[u8]>> BlockSource for Cursor<T> {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        let data = self.get_ref().as_ref();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = buffer.len().min(data.len() - start);
        buffer[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> Result<u64> {
        Ok(self.get_ref().as_ref().len() as u64)
    }
}

/// A read-only disk image backed by a file.
///
/// The handle is opened once; the size is looked up on first use and cached.
pub struct DiskImage {
    path: PathBuf,
    file: File,
    size: Cell<Option<u64>>,
}

impl DiskImage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(false)
            .open(path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    ForensicError::NotFound {
                        path: path.to_path_buf(),
                    }
                } else {
                    ForensicError::Io(e)
                }
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size: Cell::new(None),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads up to `length` bytes at `offset`.
    ///
    /// Negative arguments are rejected. Reading at or past the end returns
    /// fewer bytes (possibly none); callers check the length themselves.
    pub fn read(&mut self, offset: i64, length: i64) -> Result<Vec<u8>> {
        let (Ok(offset), Ok(length)) = (u64::try_from(offset), usize::try_from(length)) else {
            return Err(ForensicError::InvalidArgument(format!(
                "offset and length must be non-negative (offset={offset}, length={length})"
            )));
        };
        self.read_vec(offset, length)
    }
}

impl BlockSource for DiskImage {
    fn read_chunk(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn size(&self) -> Result<u64> {
        if let Some(size) = self.size.get() {
            return Ok(size);
        }
        let size = self.file.metadata()?.len();
        self.size.set(Some(size));
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn image_with(data: &[u8]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(data).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_disk_image_basic() {
        let data = b"Hello, World! This is test data for DiskImage.";
        let temp_file = image_with(data);
        let mut image = DiskImage::open(temp_file.path()).unwrap();

        assert_eq!(image.size().unwrap(), data.len() as u64);
        assert_eq!(image.read(0, 13).unwrap(), b"Hello, World!");
        assert_eq!(image.read(7, 4).unwrap(), b"Worl");
    }

    #[test]
    fn test_disk_image_read_beyond_end() {
        let temp_file = image_with(b"Short");
        let mut image = DiskImage::open(temp_file.path()).unwrap();

        assert_eq!(image.read(0, 100).unwrap(), b"Short");
        assert_eq!(image.read(3, 100).unwrap(), b"rt");
        assert!(image.read(5, 10).unwrap().is_empty());
        assert!(image.read(1_000_000, 10).unwrap().is_empty());
    }

    #[test]
    fn test_disk_image_rejects_negative_arguments() {
        let temp_file = image_with(b"Short");
        let mut image = DiskImage::open(temp_file.path()).unwrap();

        assert!(matches!(
            image.read(-1, 4),
            Err(ForensicError::InvalidArgument(_))
        ));
        assert!(matches!(
            image.read(0, -4),
            Err(ForensicError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_disk_image_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.img");

        match DiskImage::open(&missing) {
            Err(ForensicError::NotFound { path }) => assert_eq!(path, missing),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_disk_image_size_is_cached() {
        let mut temp_file = image_with(&[0u8; 512]);
        let image = DiskImage::open(temp_file.path()).unwrap();
        assert_eq!(image.size().unwrap(), 512);

        temp_file.write_all(&[0u8; 512]).unwrap();
        temp_file.flush().unwrap();
        assert_eq!(image.size().unwrap(), 512);
    }

    #[test]
    fn test_cursor_source_short_read() {
        let mut source = Cursor::new(vec![1u8, 2, 3, 4]);
        let mut buffer = [0u8; 8];

        assert_eq!(source.read_chunk(2, &mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], &[3, 4]);
        assert_eq!(source.read_chunk(9, &mut buffer).unwrap(), 0);
    }
}
