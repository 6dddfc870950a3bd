//! Signature carving over the raw image, independent of filesystem metadata.
//!
//! The image is read in fixed-size chunks. Each chunk is searched together
//! with the tail of the previous one so a signature straddling a chunk
//! boundary is still seen. Every occurrence of every signature is reported,
//! overlapping ones included, in discovery order: chunk, then signature
//! table order, then position. The result is therefore not sorted by offset
//! across signature types and may contain several entries for one offset.

use crate::error::{ForensicError, Result};
use crate::io::{BlockSource, DiskImage};
use crate::signatures::{SignatureMatch, SignatureSet};
use memchr::memmem::Finder;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
/// Bytes carried from one chunk into the next scan window.
pub const DEFAULT_OVERLAP: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Bytes read from the image per step.
    pub chunk_size: usize,
    /// Tail of the previous chunk prepended to the next one.
    pub overlap: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ScanConfig {
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }
}

pub struct SignatureScanner {
    signatures: SignatureSet,
    finders: Vec<Finder<'static>>,
    config: ScanConfig,
}

impl SignatureScanner {
    /// Builds a scanner for `signatures`.
    ///
    /// Fails when the chunk size is zero, a pattern is empty, or a pattern is
    /// too long for the overlap to catch it across a chunk boundary.
    pub fn new(signatures: SignatureSet, config: ScanConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(ForensicError::InvalidArgument(
                "chunk size must be greater than zero".into(),
            ));
        }
        if config.overlap.checked_add(config.chunk_size).is_none() {
            return Err(ForensicError::InvalidArgument(format!(
                "chunk size {} plus overlap {} does not fit in memory",
                config.chunk_size, config.overlap
            )));
        }
        for sig in &signatures {
            if sig.pattern().is_empty() {
                return Err(ForensicError::InvalidArgument(format!(
                    "signature {} has an empty pattern",
                    sig.name()
                )));
            }
            if sig.pattern().len() > config.overlap + 1 {
                return Err(ForensicError::InvalidArgument(format!(
                    "signature {} is {} bytes, longer than overlap {} allows",
                    sig.name(),
                    sig.pattern().len(),
                    config.overlap
                )));
            }
        }
        Ok(Self::build(signatures, config))
    }

    fn build(signatures: SignatureSet, config: ScanConfig) -> Self {
        let finders = signatures
            .iter()
            .map(|sig| Finder::new(sig.pattern()).into_owned())
            .collect();
        Self {
            signatures,
            finders,
            config,
        }
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.signatures
    }

    pub fn config(&self) -> ScanConfig {
        self.config
    }

    pub fn scan<S: BlockSource>(&self, source: &mut S) -> Result<Vec<SignatureMatch>> {
        let mut matches = Vec::new();
        self.scan_with(source, |m| matches.push(m))?;
        Ok(matches)
    }

    /// Streams matches to `on_match` as they are found.
    ///
    /// Returns the number of image bytes scanned.
    pub fn scan_with<S, F>(&self, source: &mut S, on_match: F) -> Result<u64>
    where
        S: BlockSource,
        F: FnMut(SignatureMatch),
    {
        self.scan_with_progress(source, on_match, |_| {})
    }

    /// Like [`scan_with`](Self::scan_with), also reporting the running byte
    /// count to `on_progress` after every chunk.
    pub fn scan_with_progress<S, F, P>(
        &self,
        source: &mut S,
        mut on_match: F,
        mut on_progress: P,
    ) -> Result<u64>
    where
        S: BlockSource,
        F: FnMut(SignatureMatch),
        P: FnMut(u64),
    {
        let ScanConfig {
            chunk_size,
            overlap,
        } = self.config;
        // A chunk never needs to be larger than the whole source.
        let chunk_size = usize::try_from(source.size()?)
            .map_or(chunk_size, |size| chunk_size.min(size.max(1)));

        let mut buffer = vec![0u8; overlap + chunk_size];
        let mut prefix_len = 0usize;
        let mut offset = 0u64;
        let mut found = 0usize;

        loop {
            let chunk = &mut buffer[prefix_len..prefix_len + chunk_size];
            let n = source.read_chunk(offset, chunk)?;
            if n == 0 {
                break;
            }

            let window_len = prefix_len + n;
            let window_base = offset - prefix_len as u64;
            let window = &buffer[..window_len];
            found += self.scan_window(window, prefix_len, window_base, &mut on_match);
            debug!(offset, bytes = n, "scanned chunk");

            let keep = overlap.min(window_len);
            buffer.copy_within(window_len - keep..window_len, 0);
            prefix_len = keep;
            offset += n as u64;
            on_progress(offset);
        }

        info!(bytes = offset, matches = found, "signature scan complete");
        Ok(offset)
    }

    /// Searches one window. The first `prefix_len` bytes were already part
    /// of the previous window, so matches lying wholly inside them are skipped.
    fn scan_window<F>(
        &self,
        window: &[u8],
        prefix_len: usize,
        window_base: u64,
        on_match: &mut F,
    ) -> usize
    where
        F: FnMut(SignatureMatch),
    {
        let mut found = 0;
        for (sig, finder) in self.signatures.iter().zip(&self.finders) {
            let pattern_len = sig.pattern().len();
            let mut pos = 0;
            while let Some(hit) = finder.find(&window[pos..]) {
                let start = pos + hit;
                if start + pattern_len > prefix_len {
                    on_match(SignatureMatch::new(sig, window_base + start as u64));
                    found += 1;
                }
                // Resume one byte on so overlapping occurrences are reported too.
                pos = start + 1;
            }
        }
        found
    }
}

impl Default for SignatureScanner {
    fn default() -> Self {
        Self::build(SignatureSet::default(), ScanConfig::default())
    }
}

/// Scans the image at `path` with the default signature table and chunking.
pub fn scan_for_signatures(path: impl AsRef<Path>) -> Result<Vec<SignatureMatch>> {
    let mut image = DiskImage::open(path)?;
    SignatureScanner::default().scan(&mut image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::Signature;
    use std::io::Cursor;

    fn offsets(matches: &[SignatureMatch]) -> Vec<(&str, u64)> {
        matches.iter().map(|m| (m.name.as_str(), m.offset)).collect()
    }

    #[test]
    fn finds_default_signatures() {
        let mut data = vec![0u8; 4096];
        data[100..108].copy_from_slice(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        data[500..505].copy_from_slice(b"%PDF-");
        data[900..903].copy_from_slice(b"ID3");

        let matches = SignatureScanner::default()
            .scan(&mut Cursor::new(data))
            .unwrap();
        assert_eq!(offsets(&matches), [("PNG", 100), ("PDF", 500), ("MP3", 900)]);
    }

    #[test]
    fn overlapping_occurrences_are_all_reported() {
        let set = SignatureSet::new().with(Signature::new("AA", *b"AA", ".aa"));
        let scanner = SignatureScanner::new(set, ScanConfig::default()).unwrap();

        let matches = scanner.scan(&mut Cursor::new(b"xAAAAx".to_vec())).unwrap();
        assert_eq!(offsets(&matches), [("AA", 1), ("AA", 2), ("AA", 3)]);
    }

    #[test]
    fn one_position_matching_two_signatures_is_reported_twice() {
        let set = SignatureSet::new()
            .with(Signature::new("short", [0xFF, 0xD8], ".a"))
            .with(Signature::new("long", [0xFF, 0xD8, 0xFF], ".b"));
        let scanner = SignatureScanner::new(set, ScanConfig::default()).unwrap();

        let matches = scanner
            .scan(&mut Cursor::new(vec![0, 0xFF, 0xD8, 0xFF, 0]))
            .unwrap();
        assert_eq!(offsets(&matches), [("short", 1), ("long", 1)]);
    }

    #[test]
    fn order_follows_table_not_offset() {
        let mut data = vec![0u8; 1024];
        data[10..13].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        data[600..608].copy_from_slice(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);

        let matches = SignatureScanner::default()
            .scan(&mut Cursor::new(data))
            .unwrap();
        assert_eq!(offsets(&matches), [("PNG", 600), ("JPEG", 10)]);
    }

    #[test]
    fn signature_split_across_chunks_reported_once() {
        let chunk = 256;
        let mut data = vec![0u8; chunk * 3];
        let at = chunk - 3;
        data[at..at + 8].copy_from_slice(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);

        let scanner = SignatureScanner::new(
            SignatureSet::default(),
            ScanConfig::default().with_chunk_size(chunk),
        )
        .unwrap();
        let matches = scanner.scan(&mut Cursor::new(data)).unwrap();
        assert_eq!(offsets(&matches), [("PNG", at as u64)]);
    }

    #[test]
    fn signature_in_carried_tail_not_duplicated() {
        let chunk = 256;
        let mut data = vec![0u8; chunk * 2];
        data[chunk - 10..chunk - 7].copy_from_slice(&[0xFF, 0xD8, 0xFF]);

        let scanner = SignatureScanner::new(
            SignatureSet::default(),
            ScanConfig::default().with_chunk_size(chunk),
        )
        .unwrap();
        let matches = scanner.scan(&mut Cursor::new(data)).unwrap();
        assert_eq!(offsets(&matches), [("JPEG", (chunk - 10) as u64)]);
    }

    #[test]
    fn chunk_smaller_than_overlap_still_exact() {
        let mut data = vec![0u8; 100];
        data[37..40].copy_from_slice(b"ID3");
        data[70..73].copy_from_slice(b"ID3");

        let scanner = SignatureScanner::new(
            SignatureSet::default(),
            ScanConfig::default().with_chunk_size(7),
        )
        .unwrap();
        let matches = scanner.scan(&mut Cursor::new(data)).unwrap();
        assert_eq!(offsets(&matches), [("MP3", 37), ("MP3", 70)]);
    }

    #[test]
    fn empty_source_yields_nothing() {
        let mut source = Cursor::new(Vec::<u8>::new());
        let scanned = SignatureScanner::default()
            .scan_with(&mut source, |_| panic!("no match expected"))
            .unwrap();
        assert_eq!(scanned, 0);
    }

    #[test]
    fn progress_reported_per_chunk() {
        let scanner = SignatureScanner::new(
            SignatureSet::default(),
            ScanConfig::default().with_chunk_size(100),
        )
        .unwrap();
        let mut seen = Vec::new();
        let total = scanner
            .scan_with_progress(
                &mut Cursor::new(vec![0u8; 250]),
                |_| {},
                |p| seen.push(p),
            )
            .unwrap();
        assert_eq!(total, 250);
        assert_eq!(seen, [100, 200, 250]);
    }

    #[test]
    fn rejects_window_size_overflow() {
        for config in [
            ScanConfig::default().with_chunk_size(usize::MAX),
            ScanConfig::default().with_chunk_size(usize::MAX - 63),
            ScanConfig::default().with_overlap(usize::MAX),
        ] {
            assert!(matches!(
                SignatureScanner::new(SignatureSet::default(), config),
                Err(ForensicError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn huge_chunk_size_scans_small_source() {
        let scanner = SignatureScanner::new(
            SignatureSet::default(),
            ScanConfig::default().with_chunk_size(usize::MAX - 64),
        )
        .unwrap();
        let mut data = vec![0u8; 16];
        data[4..7].copy_from_slice(b"ID3");

        let matches = scanner.scan(&mut Cursor::new(data)).unwrap();
        assert_eq!(offsets(&matches), [("MP3", 4)]);
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(matches!(
            SignatureScanner::new(
                SignatureSet::default(),
                ScanConfig::default().with_chunk_size(0)
            ),
            Err(ForensicError::InvalidArgument(_))
        ));
        assert!(matches!(
            SignatureScanner::new(SignatureSet::default(), ScanConfig::default().with_overlap(4)),
            Err(ForensicError::InvalidArgument(_))
        ));
        let empty = SignatureSet::new().with(Signature::new("empty", Vec::new(), ".bin"));
        assert!(SignatureScanner::new(empty, ScanConfig::default()).is_err());
    }
}
