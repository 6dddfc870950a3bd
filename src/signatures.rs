//! Magic-byte signatures used for carving.

use crate::ext::serialize_hex;
use serde::Serialize;
use std::fmt;

/// A file type label, the magic bytes that begin such files, and the
/// extension suggested for carved output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    pattern: Vec<u8>,
    extension: String,
}

impl Signature {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<Vec<u8>>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            extension: extension.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {}",
            self.name,
            self.extension,
            hex::encode_upper(&self.pattern)
        )
    }
}

/// Ordered signature table handed to the scanner.
///
/// Matches within one scan window are reported in table order, so the order
/// of registration is observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    signatures: Vec<Signature>,
}

impl SignatureSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            signatures: Vec::new(),
        }
    }

    pub fn register(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    pub fn with(mut self, signature: Signature) -> Self {
        self.register(signature);
        self
    }

    /// Keeps only the signatures whose label matches one of `names`
    /// (case-insensitive), preserving table order.
    pub fn retain_names<S: AsRef<str>>(&mut self, names: &[S]) {
        self.signatures.retain(|sig| {
            names
                .iter()
                .any(|n| n.as_ref().eq_ignore_ascii_case(&sig.name))
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn longest_pattern(&self) -> usize {
        self.signatures
            .iter()
            .map(|s| s.pattern.len())
            .max()
            .unwrap_or(0)
    }
}

impl Default for SignatureSet {
    /// PNG, JPEG, PDF and the ID3 tag that opens most MP3 files.
    fn default() -> Self {
        Self::new()
            .with(Signature::new(
                "PNG",
                [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
                ".png",
            ))
            .with(Signature::new("JPEG", [0xFF, 0xD8, 0xFF], ".jpg"))
            .with(Signature::new("PDF", *b"%PDF-", ".pdf"))
            .with(Signature::new("MP3", *b"ID3", ".mp3"))
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a Signature;
    type IntoIter = std::slice::Iter<'a, Signature>;

    fn into_iter(self) -> Self::IntoIter {
        self.signatures.iter()
    }
}

/// One occurrence of a signature in the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureMatch {
    pub name: String,
    pub ext: String,
    /// Absolute byte offset in the image.
    pub offset: u64,
    #[serde(serialize_with = "serialize_hex")]
    pub sig: Vec<u8>,
}

impl SignatureMatch {
    pub(crate) fn new(signature: &Signature, offset: u64) -> Self {
        Self {
            name: signature.name.clone(),
            ext: signature.extension.clone(),
            offset,
            sig: signature.pattern.clone(),
        }
    }
}
