//! Content fingerprinting using blake3.
//!
//! A [`ContentHasher`] is fed bytes incrementally and finalized into a hex
//! digest. Output names embed the first [`FINGERPRINT_LEN`] characters:
//!
//! ```text
//! app.js   + a1b2c3d4e5f60718 → app.a1b2c3d4e5f60718.js
//! images/  + a1b2c3d4e5f60718 → images.a1b2c3d4e5f60718/
//! ```

/// Number of hex characters spliced into output names.
pub const FINGERPRINT_LEN: usize = 16;

/// Streaming fingerprint accumulator.
///
/// Order-sensitive: `update(a); update(b)` differs from `update(b); update(a)`.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    inner: blake3::Hasher,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more content. May be called any number of times.
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update(bytes);
        self
    }

    /// Finalize into the full lowercase hex digest.
    pub fn digest(&self) -> ContentDigest {
        ContentDigest(*self.inner.finalize().as_bytes())
    }

    /// Finalize into the short fingerprint used in output names.
    pub fn fingerprint(&self) -> String {
        self.digest().fingerprint()
    }
}

/// A 256-bit content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn fingerprint(self) -> String {
        self.to_hex()[..FINGERPRINT_LEN].to_string()
    }
}

/// Fingerprint a single buffer.
pub fn fingerprint(content: &[u8]) -> String {
    ContentHasher::new().update(content).fingerprint()
}

/// Splice a fingerprint before the extension: `app.js` → `app.<fp>.js`.
///
/// Names without an extension get the fingerprint appended.
pub fn hashed_file_name(name: &str, fingerprint: &str) -> String {
    let split = name.rfind('/').map_or(0, |i| i + 1);
    let (dir, file) = name.split_at(split);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{dir}{stem}.{fingerprint}.{ext}"),
        _ => format!("{name}.{fingerprint}"),
    }
}

/// Append a fingerprint to a directory name: `images` → `images.<fp>`.
pub fn hashed_dir_name(name: &str, fingerprint: &str) -> String {
    format!("{name}.{fingerprint}")
}
