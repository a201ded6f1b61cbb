//! Deep content descriptors for image expressions.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

/// SHA-1 of an expression's variant tag, parameters and child descriptors.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(pub [u8; 20]);

impl Descriptor {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Option<Self> {
        let bytes = STANDARD.decode(s.trim()).ok()?;
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(Descriptor(arr))
    }

    /// Hash arbitrary bytes, e.g. the contents of a source file.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut h = Sha1::new();
        h.update(bytes);
        digest(h)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..6] {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Canonical byte encoder feeding a SHA-1 hasher.
pub struct DescWriter {
    hasher: Sha1,
}

impl DescWriter {
    pub fn new(tag: u8) -> Self {
        let mut hasher = Sha1::new();
        hasher.update([tag]);
        Self { hasher }
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.hasher.update([v]);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.hasher.update(v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.hasher.update(v.to_le_bytes());
        self
    }

    pub fn size(&mut self, size: (u32, u32)) -> &mut Self {
        self.u32(size.0).u32(size.1)
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.u32(b.len() as u32);
        self.hasher.update(b);
        self
    }

    pub fn child(&mut self, d: &Descriptor) -> &mut Self {
        self.hasher.update(d.0);
        self
    }

    pub fn finish(self) -> Descriptor {
        digest(self.hasher)
    }
}

fn digest(h: Sha1) -> Descriptor {
    let mut out = [0u8; 20];
    out.copy_from_slice(&h.finalize());
    Descriptor(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        let d = Descriptor::of_bytes(b"wood");
        let s = d.to_base64();
        assert_eq!(Descriptor::from_base64(&s), Some(d));
        assert_eq!(Descriptor::from_base64("not base64!"), None);
        assert_eq!(Descriptor::from_base64("AAAA"), None);
    }

    #[test]
    fn test_params_change_descriptor() {
        let mut a = DescWriter::new(b'B');
        a.size((16, 16));
        let mut b = DescWriter::new(b'B');
        b.size((16, 17));
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_length_prefix_separates_fields() {
        let mut a = DescWriter::new(b'X');
        a.bytes(b"ab").bytes(b"c");
        let mut b = DescWriter::new(b'X');
        b.bytes(b"a").bytes(b"bc");
        assert_ne!(a.finish(), b.finish());
    }
}
