//! Decoder for binary defs containers.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{DataError, Result};

use super::phf;
use super::HEADER_SIZE;

/// A parsed container. Section bodies are copied out of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryDefs {
    pub ver_minor: u16,
    pub ver_major: u16,
    pub sections: Vec<(String, Vec<u8>)>,
}

fn truncated(what: &str) -> DataError {
    DataError::encoding(format!("truncated binary defs: {}", what))
}

impl BinaryDefs {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(bytes);
        let ver_minor = r.read_u16::<LittleEndian>().map_err(|_| truncated("header"))?;
        let ver_major = r.read_u16::<LittleEndian>().map_err(|_| truncated("header"))?;
        let count = r.read_u32::<LittleEndian>().map_err(|_| truncated("header"))? as usize;
        r.set_position(HEADER_SIZE as u64);

        let mut sections = Vec::with_capacity(count.min(1024));
        for i in 0..count {
            let start = HEADER_SIZE * (1 + i);
            let raw = bytes
                .get(start..start + 8)
                .ok_or_else(|| truncated("section table"))?;
            let name = String::from_utf8_lossy(raw).trim_end_matches('\0').to_string();
            r.set_position((start + 8) as u64);
            let offset = r.read_u32::<LittleEndian>().map_err(|_| truncated("section table"))? as usize;
            let len = r.read_u32::<LittleEndian>().map_err(|_| truncated("section table"))? as usize;
            let body = bytes
                .get(offset..offset + len)
                .ok_or_else(|| truncated(&format!("section `{}`", name)))?;
            sections.push((name, body.to_vec()));
        }
        Ok(Self {
            ver_minor,
            ver_major,
            sections,
        })
    }

    pub fn section(&self, name: &str) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.as_slice())
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// All little-endian `u16`s of a section.
    pub fn u16s(&self, name: &str) -> Option<Vec<u16>> {
        let body = self.section(name)?;
        Some(
            body.chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        )
    }

    /// The `len` bytes at `offset` of the `Strings` section.
    pub fn string(&self, offset: usize, len: usize) -> Option<&str> {
        let body = self.section("Strings")?;
        std::str::from_utf8(body.get(offset..offset + len)?).ok()
    }

    /// Row index of `name` through the `u16` perfect hash index `tag`.
    ///
    /// Returns `Ok(None)` when the slot is empty. A name that was not in the
    /// index may still land on an occupied slot; callers compare names.
    pub fn lookup(&self, tag: &str, name: &str) -> Result<Option<u16>> {
        let missing = || DataError::encoding(format!("no index `{}`", tag));
        let table = self.u16s(&format!("IxTb{}", tag)).ok_or_else(missing)?;
        let params = self.section(&format!("IxPr{}", tag)).ok_or_else(missing)?;
        let mut r = Cursor::new(params);
        let m = r.read_u32::<LittleEndian>().map_err(|_| truncated("index params"))? as u64;
        let ls: Vec<u64> = params[4..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as u64)
            .collect();
        if table.is_empty() {
            return Ok(None);
        }
        let slot = phf::lookup(name, m, &ls) as usize;
        Ok(table
            .get(slot)
            .copied()
            .filter(|&i| i != u16::MAX))
    }
}
