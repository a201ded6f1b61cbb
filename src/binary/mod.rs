//! Binary defs: the sectioned container read by the game client and server.
//!
//! Layout (all little-endian):
//!
//! ```text
//! u16 ver_minor, u16 ver_major, u32 section_count, u32 reserved[2]
//! section_count x { u8 name[8], u32 offset, u32 byte_len }
//! section bodies, each padded to 8 bytes
//! ```
//!
//! Intern tables come first, then converted sections and indices in the
//! order they were produced.

pub mod client;
mod conv;
pub mod phf;
mod reader;
pub mod server;

use std::collections::BTreeMap;

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;
use serde_json::Value;

use crate::error::{DataError, Result};

pub use conv::{Conv, Field, Interner, Layout, Scalar};
pub use phf::{InProcess, PhfBuilder, PhfTable, Subprocess};
pub use reader::BinaryDefs;

/// Bumped when the file or section header format changes.
pub const VER_MAJOR: u16 = 2;

pub const HEADER_SIZE: usize = 16;
const SECTION_NAME_LEN: usize = 8;

/// JSON tables the encoders read, keyed by output stem (`items`, `recipes`, ...).
pub type Tables = BTreeMap<String, Value>;

/// Look up a table that must be present.
pub fn table<'t>(tables: &'t Tables, key: &str) -> Result<&'t [Value]> {
    tables
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| DataError::encoding(format!("missing `{}` table", key)))
}

/// Names of the rows of `rows`, in row order.
pub fn row_names(rows: &[Value]) -> Result<Vec<String>> {
    rows.iter()
        .map(|r| {
            r.get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| DataError::encoding("row has no `name`"))
        })
        .collect()
}

/// Accumulates sections for one container.
pub struct Context<'a> {
    interner: Interner,
    sections: Vec<(String, Vec<u8>)>,
    phf: &'a dyn PhfBuilder,
}

impl<'a> Context<'a> {
    pub fn new(phf: &'a dyn PhfBuilder) -> Self {
        Self {
            interner: Interner::default(),
            sections: Vec::new(),
            phf,
        }
    }

    pub fn init_intern_table(&mut self, section: &str, align: usize) {
        self.interner.declare(section, align);
    }

    fn check_new(&self, section: &str) -> Result<()> {
        if section.len() > SECTION_NAME_LEN {
            return Err(DataError::encoding(format!(
                "section name `{}` is longer than {} bytes",
                section, SECTION_NAME_LEN
            )));
        }
        if self.interner.is_declared(section) || self.sections.iter().any(|(n, _)| n == section) {
            return Err(DataError::encoding(format!("section `{}` written twice", section)));
        }
        Ok(())
    }

    /// Convert every row of `objs` with `conv` into a new section.
    pub fn convert(&mut self, section: &str, conv: &Conv, objs: &[Value]) -> Result<()> {
        self.check_new(section)?;
        let mut bytes = Vec::with_capacity(objs.len() * conv.size());
        for (i, obj) in objs.iter().enumerate() {
            conv.convert(&mut self.interner, obj, &mut bytes)
                .map_err(|e| DataError::encoding(format!("{}[{}]: {}", section, i, conv::strip(e))))?;
        }
        self.sections.push((section.to_string(), bytes));
        Ok(())
    }

    /// Emit `IxTb<tag>` (slot to row index, empty slots all-ones) and
    /// `IxPr<tag>` (`u32 m`, then one displacement per bucket).
    pub fn build_index(&mut self, tag: &str, names: &[String], idx: Scalar) -> Result<()> {
        let tb = format!("IxTb{}", tag);
        let pr = format!("IxPr{}", tag);
        self.check_new(&tb)?;
        self.check_new(&pr)?;

        let t = self.phf.build(names)?;
        if t.hashes.len() != names.len() {
            return Err(DataError::encoding(format!(
                "index {}: {} slots for {} names",
                tag,
                t.hashes.len(),
                names.len()
            )));
        }
        let mut table = vec![idx.sentinel(); t.size as usize];
        for (i, &h) in t.hashes.iter().enumerate() {
            table[h as usize] = i as i64;
        }
        let mut tb_bytes = Vec::with_capacity(table.len() * idx.size());
        for x in table {
            idx.write(&mut tb_bytes, x)
                .map_err(|e| DataError::encoding(format!("index {}: {}", tag, conv::strip(e))))?;
        }

        let mut pr_bytes = Vec::with_capacity(4 + t.params.len() * idx.size());
        let m = u32::try_from(t.raw_size)
            .map_err(|_| DataError::encoding(format!("index {}: modulus {} too large", tag, t.raw_size)))?;
        let _ = pr_bytes.write_u32::<LittleEndian>(m);
        for &p in &t.params {
            idx.write(&mut pr_bytes, p as i64)
                .map_err(|e| DataError::encoding(format!("index {}: {}", tag, conv::strip(e))))?;
        }

        debug!("index {}: {} names in {} slots", tag, names.len(), t.size);
        self.sections.push((tb, tb_bytes));
        self.sections.push((pr, pr_bytes));
        Ok(())
    }

    /// Serialize the container.
    pub fn finish(self, ver_minor: u16) -> Result<Vec<u8>> {
        let sections: Vec<(String, Vec<u8>)> =
            self.interner.into_sections().chain(self.sections).collect();
        write_container(ver_minor, &sections)
    }
}

fn pad8(n: usize) -> usize {
    (n + 7) & !7
}

pub fn write_container(ver_minor: u16, sections: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let too_big = || DataError::encoding("binary defs exceed 4 GiB");
    let count = u32::try_from(sections.len()).map_err(|_| too_big())?;

    let mut out = Vec::new();
    let _ = out.write_u16::<LittleEndian>(ver_minor);
    let _ = out.write_u16::<LittleEndian>(VER_MAJOR);
    let _ = out.write_u32::<LittleEndian>(count);
    let _ = out.write_u32::<LittleEndian>(0);
    let _ = out.write_u32::<LittleEndian>(0);

    let mut offset = HEADER_SIZE * (1 + sections.len());
    for (name, body) in sections {
        if name.len() > SECTION_NAME_LEN {
            return Err(DataError::encoding(format!("section name `{}` is too long", name)));
        }
        let mut raw = [0u8; SECTION_NAME_LEN];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&raw);
        let _ = out.write_u32::<LittleEndian>(u32::try_from(offset).map_err(|_| too_big())?);
        let _ = out.write_u32::<LittleEndian>(u32::try_from(body.len()).map_err(|_| too_big())?);
        offset = pad8(offset + body.len());
    }

    for (_, body) in sections {
        out.extend_from_slice(body);
        out.resize(pad8(out.len()), 0);
    }
    Ok(out)
}
