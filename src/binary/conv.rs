//! Conversions from JSON rows to packed little-endian bytes.
//!
//! A [`Conv`] describes the binary shape of one value. Strings and
//! sequences do not live inline: their bytes are interned into a separate
//! section and the row stores `(offset, length)`.

use std::collections::HashMap;

use byteorder::{LittleEndian, WriteBytesExt};
use serde_json::Value;

use crate::error::{DataError, Result};

/// Fixed-width integer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl Scalar {
    pub fn size(self) -> usize {
        match self {
            Scalar::U8 | Scalar::I8 => 1,
            Scalar::U16 | Scalar::I16 => 2,
            Scalar::U32 | Scalar::I32 => 4,
        }
    }

    fn range(self) -> (i64, i64) {
        match self {
            Scalar::U8 => (0, u8::MAX as i64),
            Scalar::I8 => (i8::MIN as i64, i8::MAX as i64),
            Scalar::U16 => (0, u16::MAX as i64),
            Scalar::I16 => (i16::MIN as i64, i16::MAX as i64),
            Scalar::U32 => (0, u32::MAX as i64),
            Scalar::I32 => (i32::MIN as i64, i32::MAX as i64),
        }
    }

    /// The all-ones value of this width, used for empty index slots.
    pub fn sentinel(self) -> i64 {
        match self {
            Scalar::U8 => u8::MAX as i64,
            Scalar::U16 => u16::MAX as i64,
            Scalar::U32 => u32::MAX as i64,
            Scalar::I8 | Scalar::I16 | Scalar::I32 => -1,
        }
    }

    pub fn write(self, out: &mut Vec<u8>, v: i64) -> Result<()> {
        let (lo, hi) = self.range();
        if v < lo || v > hi {
            return Err(DataError::encoding(format!(
                "value {} does not fit in {:?} ({}..={})",
                v, self, lo, hi
            )));
        }
        // Writes into a Vec cannot fail.
        let _ = match self {
            Scalar::U8 => out.write_u8(v as u8),
            Scalar::I8 => out.write_i8(v as i8),
            Scalar::U16 => out.write_u16::<LittleEndian>(v as u16),
            Scalar::I16 => out.write_i16::<LittleEndian>(v as i16),
            Scalar::U32 => out.write_u32::<LittleEndian>(v as u32),
            Scalar::I32 => out.write_i32::<LittleEndian>(v as i32),
        };
        Ok(())
    }
}

fn as_int(v: &Value) -> Result<i64> {
    match v {
        Value::Bool(b) => Ok(*b as i64),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| DataError::encoding(format!("{} is not an integer", n))),
        other => Err(DataError::encoding(format!("expected an integer, got {}", other))),
    }
}

fn as_array(v: &Value) -> Result<&Vec<Value>> {
    v.as_array()
        .ok_or_else(|| DataError::encoding(format!("expected an array, got {}", v)))
}

/// Append-only byte tables with content deduplication.
#[derive(Debug, Default)]
pub struct Interner {
    tables: Vec<InternTable>,
}

#[derive(Debug)]
struct InternTable {
    name: String,
    align: usize,
    bytes: Vec<u8>,
    offsets: HashMap<Vec<u8>, usize>,
}

impl Interner {
    pub fn declare(&mut self, section: &str, align: usize) {
        if self.tables.iter().all(|t| t.name != section) {
            self.tables.push(InternTable {
                name: section.to_string(),
                align: align.max(1),
                bytes: Vec::new(),
                offsets: HashMap::new(),
            });
        }
    }

    pub fn is_declared(&self, section: &str) -> bool {
        self.tables.iter().any(|t| t.name == section)
    }

    /// Offset of `b` in `section`, appending it on first sight.
    pub fn intern(&mut self, section: &str, b: &[u8]) -> Result<usize> {
        let table = self
            .tables
            .iter_mut()
            .find(|t| t.name == section)
            .ok_or_else(|| DataError::encoding(format!("no intern table named `{}`", section)))?;
        if let Some(&offset) = table.offsets.get(b) {
            return Ok(offset);
        }
        let pad = (table.align - table.bytes.len() % table.align) % table.align;
        table.bytes.resize(table.bytes.len() + pad, 0);
        let offset = table.bytes.len();
        table.bytes.extend_from_slice(b);
        table.offsets.insert(b.to_vec(), offset);
        Ok(offset)
    }

    pub fn into_sections(self) -> impl Iterator<Item = (String, Vec<u8>)> {
        self.tables.into_iter().map(|t| (t.name, t.bytes))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Conv {
    Scalar(Scalar),
    Vector(Scalar, usize),
    /// UTF-8 bytes interned into `section`; stored as `(offset, byte length)`.
    String { section: &'static str, idx: Scalar },
    /// Concatenated element bytes interned into `section`; stored as
    /// `(offset, element count)`.
    Sequence {
        section: &'static str,
        inner: Box<Conv>,
        idx: Scalar,
    },
    Struct(Layout),
}

impl Conv {
    pub fn string() -> Self {
        Conv::String {
            section: "Strings",
            idx: Scalar::U32,
        }
    }

    pub fn sequence(section: &'static str, inner: Conv, idx: Scalar) -> Self {
        Conv::Sequence {
            section,
            inner: Box::new(inner),
            idx,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Conv::Scalar(s) => s.size(),
            Conv::Vector(s, n) => s.size() * n,
            Conv::String { idx, .. } | Conv::Sequence { idx, .. } => idx.size() * 2,
            Conv::Struct(l) => l.size,
        }
    }

    pub fn align(&self) -> usize {
        match self {
            Conv::Scalar(s) | Conv::Vector(s, _) => s.size(),
            Conv::String { idx, .. } | Conv::Sequence { idx, .. } => idx.size(),
            Conv::Struct(l) => l.align,
        }
    }

    pub fn convert(&self, interner: &mut Interner, v: &Value, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Conv::Scalar(s) => s.write(out, as_int(v)?),
            Conv::Vector(s, n) => {
                let xs = as_array(v)?;
                if xs.len() != *n {
                    return Err(DataError::encoding(format!(
                        "expected {} values, got {}",
                        n,
                        xs.len()
                    )));
                }
                xs.iter().try_for_each(|x| s.write(out, as_int(x)?))
            }
            Conv::String { section, idx } => {
                let s = v
                    .as_str()
                    .ok_or_else(|| DataError::encoding(format!("expected a string, got {}", v)))?;
                let offset = interner.intern(section, s.as_bytes())?;
                idx.write(out, offset as i64)?;
                idx.write(out, s.len() as i64)
            }
            Conv::Sequence { section, inner, idx } => {
                let xs = as_array(v)?;
                let mut bytes = Vec::with_capacity(xs.len() * inner.size());
                for x in xs {
                    inner.convert(interner, x, &mut bytes)?;
                }
                let offset = interner.intern(section, &bytes)?;
                idx.write(out, offset as i64)?;
                idx.write(out, xs.len() as i64)
            }
            Conv::Struct(l) => l.convert(interner, v, out),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub key: &'static str,
    pub conv: Conv,
    pub default: Option<Value>,
    pub offset: usize,
}

impl Field {
    pub fn new(key: &'static str, conv: Conv) -> Self {
        Self {
            key,
            conv,
            default: None,
            offset: 0,
        }
    }

    pub fn default(mut self, v: Value) -> Self {
        self.default = Some(v);
        self
    }
}

/// A C-style struct: each field at the next multiple of its alignment,
/// total size rounded up to the largest alignment. Padding is zero.
#[derive(Debug, Clone)]
pub struct Layout {
    pub fields: Vec<Field>,
    pub size: usize,
    pub align: usize,
}

fn round_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

impl Layout {
    pub fn new(mut fields: Vec<Field>) -> Self {
        let mut offset = 0;
        let mut max_align = 1;
        for f in &mut fields {
            let align = f.conv.align();
            f.offset = round_up(offset, align);
            offset = f.offset + f.conv.size();
            max_align = max_align.max(align);
        }
        Self {
            fields,
            size: round_up(offset, max_align),
            align: max_align,
        }
    }

    fn convert(&self, interner: &mut Interner, v: &Value, out: &mut Vec<u8>) -> Result<()> {
        let obj = v
            .as_object()
            .ok_or_else(|| DataError::encoding(format!("expected an object, got {}", v)))?;
        let start = out.len();
        for f in &self.fields {
            out.resize(start + f.offset, 0);
            let value = match obj.get(f.key) {
                Some(Value::Null) | None => f.default.as_ref(),
                Some(v) => Some(v),
            }
            .ok_or_else(|| DataError::encoding(format!("missing field `{}`", f.key)))?;
            f.conv
                .convert(interner, value, out)
                .map_err(|e| DataError::encoding(format!("field `{}`: {}", f.key, strip(e))))?;
        }
        out.resize(start + self.size, 0);
        Ok(())
    }
}

/// The bare message of an encoding error, for re-wrapping with context.
pub(crate) fn strip(e: DataError) -> String {
    match e {
        DataError::Encoding { message } => message,
        other => other.to_string(),
    }
}
