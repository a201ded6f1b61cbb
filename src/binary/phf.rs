//! Perfect hash tables for name lookups in binary defs.
//!
//! Hash-and-displace: every name is first hashed with a fixed key into one
//! of `r` buckets. Each bucket then gets a displacement `l` such that
//! hashing its names with key `(K0 + l, K1 - l)` lands them in distinct,
//! unused slots below `b`. Readers store `m` and the `r` displacements and
//! compute `slot = hash(name, key(params[hash(name, K) % r])) % m`.
//!
//! The builder speaks a line protocol so it can also run as a separate
//! program (`outpost-build-phf`): names one per line on stdin, three lines
//! on stdout:
//!
//! ```text
//! sizes <b> <m> <r>
//! hashes <slot of name 0> <slot of name 1> ...
//! params <l_0> <l_1> ... <l_{r-1}>
//! ```
//!
//! `b` is the number of table slots (90% load), `m >= b` is the hash
//! modulus (a power of two) and `r` the number of displacement parameters.

use std::hash::{Hash, Hasher};
#[allow(deprecated)]
use std::hash::SipHasher;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{DataError, Result};

const K_G: (u64, u64) = (0x123456, 0xfedcba);

/// Displacements tried per bucket before giving up.
const MAX_ATTEMPTS: u64 = 1 << 20;

#[allow(deprecated)]
fn hash<H: Hash + ?Sized>(s: &H, k: (u64, u64)) -> u64 {
    let mut h = SipHasher::new_with_keys(k.0, k.1);
    s.hash(&mut h);
    h.finish()
}

fn key(l: u64) -> (u64, u64) {
    (K_G.0.wrapping_add(l), K_G.1.wrapping_sub(l))
}

/// Slot of `s` given the stored modulus and displacement parameters.
pub fn lookup(s: &str, m: u64, params: &[u64]) -> u64 {
    if params.is_empty() || m == 0 {
        return 0;
    }
    let r = params.len() as u64;
    let l = params[(hash(s, K_G) % r) as usize];
    hash(s, key(l)) % m
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhfTable {
    /// Table slots.
    pub size: u64,
    /// Hash modulus.
    pub raw_size: u64,
    /// Slot of each input name, in input order.
    pub hashes: Vec<u64>,
    /// One displacement per bucket.
    pub params: Vec<u64>,
}

impl PhfTable {
    /// Parse the three-line output of the builder.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let mut field = |tag: &str| -> Result<Vec<u64>> {
            let line = lines
                .next()
                .ok_or_else(|| bad_output(format!("missing `{}` line", tag)))?;
            let mut words = line.split_whitespace();
            if words.next() != Some(tag) {
                return Err(bad_output(format!("expected `{}` line, got `{}`", tag, line)));
            }
            words
                .map(|w| {
                    w.parse::<u64>()
                        .map_err(|_| bad_output(format!("bad number `{}` in `{}` line", w, tag)))
                })
                .collect()
        };
        let sizes = field("sizes")?;
        let hashes = field("hashes")?;
        let params = field("params")?;
        let [size, raw_size, r] = sizes[..] else {
            return Err(bad_output("`sizes` needs three values"));
        };
        if params.len() as u64 != r {
            return Err(bad_output(format!("expected {} params, got {}", r, params.len())));
        }
        if let Some(h) = hashes.iter().find(|&&h| h >= size) {
            return Err(bad_output(format!("slot {} out of range for {} slots", h, size)));
        }
        Ok(Self {
            size,
            raw_size,
            hashes,
            params,
        })
    }

    pub fn to_text(&self) -> String {
        let join = |xs: &[u64]| xs.iter().map(|x| format!(" {}", x)).collect::<String>();
        format!(
            "sizes {} {} {}\nhashes{}\nparams{}\n",
            self.size,
            self.raw_size,
            self.params.len(),
            join(&self.hashes),
            join(&self.params)
        )
    }
}

fn bad_output(message: impl Into<String>) -> DataError {
    DataError::Build {
        message: format!("perfect hash builder output: {}", message.into()),
        help: None,
    }
}

/// Build a perfect hash table for `names`, which must be distinct.
pub fn build(names: &[String]) -> Result<PhfTable> {
    // 90% load factor on the main table.
    let size = names.len() as u64 * 111 / 100;
    let size_bits = 32 - (size as u32).leading_zeros();
    let raw_size = 1u64 << size_bits;
    // 400% load factor on the displacement table.
    let r = (raw_size / 4).max(1);

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); r as usize];
    for (i, s) in names.iter().enumerate() {
        buckets[(hash(s.as_str(), K_G) % r) as usize].push(i);
    }

    let mut order: Vec<usize> = (0..r as usize).collect();
    order.sort_by_key(|&i| buckets[i].len());

    let mut params = vec![0u64; r as usize];
    let mut used = vec![false; size as usize];
    for i in order.into_iter().rev() {
        let bucket = &buckets[i];
        let mut found = None;
        'attempt: for l in 0..MAX_ATTEMPTS {
            let k = key(l);
            let mut slots = Vec::with_capacity(bucket.len());
            for &idx in bucket {
                let slot = hash(names[idx].as_str(), k) % raw_size;
                if slot >= size || used[slot as usize] || slots.contains(&slot) {
                    continue 'attempt;
                }
                slots.push(slot);
            }
            found = Some((l, slots));
            break;
        }
        let (l, slots) = found.ok_or_else(|| DataError::Build {
            message: format!("no perfect hash found for {} names", names.len()),
            help: Some("check the name list for duplicates".into()),
        })?;
        params[i] = l;
        for s in slots {
            used[s as usize] = true;
        }
    }

    let hashes = names
        .iter()
        .map(|s| lookup(s, raw_size, &params))
        .collect();
    debug!("phf: {} names, {} slots, {} params", names.len(), size, r);
    Ok(PhfTable {
        size,
        raw_size,
        hashes,
        params,
    })
}

/// Source of perfect hash tables for the encoder.
pub trait PhfBuilder {
    fn build(&self, names: &[String]) -> Result<PhfTable>;
}

/// Builds tables in this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcess;

impl PhfBuilder for InProcess {
    fn build(&self, names: &[String]) -> Result<PhfTable> {
        build(names)
    }
}

/// Runs an external builder program speaking the line protocol.
#[derive(Debug, Clone)]
pub struct Subprocess {
    pub program: PathBuf,
}

impl Subprocess {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }
}

impl PhfBuilder for Subprocess {
    fn build(&self, names: &[String]) -> Result<PhfTable> {
        let spawn_err = |e: std::io::Error| DataError::Build {
            message: format!("failed to run {}: {}", self.program.display(), e),
            help: Some("set OUTPOST_BUILD_PHF to the perfect hash builder".into()),
        };
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;
        let input: String = names.iter().map(|n| format!("{}\n", n)).collect();
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).map_err(spawn_err)?;
        }
        let out = child.wait_with_output().map_err(spawn_err)?;
        if !out.status.success() {
            return Err(DataError::Build {
                message: format!("{} exited with {}", self.program.display(), out.status),
                help: None,
            });
        }
        let text = String::from_utf8_lossy(&out.stdout);
        let table = PhfTable::parse(&text)?;
        if table.hashes.len() != names.len() {
            return Err(bad_output(format!(
                "{} hashes for {} names",
                table.hashes.len(),
                names.len()
            )));
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sizes() {
        let t = build(&names(&["wood", "stone", "none"])).unwrap();
        assert_eq!(t.size, 3);
        assert_eq!(t.raw_size, 4);
        assert_eq!(t.params.len(), 1);

        let empty = build(&[]).unwrap();
        assert_eq!((empty.size, empty.raw_size, empty.params.len()), (0, 1, 1));
    }

    #[test]
    fn test_text_round_trip() {
        let t = build(&names(&["a", "b", "c", "d", "e"])).unwrap();
        assert_eq!(PhfTable::parse(&t.to_text()).unwrap(), t);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(PhfTable::parse("sizes 1 2\nhashes 0\nparams 0\n").is_err());
        assert!(PhfTable::parse("sizes 1 2 1\nhashes 5\nparams 0\n").is_err());
        assert!(PhfTable::parse("hello").is_err());
    }

    proptest! {
        #[test]
        fn prop_every_name_gets_its_own_slot(set in proptest::collection::btree_set("[a-z/]{1,12}", 1..200)) {
            let names: Vec<String> = set.into_iter().collect();
            let t = build(&names).unwrap();
            let slots: BTreeSet<u64> = t.hashes.iter().copied().collect();
            prop_assert_eq!(slots.len(), names.len());
            for (n, h) in names.iter().zip(&t.hashes) {
                prop_assert!(*h < t.size);
                prop_assert_eq!(lookup(n, t.raw_size, &t.params), *h);
            }
        }
    }
}
