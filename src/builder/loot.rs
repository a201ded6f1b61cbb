use crate::error::{DataError, Result};
use crate::types::{LootEntry, LootKind, LootTableDef};

use super::{missing, Builder, Instantiate, Prototype};

#[derive(Debug, Clone, Default)]
pub struct LootTableProto {
    pub entries: Vec<LootEntry>,
}

impl Prototype for LootTableProto {
    const KIND: &'static str = "loot table";
    type Def = LootTableDef;

    fn instantiate(&self, name: &str, _cx: &mut Instantiate<'_>) -> Result<LootTableDef> {
        if self.entries.is_empty() {
            return Err(missing(name, "entries"));
        }
        for e in &self.entries {
            if e.weight == 0 {
                return Err(DataError::config(name, e.name.as_str(), "has zero weight"));
            }
            if let Some((min, max)) = e.count {
                if min > max {
                    return Err(DataError::config(
                        name,
                        e.name.as_str(),
                        format!("count range {}..{} is empty", min, max),
                    ));
                }
            }
        }
        Ok(LootTableDef {
            name: name.to_string(),
            id: 0,
            entries: self.entries.clone(),
        })
    }
}

impl Builder<LootTableProto> {
    fn entry(self, kind: LootKind, name: &str, weight: u16, count: Option<(u16, u16)>) -> Self {
        let entry = LootEntry {
            kind,
            name: name.to_string(),
            weight,
            count,
            id: 0,
        };
        self.modify(|p| p.entries.push(entry.clone()))
    }

    /// Drop between `min` and `max` of `item`.
    pub fn item(self, item: &str, weight: u16, min: u16, max: u16) -> Self {
        self.entry(LootKind::Item, item, weight, Some((min, max)))
    }

    pub fn structure(self, structure: &str, weight: u16) -> Self {
        self.entry(LootKind::Structure, structure, weight, None)
    }

    /// Roll once on another table.
    pub fn table(self, table: &str, weight: u16) -> Self {
        self.entry(LootKind::Table, table, weight, None)
    }
}
