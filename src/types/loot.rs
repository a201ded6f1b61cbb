use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LootKind {
    Item,
    Structure,
    /// Roll on another loot table.
    Table,
}

impl LootKind {
    pub fn name(self) -> &'static str {
        match self {
            LootKind::Item => "item",
            LootKind::Structure => "structure",
            LootKind::Table => "loot table",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootEntry {
    pub kind: LootKind,
    pub name: String,
    pub weight: u16,
    /// Count range, items only.
    pub count: Option<(u16, u16)>,
    /// Set by the resolver.
    pub id: u16,
}

#[derive(Debug, Clone)]
pub struct LootTableDef {
    pub name: String,
    pub id: u16,
    pub entries: Vec<LootEntry>,
}

#[derive(Debug, Serialize)]
pub struct LootEntryJson {
    #[serde(rename = "type")]
    pub kind: LootKind,
    pub id: u16,
    pub weight: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct LootTableServerJson {
    pub name: String,
    pub entries: Vec<LootEntryJson>,
}

impl LootTableDef {
    pub fn server_json(&self) -> LootTableServerJson {
        LootTableServerJson {
            name: self.name.clone(),
            entries: self
                .entries
                .iter()
                .map(|e| LootEntryJson {
                    kind: e.kind,
                    id: e.id,
                    weight: e.weight,
                    min: e.count.map(|c| c.0),
                    max: e.count.map(|c| c.1),
                })
                .collect(),
        }
    }
}
