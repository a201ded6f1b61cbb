use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{DataError, Result};
use crate::registry::IdMaps;

/// Hook for values computed by Rust declaration modules.
#[derive(Clone, Copy)]
pub struct CustomExtra(pub fn(&IdMaps) -> Result<Value>);

impl fmt::Debug for CustomExtra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomExtra(..)")
    }
}

/// How an extra's value is computed from the resolved id tables.
/// Animation and layer names are full names (`sprite//name`).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "fn", rename_all = "snake_case")]
pub enum ExtraFn {
    AnimId {
        anim: String,
    },
    LayerId {
        layer: String,
    },
    GraphicsId {
        sprite: String,
        layer: String,
        anim: String,
    },
    /// Rows of animation ids; a null row stays null.
    AnimTable {
        rows: Vec<Option<Vec<String>>>,
    },
    /// Map from animation id to a direction index.
    AnimDirTable {
        dirs: BTreeMap<String, u8>,
    },
    LayerTable {
        layers: Vec<String>,
    },
    Literal {
        value: Value,
    },
    #[serde(skip_deserializing)]
    Custom(CustomExtra),
}

fn lookup(map: &BTreeMap<String, u16>, kind: &str, name: &str) -> Result<u16> {
    map.get(name)
        .copied()
        .ok_or_else(|| DataError::resolution(kind, name))
}

impl ExtraFn {
    pub fn eval(&self, maps: &IdMaps) -> Result<Value> {
        match self {
            ExtraFn::AnimId { anim } => Ok(json!(lookup(&maps.animations, "animation", anim)?)),
            ExtraFn::LayerId { layer } => Ok(json!(lookup(&maps.layers, "sprite layer", layer)?)),
            ExtraFn::GraphicsId { sprite, layer, anim } => {
                let layer = format!("{}//{}", sprite, layer);
                let anim = format!("{}//{}", sprite, anim);
                let start = lookup(&maps.layer_starts, "sprite layer", &layer)?;
                let local = lookup(&maps.anim_local_ids, "animation", &anim)?;
                Ok(json!(start + local))
            }
            ExtraFn::AnimTable { rows } => {
                let rows = rows
                    .iter()
                    .map(|row| match row {
                        None => Ok(Value::Null),
                        Some(names) => names
                            .iter()
                            .map(|n| lookup(&maps.animations, "animation", n).map(|id| json!(id)))
                            .collect::<Result<Vec<_>>>()
                            .map(Value::Array),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(rows))
            }
            ExtraFn::AnimDirTable { dirs } => {
                let mut out = serde_json::Map::new();
                for (name, dir) in dirs {
                    let id = lookup(&maps.animations, "animation", name)?;
                    out.insert(id.to_string(), json!(dir));
                }
                Ok(Value::Object(out))
            }
            ExtraFn::LayerTable { layers } => {
                let ids = layers
                    .iter()
                    .map(|n| lookup(&maps.layers, "sprite layer", n).map(|id| json!(id)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(ids))
            }
            ExtraFn::Literal { value } => Ok(value.clone()),
            ExtraFn::Custom(f) => (f.0)(maps),
        }
    }
}

/// A named late-bound value for `extras_client.json`.
#[derive(Debug, Clone)]
pub struct ExtraDef {
    pub name: String,
    pub func: ExtraFn,
    /// Set once ids are known.
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps() -> IdMaps {
        let mut m = IdMaps::default();
        m.animations.insert("pony//stand-0".into(), 3);
        m.animations.insert("pony//walk-0".into(), 4);
        m.anim_local_ids.insert("pony//walk-0".into(), 1);
        m.layers.insert("pony//base".into(), 0);
        m.layer_starts.insert("pony//base".into(), 10);
        m
    }

    #[test]
    fn test_anim_table_keeps_null_rows() {
        let f = ExtraFn::AnimTable {
            rows: vec![Some(vec!["pony//stand-0".into()]), None],
        };
        assert_eq!(f.eval(&maps()).unwrap(), json!([[3], null]));
    }

    #[test]
    fn test_anim_dir_table_keys_by_id() {
        let mut dirs = BTreeMap::new();
        dirs.insert("pony//walk-0".to_string(), 2);
        let v = ExtraFn::AnimDirTable { dirs }.eval(&maps()).unwrap();
        assert_eq!(v, json!({"4": 2}));
    }

    #[test]
    fn test_graphics_id() {
        let f = ExtraFn::GraphicsId {
            sprite: "pony".into(),
            layer: "base".into(),
            anim: "walk-0".into(),
        };
        assert_eq!(f.eval(&maps()).unwrap(), json!(11));
    }

    #[test]
    fn test_unknown_name_is_resolution_error() {
        let f = ExtraFn::AnimId {
            anim: "pony//fly".into(),
        };
        assert_eq!(f.eval(&maps()).unwrap_err().code(), "outpost::resolve");
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let f: ExtraFn = serde_yaml::from_str("fn: layer_table\nlayers: [pony//base]\n").unwrap();
        assert_eq!(f.eval(&maps()).unwrap(), json!([0]));
    }
}
