//! Server binary defs layout. The server looks everything up by name, so
//! every table gets an index.

use serde_json::Value;

use crate::error::Result;

use super::client::recipe_item;
use super::{row_names, table, Context, Conv, Field, Layout, PhfBuilder, Scalar, Tables};
use Scalar::{I32, U16, U32, U8};

/// Bumped when an existing server section's format changes.
pub const VER_MINOR: u16 = 0;

pub const FILES: &[&str] = &[
    "blocks",
    "items",
    "recipes",
    "structures",
    "animations",
    "sprite_layers",
];

fn named(rest: Vec<Field>) -> Conv {
    let mut fields = vec![Field::new("name", Conv::string())];
    fields.extend(rest);
    Conv::Struct(Layout::new(fields))
}

fn block() -> Conv {
    named(vec![Field::new("flags", Conv::Scalar(U16))])
}

fn item() -> Conv {
    named(vec![])
}

fn recipe() -> Conv {
    named(vec![
        Field::new("inputs", Conv::sequence("RcpeItms", recipe_item(), U32)),
        Field::new("outputs", Conv::sequence("RcpeItms", recipe_item(), U32)),
        Field::new("ability", Conv::Scalar(U16)),
        Field::new("station", Conv::Scalar(U32)),
    ])
}

fn structure() -> Conv {
    named(vec![
        Field::new("size", Conv::Vector(I32, 3)),
        Field::new("shape", Conv::sequence("StrcShap", Conv::Scalar(U16), U32)),
        Field::new("layer", Conv::Scalar(U8)),
    ])
}

fn animation() -> Conv {
    named(vec![
        Field::new("framerate", Conv::Scalar(U8)),
        Field::new("length", Conv::Scalar(U8)),
    ])
}

fn sprite_layer() -> Conv {
    named(vec![])
}

/// Encode the server container from its JSON tables.
pub fn encode(tables: &Tables, phf: &dyn PhfBuilder) -> Result<Vec<u8>> {
    let mut cx = Context::new(phf);
    cx.init_intern_table("Strings", 1);
    cx.init_intern_table("RcpeItms", recipe_item().size());
    cx.init_intern_table("StrcShap", U16.size());

    let sections: [(&str, &str, Conv, &str); 6] = [
        ("blocks", "Blocks", block(), "Blck"),
        ("items", "Items", item(), "Item"),
        ("recipes", "RcpeDefs", recipe(), "Rcpe"),
        ("structures", "StrcDefs", structure(), "Strc"),
        ("animations", "SprtAnim", animation(), "Anim"),
        ("sprite_layers", "SprtLayr", sprite_layer(), "Layr"),
    ];
    for (key, section, conv, _) in &sections {
        cx.convert(section, conv, table(tables, key)?)?;
    }
    for (key, _, _, tag) in &sections {
        let rows: &[Value] = table(tables, key)?;
        cx.build_index(tag, &row_names(rows)?, U16)?;
    }
    cx.finish(VER_MINOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{BinaryDefs, InProcess};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tables() -> Tables {
        let mut t = Tables::new();
        t.insert(
            "blocks".into(),
            json!([{"name": "empty", "flags": 0}, {"name": "grass", "flags": 0x2024}]),
        );
        t.insert("items".into(), json!([{"name": "none"}, {"name": "wood"}]));
        t.insert(
            "recipes".into(),
            json!([{"name": "wood", "inputs": [[1, 1]], "outputs": [[1, 2]], "ability": 0, "station": 0}]),
        );
        t.insert(
            "structures".into(),
            json!([
                {"name": "anvil", "size": [1, 1, 1], "shape": [2], "layer": 1},
                {"name": "block", "size": [1, 1, 1], "shape": [2], "layer": 1},
            ]),
        );
        t.insert("animations".into(), json!([{"name": "pony//walk", "framerate": 8, "length": 6}]));
        t.insert("sprite_layers".into(), json!([{"name": "pony//base"}]));
        t
    }

    #[test]
    fn test_every_table_is_indexed() {
        let defs = BinaryDefs::parse(&encode(&tables(), &InProcess).unwrap()).unwrap();
        assert_eq!(defs.section_names()[..3], ["Strings", "RcpeItms", "StrcShap"]);
        assert_eq!(defs.lookup("Blck", "grass").unwrap(), Some(1));
        assert_eq!(defs.lookup("Item", "wood").unwrap(), Some(1));
        assert_eq!(defs.lookup("Rcpe", "wood").unwrap(), Some(0));
        assert_eq!(defs.lookup("Strc", "block").unwrap(), Some(1));
        assert_eq!(defs.lookup("Anim", "pony//walk").unwrap(), Some(0));
        assert_eq!(defs.lookup("Layr", "pony//base").unwrap(), Some(0));
    }

    #[test]
    fn test_shapes_are_interned() {
        let defs = BinaryDefs::parse(&encode(&tables(), &InProcess).unwrap()).unwrap();
        assert_eq!(defs.u16s("StrcShap").unwrap(), vec![2]);
        // name (8) + size (12) + shape (8) + layer (1), padded to 4
        assert_eq!(defs.section("StrcDefs").unwrap().len(), 2 * 32);
    }
}
