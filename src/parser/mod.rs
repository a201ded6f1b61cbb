//! YAML declaration files.
//!
//! A `*.data.yaml` file is one declaration module: a single YAML document
//! whose sections (`blocks`, `items`, `structures`, `recipes`, `sprites`,
//! `loot_tables`, `extras`) map names to declarations. Parsing only checks
//! the document shape; [`apply_document`] turns it into builder calls.
//!
//! `item_descs.yaml` files are flat maps from item name to description.

mod apply;
mod decl;
mod image_spec;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DataError, Result};

pub use apply::{apply_document, ApplyContext};
pub use decl::{
    AnimDecl, BlockDecl, DeclDocument, FramesDecl, GraphicsDecl, ItemDecl, LayerDecl, LightDecl,
    LootEntryDecl, MeshDecl, MeshKind, PartDecl, RecipeDecl, ShapeDecl, SpriteDecl, StripDecl,
    StructureDecl,
};
pub use image_spec::{ImageSpec, ImageSpecFull};

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| DataError::io(path, format!("Failed to read: {}", e)))
}

/// Parse a declaration document. An empty document declares nothing.
pub fn parse_decl_document(source: &str) -> Result<DeclDocument> {
    if source.trim().is_empty() {
        return Ok(DeclDocument::default());
    }
    serde_yaml::from_str(source).map_err(|e| DataError::Parse {
        message: format!("Invalid declaration document: {}", e),
        help: Some(
            "Top-level keys are blocks, items, structures, recipes, sprites, loot_tables and extras"
                .to_string(),
        ),
    })
}

pub fn parse_decl_file(path: &Path) -> Result<DeclDocument> {
    parse_decl_document(&read(path)?).map_err(|e| with_path(e, path))
}

/// Parse an `item_descs.yaml` map.
pub fn parse_item_descs(source: &str) -> Result<BTreeMap<String, String>> {
    if source.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_yaml::from_str(source).map_err(|e| DataError::Parse {
        message: format!("Invalid item descriptions: {}", e),
        help: Some("Expected a map from item name to description text".to_string()),
    })
}

pub fn parse_item_descs_file(path: &Path) -> Result<BTreeMap<String, String>> {
    parse_item_descs(&read(path)?).map_err(|e| with_path(e, path))
}

fn with_path(e: DataError, path: &Path) -> DataError {
    match e {
        DataError::Parse { message, help } => DataError::Parse {
            message: format!("{}: {}", path.display(), message),
            help,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document() {
        assert!(parse_decl_document("").unwrap().is_empty());
        assert!(parse_decl_document("# nothing yet\n").unwrap().is_empty());
    }

    #[test]
    fn test_sections() {
        let doc = parse_decl_document(
            r#"
blocks:
  grass: { shape: floor, top: tiles/grass.png }
items:
  wood: { display_name: Wood }
structures:
  anvil: { shape: solid, mesh: solid, image: anvil.png }
recipes:
  wood: { from_item: true, inputs: { log: 1 } }
loot_tables:
  tree:
    - { item: wood, weight: 3, min: 1, max: 2 }
    - { table: rare }
extras:
  pony_layer_table: { fn: layer_table, layers: ["pony//base"] }
"#,
        )
        .unwrap();
        assert_eq!(doc.len(), 6);
        assert_eq!(doc.blocks["grass"].shape.as_deref(), Some("floor"));
        assert!(doc.recipes["wood"].from_item);
        assert_eq!(doc.loot_tables["tree"][1].weight, 1);
        assert!(matches!(doc.structures["anvil"].mesh, Some(MeshDecl::Named(MeshKind::Solid))));
    }

    #[test]
    fn test_unknown_section_is_parse_error() {
        let err = parse_decl_document("blokcs: {}\n").unwrap_err();
        assert_eq!(err.code(), "outpost::parse");
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        assert!(parse_decl_document("items:\n  wood: { colour: red }\n").is_err());
    }

    #[test]
    fn test_item_descs() {
        let descs = parse_item_descs("wood: Chopped from trees.\nstone: Heavy.\n").unwrap();
        assert_eq!(descs.len(), 2);
        assert_eq!(descs["wood"], "Chopped from trees.");
        assert!(parse_item_descs("").unwrap().is_empty());
        assert!(parse_item_descs("- a\n- b\n").is_err());
    }

    #[test]
    fn test_file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.data.yaml");
        std::fs::write(&path, "items: [1, 2]\n").unwrap();
        let err = parse_decl_file(&path).unwrap_err();
        assert!(err.to_string().contains("bad.data.yaml"));
    }
}
