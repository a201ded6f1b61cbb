use std::collections::{BTreeMap, HashSet};

use crate::error::{DataError, Result};
use crate::types::{BlockDef, ItemDef, LootTableDef, RecipeDef, SpriteDef, StructureDef};

/// A definition that receives a numeric id.
pub trait Named {
    fn name(&self) -> &str;
    fn set_id(&mut self, id: u16);
}

macro_rules! impl_named {
    ($($t:ty),*) => {
        $(impl Named for $t {
            fn name(&self) -> &str {
                &self.name
            }

            fn set_id(&mut self, id: u16) {
                self.id = id;
            }
        })*
    };
}

impl_named!(BlockDef, ItemDef, RecipeDef, StructureDef, LootTableDef, SpriteDef);

/// Number `objs` and sort them by id.
///
/// Names in `reserved` that are present take the first ids, in the order
/// given; reserved names with no definition are skipped. Everything else
/// follows in name order.
pub fn assign_ids<T: Named>(objs: &mut Vec<T>, reserved: &[&str]) -> Result<BTreeMap<String, u16>> {
    if objs.len() > u16::MAX as usize {
        return Err(DataError::encoding(format!(
            "{} definitions do not fit in 16-bit ids",
            objs.len()
        )));
    }

    let mut seen = HashSet::new();
    for o in objs.iter() {
        if !seen.insert(o.name()) {
            return Err(DataError::config(o.name(), "name", "is declared twice"));
        }
    }

    let rank = |o: &T| -> (usize, String) {
        let r = reserved
            .iter()
            .position(|r| *r == o.name())
            .unwrap_or(reserved.len());
        (r, o.name().to_string())
    };
    objs.sort_by_cached_key(rank);

    let mut map = BTreeMap::new();
    for (i, o) in objs.iter_mut().enumerate() {
        let id = i as u16;
        o.set_id(id);
        map.insert(o.name().to_string(), id);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn blocks(names: &[&str]) -> Vec<BlockDef> {
        names.iter().map(|n| BlockDef::new(*n, 0)).collect()
    }

    #[test]
    fn test_reserved_names_first() {
        let mut objs = blocks(&["stone", "placeholder", "dirt", "empty"]);
        let map = assign_ids(&mut objs, &["empty", "placeholder"]).unwrap();
        assert_eq!(map["empty"], 0);
        assert_eq!(map["placeholder"], 1);
        assert_eq!(map["dirt"], 2);
        assert_eq!(map["stone"], 3);
        let names: Vec<&str> = objs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["empty", "placeholder", "dirt", "stone"]);
        assert_eq!(objs[3].id, 3);
    }

    #[test]
    fn test_missing_reserved_name_is_skipped() {
        let mut objs = blocks(&["wood", "bark"]);
        let map = assign_ids(&mut objs, &["none"]).unwrap();
        assert_eq!(map["bark"], 0);
        assert_eq!(map["wood"], 1);
    }

    #[test]
    fn test_duplicate_names() {
        let mut objs = blocks(&["a", "a"]);
        let err = assign_ids(&mut objs, &[]).unwrap_err();
        assert_eq!(err.code(), "outpost::config");
    }

    proptest! {
        #[test]
        fn prop_name_order_is_id_order(names in proptest::collection::btree_set("[a-z]{1,6}", 0..40)) {
            let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let mut objs = blocks(&names);
            objs.reverse();
            let map = assign_ids(&mut objs, &[]).unwrap();
            for w in objs.windows(2) {
                prop_assert!(w[0].name < w[1].name);
                prop_assert!(map[&w[0].name] < map[&w[1].name]);
            }
        }
    }
}
