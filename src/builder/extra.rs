use serde_json::Value;

use crate::error::Result;
use crate::registry::IdMaps;
use crate::types::{CustomExtra, ExtraDef, ExtraFn};

use super::{missing, Builder, Instantiate, Prototype};

#[derive(Debug, Clone, Default)]
pub struct ExtraProto {
    pub func: Option<ExtraFn>,
}

impl Prototype for ExtraProto {
    const KIND: &'static str = "extra";
    type Def = ExtraDef;

    fn instantiate(&self, name: &str, _cx: &mut Instantiate<'_>) -> Result<ExtraDef> {
        let func = self.func.clone().ok_or_else(|| missing(name, "fn"))?;
        Ok(ExtraDef {
            name: name.to_string(),
            func,
            value: None,
        })
    }
}

impl Builder<ExtraProto> {
    pub fn func(self, func: ExtraFn) -> Self {
        self.modify(|p| p.func = Some(func.clone()))
    }

    /// Compute the value with Rust code once ids are assigned.
    pub fn custom(self, f: fn(&IdMaps) -> Result<Value>) -> Self {
        self.func(ExtraFn::Custom(CustomExtra(f)))
    }

    pub fn literal(self, value: Value) -> Self {
        self.func(ExtraFn::Literal { value })
    }
}
