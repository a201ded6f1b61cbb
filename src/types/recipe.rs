use serde::Serialize;

/// One `(item, count)` input or output of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCount {
    pub item: String,
    pub count: u16,
    /// Set by the resolver.
    pub id: u16,
}

impl ItemCount {
    pub fn new(item: impl Into<String>, count: u16) -> Self {
        Self {
            item: item.into(),
            count,
            id: 0,
        }
    }
}

/// A crafting recipe. Names are resolved to ids after id assignment.
#[derive(Debug, Clone)]
pub struct RecipeDef {
    pub name: String,
    pub id: u16,
    pub ui_name: String,
    pub inputs: Vec<ItemCount>,
    pub outputs: Vec<ItemCount>,
    pub station: String,
    pub station_id: u16,
    pub ability: Option<String>,
    pub ability_id: u16,
}

#[derive(Debug, Serialize)]
pub struct RecipeClientJson {
    pub ui_name: String,
    pub inputs: Vec<(u16, u16)>,
    pub outputs: Vec<(u16, u16)>,
    pub ability: u16,
    pub station: u16,
}

#[derive(Debug, Serialize)]
pub struct RecipeServerJson {
    pub name: String,
    pub inputs: Vec<(u16, u16)>,
    pub outputs: Vec<(u16, u16)>,
    pub ability: u16,
    pub station: u16,
}

fn pairs(xs: &[ItemCount]) -> Vec<(u16, u16)> {
    xs.iter().map(|x| (x.id, x.count)).collect()
}

impl RecipeDef {
    pub fn client_json(&self) -> RecipeClientJson {
        RecipeClientJson {
            ui_name: self.ui_name.clone(),
            inputs: pairs(&self.inputs),
            outputs: pairs(&self.outputs),
            ability: self.ability_id,
            station: self.station_id,
        }
    }

    pub fn server_json(&self) -> RecipeServerJson {
        RecipeServerJson {
            name: self.name.clone(),
            inputs: pairs(&self.inputs),
            outputs: pairs(&self.outputs),
            ability: self.ability_id,
            station: self.station_id,
        }
    }
}
