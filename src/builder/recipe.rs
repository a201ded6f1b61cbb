use crate::error::{DataError, Result};
use crate::types::{ItemCount, RecipeDef};

use super::{missing, Builder, Instantiate, ItemProto, Prototype};

#[derive(Debug, Clone, Default)]
pub struct RecipeProto {
    pub ui_name: Option<String>,
    pub inputs: Vec<(String, u16)>,
    pub outputs: Vec<(String, u16)>,
    /// Structure the recipe is crafted at.
    pub station: Option<String>,
    /// Item that must be held to craft.
    pub ability: Option<String>,
    pub from_item: Option<String>,
}

fn counts(xs: &[(String, u16)]) -> Vec<ItemCount> {
    xs.iter().map(|(n, c)| ItemCount::new(n.as_str(), *c)).collect()
}

impl Prototype for RecipeProto {
    const KIND: &'static str = "recipe";
    type Def = RecipeDef;

    fn instantiate(&self, name: &str, cx: &mut Instantiate<'_>) -> Result<RecipeDef> {
        let ui_name = match (&self.ui_name, &self.from_item) {
            (Some(n), _) => n.clone(),
            (None, Some(item)) => cx
                .items
                .get(item)
                .ok_or_else(|| DataError::resolution("item", item))?
                .display_name(item)
                .ok_or_else(|| missing(item, "display_name"))?,
            (None, None) => return Err(missing(name, "display_name")),
        };
        let station = self.station.clone().ok_or_else(|| missing(name, "station"))?;
        if self.outputs.is_empty() {
            return Err(missing(name, "outputs"));
        }
        Ok(RecipeDef {
            name: name.to_string(),
            id: 0,
            ui_name,
            inputs: counts(&self.inputs),
            outputs: counts(&self.outputs),
            station,
            station_id: 0,
            ability: self.ability.clone(),
            ability_id: 0,
        })
    }
}

impl Builder<RecipeProto> {
    pub fn display_name(self, ui_name: &str) -> Self {
        self.modify(|p| p.ui_name = Some(ui_name.to_string()))
    }

    pub fn input(self, item: &str, count: u16) -> Self {
        self.modify(|p| p.inputs.push((item.to_string(), count)))
    }

    pub fn output(self, item: &str, count: u16) -> Self {
        self.modify(|p| p.outputs.push((item.to_string(), count)))
    }

    pub fn station(self, station: &str) -> Self {
        self.modify(|p| p.station = Some(station.to_string()))
    }

    pub fn ability(self, ability: &str) -> Self {
        self.modify(|p| p.ability = Some(ability.to_string()))
    }

    /// Declare one recipe per item in `items`'s scope, producing one of that
    /// item and sharing its name.
    pub fn from_item(&self, items: &Builder<ItemProto>) -> Self {
        let scope = self.child();
        for item in items.names() {
            let mut proto = self.template.clone();
            proto.outputs.push((item.clone(), 1));
            proto.from_item = Some(item.clone());
            scope.insert(item, proto);
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests_support::with_protos;
    use crate::builder::StructureProto;
    use crate::image::ImageStore;

    fn run(items: &Builder<ItemProto>, recipes: &Builder<RecipeProto>) -> (Vec<RecipeDef>, Vec<DataError>) {
        let mut store = ImageStore::in_memory();
        with_protos(items, &Builder::<StructureProto>::root(), &mut store, |cx| {
            recipes.instantiate_all(cx)
        })
    }

    #[test]
    fn test_from_item() {
        let items = Builder::<ItemProto>::root();
        let recipes = Builder::<RecipeProto>::root();
        let wood = items.new("wood").display_name("Wood");
        recipes
            .from_item(&wood)
            .station("workbench")
            .input("wood", 1)
            .output("wood", 1);

        let (defs, errors) = run(&items, &recipes);
        assert!(errors.is_empty(), "{:?}", errors);
        let r = &defs[0];
        assert_eq!(r.name, "wood");
        assert_eq!(r.ui_name, "Wood");
        assert_eq!(r.station, "workbench");
        assert_eq!(r.inputs, vec![ItemCount::new("wood", 1)]);
        assert_eq!(r.outputs, vec![ItemCount::new("wood", 1), ItemCount::new("wood", 1)]);
    }

    #[test]
    fn test_template_inputs_shared_by_group() {
        let items = Builder::<ItemProto>::root();
        let recipes = Builder::<RecipeProto>::root();
        let group = items.prefixed("chair");
        group.new("oak").display_name("Oak Chair");
        group.new("pine").display_name("Pine Chair");
        recipes.child().station("workbench").input("wood", 5).from_item(&group);

        let (defs, errors) = run(&items, &recipes);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(defs.len(), 2);
        assert!(defs.iter().all(|d| d.inputs == vec![ItemCount::new("wood", 5)]));
        assert_eq!(defs[1].name, "chair/pine");
    }

    #[test]
    fn test_missing_station_and_outputs() {
        let items = Builder::<ItemProto>::root();
        let recipes = Builder::<RecipeProto>::root();
        recipes.new("a").display_name("A").output("x", 1);
        recipes.new("b").display_name("B").station("anvil");
        let (_, errors) = run(&items, &recipes);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("station"));
        assert!(errors[1].to_string().contains("outputs"));
    }
}
