use crate::consts::ICON_SIZE;
use crate::error::{DataError, Result};
use crate::image::{Filter, ImageRef, ImageStore, Rect};
use crate::types::ItemDef;

use super::{missing, Builder, Instantiate, Prototype, StructureProto};

/// Icon and display name taken from a structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromStructure {
    pub structure: String,
    /// Top-left of the square cut from the structure's depiction.
    pub extract_offset: Option<(i32, i32)>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemProto {
    pub ui_name: Option<String>,
    pub desc: Option<String>,
    pub icon: Option<ImageRef>,
    pub from_structure: Option<FromStructure>,
}

impl ItemProto {
    /// Display name, falling back to the item name for structure items.
    pub fn display_name(&self, name: &str) -> Option<String> {
        match (&self.ui_name, &self.from_structure) {
            (Some(n), _) => Some(n.clone()),
            (None, Some(_)) => Some(name.to_string()),
            (None, None) => None,
        }
    }
}

fn icon_from_depiction(store: &mut ImageStore, img: ImageRef, offset: Option<(i32, i32)>) -> ImageRef {
    let (w, h) = store.size(img);
    let side = w.min(h);
    let (x, y) = offset.unwrap_or((0, 0));
    let square = store.crop(img, Rect::new(x, y, side, side));
    store.resize(square, (ICON_SIZE, ICON_SIZE), Filter::Triangle)
}

impl Prototype for ItemProto {
    const KIND: &'static str = "item";
    type Def = ItemDef;

    fn instantiate(&self, name: &str, cx: &mut Instantiate<'_>) -> Result<ItemDef> {
        let ui_name = self
            .display_name(name)
            .ok_or_else(|| missing(name, "display_name"))?;

        let icon = match (self.icon, &self.from_structure) {
            (Some(icon), _) => {
                let size = cx.images.size(icon);
                if size != (ICON_SIZE, ICON_SIZE) {
                    return Err(DataError::image(format!(
                        "icon for item `{}` is {}x{}, expected {}x{}",
                        name, size.0, size.1, ICON_SIZE, ICON_SIZE
                    )));
                }
                icon
            }
            (None, Some(src)) => {
                let s: &StructureProto = cx
                    .structures
                    .get(&src.structure)
                    .ok_or_else(|| DataError::resolution("structure", &src.structure))?;
                let depiction = s.get_image(cx.images)?;
                icon_from_depiction(cx.images, depiction, src.extract_offset)
            }
            (None, None) => return Err(missing(name, "icon")),
        };

        let mut def = ItemDef::new(name, ui_name, icon);
        def.desc = self.desc.clone().or_else(|| cx.descs.get(name).cloned());
        Ok(def)
    }
}

impl Builder<ItemProto> {
    pub fn display_name(self, ui_name: &str) -> Self {
        self.modify(|p| p.ui_name = Some(ui_name.to_string()))
    }

    pub fn desc(self, desc: &str) -> Self {
        self.modify(|p| p.desc = Some(desc.to_string()))
    }

    pub fn icon(self, icon: ImageRef) -> Self {
        self.modify(|p| p.icon = Some(icon))
    }

    /// Declare one item per structure in `structures`'s scope, named after
    /// the structure (or `name`, under this builder's prefix).
    pub fn from_structure(
        &self,
        structures: &Builder<StructureProto>,
        name: Option<&str>,
        extract_offset: Option<(i32, i32)>,
    ) -> Self {
        let scope = self.child();
        for s in structures.names() {
            let full = match name {
                Some(n) => self.full_name(n),
                None => s.clone(),
            };
            let mut proto = self.template.clone();
            proto.from_structure = Some(FromStructure {
                structure: s,
                extract_offset,
            });
            scope.insert(full, proto);
        }
        scope
    }
}
