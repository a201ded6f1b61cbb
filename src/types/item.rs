use serde::Serialize;

use crate::image::ImageRef;

/// An inventory item.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: String,
    pub id: u16,
    pub ui_name: String,
    pub desc: Option<String>,
    pub icon: ImageRef,
    /// Cell index in `items.png`, set when the sheet is built.
    pub tile: u16,
}

impl ItemDef {
    pub fn new(name: impl Into<String>, ui_name: impl Into<String>, icon: ImageRef) -> Self {
        Self {
            name: name.into(),
            id: 0,
            ui_name: ui_name.into(),
            desc: None,
            icon,
            tile: 0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemClientJson {
    pub name: String,
    pub ui_name: String,
    pub desc: String,
    pub tile: u16,
}

#[derive(Debug, Serialize)]
pub struct ItemServerJson {
    pub name: String,
}

impl ItemDef {
    pub fn client_json(&self) -> ItemClientJson {
        ItemClientJson {
            name: self.name.clone(),
            ui_name: self.ui_name.clone(),
            desc: self.desc.clone().unwrap_or_default(),
            tile: self.tile,
        }
    }

    pub fn server_json(&self) -> ItemServerJson {
        ItemServerJson {
            name: self.name.clone(),
        }
    }
}
