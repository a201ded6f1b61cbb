//! Client binary defs layout.

use serde_json::{json, Map, Value};

use crate::error::{DataError, Result};

use super::{row_names, table, Context, Conv, Field, Layout, PhfBuilder, Scalar, Tables};
use Scalar::{I16, I8, U16, U32, U8};

/// Bumped when an existing client section's format changes.
pub const VER_MINOR: u16 = 0;

/// Tables read by [`encode`]. `extras` and `day_night` are optional.
pub const FILES: &[&str] = &[
    "blocks",
    "items",
    "structures",
    "structure_parts",
    "structure_verts",
    "structure_shapes",
    "animations",
    "sprite_layers",
    "sprite_graphics",
    "recipes",
    "extras",
    "day_night",
];

fn scalar(s: Scalar) -> Conv {
    Conv::Scalar(s)
}

fn block() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("front", scalar(U16)).default(json!(0)),
        Field::new("back", scalar(U16)).default(json!(0)),
        Field::new("top", scalar(U16)).default(json!(0)),
        Field::new("bottom", scalar(U16)).default(json!(0)),
        Field::new("light_r", scalar(U8)).default(json!(0)),
        Field::new("light_g", scalar(U8)).default(json!(0)),
        Field::new("light_b", scalar(U8)).default(json!(0)),
        Field::new("light_radius", scalar(U16)).default(json!(0)),
        Field::new("flags", scalar(U16)),
    ]))
}

fn item() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("name", Conv::string()),
        Field::new("ui_name", Conv::string()),
        Field::new("desc", Conv::string()),
    ]))
}

fn structure_part() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("vert_idx", scalar(U16)),
        Field::new("vert_count", scalar(U16)),
        Field::new("offset", Conv::Vector(I16, 2)),
        Field::new("sheet", scalar(U8)),
        Field::new("flags", scalar(U8)).default(json!(0)),
        Field::new("anim_length", scalar(I8)).default(json!(0)),
        Field::new("anim_rate", scalar(U8)).default(json!(0)),
        Field::new("anim_step", scalar(U16)).default(json!(0)),
    ]))
}

fn structure() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("size", Conv::Vector(U8, 3)),
        Field::new("shape_idx", scalar(U16)),
        Field::new("part_idx", scalar(U16)),
        Field::new("part_count", scalar(U8)),
        Field::new("vert_count", scalar(U8)),
        Field::new("layer", scalar(U8)),
        Field::new("flags", scalar(U8)).default(json!(0)),
        Field::new("light_pos", Conv::Vector(U8, 3)).default(json!([0, 0, 0])),
        Field::new("light_color", Conv::Vector(U8, 3)).default(json!([0, 0, 0])),
        Field::new("light_radius", scalar(U16)).default(json!(0)),
    ]))
}

fn animation() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("local_id", scalar(U16)),
        Field::new("framerate", scalar(U8)),
        Field::new("length", scalar(U8)),
    ]))
}

fn sprite_layer() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("start", scalar(U16)),
        Field::new("count", scalar(U16)),
    ]))
}

fn sprite_graphics() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("src_offset", Conv::Vector(U16, 2)),
        Field::new("dest_offset", Conv::Vector(U16, 2)),
        Field::new("size", Conv::Vector(U16, 2)),
        Field::new("sheet", scalar(U8)),
        Field::new("mirror", scalar(U8)),
    ]))
}

pub(crate) fn recipe_item() -> Conv {
    Conv::Vector(U16, 2)
}

fn recipe() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("ui_name", Conv::string()),
        Field::new("inputs", Conv::sequence("RcpeItms", recipe_item(), U16)),
        Field::new("outputs", Conv::sequence("RcpeItms", recipe_item(), U16)),
        Field::new("ability", scalar(U16)),
        Field::new("station", scalar(U32)),
    ]))
}

fn day_night_phase() -> Conv {
    Conv::Struct(Layout::new(vec![
        Field::new("start_time", scalar(U16)),
        Field::new("end_time", scalar(U16)),
        Field::new("start_color", scalar(U8)),
        Field::new("end_color", scalar(U8)),
    ]))
}

/// Animated parts store the frame stride and a negative length when they
/// play once.
fn prepare_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|p| {
            let mut p = p.clone();
            if let Some(obj) = p.as_object_mut() {
                if let Some(step) = obj.get("anim_size").and_then(|s| s.get(0)).cloned() {
                    obj.insert("anim_step".into(), step);
                }
                let oneshot = obj.get("anim_oneshot").and_then(Value::as_bool).unwrap_or(false);
                if oneshot {
                    if let Some(len) = obj.get("anim_length").and_then(Value::as_i64) {
                        obj.insert("anim_length".into(), json!(-len));
                    }
                }
            }
            p
        })
        .collect()
}

fn field<'v>(obj: &'v Value, key: &str) -> Result<&'v Value> {
    obj.get(key)
        .ok_or_else(|| DataError::encoding(format!("missing `{}`", key)))
}

fn colors(obj: &Value, key: &str) -> Result<Vec<Value>> {
    field(obj, key)?
        .as_array()
        .cloned()
        .ok_or_else(|| DataError::encoding(format!("`{}` is not a list of colours", key)))
}

/// Colour table is white, then sunset in reverse, then sunrise. Each phase
/// fades between two entries of it.
fn convert_day_night(cx: &mut Context<'_>, j: &Value) -> Result<()> {
    let mut table = vec![json!([255, 255, 255])];
    let cut1 = table.len();
    table.extend(colors(j, "sunset")?.into_iter().rev());
    let cut2 = table.len();
    table.extend(colors(j, "sunrise")?);
    let cut3 = table.len();
    if cut2 == cut1 || cut3 == cut2 {
        return Err(DataError::encoding("day/night needs sunset and sunrise colours"));
    }

    let phase = |start: &str, end: &str, c0: usize, c1: usize| -> Result<Value> {
        let (t0, t1) = (field(j, start)?, field(j, end)?);
        Ok(json!({
            "start_time": t0,
            "end_time": t1,
            "start_color": c0,
            "end_color": c1,
        }))
    };
    let phases = vec![
        phase("day_start", "day_end", 0, cut1)?,
        phase("day_end", "night_start", cut1, cut2 - 1)?,
        phase("night_start", "night_end", cut2 - 1, cut2)?,
        phase("night_end", "day_start", cut2, cut3 - 1)?,
    ];

    cx.convert("DyNtPhas", &day_night_phase(), &phases)?;
    cx.convert("DyNtColr", &Conv::Vector(U8, 3), &table)
}

/// `X*` lookup sections. Each one is written only when its extra exists.
fn convert_extras(cx: &mut Context<'_>, extras: &Map<String, Value>) -> Result<()> {
    let list = |key: &str| -> Result<Option<Vec<Value>>> {
        match extras.get(key) {
            None => Ok(None),
            Some(Value::Array(xs)) => Ok(Some(xs.clone())),
            Some(other) => Err(DataError::encoding(format!(
                "extra `{}` should be a list, got {}",
                key, other
            ))),
        }
    };

    if let Some(layers) = list("pony_layer_table")? {
        cx.convert("XPonLayr", &scalar(U8), &layers)?;
    }

    if let Some(rows) = list("physics_anim_table")? {
        let rows: Vec<Value> = rows
            .into_iter()
            .map(|r| if r.is_null() { Value::Array(vec![json!(0); 8]) } else { r })
            .collect();
        cx.convert("XPhysAnm", &Conv::Vector(U16, 8), &rows)?;
    }

    if let Some(dirs) = extras.get("anim_dir_table") {
        let dirs = dirs
            .as_object()
            .ok_or_else(|| DataError::encoding("extra `anim_dir_table` should be a map"))?;
        let mut entries = Vec::with_capacity(dirs.len());
        for (k, v) in dirs {
            let idx: usize = k
                .parse()
                .map_err(|_| DataError::encoding(format!("anim_dir_table key `{}` is not an id", k)))?;
            entries.push((idx, v.clone()));
        }
        let len = entries.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        let mut table = vec![json!(255); len];
        for (i, v) in entries {
            table[i] = v;
        }
        cx.convert("XAnimDir", &scalar(U8), &table)?;
    }

    let specials = ["default_anim", "editor_anim", "activity_none_anim"];
    if specials.iter().any(|k| extras.contains_key(*k)) {
        let anims = specials
            .iter()
            .map(|k| {
                extras
                    .get(*k)
                    .cloned()
                    .ok_or_else(|| DataError::encoding(format!("missing extra `{}`", k)))
            })
            .collect::<Result<Vec<_>>>()?;
        cx.convert("XSpcAnim", &scalar(U16), &anims)?;
    }
    if let Some(layer) = extras.get("activity_layer") {
        cx.convert("XSpcLayr", &scalar(U8), std::slice::from_ref(layer))?;
    }
    if let Some(gfx) = extras.get("activity_bubble_graphics") {
        cx.convert("XSpcGrfx", &scalar(U16), std::slice::from_ref(gfx))?;
    }
    Ok(())
}

/// Encode the client container from its JSON tables.
pub fn encode(tables: &Tables, phf: &dyn PhfBuilder) -> Result<Vec<u8>> {
    let mut cx = Context::new(phf);
    cx.init_intern_table("Strings", 1);
    cx.init_intern_table("RcpeItms", recipe_item().size());

    cx.convert("Blocks", &block(), table(tables, "blocks")?)?;
    cx.convert("Items", &item(), table(tables, "items")?)?;
    cx.convert("StrcVert", &scalar(U16), table(tables, "structure_verts")?)?;
    cx.convert(
        "StrcPart",
        &structure_part(),
        &prepare_parts(table(tables, "structure_parts")?),
    )?;
    cx.convert("StrcShap", &scalar(U16), table(tables, "structure_shapes")?)?;
    cx.convert("StrcDefs", &structure(), table(tables, "structures")?)?;
    cx.convert("SprtAnim", &animation(), table(tables, "animations")?)?;
    cx.convert("SprtLayr", &sprite_layer(), table(tables, "sprite_layers")?)?;
    cx.convert("SprtGrfx", &sprite_graphics(), table(tables, "sprite_graphics")?)?;
    cx.convert("RcpeDefs", &recipe(), table(tables, "recipes")?)?;

    if let Some(j) = tables.get("day_night").filter(|j| !j.is_null()) {
        convert_day_night(&mut cx, j)?;
    }
    if let Some(extras) = tables.get("extras").and_then(Value::as_object) {
        convert_extras(&mut cx, extras)?;
    }

    let names = row_names(table(tables, "items")?)?;
    cx.build_index("Item", &names, U16)?;
    cx.finish(VER_MINOR)
}
