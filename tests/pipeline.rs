//! End-to-end builds of small source trees.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use image::{Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

use outpost_data::pipeline::{CLIENT_BIN, SERVER_BIN};
use outpost_data::{BinaryDefs, BuildReport, InProcess, Pipeline, PipelineOptions, Printer};

const GRAY: [u8; 4] = [128, 128, 128, 255];

struct Fixture {
    src: TempDir,
    dest: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let f = Self {
            src: TempDir::new().unwrap(),
            dest: TempDir::new().unwrap(),
        };
        // Small atlas pages keep the tests quick.
        f.write("pipeline.yaml", "sprite_atlas_size: [256, 256]\n");
        f
    }

    fn src(&self) -> &Path {
        self.src.path()
    }

    fn out(&self, name: &str) -> PathBuf {
        self.dest.path().join(name)
    }

    fn write(&self, rel: &str, text: &str) {
        let path = self.src().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn png(&self, rel: &str, w: u32, h: u32, px: [u8; 4]) {
        let path = self.src().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(w, h, Rgba(px)).save(path).unwrap();
    }

    fn options(&self) -> PipelineOptions {
        PipelineOptions::new(self.src(), self.dest.path())
    }

    fn build_with(&self, opts: PipelineOptions) -> BuildReport {
        Pipeline::new(opts)
            .phf_builder(InProcess)
            .run(&Printer::quiet())
            .unwrap()
    }

    fn build(&self) -> BuildReport {
        self.build_with(self.options())
    }

    fn json(&self, name: &str) -> Value {
        serde_json::from_str(&fs::read_to_string(self.out(name)).unwrap()).unwrap()
    }
}

/// Item `wood` crafted at a `workbench`, plus an `anvil`.
fn crafting() -> Fixture {
    let f = Fixture::new();
    f.png("data/icons/wood.png", 16, 16, GRAY);
    f.png("data/structures/anvil.png", 32, 32, [60, 60, 70, 255]);
    f.png("data/structures/workbench.png", 32, 32, [120, 80, 40, 255]);
    f.write(
        "data/crafting.data.yaml",
        r#"
structures:
  anvil: { shape: solid, mesh: front, image: structures/anvil.png }
  workbench: { shape: solid, mesh: front, image: structures/workbench.png }
items:
  wood: { display_name: Wood, icon: icons/wood.png }
recipes:
  wood:
    display_name: Wood
    inputs: { wood: 1 }
    outputs: { wood: 2 }
    station: workbench
"#,
    );
    f.write("data/item_descs.yaml", "wood: Chopped from trees.\n");
    f
}

/// Sprite `pony` with one layer and a mirrored walk.
fn pony(f: &Fixture) {
    f.png("data/sprites/walk.png", 96, 16, GRAY);
    f.write(
        "data/pony.data.yaml",
        r#"
sprites:
  pony:
    size: [16, 16]
    anims:
      walk-1: { length: 6, rate: 8 }
      walk-3: { mirror: walk-1 }
    layers:
      base:
    graphics:
      - { layer: base, anim: walk-1, strip: { image: sprites/walk.png } }
"#,
    );
}

fn row<'a>(rows: &'a Value, name: &str) -> (usize, &'a Value) {
    rows.as_array()
        .unwrap()
        .iter()
        .enumerate()
        .find(|(_, r)| r["name"] == name)
        .unwrap_or_else(|| panic!("no row named {}", name))
}

#[test]
fn test_item_and_recipe() {
    let f = crafting();
    let report = f.build();
    assert!(report.is_ok(), "{:?}", report.diags);

    let items = f.json("items_server.json");
    let (wood_id, wood) = row(&items, "wood");
    assert_eq!(wood, &json!({"name": "wood"}));

    let recipes = f.json("recipes_server.json");
    let (recipe_id, recipe) = row(&recipes, "wood");
    assert_eq!(recipe["inputs"], json!([[wood_id, 1]]));
    assert_eq!(recipe["outputs"], json!([[wood_id, 2]]));
    let structures = f.json("structures_server.json");
    let (bench_id, _) = row(&structures, "workbench");
    assert_eq!(recipe["station"], json!(bench_id));

    // The icon lands on its grid cell in items.png.
    let client = f.json("items_client.json");
    let (_, wood) = row(&client, "wood");
    assert_eq!(wood["desc"], "Chopped from trees.");
    let tile = wood["tile"].as_u64().unwrap() as u32;
    assert_ne!(tile, 0);
    let sheet = image::open(f.out("items.png")).unwrap().to_rgba8();
    let (x, y) = ((tile % 32) * 16, (tile / 32) * 16);
    assert_eq!(sheet.get_pixel(x + 8, y + 8).0, GRAY);

    let server = BinaryDefs::parse(&fs::read(f.out(SERVER_BIN)).unwrap()).unwrap();
    assert_eq!(server.lookup("Rcpe", "wood").unwrap(), Some(recipe_id as u16));
    assert_eq!(server.lookup("Item", "wood").unwrap(), Some(wood_id as u16));
    let client = BinaryDefs::parse(&fs::read(f.out(CLIENT_BIN)).unwrap()).unwrap();
    assert_eq!(client.lookup("Item", "wood").unwrap(), Some(wood_id as u16));
}

#[test]
fn test_structure_part() {
    let f = Fixture::new();
    f.png("data/anvil.png", 32, 32, [60, 60, 70, 255]);
    f.write(
        "data/anvil.data.yaml",
        "structures:\n  anvil: { shape: solid, mesh: front, image: anvil.png }\n",
    );
    let report = f.build();
    assert!(report.is_ok(), "{:?}", report.diags);

    assert_eq!(f.json("structures_list.json"), json!(["structures0"]));
    let parts = f.json("structure_parts_client.json");
    let anvil = &parts[0];
    assert_eq!(anvil["vert_count"], 6);
    assert_eq!(anvil["sheet"], 0);
    assert_eq!(anvil["offset"], json!([0, 0]));
    assert_eq!(f.json("structure_verts_client.json").as_array().unwrap().len(), 6 * 3);

    let structures = f.json("structures_client.json");
    assert_eq!(structures[0]["part_count"], 1);

    let sheet = image::open(f.out("structures0.png")).unwrap().to_rgba8();
    assert_eq!(sheet.get_pixel(0, 0).0, [60, 60, 70, 255]);
    assert_eq!(sheet.get_pixel(31, 31).0, [60, 60, 70, 255]);
    assert_eq!(sheet.get_pixel(32, 0).0[3], 0);
}

#[test]
fn test_sprite_atlas_and_mirror() {
    let f = Fixture::new();
    pony(&f);
    let report = f.build();
    assert!(report.is_ok(), "{:?}", report.diags);

    let anims = f.json("animations_client.json");
    assert_eq!(anims[0]["length"], 6);
    assert_eq!(anims[0]["framerate"], 8);

    let gfx = f.json("sprite_graphics_client.json");
    let gfx = gfx.as_array().unwrap();
    assert_eq!(gfx.len(), 2);
    let (walk, mirrored) = (&gfx[0], &gfx[1]);
    assert_eq!(walk["size"], json!([16, 16]));
    assert_eq!(walk["mirror"], false);
    for k in ["src_offset", "size", "sheet"] {
        assert_eq!(mirrored[k], walk[k], "{}", k);
    }
    assert_eq!(mirrored["mirror"], true);
    let x = walk["src_offset"][0].as_u64().unwrap();
    let y = walk["src_offset"][1].as_u64().unwrap();
    assert_eq!((x % 16, y % 16), (0, 0));

    assert_eq!(f.json("sprites_list.json"), json!(["sprites0"]));
    let page = image::open(f.out("sprites/sprites0.png")).unwrap().to_rgba8();
    assert_eq!(page.dimensions(), (256, 256));
    assert_eq!(page.get_pixel(x as u32, y as u32).0, GRAY);
}

#[test]
fn test_rebuild_is_byte_identical() {
    let f = crafting();
    pony(&f);
    let first = f.build();
    let snapshot: Vec<(PathBuf, Vec<u8>)> = first
        .outputs
        .iter()
        .map(|p| (p.clone(), fs::read(p).unwrap()))
        .collect();

    let icon = f.src().join("data/icons/wood.png");
    fs::File::options()
        .write(true)
        .open(&icon)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let second = f.build();
    assert_eq!(second.outputs, first.outputs);
    for (path, bytes) in snapshot {
        assert!(fs::read(&path).unwrap() == bytes, "{} changed", path.display());
    }
}

#[test]
fn test_build_meta() {
    let f = crafting();
    f.build();

    assert!(f.out("stamp").exists());
    let used = fs::read_to_string(f.out("used_assets.txt")).unwrap();
    assert_eq!(used.lines().count(), 3);
    assert!(used.contains("wood.png"));

    let dep = fs::read_to_string(f.out("data.d")).unwrap();
    let mut lines = dep.lines();
    assert_eq!(lines.next().unwrap(), format!("{}: \\", f.out("stamp").display()));
    assert!(dep.contains("crafting.data.yaml"));
    assert!(dep.contains("item_descs.yaml"));
    assert!(dep.contains("pipeline.yaml"));
    assert!(dep.contains("anvil.png"));
}

#[test]
fn test_unused_asset_warns() {
    let f = crafting();
    f.png("data/leftover.png", 16, 16, GRAY);
    let report = f.build();
    assert!(report.is_ok());
    assert_eq!(report.diags.warning_count(), 1);
    let d = report.diags.iter().next().unwrap();
    assert_eq!(d.code, "outpost::assets::unused");
}

#[test]
fn test_deny_warnings_fails_but_keeps_artifacts() {
    let f = crafting();
    f.png("data/leftover.png", 16, 16, GRAY);
    let opts = PipelineOptions {
        deny_warnings: true,
        ..f.options()
    };
    let report = f.build_with(opts);
    assert!(!report.is_ok());
    assert!(f.out("stamp").exists());
    assert!(f.out("items_server.json").exists());
}

#[test]
fn test_bad_declaration_is_reported_with_the_rest_built() {
    let f = crafting();
    f.write(
        "data/broken.data.yaml",
        "recipes:\n  plank: { display_name: Plank, inputs: { log: 1 }, outputs: { plank: 1 }, station: workbench }\n",
    );
    let report = f.build();
    assert!(report.diags.has_errors());
    let items = f.json("items_server.json");
    row(&items, "wood");
}

#[test]
fn test_mods_are_opt_in() {
    let f = crafting();
    f.png("mods/winter/snow.png", 16, 16, [250, 250, 255, 255]);
    f.write(
        "mods/winter/snow.data.yaml",
        "items:\n  snow: { display_name: Snow, icon: snow.png }\n",
    );

    let report = f.build();
    assert_eq!(report.counts.items, 1);

    let opts = PipelineOptions {
        mods: vec!["winter".into()],
        ..f.options()
    };
    let report = f.build_with(opts);
    assert_eq!(report.counts.items, 2);
    row(&f.json("items_server.json"), "snow");

    let opts = PipelineOptions {
        mods: vec!["summer".into()],
        ..f.options()
    };
    let err = Pipeline::new(opts)
        .phf_builder(InProcess)
        .run(&Printer::quiet())
        .unwrap_err();
    assert_eq!(err.code(), "outpost::build");
}

#[test]
fn test_day_night_section() {
    let f = crafting();
    f.write(
        "pipeline.yaml",
        "sprite_atlas_size: [256, 256]\nday_night: day_night.json\n",
    );
    f.write(
        "day_night.json",
        r#"{"day_start": 0, "day_end": 1000, "night_start": 1500, "night_end": 2500,
            "sunset": [[255, 200, 150], [80, 80, 140]], "sunrise": [[120, 120, 160]]}"#,
    );
    let report = f.build();
    assert!(report.is_ok(), "{:?}", report.diags);
    let client = BinaryDefs::parse(&fs::read(f.out(CLIENT_BIN)).unwrap()).unwrap();
    let names = client.section_names();
    assert!(names.contains(&"DyNtPhas"));
    assert!(names.contains(&"DyNtColr"));
}

#[test]
fn test_failed_phase_leaves_no_stamp() {
    let f = crafting();
    f.build();
    assert!(f.out("stamp").exists());

    // A name font that does not exist fails the sprite phase.
    f.write(
        "pipeline.yaml",
        "sprite_atlas_size: [256, 256]\nname_font: missing_font.png\n",
    );
    let result = Pipeline::new(f.options())
        .phf_builder(InProcess)
        .run(&Printer::quiet());
    assert!(result.is_err());
    assert!(!f.out("stamp").exists());
}
