//! The build driver.
//!
//! A run loads every declaration module, instantiates and resolves the
//! definitions, then emits artifacts phase by phase:
//!
//! 1. structures: sheets, part / vertex / shape tables, JSON
//! 2. blocks and items: `tiles.png`, `items.png`, JSON
//! 3. recipes and animations
//! 4. sprites: atlas pages, layer and graphics tables
//! 5. loot tables and extras
//! 6. binary defs for client and server
//!
//! `stamp` is removed first and written last, so it exists only when every
//! phase completed. Problems with individual declarations are collected in
//! the returned [`BuildReport`] rather than aborting the run.

pub mod emit;
pub mod files;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde_json::Value;

use crate::binary::{self, InProcess, PhfBuilder, Subprocess};
use crate::builder::Builders;
use crate::discovery::{discover, load_item_descs, load_yaml_modules, run_modules, DeclModule, DiscoveryResult, MANIFEST_FILENAME};
use crate::error::{DataError, Result};
use crate::image::{ImageCache, ImageStore};
use crate::output::{display_path, format_elapsed, plural, Printer};
use crate::registry::postprocess;
use crate::validation::Diagnostics;

pub use emit::Emitter;

/// Names the perfect hash builder program.
pub const PHF_ENV: &str = "OUTPOST_BUILD_PHF";

/// File name of the perfect hash builder inside `--native-lib-dir`.
pub const PHF_PROGRAM: &str = "outpost-build-phf";

pub const CLIENT_BIN: &str = "defs_client.bin";
pub const SERVER_BIN: &str = "defs_server.bin";

/// Where to read from and write to.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub dest_dir: PathBuf,
    pub src_dir: PathBuf,
    /// Defaults to `<dest_dir>/cache`.
    pub cache_dir: Option<PathBuf>,
    pub mods: Vec<String>,
    /// Discard cache files before building.
    pub clean: bool,
    pub deny_warnings: bool,
    pub native_lib_dir: Option<PathBuf>,
}

impl PipelineOptions {
    pub fn new(src_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
            dest_dir: dest_dir.into(),
            ..Self::default()
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.dest_dir.join("cache"))
    }
}

/// How many of each thing a run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildCounts {
    pub modules: usize,
    pub blocks: usize,
    pub items: usize,
    pub recipes: usize,
    pub structures: usize,
    pub sprites: usize,
    pub loot_tables: usize,
    pub extras: usize,
    pub structure_sheets: usize,
    pub sprite_pages: usize,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub diags: Diagnostics,
    pub counts: BuildCounts,
    /// Every artifact written, in write order.
    pub outputs: Vec<PathBuf>,
}

impl BuildReport {
    pub fn is_ok(&self) -> bool {
        !self.diags.has_errors()
    }
}

/// A configured pipeline run.
pub struct Pipeline {
    opts: PipelineOptions,
    modules: Vec<Box<dyn DeclModule>>,
    phf: Option<Box<dyn PhfBuilder>>,
}

impl Pipeline {
    pub fn new(opts: PipelineOptions) -> Self {
        Self {
            opts,
            modules: Vec::new(),
            phf: None,
        }
    }

    /// Add a Rust declaration module. These run before discovered files.
    pub fn module(mut self, m: impl DeclModule + 'static) -> Self {
        self.modules.push(Box::new(m));
        self
    }

    /// Use `phf` instead of locating a builder program.
    pub fn phf_builder(mut self, phf: impl PhfBuilder + 'static) -> Self {
        self.phf = Some(Box::new(phf));
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    pub fn run(self, printer: &Printer) -> Result<BuildReport> {
        let Pipeline { opts, mut modules, phf } = self;
        let dest = opts.dest_dir.as_path();
        fs::create_dir_all(dest)
            .map_err(|e| DataError::io(dest, format!("Failed to create output directory: {}", e)))?;
        files::remove_stamp(dest)?;

        let mut diags = Diagnostics::new();
        let found = discover(&opts.src_dir, &opts.mods)?;
        let deny_warnings = opts.deny_warnings || found.manifest.deny_warnings;
        let mut images = ImageStore::new(open_cache(&opts.cache_dir(), opts.clean)?);

        printer.status(
            "Loading",
            &format!(
                "{} from {}",
                plural(found.scan.decls.len() + modules.len(), "module", "modules"),
                display_path(&opts.src_dir)
            ),
        );
        let descs = load_item_descs(&found.scan.item_descs, &mut diags);
        modules.extend(load_yaml_modules(&found.scan, &mut diags));
        let builders = Builders::new();
        run_modules(&modules, &builders, &mut images, &mut diags);

        printer.status("Resolving", "definitions");
        let (mut defs, errors) = builders.collect_defs(&mut images, &descs);
        for e in &errors {
            diags.push_err(e);
        }
        let ids = postprocess(&mut defs, &mut images, &mut diags);
        debug!("{} sprite layers, {} animations", ids.layers.len(), ids.animations.len());

        let mut counts = BuildCounts {
            modules: modules.len(),
            blocks: defs.blocks.len(),
            items: defs.items.len(),
            recipes: defs.recipes.len(),
            structures: defs.structures.len(),
            sprites: defs.sprites.len(),
            loot_tables: defs.loot_tables.len(),
            extras: defs.extras.len(),
            ..BuildCounts::default()
        };

        let manifest = &found.manifest;
        let mut em = Emitter::new(dest);
        counts.structure_sheets = printer.timed("Generating", "structures", || {
            emit::structures(&mut em, &mut images, &mut defs.structures)
        })?;
        printer.timed("Generating", "blocks", || emit::blocks(&mut em, &mut images, &mut defs.blocks))?;
        printer.timed("Generating", "items", || emit::items(&mut em, &mut images, &mut defs.items))?;
        printer.timed("Generating", "recipes", || emit::recipes(&mut em, &defs.recipes))?;
        printer.timed("Generating", "animations", || emit::animations(&mut em, &defs))?;

        let font = match &manifest.name_font {
            Some(p) => Some(images.open(&found.root.join(p))?),
            None => None,
        };
        let page_px = manifest.effective_atlas_size();
        counts.sprite_pages = printer.timed("Generating", "sprites", || {
            emit::sprites(&mut em, &mut images, &mut defs, font, page_px)
        })?;
        printer.timed("Generating", "loot_tables", || emit::loot_tables(&mut em, &defs))?;
        printer.timed("Generating", "extras", || emit::extras(&mut em, &defs))?;

        let mut extra_deps = Vec::new();
        if let Some(p) = &manifest.day_night {
            let path = found.root.join(p);
            em.client("day_night", &read_json(&path)?)?;
            extra_deps.push(path);
        }

        let phf = match phf {
            Some(phf) => phf,
            None => locate_phf(opts.native_lib_dir.as_deref()),
        };
        printer.timed("Generating", "binary defs", || -> Result<()> {
            let (client, server) = em.tables();
            let client = binary::client::encode(client, phf.as_ref())?;
            let server = binary::server::encode(server, phf.as_ref())?;
            em.bytes(CLIENT_BIN, &client)?;
            em.bytes(SERVER_BIN, &server)
        })?;
        images.release_buffers();

        warn_unused_assets(&found, &images, &mut diags);
        if deny_warnings {
            diags.promote_warnings();
        }
        if let Err(e) = images.save_cache() {
            warn!("failed to save image cache: {}", e);
        }

        let used: Vec<PathBuf> = images.used_files().map(Path::to_path_buf).collect();
        files::write_used_assets(dest, &used)?;
        files::write_dep_file(dest, &dependencies(&found, used, extra_deps))?;
        let mut outputs = em.written().to_vec();
        files::write_stamp(dest)?;
        outputs.push(dest.join(files::STAMP));

        info!(
            "{} structures, {} blocks, {} items, {} recipes",
            counts.structures, counts.blocks, counts.items, counts.recipes
        );
        Ok(BuildReport { diags, counts, outputs })
    }
}

/// Run `opts` with the default module set and report to `printer`.
pub fn run(opts: PipelineOptions, printer: &Printer) -> Result<BuildReport> {
    let start = std::time::Instant::now();
    let report = Pipeline::new(opts).run(printer)?;
    printer.status(
        "Finished",
        &format!(
            "{}, {}, {} in {}",
            plural(report.counts.structures, "structure", "structures"),
            plural(report.counts.blocks, "block", "blocks"),
            plural(report.counts.items, "item", "items"),
            format_elapsed(start.elapsed())
        ),
    );
    Ok(report)
}

/// Load the cache in `dir`. A corrupt cache is discarded and rebuilt.
fn open_cache(dir: &Path, clean: bool) -> Result<ImageCache> {
    if clean {
        return ImageCache::fresh(dir);
    }
    match ImageCache::load(dir) {
        Ok(cache) => Ok(cache),
        Err(e @ DataError::Cache { .. }) => {
            warn!("discarding image cache: {}", e);
            ImageCache::fresh(dir)
        }
        Err(e) => Err(e),
    }
}

/// The builder named by `OUTPOST_BUILD_PHF`, else the one shipped in
/// `native_lib_dir`, else the in-process builder.
pub fn locate_phf(native_lib_dir: Option<&Path>) -> Box<dyn PhfBuilder> {
    if let Some(program) = std::env::var_os(PHF_ENV).filter(|p| !p.is_empty()) {
        debug!("using perfect hash builder from {}", PHF_ENV);
        return Box::new(Subprocess::new(PathBuf::from(program)));
    }
    if let Some(dir) = native_lib_dir {
        let program = dir.join(PHF_PROGRAM);
        if program.is_file() {
            debug!("using perfect hash builder {}", program.display());
            return Box::new(Subprocess::new(program));
        }
    }
    Box::new(InProcess)
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|e| DataError::io(path, format!("Failed to read: {}", e)))?;
    serde_json::from_str(&text).map_err(|e| DataError::Parse {
        message: format!("{}: {}", path.display(), e),
        help: None,
    })
}

/// Compare paths the way the filesystem sees them when possible.
fn normalized(p: &Path) -> PathBuf {
    fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
}

fn warn_unused_assets(found: &DiscoveryResult, images: &ImageStore, diags: &mut Diagnostics) {
    let used: BTreeSet<PathBuf> = images.used_files().map(normalized).collect();
    for img in &found.scan.images {
        if !used.contains(&normalized(img)) {
            diags.warning(
                "outpost::assets::unused",
                format!("asset {} is never used", display_path(img)),
            );
        }
    }
}

/// Everything the outputs were built from.
fn dependencies(found: &DiscoveryResult, used: Vec<PathBuf>, extra: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut deps: BTreeSet<PathBuf> = used.into_iter().collect();
    deps.extend(found.scan.decls.iter().map(|d| d.path.clone()));
    deps.extend(found.scan.item_descs.iter().cloned());
    deps.extend(extra);
    if found.has_manifest {
        deps.insert(found.root.join(MANIFEST_FILENAME));
    }
    deps.into_iter().collect()
}
