//! Declaration modules and the order they run in.
//!
//! A module adds prototypes to the shared [`Builders`]. YAML declaration
//! files are modules; Rust code can register its own through
//! [`DeclModule`]. Modules run in the order given, which for discovered
//! files is core group first, then each mod, each in path order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::builder::Builders;
use crate::error::{DataError, Result};
use crate::image::ImageStore;
use crate::parser::{apply_document, parse_decl_file, parse_item_descs_file, ApplyContext, DeclDocument};
use crate::validation::Diagnostics;

use super::scanner::{DeclFile, ScanResult};

/// What a module's `init` may touch.
pub struct DeclContext<'a> {
    pub builders: &'a Builders,
    pub images: &'a mut ImageStore,
    /// Directory image paths resolve against.
    pub base_dir: &'a Path,
    errors: Vec<DataError>,
}

impl<'a> DeclContext<'a> {
    pub fn new(builders: &'a Builders, images: &'a mut ImageStore, base_dir: &'a Path) -> Self {
        Self {
            builders,
            images,
            base_dir,
            errors: Vec::new(),
        }
    }

    /// Record a problem with one declaration and keep going.
    pub fn report(&mut self, e: DataError) {
        self.errors.push(e);
    }

    pub fn into_errors(self) -> Vec<DataError> {
        self.errors
    }
}

/// A unit of declarations.
pub trait DeclModule {
    fn name(&self) -> &str;

    /// Add prototypes. An `Err` abandons the rest of this module only.
    fn init(&self, cx: &mut DeclContext<'_>) -> Result<()>;

    /// Directory relative image paths resolve against.
    fn base_dir(&self) -> &Path {
        Path::new(".")
    }
}

/// A parsed `*.data.yaml` file.
#[derive(Debug)]
pub struct YamlModule {
    name: String,
    path: PathBuf,
    base_dir: PathBuf,
    doc: DeclDocument,
}

impl YamlModule {
    pub fn load(file: &DeclFile) -> Result<Self> {
        let doc = parse_decl_file(&file.path)?;
        let stem = file
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.trim_end_matches(super::scanner::DECL_SUFFIX))
            .unwrap_or("?");
        Ok(Self {
            name: format!("{}::{}", file.group, stem),
            path: file.path.clone(),
            base_dir: file.path.parent().map(Path::to_path_buf).unwrap_or_default(),
            doc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeclModule for YamlModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self, cx: &mut DeclContext<'_>) -> Result<()> {
        let mut apply = ApplyContext {
            images: &mut *cx.images,
            base_dir: cx.base_dir,
        };
        let errors = apply_document(&self.doc, cx.builders, &mut apply);
        for e in errors {
            cx.report(e);
        }
        Ok(())
    }

    fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

/// Run `modules` in order against `builders`.
pub fn run_modules(
    modules: &[Box<dyn DeclModule>],
    builders: &Builders,
    images: &mut ImageStore,
    diags: &mut Diagnostics,
) {
    for m in modules {
        debug!("init {}", m.name());
        let mut cx = DeclContext::new(builders, images, m.base_dir());
        let result = m.init(&mut cx);
        for e in cx.into_errors() {
            diags.push_err(&e);
        }
        if let Err(e) = result {
            diags.push_err(&e);
        }
    }
}

/// Parse every discovered declaration file. Files that fail to parse are
/// reported and skipped.
pub fn load_yaml_modules(scan: &ScanResult, diags: &mut Diagnostics) -> Vec<Box<dyn DeclModule>> {
    let mut modules: Vec<Box<dyn DeclModule>> = Vec::with_capacity(scan.decls.len());
    for file in &scan.decls {
        match YamlModule::load(file) {
            Ok(m) => modules.push(Box::new(m)),
            Err(e) => diags.push_err(&e),
        }
    }
    info!("loaded {} declaration modules", modules.len());
    modules
}

/// Merge every `item_descs.yaml`. Later files win; a name described twice
/// is a warning.
pub fn load_item_descs(paths: &[PathBuf], diags: &mut Diagnostics) -> BTreeMap<String, String> {
    let mut descs = BTreeMap::new();
    for path in paths {
        let Some(file) = diags.check(parse_item_descs_file(path)) else {
            continue;
        };
        for (name, desc) in file {
            if descs.insert(name.clone(), desc).is_some() {
                diags.warning(
                    "outpost::descs::duplicate",
                    format!("item `{}` described again in {}", name, path.display()),
                );
            }
        }
    }
    descs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::scanner::CORE_GROUP;
    use std::fs;
    use tempfile::tempdir;

    struct Fixed;

    impl DeclModule for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn init(&self, cx: &mut DeclContext<'_>) -> Result<()> {
            cx.builders.items.new("none").display_name("Nothing");
            cx.report(DataError::config("fixed", "x", "is odd"));
            Err(DataError::config("fixed", "y", "is fatal"))
        }
    }

    #[test]
    fn test_run_modules_collects_errors() {
        let builders = Builders::new();
        let mut images = ImageStore::in_memory();
        let mut diags = Diagnostics::new();
        let modules: Vec<Box<dyn DeclModule>> = vec![Box::new(Fixed)];
        run_modules(&modules, &builders, &mut images, &mut diags);
        assert_eq!(diags.error_count(), 2);
        assert_eq!(builders.items.len(), 1);
    }

    #[test]
    fn test_yaml_module() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.data.yaml");
        fs::write(&path, "items:\n  wood: { display_name: Wood }\n").unwrap();
        let file = DeclFile {
            group: CORE_GROUP.to_string(),
            path,
        };
        let m = YamlModule::load(&file).unwrap();
        assert_eq!(m.name(), "outpost::items");
        assert_eq!(m.base_dir(), dir.path());

        let builders = Builders::new();
        let mut images = ImageStore::in_memory();
        let mut diags = Diagnostics::new();
        run_modules(&[Box::new(m) as Box<dyn DeclModule>], &builders, &mut images, &mut diags);
        assert!(diags.is_ok());
        assert!(builders.items.all().contains_key("wood"));
    }

    #[test]
    fn test_broken_file_is_skipped() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("a.data.yaml");
        let bad = dir.path().join("b.data.yaml");
        fs::write(&good, "items: {}\n").unwrap();
        fs::write(&bad, "items: [oops\n").unwrap();
        let scan = ScanResult {
            decls: vec![
                DeclFile { group: CORE_GROUP.into(), path: good },
                DeclFile { group: CORE_GROUP.into(), path: bad },
            ],
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        let modules = load_yaml_modules(&scan, &mut diags);
        assert_eq!(modules.len(), 1);
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_item_descs_later_wins() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.yaml");
        let b = dir.path().join("b.yaml");
        fs::write(&a, "wood: old\nstone: Heavy.\n").unwrap();
        fs::write(&b, "wood: new\n").unwrap();
        let mut diags = Diagnostics::new();
        let descs = load_item_descs(&[a, b], &mut diags);
        assert_eq!(descs["wood"], "new");
        assert_eq!(descs["stone"], "Heavy.");
        assert_eq!(diags.warning_count(), 1);
    }
}
