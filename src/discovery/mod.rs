//! Finding and loading declaration sources.
//!
//! A source dir holds an optional `pipeline.yaml`, the core declarations
//! under `data/`, and optional mods under `mods/<name>/`.
//!
//! ```ignore
//! let found = discover("./src", &["winter".into()])?;
//! let modules = load_yaml_modules(&found.scan, &mut diags);
//! ```

mod loader;
mod manifest;
mod scanner;

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;

pub use loader::{load_item_descs, load_yaml_modules, run_modules, DeclContext, DeclModule, YamlModule};
pub use manifest::Manifest;
pub use scanner::{
    available_mods, detect_file_kind, scan_directory, scan_sources, DeclFile, FileKind, ScanResult,
    CORE_GROUP, DECL_SUFFIX, ITEM_DESCS_FILENAME,
};

/// The name of the project file.
pub const MANIFEST_FILENAME: &str = "pipeline.yaml";

/// Result of discovering sources in a project.
#[derive(Debug)]
pub struct DiscoveryResult {
    pub root: PathBuf,

    /// The loaded project file, or defaults when there is none.
    pub manifest: Manifest,

    pub has_manifest: bool,

    pub scan: ScanResult,
}

/// Load `root/pipeline.yaml` and scan the core group plus `mods`.
pub fn discover(root: impl AsRef<Path>, mods: &[String]) -> Result<DiscoveryResult> {
    let root = root.as_ref().to_path_buf();
    let (manifest, has_manifest) = Manifest::load_or_default(&root)?;
    let scan = scan_sources(&root, mods, &manifest)?;
    debug!(
        "found {} declaration files, {} item_descs files, {} images",
        scan.decls.len(),
        scan.item_descs.len(),
        scan.images.len()
    );

    Ok(DiscoveryResult {
        root,
        manifest,
        has_manifest,
        scan,
    })
}
