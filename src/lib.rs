//! outpost-data - game asset data pipeline
//!
//! Turns content declarations (blocks, items, recipes, structures, sprites,
//! loot tables) and their source PNGs into packed atlases, JSON tables and
//! the binary defs containers the client and server load at startup.

pub mod binary;
pub mod builder;
pub mod cli;
pub mod consts;
pub mod discovery;
pub mod error;
pub mod geom;
pub mod image;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod render;
pub mod types;
pub mod validation;

pub use binary::{BinaryDefs, InProcess, PhfBuilder, Subprocess, Tables};
pub use builder::{Builder, Builders};
pub use discovery::{discover, DeclContext, DeclModule, DiscoveryResult, Manifest, ScanResult};
pub use error::{DataError, Result};
pub use image::{Anim, ImageCache, ImageRef, ImageStore, PixelOp, Rect};
pub use output::Printer;
pub use pipeline::{BuildReport, Pipeline, PipelineOptions};
pub use registry::{postprocess, Defs, IdMaps};
pub use validation::{print_diagnostics, Diagnostic, Diagnostics, Severity};
