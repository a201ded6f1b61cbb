//! Build command implementation.
//!
//! Runs the pipeline from a source dir into a destination dir and reports
//! every accumulated problem before failing.

use std::path::PathBuf;

use clap::Args;

use crate::error::{DataError, Result};
use crate::output::{plural, Printer};
use crate::pipeline::{self, BuildReport, PipelineOptions};
use crate::validation::print_diagnostics;

/// Build atlases, JSON and binary defs
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Output directory
    #[arg(value_name = "DEST_DIR")]
    pub dest_dir: PathBuf,

    /// Directory holding `data/`, `mods/` and `pipeline.yaml`
    #[arg(long, default_value = ".")]
    pub src_dir: PathBuf,

    /// Directory holding native helpers such as `outpost-build-phf`
    #[arg(long)]
    pub native_lib_dir: Option<PathBuf>,

    /// Mods to include, comma separated
    #[arg(long, value_delimiter = ',')]
    pub mods: Vec<String>,

    /// Image cache directory [default: DEST_DIR/cache]
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Delete the image cache before building
    #[arg(long)]
    pub clean: bool,

    /// Treat warnings as errors
    #[arg(long)]
    pub deny_warnings: bool,
}

impl BuildArgs {
    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            dest_dir: self.dest_dir.clone(),
            src_dir: self.src_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            mods: self.mods.iter().filter(|m| !m.is_empty()).cloned().collect(),
            clean: self.clean,
            deny_warnings: self.deny_warnings,
            native_lib_dir: self.native_lib_dir.clone(),
        }
    }
}

pub fn run(args: BuildArgs) -> Result<()> {
    let printer = Printer::new();
    let report = pipeline::run(args.options(), &printer)?;
    finish(&printer, &report)
}

/// Print diagnostics and turn errors into a failed build.
fn finish(printer: &Printer, report: &BuildReport) -> Result<()> {
    print_diagnostics(printer, &report.diags);
    if report.diags.has_errors() {
        return Err(DataError::Build {
            message: format!(
                "build finished with {}",
                plural(report.diags.error_count(), "error", "errors")
            ),
            help: Some("artifacts that could be built were written; fix the errors above and rerun".to_string()),
        });
    }
    Ok(())
}
