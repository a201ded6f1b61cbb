//! Perfect hash builder: reads names (one per line) on stdin and writes
//! the `sizes` / `hashes` / `params` lines on stdout.

use std::io::{self, BufRead, Write};

use miette::{IntoDiagnostic, Result};
use outpost_data::binary::phf;

fn main() -> Result<()> {
    env_logger::init();

    let names = io::stdin()
        .lock()
        .lines()
        .collect::<io::Result<Vec<String>>>()
        .into_diagnostic()?;
    let table = phf::build(&names)?;

    let mut out = io::stdout().lock();
    out.write_all(table.to_text().as_bytes()).into_diagnostic()?;
    out.flush().into_diagnostic()?;
    Ok(())
}
