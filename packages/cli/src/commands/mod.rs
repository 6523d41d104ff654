pub mod convert;
pub mod quote;
pub mod wrap;

pub use convert::{convert, ConvertArgs};
pub use quote::{quote, QuoteArgs};
pub use wrap::{wrap, WrapArgs};

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Writes `text` to `output`, or to stdout when there is none.
pub(crate) fn write_output(text: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("  {} {}", "✓".green(), path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
