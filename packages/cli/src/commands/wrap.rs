use super::{read_input, write_output};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use letterpress_editor::quote::{quote_prefix, QUOTE_PREFIX};
use letterpress_editor::wrap::{effective_width, wrap_text};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Args)]
pub struct WrapArgs {
    /// Text file, one paragraph per line
    pub input: PathBuf,

    /// Line width (overrides config)
    #[arg(short, long)]
    pub width: Option<usize>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn wrap(args: WrapArgs, config: &Config) -> Result<()> {
    let settings = config.settings(args.width);
    settings.validate()?;
    let text = read_input(&args.input)?;
    info!(input = %args.input.display(), width = settings.word_wrap_length, "wrapping");
    let wrapped = wrap_paragraphs(&text, settings.word_wrap_length);
    write_output(&wrapped, args.output.as_ref())
}

/// Splits leading quote marks off `line`.
fn split_quote_level(line: &str) -> (usize, &str) {
    let mut level = 0;
    let mut rest = line;
    while let Some(stripped) = rest.strip_prefix(QUOTE_PREFIX) {
        level += 1;
        rest = stripped;
    }
    (level, rest)
}

/// Wraps every line of `text` as its own paragraph. Quoted lines keep their
/// marks on every wrapped line.
pub fn wrap_paragraphs(text: &str, width: usize) -> String {
    let mut out = Vec::new();
    for line in text.lines() {
        let (level, content) = split_quote_level(line);
        let prefix = quote_prefix(level);
        let width = effective_width(width, level, 0);
        debug!(level, width, "wrapping paragraph");
        for wrapped in wrap_text(content, width) {
            out.push(format!("{}{}", prefix, wrapped).trim_end().to_string());
        }
    }
    out.join("\n")
}
