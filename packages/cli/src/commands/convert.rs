use super::{read_input, write_output};
use crate::config::Config;
use anyhow::Result;
use clap::{Args, ValueEnum};
use letterpress_editor::{export_html, export_plain, Document, EditorMode, EditorSettings};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Plain,
    Html,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// HTML file to convert
    pub input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "plain")]
    pub to: Target,

    /// Line width for plain text (overrides config)
    #[arg(short, long)]
    pub width: Option<usize>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn convert(args: ConvertArgs, config: &Config) -> Result<()> {
    let settings = config.settings(args.width).with_mode(EditorMode::Html);
    settings.validate()?;
    let html = read_input(&args.input)?;
    info!(input = %args.input.display(), to = ?args.to, "converting");
    let text = convert_html(&html, &settings, args.to)?;
    write_output(&text, args.output.as_ref())
}

/// Loads `html` as a rich document and exports it.
pub fn convert_html(html: &str, settings: &EditorSettings, to: Target) -> Result<String> {
    let doc = Document::from_html(html)?;
    let text = match to {
        Target::Plain => export_plain(&doc, settings)?,
        Target::Html => export_html(&doc, settings)?,
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_to_plain() {
        let settings = EditorSettings::default().with_word_wrap_length(20);
        let text = convert_html(
            "<div>Hello there, this wraps nicely</div><ul><li>one</li></ul>",
            &settings,
            Target::Plain,
        )
        .unwrap();
        assert_eq!(text, "Hello there, this\nwraps nicely\n * one");
    }

    #[test]
    fn test_convert_to_html() {
        let text = convert_html("<div>a &amp; b</div>", &EditorSettings::default(), Target::Html).unwrap();
        assert_eq!(
            text,
            "<html><head><meta charset=\"utf-8\"></head><body><div>a &amp; b</div></body></html>"
        );
    }
}
