use super::{read_input, write_output};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use letterpress_editor::{export_plain, to_plain, Document, EditorMode, EditorSettings};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// HTML file holding the message being replied to
    pub input: PathBuf,

    /// Line width, quote marks included (overrides config)
    #[arg(short, long)]
    pub width: Option<usize>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn quote(args: QuoteArgs, config: &Config) -> Result<()> {
    let settings = config.settings(args.width).with_mode(EditorMode::Plain);
    settings.validate()?;
    let html = read_input(&args.input)?;
    info!(input = %args.input.display(), "quoting reply");
    let text = quote_reply(&html, &settings)?;
    write_output(&text, args.output.as_ref())
}

/// Cites `html` one level deeper and renders it as quoted plain text.
pub fn quote_reply(html: &str, settings: &EditorSettings) -> Result<String> {
    let mut doc = Document::from_html(&format!("<blockquote type=\"cite\">{}</blockquote>", html))?;
    to_plain(&mut doc, settings)?;
    Ok(export_plain(&doc, settings)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_reply() {
        let settings = EditorSettings::default()
            .with_mode(EditorMode::Plain)
            .with_word_wrap_length(15);
        let text = quote_reply("<div>aaaaaaaaaa bbbbbbbbbb</div>", &settings).unwrap();
        assert_eq!(text, "> aaaaaaaaaa\n> bbbbbbbbbb");
    }

    #[test]
    fn test_quote_nested_reply() {
        let settings = EditorSettings::default().with_mode(EditorMode::Plain);
        let text = quote_reply(
            "<div>Yes.</div><blockquote type=\"cite\"><div>Lunch?</div></blockquote>",
            &settings,
        )
        .unwrap();
        assert_eq!(text, "> Yes.\n> > Lunch?");
    }
}
