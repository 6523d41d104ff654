//! # Editor settings
//!
//! Read by the host and handed to the session at construction. The core keeps
//! no persisted state of its own.

use crate::errors::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WORD_WRAP_LENGTH: usize = 71;
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Html,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorSettings {
    /// Column width of plain text paragraphs.
    pub word_wrap_length: usize,
    pub mode: EditorMode,
    /// Wrap quoted paragraphs when converting a reply to plain text. When
    /// off, quoted lines keep their length inside `pre` blocks.
    pub wrap_quoted_text_in_replies: bool,
    pub magic_links: bool,
    pub magic_smileys: bool,
    /// Insert smileys as Unicode glyphs instead of wrapped text faces.
    pub unicode_smileys: bool,
    pub history_limit: usize,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            word_wrap_length: DEFAULT_WORD_WRAP_LENGTH,
            mode: EditorMode::Html,
            wrap_quoted_text_in_replies: true,
            magic_links: true,
            magic_smileys: false,
            unicode_smileys: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl EditorSettings {
    pub fn from_json(source: &str) -> EditorResult<Self> {
        let settings: Self =
            serde_json::from_str(source).map_err(|e| EditorError::Settings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.word_wrap_length == 0 {
            return Err(EditorError::Settings(
                "wordWrapLength must be positive".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(EditorError::Settings(
                "historyLimit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_plain(&self) -> bool {
        self.mode == EditorMode::Plain
    }

    pub fn with_mode(mut self, mode: EditorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_word_wrap_length(mut self, length: usize) -> Self {
        self.word_wrap_length = length;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = EditorSettings::from_json(r#"{ "wordWrapLength": 60, "mode": "plain" }"#).unwrap();
        assert_eq!(settings.word_wrap_length, 60);
        assert!(settings.is_plain());
        assert!(settings.magic_links);
        assert_eq!(settings.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_rejects_zero_width() {
        let err = EditorSettings::from_json(r#"{ "wordWrapLength": 0 }"#).unwrap_err();
        assert!(matches!(err, EditorError::Settings(_)));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(EditorSettings::default()).unwrap();
        assert_eq!(json["wordWrapLength"], 71);
        assert_eq!(json["mode"], "html");
        assert_eq!(json["wrapQuotedTextInReplies"], true);
    }
}
