use anyhow::Context;
use letterpress_editor::EditorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "letterpress.config.json";

/// Letterpress configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Editor settings, at the top level of the file
    #[serde(flatten)]
    pub editor: EditorSettings,

    /// Log filter used when no `-v` flag is given (e.g. "info", "letterpress_editor=debug")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl Config {
    /// Loads `explicit` if given, otherwise `letterpress.config.json` in `cwd`
    /// when it exists.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<Self> {
        let (config_path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME), false),
        };

        if !config_path.exists() {
            if required {
                anyhow::bail!("Config file does not exist: {}", config_path.display());
            }
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", config_path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.editor.validate()?;
        Ok(config)
    }

    /// Editor settings with an optional width override.
    pub fn settings(&self, width: Option<usize>) -> EditorSettings {
        match width {
            Some(width) => self.editor.clone().with_word_wrap_length(width),
            None => self.editor.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterpress_editor::EditorMode;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "wordWrapLength": 60,
            "mode": "plain",
            "magicSmileys": true,
            "log": "debug"
        }"#;

        let config = Config::parse(json).unwrap();
        assert_eq!(config.editor.word_wrap_length, 60);
        assert_eq!(config.editor.mode, EditorMode::Plain);
        assert!(config.editor.magic_smileys);
        assert!(config.editor.magic_links);
        assert_eq!(config.log.as_deref(), Some("debug"));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.editor.word_wrap_length, 71);
        assert_eq!(config.editor.mode, EditorMode::Html);
        assert!(config.log.is_none());
    }

    #[test]
    fn test_rejects_invalid_width() {
        assert!(Config::parse(r#"{ "wordWrapLength": 0 }"#).is_err());
    }

    #[test]
    fn test_missing_default_file_uses_defaults() {
        let dir = std::env::temp_dir().join("letterpress-config-test-missing");
        let config = Config::load(None, &dir).unwrap();
        assert_eq!(config.editor, EditorSettings::default());
        assert!(Config::load(Some(&dir.join("nope.json")), &dir).is_err());
    }

    #[test]
    fn test_width_override() {
        let config = Config::default();
        assert_eq!(config.settings(Some(40)).word_wrap_length, 40);
        assert_eq!(config.settings(None).word_wrap_length, 71);
    }
}
