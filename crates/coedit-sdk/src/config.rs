//! Editor configuration.

use crate::color::PALETTE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a collaborative editor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Display name shown on cursor labels. Falls back to the session id.
    pub user_name: Option<String>,
    /// Fixed cursor color. Picked at random from `palette` when unset.
    pub color: Option<String>,
    /// Undo coalescing window in milliseconds.
    pub capture_timeout_ms: u64,
    /// Remote awareness states older than this are dropped.
    pub awareness_timeout_ms: u64,
    /// Colors to pick participant colors from.
    pub palette: Vec<String>,
}

impl EditorConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn awareness_timeout(&self) -> Duration {
        Duration::from_millis(self.awareness_timeout_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            user_name: None,
            color: None,
            capture_timeout_ms: 200,
            awareness_timeout_ms: 30_000,
            palette: PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Builder for editor configuration.
pub struct EditorConfigBuilder {
    config: EditorConfig,
}

impl EditorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
        }
    }

    pub fn user_name(mut self, name: impl Into<String>) -> Self {
        self.config.user_name = Some(name.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.config.color = Some(color.into());
        self
    }

    pub fn capture_timeout(mut self, ms: u64) -> Self {
        self.config.capture_timeout_ms = ms;
        self
    }

    pub fn awareness_timeout(mut self, ms: u64) -> Self {
        self.config.awareness_timeout_ms = ms;
        self
    }

    pub fn palette<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.palette = colors.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> EditorConfig {
        self.config
    }
}

impl Default for EditorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.capture_timeout(), Duration::from_millis(200));
        assert_eq!(config.palette.len(), 8);
        assert!(config.color.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = EditorConfigBuilder::new()
            .user_name("Bob")
            .color("#ffbc42")
            .capture_timeout(500)
            .palette(["#000000"])
            .build();

        assert_eq!(config.user_name.as_deref(), Some("Bob"));
        assert_eq!(config.color.as_deref(), Some("#ffbc42"));
        assert_eq!(config.capture_timeout_ms, 500);
        assert_eq!(config.palette, vec!["#000000".to_string()]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EditorConfig =
            serde_json::from_str(r#"{ "user_name": "Alice" }"#).unwrap();
        assert_eq!(config.user_name.as_deref(), Some("Alice"));
        assert_eq!(config.awareness_timeout_ms, 30_000);
    }
}
