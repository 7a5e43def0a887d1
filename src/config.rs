//! Terminal configuration.
//!
//! The host owns non-volatile storage and hands the core a TOML document;
//! the core never touches a filesystem. Everything is optional and falls
//! back to the power-on defaults:
//!
//! ```toml
//! # Initial grid size, bounded by the cell budget
//! cols = 80
//! rows = 24
//!
//! # Initial window title
//! title = "remote"
//!
//! [colors]
//! # Palette indexes 0-15
//! foreground = 7
//! background = 0
//!
//! [tabs]
//! # A stop every N columns; 0 disables the default stops
//! interval = 8
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::term::screen::{
    DEFAULT_BG, DEFAULT_COLS, DEFAULT_FG, DEFAULT_ROWS, DEFAULT_TAB_INTERVAL,
};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TermConfig {
    /// Initial grid width
    pub cols: u16,
    /// Initial grid height
    pub rows: u16,
    /// Initial window title
    pub title: String,
    /// Default color settings
    pub colors: ColorConfig,
    /// Tab stop settings
    pub tabs: TabConfig,
}

impl Default for TermConfig {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            title: String::new(),
            colors: ColorConfig::default(),
            tabs: TabConfig::default(),
        }
    }
}

/// Default foreground/background, as palette indexes
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub foreground: u8,
    pub background: u8,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            foreground: DEFAULT_FG,
            background: DEFAULT_BG,
        }
    }
}

/// Tab stop configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TabConfig {
    pub interval: u16,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TAB_INTERVAL,
        }
    }
}

impl TermConfig {
    /// Parse a TOML document supplied by the host.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let config: Self = toml::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Serialize for the host's settings export.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Clamp fields the packed cell format cannot represent. Size limits
    /// are enforced later by the screen, which falls back to 80x24.
    fn sanitized(mut self) -> Self {
        if self.colors.foreground > 15 {
            warn!(
                foreground = self.colors.foreground,
                "foreground outside the 16-color palette, using default"
            );
            self.colors.foreground = DEFAULT_FG;
        }
        if self.colors.background > 15 {
            warn!(
                background = self.colors.background,
                "background outside the 16-color palette, using default"
            );
            self.colors.background = DEFAULT_BG;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = TermConfig::from_toml_str("").unwrap();
        assert_eq!(config.cols, 80);
        assert_eq!(config.rows, 24);
        assert_eq!(config.colors.foreground, 7);
        assert_eq!(config.colors.background, 0);
        assert_eq!(config.tabs.interval, 8);
        assert!(config.title.is_empty());
    }

    #[test]
    fn partial_document_keeps_missing_defaults() {
        let config = TermConfig::from_toml_str(
            r#"
            cols = 132
            title = "uart0"

            [colors]
            foreground = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.cols, 132);
        assert_eq!(config.rows, 24);
        assert_eq!(config.title, "uart0");
        assert_eq!(config.colors.foreground, 10);
        assert_eq!(config.colors.background, 0);
    }

    #[test]
    fn out_of_palette_colors_fall_back() {
        let config = TermConfig::from_toml_str("[colors]\nforeground = 200").unwrap();
        assert_eq!(config.colors.foreground, 7);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(TermConfig::from_toml_str("cols = \"many\"").is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = TermConfig::default();
        config.rows = 30;
        config.tabs.interval = 4;
        let text = config.to_toml_string().unwrap();
        let back = TermConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.rows, 30);
        assert_eq!(back.tabs.interval, 4);
    }
}
