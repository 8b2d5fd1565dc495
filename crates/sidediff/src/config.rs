//! Configuration file support for sdif
//!
//! Config file location: `~/.config/sidediff/config.toml` (XDG_CONFIG_HOME)
//!
//! Example config:
//! ```toml
//! [display]
//! width = 200
//! number = true
//! digit = 4
//! fold = "word"        # fold, word or truncate
//! mark = "center"      # left, right, center, side or no
//! view = false
//! ambiguous = "narrow" # narrow or wide
//! tabstop = 8
//! color = "auto"       # auto, always or never
//!
//! [colors]
//! OTEXT = "#e06c75"
//! NTEXT = "green bold"
//! ULINE = "dim"
//! ```

use serde::Deserialize;
use sidediff_core::{AmbiguousWidth, ColorMap, FoldMode, MarkPosition};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Display configuration
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Total output width; falls back to `COLUMNS`
    pub width: Option<usize>,
    /// Show line numbers
    pub number: bool,
    /// Digits reserved for line numbers
    pub digit: usize,
    /// "fold", "word" or "truncate"
    pub fold: Option<String>,
    /// "left", "right", "center", "side" or "no"
    pub mark: Option<String>,
    /// Start in view mode
    pub view: bool,
    /// "narrow" or "wide"
    pub ambiguous: Option<String>,
    pub tabstop: usize,
    /// "auto", "always" or "never"
    pub color: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: None,
            number: false,
            digit: 4,
            fold: None,
            mark: None,
            view: false,
            ambiguous: None,
            tabstop: 8,
            color: None,
        }
    }
}

/// Root configuration
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    /// Color field name (e.g. OTEXT) to color spec
    pub colors: BTreeMap<String, String>,
}

impl Config {
    /// Get all possible config file paths in priority order
    fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("sidediff").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("sidediff").join("config.toml"));
        }

        // ~/Library/Application Support on macOS
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("sidediff").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        paths
    }

    /// Get the first existing config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_paths().into_iter().find(|p| p.exists())
    }

    /// Load config from XDG config path
    /// Returns default config if file doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| {
                log::debug!("loading config from {}", path.display());
                std::fs::read_to_string(&path).ok()
            })
            .and_then(|content| {
                Self::parse(&content)
                    .map_err(|e| {
                        log::warn!("Failed to parse config: {}", e);
                        e
                    })
                    .ok()
            })
            .unwrap_or_default()
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn fold_mode(&self) -> Option<FoldMode> {
        self.display.fold.as_deref().and_then(|s| match s {
            "fold" => Some(FoldMode::Fold),
            "word" | "onword" => Some(FoldMode::Word),
            "truncate" => Some(FoldMode::Truncate),
            other => {
                log::warn!("Unknown fold mode in config: {other}");
                None
            }
        })
    }

    pub fn mark_position(&self) -> Option<MarkPosition> {
        self.display.mark.as_deref().and_then(|s| {
            s.parse()
                .map_err(|e| log::warn!("Ignoring config mark: {e}"))
                .ok()
        })
    }

    pub fn ambiguous_width(&self) -> Option<AmbiguousWidth> {
        self.display.ambiguous.as_deref().and_then(|s| match s {
            "narrow" => Some(AmbiguousWidth::Narrow),
            "wide" => Some(AmbiguousWidth::Wide),
            other => {
                log::warn!("Unknown ambiguous width in config: {other}");
                None
            }
        })
    }

    /// Apply the `[colors]` table on top of `colors`; bad entries are skipped
    pub fn apply_colors(&self, colors: &mut ColorMap) {
        for (name, spec) in &self.colors {
            let applied = name.parse().and_then(|field| colors.set(field, spec));
            if let Err(e) = applied {
                log::warn!("Ignoring color {name} = {spec:?}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidediff_core::Field;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.display.digit, 4);
        assert_eq!(config.display.tabstop, 8);
        assert!(!config.display.number);
        assert!(config.colors.is_empty());
        assert_eq!(config.fold_mode(), None);
    }

    #[test]
    fn test_display_section() {
        let config = Config::parse(
            r#"
            [display]
            width = 120
            number = true
            fold = "word"
            mark = "side"
            ambiguous = "wide"
            "#,
        )
        .unwrap();
        assert_eq!(config.display.width, Some(120));
        assert!(config.display.number);
        assert_eq!(config.display.digit, 4);
        assert_eq!(config.fold_mode(), Some(FoldMode::Word));
        assert_eq!(config.mark_position(), Some(MarkPosition::Side));
        assert_eq!(config.ambiguous_width(), Some(AmbiguousWidth::Wide));
    }

    #[test]
    fn test_unknown_values_are_ignored() {
        let config = Config::parse(
            r#"
            [display]
            fold = "sideways"
            mark = "middle"
            "#,
        )
        .unwrap();
        assert_eq!(config.fold_mode(), None);
        assert_eq!(config.mark_position(), None);
    }

    #[test]
    fn test_colors_table() {
        let config = Config::parse(
            r##"
            [colors]
            OTEXT = "red"
            ntext = "#00ff00"
            BOGUS = "blue"
            UTEXT = ""
            "##,
        )
        .unwrap();

        let mut colors = ColorMap::with_defaults();
        config.apply_colors(&mut colors);
        assert_eq!(colors.get(Field::Text(sidediff_core::Side::Old)), Some("\x1b[31m"));
        assert_eq!(
            colors.get(Field::Text(sidediff_core::Side::New)),
            Some("\x1b[38;2;0;255;0m")
        );
        assert!(!colors.is_set(Field::UnchangedText));
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(Config::parse("[display\nwidth = ").is_err());
    }
}
