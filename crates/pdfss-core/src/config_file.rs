use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::ObjectKind;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub relayout: Option<RelayoutSection>,
    pub display: Option<DisplayConfig>,
}

/// Tuning of the relayout engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayoutSection {
    /// Horizontal merge tolerance, as a factor of the char width.
    pub width_factor: Option<f64>,
    /// Maximum font size difference between grouped lines, as a factor of
    /// the greatest font size.
    pub font_size_diff_factor: Option<f64>,
    /// Floor of the allowed vertical difference between grouped lines.
    pub min_y_diff: Option<f64>,
    /// Lines whose text is exactly one of these are dropped.
    pub skip_text: Option<Vec<String>>,
    /// Object kinds not recursed into. Replaces the default list.
    pub skip_kinds: Option<Vec<ObjectKind>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub color: Option<bool>,
}

/// Platform config directory path: `<config_dir>/pdfss/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pdfss").join("config.toml"))
}

/// Load config by cascading CWD `.pdfss.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".pdfss.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_relayout = base.relayout.unwrap_or_default();
    let overlay_relayout = overlay.relayout.unwrap_or_default();
    let base_display = base.display.unwrap_or_default();
    let overlay_display = overlay.display.unwrap_or_default();

    ConfigFile {
        relayout: Some(RelayoutSection {
            width_factor: overlay_relayout.width_factor.or(base_relayout.width_factor),
            font_size_diff_factor: overlay_relayout
                .font_size_diff_factor
                .or(base_relayout.font_size_diff_factor),
            min_y_diff: overlay_relayout.min_y_diff.or(base_relayout.min_y_diff),
            skip_text: overlay_relayout.skip_text.or(base_relayout.skip_text),
            skip_kinds: overlay_relayout.skip_kinds.or(base_relayout.skip_kinds),
        }),
        display: Some(DisplayConfig {
            color: overlay_display.color.or(base_display.color),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let config: ConfigFile = toml::from_str(
            r#"
            [relayout]
            width_factor = 2.0
            skip_kinds = ["figure", "image"]
            "#,
        )
        .unwrap();
        let relayout = config.relayout.unwrap();
        assert_eq!(relayout.width_factor, Some(2.0));
        assert_eq!(relayout.min_y_diff, None);
        assert_eq!(
            relayout.skip_kinds,
            Some(vec![ObjectKind::Figure, ObjectKind::Image])
        );
        assert!(config.display.is_none());
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = ConfigFile {
            relayout: Some(RelayoutSection {
                width_factor: Some(1.0),
                min_y_diff: Some(2.0),
                ..Default::default()
            }),
            display: Some(DisplayConfig { color: Some(true) }),
        };
        let overlay = ConfigFile {
            relayout: Some(RelayoutSection {
                width_factor: Some(3.0),
                skip_text: Some(vec!["page".to_string()]),
                ..Default::default()
            }),
            display: None,
        };
        let merged = merge(base, overlay);
        let relayout = merged.relayout.unwrap();
        assert_eq!(relayout.width_factor, Some(3.0));
        assert_eq!(relayout.min_y_diff, Some(2.0));
        assert_eq!(relayout.skip_text, Some(vec!["page".to_string()]));
        assert_eq!(merged.display.unwrap().color, Some(true));
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[display]\ncolor = false\n").unwrap();
        let config = load_from_path(&good).unwrap();
        assert_eq!(config.display.unwrap().color, Some(false));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[display\n").unwrap();
        assert!(load_from_path(&bad).is_none());
        assert!(load_from_path(&dir.path().join("missing.toml")).is_none());
    }
}
