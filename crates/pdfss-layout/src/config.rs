use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use pdfss_core::config_file::RelayoutSection;
use pdfss_core::{DEFAULT_SKIP_KINDS, Glyph, ObjectKind};

use crate::ConfigError;
use crate::grouping::{DefaultLineGrouper, DefaultTextMerger, LineGrouper, TextMerger};

/// Controls how a list of values is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

/// Predicate deciding whether a char takes part in the relayout.
pub type CharFilter = Arc<dyn Fn(&Glyph) -> bool + Send + Sync>;

/// Configuration of [`crate::relayout()`].
///
/// Use [`RelayoutConfigBuilder`] to construct anything but the defaults.
#[derive(Clone)]
pub struct RelayoutConfig {
    /// Kinds of objects that are neither yielded nor recursed into.
    pub(crate) skip_kinds: Vec<ObjectKind>,
    /// Text of lines dropped before regrouping, useful when margin text
    /// clutters the lines of interest.
    pub(crate) skip_text: HashSet<String>,
    pub(crate) char_filter: Option<CharFilter>,
    pub(crate) text_merger: Arc<dyn TextMerger>,
    pub(crate) line_grouper: Arc<dyn LineGrouper>,
}

impl Default for RelayoutConfig {
    fn default() -> Self {
        Self {
            skip_kinds: DEFAULT_SKIP_KINDS.to_vec(),
            skip_text: HashSet::new(),
            char_filter: None,
            text_merger: Arc::new(DefaultTextMerger::default()),
            line_grouper: Arc::new(DefaultLineGrouper::default()),
        }
    }
}

impl fmt::Debug for RelayoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayoutConfig")
            .field("skip_kinds", &self.skip_kinds)
            .field("skip_text", &self.skip_text.len())
            .field("char_filter", &self.char_filter.is_some())
            .finish_non_exhaustive()
    }
}

impl RelayoutConfig {
    pub fn skip_kinds(&self) -> &[ObjectKind] {
        &self.skip_kinds
    }

    pub fn skip_text(&self) -> &HashSet<String> {
        &self.skip_text
    }
}

/// Builder for [`RelayoutConfig`].
///
/// Numeric factors configure the default grouping policies and are checked
/// in [`build()`](Self::build). A custom merger or grouper takes precedence
/// over the corresponding factors.
#[derive(Default)]
pub struct RelayoutConfigBuilder {
    skip_kinds: ListOverride<ObjectKind>,
    skip_text: HashSet<String>,
    char_filter: Option<CharFilter>,
    width_factor: Option<f64>,
    font_size_diff_factor: Option<f64>,
    min_y_diff: Option<f64>,
    text_merger: Option<Arc<dyn TextMerger>>,
    line_grouper: Option<Arc<dyn LineGrouper>>,
}

impl fmt::Debug for RelayoutConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayoutConfigBuilder")
            .field("skip_kinds", &self.skip_kinds)
            .field("width_factor", &self.width_factor)
            .field("font_size_diff_factor", &self.font_size_diff_factor)
            .field("min_y_diff", &self.min_y_diff)
            .finish_non_exhaustive()
    }
}

impl RelayoutConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the `[relayout]` section of a config file.
    pub fn from_section(section: &RelayoutSection) -> Self {
        let mut builder = Self::new();
        if let Some(kinds) = &section.skip_kinds {
            builder = builder.set_skip_kinds(kinds.clone());
        }
        if let Some(texts) = &section.skip_text {
            builder = builder.skip_text(texts.iter().cloned());
        }
        builder.width_factor = section.width_factor;
        builder.font_size_diff_factor = section.font_size_diff_factor;
        builder.min_y_diff = section.min_y_diff;
        builder
    }

    // ── Skipped objects ──

    pub fn set_skip_kinds(mut self, kinds: Vec<ObjectKind>) -> Self {
        self.skip_kinds = ListOverride::Replace(kinds);
        self
    }

    pub fn add_skip_kind(mut self, kind: ObjectKind) -> Self {
        match &mut self.skip_kinds {
            ListOverride::Extend(v) | ListOverride::Replace(v) => v.push(kind),
            ListOverride::Default => self.skip_kinds = ListOverride::Extend(vec![kind]),
        }
        self
    }

    pub fn skip_text<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_text.extend(texts.into_iter().map(Into::into));
        self
    }

    /// Drop chars for which `filter` returns `false`.
    pub fn char_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Glyph) -> bool + Send + Sync + 'static,
    {
        self.char_filter = Some(Arc::new(filter));
        self
    }

    // ── Default policies ──

    pub fn width_factor(mut self, factor: f64) -> Self {
        self.width_factor = Some(factor);
        self
    }

    pub fn font_size_diff_factor(mut self, factor: f64) -> Self {
        self.font_size_diff_factor = Some(factor);
        self
    }

    pub fn min_y_diff(mut self, diff: f64) -> Self {
        self.min_y_diff = Some(diff);
        self
    }

    // ── Custom policies ──

    pub fn text_merger(mut self, merger: impl TextMerger + 'static) -> Self {
        self.text_merger = Some(Arc::new(merger));
        self
    }

    pub fn line_grouper(mut self, grouper: impl LineGrouper + 'static) -> Self {
        self.line_grouper = Some(Arc::new(grouper));
        self
    }

    /// Validate the numeric factors and produce a [`RelayoutConfig`].
    pub fn build(self) -> Result<RelayoutConfig, ConfigError> {
        let width_factor = positive("width_factor", self.width_factor)?;
        let font_size_diff_factor = positive("font_size_diff_factor", self.font_size_diff_factor)?;
        let min_y_diff = positive("min_y_diff", self.min_y_diff)?;

        let text_merger = self.text_merger.unwrap_or_else(|| {
            let mut merger = DefaultTextMerger::default();
            if let Some(factor) = width_factor {
                merger.width_factor = factor;
            }
            Arc::new(merger)
        });
        let line_grouper = self.line_grouper.unwrap_or_else(|| {
            let mut grouper = DefaultLineGrouper::default();
            if let Some(factor) = font_size_diff_factor {
                grouper.font_size_diff_factor = factor;
            }
            if let Some(diff) = min_y_diff {
                grouper.min_y_diff = diff;
            }
            Arc::new(grouper)
        });

        Ok(RelayoutConfig {
            skip_kinds: self.skip_kinds.resolve(DEFAULT_SKIP_KINDS),
            skip_text: self.skip_text,
            char_filter: self.char_filter,
            text_merger,
            line_grouper,
        })
    }
}

fn positive(name: &'static str, value: Option<f64>) -> Result<Option<f64>, ConfigError> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(ConfigError::InvalidFactor { name, value: v }),
        other => Ok(other),
    }
}
