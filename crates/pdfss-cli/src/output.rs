use std::io::Write;

use owo_colors::OwoColorize;
use pdfss_layout::LinesGroup;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Separator printed between the blocks of a line.
const BLOCK_SEPARATOR: &str = " | ";

/// Print the relayout result of a page: one paragraph per group, one row per
/// line with its blocks separated by `|`.
pub fn print_groups(
    w: &mut dyn Write,
    page_number: u32,
    groups: &[LinesGroup],
    color: ColorMode,
) -> std::io::Result<()> {
    let header = format!("page {} ({} groups)", page_number, groups.len());
    if color.enabled() {
        writeln!(w, "{}", header.bold())?;
    } else {
        writeln!(w, "{}", header)?;
    }

    for group in groups {
        writeln!(w)?;
        for line in group {
            if color.enabled() {
                let separator = BLOCK_SEPARATOR.dimmed().to_string();
                writeln!(w, "  {}", line.texts().join(&separator))?;
            } else {
                writeln!(w, "  {}", line.texts().join(BLOCK_SEPARATOR))?;
            }
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Warn about a page made of a single figure and holding no text.
pub fn print_scanned_warning(
    w: &mut dyn Write,
    page_number: u32,
    color: ColorMode,
) -> std::io::Result<()> {
    let message = format!(
        "page {} has no text but a single figure, is it a scanned document?",
        page_number
    );
    if color.enabled() {
        writeln!(w, "{} {}", "WARNING:".yellow(), message)
    } else {
        writeln!(w, "WARNING: {}", message)
    }
}

/// Texts of the groups as nested JSON arrays: groups, lines, blocks.
pub fn groups_json(groups: &[LinesGroup]) -> serde_json::Value {
    serde_json::Value::from(
        groups
            .iter()
            .map(|group| serde_json::Value::from(group.texts()))
            .collect::<Vec<_>>(),
    )
}
