//! File naming rules for the template and presentation stores.
//!
//! Names are numbered one past the highest number already in use, so a name
//! freed by a deletion is never handed out again while a later one exists.

use crate::layout::LayoutKind;
use regex::Regex;
use std::sync::LazyLock;

/// Extension of every deck file the engine writes.
pub const DECK_EXTENSION: &str = "pptx";

/// `slide_layout_{kind}_{n}.pptx`
static TEMPLATE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^slide_layout_(\d+)_(\d+)\.pptx$").unwrap());

/// `Presentation{n}.pptx`
static PRESENTATION_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Presentation(\d+)\.pptx$").unwrap());

/// Layout and sequence number of a template file name.
pub fn parse_template_name(file_name: &str) -> Option<(u8, u64)> {
    let caps = TEMPLATE_NAME_REGEX.captures(file_name)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Next free template file name for `kind` given the names already present.
pub fn next_template_name<'a, I>(kind: LayoutKind, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let next = existing
        .into_iter()
        .filter_map(parse_template_name)
        .filter(|(layout, _)| *layout == kind.number())
        .map(|(_, n)| n)
        .max()
        .unwrap_or(0)
        + 1;
    format!("{}_{}.{}", kind.file_prefix(), next, DECK_EXTENSION)
}

/// Next free `Presentation{n}.pptx` name.
pub fn next_presentation_name<'a, I>(existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let next = existing
        .into_iter()
        .filter_map(|name| PRESENTATION_NAME_REGEX.captures(name)?[1].parse::<u64>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    format!("Presentation{}.{}", next, DECK_EXTENSION)
}

/// Name of the copy written after inserting slides into `original`.
pub fn updated_name(original: &str) -> String {
    format!("Updated_{}", original)
}

/// File stem (name without extension).
pub fn stem(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
}
