//! Store-level commands: each reads decks from the workspace, runs the
//! engine over them and writes the result back.

use crate::workspace::{file_name, FileSelector, Store, Workspace};
use anyhow::{bail, Context, Result};
use deck_core::editor::{append, insert_slides, remove_slides};
use deck_core::{
    naming, selection, ChartImage, ComposeReport, Deck, LayoutKind, RenumberReport, Renumberer,
    SlideComposer, SlideId, StyleConfig, TemplateBuilder, TemplateFields,
};
use deck_pptx::{PptxReader, PptxWriter};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Title listed for a slide without any text.
pub const NO_TITLE: &str = "[No title]";

/// A deck written by a command.
#[derive(Debug, Clone, Serialize)]
pub struct SavedDeck {
    pub path: PathBuf,
    pub slides: usize,
    /// Shapes left out while copying slides.
    pub warnings: Vec<String>,
    pub renumber: RenumberReport,
}

/// Runs commands against one workspace.
#[derive(Debug, Clone)]
pub struct Assembler {
    workspace: Workspace,
    style: StyleConfig,
    reader: PptxReader,
    writer: PptxWriter,
}

impl Assembler {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            style: StyleConfig::default(),
            reader: PptxReader::new(),
            writer: PptxWriter::new(),
        }
    }

    pub fn with_style(mut self, style: StyleConfig) -> Self {
        self.style = style;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Build a template from chart images and save it to the Slides store.
    ///
    /// The chart count is checked before any image is read or any file
    /// written.
    pub fn build_template(
        &self,
        kind: LayoutKind,
        mut fields: TemplateFields,
        charts: &dyn FileSelector,
    ) -> Result<PathBuf> {
        let candidates = self.workspace.list(Store::Charts)?;
        let chart_paths = charts.select(&candidates)?;
        kind.check_images(chart_paths.len())?;

        let mut images = Vec::with_capacity(chart_paths.len());
        for path in &chart_paths {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            images.push(ChartImage::from_bytes(bytes, &file_name(path))?);
        }

        let existing = self.workspace.file_names(Store::Slides)?;
        let name = naming::next_template_name(kind, existing.iter().map(String::as_str));
        fields.template_name = Some(naming::stem(&name).to_string());

        let deck = TemplateBuilder::new(self.style.clone()).build(kind, &fields, images)?;
        let path = self.workspace.path(Store::Slides, &name);
        self.save(&path, &deck)?;
        log::info!("Created template {}", name);
        Ok(path)
    }

    /// Compose every slide of the selected templates into a new
    /// presentation. Returns `None` when nothing is selected.
    pub fn compose_presentation(&self, templates: &dyn FileSelector) -> Result<Option<SavedDeck>> {
        let sources = self.read_selected(Store::Slides, templates)?;
        let Some(first) = sources.first() else {
            log::info!("No templates selected, nothing to compose");
            return Ok(None);
        };

        let mut deck = Deck::new(first.page());
        let composer = SlideComposer::new();
        let mut report = ComposeReport::default();
        for source in &sources {
            let composed = composer.compose_all(&mut deck, source)?;
            report.slides.extend(composed.slides);
            report.warnings.extend(composed.warnings);
        }
        append(&mut deck, &report.slides)?;
        let renumber = Renumberer::new(self.style.clone()).renumber(&mut deck);

        let existing = self.workspace.file_names(Store::Presentations)?;
        let name = naming::next_presentation_name(existing.iter().map(String::as_str));
        let path = self.workspace.path(Store::Presentations, &name);
        self.save(&path, &deck)?;
        log::info!("Created {} with {} slides", name, deck.slide_count());
        Ok(Some(saved(path, &deck, report, renumber)))
    }

    /// Insert the first slide of each selected template after the given
    /// anchors and save the result as `Updated_{name}`.
    ///
    /// Anchors refer to the presentation as it was before the insertion;
    /// `0` is the front. Returns `None` when no template or no anchor is
    /// selected.
    pub fn insert_into_presentation(
        &self,
        number: usize,
        templates: &dyn FileSelector,
        after: &str,
    ) -> Result<Option<SavedDeck>> {
        let target = self.workspace.presentation(number)?;
        let mut deck = self.open(&target)?;

        let sources = self.read_selected(Store::Slides, templates)?;
        let anchors = selection::parse_anchors(after, deck.slide_count())?;
        if sources.is_empty() || anchors.is_empty() {
            log::info!("Nothing selected, {} left unchanged", target.display());
            return Ok(None);
        }

        let mut firsts: Vec<(&Deck, SlideId)> = Vec::with_capacity(sources.len());
        for source in &sources {
            match source.order().first() {
                Some(id) => firsts.push((source, *id)),
                None => bail!("Selected template has no slides"),
            }
        }

        let report = insert_slides(&mut deck, &firsts, &anchors)?;
        let renumber = Renumberer::new(self.style.clone()).renumber(&mut deck);

        let name = naming::updated_name(&file_name(&target));
        let path = self.workspace.path(Store::Presentations, &name);
        self.save(&path, &deck)?;
        log::info!("Inserted {} slide(s) into {}", report.slides.len(), name);
        Ok(Some(saved(path, &deck, report, renumber)))
    }

    /// Refresh the page numbers of a presentation in place.
    pub fn renumber_presentation(&self, number: usize) -> Result<SavedDeck> {
        let path = self.workspace.presentation(number)?;
        let mut deck = self.open(&path)?;
        let renumber = Renumberer::new(self.style.clone()).renumber(&mut deck);
        self.save(&path, &deck)?;
        Ok(saved(path, &deck, ComposeReport::default(), renumber))
    }

    /// Titles of a presentation's slides in presentation order.
    pub fn slide_titles(&self, number: usize) -> Result<Vec<String>> {
        let path = self.workspace.presentation(number)?;
        let deck = self.open(&path)?;
        Ok(deck
            .ordered_slides()
            .map(|slide| slide.title().unwrap_or_else(|| NO_TITLE.to_string()))
            .collect())
    }

    /// File names of a store.
    pub fn list(&self, store: Store) -> Result<Vec<String>> {
        self.workspace.file_names(store)
    }

    /// Delete selected chart images or templates.
    pub fn delete_files(&self, store: Store, selector: &dyn FileSelector) -> Result<Vec<PathBuf>> {
        if store == Store::Presentations {
            bail!("Presentations are deleted one at a time with `delete presentation`");
        }
        let candidates = self.workspace.list(store)?;
        let picked = selector.select(&candidates)?;
        for path in &picked {
            fs::remove_file(path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
            log::info!("Deleted {}", path.display());
        }
        Ok(picked)
    }

    /// Delete slides by 1-based position from a presentation, renumber and
    /// save it in place. Returns `None` when nothing is selected.
    pub fn delete_slides(&self, number: usize, expr: &str) -> Result<Option<SavedDeck>> {
        let path = self.workspace.presentation(number)?;
        let mut deck = self.open(&path)?;
        let positions = selection::parse(expr, deck.slide_count())?;
        if positions.is_empty() {
            log::info!("No slides selected, {} left unchanged", path.display());
            return Ok(None);
        }

        let removed = remove_slides(&mut deck, &positions)?;
        let renumber = Renumberer::new(self.style.clone()).renumber(&mut deck);
        self.save(&path, &deck)?;
        log::info!("Deleted {} slide(s) from {}", removed.len(), path.display());
        Ok(Some(saved(path, &deck, ComposeReport::default(), renumber)))
    }

    /// Delete a whole presentation file.
    pub fn delete_presentation(&self, number: usize) -> Result<PathBuf> {
        let path = self.workspace.presentation(number)?;
        fs::remove_file(&path).with_context(|| format!("Failed to delete {}", path.display()))?;
        log::info!("Deleted {}", path.display());
        Ok(path)
    }

    fn read_selected(&self, store: Store, selector: &dyn FileSelector) -> Result<Vec<Deck>> {
        let candidates = self.workspace.list(store)?;
        selector
            .select(&candidates)?
            .iter()
            .map(|path| self.open(path))
            .collect()
    }

    fn open(&self, path: &Path) -> Result<Deck> {
        log::debug!("Reading {}", path.display());
        self.reader
            .open(path)
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    fn save(&self, path: &Path, deck: &Deck) -> Result<()> {
        self.writer
            .write(path, deck)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn saved(path: PathBuf, deck: &Deck, report: ComposeReport, renumber: RenumberReport) -> SavedDeck {
    SavedDeck {
        path,
        slides: deck.slide_count(),
        warnings: report.warnings.iter().map(ToString::to_string).collect(),
        renumber,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{ExplicitSelector, ExpressionSelector};
    use deck_core::Role;
    use tempfile::TempDir;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

    fn setup() -> (TempDir, Assembler) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        (dir, Assembler::new(workspace))
    }

    fn add_charts(assembler: &Assembler, names: &[&str]) {
        for name in names {
            fs::write(assembler.workspace().path(Store::Charts, name), PNG).unwrap();
        }
    }

    fn titled(title: &str) -> TemplateFields {
        TemplateFields {
            title: title.to_string(),
            ..TemplateFields::default()
        }
    }

    fn none() -> ExpressionSelector {
        ExpressionSelector::new("")
    }

    fn page_numbers(assembler: &Assembler, path: &Path) -> Vec<Option<String>> {
        let deck = assembler.open(path).unwrap();
        deck.ordered_slides()
            .map(|slide| {
                slide
                    .shapes()
                    .iter()
                    .find(|s| s.role == Role::PageNumber)
                    .and_then(|s| s.inspect_text().ok().flatten())
                    .map(|text| text.trim().to_string())
            })
            .collect()
    }

    #[test]
    fn test_build_template_names_files() {
        let (_dir, assembler) = setup();
        let first = assembler
            .build_template(LayoutKind::Cover, titled("Cover"), &none())
            .unwrap();
        let second = assembler
            .build_template(LayoutKind::Cover, titled("Cover"), &none())
            .unwrap();
        assert_eq!(file_name(&first), "slide_layout_1_1.pptx");
        assert_eq!(file_name(&second), "slide_layout_1_2.pptx");

        fs::remove_file(&first).unwrap();
        let third = assembler
            .build_template(LayoutKind::Cover, titled("Cover"), &none())
            .unwrap();
        assert_eq!(file_name(&third), "slide_layout_1_3.pptx");
    }

    #[test]
    fn test_two_chart_with_one_image_writes_nothing() {
        let (_dir, assembler) = setup();
        add_charts(&assembler, &["a.png", "b.png"]);

        let err = assembler
            .build_template(
                LayoutKind::TwoChart,
                TemplateFields::default(),
                &ExpressionSelector::new("1"),
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<deck_core::Error>(),
            Some(deck_core::Error::InsufficientImages {
                layout: 3,
                required: 2,
                supplied: 1
            })
        ));
        assert!(assembler.list(Store::Slides).unwrap().is_empty());

        let path = assembler
            .build_template(
                LayoutKind::TwoChart,
                TemplateFields::default(),
                &ExpressionSelector::new("1-2"),
            )
            .unwrap();
        let deck = assembler.open(&path).unwrap();
        assert_eq!(deck.slide_count(), 1);
        assert_eq!(deck.slide_at(1).unwrap().pictures().count(), 2);
    }

    #[test]
    fn test_build_template_from_explicit_paths() {
        let (dir, assembler) = setup();
        let outside = dir.path().join("chart.png");
        fs::write(&outside, PNG).unwrap();
        let selector = ExplicitSelector::new(vec![outside.clone(), outside.clone(), outside]);

        let path = assembler
            .build_template(LayoutKind::ThreeChart, TemplateFields::default(), &selector)
            .unwrap();
        assert_eq!(file_name(&path), "slide_layout_4_1.pptx");
    }

    #[test]
    fn test_compose_presentation() {
        let (_dir, assembler) = setup();
        assembler
            .build_template(LayoutKind::Cover, titled("Annual Report"), &none())
            .unwrap();
        assembler
            .build_template(LayoutKind::ExecutiveSummary, titled("Summary"), &none())
            .unwrap();

        let saved = assembler
            .compose_presentation(&ExpressionSelector::new("1-2"))
            .unwrap()
            .unwrap();
        assert_eq!(file_name(&saved.path), "Presentation1.pptx");
        assert_eq!(saved.slides, 2);
        assert!(saved.warnings.is_empty());

        assert_eq!(
            assembler.slide_titles(1).unwrap(),
            vec!["Annual Report", "Summary"]
        );
        assert_eq!(
            page_numbers(&assembler, &saved.path),
            vec![None, Some("2".to_string())]
        );
    }

    #[test]
    fn test_empty_compose_is_a_no_op() {
        let (_dir, assembler) = setup();
        assembler
            .build_template(LayoutKind::Cover, titled("Cover"), &none())
            .unwrap();
        assert!(assembler.compose_presentation(&none()).unwrap().is_none());
        assert!(assembler.list(Store::Presentations).unwrap().is_empty());
    }

    #[test]
    fn test_insert_into_presentation() {
        let (_dir, assembler) = setup();
        assembler
            .build_template(LayoutKind::Cover, titled("Cover"), &none())
            .unwrap();
        assembler
            .build_template(LayoutKind::ExecutiveSummary, titled("Summary"), &none())
            .unwrap();
        assembler
            .compose_presentation(&ExpressionSelector::new("1-2"))
            .unwrap();

        add_charts(&assembler, &["a.png", "b.png"]);
        assembler
            .build_template(
                LayoutKind::TwoChart,
                titled("Charts"),
                &ExpressionSelector::new("1-2"),
            )
            .unwrap();

        // Slides store: slide_layout_1_1, slide_layout_2_1, slide_layout_3_1.
        let saved = assembler
            .insert_into_presentation(1, &ExpressionSelector::new("3"), "1")
            .unwrap()
            .unwrap();
        assert_eq!(file_name(&saved.path), "Updated_Presentation1.pptx");
        assert_eq!(saved.slides, 3);

        let names = assembler.list(Store::Presentations).unwrap();
        let updated = names
            .iter()
            .position(|n| n == "Updated_Presentation1.pptx")
            .unwrap();
        assert_eq!(
            assembler.slide_titles(updated + 1).unwrap(),
            vec!["Cover", "Charts", "Summary"]
        );
        assert_eq!(
            page_numbers(&assembler, &saved.path),
            vec![None, Some("2".to_string()), Some("3".to_string())]
        );

        // The original is untouched.
        assert_eq!(assembler.slide_titles(1).unwrap(), vec!["Cover", "Summary"]);
    }

    #[test]
    fn test_insert_with_mismatched_anchors_writes_nothing() {
        let (_dir, assembler) = setup();
        assembler
            .build_template(LayoutKind::Cover, titled("Cover"), &none())
            .unwrap();
        assembler
            .build_template(LayoutKind::Cover, titled("Other"), &none())
            .unwrap();
        assembler
            .build_template(LayoutKind::ExecutiveSummary, titled("Summary"), &none())
            .unwrap();
        assembler
            .compose_presentation(&ExpressionSelector::new("1"))
            .unwrap();

        let err = assembler
            .insert_into_presentation(1, &ExpressionSelector::new("1-3"), "0-1")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<deck_core::Error>(),
            Some(deck_core::Error::PositionCountMismatch { .. })
        ));
        assert_eq!(
            assembler.list(Store::Presentations).unwrap(),
            vec!["Presentation1.pptx"]
        );
    }

    #[test]
    fn test_delete_slides_renumbers() {
        let (_dir, assembler) = setup();
        for title in ["One", "Two", "Three"] {
            assembler
                .build_template(LayoutKind::ExecutiveSummary, titled(title), &none())
                .unwrap();
        }
        let saved = assembler
            .compose_presentation(&ExpressionSelector::new("1-3"))
            .unwrap()
            .unwrap();

        assert!(assembler.delete_slides(1, "").unwrap().is_none());
        let after = assembler.delete_slides(1, "2").unwrap().unwrap();
        assert_eq!(after.path, saved.path);
        assert_eq!(after.slides, 2);
        assert_eq!(assembler.slide_titles(1).unwrap(), vec!["One", "Three"]);
        assert_eq!(
            page_numbers(&assembler, &saved.path),
            vec![Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[test]
    fn test_delete_files_and_presentation() {
        let (_dir, assembler) = setup();
        add_charts(&assembler, &["a.png", "b.png", "c.png"]);
        let deleted = assembler
            .delete_files(Store::Charts, &ExpressionSelector::new("1,3"))
            .unwrap();
        assert_eq!(deleted.len(), 2);
        assert_eq!(assembler.list(Store::Charts).unwrap(), vec!["b.png"]);

        assert!(assembler
            .delete_files(Store::Presentations, &ExpressionSelector::new("1"))
            .is_err());

        assembler
            .build_template(LayoutKind::Cover, titled("Cover"), &none())
            .unwrap();
        assembler
            .compose_presentation(&ExpressionSelector::new("1"))
            .unwrap();
        let removed = assembler.delete_presentation(1).unwrap();
        assert!(!removed.exists());
        assert!(assembler.delete_presentation(1).is_err());
    }

    #[test]
    fn test_renumber_in_place() {
        let (_dir, assembler) = setup();
        assembler
            .build_template(LayoutKind::ExecutiveSummary, titled("Only"), &none())
            .unwrap();
        let saved = assembler
            .compose_presentation(&ExpressionSelector::new("1"))
            .unwrap()
            .unwrap();

        let again = assembler.renumber_presentation(1).unwrap();
        assert_eq!(again.renumber.removed, 1);
        assert_eq!(again.renumber.numbered.len(), 1);
        assert_eq!(page_numbers(&assembler, &saved.path), vec![Some("1".to_string())]);
    }

    #[test]
    fn test_titles_fall_back() {
        let (_dir, assembler) = setup();
        let mut deck = Deck::default();
        deck.add_slide();
        let path = assembler
            .workspace()
            .path(Store::Presentations, "Presentation1.pptx");
        assembler.save(&path, &deck).unwrap();
        assert_eq!(assembler.slide_titles(1).unwrap(), vec![NO_TITLE]);
    }
}
