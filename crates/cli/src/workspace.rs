//! The Charts, Slides and Presentations stores under a workspace root, and
//! the ways files are picked from them.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use deck_core::{naming, selection, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};

/// One of the workspace's file stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Store {
    /// Chart images produced by the chart provider.
    Charts,
    /// Single-slide templates.
    Slides,
    /// Assembled decks.
    Presentations,
}

impl Store {
    pub const ALL: [Store; 3] = [Store::Charts, Store::Slides, Store::Presentations];

    /// Directory name under the workspace root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Charts => "Charts",
            Self::Slides => "Slides",
            Self::Presentations => "Presentations",
        }
    }

    /// Whether a file name belongs in this store.
    pub fn accepts(self, file_name: &str) -> bool {
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match self {
            Self::Charts => ImageFormat::from_extension(extension).is_some(),
            Self::Slides | Self::Presentations => {
                extension.eq_ignore_ascii_case(naming::DECK_EXTENSION)
            }
        }
    }
}

/// A root directory holding the three stores.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open a workspace, creating any missing store directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for store in Store::ALL {
            let dir = root.join(store.dir_name());
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create store {}", dir.display()))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, store: Store) -> PathBuf {
        self.root.join(store.dir_name())
    }

    /// Path of a file inside a store.
    pub fn path(&self, store: Store, file_name: &str) -> PathBuf {
        self.dir(store).join(file_name)
    }

    /// Files of a store, sorted by name.
    pub fn list(&self, store: Store) -> Result<Vec<PathBuf>> {
        let dir = self.dir(store);
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
            let path = entry.path();
            if path.is_file() && store.accepts(&file_name(&path)) {
                files.push(path);
            }
        }
        files.sort_by_key(|path| file_name(path));
        Ok(files)
    }

    /// File names of a store, sorted.
    pub fn file_names(&self, store: Store) -> Result<Vec<String>> {
        Ok(self.list(store)?.iter().map(|p| file_name(p)).collect())
    }

    /// A presentation by its 1-based number in the sorted listing.
    pub fn presentation(&self, number: usize) -> Result<PathBuf> {
        let presentations = self.list(Store::Presentations)?;
        match number.checked_sub(1).and_then(|i| presentations.get(i)) {
            Some(path) => Ok(path.clone()),
            None => bail!(
                "Presentation {} does not exist ({} available)",
                number,
                presentations.len()
            ),
        }
    }
}

/// File name of a path as an owned string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Picks zero or more files out of a store listing.
pub trait FileSelector {
    fn select(&self, candidates: &[PathBuf]) -> Result<Vec<PathBuf>>;
}

/// Selects candidates with a selection expression such as `1,3-4`.
#[derive(Debug, Clone)]
pub struct ExpressionSelector {
    expr: String,
}

impl ExpressionSelector {
    pub fn new(expr: impl Into<String>) -> Self {
        Self { expr: expr.into() }
    }
}

impl FileSelector for ExpressionSelector {
    fn select(&self, candidates: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let picked = selection::select(candidates, &self.expr)
            .with_context(|| format!("Invalid selection '{}'", self.expr))?;
        Ok(picked.into_iter().cloned().collect())
    }
}

/// Selects files given directly by path, in the order given.
#[derive(Debug, Clone)]
pub struct ExplicitSelector {
    paths: Vec<PathBuf>,
}

impl ExplicitSelector {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl FileSelector for ExplicitSelector {
    fn select(&self, _candidates: &[PathBuf]) -> Result<Vec<PathBuf>> {
        for path in &self.paths {
            if !path.is_file() {
                bail!("File not found: {}", path.display());
            }
        }
        Ok(self.paths.clone())
    }
}
