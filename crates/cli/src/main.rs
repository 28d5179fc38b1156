//! CLI tool for assembling report decks from chart images and templates.

mod commands;
mod workspace;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commands::{Assembler, SavedDeck};
use deck_core::{LayoutKind, StyleConfig, TemplateFields};
use serde::Serialize;
use std::path::PathBuf;
use workspace::{ExplicitSelector, ExpressionSelector, FileSelector, Store, Workspace};

/// Build report slides from chart images and assemble them into decks.
#[derive(Parser, Debug)]
#[command(name = "deck-assemble")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace holding the Charts, Slides and Presentations stores
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// JSON file with font, colour and size settings
    #[arg(long, global = true)]
    style: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a single-slide template into the Slides store
    Template(TemplateArgs),

    /// Compose selected templates into a new presentation
    Compose {
        /// Templates to compose, e.g. `1,3-4`
        #[arg(long)]
        slides: String,
    },

    /// Insert the first slide of selected templates into a presentation
    Insert {
        /// Presentation number, as listed
        #[arg(long)]
        presentation: usize,

        /// Templates to insert
        #[arg(long)]
        slides: String,

        /// Slide positions to insert after (0 is the front)
        #[arg(long)]
        after: String,
    },

    /// Refresh the page numbers of a presentation
    Renumber {
        #[arg(long)]
        presentation: usize,
    },

    /// List the files of a store
    List {
        store: Store,

        #[arg(long)]
        json: bool,
    },

    /// List the slide titles of a presentation
    Slides {
        #[arg(long)]
        presentation: usize,

        #[arg(long)]
        json: bool,
    },

    /// Delete files, slides or presentations
    #[command(subcommand)]
    Delete(DeleteCommand),
}

#[derive(Args, Debug)]
struct TemplateArgs {
    /// Layout: 1 cover, 2 executive summary, 3 two charts, 4 three charts
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    layout: u8,

    #[arg(long)]
    title: Option<String>,

    /// Cover footer
    #[arg(long)]
    footer: Option<String>,

    #[arg(long)]
    key_message: Option<String>,

    /// Executive summary bullet (repeatable)
    #[arg(long)]
    body: Vec<String>,

    /// Chart section header (repeatable)
    #[arg(long)]
    header: Vec<String>,

    #[arg(long)]
    quadrant_text: Option<String>,

    #[arg(long)]
    source: Option<String>,

    /// Charts from the Charts store, e.g. `1-2`
    #[arg(long, conflicts_with = "image")]
    charts: Option<String>,

    /// Chart image paths, in placement order
    #[arg(long)]
    image: Vec<PathBuf>,
}

impl TemplateArgs {
    fn fields(&self) -> TemplateFields {
        let mut fields = TemplateFields::default();
        if let Some(title) = &self.title {
            fields.title = title.clone();
        }
        if let Some(footer) = &self.footer {
            fields.footer = footer.clone();
        }
        if let Some(key_message) = &self.key_message {
            fields.key_message = key_message.clone();
        }
        if !self.body.is_empty() {
            fields.body = self.body.clone();
        }
        if let Some(quadrant_text) = &self.quadrant_text {
            fields.quadrant_text = quadrant_text.clone();
        }
        if let Some(source) = &self.source {
            fields.source = source.clone();
        }
        fields.headers = self.header.clone();
        fields
    }

    fn charts(&self) -> Box<dyn FileSelector> {
        match &self.charts {
            Some(expr) => Box::new(ExpressionSelector::new(expr.as_str())),
            None => Box::new(ExplicitSelector::new(self.image.clone())),
        }
    }
}

#[derive(Subcommand, Debug)]
enum DeleteCommand {
    /// Delete chart images or templates
    Files {
        #[arg(long)]
        store: Store,

        #[arg(long)]
        select: String,
    },

    /// Delete slides from a presentation, saving it in place
    Slides {
        #[arg(long)]
        presentation: usize,

        #[arg(long)]
        select: String,
    },

    /// Delete a whole presentation
    Presentation {
        #[arg(long)]
        presentation: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let style = match &cli.style {
        Some(path) => StyleConfig::load(path)
            .with_context(|| format!("Failed to load style {}", path.display()))?,
        None => StyleConfig::default(),
    };
    let assembler = Assembler::new(Workspace::open(&cli.root)?).with_style(style);
    log::debug!("Using workspace {}", assembler.workspace().root().display());

    run(&assembler, cli.command)
}

fn run(assembler: &Assembler, command: Command) -> Result<()> {
    match command {
        Command::Template(args) => {
            let kind = LayoutKind::from_number(args.layout)
                .with_context(|| format!("Unknown layout {}", args.layout))?;
            let charts = args.charts();
            let path = assembler.build_template(kind, args.fields(), &*charts)?;
            println!("Created {}", path.display());
        }
        Command::Compose { slides } => {
            let saved = assembler.compose_presentation(&ExpressionSelector::new(slides))?;
            report_saved(saved.as_ref(), "No templates selected");
        }
        Command::Insert {
            presentation,
            slides,
            after,
        } => {
            let saved = assembler.insert_into_presentation(
                presentation,
                &ExpressionSelector::new(slides),
                &after,
            )?;
            report_saved(saved.as_ref(), "Nothing selected");
        }
        Command::Renumber { presentation } => {
            let saved = assembler.renumber_presentation(presentation)?;
            report_saved(Some(&saved), "");
        }
        Command::List { store, json } => {
            let names = assembler.list(store)?;
            if json {
                print_json(&names)?;
            } else {
                for (index, name) in names.iter().enumerate() {
                    println!("{:>3}. {}", index + 1, name);
                }
            }
        }
        Command::Slides { presentation, json } => {
            let titles = assembler.slide_titles(presentation)?;
            if json {
                print_json(&titles)?;
            } else {
                for (index, title) in titles.iter().enumerate() {
                    println!("Slide {}: {}", index + 1, title);
                }
            }
        }
        Command::Delete(DeleteCommand::Files { store, select }) => {
            for path in assembler.delete_files(store, &ExpressionSelector::new(select))? {
                println!("Deleted {}", path.display());
            }
        }
        Command::Delete(DeleteCommand::Slides {
            presentation,
            select,
        }) => {
            let saved = assembler.delete_slides(presentation, &select)?;
            report_saved(saved.as_ref(), "No slides selected");
        }
        Command::Delete(DeleteCommand::Presentation { presentation }) => {
            let path = assembler.delete_presentation(presentation)?;
            println!("Deleted {}", path.display());
        }
    }
    Ok(())
}

fn report_saved(saved: Option<&SavedDeck>, nothing: &str) {
    let Some(saved) = saved else {
        println!("{}", nothing);
        return;
    };
    for warning in &saved.warnings {
        eprintln!("Warning: {}", warning);
    }
    println!("Saved {} ({} slides)", saved.path.display(), saved.slides);
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_template_with_charts() {
        let cli = Cli::try_parse_from([
            "deck-assemble",
            "--root",
            "/tmp/reports",
            "template",
            "--layout",
            "3",
            "--title",
            "Mobile",
            "--header",
            "Left",
            "--header",
            "Right",
            "--charts",
            "1-2",
        ])
        .unwrap();
        assert_eq!(cli.root, PathBuf::from("/tmp/reports"));
        let Command::Template(args) = cli.command else {
            panic!("expected template command");
        };
        let fields = args.fields();
        assert_eq!(fields.title, "Mobile");
        assert_eq!(fields.headers, vec!["Left", "Right"]);
        assert_eq!(fields.source, TemplateFields::default().source);
    }

    #[test]
    fn test_parse_rejects_bad_layout_and_mixed_charts() {
        assert!(Cli::try_parse_from(["deck-assemble", "template", "--layout", "5"]).is_err());
        assert!(Cli::try_parse_from([
            "deck-assemble",
            "template",
            "--layout",
            "3",
            "--charts",
            "1",
            "--image",
            "a.png",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_delete_subcommands() {
        let cli = Cli::try_parse_from([
            "deck-assemble",
            "delete",
            "files",
            "--store",
            "charts",
            "--select",
            "1,3",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Delete(DeleteCommand::Files {
                store: Store::Charts,
                ..
            })
        ));

        let cli = Cli::try_parse_from([
            "deck-assemble",
            "-v",
            "delete",
            "slides",
            "--presentation",
            "2",
            "--select",
            "4",
        ])
        .unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_run_compose_flow() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(Workspace::open(dir.path()).unwrap());

        let template = Cli::try_parse_from(["deck-assemble", "template", "--layout", "2"]).unwrap();
        run(&assembler, template.command).unwrap();
        let compose =
            Cli::try_parse_from(["deck-assemble", "compose", "--slides", "1"]).unwrap();
        run(&assembler, compose.command).unwrap();

        assert_eq!(
            assembler.list(Store::Presentations).unwrap(),
            vec!["Presentation1.pptx"]
        );
    }
}
