use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pcbzip_catalog::{
    CatalogError, CatalogStore, CommandKind, QueryCommand, QuerySession, SessionOutput, paths,
};

use crate::prompt;

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Catalog database (defaults to parts.db in the data directory)
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CatalogCommand {
    /// Rebuild the catalog from the supplier parts dump
    Refresh {
        /// Ingest a local dump instead of downloading one
        #[arg(long, value_hint = clap::ValueHint::FilePath, conflicts_with = "url")]
        from: Option<PathBuf>,

        /// URL of the dump (defaults to $PCBZIP_PARTS_URL)
        #[arg(long)]
        url: Option<String>,
    },

    /// Show whether a catalog is available and how fresh it is
    Status,

    /// Search the catalog interactively
    #[command(alias = "s")]
    Search,
}

pub fn execute(args: CatalogArgs) -> Result<()> {
    let db_path = match args.db {
        Some(path) => path,
        None => paths::default_db_path().context(
            "Failed to determine the data directory, set PCBZIP_HOME or pass --db",
        )?,
    };

    match args.command {
        CatalogCommand::Refresh { from, url } => refresh(db_path, from, url),
        CatalogCommand::Status => status(db_path),
        CatalogCommand::Search => search(db_path),
    }
}

fn refresh(db_path: PathBuf, from: Option<PathBuf>, url: Option<String>) -> Result<()> {
    let dump_path = match from {
        Some(path) => path,
        None => {
            let url = url.or_else(paths::parts_url_from_env).with_context(|| {
                format!(
                    "No parts dump URL, pass --url or set {}",
                    paths::PARTS_URL_ENV
                )
            })?;
            let dest = db_path.with_file_name("parts.csv");
            download(&url, dest)?
        }
    };

    let spinner = prompt::create_spinner(&format!("Ingesting {}", dump_path.display()));
    let result = pcbzip_catalog::ingest_file(&dump_path, &db_path, |rows| {
        spinner.set_message(format!("Ingesting {} ({rows} rows read)", dump_path.display()));
    });
    spinner.finish_and_clear();
    let report = result?;

    println!(
        "{} Stored {} parts in {} ({} rows skipped, {:.1?})",
        "✓".green(),
        report.stored,
        report.db_path.display(),
        report.skipped,
        report.elapsed
    );
    Ok(())
}

fn download(url: &str, dest: PathBuf) -> Result<PathBuf> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{msg} {bytes}/{total_bytes} [{bar:30}] {bytes_per_sec}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message("Downloading parts dump");

    let result = pcbzip_catalog::download_dump(url, &dest, |downloaded, total| {
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_position(downloaded);
    });
    bar.finish_and_clear();
    Ok(result?)
}

fn status(db_path: PathBuf) -> Result<()> {
    let store = CatalogStore::open(&db_path)?;
    let status = store.status()?;

    if !status.published {
        println!(
            "{} No catalog at {}, run `pcbzip catalog refresh` to build one",
            "!".yellow(),
            status.path.display()
        );
        return Ok(());
    }

    println!("Catalog:   {}", status.path.display());
    println!("Parts:     {}", status.rows);
    match status.published_at {
        Some(at) => println!("Refreshed: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Refreshed: unknown"),
    }
    Ok(())
}

fn search(db_path: PathBuf) -> Result<()> {
    let store = CatalogStore::open(&db_path)?;
    if !store.is_published() {
        println!(
            "{} No catalog at {}, searches will return nothing until `pcbzip catalog refresh` is run",
            "!".yellow(),
            db_path.display()
        );
    }

    let mut session = QuerySession::new();
    println!("Enter a command, ? for help, Q to quit");
    loop {
        let Some(line) = prompt::text(">")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match read_command(&line, &store) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{} {e}", "Error:".red());
                continue;
            }
        };

        match session.apply(command, &store) {
            Ok(SessionOutput::Updated) => {}
            Ok(SessionOutput::Table { text, rows }) => {
                println!("{text}");
                println!("{rows} parts");
            }
            Ok(SessionOutput::Export { csv, rows }) => {
                print!("{csv}");
                eprintln!("{rows} basic parts");
            }
            Ok(SessionOutput::Help(text)) => println!("{text}"),
            Ok(SessionOutput::Quit) => break,
            // Rejected edits leave the criteria as they were
            Err(e) => eprintln!("{} {e}", "Error:".red()),
        }
    }
    Ok(())
}

/// Resolve an input line to a session command, prompting for a missing value.
/// `None` means the prompt was cancelled.
fn read_command(line: &str, store: &CatalogStore) -> Result<Option<QueryCommand>, CatalogError> {
    let (spec, value) = pcbzip_catalog::parse_line(line)?;
    if !spec.takes_value {
        return Ok(Some(spec.kind.with_value("")));
    }

    let value = match value {
        Some(value) => value,
        None if spec.kind == CommandKind::Category => match choose_category(store) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::debug!("Category prompt failed: {e}");
                return Ok(None);
            }
        },
        None => match prompt::text(&format!("{}:", spec.help)) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(e) => {
                log::debug!("Prompt failed: {e}");
                return Ok(None);
            }
        },
    };
    Ok(Some(spec.kind.with_value(&value)))
}

const ANY_CATEGORY: &str = "(any category)";

fn choose_category(store: &CatalogStore) -> Result<Option<String>> {
    let mut options = vec![ANY_CATEGORY.to_string()];
    options.extend(store.categories()?);
    Ok(prompt::select("Category:", options)?.map(|choice| {
        if choice == ANY_CATEGORY {
            String::new()
        } else {
            choice
        }
    }))
}
