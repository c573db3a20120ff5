//! Secretariat CLI
//!
//! A terminal front end for the Secretariat work journal. Every command opens
//! the journal image from the data directory (running initialization and any
//! pending migrations), performs one operation and prints plain text.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use color_eyre::Section;

use secretariat_core::records::GEMINI_API_KEY;
use secretariat_core::{
    time, Author, BlockContent, Entry, Error, FileBackend, GeminiClient, GeminiConfig, Journal,
    ParentRef,
};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "secretariat", version, about = "Secretariat work journal")]
struct Args {
    /// Directory holding the journal image.
    /// Defaults to the platform data directory.
    #[arg(long, env = "SECRETARIAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter (e.g. "secretariat_core=debug")
    #[arg(long, env = "SECRETARIAT_LOG")]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a day's note with its entries
    Today {
        /// Day to show (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Add an entry with one text block
    Add {
        /// Entry text
        text: String,
        /// Category name (case-insensitive)
        #[arg(long)]
        category: Option<String>,
        /// Entry title
        #[arg(long)]
        title: Option<String>,
        /// Day to file under (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List categories
    Categories,

    /// Create a category
    CategoryAdd {
        /// Category name
        name: String,
        /// Display colour, e.g. "#22c55e"
        color: String,
    },

    /// Delete a user category
    CategoryRm {
        /// Category id
        id: i64,
    },

    /// Delete an entry and its blocks
    Rm {
        /// Entry id
        id: i64,
    },

    /// Store a setting
    Set { key: String, value: String },

    /// Print a setting
    Get { key: String },

    /// Remove a setting
    Unset { key: String },

    /// Summarize a day's entries with Gemini
    Summarize {
        /// Day to summarize (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List dates that have notes
    Dates {
        /// First day (inclusive)
        from: NaiveDate,
        /// Last day (inclusive)
        to: NaiveDate,
    },
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            args.log
                .as_deref()
                .and_then(|filter| tracing_subscriber::EnvFilter::try_new(filter).ok())
                .unwrap_or_else(|| "secretariat_core=info,secretariat_cli=info".into()),
        )
        .init();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .ok_or_else(|| eyre!("No platform data directory; pass --data-dir"))?
            .join("secretariat"),
    };
    tracing::debug!(data_dir = %data_dir.display(), "Opening journal");

    let journal = Journal::open(FileBackend::new(&data_dir))
        .await
        .wrap_err_with(|| format!("Failed to open journal in {}", data_dir.display()))?;

    run(&journal, args.command).await
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run(journal: &Journal<FileBackend>, command: Command) -> Result<()> {
    match command {
        Command::Today { date } => {
            let date = date.unwrap_or_else(time::today);
            match journal.get_daily_note(date)? {
                Some(note) => print_note(journal, date, note.id)?,
                None => println!("{}: no note", time::format_date(date)),
            }
        }

        Command::Add {
            text,
            category,
            title,
            date,
        } => {
            let category_id = match category {
                Some(name) => Some(find_category(journal, &name)?),
                None => None,
            };
            let note = journal
                .get_or_create_daily_note(date.unwrap_or_else(time::today))
                .await?;
            let entry = journal
                .create_entry(note.id, category_id, title.as_deref())
                .await?;
            journal
                .create_block(ParentRef::entry(entry), BlockContent::text(text), Author::User)
                .await?;
            println!("Added entry {}", entry);
        }

        Command::Categories => {
            for category in journal.categories()? {
                println!(
                    "{:>4}  {}  {}{}",
                    category.id,
                    category.color,
                    category.name,
                    if category.is_default { " (default)" } else { "" }
                );
            }
        }

        Command::CategoryAdd { name, color } => {
            let id = journal.create_category(&name, &color, None).await?;
            println!("Created category {}", id);
        }

        Command::CategoryRm { id } => {
            if journal.delete_category(id).await? {
                println!("Deleted category {}", id);
            } else {
                println!("Category {} is a default category or does not exist", id);
            }
        }

        Command::Rm { id } => {
            if journal.delete_entry(id).await? {
                println!("Deleted entry {}", id);
            } else {
                println!("No entry {}", id);
            }
        }

        Command::Set { key, value } => {
            journal.set_setting(&key, &value).await?;
        }

        Command::Get { key } => match journal.get_setting(&key)? {
            Some(value) => println!("{}", value),
            None => return Err(eyre!("Setting '{}' is not set", key)),
        },

        Command::Unset { key } => {
            journal.delete_setting(&key).await?;
        }

        Command::Summarize { date } => {
            let date = date.unwrap_or_else(time::today);
            let note = journal
                .get_daily_note(date)?
                .ok_or_else(|| eyre!("No note for {}", time::format_date(date)))?;

            let client = GeminiClient::new(GeminiConfig::from_env());
            tracing::info!(endpoint = client.endpoint(), "Using summarization endpoint");

            match journal.create_daily_summary(note.id, &client).await {
                Ok(_) => print_note(journal, date, note.id)?,
                Err(Error::NoApiKey) => {
                    return Err(eyre!("No Gemini API key configured"))
                        .suggestion(format!("run `secretariat set {} <key>`", GEMINI_API_KEY));
                }
                Err(e) if e.is_recoverable() => {
                    return Err(e).suggestion("try again in a moment");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Dates { from, to } => {
            for date in journal.dates_with_notes(from, to)? {
                println!("{}", time::format_date(date));
            }
        }
    }

    Ok(())
}

fn find_category(journal: &Journal<FileBackend>, name: &str) -> Result<i64> {
    journal
        .categories()?
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .map(|c| c.id)
        .ok_or_else(|| eyre!("Unknown category '{}'", name))
        .suggestion("list categories with `secretariat categories`")
}

fn print_note(journal: &Journal<FileBackend>, date: NaiveDate, note_id: i64) -> Result<()> {
    println!("{}", time::format_date(date));

    let entries = journal.entries_for_daily_note(note_id)?;
    if entries.is_empty() {
        println!("  (no entries)");
    }
    for entry in &entries {
        print_entry(journal, entry)?;
    }
    Ok(())
}

fn print_entry(journal: &Journal<FileBackend>, entry: &Entry) -> Result<()> {
    let mut header = format!("[{}]", entry.id);
    if let Some(category) = &entry.category_name {
        header.push_str(&format!(" {}", category));
    }
    if let Some(title) = &entry.title {
        header.push_str(&format!(" - {}", title));
    }
    if entry.is_ai_generated {
        header.push_str(" (ai)");
    }
    println!("{}", header);

    for block in journal.blocks_for_parent(&ParentRef::entry(entry.id))? {
        match &block.content {
            BlockContent::Text { text } => println!("    {}", text),
            BlockContent::CategoryHeading { name, .. } => println!("  {}", name),
            other => println!("    <{}>", other.kind()),
        }
    }
    Ok(())
}
