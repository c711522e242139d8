//! jotter CLI - local notes and tasks organizer with a passcode vault.

mod store;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jotter_core::{
    purge_store, Access, Confirmation, JotterService, Note, NoteDraft, Resumed,
    Verification, ViewMode, BACKUP_FILE_NAME,
};
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use store::{get_jotter_dir, is_initialized, AnyStore, Backend, JOTTER_DIR};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PREVIEW_CHARS: usize = 60;
const GRID_COLUMNS: usize = 3;
const STDIN_ARG: &str = "-";

#[derive(Parser)]
#[command(name = "jotter", about = "Local notes and tasks organizer", version)]
struct Cli {
    /// Data directory (defaults to the nearest .jotter directory)
    #[arg(long, env = "JOTTER_DIR", global = true)]
    dir: Option<PathBuf>,
    /// Storage backend
    #[arg(long, env = "JOTTER_BACKEND", value_enum, global = true)]
    backend: Option<Backend>,
    /// Passcode for vault prompts (read from stdin if not provided)
    #[arg(long, env = "JOTTER_PIN", global = true, hide_env_values = true)]
    pin: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new jotter directory here
    Init {
        /// Delete existing data and reinitialize
        #[arg(long)]
        reinitialize: bool,
    },
    #[command(flatten)]
    Data(DataCommands),
    /// Erase all stored data
    Reset {
        /// Don't ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

/// Commands that work on loaded notes, tasks and settings.
#[derive(Subcommand)]
enum DataCommands {
    /// List categories with note counts
    Folders,
    /// Create a custom category
    FolderAdd {
        /// Category name
        name: String,
    },
    /// List notes
    Ls {
        /// Category id (all, uncategorized, locked, deleted, or a custom id)
        #[arg(long, default_value = "all")]
        folder: String,
        /// Case-insensitive text to match in title or content
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a note
    Show {
        /// Note ID
        id: String,
    },
    /// Add a new note
    Add {
        /// Note title
        #[arg(long)]
        title: String,
        /// Note content, or - to read it from stdin
        #[arg(long)]
        content: Option<String>,
        /// Category name
        #[arg(long)]
        folder: Option<String>,
        /// Put the note in the vault
        #[arg(long)]
        lock: bool,
    },
    /// Edit a note
    Edit {
        /// Note ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New content, or - to read it from stdin (after any passcode line).
        /// Empty input leaves the content unchanged.
        #[arg(long)]
        content: Option<String>,
        /// New category name
        #[arg(long)]
        folder: Option<String>,
        /// Move the note into the vault
        #[arg(long, conflicts_with = "unlock")]
        lock: bool,
        /// Take the note out of the vault
        #[arg(long)]
        unlock: bool,
    },
    /// Move a note to Recently Deleted
    Rm {
        /// Note ID
        id: String,
    },
    /// Restore a note from Recently Deleted
    Restore {
        /// Note ID
        id: String,
    },
    /// Permanently delete a note from Recently Deleted
    Destroy {
        /// Note ID
        id: String,
        /// Don't ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage the vault passcode
    Pin {
        #[command(subcommand)]
        command: PinCommands,
    },
    /// Show or change settings
    Settings {
        /// Note list presentation
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
        /// Hide the vault from general views
        #[arg(long)]
        hide_locked: Option<bool>,
    },
    /// Most recent note and the next open tasks
    Glance,
    /// Export notes, tasks and categories as JSON
    Backup {
        /// Output file, or - for stdout
        #[arg(long, default_value = BACKUP_FILE_NAME)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task
    Add {
        /// Task text
        text: String,
        /// Free-form reminder, e.g. "tomorrow 9am"
        #[arg(long)]
        reminder: Option<String>,
    },
    /// List tasks, open first
    Ls {
        #[arg(long)]
        search: Option<String>,
    },
    /// Toggle a task's completion
    Done {
        /// Task ID
        id: String,
    },
    /// Delete a task
    Rm {
        /// Task ID
        id: String,
    },
}

#[derive(Subcommand)]
enum PinCommands {
    /// Set or replace the passcode (4 digits)
    Set { pin: String },
    /// Remove the passcode
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Grid,
    List,
}

impl From<ViewArg> for ViewMode {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Grid => ViewMode::Grid,
            ViewArg::List => ViewMode::List,
        }
    }
}

type Service = JotterService<AnyStore>;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("JOTTER_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}

/// Content given on the command line. `-` reads it with `read`, and input
/// that is blank counts as no content at all.
fn resolve_content(
    arg: Option<String>,
    read: impl FnOnce() -> Result<String>,
) -> Result<Option<String>> {
    match arg.as_deref() {
        Some(STDIN_ARG) => {
            let text = read()?;
            Ok(if text.trim().is_empty() { None } else { Some(text) })
        }
        _ => Ok(arg),
    }
}

fn lock_change(lock: bool, unlock: bool) -> Option<bool> {
    match (lock, unlock) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Names of the fields an edit draft would change.
fn updated_fields(draft: &NoteDraft) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if draft.title.is_some() {
        fields.push("title");
    }
    if draft.content.is_some() {
        fields.push("content");
    }
    if draft.category.is_some() {
        fields.push("category");
    }
    if draft.is_locked.is_some() {
        fields.push("lock");
    }
    fields
}

fn is_stdin_tty() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// Ask a yes/no question on the terminal. Without a terminal the answer is no.
fn confirm(question: &str, yes: bool) -> Result<Confirmation> {
    if yes {
        return Ok(Confirmation::Confirmed);
    }
    if !is_stdin_tty() {
        eprintln!("{} Pass --yes to confirm.", question);
        return Ok(Confirmation::Declined);
    }

    eprint!("{} [y/N] ", question);
    io::stderr().flush().context("Failed to flush stderr")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;

    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Ok(Confirmation::Confirmed),
        _ => Ok(Confirmation::Declined),
    }
}

/// Answer the vault prompt. A `--pin` gets one try; stdin entries are
/// retried until one matches or input runs out.
fn unlock(service: &mut Service, pin: Option<&str>) -> Result<Option<Resumed>> {
    if let Some(pin) = pin {
        return match service.verify_passcode(pin) {
            Verification::Unlocked(resumed) => Ok(resumed),
            Verification::Rejected => {
                service.cancel_prompt();
                bail!("Incorrect passcode")
            }
        };
    }

    let interactive = is_stdin_tty();
    let stdin = io::stdin();
    loop {
        if interactive {
            eprint!("Passcode: ");
            io::stderr().flush().context("Failed to flush stderr")?;
        }
        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read passcode")?;
        if read == 0 {
            service.cancel_prompt();
            bail!("The vault is locked. Enter the passcode or pass --pin.");
        }
        match service.verify_passcode(line.trim()) {
            Verification::Unlocked(resumed) => return Ok(resumed),
            Verification::Rejected => eprintln!("Incorrect passcode, try again."),
        }
    }
}

/// Open a note, going through the vault prompt if it is locked.
fn open_note(service: &mut Service, id: &str, pin: Option<&str>) -> Result<Note> {
    match service.open_note(id)? {
        Access::Granted(note) => Ok(note),
        Access::PasscodeRequired => {
            bail!("Note {} is locked but no passcode is set. Run 'jotter pin set'.", id)
        }
        Access::NeedsUnlock => match unlock(service, pin)? {
            Some(Resumed::Note(note)) => Ok(note),
            _ => bail!("Note {} not found", id),
        },
    }
}

fn print_note(note: &Note) {
    println!("# {}\n", note.title);
    println!("{}", note.content);
    println!("\n---\n");
    println!("Last modified: {}", note.date);
    println!("Category: {}", note.category);
    if note.is_locked {
        println!("Locked: yes");
    }
    if note.is_deleted {
        println!("In Recently Deleted");
    }
}

fn print_notes(notes: &[Note], view: ViewMode) {
    match view {
        ViewMode::List => {
            for note in notes {
                let summary = note.to_summary(PREVIEW_CHARS);
                let lock = if summary.is_locked { " [locked]" } else { "" };
                println!(
                    "{}: {}{} ({}, {}) -- {}",
                    summary.id, summary.title, lock, summary.category, summary.date, summary.preview
                );
            }
        }
        ViewMode::Grid => {
            for row in notes.chunks(GRID_COLUMNS) {
                let cells: Vec<String> = row
                    .iter()
                    .map(|n| format!("{:<30}", format!("{} [{}]", n.title, short_id(&n.id))))
                    .collect();
                println!("{}", cells.join("  ").trim_end());
            }
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn init(cli_dir: Option<PathBuf>, backend: Option<Backend>, reinitialize: bool) -> Result<()> {
    let dir = cli_dir.unwrap_or_else(|| PathBuf::from(JOTTER_DIR));

    if dir.exists() {
        if reinitialize {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
        } else if is_initialized(&dir) {
            bail!("jotter is already initialized in this directory. Use --reinitialize to delete and recreate.");
        }
    }
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let backend = backend.unwrap_or_default();
    backend.record(&dir)?;
    let _store = AnyStore::open(&dir, backend)?;

    let verb = if reinitialize { "Reinitialized" } else { "Initialized" };
    println!("{} jotter in {} ({} backend)", verb, dir.display(), backend.as_str());
    Ok(())
}

fn open_store(cli_dir: Option<PathBuf>, backend: Option<Backend>) -> Result<AnyStore> {
    let dir = get_jotter_dir(cli_dir.as_deref())?;
    let backend = Backend::resolve(backend, &dir)?;
    debug!(dir = %dir.display(), backend = backend.as_str(), "opening store");
    AnyStore::open(&dir, backend)
}

/// Reset skips loading, so it works even when the stored data no longer parses.
async fn reset(store: AnyStore, yes: bool) -> Result<()> {
    let answer = confirm("Erase all notes, tasks, categories and settings?", yes)?;
    if answer == Confirmation::Confirmed {
        purge_store(store).await.context("Failed to erase data")?;
        println!("All data erased");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { reinitialize } => init(cli.dir, cli.backend, reinitialize),
        Commands::Reset { yes } => reset(open_store(cli.dir, cli.backend)?, yes).await,
        Commands::Data(command) => {
            let store = open_store(cli.dir, cli.backend)?;
            let mut service = JotterService::load(store)
                .await
                .context("Failed to load data")?;
            run(&mut service, command, cli.pin.as_deref()).await
        }
    }
}

async fn run(service: &mut Service, command: DataCommands, pin: Option<&str>) -> Result<()> {
    match command {
        DataCommands::Folders => {
            for category in service.list_categories() {
                let noun = if category.count == 1 { "note" } else { "notes" };
                println!("{}: {} ({} {})", category.id, category.name, category.count, noun);
            }
        }

        DataCommands::FolderAdd { name } => {
            let category = service.add_category(&name).await?;
            println!("Added category {} ({})", category.name, category.id);
        }

        DataCommands::Ls { folder, search } => {
            match service.select_category(&folder) {
                Access::Granted(_) => {}
                Access::PasscodeRequired => {
                    bail!("No passcode is set. Run 'jotter pin set' to use the vault.")
                }
                Access::NeedsUnlock => {
                    unlock(service, pin)?;
                }
            }
            let notes = service.visible_notes(search.as_deref().unwrap_or(""));
            print_notes(&notes, service.view_mode());
        }

        DataCommands::Show { id } => {
            let note = open_note(service, &id, pin)?;
            print_note(&note);
        }

        DataCommands::Add {
            title,
            content,
            folder,
            lock,
        } => {
            let content = resolve_content(content, read_stdin)?.unwrap_or_default();
            let saved = service
                .save_note(NoteDraft {
                    id: None,
                    title: Some(title),
                    content: Some(content),
                    category: folder,
                    is_locked: Some(lock),
                })
                .await?;
            for notice in &saved.notices {
                eprintln!("Note: {}", notice);
            }
            println!("Added note {}", saved.note.id);
        }

        DataCommands::Edit {
            id,
            title,
            content,
            folder,
            lock,
            unlock: unlock_note,
        } => {
            let note = open_note(service, &id, pin)?;
            let draft = NoteDraft {
                id: Some(note.id),
                title,
                content: resolve_content(content, read_stdin)?,
                category: folder,
                is_locked: lock_change(lock, unlock_note),
            };

            let fields = updated_fields(&draft);
            if fields.is_empty() {
                eprintln!("Nothing to update");
                std::process::exit(1);
            }

            let saved = service.save_note(draft).await?;
            for notice in &saved.notices {
                eprintln!("Note: {}", notice);
            }
            println!("Edited note {}: Updated {}", id, fields.join(", "));
        }

        DataCommands::Rm { id } => {
            let note = open_note(service, &id, pin)?;
            service.soft_delete_note(&note.id).await?;
            println!("Moved note {} to Recently Deleted", id);
        }

        DataCommands::Restore { id } => {
            service.restore_note(&id).await?;
            println!("Restored note {}", id);
        }

        DataCommands::Destroy { id, yes } => {
            let title = service
                .note(&id)
                .map(|n| n.title.clone())
                .with_context(|| format!("Note {} not found", id))?;
            let answer = confirm(&format!("Permanently delete {:?}?", title), yes)?;
            if service.permanently_delete_note(&id, answer).await? {
                println!("Deleted note {}", id);
            }
        }

        DataCommands::Task { command } => match command {
            TaskCommands::Add { text, reminder } => {
                let task = service.save_task(&text, reminder.as_deref()).await?;
                println!("Added task {}", task.id);
            }
            TaskCommands::Ls { search } => {
                let board = service.task_board(search.as_deref().unwrap_or(""));
                for task in board.active.iter().chain(&board.completed) {
                    let mark = if task.completed { "x" } else { " " };
                    match &task.reminder {
                        Some(reminder) => {
                            println!("[{}] {}: {} (reminder: {})", mark, task.id, task.text, reminder)
                        }
                        None => println!("[{}] {}: {}", mark, task.id, task.text),
                    }
                }
            }
            TaskCommands::Done { id } => {
                let task = service.toggle_task(&id).await?;
                let state = if task.completed { "done" } else { "open" };
                println!("Marked task {} {}", id, state);
            }
            TaskCommands::Rm { id } => {
                service.delete_task(&id).await?;
                println!("Deleted task {}", id);
            }
        },

        DataCommands::Pin { command } => match command {
            PinCommands::Set { pin: new_pin } => {
                service.begin_set_passcode();
                service.set_passcode(&new_pin).await?;
                println!("Passcode set");
            }
            PinCommands::Clear => {
                if !service.has_passcode() {
                    println!("No passcode is set");
                    return Ok(());
                }
                if !service.vault().is_unlocked() {
                    unlock(service, pin)?;
                }
                service.clear_passcode().await?;
                println!("Passcode cleared");
            }
        },

        DataCommands::Settings { view, hide_locked } => {
            if let Some(view) = view {
                service.set_view_mode(view.into()).await?;
            }
            if let Some(hide_locked) = hide_locked {
                service.set_hide_locked(hide_locked).await?;
            }
            println!("view: {}", service.view_mode().as_str());
            println!("hide-locked: {}", service.is_locked_hidden());
            println!("passcode: {}", if service.has_passcode() { "set" } else { "not set" });
        }

        DataCommands::Glance => {
            let glance = service.glance();
            match glance.recent_note {
                Some(note) => {
                    let summary = note.to_summary(PREVIEW_CHARS);
                    println!("Recent: {} ({}) -- {}", summary.title, summary.date, summary.preview);
                }
                None => println!("Recent: no notes yet"),
            }
            if glance.upcoming_tasks.is_empty() {
                println!("Tasks: all caught up");
            } else {
                println!("Tasks:");
                for task in &glance.upcoming_tasks {
                    println!("  [ ] {}", task.text);
                }
            }
        }

        DataCommands::Backup { output } => {
            let json = service.export_backup().to_json()?;
            if output.as_os_str() == "-" {
                println!("{}", json);
            } else {
                std::fs::write(&output, json)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("Wrote backup to {}", output.display());
            }
        }
    }

    Ok(())
}
