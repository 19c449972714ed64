use std::fmt;
use std::io::BufRead;

use services::StudySessionService;
use storage::repository::{CardSet, Storage};
use study_core::model::{Card, CardId, Phase};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

struct Args {
    db_url: String,
    set_id: String,
    user: String,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- study [--db <sqlite_url>] [--set <id>] [--user <name>]");
    eprintln!("  cargo run -p app -- seed  [--db <sqlite_url>] [--set <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:study.sqlite3");
    eprintln!("  --set demo");
    eprintln!("  --user local");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_SET_ID, STUDY_USER");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Study,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "study" => Some(Self::Study),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("STUDY_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://study.sqlite3".into(), normalize_sqlite_url);
        let mut set_id = std::env::var("STUDY_SET_ID").unwrap_or_else(|_| "demo".into());
        let mut user = std::env::var("STUDY_USER").unwrap_or_else(|_| "local".into());

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--set" => set_id = require_value(args, "--set")?,
                "--user" => user = require_value(args, "--user")?,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            set_id,
            user,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Demo content for first runs: ten numbered cards in canonical order.
fn demo_set(set_id: &str) -> CardSet {
    let cards = (0..10)
        .map(|n| {
            Card::new(
                CardId::new(format!("card-{}", n + 1)),
                format!("Card {} Front", n + 1),
                format!("Card {} Back", n + 1),
                n,
            )
        })
        .collect();
    CardSet::new(set_id, "Demo Set", cards)
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Assess => "assess",
        Phase::Learn => "learn",
        Phase::Test => "test",
    }
}

fn print_status(service: &StudySessionService) {
    let progress = service.progress();
    println!(
        "[round {} / {}] deck: {}  know: {}  dontKnow: {}  discard: {}{}",
        progress.round,
        phase_label(progress.phase),
        progress.deck_remaining,
        progress.known,
        progress.unknown,
        progress.discarded,
        if service.is_shuffled() { "  (shuffled)" } else { "" },
    );
}

fn print_card(service: &StudySessionService, flipped: bool) {
    match service.active_card() {
        Some(card) => {
            if flipped {
                println!("  {}", card.back);
            } else {
                println!("  {}", card.front);
            }
        }
        None if service.is_complete() => println!("  session complete, every card is known"),
        None => println!("  pile is empty; press enter to continue to the next round"),
    }
}

fn print_help() {
    println!("commands:");
    println!("  f / 3    flip the card");
    println!("  k / 4    mark known");
    println!("  d / 2    mark don't know");
    println!("  n / 5    next card (skip)");
    println!("  u / 1    undo last move");
    println!("  s        toggle shuffle");
    println!("  r        restart this pass");
    println!("  <enter>  continue to the next round when the pile is empty");
    println!("  q        save and quit");
}

async fn study_loop(
    mut service: StudySessionService,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut flipped = false;

    print_help();
    print_status(&service);
    print_card(&service, flipped);

    for line in stdin.lock().lines() {
        let line = line?;
        let command = line.trim();
        let outcome = match command {
            "f" | "3" => {
                flipped = !flipped;
                Ok(())
            }
            "k" | "4" => service.mark_known().map(|_| ()),
            "d" | "2" => service.mark_unknown().map(|_| ()),
            "n" | "5" => service.skip().map(|_| ()),
            "u" | "1" => service.undo().map(|_| ()),
            "s" => service.toggle_shuffle().map(|_| ()),
            "r" => service.restart().map(|_| ()),
            "" => service.advance_round().map(|_| ()),
            "h" | "help" => {
                print_help();
                Ok(())
            }
            "q" => break,
            other => {
                println!("unknown command: {other} (h for help)");
                Ok(())
            }
        };

        if let Err(err) = outcome {
            println!("error: {err}");
        }
        if !matches!(command, "f" | "3") {
            flipped = false;
        }
        print_status(&service);
        print_card(&service, flipped);
    }

    service.flush().await?;
    println!("progress saved");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: start studying when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Study,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Study,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    match cmd {
        Command::Study => {
            let session_key = format!("{}:{}", parsed.user, parsed.set_id);
            let service =
                StudySessionService::open(&storage, &parsed.set_id, &session_key).await?;
            log::info!("opened session {session_key}");
            study_loop(service).await
        }
        Command::Seed => {
            let set = demo_set(&parsed.set_id);
            storage.sets.upsert_set(&set).await?;
            println!("seeded set {} with {} cards", set.id, set.cards.len());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
