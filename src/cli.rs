use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    db::Database,
    document::{demo_article, detect_kind, parse_file},
    models::ContentUnit,
    quiz::{AiProvider, ChatCompletionsGenerator, CheckGenerator, QuizState},
    session::{SessionController, SessionSnapshot},
    settings::SettingsStore,
    tracker::VisibilityChange,
    utils::logging,
};

#[derive(Debug, Parser)]
#[command(name = "socratic-reader", version, about = "Reading tracker with comprehension checks")]
pub struct Cli {
    /// Directory holding the document database and settings.json
    #[arg(long, env = "SOCRATIC_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a file into sections and store it
    Import {
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
    /// List stored documents, newest first
    List,
    /// Print a stored document as JSON
    Show { id: String },
    /// Start a reading session driven by commands on stdin
    Read {
        /// Stored document id
        id: Option<String>,
        #[arg(long, conflicts_with = "id")]
        demo: bool,
        /// Override the tick interval in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,
    },
    /// Show or change stored settings; with no flags prints the current ones
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Default, PartialEq, Args)]
pub struct ConfigArgs {
    /// openai or ollama; switching resets base URL and model to the provider defaults
    #[arg(long, value_parser = parse_provider)]
    pub provider: Option<AiProvider>,
    /// Empty string clears the stored value
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// Reading rate in words per minute
    #[arg(long)]
    pub wpm: Option<f64>,
    #[arg(long)]
    pub slack: Option<f64>,
    #[arg(long)]
    pub max_checks: Option<u32>,
    #[arg(long)]
    pub tick_ms: Option<u64>,
}

fn parse_provider(value: &str) -> Result<AiProvider, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}

fn cleared_if_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Applies the given flags to the settings file. Tracking values are
/// validated before anything is written. Returns true if anything changed.
pub fn apply_config(settings: &SettingsStore, args: ConfigArgs) -> Result<bool> {
    let mut tracking = settings.tracking();
    let tracking_before = tracking.clone();
    if let Some(wpm) = args.wpm {
        tracking.reading_rate_wpm = wpm;
    }
    if let Some(slack) = args.slack {
        tracking.slack_factor = slack;
    }
    if let Some(max_checks) = args.max_checks {
        tracking.max_checks_per_session = max_checks;
    }
    if let Some(tick_ms) = args.tick_ms {
        tracking.tick_interval_ms = tick_ms;
    }

    let mut ai = settings.ai();
    let ai_before = ai.clone();
    if let Some(provider) = args.provider {
        ai.switch_provider(provider);
    }
    if let Some(api_key) = args.api_key {
        ai.api_key = cleared_if_empty(api_key);
    }
    if let Some(base_url) = args.base_url {
        ai.base_url = cleared_if_empty(base_url);
    }
    if let Some(model) = args.model {
        ai.model = cleared_if_empty(model);
    }

    let tracking_changed = tracking != tracking_before;
    if tracking_changed {
        settings.update_tracking(tracking)?;
    }
    let ai_changed = ai != ai_before;
    if ai_changed {
        settings.update_ai(ai)?;
    }

    Ok(tracking_changed || ai_changed)
}

/// One line typed by the reader during `read`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderInput {
    Visibility(Vec<VisibilityChange>),
    ToggleSilence,
    Answer(usize),
    Dismiss,
    Stats,
    Quit,
}

pub fn parse_input(line: &str) -> Result<Option<ReaderInput>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let input = match command {
        "view" => {
            if args.is_empty() || args.len() % 2 != 0 {
                bail!("usage: view <id> <ratio> [<id> <ratio> ...]");
            }
            let batch = args
                .chunks(2)
                .map(|pair| {
                    let ratio = pair[1]
                        .parse::<f64>()
                        .with_context(|| format!("invalid ratio '{}'", pair[1]))?;
                    Ok(VisibilityChange::new(pair[0], ratio))
                })
                .collect::<Result<Vec<_>>>()?;
            ReaderInput::Visibility(batch)
        }
        "hide" => {
            if args.is_empty() {
                bail!("usage: hide <id> [<id> ...]");
            }
            ReaderInput::Visibility(args.iter().map(|id| VisibilityChange::hidden(*id)).collect())
        }
        "dnd" => ReaderInput::ToggleSilence,
        "answer" => {
            let raw = args.first().ok_or_else(|| anyhow!("usage: answer <option>"))?;
            ReaderInput::Answer(raw.parse().with_context(|| format!("invalid option '{raw}'"))?)
        }
        "dismiss" => ReaderInput::Dismiss,
        "stats" => ReaderInput::Stats,
        "quit" | "exit" => ReaderInput::Quit,
        other => bail!("unknown command '{other}'"),
    };

    Ok(Some(input))
}

pub async fn run(cli: Cli) -> Result<()> {
    logging::init(cli.verbose);

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .map(|dir| dir.join("socratic-reader"))
            .ok_or_else(|| anyhow!("no data directory available; pass --data-dir"))?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let db = Database::new(data_dir.join("socratic.sqlite3"))?;

    match cli.command {
        Command::Import { path, title } => import(&db, path, title).await,
        Command::List => list(&db).await,
        Command::Show { id } => {
            let document = db
                .get_document(&id)
                .await?
                .ok_or_else(|| anyhow!("Document not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
        Command::Read { id, demo, tick_ms } => {
            let units = match (id, demo) {
                (Some(id), _) => {
                    db.get_document(&id)
                        .await?
                        .ok_or_else(|| anyhow!("Document not found: {id}"))?
                        .sections
                }
                (None, true) => demo_article(),
                (None, false) => bail!("pass a document id or --demo"),
            };
            read(&settings, units, tick_ms).await
        }
        Command::Config(args) => {
            if apply_config(&settings, args)? {
                info!("Settings saved to {}", settings.path().display());
            }
            print_settings(&settings)
        }
    }
}

fn print_settings(settings: &SettingsStore) -> Result<()> {
    let mut ai = settings.effective_ai();
    if ai.api_key.is_some() {
        ai.api_key = Some("********".into());
    }
    let view = serde_json::json!({
        "tracking": settings.tracking(),
        "ai": ai,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn import(db: &Database, path: PathBuf, title: Option<String>) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let kind = detect_kind("application/octet-stream", &file_name)?;
    let units = parse_file(&path)?;

    let document = db
        .insert_document(title.unwrap_or(file_name), kind, units)
        .await?;
    info!("Imported {} as {}", path.display(), document.id);
    println!("{}\t{} sections", document.id, document.sections.len());
    Ok(())
}

async fn list(db: &Database) -> Result<()> {
    for document in db.list_documents().await? {
        println!(
            "{}\t{}\t{}\t{} sections",
            document.id,
            document.created_at.format("%Y-%m-%d"),
            document.title,
            document.section_count
        );
    }
    Ok(())
}

async fn read(settings: &SettingsStore, units: Vec<ContentUnit>, tick_ms: Option<u64>) -> Result<()> {
    let mut tracking = settings.effective_tracking();
    if let Some(tick_ms) = tick_ms {
        tracking.tick_interval_ms = tick_ms;
    }

    let generator: Arc<dyn CheckGenerator> =
        Arc::new(ChatCompletionsGenerator::new(settings.effective_ai())?);
    let controller = SessionController::new(generator, tracking);

    for unit in &units {
        println!("[{}] {}", unit.id, unit.title.as_deref().unwrap_or(""));
    }
    controller.load_units(units).await?;

    let printer = tokio::spawn(print_changes(controller.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = match parse_input(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        match input {
            ReaderInput::Visibility(batch) => controller.push_visibility(batch).await?,
            ReaderInput::ToggleSilence => {
                let silenced = controller.toggle_silenced().await?;
                println!("{}", if silenced { "Do Not Disturb" } else { "AI Active" });
            }
            ReaderInput::Answer(selected) => match controller.answer_check(selected).await {
                Ok(outcome) => {
                    println!("{}", if outcome.correct { "Correct!" } else { "Not quite." });
                    println!("{}", outcome.explanation);
                }
                Err(err) => eprintln!("{err}"),
            },
            ReaderInput::Dismiss => {
                controller.dismiss_check().await?;
            }
            ReaderInput::Stats => {
                println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
            }
            ReaderInput::Quit => break,
        }
    }

    controller.shutdown().await?;
    printer.abort();
    Ok(())
}

async fn print_changes(mut updates: tokio::sync::watch::Receiver<SessionSnapshot>) {
    let mut previous = updates.borrow().clone();
    while updates.changed().await.is_ok() {
        let current = updates.borrow_and_update().clone();

        for unit in &current.units {
            let was_stuck = previous.unit(&unit.id).map(|u| u.is_stuck).unwrap_or(false);
            if unit.is_stuck && !was_stuck {
                println!(
                    "Detected struggle on {} ({}s, limit {}s)",
                    unit.id,
                    unit.dwell_seconds,
                    unit.expected_dwell_seconds.round()
                );
            }
        }

        if current.quiz_state != previous.quiz_state {
            match (current.quiz_state, current.current_check.as_ref()) {
                (QuizState::Awaiting, _) => println!("Socratic AI is thinking..."),
                (QuizState::ShowingCheck, Some(check)) => {
                    println!(
                        "Knowledge Check ({}/{}): {}",
                        current.quiz_count, current.max_quizzes, check.question
                    );
                    for (index, option) in check.options.iter().enumerate() {
                        println!("  {index}) {option}");
                    }
                }
                _ => {}
            }
        }

        previous = current;
    }
}
