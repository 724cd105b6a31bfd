//! `learn`: run JavaScript exercises and study lessons from the terminal.

mod db;
mod logging;
mod render;
mod study;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use learn_core::model::StepId;
use sandbox::{Sandbox, SandboxConfig};
use services::{AppServices, ChallengeService, load_file};

#[derive(Parser)]
#[command(name = "learn", version, about = "Interactive JavaScript exercises")]
struct Cli {
    /// `SQLite` database holding lesson progress.
    #[arg(long = "db", env = "LEARN_DB_URL", default_value = "sqlite://learn.sqlite3", global = true)]
    db_url: String,

    /// Wall-clock budget for one program run, in milliseconds.
    #[arg(long, env = "LEARN_TIMEOUT_MS", default_value_t = 500, global = true)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a source file and print what it logs.
    Run {
        file: PathBuf,
    },
    /// Grade a source file against one step of a lesson.
    Check {
        lesson: PathBuf,
        /// Step id as written in the lesson file.
        #[arg(long)]
        step: u64,
        file: PathBuf,
    },
    /// Work through a lesson interactively, saving progress.
    Study {
        lesson: PathBuf,
    },
}

impl Cli {
    fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::default().with_timeout(Duration::from_millis(self.timeout_ms))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    match run().await {
        Ok(code) => code,
        Err(err) => {
            // At this layer (binary glue), printing once is fine.
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.sandbox_config();
    match &cli.command {
        Command::Run { file } => cmd_run(file, config),
        Command::Check { lesson, step, file } => cmd_check(lesson, *step, file, config),
        Command::Study { lesson } => cmd_study(&cli.db_url, lesson, config).await,
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn cmd_run(file: &Path, config: SandboxConfig) -> Result<ExitCode> {
    let source = read_source(file)?;
    let output = Sandbox::new(config).run(&source);
    print!("{}", output.text());
    Ok(if output.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_check(lesson: &Path, step: u64, file: &Path, config: SandboxConfig) -> Result<ExitCode> {
    let lesson = load_file(lesson)?;
    let id = StepId::new(step);
    let Some(index) = lesson.index_of(id) else {
        bail!("lesson {} has no step {id}", lesson.id());
    };
    let step = &lesson.steps()[index];
    let Some(expected) = step.expected_output() else {
        bail!("step {id} ({}) has no expected output to check against", step.title());
    };

    let source = read_source(file)?;
    let result = ChallengeService::new(Sandbox::new(config)).execute(&source, expected);
    println!("Output:");
    print!("{}", result.output.text());
    print!("{}", render::verdict(&result.verdict));
    Ok(if result.is_correct() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cmd_study(db_url: &str, lesson: &Path, config: SandboxConfig) -> Result<ExitCode> {
    let lesson = load_file(lesson)?;
    let db_url = db::normalize_sqlite_url(db_url);
    db::prepare_sqlite_file(&db_url)?;
    tracing::debug!(db = %db_url, lesson = %lesson.id(), "starting study session");
    let services = AppServices::new_sqlite(&db_url, config)
        .await
        .with_context(|| format!("open {db_url}"))?;

    let lesson_loop = services.lesson_loop();
    let mut session = lesson_loop.open(lesson).await;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout().lock();
    study::run(&lesson_loop, &mut session, stdin, &mut stdout).await?;
    Ok(ExitCode::SUCCESS)
}
