//! Line-oriented study loop: one command per line on stdin.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use services::{LessonLoopService, LessonSession};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::render;

const HELP: &str = "\
Commands:
  run <file>   run a source file against the current step
  next         go to the next step
  prev         go to the previous step
  jump <n>     go to step n (1-based) if it is unlocked
  close        dismiss feedback; a solved step moves on
  reset        forget all progress for this lesson
  status       show the lesson outline and current step
  help         show this text
  quit         leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudyCommand {
    Run(PathBuf),
    Next,
    Prev,
    Jump(usize),
    Close,
    Reset,
    Status,
    Help,
    Quit,
}

impl StudyCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if words.next().is_some() {
            bail!("too many arguments for `{name}`");
        }

        let command = match (name, arg) {
            ("run", Some(path)) => Self::Run(PathBuf::from(path)),
            ("run", None) => bail!("usage: run <file>"),
            ("jump", Some(n)) => {
                let step: usize = n
                    .parse()
                    .ok()
                    .filter(|&step| step > 0)
                    .ok_or_else(|| anyhow!("invalid step number: {n}"))?;
                Self::Jump(step)
            }
            ("jump", None) => bail!("usage: jump <n>"),
            ("next" | "n", None) => Self::Next,
            ("prev" | "p", None) => Self::Prev,
            ("close", None) => Self::Close,
            ("reset", None) => Self::Reset,
            ("status" | "s", None) => Self::Status,
            ("help" | "?", None) => Self::Help,
            ("quit" | "q" | "exit", None) => Self::Quit,
            (other, Some(_)) if is_known(other) => bail!("`{other}` takes no arguments"),
            (other, _) => bail!("unknown command `{other}`; try `help`"),
        };
        Ok(Some(command))
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "next" | "n" | "prev" | "p" | "close" | "reset" | "status" | "s" | "help" | "?" | "quit"
            | "q" | "exit"
    )
}

/// Drive `session` from `input` until `quit` or end of input.
pub async fn run<R, W>(
    service: &LessonLoopService,
    session: &mut LessonSession,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    write!(out, "{}", render::session(session))?;
    let mut lines = input.lines();
    loop {
        write!(out, "learn> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await.context("read command")? else {
            writeln!(out)?;
            break;
        };
        let command = match StudyCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                writeln!(out, "{err}")?;
                continue;
            }
        };
        if command == StudyCommand::Quit {
            break;
        }
        apply(service, session, command, out).await?;
    }
    Ok(())
}

async fn apply<W: Write>(
    service: &LessonLoopService,
    session: &mut LessonSession,
    command: StudyCommand,
    out: &mut W,
) -> Result<()> {
    match command {
        StudyCommand::Run(path) => {
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    writeln!(out, "cannot read {}: {err}", path.display())?;
                    return Ok(());
                }
            };
            service.run_code(session, &source).await;
            writeln!(out, "Output:")?;
            write!(out, "{}", session.last_run_output())?;
            if let Some(verdict) = session.last_verdict() {
                write!(out, "{}", render::verdict(verdict))?;
                if session.feedback_visible() {
                    writeln!(out, "(type `close` to dismiss)")?;
                }
            }
        }
        StudyCommand::Next => {
            if service.advance(session).await.changed {
                write!(out, "{}", render::session(session))?;
            } else if session.is_last_step() {
                writeln!(out, "This is the last step of the lesson.")?;
            } else {
                writeln!(out, "Solve this step's challenge before moving on.")?;
            }
        }
        StudyCommand::Prev => {
            if service.retreat(session).await.changed {
                write!(out, "{}", render::session(session))?;
            } else {
                writeln!(out, "Already at the first step.")?;
            }
        }
        StudyCommand::Jump(step) => {
            if service.jump_to(session, step - 1).await.changed {
                write!(out, "{}", render::session(session))?;
            } else {
                writeln!(out, "Step {step} is locked.")?;
            }
        }
        StudyCommand::Close => {
            let before = session.current_index();
            service.dismiss_feedback(session).await;
            if session.current_index() != before {
                write!(out, "{}", render::session(session))?;
            }
        }
        StudyCommand::Reset => {
            service.reset(session).await;
            writeln!(out, "Progress reset.")?;
            write!(out, "{}", render::session(session))?;
        }
        StudyCommand::Status => write!(out, "{}", render::session(session))?,
        StudyCommand::Help => writeln!(out, "{HELP}")?,
        StudyCommand::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use learn_core::model::{LessonDraft, LessonId, StepDraft};
    use sandbox::Sandbox;
    use storage::InMemoryStore;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(StudyCommand::parse("  ").unwrap(), None);
        assert_eq!(StudyCommand::parse("n").unwrap(), Some(StudyCommand::Next));
        assert_eq!(StudyCommand::parse("jump 3").unwrap(), Some(StudyCommand::Jump(3)));
        assert_eq!(
            StudyCommand::parse("run sum.js").unwrap(),
            Some(StudyCommand::Run(PathBuf::from("sum.js")))
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(StudyCommand::parse("jump 0").is_err());
        assert!(StudyCommand::parse("jump x").is_err());
        assert!(StudyCommand::parse("run").is_err());
        assert!(StudyCommand::parse("next 2").is_err());
        assert!(StudyCommand::parse("dance").is_err());
    }

    #[tokio::test]
    async fn scripted_session_walks_the_lesson() {
        let lesson = LessonDraft {
            id: LessonId::new("demo").unwrap(),
            title: "Demo".into(),
            description: String::new(),
            steps: vec![
                StepDraft::reading(1, "Read", "Some text"),
                StepDraft::coding(2, "Code", "", Some("Hello")),
            ],
        }
        .validate()
        .unwrap();
        let service = LessonLoopService::new(Sandbox::default(), Arc::new(InMemoryStore::new()));
        let mut session = service.open(lesson).await;

        let script: &[u8] = b"jump 2\nnext\nstatus\nbogus\nprev\nquit\nnext\n";
        let mut out = Vec::new();
        run(&service, &mut session, script, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Step 2 is locked."));
        assert!(text.contains("Step 2 of 2: Code"));
        assert!(text.contains("unknown command `bogus`"));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.progress().completed, 1);
    }

    #[tokio::test]
    async fn next_on_the_final_step_says_so() {
        let lesson = LessonDraft {
            id: LessonId::new("short").unwrap(),
            title: "Short".into(),
            description: String::new(),
            steps: vec![
                StepDraft::reading(1, "First", "One"),
                StepDraft::reading(2, "Last", "Two"),
            ],
        }
        .validate()
        .unwrap();
        let service = LessonLoopService::new(Sandbox::default(), Arc::new(InMemoryStore::new()));
        let mut session = service.open(lesson).await;

        let script: &[u8] = b"next\nnext\nnext\n";
        let mut out = Vec::new();
        run(&service, &mut session, script, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Step 2 of 2: Last"));
        assert!(text.contains("This is the last step of the lesson."));
        assert!(!text.contains("Solve this step's challenge"));
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.progress().completed, 2);
    }
}
