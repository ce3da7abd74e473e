//! Interactive chat command.

use anyhow::Result;
use conduit_core::OperatingMode;
use conduit_runtime::{Session, TurnOutcome};
use tracing::debug;

use crate::app::App;
use crate::commands::run_turn;
use crate::render;
use crate::repl::{ReadlineEvent, ReplEditor};
use crate::theme::{Theme, print_banner};

/// Commands the REPL handles itself instead of sending to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplCommand {
    Mode,
    Skills,
    Clear,
    Trace,
    Help,
    Quit,
}

impl ReplCommand {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "/mode" => Some(Self::Mode),
            "/skills" => Some(Self::Skills),
            "/clear" => Some(Self::Clear),
            "/trace" => Some(Self::Trace),
            "/help" => Some(Self::Help),
            "/quit" | "/exit" | "exit" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Run the chat REPL.
pub(crate) async fn run_chat(app: &App, mode: Option<OperatingMode>) -> Result<()> {
    let mut session = app.orchestrator.new_session();
    if let Some(mode) = mode {
        session.set_mode(mode);
    }

    print_banner(&app.model, session.mode);
    if app.passages > 0 {
        println!(
            "{}",
            Theme::info(&format!("{} passages indexed for retrieval", app.passages))
        );
    }

    let mut editor = ReplEditor::new()?;

    loop {
        let input = match editor.readline(session.mode) {
            ReadlineEvent::Line(line) => line,
            ReadlineEvent::Interrupted => continue,
            ReadlineEvent::Eof => {
                println!("{}", Theme::dimmed("Goodbye!"));
                break;
            },
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(cmd) = ReplCommand::parse(input) {
            if cmd == ReplCommand::Quit {
                println!("{}", Theme::dimmed("Goodbye!"));
                break;
            }
            handle_command(app, &mut session, cmd);
            continue;
        }

        match run_turn(app, &mut session, input).await {
            Ok(TurnOutcome::ModeChanged(mode)) => {
                println!("{}", Theme::success(&format!("Switched to {mode} mode")));
            },
            Ok(TurnOutcome::Answered(answer)) => {
                println!();
                render::print_answer(&answer);
                println!();
            },
            Err(e) => {
                debug!(error = %e, "Turn failed");
                render::print_failure(&e);
            },
        }
    }

    Ok(())
}

fn handle_command(app: &App, session: &mut Session, cmd: ReplCommand) {
    match cmd {
        ReplCommand::Mode => {
            println!("Current mode {}", Theme::mode(session.mode));
        },
        ReplCommand::Skills => print_skills(app),
        ReplCommand::Clear => {
            session.clear_history();
            println!("{}", Theme::success("History cleared"));
        },
        ReplCommand::Trace => match session.last_trace() {
            Some(trace) => render::print_trace(trace),
            None => println!("{}", Theme::dimmed("No query has run yet")),
        },
        ReplCommand::Help => print_help(),
        ReplCommand::Quit => {},
    }
}

fn print_skills(app: &App) {
    let skills = app.orchestrator.registry().list();
    if skills.is_empty() {
        println!(
            "{}",
            Theme::dimmed(&format!("No skills under {}", app.skills_root.display()))
        );
        return;
    }
    println!("{}", Theme::header("Skills"));
    for skill in skills {
        let loaded = if app.orchestrator.loader().is_loaded(&skill.name) {
            " (loaded)"
        } else {
            ""
        };
        println!("  {}{loaded}  {}", skill.name, Theme::dimmed(&skill.description));
    }
}

fn print_help() {
    println!("{}", Theme::header("Commands"));
    println!("  /chat /rag /auto /agent   switch mode; add text for a one-off query");
    println!("  /mode                     show the current mode");
    println!("  /skills                   list discovered skills");
    println!("  /clear                    forget conversation history");
    println!("  /trace                    show the last execution trace");
    println!("  /quit                     leave");
    println!("{}", Theme::dimmed("End a line with \\ to continue on the next line."));
}
