//! One-shot query command.

use anyhow::{Result, bail};
use conduit_core::OperatingMode;
use conduit_runtime::TurnOutcome;

use crate::app::App;
use crate::commands::run_turn;
use crate::render;
use crate::theme::Theme;

/// Answer `query` and exit. `--trace` prints the execution trace as JSON.
pub(crate) async fn run_ask(
    app: &App,
    mode: Option<OperatingMode>,
    trace: bool,
    query: &str,
) -> Result<()> {
    let mut session = app.orchestrator.new_session();
    if let Some(mode) = mode {
        session.set_mode(mode);
    }

    let outcome = run_turn(app, &mut session, query).await;

    if trace && let Some(t) = session.last_trace() {
        println!("{}", t.to_json()?);
    }

    match outcome {
        Ok(TurnOutcome::Answered(answer)) => {
            if !trace {
                render::print_answer(&answer);
            }
            Ok(())
        },
        Ok(TurnOutcome::ModeChanged(mode)) => {
            println!(
                "{}",
                Theme::info(&format!("{mode} is a mode switch; add a question after it"))
            );
            Ok(())
        },
        Err(e) => {
            render::print_failure(&e);
            bail!("query ended with status {}", e.status())
        },
    }
}
