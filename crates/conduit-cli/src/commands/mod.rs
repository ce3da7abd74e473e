//! CLI subcommands.

pub(crate) mod ask;
pub(crate) mod chat;
pub(crate) mod skills;

use conduit_runtime::{RuntimeResult, Session, TurnOutcome};
use tokio_util::sync::CancellationToken;

use crate::app::App;

/// Run one turn, cancelling it if the user presses Ctrl+C.
pub(crate) async fn run_turn(
    app: &App,
    session: &mut Session,
    input: &str,
) -> RuntimeResult<TurnOutcome> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    let result = app.orchestrator.handle(session, input, &cancel).await;
    ctrl_c.abort();
    result
}
