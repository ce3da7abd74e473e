//! Rustyline-based REPL editor with history and completion.

use std::path::PathBuf;

use conduit_core::OperatingMode;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::DefaultHistory;
use rustyline::{
    CompletionType, Config, Context, EditMode, Editor, Helper, Highlighter, Validator,
};

/// Slash commands available in the REPL.
pub(crate) const SLASH_COMMANDS: &[&str] = &[
    "/chat", "/rag", "/auto", "/agent", "/mode", "/skills", "/clear", "/trace", "/help", "/quit",
];

/// Events returned by the REPL editor.
pub(crate) enum ReadlineEvent {
    /// A complete line of input (possibly multi-line, joined).
    Line(String),
    /// The user pressed Ctrl+C, cancelling current input.
    Interrupted,
    /// The user pressed Ctrl+D, signalling end-of-input.
    Eof,
}

/// Helper that provides slash-command completion and history hints.
#[derive(Helper, Validator, Highlighter)]
struct ReplHelper {
    hinter: HistoryHinter,
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(complete_slash(line, pos))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

/// Completion candidates for the word under the cursor.
///
/// Only the first word of the line completes, since directives are only
/// recognized there.
fn complete_slash(line: &str, pos: usize) -> (usize, Vec<Pair>) {
    let prefix = line.get(..pos).unwrap_or(line);
    if !prefix.starts_with('/') || prefix.contains(char::is_whitespace) {
        return (pos, Vec::new());
    }

    let matches = SLASH_COMMANDS
        .iter()
        .filter(|cmd| cmd.starts_with(prefix))
        .map(|cmd| Pair {
            display: (*cmd).to_string(),
            replacement: (*cmd).to_string(),
        })
        .collect();

    (0, matches)
}

/// Rustyline-based REPL editor with command history and tab completion.
pub(crate) struct ReplEditor {
    editor: Editor<ReplHelper, DefaultHistory>,
    history_path: Option<PathBuf>,
}

impl ReplEditor {
    /// Create a new REPL editor.
    ///
    /// Loads command history from `~/.conduit/history` when a home directory
    /// is available. Without one, history lives only for the session.
    pub(crate) fn new() -> anyhow::Result<Self> {
        let history_path = history_path();
        if let Some(path) = &history_path
            && !path.exists()
        {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, "")?;
        }

        let config = Config::builder()
            .history_ignore_dups(true)?
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .auto_add_history(true)
            .build();

        let helper = ReplHelper {
            hinter: HistoryHinter::new(),
        };

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(helper));
        if let Some(path) = &history_path {
            let _ = editor.load_history(path);
        }

        Ok(Self {
            editor,
            history_path,
        })
    }

    /// Read a line of input from the user.
    ///
    /// A line ending with `\` continues on the next line. The prompt shows
    /// the session mode.
    pub(crate) fn readline(&mut self, mode: OperatingMode) -> ReadlineEvent {
        let prompt = format!("\x1b[1;32m{mode}> \x1b[0m");
        let continuation = "  ";

        let mut accumulated = String::new();
        let mut is_continuation = false;

        loop {
            let p = if is_continuation {
                continuation
            } else {
                prompt.as_str()
            };

            match self.editor.readline(p) {
                Ok(line) => {
                    if let Some(head) = line.strip_suffix('\\') {
                        accumulated.push_str(head);
                        accumulated.push('\n');
                        is_continuation = true;
                        continue;
                    }

                    accumulated.push_str(&line);

                    if let Some(path) = &self.history_path {
                        let _ = self.editor.save_history(path);
                    }

                    return ReadlineEvent::Line(accumulated);
                },
                Err(ReadlineError::Interrupted) => return ReadlineEvent::Interrupted,
                Err(ReadlineError::Eof | _) => return ReadlineEvent::Eof,
            }
        }
    }
}

fn history_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(conduit_config::CONFIG_DIR_NAME)
            .join("history")
    })
}
