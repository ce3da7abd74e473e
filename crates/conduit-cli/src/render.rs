//! Terminal rendering of answers, traces and failures.

use colored::Colorize;
use conduit_runtime::{Answer, ExecutionTrace, Grounding, RuntimeError, TraceStep};

use crate::theme::Theme;

/// Longest tool payload shown in a rendered trace.
const MAX_PAYLOAD_CHARS: usize = 160;

/// Print an answer with its notice and a status line.
pub(crate) fn print_answer(answer: &Answer) {
    if let Some(notice) = answer.notice() {
        println!("{}", Theme::warning(notice));
    }
    println!("{}", answer.text);
    println!("{}", Theme::dimmed(&status_line(answer)));
}

/// One-line summary: mode, status, rounds and grounding.
pub(crate) fn status_line(answer: &Answer) -> String {
    let mut line = format!(
        "[{}] {} | rounds {}",
        answer.mode,
        answer.status.as_str(),
        answer.rounds
    );
    match &answer.grounding {
        Grounding::Grounded { sources, .. } => {
            line.push_str(&format!(" | sources {}", sources.len()));
        },
        Grounding::StoreUnavailable { .. } => line.push_str(" | store unavailable"),
        Grounding::NotAttempted | Grounding::NoUsableContext { .. } => {},
    }
    if !answer.activated.is_empty() {
        line.push_str(&format!(" | skills {}", answer.activated.join(", ")));
    }
    line
}

/// Print a query failure.
pub(crate) fn print_failure(err: &RuntimeError) {
    eprintln!("{}", Theme::error(&err.to_string()));
    if let Some(trace) = err.trace() {
        eprintln!(
            "{}",
            Theme::dimmed(&format!("status {} | {} trace steps", err.status(), trace.len()))
        );
    }
}

/// Print a trace as readable steps.
pub(crate) fn print_trace(trace: &ExecutionTrace) {
    println!("{}", Theme::header("Execution trace"));
    println!("{}", Theme::separator());
    for (i, step) in trace.steps().iter().enumerate() {
        println!("{:>3}. {}", i.saturating_add(1), describe(step));
    }
    println!("{}", Theme::separator());
}

fn describe(step: &TraceStep) -> String {
    match step {
        TraceStep::UserMessage { content } => format!("{} {}", "user".bold(), content),
        TraceStep::ModelMessage { round, text, calls } if calls.is_empty() => format!(
            "{} r{round} {}",
            "model".bold(),
            truncate(text.as_deref().unwrap_or_default())
        ),
        TraceStep::ModelMessage { round, calls, .. } => {
            let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            format!("{} r{round} calls {}", "model".bold(), names.join(", ").cyan())
        },
        TraceStep::ToolResult {
            round,
            name,
            is_error,
            content,
            error_kind,
            ..
        } => {
            let label = if *is_error {
                format!("{name} failed ({})", error_kind.as_deref().unwrap_or("error"))
                    .red()
                    .to_string()
            } else {
                name.green().to_string()
            };
            format!("{} r{round} {label} {}", "tool".bold(), truncate(content))
        },
    }
}

fn truncate(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= MAX_PAYLOAD_CHARS {
        return flat;
    }
    let mut out: String = flat.chars().take(MAX_PAYLOAD_CHARS).collect();
    out.push('…');
    out
}
