//! Operating modes and mode-switch directives.
//!
//! A user turn may start with one of four literal tokens (`/chat`, `/rag`,
//! `/auto`, `/agent`). Anything else, including unknown slash tokens, is
//! ordinary query text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Selects which components take part in answering a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// Direct single-shot generation. No retrieval, no skills.
    Chat,
    /// Always retrieve and inject whatever passages come back.
    Rag,
    /// Retrieve, but only inject when the best passage clears the threshold.
    #[default]
    Auto,
    /// Expose skill metadata and run the tool-invocation loop.
    Agent,
}

impl OperatingMode {
    /// All modes, in directive order.
    pub const ALL: [Self; 4] = [Self::Chat, Self::Rag, Self::Auto, Self::Agent];

    /// Lowercase identifier used in config files and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Rag => "rag",
            Self::Auto => "auto",
            Self::Agent => "agent",
        }
    }

    /// The literal directive token that switches to this mode.
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            Self::Chat => "/chat",
            Self::Rag => "/rag",
            Self::Auto => "/auto",
            Self::Agent => "/agent",
        }
    }

    /// One-line human description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Chat => "plain conversation with the model",
            Self::Rag => "always answer from retrieved documents",
            Self::Auto => "use documents only when they match well",
            Self::Agent => "let the model activate skills and call tools",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a mode name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operating mode '{0}'; expected one of: chat, rag, auto, agent")]
pub struct ModeParseError(pub String);

impl FromStr for OperatingMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ModeParseError(name.to_string()))
    }
}

/// A user turn split into an optional mode directive and the remaining text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    /// Mode named by a leading directive token, if any.
    pub mode: Option<OperatingMode>,
    /// Query text after the directive (or the whole turn when there is none).
    pub text: &'a str,
}

impl Directive<'_> {
    /// A directive token with nothing after it.
    #[must_use]
    pub fn is_bare_switch(&self) -> bool {
        self.mode.is_some() && self.text.is_empty()
    }
}

/// Split a user turn into a leading directive and the query text.
///
/// Only an exact match of the first whitespace-delimited token counts as a
/// directive; `/ragged` or `/help` are returned untouched as query text.
#[must_use]
pub fn parse_directive(input: &str) -> Directive<'_> {
    let trimmed = input.trim();
    let (token, rest) = trimmed
        .split_once(char::is_whitespace)
        .unwrap_or((trimmed, ""));

    match OperatingMode::ALL
        .into_iter()
        .find(|m| m.directive() == token)
    {
        Some(mode) => Directive {
            mode: Some(mode),
            text: rest.trim(),
        },
        None => Directive {
            mode: None,
            text: trimmed,
        },
    }
}
