//! Request context for correlating the log lines of one query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and timing of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: Uuid,
    /// Owning session, if any.
    pub session_id: Option<Uuid>,
    /// Operating mode the request runs in.
    pub mode: Option<String>,
    /// Component that created the context.
    pub source: String,
    /// Operation name.
    pub operation: Option<String>,
    /// When the request started.
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context for a new request.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            session_id: None,
            mode: None,
            source: source.into(),
            operation: None,
            started_at: Utc::now(),
        }
    }

    /// Set the session.
    #[must_use]
    pub fn with_session_id(mut self, id: Uuid) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Set the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Milliseconds since the request started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// A span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.short_id(),
            session_id = self.session_id.map(|id| id.to_string()),
            mode = self.mode.as_deref(),
            source = %self.source,
            operation = self.operation.as_deref(),
        )
    }

    /// First eight hex digits of the request id.
    #[must_use]
    pub fn short_id(&self) -> String {
        let mut id = self.request_id.simple().to_string();
        id.truncate(8);
        id
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Enters the context's span and logs completion with the elapsed time on
/// drop.
///
/// Holds an entered span, so it must not live across an `.await`. Async
/// code should use [`RequestContext::span`] with `Instrument` instead.
pub struct RequestGuard {
    context: RequestContext,
    _span: tracing::span::EnteredSpan,
}

impl RequestGuard {
    /// Enter the span and log the start.
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        let span = context.span().entered();
        tracing::debug!("Request started");
        Self {
            context,
            _span: span,
        }
    }

    /// The guarded context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        tracing::debug!(elapsed_ms = self.context.elapsed_ms(), "Request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let session = Uuid::new_v4();
        let ctx = RequestContext::new("orchestrator")
            .with_session_id(session)
            .with_mode("agent")
            .with_operation("answer");
        assert_eq!(ctx.session_id, Some(session));
        assert_eq!(ctx.mode.as_deref(), Some("agent"));
        assert_eq!(ctx.operation.as_deref(), Some("answer"));
    }

    #[test]
    fn test_short_id() {
        let ctx = RequestContext::new("test");
        assert_eq!(ctx.short_id().len(), 8);
        assert!(ctx.request_id.simple().to_string().starts_with(&ctx.short_id()));
    }

    #[test]
    fn test_elapsed() {
        let ctx = RequestContext::new("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed_ms() >= 10);
    }

    #[test]
    fn test_guard_exposes_context() {
        let guard = RequestGuard::new(RequestContext::new("cli").with_operation("skills"));
        assert_eq!(guard.context().source, "cli");
    }

    #[test]
    fn test_serialization() {
        let ctx = RequestContext::new("test").with_mode("rag");
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"mode\":\"rag\""));
        let parsed: RequestContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, ctx.request_id);
    }
}
