//! Conduit Telemetry - logging setup and request correlation.
//!
//! ```rust,no_run
//! use conduit_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), conduit_telemetry::TelemetryError> {
//! let _guard = setup_logging(
//!     &LogConfig::new("debug")
//!         .with_format(LogFormat::Compact)
//!         .with_directive("conduit_skills=trace"),
//! )?;
//!
//! let ctx = RequestContext::new("orchestrator").with_mode("agent");
//! let _entered = ctx.span().entered();
//! tracing::info!("Handling query");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
pub use tracing_appender::non_blocking::WorkerGuard;
