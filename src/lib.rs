//! Forwards structured log records to Sentry.
//!
//! A [`SentryTransport`] sits at the end of a logging pipeline.  Each record
//! it receives is matched against an ordered severity map; records that
//! resolve are captured on a Sentry hub, records that don't are dropped.
//! Levels mapping to `error` or `fatal` become exception events, everything
//! else becomes a message event.  Record metadata is attached as extra data,
//! and the `user` and `fingerprint` fields are given their Sentry meaning.
//!
//! # Configuration
//!
//! Options are JSON-shaped and merged over built-in defaults, so they can
//! come straight from a configuration file or be built in code:
//!
//! ```
//! use serde_json::json;
//! use sentry_log_transport::{SentryTransport, TransportOptions};
//!
//! let transport = SentryTransport::new(TransportOptions::from_value(json!({
//!     "tags": { "service": "billing" },
//!     "levelsMap": { "critical": "fatal" },
//!     "config": { "logger": "billing" },
//! })));
//!
//! assert_eq!(transport.tags()["service"], "billing");
//! assert!(transport.resolve_level("critical").is_some());
//! assert!(transport.resolve_level("info").is_some());
//! ```
//!
//! The default severity map is, in order: `silly`, `verbose` and `debug` to
//! `debug`, `info` to `info`, `warn` to `warning` and `error` to `error`.
//! Keywords match anywhere in the record's level text, and the first keyword
//! in map order wins.
//!
//! # Logging
//!
//! Records can be handed over directly:
//!
//! ```
//! use sentry_log_transport::{LogRecord, SentryTransport, TransportOptions};
//!
//! let transport = SentryTransport::new(TransportOptions::new());
//! transport.log(
//!     &LogRecord::new("error", "payment failed")
//!         .with_meta("order", 1234)
//!         .with_meta("fingerprint", "payment"),
//! );
//! ```
//!
//! or through the `log` crate with a [`SentryLogger`], which turns
//! structured key-values into metadata.
//!
//! # Features
//!
//! - `env_logger`: enables [`SentryLogger::with_env_logger_dest`].

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![warn(missing_docs)]
#![deny(unsafe_code)]

mod config;
mod converters;
mod error;
mod logger;
mod merge;
mod options;
mod panic;
mod record;
mod transport;

pub use config::{ClientConfig, Config, LevelsMap};
pub use converters::{exception_from_record, message_from_record, user_from_value, ScopeContext};
pub use error::{ErrorHandler, TransportError};
pub use logger::{record_from_log, SentryLogger};
pub use merge::{defaults_deep, fill_missing};
pub use options::{default_options, TransportOptions, DEFAULT_NAME};
pub use record::{is_error, LogRecord};
pub use transport::{Dispatch, SentryTransport};
