use std::fmt;
use std::sync::Arc;

use sentry_core::types::ParseDsnError;
use thiserror::Error;

/// Raised while resolving the transport configuration.
///
/// None of these abort construction: they are handed to the configured
/// [`ErrorHandler`] and the affected setting falls back to its default.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured DSN could not be parsed.
    #[error("invalid dsn: {0}")]
    InvalidDsn(#[from] ParseDsnError),
    /// A `levelsMap` entry does not name a Sentry level.
    #[error("invalid level {value:?} for {keyword:?} in levels map")]
    InvalidLevel {
        /// The host level keyword of the entry.
        keyword: String,
        /// The value that failed to parse.
        value: String,
    },
}

/// Callback receiving configuration errors.
#[derive(Clone)]
pub struct ErrorHandler(Arc<dyn Fn(&TransportError) + Send + Sync>);

impl ErrorHandler {
    /// Wraps a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        ErrorHandler(Arc::new(f))
    }

    pub(crate) fn report(&self, err: &TransportError) {
        (self.0)(err)
    }
}

impl Default for ErrorHandler {
    /// Writes the error to stderr.
    fn default() -> Self {
        ErrorHandler::new(|err| eprintln!("[sentry-log-transport] {}", err))
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorHandler").finish()
    }
}
