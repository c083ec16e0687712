use std::env;
use std::fmt;
use std::sync::Arc;

use sentry_core::{Hub, TransportFactory};
use serde_json::{json, Map, Value};

use crate::error::{ErrorHandler, TransportError};

/// The default name of the transport and of the logger reported to Sentry.
pub const DEFAULT_NAME: &str = "sentry-log-transport";

/// Caller supplied options for a [`SentryTransport`](crate::SentryTransport).
///
/// Options are kept as a JSON-shaped tree so they can be built from
/// arbitrary configuration sources; the builder methods are shortcuts for
/// writing the recognized keys.  Anything not given is filled in from
/// [`default_options`] when the transport is constructed.
///
/// # Examples
///
/// ```
/// use sentry_log_transport::TransportOptions;
///
/// let options = TransportOptions::new()
///     .dsn("https://public@sentry.invalid/1")
///     .tag("service", "billing")
///     .silent(false);
/// assert_eq!(options.value()["tags"]["service"], "billing");
/// ```
#[derive(Clone, Default)]
pub struct TransportOptions {
    value: Map<String, Value>,
    pub(crate) hub: Option<Arc<Hub>>,
    pub(crate) transport: Option<Arc<dyn TransportFactory>>,
    pub(crate) error_handler: ErrorHandler,
}

impl TransportOptions {
    /// Creates empty options; every setting falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options from an arbitrary JSON value.
    ///
    /// Anything that is not an object is treated like empty options.
    pub fn from_value(value: Value) -> Self {
        let value = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        TransportOptions {
            value,
            ..Default::default()
        }
    }

    /// The raw option tree as supplied by the caller.
    pub fn value(&self) -> Value {
        Value::Object(self.value.clone())
    }

    pub(crate) fn into_value(self) -> Value {
        Value::Object(self.value)
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.value.insert(key.into(), value);
        self
    }

    fn set_nested(mut self, parent: &str, key: &str, value: Value) -> Self {
        let entry = self
            .value
            .entry(parent.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert(key.into(), value);
        }
        self
    }

    /// Sets the display name of the transport.
    #[must_use]
    pub fn name(self, name: &str) -> Self {
        self.set("name", name.into())
    }

    /// Suppresses all forwarding when `true`.
    #[must_use]
    pub fn silent(self, silent: bool) -> Self {
        self.set("silent", silent.into())
    }

    /// Sets the minimum level.
    ///
    /// The value is kept on the resolved configuration for the host
    /// pipeline; the transport itself does not filter on it.
    #[must_use]
    pub fn level(self, level: &str) -> Self {
        self.set("level", level.into())
    }

    /// Adds an entry to the severity map.
    ///
    /// Entries added here are matched before the built-in ones.
    #[must_use]
    pub fn map_level(self, keyword: &str, level: sentry_core::Level) -> Self {
        self.set_nested("levelsMap", keyword, level.to_string().into())
    }

    /// Adds a tag attached to every captured event.
    #[must_use]
    pub fn tag<V: Into<Value>>(self, key: &str, value: V) -> Self {
        self.set_nested("tags", key, value.into())
    }

    /// Adds extra data registered on the client's ambient scope.
    #[must_use]
    pub fn extra<V: Into<Value>>(self, key: &str, value: V) -> Self {
        self.set_nested("extra", key, value.into())
    }

    /// Replaces the nested client configuration.
    #[must_use]
    pub fn config(self, config: Value) -> Self {
        self.set("config", config)
    }

    /// Sets the DSN the client reports to.
    #[must_use]
    pub fn dsn(self, dsn: &str) -> Self {
        self.set_nested("config", "dsn", dsn.into())
    }

    /// Sets the environment reported with events and used in fingerprints.
    #[must_use]
    pub fn environment(self, environment: &str) -> Self {
        self.set_nested("config", "environment", environment.into())
    }

    /// Enables capturing of panics on the transport's hub.
    #[must_use]
    pub fn capture_panics(self, enabled: bool) -> Self {
        self.set_nested("config", "capturePanics", enabled.into())
    }

    /// Uses the given hub instead of the current one.
    #[must_use]
    pub fn hub(mut self, hub: Arc<Hub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Sets the transport factory the client is created with.
    #[must_use]
    pub fn transport<F: TransportFactory + 'static>(mut self, transport: F) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the callback receiving configuration errors.
    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.error_handler = ErrorHandler::new(handler);
        self
    }
}

impl From<Value> for TransportOptions {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        struct TransportFactory;

        f.debug_struct("TransportOptions")
            .field("value", &self.value)
            .field("hub", &self.hub.as_ref().map(|_| "Hub"))
            .field("transport", &self.transport.as_ref().map(|_| TransportFactory))
            .field("error_handler", &self.error_handler)
            .finish()
    }
}

/// The built-in defaults every option tree is merged over.
///
/// `config.dsn` is read from `SENTRY_DSN` and `config.environment` from
/// `SENTRY_ENVIRONMENT`.
pub fn default_options() -> Value {
    let mut config = json!({
        "dsn": env::var("SENTRY_DSN").unwrap_or_default(),
        "logger": DEFAULT_NAME,
        "capturePanics": false,
    });
    if let Ok(environment) = env::var("SENTRY_ENVIRONMENT") {
        config["environment"] = environment.into();
    }

    json!({
        "config": config,
        "name": DEFAULT_NAME,
        "silent": false,
        "level": "info",
        "levelsMap": {
            "silly": "debug",
            "verbose": "debug",
            "info": "info",
            "debug": "debug",
            "warn": "warning",
            "error": "error",
        },
    })
}
