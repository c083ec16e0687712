use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Fields owned by the host pipeline; never forwarded as metadata.
const PIPELINE_FIELDS: &[&str] = &["level", "message", "label"];

/// Type tags that mark a record as carrying an error.
const ERROR_KINDS: &[&str] = &["Error", "Exception", "DOMException"];

/// A single record handed over by the host pipeline.
///
/// Only `level` and `message` are required; everything else the pipeline
/// knows about the record lives in `meta`.
#[derive(Clone, Default)]
pub struct LogRecord {
    /// The host level text, e.g. `"info"` or a colorized variant of it.
    pub level: String,
    /// The message text.
    pub message: String,
    /// Arbitrary metadata.  `fingerprint`, `user` and `stack` have special
    /// meaning.
    pub meta: Map<String, Value>,
    /// The native error this record was logged for, if any.
    pub error: Option<Arc<dyn Error + Send + Sync + 'static>>,
    /// A type tag such as `"Error"` for records that describe an error
    /// without carrying one.
    pub kind: Option<String>,
}

impl LogRecord {
    /// Creates a record with the given level and message.
    pub fn new<L: Into<String>, M: Into<String>>(level: L, message: M) -> Self {
        LogRecord {
            level: level.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Builds a record from a JSON object.
    ///
    /// `level` and `message` are lifted out as text and a string `type`
    /// becomes the record's type tag.  All other keys end up in `meta`.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use sentry_log_transport::LogRecord;
    ///
    /// let record = LogRecord::from_value(json!({
    ///     "level": "warn",
    ///     "message": "disk almost full",
    ///     "free": 12,
    /// }));
    /// assert_eq!(record.level, "warn");
    /// assert_eq!(record.meta["free"], 12);
    /// ```
    pub fn from_value(value: Value) -> Self {
        let mut meta = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let text = |value: Option<Value>| match value {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let level = text(meta.remove("level"));
        let message = text(meta.remove("message"));
        let kind = match meta.remove("type") {
            Some(Value::String(kind)) => Some(kind),
            Some(other) => {
                meta.insert("type".into(), other);
                None
            }
            None => None,
        };
        LogRecord {
            level,
            message,
            meta,
            error: None,
            kind,
        }
    }

    /// Attaches a metadata field.
    #[must_use]
    pub fn with_meta<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Attaches the error this record was logged for.
    #[must_use]
    pub fn with_error<E: Error + Send + Sync + 'static>(mut self, error: E) -> Self {
        self.error = Some(Arc::new(error));
        self
    }

    /// Sets the type tag of the record.
    #[must_use]
    pub fn with_kind<K: Into<String>>(mut self, kind: K) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// The metadata with the pipeline's own fields removed.
    pub fn metadata(&self) -> Map<String, Value> {
        without(&self.meta, PIPELINE_FIELDS)
    }

    /// The record's fingerprint, if it has a non-empty one.
    pub fn fingerprint(&self) -> Option<String> {
        self.meta.get("fingerprint").filter(|v| is_truthy(v)).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

impl fmt::Debug for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRecord")
            .field("level", &self.level)
            .field("message", &self.message)
            .field("meta", &self.meta)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .field("kind", &self.kind)
            .finish()
    }
}

/// Checks whether a record already is an error.
///
/// That is the case when it carries a native error, or when its type tag
/// is one of `Error`, `Exception` or `DOMException`.
pub fn is_error(record: &LogRecord) -> bool {
    record.error.is_some()
        || record
            .kind
            .as_deref()
            .map_or(false, |kind| ERROR_KINDS.contains(&kind))
}

/// Copies `map` without the given keys.
pub(crate) fn without(map: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| !keys.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Whether a metadata value counts as set.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
