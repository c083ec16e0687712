use sentry_core::protocol::{Event, Exception, Map as ExtraMap, Value};
use sentry_core::{event_from_error, Level, User};

use crate::record::{is_error, is_truthy, without, LogRecord};

/// Metadata fields that are not forwarded as extra data.
const RESERVED_FIELDS: &[&str] = &["user", "stack"];

/// Everything attached to the scope a single record is captured in.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeContext {
    /// The mapped Sentry level.
    pub level: Level,
    /// Metadata forwarded as extra data.
    pub extra: ExtraMap<String, Value>,
    /// `[fingerprint, environment]`, if the record has a fingerprint.
    pub fingerprint: Option<[String; 2]>,
    /// The user the record was logged for.
    pub user: Option<User>,
}

impl ScopeContext {
    /// Builds the context for `record`.
    ///
    /// `environment` becomes the second fingerprint component.
    pub fn from_record(record: &LogRecord, level: Level, environment: &str) -> Self {
        let meta = record.metadata();
        ScopeContext {
            level,
            extra: without(&meta, RESERVED_FIELDS).into_iter().collect(),
            fingerprint: record
                .fingerprint()
                .map(|fingerprint| [fingerprint, environment.to_owned()]),
            user: meta.get("user").filter(|v| is_truthy(v)).map(user_from_value),
        }
    }

    /// Whether records with this context are captured as exceptions.
    pub fn is_exception(&self) -> bool {
        matches!(self.level, Level::Error | Level::Fatal)
    }
}

/// Converts the `user` metadata field into a Sentry [`User`].
///
/// Objects are read with the usual user fields (unknown ones are kept as
/// additional data); any other value becomes the user id.
pub fn user_from_value(value: &Value) -> User {
    match value {
        Value::Object(map) => serde_json::from_value(value.clone()).unwrap_or_else(|_| User {
            other: map.clone().into_iter().collect(),
            ..Default::default()
        }),
        Value::String(id) => User {
            id: Some(id.clone()),
            ..Default::default()
        },
        other => User {
            id: Some(other.to_string()),
            ..Default::default()
        },
    }
}

/// Creates a message [`Event`] for a record.
pub fn message_from_record(record: &LogRecord, level: Level, logger: &str) -> Event<'static> {
    Event {
        logger: Some(logger.to_owned()),
        level,
        message: Some(record.message.clone()),
        ..Default::default()
    }
}

/// Creates an exception [`Event`] for a record.
///
/// A record carrying a native error is reported through that error,
/// including its source chain.  A record tagged as an error is reported
/// under its tag; anything else is wrapped into a new generic `Error`
/// holding the message text.
pub fn exception_from_record(record: &LogRecord, level: Level, logger: &str) -> Event<'static> {
    let mut event = match record.error {
        Some(ref error) if is_error(record) => event_from_error(&**error),
        _ => {
            let ty = match record.kind {
                Some(ref kind) if is_error(record) => kind.clone(),
                _ => "Error".to_owned(),
            };
            Event {
                exception: vec![Exception {
                    ty,
                    value: Some(record.message.clone()),
                    ..Default::default()
                }]
                .into(),
                ..Default::default()
            }
        }
    };
    event.logger = Some(logger.to_owned());
    event.level = level;
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fmt;

    #[derive(Debug)]
    struct DiskFull;

    impl fmt::Display for DiskFull {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("no space left on device")
        }
    }

    impl std::error::Error for DiskFull {}

    #[test]
    fn test_context_strips_user_and_stack() {
        let record = LogRecord::new("info", "hi")
            .with_meta("user", json!({ "id": "7" }))
            .with_meta("stack", "at main")
            .with_meta("label", "svc")
            .with_meta("attempt", 2);
        let context = ScopeContext::from_record(&record, Level::Info, "prod");

        assert_eq!(context.extra.len(), 1);
        assert_eq!(context.extra["attempt"], 2);
        assert_eq!(context.user.as_ref().unwrap().id.as_deref(), Some("7"));
        assert_eq!(context.fingerprint, None);
        assert!(!context.is_exception());
    }

    #[test]
    fn test_fingerprint_pairs_with_environment() {
        let record = LogRecord::new("warn", "slow").with_meta("fingerprint", "xyz");
        let context = ScopeContext::from_record(&record, Level::Warning, "staging");
        assert_eq!(
            context.fingerprint,
            Some(["xyz".to_owned(), "staging".to_owned()])
        );
        assert_eq!(context.extra["fingerprint"], "xyz");
    }

    #[test]
    fn test_user_from_value() {
        let user = user_from_value(&json!({ "email": "a@b.c", "plan": "pro" }));
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
        assert_eq!(user.other["plan"], "pro");

        assert_eq!(user_from_value(&json!("u-1")).id.as_deref(), Some("u-1"));
        assert_eq!(user_from_value(&json!(42)).id.as_deref(), Some("42"));
    }

    #[test]
    fn test_exception_wraps_message() {
        let record = LogRecord::new("error", "boom");
        let event = exception_from_record(&record, Level::Error, "app");
        assert_eq!(event.exception.len(), 1);
        assert_eq!(event.exception[0].ty, "Error");
        assert_eq!(event.exception[0].value.as_deref(), Some("boom"));
        assert_eq!(event.logger.as_deref(), Some("app"));
        assert!(event.message.is_none());
    }

    #[test]
    fn test_exception_uses_native_error() {
        let record = LogRecord::new("error", "write failed").with_error(DiskFull);
        let event = exception_from_record(&record, Level::Fatal, "app");
        assert_eq!(event.exception[0].ty, "DiskFull");
        assert_eq!(
            event.exception[0].value.as_deref(),
            Some("no space left on device")
        );
        assert_eq!(event.level, Level::Fatal);
        assert!(event.message.is_none());
    }

    #[test]
    fn test_exception_uses_type_tag() {
        let record = LogRecord::new("error", "bad state").with_kind("Exception");
        let event = exception_from_record(&record, Level::Error, "app");
        assert_eq!(event.exception[0].ty, "Exception");
    }

    #[test]
    fn test_message_event() {
        let record = LogRecord::new("info", "started");
        let event = message_from_record(&record, Level::Info, "app");
        assert_eq!(event.message.as_deref(), Some("started"));
        assert!(event.exception.is_empty());
    }
}
