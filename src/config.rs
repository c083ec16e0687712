use std::borrow::Cow;
use std::sync::Arc;

use sentry_core::protocol::Map as TagMap;
use sentry_core::types::Dsn;
use sentry_core::{ClientOptions, Level, TransportFactory};
use serde_json::{Map, Value};

use crate::error::{ErrorHandler, TransportError};
use crate::merge::{defaults_deep, fill_missing};
use crate::options::{default_options, TransportOptions, DEFAULT_NAME};

/// Ordered table translating host level keywords to Sentry levels.
///
/// Lookup is by containment: the first keyword (in declaration order) that
/// occurs anywhere in the record's level text wins.  A level text holding
/// two keywords therefore resolves to whichever was declared first, so
/// `"verbose-error"` maps through `verbose` with the default table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelsMap(Vec<(String, Level)>);

impl LevelsMap {
    /// Finds the first entry whose keyword is contained in `level`.
    pub fn resolve(&self, level: &str) -> Option<(&str, Level)> {
        self.0
            .iter()
            .find(|(keyword, _)| level.contains(keyword.as_str()))
            .map(|(keyword, level)| (keyword.as_str(), *level))
    }

    /// Iterates over the entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Level)> {
        self.0.iter().map(|(keyword, level)| (keyword.as_str(), *level))
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_json(map: &Map<String, Value>, errors: &ErrorHandler) -> Self {
        let mut entries = Vec::with_capacity(map.len());
        for (keyword, value) in map {
            match value.as_str().and_then(|v| v.parse::<Level>().ok()) {
                Some(level) => entries.push((keyword.clone(), level)),
                None => errors.report(&TransportError::InvalidLevel {
                    keyword: keyword.clone(),
                    value: value.to_string(),
                }),
            }
        }
        LevelsMap(entries)
    }
}

impl<K: Into<String>> FromIterator<(K, Level)> for LevelsMap {
    fn from_iter<I: IntoIterator<Item = (K, Level)>>(iter: I) -> Self {
        LevelsMap(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The nested client configuration (`config` in the option tree).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientConfig {
    /// The DSN; empty leaves the client disabled.
    pub dsn: String,
    /// The logger name reported on every event.
    pub logger: String,
    /// The deployment environment, also used for fingerprints.
    pub environment: Option<String>,
    /// The release reported with events.
    pub release: Option<String>,
    /// The server name reported with events.
    pub server_name: Option<String>,
    /// Prints client diagnostics to stderr.
    pub debug: bool,
    /// Event sample rate.
    pub sample_rate: Option<f32>,
    /// Maximum number of breadcrumbs kept by the client.
    pub max_breadcrumbs: Option<usize>,
    /// Attaches stacktraces to message events.
    pub attach_stacktrace: bool,
    /// Captures panics as fatal events.
    pub capture_panics: bool,
    /// Tags given in the client configuration.
    pub tags: Option<Map<String, Value>>,
    /// Extra data registered on the ambient scope.
    pub extra: Map<String, Value>,
}

impl ClientConfig {
    fn from_json(config: &Map<String, Value>) -> Self {
        ClientConfig {
            dsn: string(config, "dsn").unwrap_or_default(),
            logger: string(config, "logger").unwrap_or_else(|| DEFAULT_NAME.into()),
            environment: string(config, "environment"),
            release: string(config, "release"),
            server_name: string(config, "serverName"),
            debug: boolean(config, "debug").unwrap_or(false),
            sample_rate: config
                .get("sampleRate")
                .and_then(Value::as_f64)
                .filter(|rate| (0.0..=1.0).contains(rate))
                .map(|rate| rate as f32),
            max_breadcrumbs: config
                .get("maxBreadcrumbs")
                .and_then(Value::as_u64)
                .map(|max| max as usize),
            attach_stacktrace: boolean(config, "attachStacktrace").unwrap_or(false),
            capture_panics: boolean(config, "capturePanics").unwrap_or(false),
            tags: object(config, "tags").cloned(),
            extra: object(config, "extra").cloned().unwrap_or_default(),
        }
    }

    /// Builds the options the Sentry client is initialized with.
    ///
    /// A DSN that does not parse is reported and the client is left without
    /// one, which disables sending.
    pub fn to_client_options(
        &self,
        transport: Option<Arc<dyn TransportFactory>>,
        errors: &ErrorHandler,
    ) -> ClientOptions {
        let dsn = if self.dsn.is_empty() {
            None
        } else {
            match self.dsn.parse::<Dsn>() {
                Ok(dsn) => Some(dsn),
                Err(err) => {
                    errors.report(&TransportError::from(err));
                    None
                }
            }
        };

        let defaults = ClientOptions::default();
        ClientOptions {
            dsn,
            debug: self.debug,
            environment: self.environment.clone().map(Cow::Owned),
            release: self.release.clone().map(Cow::Owned),
            server_name: self.server_name.clone().map(Cow::Owned),
            sample_rate: self.sample_rate.unwrap_or(defaults.sample_rate),
            max_breadcrumbs: self.max_breadcrumbs.unwrap_or(defaults.max_breadcrumbs),
            attach_stacktrace: self.attach_stacktrace,
            transport,
            ..defaults
        }
    }
}

/// The fully resolved transport configuration.
///
/// Created once per transport and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Display name of the transport.
    pub name: String,
    /// Suppresses all forwarding.
    pub silent: bool,
    /// Minimum level.  Not applied by the transport; the host pipeline is
    /// expected to filter before handing records over.
    pub level: String,
    /// The severity map.
    pub levels_map: LevelsMap,
    /// Tags attached to every captured event.
    pub tags: TagMap<String, String>,
    /// The nested client configuration.
    pub client: ClientConfig,
}

impl Config {
    /// Merges the caller's options over the built-in defaults.
    ///
    /// Malformed values never fail the merge: a value of the wrong type is
    /// replaced by the default at the same path.
    pub fn resolve(options: &TransportOptions) -> Config {
        Self::from_value(options.value(), &options.error_handler)
    }

    pub(crate) fn from_value(mut value: Value, errors: &ErrorHandler) -> Config {
        let defaults = default_options();
        defaults_deep(&mut value, &defaults);

        let root = value.as_object().cloned().unwrap_or_default();
        let fallback = |key: &str| defaults.get(key).cloned().unwrap_or(Value::Null);

        let mut client = match root.get("config") {
            Some(Value::Object(config)) => ClientConfig::from_json(config),
            _ => ClientConfig::from_json(fallback("config").as_object().unwrap_or(&Map::new())),
        };

        if let Some(extra) = object(&root, "extra") {
            fill_missing(&mut client.extra, extra);
        }

        let levels_map = match object(&root, "levelsMap") {
            Some(map) => LevelsMap::from_json(map, errors),
            None => LevelsMap::from_json(
                fallback("levelsMap").as_object().unwrap_or(&Map::new()),
                errors,
            ),
        };

        let tags = non_empty(object(&root, "tags"))
            .or_else(|| non_empty(object(&root, "globalTags")))
            .or(client.tags.as_ref())
            .map(stringify_tags)
            .unwrap_or_default();

        Config {
            name: string(&root, "name").unwrap_or_else(|| DEFAULT_NAME.into()),
            silent: boolean(&root, "silent").unwrap_or(false),
            level: string(&root, "level").unwrap_or_else(|| "info".into()),
            levels_map,
            tags,
            client,
        }
    }

    /// The environment used as second fingerprint component.
    pub fn environment(&self) -> &str {
        self.client.environment.as_deref().unwrap_or("")
    }
}

fn string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn boolean(map: &Map<String, Value>, key: &str) -> Option<bool> {
    map.get(key).and_then(Value::as_bool)
}

fn object<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

fn non_empty(map: Option<&Map<String, Value>>) -> Option<&Map<String, Value>> {
    map.filter(|map| !map.is_empty())
}

/// Tag values are strings in Sentry; anything else is stringified.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn stringify_tags(tags: &Map<String, Value>) -> TagMap<String, String> {
    tags.iter()
        .map(|(key, value)| (key.clone(), stringify(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn resolve(value: Value) -> Config {
        Config::resolve(&TransportOptions::from_value(value))
    }

    #[test]
    fn test_defaults() {
        let config = resolve(json!({}));
        assert_eq!(config.name, DEFAULT_NAME);
        assert!(!config.silent);
        assert_eq!(config.level, "info");
        assert_eq!(config.client.logger, DEFAULT_NAME);
        assert!(!config.client.capture_panics);
        assert!(config.tags.is_empty());

        let entries: Vec<_> = config.levels_map.iter().collect();
        assert_eq!(
            entries,
            [
                ("silly", Level::Debug),
                ("verbose", Level::Debug),
                ("info", Level::Info),
                ("debug", Level::Debug),
                ("warn", Level::Warning),
                ("error", Level::Error),
            ]
        );
    }

    #[test]
    fn test_tag_priority() {
        let config = resolve(json!({
            "tags": { "a": 1 },
            "globalTags": { "b": 2 },
            "config": { "tags": { "c": 3 } },
        }));
        assert_eq!(config.tags.len(), 1);
        assert_eq!(config.tags["a"], "1");
    }

    #[test]
    fn test_tag_fallbacks() {
        let config = resolve(json!({
            "tags": {},
            "globalTags": { "b": "two" },
            "config": { "tags": { "c": 3 } },
        }));
        assert_eq!(config.tags.keys().collect::<Vec<_>>(), ["b"]);

        let config = resolve(json!({ "config": { "tags": { "c": true } } }));
        assert_eq!(config.tags["c"], "true");
    }

    #[test]
    fn test_extra_fills_gaps() {
        let config = resolve(json!({
            "extra": { "x": 2, "y": 3 },
            "config": { "extra": { "x": 1 } },
        }));
        assert_eq!(Value::Object(config.client.extra), json!({ "x": 1, "y": 3 }));
    }

    #[test]
    fn test_extra_without_config_extra() {
        let config = resolve(json!({ "extra": { "y": 3 } }));
        assert_eq!(Value::Object(config.client.extra), json!({ "y": 3 }));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = resolve(json!({
            "silent": "yes",
            "name": 12,
            "config": "not an object",
            "levelsMap": [],
        }));
        assert!(!config.silent);
        assert_eq!(config.name, DEFAULT_NAME);
        assert_eq!(config.client.logger, DEFAULT_NAME);
        assert_eq!(config.levels_map.len(), 6);
    }

    #[test]
    fn test_custom_levels_come_first() {
        let config = resolve(json!({ "levelsMap": { "crit": "fatal", "info": "warning" } }));
        assert_eq!(config.levels_map.resolve("crit"), Some(("crit", Level::Fatal)));
        assert_eq!(config.levels_map.resolve("info"), Some(("info", Level::Warning)));
        assert_eq!(config.levels_map.len(), 7);
    }

    #[test]
    fn test_invalid_level_is_reported() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let options = TransportOptions::from_value(json!({ "levelsMap": { "trace": "chatty" } }))
            .error_handler(move |err| sink.lock().unwrap().push(err.to_string()));
        let config = Config::resolve(&options);

        assert_eq!(config.levels_map.resolve("trace"), None);
        let reported = reported.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].contains("chatty"));
    }

    #[test]
    fn test_resolve_is_substring_first_match() {
        let config = resolve(json!({}));
        assert_eq!(config.levels_map.resolve("verbose-error").map(|x| x.0), Some("verbose"));
        assert_eq!(config.levels_map.resolve("\u{1b}[31merror\u{1b}[39m").map(|x| x.0), Some("error"));
        assert_eq!(config.levels_map.resolve("ERROR"), None);
        assert_eq!(config.levels_map.resolve("trace"), None);
    }

    #[test]
    fn test_client_options() {
        let config = resolve(json!({
            "config": {
                "dsn": "https://public@sentry.invalid/1",
                "environment": "staging",
                "release": "app@1.0.0",
                "sampleRate": 0.5,
                "maxBreadcrumbs": 10,
            },
        }));
        let options = config.client.to_client_options(None, &ErrorHandler::default());
        assert!(options.dsn.is_some());
        assert_eq!(options.environment.as_deref(), Some("staging"));
        assert_eq!(options.release.as_deref(), Some("app@1.0.0"));
        assert_eq!(options.sample_rate, 0.5);
        assert_eq!(options.max_breadcrumbs, 10);
        assert_eq!(config.environment(), "staging");
    }

    #[test]
    fn test_invalid_dsn_is_reported() {
        let reported = Arc::new(Mutex::new(0));
        let sink = reported.clone();
        let errors = ErrorHandler::new(move |err| {
            assert!(matches!(err, TransportError::InvalidDsn(_)));
            *sink.lock().unwrap() += 1;
        });
        let config = Config::from_value(json!({ "config": { "dsn": "not a dsn" } }), &errors);
        let options = config.client.to_client_options(None, &errors);
        assert!(options.dsn.is_none());
        assert_eq!(*reported.lock().unwrap(), 1);
    }
}
