use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use sentry_core::protocol::Map;
use sentry_core::types::Uuid;
use sentry_core::{sentry_debug, Client, Hub, Level};

use crate::config::Config;
use crate::converters::{exception_from_record, message_from_record, ScopeContext};
use crate::options::TransportOptions;
use crate::panic;
use crate::record::LogRecord;

/// What happened to a record handed to [`SentryTransport::log`].
///
/// Every variant means the record was handled; the host pipeline can
/// continue either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// The level did not resolve in the severity map.
    Dropped,
    /// The transport is silent.
    Silenced,
    /// The record was handed to the hub under the given event id.
    ///
    /// The id is nil when the hub has no enabled client.
    Captured(Uuid),
}

/// Forwards log records to a Sentry hub.
///
/// # Examples
///
/// ```
/// use sentry_log_transport::{Dispatch, LogRecord, SentryTransport, TransportOptions};
///
/// let transport = SentryTransport::new(TransportOptions::new().tag("service", "billing"));
///
/// let record = LogRecord::new("trace", "not in the severity map");
/// assert_eq!(transport.log(&record), Dispatch::Dropped);
/// ```
pub struct SentryTransport {
    config: Config,
    hub: Arc<Hub>,
    listeners: Mutex<Vec<Sender<String>>>,
}

impl SentryTransport {
    /// Creates a transport and initializes its hub.
    ///
    /// The hub is the one given in the options, or [`Hub::current`].  It is
    /// bound to a client built from the merged configuration, and the
    /// resolved tags and extra data are registered on its scope once.
    pub fn new(options: TransportOptions) -> Self {
        let config = Config::resolve(&options);
        let TransportOptions {
            hub,
            transport,
            error_handler,
            ..
        } = options;

        let hub = hub.unwrap_or_else(Hub::current);
        let client_options = config.client.to_client_options(transport, &error_handler);
        hub.bind_client(Some(Arc::new(Client::with_options(client_options))));

        if !config.tags.is_empty() || !config.client.extra.is_empty() {
            hub.configure_scope(|scope| {
                for (key, value) in &config.tags {
                    scope.set_tag(key, value);
                }
                for (key, value) in &config.client.extra {
                    scope.set_extra(key, value.clone());
                }
            });
        }

        let hook_installed = config.client.capture_panics && panic::install_hook(hub.clone());

        // `sentry_debug!` prints through the current hub, which may not be
        // the one just bound.
        Hub::run(hub.clone(), || {
            sentry_debug!(
                "[{}] transport initialized with {} level mappings and {} tags",
                config.name,
                config.levels_map.len(),
                config.tags.len()
            );
            if config.client.capture_panics && !hook_installed {
                sentry_debug!(
                    "[{}] panic hook already installed; capturePanics ignored",
                    config.name
                );
            }
        });
        SentryTransport {
            config,
            hub,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The resolved configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The tags attached to every captured event.
    pub fn tags(&self) -> &Map<String, String> {
        &self.config.tags
    }

    /// The hub records are captured on.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Resolves a host level text against the severity map.
    pub fn resolve_level(&self, level: &str) -> Option<(&str, Level)> {
        self.config.levels_map.resolve(level)
    }

    /// Subscribes to `logged` notifications.
    ///
    /// Each captured record sends its resolved level keyword.  Sending
    /// never blocks the caller of [`log`](Self::log); dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> Receiver<String> {
        let (tx, rx) = mpsc::channel();
        self.listeners().push(tx);
        rx
    }

    /// Forwards a single record.
    ///
    /// Records whose level does not resolve are dropped and a silent
    /// transport drops everything; neither touches the hub.  Otherwise the
    /// record is captured within its own scope on a hub forked from the
    /// transport's hub, so concurrent calls never see each other's extras,
    /// user or fingerprint.  It is captured as an exception for the
    /// `error` and `fatal` levels and as a message for all others.
    pub fn log(&self, record: &LogRecord) -> Dispatch {
        let (keyword, level) = match self.resolve_level(&record.level) {
            Some(resolved) => resolved,
            None => return Dispatch::Dropped,
        };
        if self.config.silent {
            return Dispatch::Silenced;
        }

        let context = ScopeContext::from_record(record, level, self.config.environment());
        let logger = &self.config.client.logger;
        // Pushing a scope on the shared hub would race with other threads.
        let hub = Hub::new_from_top(&self.hub);
        let event_id = hub.with_scope(
            |scope| {
                scope.set_level(Some(context.level));
                for (key, value) in &context.extra {
                    scope.set_extra(key, value.clone());
                }
                for (key, value) in &self.config.tags {
                    scope.set_tag(key, value);
                }
                if let Some(ref user) = context.user {
                    scope.set_user(Some(user.clone()));
                }
                if let Some([ref fingerprint, ref environment]) = context.fingerprint {
                    scope.set_fingerprint(Some(&[fingerprint.as_str(), environment.as_str()][..]));
                }
            },
            || {
                let event = if context.is_exception() {
                    exception_from_record(record, context.level, logger)
                } else {
                    message_from_record(record, context.level, logger)
                };
                hub.capture_event(event)
            },
        );

        self.notify(keyword);
        Dispatch::Captured(event_id)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Sender<String>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, keyword: &str) {
        self.listeners()
            .retain(|listener| listener.send(keyword.to_owned()).is_ok());
    }
}

impl fmt::Debug for SentryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentryTransport")
            .field("config", &self.config)
            .field("listeners", &self.listeners().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentry_core::test::TestTransport;
    use serde_json::json;

    fn transport(options: TransportOptions) -> (SentryTransport, Arc<TestTransport>) {
        let events = TestTransport::new();
        let hub = Arc::new(Hub::new(None, Arc::new(Default::default())));
        let options = options
            .dsn("https://public@sentry.invalid/1")
            .hub(hub)
            .transport(events.clone());
        (SentryTransport::new(options), events)
    }

    #[test]
    fn test_unresolved_level_is_dropped() {
        let (transport, events) = transport(TransportOptions::new());
        let logged = transport.subscribe();

        assert_eq!(transport.log(&LogRecord::new("trace", "x")), Dispatch::Dropped);
        assert_eq!(transport.log(&LogRecord::new("ERROR", "x")), Dispatch::Dropped);
        assert!(events.fetch_and_clear_events().is_empty());
        assert!(logged.try_recv().is_err());
    }

    #[test]
    fn test_silent_transport_sends_nothing() {
        let (transport, events) = transport(TransportOptions::new().silent(true));
        let logged = transport.subscribe();

        for level in ["info", "warn", "error", "trace"] {
            let outcome = transport.log(&LogRecord::new(level, "x"));
            assert!(matches!(outcome, Dispatch::Silenced | Dispatch::Dropped));
        }
        assert!(events.fetch_and_clear_events().is_empty());
        assert!(logged.try_recv().is_err());
    }

    #[test]
    fn test_logged_notification() {
        let (transport, _events) = transport(TransportOptions::new());
        let logged = transport.subscribe();

        transport.log(&LogRecord::new("warn", "careful"));
        transport.log(&LogRecord::new("verbose", "chatty"));
        assert_eq!(logged.try_recv().as_deref(), Ok("warn"));
        assert_eq!(logged.try_recv().as_deref(), Ok("verbose"));
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let (transport, _events) = transport(TransportOptions::new());
        drop(transport.subscribe());
        let logged = transport.subscribe();

        transport.log(&LogRecord::new("info", "hello"));
        assert_eq!(transport.listeners().len(), 1);
        assert_eq!(logged.try_recv().as_deref(), Ok("info"));
    }

    #[test]
    fn test_captured_event_id() {
        let (transport, events) = transport(TransportOptions::new());
        let outcome = transport.log(&LogRecord::new("info", "hello"));
        let events = events.fetch_and_clear_events();

        assert_eq!(events.len(), 1);
        assert_eq!(outcome, Dispatch::Captured(events[0].event_id));
    }

    #[test]
    fn test_debug_applies_to_given_hub() {
        let options = TransportOptions::new().config(json!({ "debug": true }));
        let (transport, _events) = transport(options);
        let client = transport.hub().client().unwrap();
        assert!(client.options().debug);
    }
}
