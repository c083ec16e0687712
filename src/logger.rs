use log::kv::{self, Key, Source, VisitSource};
use log::{Level as LogLevel, LevelFilter};
use serde_json::{Map, Value};

use crate::record::LogRecord;
use crate::transport::SentryTransport;

/// A [`log::Log`] that hands every record to a [`SentryTransport`].
///
/// Records are optionally forwarded to a destination logger afterwards.
///
/// # Examples
///
/// ```
/// use sentry_log_transport::{SentryLogger, SentryTransport, TransportOptions};
///
/// let transport = SentryTransport::new(TransportOptions::new());
/// SentryLogger::new(transport).init().ok();
///
/// log::warn!(attempt = 3; "retrying upload");
/// ```
pub struct SentryLogger {
    transport: SentryTransport,
    dest: Option<Box<dyn log::Log>>,
}

impl SentryLogger {
    /// Creates a logger forwarding to `transport` only.
    pub fn new(transport: SentryTransport) -> Self {
        SentryLogger {
            transport,
            dest: None,
        }
    }

    /// Additionally forwards every record to `dest`.
    #[must_use]
    pub fn with_dest<L: log::Log + 'static>(mut self, dest: L) -> Self {
        self.dest = Some(Box::new(dest));
        self
    }

    /// Uses an env logger as destination.
    ///
    /// Without an explicit logger one is built from the environment.
    #[cfg(feature = "env_logger")]
    #[must_use]
    pub fn with_env_logger_dest(self, logger: Option<env_logger::Logger>) -> Self {
        let logger = logger
            .unwrap_or_else(|| env_logger::Builder::from_env(env_logger::Env::default()).build());
        self.with_dest(logger)
    }

    /// The transport records are handed to.
    pub fn transport(&self) -> &SentryTransport {
        &self.transport
    }

    /// The most verbose filter any record could pass.
    ///
    /// This is the most verbose `log` level whose name resolves in the
    /// severity map, or everything when a destination logger is set.
    pub fn effective_filter(&self) -> LevelFilter {
        let own = [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ]
        .into_iter()
        .find(|level| self.resolves(*level))
        .map_or(LevelFilter::Off, |level| level.to_level_filter());
        std::cmp::max(own, self.dest_filter())
    }

    /// Installs this logger as the global logger.
    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let filter = self.effective_filter();
        log::set_boxed_logger(Box::new(self)).map(|()| log::set_max_level(filter))
    }

    fn dest_filter(&self) -> LevelFilter {
        match self.dest {
            Some(_) => LevelFilter::Trace,
            None => LevelFilter::Off,
        }
    }

    fn resolves(&self, level: LogLevel) -> bool {
        self.transport.resolve_level(&level_text(level)).is_some()
    }
}

impl log::Log for SentryLogger {
    fn enabled(&self, md: &log::Metadata<'_>) -> bool {
        self.resolves(md.level()) || self.dest.as_ref().map_or(false, |dest| dest.enabled(md))
    }

    fn log(&self, record: &log::Record<'_>) {
        self.transport.log(&record_from_log(record));
        if let Some(ref dest) = self.dest {
            if dest.enabled(record.metadata()) {
                dest.log(record);
            }
        }
    }

    fn flush(&self) {
        if let Some(ref dest) = self.dest {
            dest.flush();
        }
    }
}

fn level_text(level: LogLevel) -> String {
    level.as_str().to_ascii_lowercase()
}

/// Converts a [`log::Record`] into a [`LogRecord`].
///
/// The level name is lowercased so it matches the severity map, and
/// structured key-values become metadata.
pub fn record_from_log(record: &log::Record<'_>) -> LogRecord {
    let mut visitor = MetaVisitor(Map::new());
    // the visitor never fails
    let _ = Source::visit(record.key_values(), &mut visitor);

    LogRecord {
        level: level_text(record.level()),
        message: record.args().to_string(),
        meta: visitor.0,
        ..Default::default()
    }
}

struct MetaVisitor(Map<String, Value>);

impl<'kvs> VisitSource<'kvs> for MetaVisitor {
    fn visit_pair(&mut self, key: Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        self.0.insert(key.as_str().to_owned(), convert_value(&value));
        Ok(())
    }
}

fn convert_value(value: &kv::Value<'_>) -> Value {
    if let Some(b) = value.to_bool() {
        b.into()
    } else if let Some(i) = value.to_i64() {
        i.into()
    } else if let Some(u) = value.to_u64() {
        u.into()
    } else if let Some(f) = value.to_f64() {
        f.into()
    } else if let Some(s) = value.to_borrowed_str() {
        s.into()
    } else {
        value.to_string().into()
    }
}
