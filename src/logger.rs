//! The logger front end: debug filtering, formatting and dispatch to an
//! appender, plus a [`Registry`] of named loggers.
use {
    crate::{
        append::{Append, AppendError, StderrAppender},
        format::{Format, Record, SimpleFormat},
    },
    chrono::{DateTime, FixedOffset, Utc},
    std::{
        collections::{HashMap, HashSet},
        fmt::{self, Display},
        io,
        sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    },
};

/// Name the registry uses for an empty logger name.
pub const DEFAULT_LOGGER_NAME: &str = "_default";

/// Specifies the time zone used for record timestamps.
///
/// # Examples
/// ```
/// use rollinglog::TimeZone;
/// use chrono::FixedOffset;
///
/// // Use UTC time for global deployments
/// let utc = TimeZone::UTC;
///
/// // Use local system time zone (changes with system settings)
/// let local = TimeZone::Local;
///
/// // Use a fixed offset for a specific region (e.g., UTC+8 for China)
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub enum TimeZone {
    /// Use UTC time zone.
    UTC,
    /// Use the system's local time zone, looked up for every record.
    #[default]
    Local,
    /// Use a fixed time zone offset.
    Fix(FixedOffset),
}

impl TimeZone {
    fn now(&self) -> DateTime<FixedOffset> {
        match self {
            TimeZone::UTC => Utc::now().fixed_offset(),
            TimeZone::Local => chrono::Local::now().fixed_offset(),
            TimeZone::Fix(offset) => Utc::now().with_timezone(offset),
        }
    }
}

struct LoggerConfig {
    debug: bool,
    debug_tags: HashSet<String>,
    tags: Vec<String>,
    time_zone: TimeZone,
    formatter: Arc<dyn Format>,
    appender: Option<Arc<dyn Append>>,
}

impl LoggerConfig {
    fn debug_enabled_for<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        self.debug || tags.iter().any(|tag| self.debug_tags.contains(tag.as_ref()))
    }
}

/// Formats records and hands them to an appender.
///
/// Info records are always written. Debug records are written when debug mode
/// is on globally, or when one of the record's tags has debug mode enabled.
/// A logger without an appender ignores every record.
///
/// ```
/// use rollinglog::{ArrayAppender, Logger, MinimalFormat};
/// use std::sync::Arc;
///
/// let entries = Arc::new(ArrayAppender::new());
/// let logger = Logger::new();
/// logger.configure(MinimalFormat, entries.clone());
///
/// logger.tag_debug(&["red", "blue"], "hidden")?;
/// logger.enable_debug_mode_for("red");
/// logger.tag_debug(&["red", "blue"], format_args!("two {}", "formatted"))?;
/// logger.tag_debug(&["yellow"], "hidden")?;
///
/// assert_eq!(entries.entries(), vec!["two formatted"]);
/// # Ok::<(), rollinglog::AppendError>(())
/// ```
pub struct Logger {
    config: RwLock<LoggerConfig>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// A logger with debug mode off, [`SimpleFormat`], the local time zone
    /// and no appender.
    pub fn new() -> Self {
        Logger {
            config: RwLock::new(LoggerConfig {
                debug: false,
                debug_tags: HashSet::new(),
                tags: Vec::new(),
                time_zone: TimeZone::default(),
                formatter: Arc::new(SimpleFormat),
                appender: None,
            }),
        }
    }

    /// Set the formatter and the appender.
    pub fn configure<F, A>(&self, formatter: F, appender: A)
    where
        F: Format + 'static,
        A: Append + 'static,
    {
        let mut config = self.config_write();
        config.formatter = Arc::new(formatter);
        config.appender = Some(Arc::new(appender));
    }

    /// Set the formatter, keeping the appender.
    pub fn set_formatter<F: Format + 'static>(&self, formatter: F) {
        self.config_write().formatter = Arc::new(formatter);
    }

    /// Set the appender, keeping the formatter.
    pub fn set_appender<A: Append + 'static>(&self, appender: A) {
        self.config_write().appender = Some(Arc::new(appender));
    }

    /// Drop the appender; records are ignored until a new one is set.
    pub fn remove_appender(&self) {
        self.config_write().appender = None;
    }

    /// Tags attached to records logged without explicit tags.
    pub fn set_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config_write().tags = tags.into_iter().map(Into::into).collect();
    }

    pub fn set_time_zone(&self, time_zone: TimeZone) {
        self.config_write().time_zone = time_zone;
    }

    /// Turn debug mode on for every record.
    pub fn enable_debug_mode(&self) {
        self.config_write().debug = true;
    }

    /// Turn global debug mode off. Tags enabled one by one stay enabled.
    pub fn disable_debug_mode(&self) {
        self.config_write().debug = false;
    }

    /// Turn debug mode on for records carrying `tag`.
    pub fn enable_debug_mode_for(&self, tag: impl Into<String>) {
        self.config_write().debug_tags.insert(tag.into());
    }

    pub fn disable_debug_mode_for(&self, tag: &str) {
        self.config_write().debug_tags.remove(tag);
    }

    /// Turn debug mode off globally and for every tag.
    pub fn disable_debug_mode_all(&self) {
        let mut config = self.config_write();
        config.debug = false;
        config.debug_tags.clear();
    }

    pub fn is_debug_mode(&self) -> bool {
        self.config_read().debug
    }

    /// Whether a debug record tagged with `tag` would be written.
    pub fn is_debug_mode_for(&self, tag: &str) -> bool {
        self.config_read().debug_enabled_for(&[tag])
    }

    /// Log an info record with the logger's default tags.
    pub fn print(&self, message: impl Display) -> Result<(), AppendError> {
        self.log(false, None, &message)
    }

    /// Log a debug record with the logger's default tags.
    pub fn debug(&self, message: impl Display) -> Result<(), AppendError> {
        self.log(true, None, &message)
    }

    /// Log an info record with the given tags.
    pub fn tag_print(&self, tags: &[&str], message: impl Display) -> Result<(), AppendError> {
        self.log(false, Some(tags), &message)
    }

    /// Log a debug record with the given tags.
    pub fn tag_debug(&self, tags: &[&str], message: impl Display) -> Result<(), AppendError> {
        self.log(true, Some(tags), &message)
    }

    fn log(&self, debug: bool, tags: Option<&[&str]>, message: &dyn Display) -> Result<(), AppendError> {
        let (appender, entry) = {
            let config = self.config_read();
            let Some(appender) = config.appender.clone() else {
                return Ok(());
            };

            let owned_tags: Vec<String>;
            let tags: &[String] = match tags {
                Some(tags) => {
                    if debug && !config.debug_enabled_for(tags) {
                        return Ok(());
                    }
                    owned_tags = tags.iter().map(|tag| tag.to_string()).collect();
                    &owned_tags
                }
                None => {
                    if debug && !config.debug_enabled_for(config.tags.as_slice()) {
                        return Ok(());
                    }
                    &config.tags
                }
            };

            let record = Record {
                debug,
                tags,
                time: config.time_zone.now(),
                message,
            };
            (appender, config.formatter.format(&record))
        };

        // The lock is released so appenders may reconfigure the logger.
        appender.append(&entry)
    }

    fn config_read(&self) -> RwLockReadGuard<'_, LoggerConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn config_write(&self) -> RwLockWriteGuard<'_, LoggerConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config_read();
        f.debug_struct("Logger")
            .field("debug", &config.debug)
            .field("debug_tags", &config.debug_tags)
            .field("tags", &config.tags)
            .field("time_zone", &config.time_zone)
            .field("has_appender", &config.appender.is_some())
            .finish()
    }
}

/// Every write becomes one info record, so the logger can back anything that
/// writes to an [`io::Write`]. A trailing line break is trimmed.
impl io::Write for &Logger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let message = String::from_utf8_lossy(buf);
        let message = message.trim_end_matches(|c| c == '\n' || c == '\r');
        self.print(message).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for Logger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut this: &Logger = self;
        this.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Named loggers, created on first use.
///
/// ```
/// use rollinglog::{ArrayAppender, FullFormat, Registry};
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// let entries = Arc::new(ArrayAppender::new());
/// registry.configure_logger("http", true, vec!["http".into()], FullFormat, entries.clone());
///
/// registry.get_logger("http").debug("request received")?;
/// assert!(entries.entries()[0].ends_with("[DBG] [http] request received"));
/// # Ok::<(), rollinglog::AppendError>(())
/// ```
#[derive(Default)]
pub struct Registry {
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The logger registered under `name`, created with [`SimpleFormat`] and
    /// [`StderrAppender`] if there is none yet. An empty name means
    /// [`DEFAULT_LOGGER_NAME`].
    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        let name = Self::normalize(name);
        if let Some(logger) = self.read().get(name) {
            return logger.clone();
        }

        self.write()
            .entry(name.to_owned())
            .or_insert_with(|| {
                tracing::debug!(logger = name, "creating logger");
                let logger = Logger::new();
                logger.set_appender(StderrAppender);
                Arc::new(logger)
            })
            .clone()
    }

    pub fn default_logger(&self) -> Arc<Logger> {
        self.get_logger(DEFAULT_LOGGER_NAME)
    }

    /// Create or reconfigure the logger registered under `name`.
    pub fn configure_logger<F, A>(
        &self,
        name: &str,
        debug: bool,
        tags: Vec<String>,
        formatter: F,
        appender: A,
    ) -> Arc<Logger>
    where
        F: Format + 'static,
        A: Append + 'static,
    {
        let logger = self.get_logger(name);
        {
            let mut config = logger.config_write();
            config.debug = debug;
            config.tags = tags;
            config.formatter = Arc::new(formatter);
            config.appender = Some(Arc::new(appender));
        }
        let debug_mode = debug;
        tracing::debug!(logger = Self::normalize(name), debug_mode, "configured logger");
        logger
    }

    /// Forget the logger registered under `name`. Handles already given out
    /// keep working.
    pub fn remove(&self, name: &str) -> Option<Arc<Logger>> {
        self.write().remove(Self::normalize(name))
    }

    /// Names of the registered loggers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn normalize(name: &str) -> &str {
        if name.is_empty() {
            DEFAULT_LOGGER_NAME
        } else {
            name
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Logger>>> {
        self.loggers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Logger>>> {
        self.loggers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("loggers", &self.names()).finish()
    }
}
