//! Formatters turn one log record into the single line handed to an
//! [`Append`](crate::Append).
//!
//! Three formatters ship with the crate:
//!
//! * [`FullFormat`] - `Jan  2 15:04:05.000 [INF] [net, tls] message`
//! * [`SimpleFormat`] - `Jan  2 15:04:05.000 [INF] message`
//! * [`MinimalFormat`] - `message`
//!
//! Any `Fn(&Record<'_>) -> String` function can be used as a formatter too.
use {
    chrono::{DateTime, FixedOffset},
    std::fmt::{self, Display},
};

/// Timestamp layout shared by the formatters, e.g. `Jan  2 15:04:05.000`.
const TIME_FORMAT: &str = "%b %e %H:%M:%S%.3f";

/// One log record, as seen by a formatter.
pub struct Record<'a> {
    /// Whether the record was logged at debug level.
    pub debug: bool,
    /// Tags attached to the record, possibly empty.
    pub tags: &'a [String],
    /// When the record was created, in the logger's time zone.
    pub time: DateTime<FixedOffset>,
    /// The message itself.
    pub message: &'a dyn Display,
}

impl Record<'_> {
    fn level(&self) -> &'static str {
        if self.debug {
            "[DBG]"
        } else {
            "[INF]"
        }
    }

    fn timestamp(&self) -> impl Display + '_ {
        self.time.format(TIME_FORMAT)
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("debug", &self.debug)
            .field("tags", &self.tags)
            .field("time", &self.time)
            .field("message", &self.message.to_string())
            .finish()
    }
}

/// Converts a record into the line written by an appender. The line must not
/// end with a newline; appenders add their own.
pub trait Format: Send + Sync {
    fn format(&self, record: &Record<'_>) -> String;
}

impl<F> Format for F
where
    F: Fn(&Record<'_>) -> String + Send + Sync,
{
    fn format(&self, record: &Record<'_>) -> String {
        self(record)
    }
}

/// Time, level, tags and message.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFormat;

impl Format for FullFormat {
    fn format(&self, record: &Record<'_>) -> String {
        if record.tags.is_empty() {
            format!("{} {} {}", record.timestamp(), record.level(), record.message)
        } else {
            format!(
                "{} {} [{}] {}",
                record.timestamp(),
                record.level(),
                record.tags.join(", "),
                record.message
            )
        }
    }
}

/// Time, level and message, without the tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFormat;

impl Format for SimpleFormat {
    fn format(&self, record: &Record<'_>) -> String {
        format!("{} {} {}", record.timestamp(), record.level(), record.message)
    }
}

/// Just the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalFormat;

impl Format for MinimalFormat {
    fn format(&self, record: &Record<'_>) -> String {
        record.message.to_string()
    }
}
