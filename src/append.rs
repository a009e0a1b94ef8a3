//! Appenders write formatted log lines to a destination.
//!
//! Everything that can receive a line implements [`Append`]: the console
//! appenders, the in-memory [`ArrayAppender`], the
//! [`RollingFileAppender`](crate::RollingFileAppender), and the composition
//! helpers [`BranchingAppender`] and [`TestInjector`], which wrap other
//! appenders.
use {
    crate::RollingError,
    regex::Regex,
    std::{
        collections::BTreeMap,
        fmt,
        io::{self, Write as _},
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
};

/// A destination for log lines.
///
/// `entry` is one formatted record without a trailing newline; appenders that
/// write to a stream add their own.
pub trait Append: Send + Sync {
    fn append(&self, entry: &str) -> Result<(), AppendError>;
}

impl<A: Append + ?Sized> Append for Arc<A> {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        (**self).append(entry)
    }
}

impl<A: Append + ?Sized> Append for Box<A> {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        (**self).append(entry)
    }
}

impl Append for crate::RollingFileAppender {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        Ok(self.log(entry)?)
    }
}

/// Errors returned by appenders.
#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error(transparent)]
    Rolling(#[from] RollingError),
    #[error("Failed to write log entry: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Branching(#[from] BranchingError),
    /// The appender refused the entry; the entry is the message.
    #[error("{0}")]
    Rejected(String),
    /// Raised on purpose by a [`TestInjection`].
    #[error("Injected failure: {0}")]
    Injected(String),
}

/// Every failure collected while fanning one entry out to several appenders.
#[derive(Debug, thiserror::Error)]
#[error("branching error with {} children", .children.len())]
pub struct BranchingError {
    pub children: Vec<AppendError>,
}

/// Wrap a function as an appender.
///
/// ```
/// use rollinglog::{append, Append, AppendError};
///
/// let upper = append::from_fn(|entry: &str| -> Result<(), AppendError> {
///     println!("{}", entry.to_uppercase());
///     Ok(())
/// });
/// upper.append("hello").unwrap();
/// ```
pub fn from_fn<F>(f: F) -> FnAppender<F>
where
    F: Fn(&str) -> Result<(), AppendError> + Send + Sync,
{
    FnAppender(f)
}

/// Appender backed by a function, see [`from_fn`].
pub struct FnAppender<F>(F);

impl<F> Append for FnAppender<F>
where
    F: Fn(&str) -> Result<(), AppendError> + Send + Sync,
{
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        (self.0)(entry)
    }
}

impl<F> fmt::Debug for FnAppender<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnAppender")
    }
}

/// Writes each entry as a line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutAppender;

impl Append for StdoutAppender {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        Ok(writeln!(io::stdout().lock(), "{entry}")?)
    }
}

/// Writes each entry as a line on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrAppender;

impl Append for StderrAppender {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        Ok(writeln!(io::stderr().lock(), "{entry}")?)
    }
}

/// Drops every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAppender;

impl Append for NullAppender {
    fn append(&self, _entry: &str) -> Result<(), AppendError> {
        Ok(())
    }
}

/// Fails every entry, with the entry as the error message.
#[derive(Debug, Clone, Copy, Default)]
pub struct BadAppender;

impl Append for BadAppender {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        Err(AppendError::Rejected(entry.to_owned()))
    }
}

/// Keeps every entry in memory, mostly useful in tests.
#[derive(Debug, Default)]
pub struct ArrayAppender {
    entries: Mutex<Vec<String>>,
}

impl ArrayAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the entries appended so far, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Append for ArrayAppender {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        self.lock().push(entry.to_owned());
        Ok(())
    }
}

/// Hands every entry to each of its branches in order.
///
/// A failing branch does not stop the others; all failures are returned
/// together as a [`BranchingError`].
///
/// ```
/// use rollinglog::{Append, ArrayAppender, BadAppender, BranchingAppender};
/// use std::sync::Arc;
///
/// let memory = Arc::new(ArrayAppender::new());
/// let appender = BranchingAppender::new().branch(memory.clone()).branch(BadAppender);
///
/// assert!(appender.append("one").is_err());
/// assert_eq!(memory.entries(), vec!["one"]);
/// ```
#[derive(Default)]
pub struct BranchingAppender {
    branches: Vec<Arc<dyn Append>>,
}

impl BranchingAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a branch after the existing ones.
    pub fn branch<A: Append + 'static>(self, appender: A) -> Self {
        let mut branches = self.branches;
        branches.push(Arc::new(appender));
        Self { branches }
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl From<Vec<Arc<dyn Append>>> for BranchingAppender {
    fn from(branches: Vec<Arc<dyn Append>>) -> Self {
        BranchingAppender { branches }
    }
}

impl Append for BranchingAppender {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        let mut children = Vec::new();
        for (idx, branch) in self.branches.iter().enumerate() {
            if let Err(err) = branch.append(entry) {
                tracing::debug!(branch = idx, error = %err, "log branch failed");
                children.push(err);
            }
        }
        if children.is_empty() {
            Ok(())
        } else {
            Err(BranchingError { children }.into())
        }
    }
}

impl fmt::Debug for BranchingAppender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchingAppender").field("branches", &self.branches.len()).finish()
    }
}

/// A callback run by a [`TestInjector`] when its pattern shows up in a log
/// entry.
pub type TestInjection = Arc<dyn Fn() -> Result<(), AppendError> + Send + Sync>;

enum Matcher {
    Contains(String),
    Regex(Regex),
}

impl Matcher {
    fn is_match(&self, entry: &str) -> bool {
        match self {
            Matcher::Contains(pattern) => entry.contains(pattern.as_str()),
            Matcher::Regex(regex) => regex.is_match(entry),
        }
    }
}

/// An appender that runs callbacks when log entries match registered
/// patterns, then passes the entry on to the next appender.
///
/// Code under test usually logs just before the step that is hard to make
/// fail on demand (a file read, a stat). Registering a callback for the text
/// of that log line lets a test change the world at exactly that point, for
/// example by renaming the file that is about to be read.
///
/// Patterns are matched against the formatted entry, so the logger's
/// formatter must include whatever the pattern looks for (use
/// [`FullFormat`](crate::FullFormat) to match on tags). Debug records that
/// the logger filters out never reach the injector.
///
/// Callbacks are collected under the injector's lock and run after it is
/// released, so a callback may add or remove injections itself.
///
/// ```
/// use rollinglog::{Append, ArrayAppender, TestInjector};
/// use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let injector = TestInjector::new(ArrayAppender::new());
/// let counter = hits.clone();
/// injector.add("readfile", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// injector.append("[server, readfile] reading data").unwrap();
/// injector.append("[server, stat] checking file").unwrap();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Default)]
pub struct TestInjector {
    next: Option<Arc<dyn Append>>,
    injections: Mutex<BTreeMap<String, (Matcher, TestInjection)>>,
}

impl TestInjector {
    /// Create an injector that forwards every entry to `next`.
    pub fn new<A: Append + 'static>(next: A) -> Self {
        TestInjector {
            next: Some(Arc::new(next)),
            injections: Mutex::default(),
        }
    }

    /// Run `callback` whenever an entry contains `pattern`. Replaces any
    /// injection registered under the same pattern.
    pub fn add<F>(&self, pattern: impl Into<String>, callback: F)
    where
        F: Fn() -> Result<(), AppendError> + Send + Sync + 'static,
    {
        let pattern = pattern.into();
        let callback: TestInjection = Arc::new(callback);
        self.lock().insert(pattern.clone(), (Matcher::Contains(pattern), callback));
    }

    /// Run `callback` whenever an entry matches `regex`. The injection is
    /// registered under the regex source text.
    pub fn add_regex<F>(&self, regex: Regex, callback: F)
    where
        F: Fn() -> Result<(), AppendError> + Send + Sync + 'static,
    {
        let callback: TestInjection = Arc::new(callback);
        self.lock().insert(regex.as_str().to_owned(), (Matcher::Regex(regex), callback));
    }

    /// Remove the injection registered under `pattern`, if any.
    pub fn remove(&self, pattern: &str) {
        self.lock().remove(pattern);
    }

    /// Remove every injection.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, (Matcher, TestInjection)>> {
        self.injections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Append for TestInjector {
    fn append(&self, entry: &str) -> Result<(), AppendError> {
        let to_run: Vec<(String, TestInjection)> = self
            .lock()
            .iter()
            .filter(|(_, (matcher, _))| matcher.is_match(entry))
            .map(|(pattern, (_, callback))| (pattern.clone(), callback.clone()))
            .collect();

        let mut children = Vec::new();
        for (pattern, callback) in to_run {
            tracing::debug!(%pattern, "running test injection");
            if let Err(err) = callback() {
                children.push(err);
            }
        }

        if let Some(next) = &self.next {
            if let Err(err) = next.append(entry) {
                children.push(err);
            }
        }

        if children.is_empty() {
            Ok(())
        } else {
            Err(BranchingError { children }.into())
        }
    }
}

impl fmt::Debug for TestInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestInjector")
            .field("patterns", &self.lock().keys().cloned().collect::<Vec<_>>())
            .field("has_next", &self.next.is_some())
            .finish()
    }
}
