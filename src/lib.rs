//! # rollinglog
//!
//! rollinglog is a small logging library built around a **size-based rolling
//! file appender**. Log records are formatted by a pluggable [`Format`] and
//! handed, one line at a time, to a pluggable [`Append`] destination. The
//! [`RollingFileAppender`] keeps a bounded ring of numbered files next to the
//! current one:
//!
//! ```text
//! app.log      <- current file (slot 0), always the newest
//! app.1.log    <- previous file
//! app.2.log
//! ...
//! app.(max_files-1).log   <- oldest retained file
//! ```
//!
//! The ring shifts one slot older whenever the current file has reached the
//! configured size, and once on the first write after construction so every
//! process run starts a fresh current file.
//!
//! ## Example
//!
//! ```rust
//! use rollinglog::{Logger, RollingFileAppenderBuilder, RotationSize, SimpleFormat};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let prefix = std::env::temp_dir().join("rollinglog-doc-example");
//!     let appender = Arc::new(
//!         RollingFileAppenderBuilder::new(prefix.to_string_lossy(), "log")
//!             .max_file_size(RotationSize::KB(64))
//!             .max_files(3)
//!             .build(),
//!     );
//!
//!     let logger = Logger::new();
//!     logger.configure(SimpleFormat, appender.clone());
//!     logger.print(format_args!("server listening on port {}", 8080))?;
//!     logger.tag_debug(&["net"], "not written, debug is off")?;
//!
//!     appender.close()?;
//!     Ok(())
//! }
//! ```
use std::{
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Write as _},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

#[cfg(unix)]
use std::{fs::Permissions, os::unix::fs::PermissionsExt};

pub mod append;
pub mod format;
pub mod logger;

pub use {
    append::{
        Append, AppendError, ArrayAppender, BadAppender, BranchingAppender, BranchingError, FnAppender,
        NullAppender, StderrAppender, StdoutAppender, TestInjection, TestInjector,
    },
    format::{Format, FullFormat, MinimalFormat, Record, SimpleFormat},
    logger::{Logger, Registry, TimeZone, DEFAULT_LOGGER_NAME},
};

/// Smallest size threshold a rolling appender accepts, in bytes.
pub const MIN_FILE_SIZE: u64 = 1024;

/// Defines size thresholds for rotating log files in various units.
///
/// When the current log file has reached the specified size, the next write
/// rotates it into slot 1 and starts a fresh file. Values below
/// [`MIN_FILE_SIZE`] are raised to it.
///
/// # Examples
/// ```
/// use rollinglog::{RollingFileAppenderBuilder, RotationSize};
///
/// let prefix = std::env::temp_dir().join("rotation-size-doc");
/// let appender = RollingFileAppenderBuilder::new(prefix.to_string_lossy(), "log")
///     .max_file_size(RotationSize::MB(100))
///     .max_files(4)
///     .build();
/// assert_eq!(appender.max_file_size(), 100 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub enum RotationSize {
    /// Raw byte count
    Bytes(u64),
    /// Kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Megabytes (1 MB = 1024 KB = 1,048,576 bytes)
    MB(u64),
    /// Gigabytes (1 GB = 1024 MB = 1,073,741,824 bytes)
    GB(u64),
}

impl RotationSize {
    /// Get the size threshold in bytes.
    fn bytes(&self) -> u64 {
        match self {
            RotationSize::Bytes(b) => *b,
            RotationSize::KB(kb) => kb.saturating_mul(1024),
            RotationSize::MB(mb) => mb.saturating_mul(1024 * 1024),
            RotationSize::GB(gb) => gb.saturating_mul(1024 * 1024 * 1024),
        }
    }
}

/// Get the file name for a slot of the rotation ring.
///
/// Slot 0 is the current file, `{prefix}.{suffix}`. Every other slot `k` is
/// `{prefix}.{k}.{suffix}`. The prefix may contain a directory part; neither
/// part should carry the separating dot.
///
/// ```
/// assert_eq!(rollinglog::file_name_for("logs/app", "log", 0), "logs/app.log");
/// assert_eq!(rollinglog::file_name_for("logs/app", "log", 3), "logs/app.3.log");
/// ```
pub fn file_name_for(prefix: &str, suffix: &str, slot: u16) -> String {
    if slot == 0 {
        format!("{prefix}.{suffix}")
    } else {
        format!("{prefix}.{slot}.{suffix}")
    }
}

/// Metadata for the rolling appender.
/// Fixed at construction; everything that changes lives in
/// [`RollingState`].
#[derive(Debug, Clone)]
struct RollingMeta {
    /// Path prefix of every file in the ring, e.g. `logs/app`.
    prefix: String,
    /// Extension of every file in the ring, e.g. `log`.
    suffix: String,
    /// Size in bytes at which the current file is rotated. Never below
    /// [`MIN_FILE_SIZE`], unused when `max_files` is 1.
    max_file_size: u64,
    /// Number of files in the ring, the current one included. At least 1.
    max_files: u16,
    /// The file permissions to set on newly created log files (Unix-like
    /// systems only), in octal notation such as 0o644.
    file_mode: Option<u32>,
}

/// State for the rolling appender, guarded by the appender's lock.
struct RollingState {
    /// True until the first rotation decision has been made.
    first_write: bool,
    /// The open current file, if any.
    writer: Option<BufWriter<File>>,
}

impl RollingMeta {
    fn new(prefix: String, suffix: String, max_file_size: u64, max_files: u16) -> Self {
        RollingMeta {
            prefix,
            suffix,
            max_file_size: max_file_size.max(MIN_FILE_SIZE),
            max_files: max_files.max(1),
            file_mode: None,
        }
    }

    fn slot_path(&self, slot: u16) -> PathBuf {
        PathBuf::from(file_name_for(&self.prefix, &self.suffix, slot))
    }

    fn curr_log_path(&self) -> PathBuf {
        self.slot_path(0)
    }

    /// Open the current log file for appending.
    /// The file is created when it does not exist yet; any other failure to
    /// open it is returned as is.
    fn open_log_file(&self) -> Result<File, RollingError> {
        let log_path = self.curr_log_path();
        match fs::OpenOptions::new().append(true).open(&log_path) {
            Ok(file) => Ok(file),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let file = fs::OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(&log_path)
                    .map_err(|error| RollingError::OpenFileFailed {
                        path: log_path.clone(),
                        error,
                    })?;
                self.set_permissions(&log_path)?;
                Ok(file)
            }
            Err(error) => Err(RollingError::OpenFileFailed { path: log_path, error }),
        }
    }

    /// Set the permissions for a file based on the configured file mode.
    ///
    /// Only has an effect when a file mode has been configured and the
    /// process runs on a Unix-like operating system. Elsewhere a warning is
    /// printed and nothing else happens.
    fn set_permissions(&self, path: &Path) -> Result<(), RollingError> {
        if let Some(mode) = self.file_mode {
            #[cfg(unix)]
            {
                let perms = Permissions::from_mode(mode);
                fs::set_permissions(path, perms).map_err(|error| RollingError::SetFilePermissionsError {
                    path: path.to_path_buf(),
                    error,
                })?
            }
            #[cfg(not(unix))]
            {
                let _ = (mode, path);
                eprintln!("Warning: Setting file permissions is not supported on non-Unix platforms");
            }
        }
        Ok(())
    }

    /// Check if the current file should be rolled before the next write.
    ///
    /// With a single file the ring never shifts, so a roll is only reported
    /// when the current file has gone missing and has to be recreated. With
    /// more files the first decision always rolls, and after that a roll is
    /// due once the current file has reached `max_file_size` or can no
    /// longer be stat'ed.
    fn needs_roll(&self, first_write: bool) -> bool {
        let curr_log_path = self.curr_log_path();

        if self.max_files == 1 {
            return matches!(fs::metadata(&curr_log_path), Err(err) if err.kind() == io::ErrorKind::NotFound);
        }

        if first_write {
            return true;
        }

        match fs::metadata(&curr_log_path) {
            Ok(metadata) => metadata.len() >= self.max_file_size,
            Err(_) => true,
        }
    }

    /// Shift every file of the ring one slot older, vacating slot 0.
    ///
    /// Slots are processed from the highest surviving one down to the current
    /// file, so a file is never overwritten before it has been moved. The file
    /// in the last slot is replaced by its younger neighbour. A failure leaves
    /// the slots already moved where they are.
    fn shift(&self) -> Result<(), RollingError> {
        for idx in (0..self.max_files - 1).rev() {
            let source_file = self.slot_path(idx);
            match fs::metadata(&source_file) {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(error) => {
                    return Err(RollingError::StatFileFailed {
                        path: source_file,
                        error,
                    })
                }
            }

            let target_file = self.slot_path(idx + 1);

            // An existing target is left to the rename below, which replaces
            // it. Only a target that cannot be stat'ed is removed first.
            if let Err(err) = fs::metadata(&target_file) {
                if err.kind() != io::ErrorKind::NotFound {
                    fs::remove_file(&target_file).map_err(|error| RollingError::RemoveFileError {
                        path: target_file.clone(),
                        error,
                    })?;
                }
            }

            fs::rename(&source_file, &target_file).map_err(|error| RollingError::RenameFileError {
                from: source_file.clone(),
                to: target_file.clone(),
                error,
            })?;
        }
        Ok(())
    }
}

impl RollingState {
    fn new() -> Self {
        RollingState {
            first_write: true,
            writer: None,
        }
    }

    /// Open the current file unless it is already open.
    fn open(&mut self, meta: &RollingMeta) -> Result<&mut BufWriter<File>, RollingError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => BufWriter::new(meta.open_log_file()?),
        };
        Ok(self.writer.insert(writer))
    }

    /// Write the bytes, and a newline when asked to, then flush. Opens the
    /// current file first if needed.
    fn write(&mut self, meta: &RollingMeta, bytes: &[u8], newline: bool) -> Result<(), RollingError> {
        let writer = self.open(meta)?;
        let write_err = |error: io::Error| RollingError::WriteFileError {
            path: meta.curr_log_path(),
            error,
        };
        writer.write_all(bytes).map_err(write_err)?;
        if newline {
            writer.write_all(b"\n").map_err(write_err)?;
        }
        writer.flush().map_err(write_err)
    }

    /// Flush and release the current file. Closing with nothing open is a
    /// no-op.
    fn close(&mut self, meta: &RollingMeta) -> Result<(), RollingError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        // The handle is dropped either way; `File` does not report close
        // errors, so a flush failure is the only one left to return.
        writer.flush().map_err(|error| RollingError::WriteFileError {
            path: meta.curr_log_path(),
            error,
        })
    }
}

/// A log appender that writes one line per entry and rolls the file over
/// once it has reached a size threshold.
///
/// Every operation runs on the calling thread while holding a single lock, so
/// lines from concurrent callers never interleave and no caller can observe
/// the ring half-shifted. Two appenders must not share a prefix and suffix.
///
/// # Examples
/// ```
/// use rollinglog::RollingFileAppender;
///
/// let dir = std::env::temp_dir().join("rolling-appender-doc");
/// std::fs::create_dir_all(&dir)?;
/// let prefix = dir.join("app");
///
/// // Sizes below 1024 bytes and file counts below 1 are clamped.
/// let appender = RollingFileAppender::new(prefix.to_string_lossy(), "log", 100, -1);
/// assert_eq!(appender.max_file_size(), 1024);
/// assert_eq!(appender.max_files(), 1);
///
/// appender.log("hello")?;
/// appender.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RollingFileAppender {
    meta: RollingMeta,
    state: Mutex<RollingState>,
}

impl RollingFileAppender {
    /// Create a new rolling appender writing to `{prefix}.{suffix}`.
    ///
    /// Never fails: `max_file_size` below [`MIN_FILE_SIZE`] is raised to it
    /// and `max_files` below 1 becomes 1. No file is touched until the first
    /// write.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, max_file_size: i64, max_files: i16) -> Self {
        let max_file_size = u64::try_from(max_file_size).unwrap_or(0);
        let max_files = u16::try_from(max_files).unwrap_or(0);
        Self::from_meta(RollingMeta::new(prefix.into(), suffix.into(), max_file_size, max_files))
    }

    fn from_meta(meta: RollingMeta) -> Self {
        RollingFileAppender {
            meta,
            state: Mutex::new(RollingState::new()),
        }
    }

    /// Write one entry followed by a newline, rolling the file first when
    /// needed.
    ///
    /// If the roll fails the entry is dropped and the error returned.
    pub fn log(&self, entry: &str) -> Result<(), RollingError> {
        self.append_bytes(entry.as_bytes(), true)
    }

    /// Shift the ring one slot older right away. The next write opens a fresh
    /// current file.
    pub fn roll(&self) -> Result<(), RollingError> {
        let mut state = self.lock_state();
        self.roll_locked(&mut state)
    }

    /// Flush and close the current file. Calling it again is a no-op, and a
    /// later write simply reopens the file.
    pub fn close(&self) -> Result<(), RollingError> {
        self.lock_state().close(&self.meta)
    }

    /// Path of the file currently written to.
    pub fn current_file_path(&self) -> PathBuf {
        self.meta.curr_log_path()
    }

    /// Path of the given slot of the ring.
    pub fn slot_file_path(&self, slot: u16) -> PathBuf {
        self.meta.slot_path(slot)
    }

    /// Effective size threshold in bytes.
    pub fn max_file_size(&self) -> u64 {
        self.meta.max_file_size
    }

    /// Effective number of files in the ring.
    pub fn max_files(&self) -> u16 {
        self.meta.max_files
    }

    fn lock_state(&self) -> MutexGuard<'_, RollingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn roll_locked(&self, state: &mut RollingState) -> Result<(), RollingError> {
        if let Err(err) = state.close(&self.meta) {
            eprintln!("Failed to close log file before rolling: {}", err);
        }
        state.first_write = false;
        self.meta.shift()
    }

    fn append_bytes(&self, bytes: &[u8], newline: bool) -> Result<(), RollingError> {
        let mut state = self.lock_state();

        if self.meta.needs_roll(state.first_write) {
            self.roll_locked(&mut state)?;
        }

        state.write(&self.meta, bytes, newline)
    }
}

impl fmt::Debug for RollingFileAppender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollingFileAppender").field("meta", &self.meta).finish_non_exhaustive()
    }
}

/// Writes go through the same roll decision as [`RollingFileAppender::log`]
/// but are stored verbatim, so the appender can sit behind
/// `tracing_appender::non_blocking` or any other formatter that already ends
/// its records with a newline.
impl io::Write for &RollingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append_bytes(buf, false).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock_state().writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl io::Write for RollingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut this: &RollingFileAppender = self;
        this.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut this: &RollingFileAppender = self;
        this.flush()
    }
}

/// Errors that can occur when using the rolling appender.
#[derive(Debug, thiserror::Error)]
pub enum RollingError {
    #[error("Failed to open log file '{path}': {error}")]
    OpenFileFailed {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("Failed to stat log file '{path}': {error}")]
    StatFileFailed {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("Failed to rename file from '{from}' to '{to}': {error}")]
    RenameFileError {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("Failed to remove file '{path}': {error}")]
    RemoveFileError {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("Failed to write log file '{path}': {error}")]
    WriteFileError {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
}

impl RollingError {
    /// The underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            RollingError::OpenFileFailed { error, .. }
            | RollingError::StatFileFailed { error, .. }
            | RollingError::RenameFileError { error, .. }
            | RollingError::RemoveFileError { error, .. }
            | RollingError::WriteFileError { error, .. }
            | RollingError::SetFilePermissionsError { error, .. } => error,
        }
    }
}

/// Provides a fluent interface for configuring [`RollingFileAppender`]
/// instances.
///
/// # Default Configuration
///
/// * Rotate at 10 MB
/// * Keep 5 files, the current one included
/// * Standard file permissions
///
/// # Examples
///
/// ```rust
/// use rollinglog::{RollingFileAppenderBuilder, RotationSize};
///
/// let prefix = std::env::temp_dir().join("builder-doc");
/// let appender = RollingFileAppenderBuilder::new(prefix.to_string_lossy(), "log")
///     .max_file_size(RotationSize::KB(256))
///     .max_files(3)        // app.log, app.1.log, app.2.log
///     .file_mode(0o640)    // Owner rw, group r (Unix only)
///     .build();
/// assert_eq!(appender.max_files(), 3);
/// ```
pub struct RollingFileAppenderBuilder {
    meta: RollingMeta,
}

impl RollingFileAppenderBuilder {
    /// Create a new builder for files named `{prefix}.{suffix}` and
    /// `{prefix}.{n}.{suffix}`.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        RollingFileAppenderBuilder {
            meta: RollingMeta::new(prefix.into(), suffix.into(), RotationSize::MB(10).bytes(), 5),
        }
    }

    /// Set the size at which the current file is rotated.
    pub fn max_file_size(self, size: RotationSize) -> Self {
        Self {
            meta: RollingMeta {
                max_file_size: size.bytes().max(MIN_FILE_SIZE),
                ..self.meta
            },
        }
    }

    /// Set the number of files kept, the current one included.
    pub fn max_files(self, max_files: u16) -> Self {
        Self {
            meta: RollingMeta {
                max_files: max_files.max(1),
                ..self.meta
            },
        }
    }

    /// Set the file permissions for log files (Unix-like systems only).
    /// This sets the file mode bits in octal notation like when using chmod.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            meta: RollingMeta {
                file_mode: Some(mode),
                ..self.meta
            },
        }
    }

    /// Build the rolling appender.
    pub fn build(self) -> RollingFileAppender {
        RollingFileAppender::from_meta(self.meta)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{io::Write, sync::Arc, thread},
        tempfile::TempDir,
    };

    fn appender_in(dir: &TempDir, max_file_size: i64, max_files: i16) -> RollingFileAppender {
        let prefix = dir.path().join("appendtest");
        RollingFileAppender::new(prefix.to_string_lossy(), "log", max_file_size, max_files)
    }

    fn file_len(path: &Path) -> u64 {
        fs::metadata(path).map(|m| m.len()).unwrap()
    }

    fn ring_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn file_names_follow_slots() {
        assert_eq!(file_name_for("a", "log", 0), "a.log");
        assert_eq!(file_name_for("a", "log", 1), "a.1.log");
        assert_eq!(file_name_for("/tmp/x/a", "txt", 12), "/tmp/x/a.12.txt");
    }

    #[test]
    fn constructor_clamps_limits() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 100, -1);
        assert_eq!(appender.max_files(), 1);
        assert_eq!(appender.max_file_size(), 1024);
        assert_eq!(
            appender.current_file_path(),
            PathBuf::from(format!("{}.log", dir.path().join("appendtest").display()))
        );

        let appender = appender_in(&dir, -5, 0);
        assert_eq!(appender.max_files(), 1);
        assert_eq!(appender.max_file_size(), 1024);

        let appender = appender_in(&dir, 4096, 7);
        assert_eq!(appender.max_files(), 7);
        assert_eq!(appender.max_file_size(), 4096);
    }

    #[test]
    fn builder_clamps_limits() {
        let appender = RollingFileAppenderBuilder::new("unused", "log")
            .max_file_size(RotationSize::Bytes(10))
            .max_files(0)
            .build();
        assert_eq!(appender.max_file_size(), MIN_FILE_SIZE);
        assert_eq!(appender.max_files(), 1);

        let appender = RollingFileAppenderBuilder::new("unused", "log")
            .max_file_size(RotationSize::KB(2))
            .build();
        assert_eq!(appender.max_file_size(), 2048);
        assert_eq!(appender.max_files(), 5);
    }

    #[test]
    fn first_write_rolls_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 2048, 3);
        fs::write(appender.current_file_path(), "previous run\n").unwrap();

        appender.log("new run").unwrap();
        appender.close().unwrap();

        assert_eq!(fs::read_to_string(appender.slot_file_path(1)).unwrap(), "previous run\n");
        assert_eq!(fs::read_to_string(appender.current_file_path()).unwrap(), "new run\n");

        // Only the first decision is forced.
        appender.log("same run").unwrap();
        assert_eq!(
            fs::read_to_string(appender.current_file_path()).unwrap(),
            "new run\nsame run\n"
        );
        assert!(!appender.slot_file_path(2).exists());
    }

    #[test]
    fn first_write_without_files_creates_current_only() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 2048, 5);
        appender.log("1").unwrap();
        appender.close().unwrap();
        assert_eq!(ring_files(&dir), vec!["appendtest.log".to_string()]);
    }

    #[test]
    fn rolls_once_size_is_reached() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 2048, 5);
        for _ in 0..2548 {
            appender.log("1").unwrap();
        }
        appender.close().unwrap();

        assert_eq!(file_len(&appender.current_file_path()), 1000);
        assert_eq!(file_len(&appender.slot_file_path(1)), 2048);
        assert_eq!(file_len(&appender.slot_file_path(2)), 2048);
        assert!(!appender.slot_file_path(3).exists());
    }

    #[test]
    fn single_file_never_rolls() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 2048, 1);
        for _ in 0..2548 {
            appender.log("1").unwrap();
        }
        appender.close().unwrap();

        assert_eq!(file_len(&appender.current_file_path()), 2548 * 2);
        assert_eq!(ring_files(&dir), vec!["appendtest.log".to_string()]);
    }

    #[test]
    fn single_file_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 2048, 1);
        fs::write(appender.current_file_path(), "kept\n").unwrap();
        appender.log("appended").unwrap();
        assert_eq!(
            fs::read_to_string(appender.current_file_path()).unwrap(),
            "kept\nappended\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn single_file_recreates_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 2048, 1);
        appender.log("one").unwrap();
        fs::remove_file(appender.current_file_path()).unwrap();

        appender.log("two").unwrap();
        assert_eq!(fs::read_to_string(appender.current_file_path()).unwrap(), "two\n");
        assert_eq!(ring_files(&dir), vec!["appendtest.log".to_string()]);
    }

    #[test]
    fn ring_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 1024, 3);
        let line = "x".repeat(99);
        for _ in 0..200 {
            appender.log(&line).unwrap();
            assert!(ring_files(&dir).len() <= 3);
        }
        appender.close().unwrap();

        assert_eq!(
            ring_files(&dir),
            vec![
                "appendtest.1.log".to_string(),
                "appendtest.2.log".to_string(),
                "appendtest.log".to_string(),
            ]
        );
        for slot in 1..3 {
            assert!(file_len(&appender.slot_file_path(slot)) >= 1024);
        }
    }

    #[test]
    fn manual_roll_vacates_current_slot() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 1024 * 1024, 3);
        appender.log("a").unwrap();
        appender.roll().unwrap();

        assert!(!appender.current_file_path().exists());
        assert_eq!(fs::read_to_string(appender.slot_file_path(1)).unwrap(), "a\n");

        // A missing current file counts as a roll, so the ring shifts again
        // before "b" is written.
        appender.log("b").unwrap();
        appender.close().unwrap();
        assert_eq!(fs::read_to_string(appender.current_file_path()).unwrap(), "b\n");
        assert!(!appender.slot_file_path(1).exists());
        assert_eq!(fs::read_to_string(appender.slot_file_path(2)).unwrap(), "a\n");
    }

    #[test]
    fn oldest_slot_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 1024, 3);
        fs::write(appender.current_file_path(), "newest\n").unwrap();
        fs::write(appender.slot_file_path(1), "middle\n").unwrap();
        fs::write(appender.slot_file_path(2), "discarded\n").unwrap();

        appender.roll().unwrap();

        assert!(!appender.current_file_path().exists());
        assert_eq!(fs::read_to_string(appender.slot_file_path(1)).unwrap(), "newest\n");
        assert_eq!(fs::read_to_string(appender.slot_file_path(2)).unwrap(), "middle\n");
        assert!(!appender.slot_file_path(3).exists());
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 2048, 2);
        assert!(appender.close().is_ok());
        appender.log("line").unwrap();
        assert!(appender.close().is_ok());
        assert!(appender.close().is_ok());

        // Writing after close reopens the same file.
        appender.log("again").unwrap();
        appender.close().unwrap();
        assert_eq!(
            fs::read_to_string(appender.current_file_path()).unwrap(),
            "line\nagain\n"
        );
    }

    #[test]
    fn open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("missing-dir").join("app");
        let appender = RollingFileAppender::new(prefix.to_string_lossy(), "log", 2048, 1);
        let err = appender.log("lost").unwrap_err();
        assert!(matches!(err, RollingError::OpenFileFailed { .. }));
        assert_eq!(err.io_error().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn state_write_opens_the_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 2048, 1);
        let mut state = RollingState::new();

        state.write(&appender.meta, b"first", true).unwrap();
        assert!(state.writer.is_some());
        state.close(&appender.meta).unwrap();
        state.write(&appender.meta, b"second", true).unwrap();
        state.close(&appender.meta).unwrap();
        assert_eq!(
            fs::read_to_string(appender.current_file_path()).unwrap(),
            "first\nsecond\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn single_file_does_not_roll_on_stat_errors() {
        let dir = tempfile::tempdir().unwrap();
        // A prefix below a regular file fails every stat with "not a
        // directory", which is not "not found".
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let prefix = blocker.join("app");
        let appender = RollingFileAppender::new(prefix.to_string_lossy(), "log", 2048, 1);

        assert!(!appender.meta.needs_roll(true));
        let err = appender.log("lost").unwrap_err();
        assert!(matches!(err, RollingError::OpenFileFailed { .. }));
        assert_ne!(err.io_error().kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn stat_errors_roll_a_multi_file_ring() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let prefix = blocker.join("app");
        let appender = RollingFileAppender::new(prefix.to_string_lossy(), "log", 2048, 3);

        assert!(appender.meta.needs_roll(true));
        assert!(appender.meta.needs_roll(false));
        match appender.log("lost").unwrap_err() {
            RollingError::StatFileFailed { path, .. } => assert_eq!(path, appender.slot_file_path(1)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn restarts_keep_a_full_ring() {
        let dir = tempfile::tempdir().unwrap();
        for run in 0..6 {
            let appender = appender_in(&dir, 1024 * 1024, 3);
            appender.log(&format!("run{run}")).unwrap();
            appender.close().unwrap();
        }

        let appender = appender_in(&dir, 1024 * 1024, 3);
        assert_eq!(fs::read_to_string(appender.current_file_path()).unwrap(), "run5\n");
        assert_eq!(fs::read_to_string(appender.slot_file_path(1)).unwrap(), "run4\n");
        assert_eq!(fs::read_to_string(appender.slot_file_path(2)).unwrap(), "run3\n");
        assert_eq!(
            ring_files(&dir),
            vec![
                "appendtest.1.log".to_string(),
                "appendtest.2.log".to_string(),
                "appendtest.log".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn rename_failure_aborts_roll_and_drops_entry() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 1024, 3);
        fs::write(appender.current_file_path(), "current\n").unwrap();
        fs::write(appender.slot_file_path(1), "older\n").unwrap();
        // A non-empty directory in the last slot cannot be replaced by a file.
        fs::create_dir(appender.slot_file_path(2)).unwrap();
        fs::write(appender.slot_file_path(2).join("blocker"), "").unwrap();

        let err = appender.log("dropped").unwrap_err();
        assert!(matches!(err, RollingError::RenameFileError { .. }));
        assert_eq!(fs::read_to_string(appender.current_file_path()).unwrap(), "current\n");
        assert_eq!(fs::read_to_string(appender.slot_file_path(1)).unwrap(), "older\n");
    }

    #[cfg(unix)]
    #[test]
    fn partial_roll_is_not_undone() {
        let dir = tempfile::tempdir().unwrap();
        let appender = appender_in(&dir, 1024, 4);
        fs::write(appender.current_file_path(), "current\n").unwrap();
        fs::write(appender.slot_file_path(2), "older\n").unwrap();
        // Slot 1 is a symlink to itself, so stat fails with something other
        // than "not found" after 2 -> 3 has already happened.
        std::os::unix::fs::symlink(appender.slot_file_path(1), appender.slot_file_path(1)).unwrap();

        let err = appender.roll().unwrap_err();
        assert!(matches!(err, RollingError::StatFileFailed { .. }));
        assert_eq!(fs::read_to_string(appender.slot_file_path(3)).unwrap(), "older\n");
        assert!(!appender.slot_file_path(2).exists());
        assert_eq!(fs::read_to_string(appender.current_file_path()).unwrap(), "current\n");
    }

    #[cfg(unix)]
    #[test]
    fn file_mode_is_applied_to_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("mode");
        let appender = RollingFileAppenderBuilder::new(prefix.to_string_lossy(), "log")
            .max_files(1)
            .file_mode(0o640)
            .build();
        appender.log("secret").unwrap();
        let mode = fs::metadata(appender.current_file_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn io_write_stores_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mut appender = appender_in(&dir, 2048, 1);
        write!(appender, "partial ").unwrap();
        writeln!(appender, "line").unwrap();
        appender.flush().unwrap();
        assert_eq!(
            fs::read_to_string(appender.current_file_path()).unwrap(),
            "partial line\n"
        );
    }

    #[test]
    fn concurrent_lines_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let appender = Arc::new(appender_in(&dir, 1024 * 1024, 2));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let appender = appender.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        appender.log(&format!("thread-{t}-line-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        appender.close().unwrap();

        let content = fs::read_to_string(appender.current_file_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 8 * 200);
        assert!(lines.iter().all(|l| l.starts_with("thread-") && l.contains("-line-")));
    }
}
