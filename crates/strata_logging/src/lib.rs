//! Logging setup for strata binaries.
//!
//! Events go to a size-rotated file under `~/.strata/logs` and to stderr.
//! Stdout is left untouched: the target writes emitted state there.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "strata=info,strata_sinks=info,strata_schema=warn,strata_db=warn,sqlx=warn";
const VERBOSE_LOG_FILTER: &str =
    "strata=debug,strata_sinks=debug,strata_schema=debug,strata_db=debug,sqlx=warn";

/// Logging configuration for a strata binary.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig<'a> {
    /// Base name of the log file.
    pub app_name: &'a str,
    /// Debug-level output for strata crates when `RUST_LOG` is unset.
    pub verbose: bool,
    /// Only warnings and errors on stderr; the file keeps the full filter.
    pub quiet: bool,
}

/// Install the global subscriber. Fails if the log directory can't be created
/// or a subscriber is already installed.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir()?;
    let file_writer = RotatingLog::open(&log_dir, config.app_name, Rotation::default())
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;

    let default_filter = if config.verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let stderr_filter = if config.quiet {
        EnvFilter::new("warn")
    } else {
        file_filter.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(stderr_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Strata home directory: `$STRATA_HOME`, else `~/.strata`.
pub fn strata_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("STRATA_HOME") {
        return Ok(PathBuf::from(override_path));
    }
    dirs::home_dir()
        .map(|home| home.join(".strata"))
        .context("Could not determine home directory; set STRATA_HOME")
}

pub fn logs_dir() -> Result<PathBuf> {
    Ok(strata_home()?.join("logs"))
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// How many files a log keeps and how large the active one may grow.
#[derive(Debug, Clone, Copy)]
struct Rotation {
    generations: usize,
    max_bytes: u64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            generations: 5,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// The active `<name>.log` and its older generations `<name>.log.1`, `<name>.log.2`, ...
struct LogFile {
    active: PathBuf,
    rotation: Rotation,
    handle: File,
    written: u64,
}

impl LogFile {
    fn open(dir: &Path, name: &str, rotation: Rotation) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let active = dir.join(format!("{}.log", file_stem(name)));
        let handle = open_append(&active)?;
        let written = handle.metadata()?.len();
        let mut log = Self {
            active,
            rotation: Rotation {
                generations: rotation.generations.max(1),
                ..rotation
            },
            handle,
            written,
        };
        if log.written > log.rotation.max_bytes {
            log.roll()?;
        }
        Ok(log)
    }

    fn generation(&self, n: usize) -> PathBuf {
        let mut path = self.active.clone().into_os_string();
        path.push(format!(".{}", n));
        PathBuf::from(path)
    }

    /// Shift every file one generation older and start an empty active file.
    fn roll(&mut self) -> io::Result<()> {
        self.handle.flush()?;
        let chain: Vec<PathBuf> = std::iter::once(self.active.clone())
            .chain((1..self.rotation.generations).map(|n| self.generation(n)))
            .collect();

        if let Some(oldest) = chain.last() {
            missing_ok(fs::remove_file(oldest))?;
        }
        for pair in chain.windows(2).rev() {
            missing_ok(fs::rename(&pair[0], &pair[1]))?;
        }

        self.handle = open_append(&self.active)?;
        self.written = 0;
        Ok(())
    }

    fn append(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.rotation.max_bytes {
            self.roll()?;
        }
        let n = self.handle.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn missing_ok(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Cloneable handle to one [`LogFile`]; every clone writes to the same file.
#[derive(Clone)]
struct RotatingLog {
    file: Arc<Mutex<LogFile>>,
}

impl RotatingLog {
    fn open(dir: &Path, name: &str, rotation: Rotation) -> io::Result<Self> {
        Ok(Self {
            file: Arc::new(Mutex::new(LogFile::open(dir, name, rotation)?)),
        })
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, LogFile>> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))
    }
}

impl Write for RotatingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.append(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.handle.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingLog {
    type Writer = RotatingLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// File stem for an app name; anything outside `[A-Za-z0-9_-]` becomes `_`.
fn file_stem(name: &str) -> String {
    if name.is_empty() {
        return "strata".to_string();
    }
    name.chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => ch,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(generations: usize, max_bytes: u64) -> Rotation {
        Rotation {
            generations,
            max_bytes,
        }
    }

    #[test]
    fn file_stem_replaces_unsafe_characters() {
        assert_eq!(file_stem("target-strata"), "target-strata");
        assert_eq!(file_stem("a/b c"), "a_b_c");
        assert_eq!(file_stem(""), "strata");
    }

    #[test]
    fn full_file_moves_to_next_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RotatingLog::open(dir.path(), "app", small(3, 10)).unwrap();

        log.write_all(b"12345678").unwrap();
        log.write_all(b"abcdefgh").unwrap();
        log.write_all(b"ABCDEFGH").unwrap();
        log.flush().unwrap();

        let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read("app.log"), "ABCDEFGH");
        assert_eq!(read("app.log.1"), "abcdefgh");
        assert_eq!(read("app.log.2"), "12345678");
    }

    #[test]
    fn oldest_generation_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RotatingLog::open(dir.path(), "app", small(2, 4)).unwrap();

        for chunk in [b"aaaa", b"bbbb", b"cccc"] {
            log.write_all(chunk).unwrap();
        }
        log.flush().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("app.log")).unwrap(), "cccc");
        assert_eq!(fs::read_to_string(dir.path().join("app.log.1")).unwrap(), "bbbb");
        assert!(!dir.path().join("app.log.2").exists());
    }

    #[test]
    fn single_generation_truncates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RotatingLog::open(dir.path(), "app", small(1, 4)).unwrap();

        log.write_all(b"aaaa").unwrap();
        log.write_all(b"bbbb").unwrap();
        log.flush().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("app.log")).unwrap(), "bbbb");
        assert!(!dir.path().join("app.log.1").exists());
    }

    #[test]
    fn reopening_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = RotatingLog::open(dir.path(), "app", small(2, 1024)).unwrap();
            log.write_all(b"first\n").unwrap();
        }
        let mut log = RotatingLog::open(dir.path(), "app", small(2, 1024)).unwrap();
        assert_eq!(log.lock().unwrap().written, 6);

        let mut clone = log.clone();
        clone.write_all(b"second\n").unwrap();
        log.flush().unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("app.log")).unwrap(),
            "first\nsecond\n"
        );
    }
}
