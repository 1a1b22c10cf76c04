use crate::config::Config;
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

pub const LOG_FILE_NAME: &str = "mission-control.log";

type SharedFile = Arc<Mutex<File>>;

/// Owns the optional log file for the life of the process.
pub struct LogGuard {
    path: Option<PathBuf>,
    file: Option<SharedFile>,
}

impl LogGuard {
    /// Opens `<log_dir>/mission-control.log` for append. A blank dir means
    /// stdout only.
    pub fn open(log_dir: &str) -> io::Result<Self> {
        let log_dir = log_dir.trim();
        if log_dir.is_empty() {
            return Ok(Self::stdout_only());
        }
        let path = Path::new(log_dir).join(LOG_FILE_NAME);
        std::fs::create_dir_all(log_dir)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path: Some(path),
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    fn stdout_only() -> Self {
        Self {
            path: None,
            file: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn make_writer(&self) -> BoxMakeWriter {
        let file = self.file.clone();
        BoxMakeWriter::new(move || TeeWriter {
            stdout: io::stdout(),
            file: file.clone(),
        })
    }
}

/// `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &Config) -> Option<LogGuard> {
    let guard = LogGuard::open(&config.log_dir).unwrap_or_else(|err| {
        eprintln!("log_file_error: {err}");
        LogGuard::stdout_only()
    });
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(guard.make_writer())
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok()?;
    Some(guard)
}

/// Copies every line to stdout and, when present, the log file. Write
/// failures on either side are swallowed.
struct TeeWriter {
    stdout: io::Stdout,
    file: Option<SharedFile>,
}

impl TeeWriter {
    fn with_file(&self, op: impl FnOnce(&mut File) -> io::Result<()>) {
        if let Some(Ok(mut file)) = self.file.as_ref().map(|file| file.lock()) {
            let _ = op(&mut *file);
        }
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.stdout.write_all(buf);
        self.with_file(|file| file.write_all(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.stdout.flush();
        self.with_file(|file| file.flush());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_log_dir_means_stdout_only() {
        let guard = LogGuard::open("  ").expect("open");
        assert!(guard.path().is_none());
        assert!(guard.file.is_none());
    }

    #[test]
    fn tee_appends_to_log_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_dir = dir.path().join("logs");

        let guard = LogGuard::open(&log_dir.to_string_lossy()).expect("open");
        let path = guard.path().expect("path").to_path_buf();
        assert_eq!(path, log_dir.join(LOG_FILE_NAME));

        let mut writer = TeeWriter {
            stdout: io::stdout(),
            file: guard.file.clone(),
        };
        writer.write_all(b"first\n").expect("write");
        writer.write_all(b"second\n").expect("write");
        writer.flush().expect("flush");

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(contents, "first\nsecond\n");

        let reopened = LogGuard::open(&log_dir.to_string_lossy()).expect("reopen");
        let mut writer = TeeWriter {
            stdout: io::stdout(),
            file: reopened.file.clone(),
        };
        writer.write_all(b"third\n").expect("write");
        let contents = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(contents, "first\nsecond\nthird\n");
    }
}
