use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends to the log file and reopens it if it was deleted while running.
struct ResilientFileWriter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ResilientFileWriter {
    fn new(path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn ensure_file(&self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            *guard = Some(file);
        }

        Ok(())
    }
}

impl Write for ResilientFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_file()?;
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(ref mut file) = *guard {
            file.write(buf)
        } else {
            Err(io::Error::other("File not available"))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(ref mut file) = *guard {
            file.flush()
        } else {
            Ok(())
        }
    }
}

fn trim_log_file_if_oversized(log_path: &Path, max_log_size: u64) {
    if let Ok(metadata) = std::fs::metadata(log_path)
        && metadata.len() > max_log_size
        && let Ok(contents) = std::fs::read(log_path)
    {
        let half = contents.len() / 2;
        let keep_from = contents[half..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(half, |pos| half + pos + 1);
        let _ = std::fs::write(log_path, &contents[keep_from..]);
    }
}

/// Terminal and file levels. The file always gets more detail than the
/// terminal so a failed run can be diagnosed after the fact.
fn levels(verbose: bool) -> (LevelFilter, LevelFilter) {
    if verbose {
        (LevelFilter::Debug, LevelFilter::Trace)
    } else {
        (LevelFilter::Warn, LevelFilter::Debug)
    }
}

/// Without a log path only the terminal logger is installed, which is how
/// startup errors are still reported when the data directory is unknown.
pub fn init_logging(verbose: bool, log_path: Option<&Path>, max_log_size: u64) {
    let (term_level, file_level) = levels(verbose);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("toolup")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    let mut max_level = term_level;
    if let Some(log_path) = log_path {
        trim_log_file_if_oversized(log_path, max_log_size);
        match ResilientFileWriter::new(log_path.to_path_buf()) {
            Ok(writer) => {
                loggers.push(WriteLogger::new(file_level, config, writer));
                max_level = max_level.max(file_level);
            }
            Err(error) => eprintln!("Could not open log file {}: {error}", log_path.display()),
        }
    }

    let _ = CombinedLogger::init(loggers);
    log::set_max_level(max_level);

    if let Some(log_path) = log_path {
        log::debug!("Logging to {}", log_path.display());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use simplelog::LevelFilter;

    use super::{ResilientFileWriter, init_logging, levels, trim_log_file_if_oversized};

    #[test]
    fn resilient_writer_recreates_missing_file_on_write() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("logs").join("toolup.log");
        let mut writer =
            ResilientFileWriter::new(log_path.clone()).expect("writer should open log file");

        writer
            .write_all(b"first line\n")
            .expect("initial write should succeed");
        std::fs::remove_file(&log_path).expect("log file should be removable");
        writer
            .write_all(b"second line\n")
            .expect("writer should recreate file after deletion");

        let contents =
            std::fs::read_to_string(&log_path).expect("recreated file should be readable");
        assert_eq!(contents, "second line\n");
    }

    #[test]
    fn trim_log_file_keeps_recent_half() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("toolup.log");
        let original = "line-1\nline-2\nline-3\nline-4\nline-5\n";
        std::fs::write(&log_path, original).expect("test log file should be written");

        trim_log_file_if_oversized(&log_path, 10);

        let trimmed =
            std::fs::read_to_string(&log_path).expect("trimmed log file should be readable");
        assert!(trimmed.starts_with("line-4\n") || trimmed.starts_with("line-3\n"));
        assert!(!trimmed.contains("line-1"));
    }

    #[test]
    fn small_log_file_is_left_alone() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("toolup.log");
        std::fs::write(&log_path, "short\n").expect("test log file should be written");

        trim_log_file_if_oversized(&log_path, 1024);

        assert_eq!(
            std::fs::read_to_string(&log_path).expect("readable"),
            "short\n"
        );
    }

    #[test]
    fn verbose_raises_both_levels() {
        assert_eq!(levels(false), (LevelFilter::Warn, LevelFilter::Debug));
        assert_eq!(levels(true), (LevelFilter::Debug, LevelFilter::Trace));
    }

    #[test]
    fn terminal_logging_works_without_a_log_path() {
        init_logging(false, None, 0);

        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
