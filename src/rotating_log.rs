use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to read log file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write log file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct RotatingLog {
    path: PathBuf,
    max_entries: usize,
}

impl RotatingLog {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_entries(&self) -> Result<Vec<String>, LogError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(LogError::Read {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    pub fn append(&self, line: &str) -> Result<(), LogError> {
        let mut entries = self.read_entries()?;
        entries.push(line.to_string());
        let evicted = entries.len().saturating_sub(self.max_entries);
        entries.drain(..evicted);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LogError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut content = entries.join("\n");
        content.push('\n');
        fs::write(&self.path, content).map_err(|source| LogError::Write {
            path: self.path.display().to_string(),
            source,
        })?;

        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            evicted,
            "rotating log rewritten"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = RotatingLog::new(dir.path().join("health.log"), 100);

        log.append("first").unwrap();
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "first\n");
        assert_eq!(log.read_entries().unwrap(), vec!["first"]);
    }

    #[test]
    fn append_at_cap_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.log");
        let seeded: String = (1..=100).map(|i| format!("line-{i}\n")).collect();
        fs::write(&path, seeded).unwrap();

        let log = RotatingLog::new(&path, 100);
        log.append("line-101").unwrap();

        let expected: Vec<String> = (2..=101).map(|i| format!("line-{i}")).collect();
        assert_eq!(log.read_entries().unwrap(), expected);
        let expected_text: String = (2..=101).map(|i| format!("line-{i}\n")).collect();
        assert_eq!(fs::read_to_string(&path).unwrap(), expected_text);
    }

    #[test]
    fn small_cap_keeps_newest_last() {
        let dir = tempfile::tempdir().unwrap();
        let log = RotatingLog::new(dir.path().join("health.log"), 3);
        for i in 1..=5 {
            log.append(&format!("entry-{i}")).unwrap();
            let entries = log.read_entries().unwrap();
            assert!(entries.len() <= 3);
            assert_eq!(entries.last().unwrap(), &format!("entry-{i}"));
        }
        assert_eq!(
            log.read_entries().unwrap(),
            vec!["entry-3", "entry-4", "entry-5"]
        );
    }

    #[test]
    fn oversized_existing_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.log");
        fs::write(&path, "a\nb\nc\nd\ne\n").unwrap();

        RotatingLog::new(&path, 2).append("f").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "e\nf\n");
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let log = RotatingLog::new(dir.path().join("nested/logs/health.log"), 10);
        log.append("x").unwrap();
        assert_eq!(log.read_entries().unwrap(), vec!["x"]);
    }

    #[test]
    fn unwritable_target_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let log = RotatingLog::new(dir.path(), 10);
        assert!(log.append("x").is_err());
    }
}
