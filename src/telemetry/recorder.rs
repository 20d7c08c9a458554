//! Append-only JSONL event recorder
//!
//! Thread-safe, crash-resistant: every line is flushed, files rotate at a
//! size ceiling. Disabled entirely when no directory is configured.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Timelike, Utc};
use parking_lot::Mutex;

use super::event::TwinEvent;

/// Maximum file size before rotation (10 MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Log file extension
const LOG_EXT: &str = ".jsonl";

struct Recorder {
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_size: u64,
    base_dir: PathBuf,
}

impl Recorder {
    fn new(base_dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&base_dir)?;
        let (file_path, file) = Self::open_new_file(&base_dir)?;

        Ok(Self {
            writer: BufWriter::new(file),
            current_file: file_path,
            current_size: 0,
            base_dir,
        })
    }

    /// Open a new log file with timestamp
    fn open_new_file(base_dir: &Path) -> std::io::Result<(PathBuf, File)> {
        let now = Utc::now();
        let filename = format!(
            "events_{}_{:02}_{:02}_{:02}{:02}{:02}{}",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            LOG_EXT
        );
        let file_path = base_dir.join(&filename);

        let file = OpenOptions::new().create(true).append(true).open(&file_path)?;

        tracing::info!("Opened telemetry event log: {:?}", file_path);
        Ok((file_path, file))
    }

    fn record(&mut self, event: &TwinEvent) -> std::io::Result<()> {
        let line = event.to_jsonl();
        let bytes = line.as_bytes();

        if self.current_size + bytes.len() as u64 > MAX_FILE_SIZE {
            self.rotate()?;
        }

        self.writer.write_all(bytes)?;
        self.writer.write_all(b"\n")?;
        self.current_size += bytes.len() as u64 + 1;

        // Flush for durability
        self.writer.flush()?;
        Ok(())
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;

        let (new_path, new_file) = Self::open_new_file(&self.base_dir)?;
        self.writer = BufWriter::new(new_file);

        tracing::info!("Rotated event log from {:?} to {:?}", self.current_file, new_path);
        self.current_file = new_path;
        self.current_size = 0;

        Ok(())
    }
}

/// Handle shared by everything that emits events. A disabled log swallows
/// events without touching the filesystem.
pub struct EventLog {
    inner: Mutex<Option<Recorder>>,
}

impl EventLog {
    pub fn open(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let recorder = Recorder::new(base_dir.into())?;
        Ok(Self { inner: Mutex::new(Some(recorder)) })
    }

    pub fn disabled() -> Self {
        Self { inner: Mutex::new(None) }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Record an event. A write failure is logged, never propagated: the
    /// event stream must not take down the tick loop.
    pub fn record(&self, event: TwinEvent) {
        let mut guard = self.inner.lock();
        if let Some(recorder) = guard.as_mut() {
            if let Err(e) = recorder.record(&event) {
                tracing::error!("Failed to record telemetry event: {}", e);
            }
        }
    }

    pub fn current_file(&self) -> Option<PathBuf> {
        self.inner.lock().as_ref().map(|r| r.current_file.clone())
    }
}

/// Read all events back from a log file
pub fn read_events(file_path: &Path) -> std::io::Result<Vec<TwinEvent>> {
    let file = File::open(file_path)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if !line.is_empty() {
            if let Ok(event) = serde_json::from_str::<TwinEvent>(&line) {
                events.push(event);
            }
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::EventKind;
    use tempfile::TempDir;

    #[test]
    fn open_creates_log_file() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(temp_dir.path()).unwrap();
        assert!(log.is_enabled());
        assert!(log.current_file().unwrap().exists());
    }

    #[test]
    fn records_one_json_object_per_line() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::open(temp_dir.path()).unwrap();

        log.record(TwinEvent::engine_started(2000));
        log.record(TwinEvent::engine_stopped(3));

        let path = log.current_file().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert!(serde_json::from_str::<TwinEvent>(line).is_ok());
        }

        let events = read_events(&path).unwrap();
        assert_eq!(events[0].kind, EventKind::EngineStarted);
        assert_eq!(events[1].kind, EventKind::EngineStopped);
    }

    #[test]
    fn disabled_log_swallows_events() {
        let log = EventLog::disabled();
        assert!(!log.is_enabled());
        log.record(TwinEvent::engine_started(2000));
        assert!(log.current_file().is_none());
    }
}
