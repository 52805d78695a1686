//! Append-only workout journal.
//!
//! Logged sessions append to a JSONL (JSON Lines) file with file locking
//! to ensure safe concurrent access. The journal is the write path; reads
//! for snapshot recomputation go through `history::load_recent_logs`.

use crate::{Result, WorkoutLogEntry};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Sink trait for persisting logged sessions
pub trait LogSink {
    fn append(&mut self, entry: &WorkoutLogEntry) -> Result<()>;
}

/// JSONL-based journal sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl LogSink for JsonlSink {
    fn append(&mut self, entry: &WorkoutLogEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Exclusive lock serializes concurrent writers
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended log entry {} to journal", entry.id);
        Ok(())
    }
}

/// Read all entries from a journal file.
///
/// Lines that fail to parse are skipped with a warning so one corrupt
/// record cannot take the whole history down.
pub fn read_entries(path: &Path) -> Result<Vec<WorkoutLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<WorkoutLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse journal line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} entries from journal", entries.len());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExercisePerformance, SetPerformance};
    use chrono::Utc;
    use uuid::Uuid;

    fn test_entry(exercise: &str) -> WorkoutLogEntry {
        WorkoutLogEntry {
            id: Uuid::new_v4(),
            date: Utc::now().date_naive(),
            logged_at: Utc::now(),
            exercises: vec![ExercisePerformance {
                name: exercise.into(),
                sets: vec![SetPerformance {
                    reps: 5,
                    load_kg: 100.0,
                    rir: Some(2.0),
                    rpe: None,
                }],
            }],
        }
    }

    #[test]
    fn test_append_and_read_single_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("workouts.jsonl");

        let entry = test_entry("Back Squat");
        let entry_id = entry.id;

        let mut sink = JsonlSink::new(&journal_path);
        sink.append(&entry).unwrap();

        let entries = read_entries(&journal_path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, entry_id);
        assert_eq!(entries[0].exercises[0].name, "Back Squat");
    }

    #[test]
    fn test_append_multiple_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("workouts.jsonl");

        let mut sink = JsonlSink::new(&journal_path);
        for _ in 0..5 {
            sink.append(&test_entry("Deadlift")).unwrap();
        }

        let entries = read_entries(&journal_path).unwrap();
        assert_eq!(entries.len(), 5);
    }

    #[test]
    fn test_read_missing_journal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("nonexistent.jsonl");

        let entries = read_entries(&journal_path).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_corrupt_line_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal_path = temp_dir.path().join("workouts.jsonl");

        let mut sink = JsonlSink::new(&journal_path);
        sink.append(&test_entry("Bench Press")).unwrap();

        // Inject a corrupt line between two good ones
        {
            use std::io::Write as IoWrite;
            let mut file = OpenOptions::new().append(true).open(&journal_path).unwrap();
            writeln!(file, "{{ not json").unwrap();
        }
        sink.append(&test_entry("Overhead Press")).unwrap();

        let entries = read_entries(&journal_path).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
