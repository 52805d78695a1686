//! Workout history loading with a session-count lookback cap.
//!
//! Recent history is merged from the live JSONL journal and the archived
//! CSV, deduplicated by entry id, and capped at the most recent N sessions.
//! The decision core never assumes input ordering, but the loader still
//! returns entries newest first for the callers that print them.

use crate::{ExercisePerformance, Result, SetPerformance, WorkoutLogEntry};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// CSV row format for reading archived sets (one row per set)
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    date: String,
    logged_at: String,
    exercise: String,
    reps: i32,
    load_kg: f64,
    rir: Option<f64>,
    rpe: Option<f64>,
}

/// Load the most recent `limit` sessions from both journal and CSV archive
///
/// Entries present in both sources (logged but not yet archived twice) are
/// deduplicated by id, journal winning. Returns entries sorted by date,
/// newest first.
pub fn load_recent_logs(
    journal_path: &Path,
    csv_path: &Path,
    limit: usize,
) -> Result<Vec<WorkoutLogEntry>> {
    let mut entries = Vec::new();
    let mut seen_ids = HashSet::new();

    // Journal first (most recent)
    if journal_path.exists() {
        for entry in crate::journal::read_entries(journal_path)? {
            seen_ids.insert(entry.id);
            entries.push(entry);
        }
        tracing::debug!("Loaded {} entries from journal", entries.len());
    }

    // CSV archive
    if csv_path.exists() {
        let archived = load_entries_from_csv(csv_path)?;
        let mut csv_count = 0;
        for entry in archived {
            if !seen_ids.contains(&entry.id) {
                seen_ids.insert(entry.id);
                entries.push(entry);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} entries from CSV archive", csv_count);
    }

    // Sort by date, newest first; logged_at breaks same-day ties
    entries.sort_by(|a, b| (b.date, b.logged_at).cmp(&(a.date, a.logged_at)));
    entries.truncate(limit);

    tracing::info!(
        "Loaded {} sessions (lookback cap {})",
        entries.len(),
        limit
    );

    Ok(entries)
}

/// Rebuild full entries from the flat per-set CSV rows
fn load_entries_from_csv(path: &Path) -> Result<Vec<WorkoutLogEntry>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut entries: Vec<WorkoutLogEntry> = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
                continue;
            }
        };

        let (id, date, logged_at) = match parse_row_keys(&row) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to parse CSV row: {}", e);
                continue;
            }
        };

        let set = SetPerformance {
            reps: row.reps,
            load_kg: row.load_kg,
            rir: row.rir,
            rpe: row.rpe,
        };

        // Rows for one entry are contiguous in practice, but search by id
        // anyway so reordered archives still group correctly.
        let idx = match entries.iter().position(|e| e.id == id) {
            Some(idx) => idx,
            None => {
                entries.push(WorkoutLogEntry {
                    id,
                    date,
                    logged_at,
                    exercises: Vec::new(),
                });
                entries.len() - 1
            }
        };
        let entry = &mut entries[idx];

        match entry
            .exercises
            .iter_mut()
            .find(|e| e.name == row.exercise)
        {
            Some(exercise) => exercise.sets.push(set),
            None => entry.exercises.push(ExercisePerformance {
                name: row.exercise,
                sets: vec![set],
            }),
        }
    }

    Ok(entries)
}

fn parse_row_keys(row: &CsvRow) -> Result<(Uuid, chrono::NaiveDate, DateTime<Utc>)> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|e| crate::Error::Other(format!("Invalid UUID: {}", e)))?;

    let date = row
        .date
        .parse()
        .map_err(|e| crate::Error::Other(format!("Invalid date: {}", e)))?;

    let logged_at = DateTime::parse_from_rfc3339(&row.logged_at)
        .map_err(|e| crate::Error::Other(format!("Invalid timestamp: {}", e)))?
        .with_timezone(&Utc);

    Ok((id, date, logged_at))
}
