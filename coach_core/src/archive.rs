//! CSV archive for logged workout history.
//!
//! Rolls the live JSONL journal into a flat CSV (one row per set) with
//! atomic handoff so a crash mid-rollup cannot lose sessions.

use crate::{Result, WorkoutLogEntry};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output (one per performed set)
#[derive(Debug, serde::Serialize)]
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

fn rows_for(entry: &WorkoutLogEntry) -> Vec<CsvRow> {
    let mut rows = Vec::new();
    for exercise in &entry.exercises {
        for set in &exercise.sets {
            rows.push(CsvRow {
                id: entry.id.to_string(),
                date: entry.date.to_string(),
                logged_at: entry.logged_at.to_rfc3339(),
                exercise: exercise.name.clone(),
                reps: set.reps,
                load_kg: set.load_kg,
                rir: set.rir,
                rpe: set.rpe,
            });
        }
    }
    rows
}

/// Roll up journal entries into CSV and archive the journal atomically
///
/// This function:
/// 1. Reads all entries from the journal
/// 2. Appends their sets to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Renames the journal to .processed
/// 5. Returns the number of entries processed
///
/// # Safety
/// - CSV is fsynced before the journal is renamed
/// - The journal is renamed (not deleted) to allow manual recovery
pub fn journal_to_csv_and_archive(journal_path: &Path, csv_path: &Path) -> Result<usize> {
    let entries = crate::journal::read_entries(journal_path)?;

    if entries.is_empty() {
        tracing::info!("No entries in journal to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Headers only when the file is brand new
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for entry in &entries {
        for row in rows_for(entry) {
            writer.serialize(row)?;
        }
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} entries to CSV archive", entries.len());

    let processed_path = journal_path.with_extension("jsonl.processed");
    std::fs::rename(journal_path, &processed_path)?;

    tracing::info!("Archived journal to {:?}", processed_path);

    Ok(entries.len())
}

/// Clean up old processed journal files in the given directory
pub fn cleanup_processed_journals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(extension) = path.extension() {
            if extension == "processed" {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed processed journal: {:?}", path);
                count += 1;
            }
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed journal files", count);
    }

    Ok(count)
}
