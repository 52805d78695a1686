//! Per-exercise performance snapshots from raw training history.
//!
//! This module turns workout log rows into canonical `ProgressionSnapshot`
//! values: estimated one-rep max (Epley), accumulated volume, a normalized
//! trend score, and sample bookkeeping. Snapshots are a derived cache:
//! recomputing twice over identical input yields identical output.

use crate::{Error, ProgressionSnapshot, Result, WorkoutLogEntry};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Rep window in which the Epley estimate is trusted; outside it the
/// formula degrades and the set is excluded from 1RM estimation.
const E1RM_MIN_REPS: i32 = 1;
const E1RM_MAX_REPS: i32 = 12;

/// Canonicalize a user-supplied exercise name.
///
/// Case-folds, trims, collapses internal whitespace, and strips trailing
/// punctuation, so "Back Squat", "back squat " and "BACK SQUAT" index the
/// same snapshot. Applied on both the write side (snapshot keys) and the
/// read side (target lookups); idempotent.
pub fn normalize(name: &str) -> String {
    let folded = name.to_lowercase();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
        .to_string()
}

/// Epley estimate of a one-rep max from a sub-maximal set
fn epley_e1rm(reps: i32, load_kg: f64) -> f64 {
    load_kg * (1.0 + f64::from(reps) / 30.0)
}

/// Whether a set qualifies for 1RM estimation
fn e1rm_eligible(reps: i32, load_kg: f64) -> bool {
    (E1RM_MIN_REPS..=E1RM_MAX_REPS).contains(&reps) && load_kg > 0.0
}

/// Working accumulator per canonical exercise name
#[derive(Default)]
struct ExerciseHistory {
    total_volume: f64,
    /// Best eligible per-set e1rm for each session date
    session_best: BTreeMap<NaiveDate, f64>,
    /// Distinct session dates containing the exercise, eligible sets or not
    session_dates: std::collections::BTreeSet<NaiveDate>,
}

/// Compute one snapshot per distinct canonical exercise name in the input.
///
/// Input ordering is not assumed; sessions are ordered by date internally.
/// Exercises that never appear with at least one set produce no snapshot.
/// Non-finite or negative numeric fields are rejected as a validation
/// failure, never silently folded into the math.
pub fn compute_snapshots(logs: &[WorkoutLogEntry]) -> Result<Vec<ProgressionSnapshot>> {
    validate_logs(logs)?;

    let mut histories: BTreeMap<String, ExerciseHistory> = BTreeMap::new();

    for entry in logs {
        for exercise in &entry.exercises {
            if exercise.sets.is_empty() {
                continue;
            }

            let canonical = normalize(&exercise.name);
            if canonical.is_empty() {
                tracing::warn!("Skipping unnamed exercise logged on {}", entry.date);
                continue;
            }

            let history = histories.entry(canonical).or_default();
            history.session_dates.insert(entry.date);

            for set in &exercise.sets {
                history.total_volume += f64::from(set.reps) * set.load_kg;

                if e1rm_eligible(set.reps, set.load_kg) {
                    let estimate = epley_e1rm(set.reps, set.load_kg);
                    let best = history.session_best.entry(entry.date).or_insert(estimate);
                    if estimate > *best {
                        *best = estimate;
                    }
                }
            }
        }
    }

    let snapshots = histories
        .into_iter()
        .map(|(name, history)| snapshot_from_history(name, &history))
        .collect::<Vec<_>>();

    tracing::debug!(
        "Computed {} snapshots from {} log entries",
        snapshots.len(),
        logs.len()
    );

    Ok(snapshots)
}

fn validate_logs(logs: &[WorkoutLogEntry]) -> Result<()> {
    for entry in logs {
        for exercise in &entry.exercises {
            for set in &exercise.sets {
                if !set.load_kg.is_finite() || set.load_kg < 0.0 {
                    return Err(Error::Validation(format!(
                        "malformed load {} for '{}' on {}",
                        set.load_kg, exercise.name, entry.date
                    )));
                }
                if set.reps < 0 {
                    return Err(Error::Validation(format!(
                        "negative rep count {} for '{}' on {}",
                        set.reps, exercise.name, entry.date
                    )));
                }
            }
        }
    }
    Ok(())
}

fn snapshot_from_history(name: String, history: &ExerciseHistory) -> ProgressionSnapshot {
    // Max eligible estimate across the window. Values being equal, the
    // BTreeMap iteration order makes the most recent session win.
    let mut e1rm: Option<f64> = None;
    for estimate in history.session_best.values() {
        if e1rm.map_or(true, |best| *estimate >= best) {
            e1rm = Some(*estimate);
        }
    }

    let per_session: Vec<f64> = history.session_best.values().copied().collect();
    let trend_score = normalized_trend(&per_session);

    let last_performed_date = history
        .session_dates
        .iter()
        .next_back()
        .copied()
        .unwrap_or_default();

    ProgressionSnapshot {
        exercise_name: name,
        e1rm,
        total_volume: history.total_volume,
        trend_score,
        last_performed_date,
        sample_size: history.session_dates.len() as u32,
    }
}

/// Least-squares slope of `values` against their session index, scaled by
/// the mean so the result is a dimensionless fractional rate per session
/// (+0.03 reads as roughly "+3% per session").
///
/// The regression method is a tunable policy; only the sign and the
/// magnitude bands consumed downstream are contractual. Fewer than two
/// qualifying sessions report a flat trend.
fn normalized_trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;

    for (i, value) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += value;
        sum_xy += x * value;
        sum_x2 += x * x;
    }

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let mean = sum_y / n;
    if mean.abs() < f64::EPSILON {
        return 0.0;
    }

    slope / mean
}
