//! Prescription engine for next-session targets.
//!
//! Turns one performance snapshot into a concrete prescription: a target
//! load, a reps-in-reserve budget, and a one-line rationale. This is a
//! total pure function; callers that find no snapshot recompute and retry
//! once (the engine itself never loops).

use crate::{ProgressionSnapshot, ProgressionTarget};

/// Working-load fraction of the estimated one-rep max
const BASE_LOAD_FRACTION: f64 = 0.72;

/// Trend band half-width; at or beyond it the prescription branches.
/// This module is the single source of truth for these thresholds.
const TREND_BAND: f64 = 0.03;

/// Load multiplier when the trend clears the band upward
const PROGRESS_MULTIPLIER: f64 = 1.03;
/// Load multiplier when the trend clears the band downward
const REGRESS_MULTIPLIER: f64 = 0.96;

/// Loads are prescribed in plate-friendly increments
const LOAD_INCREMENT_KG: f64 = 2.5;

const NOTE_PROGRESS: &str = "progressing well, add a small load increase";
const NOTE_REGRESS: &str = "recent regression, reduce load and own technique";
const NOTE_MAINTAIN: &str = "maintain load, focus on clean reps";

/// Derive the next-session target from a snapshot.
///
/// Total function: every snapshot maps to a target. A snapshot without a
/// usable e1rm yields no load target but still carries the RIR budget and
/// rationale.
pub fn pick_target(snapshot: &ProgressionSnapshot) -> ProgressionTarget {
    let base_load = snapshot
        .e1rm
        .filter(|estimate| *estimate > 0.0)
        .map_or(0.0, |estimate| estimate * BASE_LOAD_FRACTION);

    let (multiplier, target_rir, note) = if snapshot.trend_score >= TREND_BAND {
        (PROGRESS_MULTIPLIER, 1, NOTE_PROGRESS)
    } else if snapshot.trend_score <= -TREND_BAND {
        (REGRESS_MULTIPLIER, 3, NOTE_REGRESS)
    } else {
        (1.0, 2, NOTE_MAINTAIN)
    };

    let target_load_kg = if base_load > 0.0 {
        Some(round_to_increment(base_load * multiplier))
    } else {
        None
    };

    ProgressionTarget {
        exercise_name: snapshot.exercise_name.clone(),
        target_load_kg,
        target_rir,
        progression_note: note.to_string(),
        e1rm: snapshot.e1rm,
        trend_score: snapshot.trend_score,
        sample_size: snapshot.sample_size,
    }
}

fn round_to_increment(load_kg: f64) -> f64 {
    (load_kg / LOAD_INCREMENT_KG).round() * LOAD_INCREMENT_KG
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(e1rm: Option<f64>, trend_score: f64) -> ProgressionSnapshot {
        ProgressionSnapshot {
            exercise_name: "back squat".into(),
            e1rm,
            total_volume: 5000.0,
            trend_score,
            last_performed_date: "2026-07-15".parse().unwrap(),
            sample_size: 6,
        }
    }

    #[test]
    fn test_progressing_snapshot_gets_load_increase() {
        let target = pick_target(&snapshot(Some(135.0), 0.04));

        // 135 * 0.72 * 1.03 = 100.116, rounded to the nearest 2.5
        assert_eq!(target.target_load_kg, Some(100.0));
        assert_eq!(target.target_rir, 1);
        assert_eq!(target.progression_note, NOTE_PROGRESS);
    }

    #[test]
    fn test_regressing_snapshot_gets_load_reduction() {
        let target = pick_target(&snapshot(Some(135.0), -0.05));

        // 135 * 0.72 * 0.96 = 93.312 -> 92.5
        assert_eq!(target.target_load_kg, Some(92.5));
        assert_eq!(target.target_rir, 3);
        assert_eq!(target.progression_note, NOTE_REGRESS);
    }

    #[test]
    fn test_flat_snapshot_maintains() {
        let target = pick_target(&snapshot(Some(100.0), 0.0));

        // 100 * 0.72 = 72 -> 72.5
        assert_eq!(target.target_load_kg, Some(72.5));
        assert_eq!(target.target_rir, 2);
        assert_eq!(target.progression_note, NOTE_MAINTAIN);
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        assert_eq!(pick_target(&snapshot(Some(100.0), 0.03)).target_rir, 1);
        assert_eq!(pick_target(&snapshot(Some(100.0), -0.03)).target_rir, 3);
        assert_eq!(pick_target(&snapshot(Some(100.0), 0.029)).target_rir, 2);
        assert_eq!(pick_target(&snapshot(Some(100.0), -0.029)).target_rir, 2);
    }

    #[test]
    fn test_rounding_increment_is_two_point_five() {
        // 101.0 * 0.72 = 72.72 -> 72.5; 104.0 * 0.72 = 74.88 -> 75.0
        assert_eq!(
            pick_target(&snapshot(Some(101.0), 0.0)).target_load_kg,
            Some(72.5)
        );
        assert_eq!(
            pick_target(&snapshot(Some(104.0), 0.0)).target_load_kg,
            Some(75.0)
        );
    }

    #[test]
    fn test_no_e1rm_means_no_load_target() {
        let target = pick_target(&snapshot(None, 0.0));
        assert_eq!(target.target_load_kg, None);
        assert_eq!(target.target_rir, 2);
        assert_eq!(target.progression_note, NOTE_MAINTAIN);
    }

    #[test]
    fn test_target_is_deterministic() {
        let snap = snapshot(Some(122.5), 0.031);
        assert_eq!(pick_target(&snap), pick_target(&snap));
    }

    #[test]
    fn test_source_fields_carried_through() {
        let target = pick_target(&snapshot(Some(135.0), 0.04));
        assert_eq!(target.e1rm, Some(135.0));
        assert_eq!(target.trend_score, 0.04);
        assert_eq!(target.sample_size, 6);
        assert_eq!(target.exercise_name, "back squat");
    }
}
