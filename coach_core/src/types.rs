//! Core domain types for the Repcoach decision engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Raw training history (logged sessions, exercises, sets)
//! - Derived performance snapshots and next-session targets
//! - Planned exercises and the constraints used to adapt them
//! - Rate-limit decisions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Raw Training History
// ============================================================================

/// One performed set within an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetPerformance {
    pub reps: i32,
    pub load_kg: f64,
    /// Reps in reserve, if the lifter recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rir: Option<f64>,
    /// Rate of perceived exertion, if the lifter recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe: Option<f64>,
}

/// All sets of one exercise within a logged session, in performed order
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExercisePerformance {
    pub name: String,
    pub sets: Vec<SetPerformance>,
}

/// A completed training session. Immutable once logged; the decision core
/// only ever reads these.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutLogEntry {
    pub id: Uuid,
    /// Calendar day the session was performed (local)
    pub date: NaiveDate,
    pub logged_at: DateTime<Utc>,
    pub exercises: Vec<ExercisePerformance>,
}

// ============================================================================
// Derived Progression Types
// ============================================================================

/// Per-exercise performance snapshot derived from the lookback window.
///
/// A snapshot is a cache: it is recomputed wholesale and replaced, never
/// hand-edited or merged. `e1rm` is `None` when no set in the window
/// qualified for 1RM estimation, and then `trend_score` is 0.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgressionSnapshot {
    /// Canonical exercise name (the join key across logs, snapshots, targets)
    pub exercise_name: String,
    pub e1rm: Option<f64>,
    /// Sum of reps x load across the window, eligible sets or not
    pub total_volume: f64,
    /// Dimensionless fractional rate of e1rm change per session; 0 = flat
    pub trend_score: f64,
    pub last_performed_date: NaiveDate,
    /// Count of distinct session dates containing the exercise
    pub sample_size: u32,
}

/// Presentation-ready prescription derived from exactly one snapshot.
/// Computed on read, never persisted.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ProgressionTarget {
    pub exercise_name: String,
    pub target_load_kg: Option<f64>,
    pub target_rir: i32,
    pub progression_note: String,
    pub e1rm: Option<f64>,
    pub trend_score: f64,
    pub sample_size: u32,
}

// ============================================================================
// Planned Sessions and Adaptation
// ============================================================================

/// A planned exercise, before or after adaptation.
///
/// This is the planner's record shape; adapted exercises use the same type
/// so they splice back into a daily plan unchanged.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExercisePrescription {
    pub name: String,
    pub sets: i32,
    /// Rep target as the planner wrote it, e.g. "5" or "8-12"
    pub reps: String,
    /// Intensity label, e.g. "RPE 7"
    pub intensity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Equipment available for the session being adapted
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentMode {
    #[default]
    FullGym,
    Limited,
    Bodyweight,
}

/// Requested intensity shift for the session being adapted
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntensityPreference {
    Downshift,
    #[default]
    Maintain,
    Push,
}

/// Situational constraints for rewriting a planned session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConstraints {
    /// Time budget in minutes; clamped to [10, 120] when applied
    #[serde(default = "default_minutes_available")]
    pub minutes_available: u32,

    #[serde(default)]
    pub equipment: EquipmentMode,

    /// Free-text body-region tags to avoid, e.g. "knee", "back/spine"
    #[serde(default)]
    pub avoid_regions: Vec<String>,

    /// Free-text tokens matched case-insensitively against exercise names
    #[serde(default)]
    pub pain_flags: Vec<String>,

    #[serde(default)]
    pub intensity: IntensityPreference,
}

fn default_minutes_available() -> u32 {
    45
}

impl Default for SessionConstraints {
    fn default() -> Self {
        Self {
            minutes_available: default_minutes_available(),
            equipment: EquipmentMode::default(),
            avoid_regions: Vec::new(),
            pain_flags: Vec::new(),
            intensity: IntensityPreference::default(),
        }
    }
}

/// An adapted session plus the explanation of what was done to it
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AdaptedSession {
    pub exercises: Vec<ExercisePrescription>,
    pub rationale: String,
}

// ============================================================================
// Admission Control
// ============================================================================

/// Outcome of a rate-limit check.
///
/// A rejection is a normal, expected outcome carrying a retry hint; it is
/// never surfaced as an error.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Seconds until a retry is expected to succeed; 0 when allowed
    pub retry_after_seconds: u64,
}
