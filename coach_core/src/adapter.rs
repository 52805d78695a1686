//! Session adapter: rewrites an already-planned exercise list under
//! real-time constraints.
//!
//! Given a time budget, equipment availability, pain/avoidance flags, and
//! an intensity preference, the adapter substitutes unsafe or unavailable
//! exercises, rescales volume, and trims the session to fit the clock while
//! keeping the original plan's order and intent. Pure and total; the only
//! failure is a rejected input list.

use crate::{
    AdaptedSession, EquipmentMode, Error, ExercisePrescription, IntensityPreference, Result,
    SessionConstraints,
};
use once_cell::sync::Lazy;

/// Session time-budget bounds in minutes
const MIN_MINUTES: u32 = 10;
const MAX_MINUTES: u32 = 120;

/// Set-count bounds after rescaling
const MIN_SETS: i32 = 1;
const MAX_SETS: i32 = 8;

/// Set multipliers per intensity preference
const DOWNSHIFT_MULTIPLIER: f64 = 0.8;
const PUSH_MULTIPLIER: f64 = 1.1;

/// Every exercise costs at least this many minutes, warm-up included
const MIN_EXERCISE_MINUTES: u32 = 4;
const MINUTES_PER_SET: u32 = 2;

/// Safe catch-all when no substitution family survives the exclusion rules
const GENERIC_ALTERNATIVE: &str = "Bodyweight Circuit";

const SUBSTITUTION_NOTE: &str = "substituted to work around a reported constraint";

const RATIONALE_TRIMMED: &str =
    "session shortened to fit available time while preserving core stimulus";
const RATIONALE_ADAPTED: &str =
    "session adapted using constraints for equipment, body-region avoidance, and intensity preference";

/// Movement patterns excluded while a body region is being avoided
#[derive(Clone, Debug)]
pub struct RegionRule {
    /// Tokens that activate the rule when found in an avoid tag
    pub region_keys: Vec<&'static str>,
    /// Exercise-name patterns (lowercase substrings) excluded while active
    pub patterns: Vec<&'static str>,
}

/// A movement family with deterministic safe alternatives
#[derive(Clone, Debug)]
pub struct SubstitutionFamily {
    /// Lowercase substrings that place an exercise in the family
    pub patterns: Vec<&'static str>,
    pub gym_alternative: &'static str,
    pub bodyweight_alternative: &'static str,
}

/// Region-exclusion and substitution tables for the adapter.
///
/// Data, not control flow: the rule set is testable and extensible on its
/// own, and `adapt_with_rulebook` accepts a custom instance.
#[derive(Clone, Debug)]
pub struct Rulebook {
    pub region_rules: Vec<RegionRule>,
    pub families: Vec<SubstitutionFamily>,
}

/// Cached default rulebook - built once and reused across all operations
static DEFAULT_RULEBOOK: Lazy<Rulebook> = Lazy::new(build_default_rulebook);

/// Get a reference to the cached default rulebook
pub fn default_rulebook() -> &'static Rulebook {
    &DEFAULT_RULEBOOK
}

/// Builds the default rulebook
///
/// **Note**: For production use, prefer `default_rulebook()` which returns
/// a cached reference. This function is retained for testing and custom
/// rule sets.
pub fn build_default_rulebook() -> Rulebook {
    Rulebook {
        region_rules: vec![
            RegionRule {
                region_keys: vec!["knee"],
                patterns: vec![
                    "back squat",
                    "front squat",
                    "barbell squat",
                    "overhead squat",
                    "split squat",
                    "pistol squat",
                    "squat jump",
                    "jump squat",
                    "lunge",
                    "step-up",
                    "step up",
                    "leg press",
                    "leg-press",
                    "leg extension",
                ],
            },
            RegionRule {
                region_keys: vec!["back", "spine"],
                patterns: vec![
                    "deadlift",
                    "rdl",
                    "romanian",
                    "good morning",
                    "good-morning",
                    "barbell row",
                    "bent-over row",
                    "bent over row",
                ],
            },
            RegionRule {
                region_keys: vec!["shoulder"],
                patterns: vec![
                    "overhead press",
                    "shoulder press",
                    "military press",
                    "push press",
                    "push-up",
                    "push up",
                    "pushup",
                    "overhead",
                ],
            },
        ],
        families: vec![
            SubstitutionFamily {
                patterns: vec!["squat", "lunge", "leg press", "leg-press", "step-up", "step up"],
                gym_alternative: "Goblet Squat",
                bodyweight_alternative: "Bodyweight Box Squat",
            },
            SubstitutionFamily {
                patterns: vec![
                    "deadlift",
                    "rdl",
                    "romanian",
                    "good morning",
                    "good-morning",
                    "hinge",
                ],
                gym_alternative: "Dumbbell RDL",
                bodyweight_alternative: "Hip Hinge Drill",
            },
            SubstitutionFamily {
                patterns: vec!["press", "push"],
                gym_alternative: "Floor Press",
                bodyweight_alternative: "Incline Push-up",
            },
            SubstitutionFamily {
                patterns: vec!["row", "pull"],
                gym_alternative: "Single-Arm Dumbbell Row",
                bodyweight_alternative: "Inverted Row",
            },
        ],
    }
}

impl Rulebook {
    /// Region rules activated by the supplied avoid tags
    fn active_rules(&self, avoid_regions: &[String]) -> Vec<&RegionRule> {
        self.region_rules
            .iter()
            .filter(|rule| {
                avoid_regions.iter().any(|tag| {
                    let tag = tag.to_lowercase();
                    rule.region_keys.iter().any(|key| tag.contains(key))
                })
            })
            .collect()
    }

    /// First family whose pattern matches the (lowercased) exercise name
    fn family_for(&self, name_folded: &str) -> Option<&SubstitutionFamily> {
        self.families
            .iter()
            .find(|family| family.patterns.iter().any(|p| name_folded.contains(p)))
    }
}

/// Adapt a planned session with the default rulebook
pub fn adapt(
    exercises: &[ExercisePrescription],
    constraints: &SessionConstraints,
) -> Result<AdaptedSession> {
    adapt_with_rulebook(exercises, constraints, default_rulebook())
}

/// Adapt a planned session with an explicit rulebook.
///
/// Decision order per exercise: exclusion test, substitution, rescale.
/// Then the whole list is time-boxed. Truncation only ever drops trailing
/// exercises; it never reorders or re-substitutes.
pub fn adapt_with_rulebook(
    exercises: &[ExercisePrescription],
    constraints: &SessionConstraints,
    rulebook: &Rulebook,
) -> Result<AdaptedSession> {
    validate_plan(exercises)?;

    let minutes_available = constraints.minutes_available.clamp(MIN_MINUTES, MAX_MINUTES);
    let active_rules = rulebook.active_rules(&constraints.avoid_regions);

    let mut adapted: Vec<ExercisePrescription> = Vec::with_capacity(exercises.len());
    for exercise in exercises {
        let fired = matching_exclusions(&exercise.name, &active_rules, &constraints.pain_flags);

        let (mut rewritten, substituted) = if fired.is_empty() {
            (exercise.clone(), false)
        } else {
            tracing::debug!(
                "Excluding '{}' (matched: {})",
                exercise.name,
                fired.join(", ")
            );
            (
                substitute(
                    exercise,
                    rulebook,
                    constraints.equipment,
                    &active_rules,
                    &constraints.pain_flags,
                ),
                true,
            )
        };

        rescale(&mut rewritten, substituted, constraints.intensity);
        adapted.push(rewritten);
    }

    let estimated = estimate_minutes(&adapted);
    let trimmed = estimated > minutes_available;
    if trimmed {
        let keep = (f64::from(minutes_available) / f64::from(estimated)
            * adapted.len() as f64)
            .floor() as usize;
        adapted.truncate(keep.max(1));
        tracing::info!(
            "Trimmed session to {} exercises to fit {} minutes (estimated {})",
            adapted.len(),
            minutes_available,
            estimated
        );
    }

    let rationale = if trimmed {
        RATIONALE_TRIMMED
    } else {
        RATIONALE_ADAPTED
    };

    Ok(AdaptedSession {
        exercises: adapted,
        rationale: rationale.to_string(),
    })
}

fn validate_plan(exercises: &[ExercisePrescription]) -> Result<()> {
    if exercises.is_empty() {
        return Err(Error::Validation(
            "planned session has no exercises".into(),
        ));
    }
    for exercise in exercises {
        if exercise.name.trim().is_empty() {
            return Err(Error::Validation("planned exercise has no name".into()));
        }
        if exercise.sets < 0 {
            return Err(Error::Validation(format!(
                "negative set count {} for '{}'",
                exercise.sets, exercise.name
            )));
        }
    }
    Ok(())
}

/// Every exclusion pattern or pain token that matches the exercise name
fn matching_exclusions(
    name: &str,
    active_rules: &[&RegionRule],
    pain_flags: &[String],
) -> Vec<String> {
    let name_folded = name.to_lowercase();
    let mut fired = Vec::new();

    for rule in active_rules {
        for pattern in &rule.patterns {
            if name_folded.contains(pattern) {
                fired.push((*pattern).to_string());
            }
        }
    }
    for flag in pain_flags {
        let token = flag.trim().to_lowercase();
        if !token.is_empty() && name_folded.contains(&token) {
            fired.push(token);
        }
    }

    fired
}

/// Replace an excluded exercise with its family's safe alternative.
///
/// Candidates are tried in order and the first that itself passes the
/// exclusion test wins, so a replacement can never trip the constraints
/// that removed the original. The generic circuit is the last resort.
fn substitute(
    exercise: &ExercisePrescription,
    rulebook: &Rulebook,
    equipment: EquipmentMode,
    active_rules: &[&RegionRule],
    pain_flags: &[String],
) -> ExercisePrescription {
    let name_folded = exercise.name.to_lowercase();
    let family = rulebook.family_for(&name_folded);

    let mut candidates: Vec<&str> = Vec::new();
    if let Some(family) = family {
        match equipment {
            EquipmentMode::Bodyweight => candidates.push(family.bodyweight_alternative),
            EquipmentMode::FullGym | EquipmentMode::Limited => {
                candidates.push(family.gym_alternative);
                candidates.push(family.bodyweight_alternative);
            }
        }
    }
    candidates.push(GENERIC_ALTERNATIVE);

    let replacement = candidates
        .into_iter()
        .find(|candidate| matching_exclusions(candidate, active_rules, pain_flags).is_empty())
        .unwrap_or(GENERIC_ALTERNATIVE);

    ExercisePrescription {
        name: replacement.to_string(),
        sets: exercise.sets,
        reps: exercise.reps.clone(),
        intensity: exercise.intensity.clone(),
        notes: Some(SUBSTITUTION_NOTE.to_string()),
    }
}

/// Rescale set volume and override the intensity label where the
/// preference calls for it
fn rescale(
    exercise: &mut ExercisePrescription,
    substituted: bool,
    intensity: IntensityPreference,
) {
    let multiplier = match intensity {
        IntensityPreference::Downshift => DOWNSHIFT_MULTIPLIER,
        IntensityPreference::Push => PUSH_MULTIPLIER,
        IntensityPreference::Maintain => 1.0,
    };

    let rescaled = (f64::from(exercise.sets) * multiplier).round() as i32;
    exercise.sets = rescaled.clamp(MIN_SETS, MAX_SETS);

    let label = match (substituted, intensity) {
        (true, IntensityPreference::Downshift) => Some("RPE 5-6"),
        (false, IntensityPreference::Downshift) => Some("RPE 6"),
        (_, IntensityPreference::Push) => Some("RPE 8"),
        _ => None,
    };
    if let Some(label) = label {
        exercise.intensity = label.to_string();
    }
}

/// Estimated session length: every exercise costs at least four minutes,
/// two per set beyond that floor
fn estimate_minutes(exercises: &[ExercisePrescription]) -> u32 {
    exercises
        .iter()
        .map(|e| (e.sets.max(0) as u32 * MINUTES_PER_SET).max(MIN_EXERCISE_MINUTES))
        .sum()
}
