use clap::{Parser, Subcommand};
use coach_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "repcoach")]
#[command(about = "Adaptive strength coaching decision engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a completed exercise (one entry, today)
    Log {
        /// Exercise name as performed, e.g. "Back Squat"
        #[arg(long)]
        exercise: String,

        /// Number of identical sets performed
        #[arg(long, default_value_t = 1)]
        sets: u32,

        /// Reps per set
        #[arg(long)]
        reps: i32,

        /// Load per set in kg
        #[arg(long)]
        load: f64,

        /// Reps in reserve, if tracked
        #[arg(long)]
        rir: Option<f64>,
    },

    /// Recompute and list per-exercise performance snapshots
    Snapshots,

    /// Show the next-session target for an exercise
    Target {
        /// Exercise name (normalized before lookup)
        exercise: String,
    },

    /// Adapt a planned session to situational constraints
    Adapt {
        /// Path to the planned session (JSON array of exercises)
        #[arg(long)]
        plan: PathBuf,

        /// Minutes available (defaults from config)
        #[arg(long)]
        minutes: Option<u32>,

        /// Equipment mode (full_gym, limited, bodyweight)
        #[arg(long)]
        equipment: Option<String>,

        /// Body region to avoid (repeatable), e.g. knee, back/spine
        #[arg(long)]
        avoid: Vec<String>,

        /// Pain flag matched against exercise names (repeatable)
        #[arg(long)]
        pain: Vec<String>,

        /// Intensity preference (downshift, maintain, push)
        #[arg(long)]
        intensity: Option<String>,
    },

    /// Roll up journal entries to the CSV archive
    Rollup {
        /// Clean up processed journal files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

/// File layout under the data directory
struct DataPaths {
    journal_dir: PathBuf,
    journal: PathBuf,
    csv: PathBuf,
    snapshots: PathBuf,
}

impl DataPaths {
    fn new(data_dir: &Path) -> Self {
        let journal_dir = data_dir.join("journal");
        Self {
            journal: journal_dir.join("workouts.jsonl"),
            csv: data_dir.join("workouts.csv"),
            snapshots: journal_dir.join("snapshots.json"),
            journal_dir,
        }
    }
}

fn main() -> Result<()> {
    coach_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = DataPaths::new(&data_dir);

    match cli.command {
        Some(Commands::Log {
            exercise,
            sets,
            reps,
            load,
            rir,
        }) => cmd_log(&paths, &exercise, sets, reps, load, rir),
        Some(Commands::Target { exercise }) => cmd_target(&paths, &config, &exercise),
        Some(Commands::Adapt {
            plan,
            minutes,
            equipment,
            avoid,
            pain,
            intensity,
        }) => cmd_adapt(&config, &plan, minutes, equipment, avoid, pain, intensity),
        Some(Commands::Rollup { cleanup }) => cmd_rollup(&paths, cleanup),
        // Default to listing snapshots
        Some(Commands::Snapshots) | None => cmd_snapshots(&paths, &config),
    }
}

fn cmd_log(
    paths: &DataPaths,
    exercise: &str,
    sets: u32,
    reps: i32,
    load: f64,
    rir: Option<f64>,
) -> Result<()> {
    let now = chrono::Utc::now();
    let entry = WorkoutLogEntry {
        id: uuid::Uuid::new_v4(),
        date: now.date_naive(),
        logged_at: now,
        exercises: vec![ExercisePerformance {
            name: exercise.to_string(),
            sets: vec![
                SetPerformance {
                    reps,
                    load_kg: load,
                    rir,
                    rpe: None,
                };
                sets as usize
            ],
        }],
    };

    let mut sink = JsonlSink::new(&paths.journal);
    sink.append(&entry)?;

    println!(
        "✓ Logged {} x {} @ {} kg for {}",
        sets, reps, load, exercise
    );
    Ok(())
}

fn cmd_snapshots(paths: &DataPaths, config: &Config) -> Result<()> {
    let logs = load_recent_logs(
        &paths.journal,
        &paths.csv,
        config.progression.lookback_sessions,
    )?;

    if logs.is_empty() {
        println!("No training history yet - log a session first.");
        return Ok(());
    }

    let snapshots = compute_snapshots(&logs)?;

    let mut store = SnapshotStore::load(&paths.snapshots)?;
    store.upsert(snapshots.clone());
    store.save(&paths.snapshots)?;

    println!();
    println!(
        "  {:<28} {:>10} {:>8} {:>9}",
        "EXERCISE", "E1RM", "TREND", "SESSIONS"
    );
    println!("  {}", "─".repeat(58));
    for snapshot in &snapshots {
        let e1rm = snapshot
            .e1rm
            .map_or_else(|| "-".to_string(), |v| format!("{:.1} kg", v));
        println!(
            "  {:<28} {:>10} {:>+7.1}% {:>9}",
            snapshot.exercise_name,
            e1rm,
            snapshot.trend_score * 100.0,
            snapshot.sample_size
        );
    }
    println!();
    Ok(())
}

fn cmd_target(paths: &DataPaths, config: &Config, exercise: &str) -> Result<()> {
    let mut store = SnapshotStore::load(&paths.snapshots)?;

    // Recompute-then-read: a miss triggers exactly one recompute and one
    // re-read; the engine itself never loops.
    if store.get(exercise).is_none() {
        let logs = load_recent_logs(
            &paths.journal,
            &paths.csv,
            config.progression.lookback_sessions,
        )?;
        if !logs.is_empty() {
            store.upsert(compute_snapshots(&logs)?);
            store.save(&paths.snapshots)?;
        }
    }

    match store.get(exercise) {
        Some(snapshot) => {
            let target = pick_target(snapshot);
            display_target(&target);
        }
        None => {
            println!("No training history for '{}' yet.", exercise);
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_adapt(
    config: &Config,
    plan: &Path,
    minutes: Option<u32>,
    equipment: Option<String>,
    avoid: Vec<String>,
    pain: Vec<String>,
    intensity: Option<String>,
) -> Result<()> {
    let contents = std::fs::read_to_string(plan)?;
    let exercises: Vec<ExercisePrescription> = serde_json::from_str(&contents)?;

    let constraints = SessionConstraints {
        minutes_available: minutes.unwrap_or(config.adapter.default_minutes),
        equipment: parse_equipment(equipment.as_deref()),
        avoid_regions: avoid,
        pain_flags: pain,
        intensity: parse_intensity(intensity.as_deref()),
    };

    let adapted = adapt(&exercises, &constraints)?;
    display_adapted(&adapted);
    Ok(())
}

fn cmd_rollup(paths: &DataPaths, cleanup: bool) -> Result<()> {
    if !paths.journal.exists() {
        println!("No journal file found - nothing to roll up.");
        return Ok(());
    }

    let count = coach_core::archive::journal_to_csv_and_archive(&paths.journal, &paths.csv)?;

    println!("✓ Rolled up {} sessions to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = coach_core::archive::cleanup_processed_journals(&paths.journal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed journal files", cleaned);
        }
    }

    Ok(())
}

fn parse_equipment(value: Option<&str>) -> EquipmentMode {
    match value {
        None => EquipmentMode::FullGym,
        Some(raw) => match raw.to_lowercase().as_str() {
            "full_gym" | "full" | "gym" => EquipmentMode::FullGym,
            "limited" => EquipmentMode::Limited,
            "bodyweight" | "bw" => EquipmentMode::Bodyweight,
            other => {
                eprintln!("Unknown equipment mode: {}. Assuming full gym.", other);
                EquipmentMode::FullGym
            }
        },
    }
}

fn parse_intensity(value: Option<&str>) -> IntensityPreference {
    match value {
        None => IntensityPreference::Maintain,
        Some(raw) => match raw.to_lowercase().as_str() {
            "downshift" | "down" => IntensityPreference::Downshift,
            "maintain" => IntensityPreference::Maintain,
            "push" => IntensityPreference::Push,
            other => {
                eprintln!("Unknown intensity preference: {}. Maintaining.", other);
                IntensityPreference::Maintain
            }
        },
    }
}

fn display_target(target: &ProgressionTarget) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  NEXT SESSION TARGET");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", target.exercise_name);

    match target.target_load_kg {
        Some(load) => println!("  → Load: {} kg", load),
        None => println!("  → Load: pick by feel (no 1RM estimate yet)"),
    }
    println!("  → RIR: {}", target.target_rir);
    println!("  → {}", target.progression_note);
    println!();

    if let Some(e1rm) = target.e1rm {
        println!(
            "  Based on e1rm {:.1} kg, trend {:+.1}%, {} sessions",
            e1rm,
            target.trend_score * 100.0,
            target.sample_size
        );
        println!();
    }
}

fn display_adapted(session: &AdaptedSession) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  ADAPTED SESSION");
    println!("╰─────────────────────────────────────────╯");
    println!();

    for exercise in &session.exercises {
        print!(
            "  → {}: {} sets x {} @ {}",
            exercise.name, exercise.sets, exercise.reps, exercise.intensity
        );
        if let Some(ref note) = exercise.notes {
            print!("  ({})", note);
        }
        println!();
    }

    println!();
    println!("  {}", session.rationale);
    println!();
}
