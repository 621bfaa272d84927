//! Command implementations.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use rehab_core::{BuiltInExercise, Error, OptimalRange, SessionResult, Timestamp};
use rehab_motion::Guidance;
use rehab_session::{
    record_session, CalibrationRecorder, EngineConfig, ExerciseSession, ExerciseStore,
    JsonFileStore, JsonLinesSource, PatientStore, SessionConfig, SessionReport, StopHandle,
};

use crate::{AssignArgs, CalibrateArgs, Cli, Commands, OutputFormat, ProgressArgs, TrackArgs};

/// Run the parsed command line
pub async fn execute(cli: Cli) -> Result<()> {
    let mut config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(store) = cli.store {
        config.storage.path = store;
    }

    match cli.command {
        Commands::Track(args) => execute_track(&config, args).await,
        Commands::Calibrate(args) => execute_calibrate(&config, args).await,
        Commands::Assign(args) => execute_assign(&config, args).await,
        Commands::Exercises => execute_exercises(&config).await,
        Commands::Progress(args) => execute_progress(&config, args).await,
        Commands::Version => {
            println!("rehab {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn open_store(config: &EngineConfig) -> Result<JsonFileStore> {
    let path = &config.storage.path;
    JsonFileStore::open(path)
        .await
        .with_context(|| format!("opening store {}", path.display()))
}

fn optimal_range(min: Option<f64>, max: Option<f64>) -> Result<Option<OptimalRange>> {
    match (min, max) {
        (Some(min), Some(max)) if min < max => Ok(Some(OptimalRange::new(min, max))),
        (Some(min), Some(max)) => bail!("optimal range min ({min}) must be below max ({max})"),
        _ => Ok(None),
    }
}

/// Stop `handle` on Ctrl-C
fn stop_on_ctrl_c(handle: StopHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, finishing");
            handle.stop().await;
        }
    });
}

async fn execute_track(config: &EngineConfig, args: TrackArgs) -> Result<()> {
    let store = open_store(config).await?;

    let mut session_config = SessionConfig::from_settings(&args.exercise, &config.session);
    if let Some(reps) = args.target_reps {
        session_config = session_config.with_target_reps(reps);
    }
    if let Some(range) = optimal_range(args.opt_min, args.opt_max)? {
        session_config = session_config.with_optimal_range(range);
    }
    if let Some(countdown) = args.countdown {
        session_config.tracker.countdown_secs = countdown.max(0.0);
    }
    if let Some(secs) = args.max_duration {
        let ceiling = Duration::try_from_secs_f64(secs.max(0.0))
            .with_context(|| format!("--max-duration {secs} is out of range"))?;
        session_config = session_config.with_max_duration(ceiling);
    }

    let session = ExerciseSession::prepare(session_config, &store, args.patient.as_deref())
        .await
        .with_context(|| format!("preparing '{}'", args.exercise))?;
    stop_on_ctrl_c(session.stop_handle());

    let mut source = JsonLinesSource::new(&args.input);
    let report = match session.run(&mut source).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(empty) = unavailable_result(&e, session.optimal_range()) {
                match args.format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&empty)?),
                    OutputFormat::Text => {
                        println!("{}: source unavailable", args.exercise);
                        print_result(&empty);
                    }
                }
            }
            return Err(e).with_context(|| format!("tracking from {}", args.input.display()));
        }
    };

    if args.save {
        if let Some(patient) = &args.patient {
            record_session(&store, patient, &args.exercise, report.result.clone()).await?;
        }
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    if args.save {
        if let Some(patient) = &args.patient {
            print_sets_remaining(&store, patient, &args.exercise).await?;
        }
    }
    Ok(())
}

/// Zeroed result reported when the pose source never opened
fn unavailable_result(err: &Error, opt_range: Option<OptimalRange>) -> Option<SessionResult> {
    match err {
        Error::SourceUnavailable(_) => Some(SessionResult::empty(
            opt_range,
            Timestamp::now().to_datetime(),
        )),
        _ => None,
    }
}

fn print_report(report: &SessionReport) {
    let r = &report.result;
    println!("{}: {} reps ({:?})", report.exercise, r.reps, report.stop_reason);
    println!(
        "  Frames: {} seen, {} scored, {} skipped",
        report.frames.frames_seen, report.frames.frames_scored, report.frames.frames_skipped
    );
    print_result(r);
    println!("  {}", report.guidance.message());
}

fn print_result(r: &SessionResult) {
    println!("  Reps: {}", r.reps);
    println!("  Working range: {}° - {}°", r.range_avg_low, r.range_avg_high);
    println!("  Rep range: {}° - {}° (spread {}°)", r.rep_min, r.rep_max, r.rep_range);
    println!("  Overall average: {}°", r.overall_avg);
    match r.opt_range {
        Some(opt) => println!("  Optimal range: {}° - {}°", opt.min, opt.max),
        None => println!("  Optimal range: none"),
    }
    println!("  Deviation: {}%", r.deviation_percent);
}

async fn print_sets_remaining(store: &JsonFileStore, patient: &str, exercise: &str) -> Result<()> {
    let definition = store.exercise(exercise).await?;
    let Some(record) = store.patient(patient).await? else {
        return Ok(());
    };
    if let Some(remaining) = record.sets_remaining(exercise, definition.as_ref()) {
        let done = record.sets_completed.get(exercise).copied().unwrap_or(0);
        println!("  Sets completed: {done}, remaining: {remaining}");
    }
    Ok(())
}

async fn execute_calibrate(config: &EngineConfig, args: CalibrateArgs) -> Result<()> {
    if args.name.parse::<BuiltInExercise>().is_ok() {
        bail!("'{}' is a built-in exercise name", args.name);
    }
    let store = open_store(config).await?;

    let mut settings = config.calibration.clone();
    if let Some(countdown) = args.countdown {
        settings.countdown_secs = countdown.max(0.0);
    }

    let recorder = CalibrationRecorder::new(settings);
    stop_on_ctrl_c(recorder.stop_handle());

    let mut source = JsonLinesSource::new(&args.input);
    let mut definition = recorder
        .record_exercise(&args.name, &mut source, &store)
        .await
        .with_context(|| format!("calibrating from {}", args.input.display()))?;

    let mut amended = false;
    if let Some(sets) = args.default_sets {
        definition = definition.with_default_sets(sets);
        amended = true;
    }
    if let (Some(min), Some(max)) = (args.opt_min, args.opt_max) {
        definition = definition.with_optimal_range(min, max)?;
        amended = true;
    }
    if amended {
        store.save_exercise(definition.clone()).await?;
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&definition)?),
        OutputFormat::Text => {
            println!("Saved '{}'", definition.name);
            for (joint, limit) in &definition.joints {
                println!("  {joint}: {}° - {}°", limit.min(), limit.max());
            }
            if let Some(primary) = definition.primary_joint() {
                println!("  Primary joint: {primary}");
            }
        }
    }
    Ok(())
}

async fn execute_assign(config: &EngineConfig, args: AssignArgs) -> Result<()> {
    let store = open_store(config).await?;

    let is_builtin = args.exercise.parse::<BuiltInExercise>().is_ok();
    if !is_builtin && store.exercise(&args.exercise).await?.is_none() {
        bail!("unknown exercise '{}'", args.exercise);
    }

    let mut record = store.patient(&args.patient).await?.unwrap_or_default();
    record.assign(&args.exercise, args.reps, args.sets);
    if let Some(range) = optimal_range(args.opt_min, args.opt_max)? {
        record.set_optimal_range(&args.exercise, range);
    }
    store.save_patient(&args.patient, record).await?;

    println!(
        "Assigned {} x {} reps of '{}' to {}",
        args.sets.map_or_else(|| "-".to_string(), |s| s.to_string()),
        args.reps,
        args.exercise,
        args.patient
    );
    Ok(())
}

async fn execute_exercises(config: &EngineConfig) -> Result<()> {
    let store = open_store(config).await?;

    for builtin in BuiltInExercise::ALL {
        let opt = builtin.default_optimal_range();
        println!(
            "{:<16} built-in  {}  optimal {}° - {}°",
            builtin.name(),
            builtin.joint(),
            opt.min,
            opt.max
        );
    }
    for definition in store.exercises().await? {
        let primary = definition
            .primary_joint()
            .map_or_else(|| "-".to_string(), |j| j.to_string());
        let optimal = definition
            .optimal_range
            .map_or_else(|| "none".to_string(), |o| format!("{}° - {}°", o.min, o.max));
        println!(
            "{:<16} custom    {}  optimal {}  sets {}",
            definition.name,
            primary,
            optimal,
            definition.default_sets.map_or_else(|| "-".to_string(), |s| s.to_string())
        );
    }
    Ok(())
}

async fn execute_progress(config: &EngineConfig, args: ProgressArgs) -> Result<()> {
    let store = open_store(config).await?;
    let Some(record) = store.patient(&args.patient).await? else {
        bail!("unknown patient '{}'", args.patient);
    };

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("{}", args.patient);
    for (exercise, assigned) in &record.assigned {
        let completed = record.completed.get(exercise).copied().unwrap_or(0);
        println!("  {exercise}: {completed} reps completed, {assigned} per set assigned");
        if let Some(last) = record.last_session(exercise) {
            println!(
                "    last {}: {} reps, deviation {}% ({})",
                last.result.timestamp.format("%Y-%m-%d %H:%M"),
                last.result.reps,
                last.result.deviation_percent,
                Guidance::from_result(&last.result).message()
            );
        }
    }
    Ok(())
}
