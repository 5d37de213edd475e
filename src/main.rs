use std::{env, thread};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::bounded;
use rep_engine::{
    EngineConfig, EngineEvent, ExerciseRegistry, RepEngine, pipeline, replay,
};

const USAGE: &str = "usage: rep-engine <frames.jsonl> <exercise> [config.toml]";

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(frames_path), Some(exercise)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };
    let config = match args.next() {
        Some(path) => {
            EngineConfig::load(&path).with_context(|| format!("loading config {path}"))?
        }
        None => EngineConfig::default(),
    };

    let registry = ExerciseRegistry::with_builtin()?.with_overrides(&config.exercise)?;
    let definition = registry
        .get(&exercise)
        .with_context(|| format!("known exercises: {}", registry.ids().join(", ")))?;
    let engine = RepEngine::new(definition, &config);
    let reader = replay::open(&frames_path)?;

    let (frame_tx, frame_rx) = bounded(64);
    let (event_tx, event_rx) = bounded(256);
    let worker = pipeline::start_engine(
        engine,
        frame_rx,
        event_tx,
        config.pipeline.latest_frame_only,
    );

    let feeder = thread::spawn(move || {
        for item in reader {
            match item {
                Ok(frame) => {
                    if frame_tx.send(frame).is_err() {
                        break;
                    }
                }
                Err(err) => log::warn!("skipping replay line: {err}"),
            }
        }
    });

    for event in event_rx {
        match event {
            EngineEvent::RepCompleted(rep) => println!("{}", rep.display_text()),
            EngineEvent::RepAborted(reason) => println!("rep abandoned: {}", reason.label()),
            EngineEvent::CalibrationRejected(guidance) => log::debug!("{}", guidance.message()),
            other => log::info!("{other:?}"),
        }
    }

    feeder
        .join()
        .map_err(|_| anyhow!("replay reader thread panicked"))?;
    let summary = worker
        .join()
        .map_err(|_| anyhow!("engine worker panicked"))?;

    println!(
        "{}: {} reps completed, {} attempted ({} too shallow, {} timed out, {} lost tracking)",
        summary.exercise,
        summary.reps_completed,
        summary.reps_attempted,
        summary.too_shallow,
        summary.timed_out,
        summary.tracking_lost
    );
    if let (Some(best), Some(rom)) = (summary.best_speed_score(), summary.mean_rom()) {
        println!("best speed score {best}, mean range of motion {rom:.1}");
    }
    Ok(())
}
