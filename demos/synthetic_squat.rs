//! Runs a scripted five-rep squat set through the engine worker.
//!
//! `cargo run --example synthetic_squat [out.jsonl]` also writes the frames
//! as a replay file for the `rep-engine` binary.

use std::{env, fs::File, io::BufWriter};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::unbounded;
use rep_engine::{
    EngineConfig, EngineEvent, ExerciseRegistry, RepEngine, pipeline, replay,
    synthetic::PoseScript,
};

fn main() -> Result<()> {
    env_logger::init();

    let mut script = PoseScript::new(30);
    script.hold(45);
    for (depth, down, up) in [
        (0.18, 20, 18),
        (0.20, 22, 20),
        (0.15, 16, 14),
        (0.05, 10, 10),
        (0.19, 30, 26),
    ] {
        script.squat(depth, down, 8, up).hold(32);
    }

    if let Some(path) = env::args().nth(1) {
        let file = File::create(&path).with_context(|| format!("creating {path}"))?;
        replay::write_frames(BufWriter::new(file), script.frames())?;
        log::info!("wrote {} frames to {path}", script.frames().len());
    }

    let registry = ExerciseRegistry::with_builtin()?;
    let engine = RepEngine::new(registry.get("squat")?, &EngineConfig::default());

    let (frame_tx, frame_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    let worker = pipeline::start_engine(engine, frame_rx, event_tx, false);
    for frame in script.into_frames() {
        frame_tx.send(frame)?;
    }
    drop(frame_tx);

    for event in event_rx {
        match event {
            EngineEvent::RepCompleted(rep) => println!("{}", rep.display_text()),
            EngineEvent::RepAborted(reason) => println!("abandoned: {}", reason.label()),
            _ => {}
        }
    }

    let summary = worker
        .join()
        .map_err(|_| anyhow!("engine worker panicked"))?;
    println!(
        "{} of {} attempts counted",
        summary.reps_completed, summary.reps_attempted
    );
    Ok(())
}
