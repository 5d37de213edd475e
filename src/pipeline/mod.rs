//! Runs a [`RepEngine`] on a worker thread fed over channels.

use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::{
    engine::{RepEngine, SessionSummary},
    landmark::LandmarkFrame,
    types::EngineEvent,
};

/// Spawns the engine worker. It runs until every frame sender is dropped and
/// then hands back the session totals.
///
/// With `latest_frame_only` the worker skips to the newest queued frame, for
/// live sources that outpace the engine. Replays should process every frame.
pub fn start_engine(
    engine: RepEngine,
    frame_rx: Receiver<LandmarkFrame>,
    event_tx: Sender<EngineEvent>,
    latest_frame_only: bool,
) -> thread::JoinHandle<SessionSummary> {
    log::info!(
        "starting rep engine worker for {} ({})",
        engine.definition().id,
        if latest_frame_only {
            "latest frame only"
        } else {
            "every frame"
        }
    );
    thread::spawn(move || run_worker_loop(engine, frame_rx, event_tx, latest_frame_only))
}

fn run_worker_loop(
    mut engine: RepEngine,
    frame_rx: Receiver<LandmarkFrame>,
    event_tx: Sender<EngineEvent>,
    latest_frame_only: bool,
) -> SessionSummary {
    let mut processed = 0u64;
    let mut listening = true;

    loop {
        let frame = if latest_frame_only {
            recv_latest_frame(&frame_rx)
        } else {
            frame_rx.recv().ok()
        };
        let Some(frame) = frame else {
            break;
        };

        processed += 1;
        for event in engine.process(&frame) {
            if listening && event_tx.send(event).is_err() {
                log::debug!("event receiver dropped, continuing without notifications");
                listening = false;
            }
        }
    }

    let summary = engine.into_summary();
    log::info!(
        "frame stream closed after {processed} frames: {} of {} reps counted",
        summary.reps_completed,
        summary.reps_attempted
    );
    summary
}

fn recv_latest_frame(frame_rx: &Receiver<LandmarkFrame>) -> Option<LandmarkFrame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{bounded, unbounded};

    use super::*;
    use crate::{config::EngineConfig, exercise::ExerciseRegistry, synthetic::PoseScript};

    fn squat_engine() -> RepEngine {
        let registry = ExerciseRegistry::with_builtin().unwrap();
        RepEngine::new(registry.get("squat").unwrap(), &EngineConfig::default())
    }

    #[test]
    fn test_worker_counts_reps_and_returns_summary() {
        let mut script = PoseScript::new(30);
        script.hold(40);
        for _ in 0..3 {
            script.squat(0.18, 18, 10, 18).hold(30);
        }

        let (frame_tx, frame_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let handle = start_engine(squat_engine(), frame_rx, event_tx, false);
        for frame in script.into_frames() {
            frame_tx.send(frame).unwrap();
        }
        drop(frame_tx);

        let summary = handle.join().unwrap();
        assert_eq!(summary.exercise, "squat");
        assert_eq!(summary.reps_completed, 3);
        assert_eq!(summary.aborted(), 0);

        let reps: Vec<u32> = event_rx
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::RepCompleted(rep) => Some(rep.rep_number),
                _ => None,
            })
            .collect();
        assert_eq!(reps, vec![1, 2, 3]);
    }

    #[test]
    fn test_worker_survives_dropped_listener() {
        let mut script = PoseScript::new(30);
        script.hold(40).squat(0.06, 10, 10, 10).hold(10);

        let (frame_tx, frame_rx) = unbounded();
        let (event_tx, event_rx) = bounded(1);
        drop(event_rx);
        let handle = start_engine(squat_engine(), frame_rx, event_tx, false);
        for frame in script.into_frames() {
            frame_tx.send(frame).unwrap();
        }
        drop(frame_tx);

        let summary = handle.join().unwrap();
        assert_eq!(summary.reps_completed, 0);
        assert_eq!(summary.too_shallow, 1);
    }

    #[test]
    fn test_recv_latest_frame_drains_queue() {
        let script = {
            let mut s = PoseScript::new(30);
            s.hold(4);
            s
        };
        let frames = script.frames();
        let (tx, rx) = unbounded();
        for frame in frames {
            tx.send(frame.clone()).unwrap();
        }
        let latest = recv_latest_frame(&rx).unwrap();
        assert_eq!(latest.timestamp, frames[3].timestamp);
        assert!(rx.is_empty());
        drop(tx);
        assert!(recv_latest_frame(&rx).is_none());
    }
}
