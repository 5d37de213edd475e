//! Recorded landmark streams, one JSON object per line:
//!
//! ```text
//! {"t_ms": 33, "landmarks": [[0.51, 0.48, -0.1, 0.98], ...]}
//! ```
//!
//! `t_ms` is milliseconds since the start of the recording and must not
//! decrease. Each landmark is `[x, y, z, visibility]`.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Lines, Write},
    path::Path,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landmark::{Landmark, LandmarkFrame};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to open replay {path}: {source}")]
    Open { path: String, source: io::Error },
    #[error("replay i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("line {line}: timestamp {t_ms} ms is earlier than the previous frame")]
    OutOfOrder { line: usize, t_ms: u64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub t_ms: u64,
    pub landmarks: Vec<[f32; 4]>,
}

impl ReplayRecord {
    pub fn from_frame(frame: &LandmarkFrame, origin: Instant) -> Self {
        Self {
            t_ms: frame.timestamp.saturating_duration_since(origin).as_millis() as u64,
            landmarks: frame
                .landmarks
                .iter()
                .map(|lm| [lm.x, lm.y, lm.z, lm.visibility])
                .collect(),
        }
    }

    pub fn into_frame(self, origin: Instant) -> LandmarkFrame {
        let landmarks = self
            .landmarks
            .into_iter()
            .map(|[x, y, z, visibility]| Landmark::new(x, y, z, visibility))
            .collect();
        LandmarkFrame::new(landmarks, origin + Duration::from_millis(self.t_ms))
    }
}

/// Yields frames in file order. A bad line yields an error and reading
/// continues with the next one.
pub struct ReplayReader<R> {
    lines: Lines<R>,
    origin: Instant,
    line: usize,
    last_t_ms: Option<u64>,
}

impl<R: BufRead> ReplayReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            origin: Instant::now(),
            line: 0,
            last_t_ms: None,
        }
    }
}

impl<R: BufRead> Iterator for ReplayReader<R> {
    type Item = Result<LandmarkFrame, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(err) => return Some(Err(err.into())),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }

            let record: ReplayRecord = match serde_json::from_str(&text) {
                Ok(record) => record,
                Err(source) => {
                    return Some(Err(ReplayError::Parse {
                        line: self.line,
                        source,
                    }));
                }
            };
            if self.last_t_ms.is_some_and(|last| record.t_ms < last) {
                return Some(Err(ReplayError::OutOfOrder {
                    line: self.line,
                    t_ms: record.t_ms,
                }));
            }
            self.last_t_ms = Some(record.t_ms);
            return Some(Ok(record.into_frame(self.origin)));
        }
    }
}

pub fn open<P: AsRef<Path>>(path: P) -> Result<ReplayReader<BufReader<File>>, ReplayError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ReplayError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(ReplayReader::new(BufReader::new(file)))
}

/// Writes `frames` as JSON lines with timestamps relative to the first frame.
pub fn write_frames<W: Write>(mut writer: W, frames: &[LandmarkFrame]) -> Result<(), ReplayError> {
    let Some(origin) = frames.first().map(|f| f.timestamp) else {
        return Ok(());
    };
    for frame in frames {
        let record = ReplayRecord::from_frame(frame, origin);
        serde_json::to_writer(&mut writer, &record).map_err(io::Error::from)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
