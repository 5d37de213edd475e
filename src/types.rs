use crate::landmark::Side;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Standing,
    MovingAway,
    Returning,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Standing => "standing",
            Phase::MovingAway => "moving-away",
            Phase::Returning => "returning",
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, Phase::Standing)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AbortReason {
    TooShallow,
    TimedOut,
    TrackingLost,
}

impl AbortReason {
    pub fn label(&self) -> &'static str {
        match self {
            AbortReason::TooShallow => "too-shallow",
            AbortReason::TimedOut => "timed-out",
            AbortReason::TrackingLost => "tracking-lost",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityLabel {
    Shallow,
    Half,
    Parallel,
    Deep,
}

impl QualityLabel {
    pub fn label(&self) -> &'static str {
        match self {
            QualityLabel::Shallow => "shallow",
            QualityLabel::Half => "half",
            QualityLabel::Parallel => "parallel",
            QualityLabel::Deep => "deep",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stance {
    Conventional,
    Wide,
}

impl Stance {
    pub fn label(&self) -> &'static str {
        match self {
            Stance::Conventional => "conventional",
            Stance::Wide => "wide",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RomUnit {
    Inches,
    Degrees,
}

impl RomUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            RomUnit::Inches => "in",
            RomUnit::Degrees => "°",
        }
    }
}

/// Why a calibration frame was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationGuidance {
    LowVisibility,
    BadFraming,
    NotInSetupPosition,
    HoldStill,
}

impl CalibrationGuidance {
    pub fn message(&self) -> &'static str {
        match self {
            CalibrationGuidance::LowVisibility => "step into view so your joints are visible",
            CalibrationGuidance::BadFraming => "adjust the camera so your whole body fits the frame",
            CalibrationGuidance::NotInSetupPosition => "get into the starting position",
            CalibrationGuidance::HoldStill => "hold still",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RepEvent {
    pub rep_number: u32,
    pub duration_seconds: f32,
    pub rom: f32,
    pub rom_unit: RomUnit,
    pub speed_score: u32,
    pub quality: QualityLabel,
    pub side: Option<Side>,
}

impl RepEvent {
    pub fn display_text(&self) -> String {
        format!(
            "rep {} {:.1}{} in {:.2}s, speed {} ({})",
            self.rep_number,
            self.rom,
            self.rom_unit.suffix(),
            self.duration_seconds,
            self.speed_score,
            self.quality.label()
        )
    }
}

/// Advisory notifications produced while processing a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    CalibrationProgress {
        collected: usize,
        required: usize,
    },
    CalibrationRejected(CalibrationGuidance),
    Calibrated {
        baseline: f32,
        units_per_normalized_distance: f32,
        stance: Option<Stance>,
    },
    SideLocked(Side),
    WorkingSideChanged(Side),
    BaselineAdjusted {
        baseline: f32,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    RepCompleted(RepEvent),
    RepAborted(AbortReason),
}
