use crate::types::QualityLabel;

/// Depth every exercise's ROM is rescaled to before scoring speed.
pub const STANDARD_REFERENCE_DEPTH: f32 = 12.0;

/// ROM covered per second, scaled by 1000 and normalized across exercises.
///
/// When `reference_depth` is given, the achieved ROM is rescaled so that a rep at
/// the exercise's own reference depth counts as [`STANDARD_REFERENCE_DEPTH`].
/// Non-positive or non-finite inputs score 0.
pub fn speed_score(duration_seconds: f32, rom: f32, reference_depth: Option<f32>) -> u32 {
    if !(duration_seconds > 0.0 && duration_seconds.is_finite()) || !(rom > 0.0 && rom.is_finite())
    {
        return 0;
    }

    let effective_rom = match reference_depth {
        Some(depth) if depth > 0.0 => rom * (STANDARD_REFERENCE_DEPTH / depth),
        _ => rom,
    };

    (1000.0 / (duration_seconds / effective_rom)).round() as u32
}

/// Lower bounds (inclusive) of each tier above `Shallow`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityTiers {
    pub half: f32,
    pub parallel: f32,
    pub deep: f32,
}

impl QualityTiers {
    pub fn classify(&self, rom: f32) -> QualityLabel {
        if rom >= self.deep {
            QualityLabel::Deep
        } else if rom >= self.parallel {
            QualityLabel::Parallel
        } else if rom >= self.half {
            QualityLabel::Half
        } else {
            QualityLabel::Shallow
        }
    }
}

pub type QualityFn = fn(f32, &QualityTiers) -> QualityLabel;

/// Default quality hook: a plain step function over the configured tiers.
pub fn step_quality(rom: f32, tiers: &QualityTiers) -> QualityLabel {
    tiers.classify(rom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_inputs_score_zero() {
        assert_eq!(speed_score(0.0, 10.0, None), 0);
        assert_eq!(speed_score(-1.0, 10.0, None), 0);
        assert_eq!(speed_score(1.0, 0.0, None), 0);
        assert_eq!(speed_score(1.0, -3.0, None), 0);
        assert_eq!(speed_score(f32::NAN, 3.0, None), 0);
    }

    #[test]
    fn test_score_is_rom_per_second() {
        assert_eq!(speed_score(1.0, 10.0, None), 10_000);
        assert_eq!(speed_score(2.0, 10.0, None), 5_000);
    }

    #[test]
    fn test_reference_depth_normalizes_exercises() {
        let squat = speed_score(1.0, 14.0, Some(14.0));
        let hinge = speed_score(1.0, 60.0, Some(60.0));
        assert_eq!(squat, hinge);
        assert_eq!(squat, (STANDARD_REFERENCE_DEPTH * 1000.0).round() as u32);
    }

    #[test]
    fn test_quality_steps() {
        let tiers = QualityTiers {
            half: 8.0,
            parallel: 12.0,
            deep: 16.0,
        };
        assert_eq!(step_quality(3.0, &tiers), QualityLabel::Shallow);
        assert_eq!(step_quality(8.0, &tiers), QualityLabel::Half);
        assert_eq!(step_quality(13.5, &tiers), QualityLabel::Parallel);
        assert_eq!(step_quality(21.0, &tiers), QualityLabel::Deep);
    }
}
