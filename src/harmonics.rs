use ordered_float::OrderedFloat;

use crate::tab::{Fret, Pitch, StringNumber, Tuning};

/// Fret of a natural-harmonic node, and the semitones it sounds above the open string.
pub const NATURAL_HARMONICS: [(Fret, Pitch); 9] = [(3, 31), (4, 28), (5, 24), (7, 19), (9, 28), (12, 12), (16, 28), (19, 19), (24, 24)];

/// Semitones an artificial harmonic sounds above the fretted pitch.
pub const ARTIFICIAL_HARMONIC_OFFSETS: [Pitch; 7] = [12, 19, 24, 28, 31, 34, 36];

pub const LOWEST_ARTIFICIAL_FRET: Fret = 1;
pub const HIGHEST_ARTIFICIAL_FRET: Fret = 24;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HarmonicKind {
    Natural,
    Artificial,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Position {
    pub string: StringNumber,
    pub fret: Fret,
}

impl Position {
    pub fn new(string: StringNumber, fret: Fret) -> Self {
        Position { string, fret }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let ds = self.string as f64 - other.string as f64;
        let df = self.fret as f64 - other.fret as f64;
        (ds * ds + df * df).sqrt()
    }
}

/// Every position on `tuning` that sounds `pitch` as a `kind` harmonic, ordered
/// by string, then fret.
pub fn harmonic_positions(tuning: &Tuning, pitch: Pitch, kind: HarmonicKind) -> Vec<Position> {
    let mut result = vec![];
    for (string, open) in tuning.strings() {
        match kind {
            HarmonicKind::Natural => {
                for (fret, interval) in NATURAL_HARMONICS.iter() {
                    if open + interval == pitch {
                        result.push(Position::new(string, *fret));
                    }
                }
            }
            HarmonicKind::Artificial => {
                for fret in LOWEST_ARTIFICIAL_FRET..=HIGHEST_ARTIFICIAL_FRET {
                    if ARTIFICIAL_HARMONIC_OFFSETS.iter().any(|offset| open + fret + offset == pitch) {
                        result.push(Position::new(string, fret));
                    }
                }
            }
        }
    }
    result
}

pub fn is_reachable(tuning: &Tuning, pitch: Pitch, kind: HarmonicKind) -> bool {
    !harmonic_positions(tuning, pitch, kind).is_empty()
}

/// The reachable position closest to `from`; the first of equally close positions wins.
pub fn nearest_harmonic_position(tuning: &Tuning, pitch: Pitch, kind: HarmonicKind, from: Position) -> Option<Position> {
    harmonic_positions(tuning, pitch, kind)
        .into_iter()
        .min_by_key(|p| OrderedFloat(p.distance(&from)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_positions() {
        let tuning = Tuning::standard_bass();
        let positions = harmonic_positions(&tuning, 57, HarmonicKind::Natural);
        assert_eq!(positions, vec![Position::new(2, 7), Position::new(2, 19), Position::new(3, 5), Position::new(3, 24)]);
        assert!(!is_reachable(&tuning, 44, HarmonicKind::Natural));
    }

    #[test]
    fn test_nearest_natural() {
        let tuning = Tuning::standard_bass();
        let nearest = nearest_harmonic_position(&tuning, 57, HarmonicKind::Natural, Position::new(1, 9));
        assert_eq!(nearest, Some(Position::new(2, 7)));
        let nearest = nearest_harmonic_position(&tuning, 57, HarmonicKind::Natural, Position::new(3, 22));
        assert_eq!(nearest, Some(Position::new(3, 24)));
        assert_eq!(nearest_harmonic_position(&tuning, 44, HarmonicKind::Natural, Position::new(1, 1)), None);
    }

    #[test]
    fn test_artificial_positions() {
        let tuning = Tuning::standard_bass();
        assert!(is_reachable(&tuning, 43 + 5 + 12, HarmonicKind::Artificial));
        // Lowest artificial harmonic: low E, fret 1, an octave up.
        assert!(is_reachable(&tuning, 41, HarmonicKind::Artificial));
        assert!(!is_reachable(&tuning, 40, HarmonicKind::Artificial));
        let positions = harmonic_positions(&tuning, 60, HarmonicKind::Artificial);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(positions.contains(&Position::new(1, 5)));
    }

    #[test]
    fn test_distance() {
        assert_eq!(Position::new(1, 3).distance(&Position::new(4, 7)), 5.0);
    }
}
