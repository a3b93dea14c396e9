use serde::{Deserialize, Serialize};

use crate::complexity::{Aggregation, ComplexityReport};
use crate::error::AdornError;
use crate::weights::WeightMode;

/// Settings for one adaptation run. Every field has a default, so partial
/// JSON files are accepted.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    pub complexity_weight: f64,
    pub difficulty_weight: f64,
    pub weight_mode: WeightMode,
    pub strict: bool,
    pub aggregation: Aggregation,
    /// Fewest strings crossed between two slap-family notes that counts as a clash.
    pub slap_string_crossing: u8,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        AdaptationConfig {
            complexity_weight: 1.0,
            difficulty_weight: 1.0,
            weight_mode: WeightMode::GM,
            strict: true,
            aggregation: Aggregation::Product,
            slap_string_crossing: 2,
        }
    }
}

impl AdaptationConfig {
    pub fn from_json(json: &str) -> Result<Self, AdornError> {
        let config: AdaptationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AdornError> {
        for w in [self.complexity_weight, self.difficulty_weight] {
            if !(-1.0..=1.0).contains(&w) {
                return Err(AdornError::InvalidObjectiveWeight(w));
            }
        }
        Ok(())
    }

    pub fn objective(&self) -> Objective {
        Objective { complexity_weight: self.complexity_weight, difficulty_weight: self.difficulty_weight }
    }
}

/// Signed trade-off between complexity and difficulty: zero ignores a
/// dimension, positive maximizes it, negative minimizes it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub complexity_weight: f64,
    pub difficulty_weight: f64,
}

impl Objective {
    pub fn new(complexity_weight: f64, difficulty_weight: f64) -> Self {
        Objective { complexity_weight, difficulty_weight }
    }

    pub fn minimizes(&self) -> bool {
        self.complexity_weight <= 0.0
            && self.difficulty_weight <= 0.0
            && (self.complexity_weight < 0.0 || self.difficulty_weight < 0.0)
    }

    pub fn heuristic(&self, candidate: &ComplexityReport, best: &ComplexityReport) -> f64 {
        (candidate.complexity - best.complexity) * self.complexity_weight
            + (candidate.difficulty - best.difficulty) * self.difficulty_weight
    }

    /// Ties go to the candidate.
    pub fn prefers(&self, candidate: &ComplexityReport, best: &ComplexityReport) -> bool {
        self.heuristic(candidate, best) >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(complexity: f64, difficulty: f64) -> ComplexityReport {
        ComplexityReport { complexity, difficulty, ..Default::default() }
    }

    #[test]
    fn test_partial_json() {
        let config = AdaptationConfig::from_json(r#"{"complexity_weight": -0.5, "weight_mode": "GMTS"}"#).unwrap();
        assert_eq!(config.complexity_weight, -0.5);
        assert_eq!(config.difficulty_weight, 1.0);
        assert_eq!(config.weight_mode, WeightMode::GMTS);
        assert!(config.strict);
        assert_eq!(config.aggregation, Aggregation::Product);
        assert_eq!(AdaptationConfig::from_json("{}").unwrap(), AdaptationConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            AdaptationConfig::from_json(r#"{"difficulty_weight": 1.5}"#),
            Err(AdornError::InvalidObjectiveWeight(_))
        ));
        assert!(matches!(AdaptationConfig::from_json(r#"{"strict": "yes"}"#), Err(AdornError::Weights(_))));
    }

    #[test]
    fn test_minimizes() {
        assert!(Objective::new(-1.0, -1.0).minimizes());
        assert!(Objective::new(0.0, -0.2).minimizes());
        assert!(!Objective::new(0.0, 0.0).minimizes());
        assert!(!Objective::new(-1.0, 0.5).minimizes());
    }

    #[test]
    fn test_prefers() {
        let maximize = Objective::new(1.0, 1.0);
        let minimize = Objective::new(-1.0, -1.0);
        assert!(maximize.prefers(&report(2.0, 2.0), &report(1.0, 1.0)));
        assert!(!minimize.prefers(&report(2.0, 2.0), &report(1.0, 1.0)));
        assert!(maximize.prefers(&report(1.0, 1.0), &report(1.0, 1.0)));
        assert!(minimize.prefers(&report(1.0, 1.0), &report(1.0, 1.0)));
        assert!(Objective::new(1.0, 0.0).prefers(&report(2.0, 0.0), &report(1.0, 9.0)));
    }
}
