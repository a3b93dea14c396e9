use std::collections::{BTreeMap, HashMap};

use enum_iterator::Sequence;
use lazy_static::lazy_static;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::AdornError;

const WEIGHT_COLUMNS: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WeightMode {
    GM,
    GMS,
    GMT,
    GMTS,
    RD,
    RDT,
}

impl Default for WeightMode {
    fn default() -> Self {
        WeightMode::GM
    }
}

impl WeightMode {
    fn column(&self) -> usize {
        match self {
            WeightMode::GM | WeightMode::GMS => 0,
            WeightMode::GMT | WeightMode::GMTS => 1,
            WeightMode::RD => 2,
            WeightMode::RDT => 3,
        }
    }

    pub fn is_log_scaled(&self) -> bool {
        matches!(self, WeightMode::GMS | WeightMode::GMTS)
    }

    /// Derived from total playing time rather than per-note averages.
    pub fn is_total_time(&self) -> bool {
        matches!(self, WeightMode::GMT | WeightMode::GMTS | WeightMode::RDT)
    }

    pub fn scaled(&self, weight: f64) -> f64 {
        if self.is_log_scaled() {
            (weight + 1.0).log2()
        } else {
            weight
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technique,
    Expression,
    Articulation,
    Dynamics,
    FretPosition,
    TimeSignature,
    KeySignature,
    Tempo,
    Interval,
    IntervalDynamic,
    ShiftDistance,
    IntervalFretPosition,
    IntervalExpression,
}

impl Category {
    /// Categories keyed by a number and resolved by nearest neighbour.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Category::FretPosition
                | Category::KeySignature
                | Category::Tempo
                | Category::Interval
                | Category::ShiftDistance
                | Category::IntervalFretPosition
        )
    }
}

pub trait WeightProvider: Sync {
    fn weight(&self, mode: WeightMode, category: Category, key: &str) -> Result<f64, AdornError>;

    /// Weight of the numeric key nearest to `key`, ties going to the smaller key.
    fn closest(&self, mode: WeightMode, category: Category, key: f64) -> Result<f64, AdornError>;
}

#[derive(Deserialize)]
struct NamedEntry {
    category: Category,
    key: String,
    weights: [f64; WEIGHT_COLUMNS],
}

#[derive(Deserialize)]
struct NumericEntry {
    category: Category,
    key: f64,
    weights: [f64; WEIGHT_COLUMNS],
}

#[derive(Deserialize)]
struct WeightFile {
    version: String,
    named: Vec<NamedEntry>,
    numeric: Vec<NumericEntry>,
}

#[derive(Clone, Debug)]
pub struct WeightTable {
    version: String,
    named: HashMap<Category, HashMap<String, [f64; WEIGHT_COLUMNS]>>,
    numeric: BTreeMap<Category, Vec<(OrderedFloat<f64>, [f64; WEIGHT_COLUMNS])>>,
}

lazy_static! {
    pub static ref DEFAULT_WEIGHTS: WeightTable =
        WeightTable::from_json(include_str!("../data/weights.json")).unwrap_or_else(|e| panic!("bundled weight table: {e}"));
}

impl WeightTable {
    pub fn from_json(json: &str) -> Result<Self, AdornError> {
        let file: WeightFile = serde_json::from_str(json)?;
        let mut named: HashMap<Category, HashMap<String, [f64; WEIGHT_COLUMNS]>> = HashMap::new();
        for entry in file.named {
            named.entry(entry.category).or_default().insert(entry.key, entry.weights);
        }
        let mut numeric: BTreeMap<Category, Vec<(OrderedFloat<f64>, [f64; WEIGHT_COLUMNS])>> = BTreeMap::new();
        for entry in file.numeric {
            numeric.entry(entry.category).or_default().push((OrderedFloat(entry.key), entry.weights));
        }
        for buckets in numeric.values_mut() {
            buckets.sort_by_key(|(k, _)| *k);
        }
        Ok(WeightTable { version: file.version, named, numeric })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn named_keys(&self, category: Category) -> impl Iterator<Item = &str> {
        self.named.get(&category).into_iter().flat_map(|m| m.keys().map(|k| k.as_str()))
    }
}

impl WeightProvider for WeightTable {
    fn weight(&self, mode: WeightMode, category: Category, key: &str) -> Result<f64, AdornError> {
        self.named
            .get(&category)
            .and_then(|m| m.get(key))
            .map(|w| mode.scaled(w[mode.column()]))
            .ok_or_else(|| AdornError::UnknownWeight { category, key: key.to_string() })
    }

    fn closest(&self, mode: WeightMode, category: Category, key: f64) -> Result<f64, AdornError> {
        let buckets = self
            .numeric
            .get(&category)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| AdornError::UnknownWeight { category, key: key.to_string() })?;
        // Buckets are sorted, so the first minimum is the smaller key.
        let (_, weights) = buckets
            .iter()
            .min_by_key(|(k, _)| OrderedFloat((k.into_inner() - key).abs()))
            .ok_or_else(|| AdornError::UnknownWeight { category, key: key.to_string() })?;
        Ok(mode.scaled(weights[mode.column()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adornment::{BendKind, FrettingModificationType, FrettingTechnique, PluckingTechnique, SlideIn, SlideOut};
    use crate::tab::{DynamicLevel, Hairpin};
    use enum_iterator::all;
    use float_cmp::approx_eq;

    #[test]
    fn test_every_facet_has_a_weight() {
        let table = &*DEFAULT_WEIGHTS;
        for mode in all::<WeightMode>() {
            let check = |category: Category, key: &str| {
                assert!(table.weight(mode, category, key).is_ok(), "{mode:?} {category:?} {key}");
            };
            for t in all::<PluckingTechnique>() {
                check(Category::Technique, t.weight_key());
            }
            for t in all::<FrettingTechnique>() {
                check(Category::Technique, t.weight_key());
            }
            for t in all::<FrettingModificationType>() {
                check(Category::Technique, t.weight_key());
            }
            for key in ["palm_mute", "artificial_harmonic", "let_ring"] {
                check(Category::Technique, key);
            }
            for b in all::<BendKind>() {
                check(Category::Expression, b.weight_key());
            }
            for s in all::<SlideIn>() {
                check(Category::Expression, s.weight_key());
            }
            for s in all::<SlideOut>() {
                check(Category::Expression, s.weight_key());
            }
            for key in ["vibrato", "trill"] {
                check(Category::Expression, key);
            }
            for key in ["accent", "heavy_accent", "ghost_note"] {
                check(Category::Articulation, key);
            }
            for d in all::<DynamicLevel>() {
                check(Category::Dynamics, d.weight_key());
            }
            for h in all::<Hairpin>() {
                check(Category::Dynamics, h.weight_key());
                check(Category::IntervalDynamic, h.weight_key());
            }
            check(Category::IntervalDynamic, "none");
            check(Category::TimeSignature, "other");
            check(Category::IntervalExpression, "slide");
            for category in all::<Category>().filter(|c| c.is_numeric()) {
                assert!(table.closest(mode, category, 0.0).is_ok());
            }
        }
    }

    #[test]
    fn test_closest_ties_to_smaller() {
        let table = &*DEFAULT_WEIGHTS;
        let at_60 = table.closest(WeightMode::GM, Category::Tempo, 60.0).unwrap();
        let at_80 = table.closest(WeightMode::GM, Category::Tempo, 80.0).unwrap();
        let at_100 = table.closest(WeightMode::GM, Category::Tempo, 100.0).unwrap();
        assert!(approx_eq!(f64, table.closest(WeightMode::GM, Category::Tempo, 90.0).unwrap(), at_80));
        assert!(approx_eq!(f64, table.closest(WeightMode::GM, Category::Tempo, 91.0).unwrap(), at_100));
        assert!(approx_eq!(f64, table.closest(WeightMode::GM, Category::Tempo, 0.0).unwrap(), 1.05));
        assert!(approx_eq!(f64, at_60, 1.0));
        assert!(approx_eq!(f64, table.closest(WeightMode::GM, Category::Tempo, 500.0).unwrap(), 1.52));
    }

    #[test]
    fn test_mode_columns() {
        let table = &*DEFAULT_WEIGHTS;
        let gm = table.weight(WeightMode::GM, Category::Technique, "tap").unwrap();
        let gms = table.weight(WeightMode::GMS, Category::Technique, "tap").unwrap();
        let rdt = table.weight(WeightMode::RDT, Category::Technique, "tap").unwrap();
        assert!(approx_eq!(f64, gm, 1.65));
        assert!(approx_eq!(f64, gms, 2.65f64.log2()));
        assert!(rdt > gm);
    }

    #[test]
    fn test_unknown_weight() {
        let table = &*DEFAULT_WEIGHTS;
        assert!(matches!(
            table.weight(WeightMode::GM, Category::Technique, "kazoo"),
            Err(AdornError::UnknownWeight { category: Category::Technique, .. })
        ));
        let empty = WeightTable::from_json(r#"{"version": "0", "named": [], "numeric": []}"#).unwrap();
        assert!(empty.closest(WeightMode::GM, Category::Tempo, 120.0).is_err());
        assert!(WeightTable::from_json("{").is_err());
    }
}
