pub mod adornment;
pub mod candidates;
pub mod complexity;
pub mod config;
pub mod error;
pub mod expander;
pub mod harmonics;
pub mod revision;
pub mod selector;
pub mod tab;
pub mod weights;

pub use adornment::*;
pub use candidates::{collect_candidates, CandidateFacetSet, CandidateFeatureCollector, Exemplar, FacetValues};
pub use complexity::{score, score_song, Aggregation, ComplexityReport, ComplexityScorer, PlayingComplexityVector, SongComplexity};
pub use config::{AdaptationConfig, Objective};
pub use error::AdornError;
pub use expander::{expand, AdornmentSpaceExpander};
pub use revision::{revise_measure, revise_song, RevisionEngine};
pub use selector::{adapt_measure, adapt_song, adorn_note, Adapter, ExemplarSource, MeasureContext, Selection, Selector};
pub use tab::*;
pub use weights::{Category, WeightMode, WeightProvider, WeightTable, DEFAULT_WEIGHTS};
