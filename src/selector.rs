use std::iter::once;

use itertools::{iproduct, Itertools};
use log::{debug, warn};
use rayon::prelude::*;

use crate::adornment::Adornment;
use crate::candidates::{collect_candidates, Exemplar};
use crate::complexity::{ComplexityReport, ComplexityScorer};
use crate::config::{AdaptationConfig, Objective};
use crate::error::AdornError;
use crate::expander::expand;
use crate::revision::RevisionEngine;
use crate::tab::{AdornedNote, Dynamic, Event, Measure, MeasureFrame, Note, Song};
use crate::weights::{WeightProvider, DEFAULT_WEIGHTS};

#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub note: AdornedNote,
    pub complexity: f64,
    pub difficulty: f64,
}

pub struct Selector<'w> {
    scorer: ComplexityScorer<'w>,
    objective: Objective,
}

impl<'w> Selector<'w> {
    pub fn new(scorer: ComplexityScorer<'w>, objective: Objective) -> Self {
        Selector { scorer, objective }
    }

    /// Scores every adornment and dynamic pairing in parallel, then keeps a
    /// running best in candidate order. A candidate that ties the best replaces it.
    pub fn select(
        &self,
        target: &Note,
        frame: &MeasureFrame,
        preceding: Option<&AdornedNote>,
        adornments: &[Adornment],
        dynamics: &[Dynamic],
    ) -> Result<Selection, AdornError> {
        let candidates = iproduct!(adornments.iter(), dynamics.iter())
            .map(|(adornment, dynamic)| AdornedNote::new(target.with_dynamic(*dynamic), adornment.clone()))
            .collect_vec();
        let scored = candidates
            .into_par_iter()
            .map(|candidate| {
                let sequence = preceding.into_iter().cloned().chain(once(candidate.clone())).collect_vec();
                self.scorer.score(&sequence, frame).map(|report| (candidate, report))
            })
            .collect::<Result<Vec<(AdornedNote, ComplexityReport)>, AdornError>>()?;

        let mut scored = scored.into_iter();
        let (mut best, mut best_report) = scored.next().ok_or(AdornError::NoFeasibleAdornment {
            pitch: target.pitch(),
            start: target.start(),
        })?;
        for (candidate, report) in scored {
            if self.objective.prefers(&report, &best_report) {
                best = candidate;
                best_report = report;
            }
        }
        Ok(Selection { note: best, complexity: best_report.complexity, difficulty: best_report.difficulty })
    }
}

/// What a note being adorned can see of its measure.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasureContext {
    pub frame: MeasureFrame,
    pub preceding: Option<AdornedNote>,
}

impl MeasureContext {
    pub fn new(frame: MeasureFrame, preceding: Option<AdornedNote>) -> Self {
        MeasureContext { frame, preceding }
    }
}

/// Supplies exemplar notes believed analogous to a target note.
pub trait ExemplarSource {
    fn exemplars(&self, target: &Note, measure: &Measure) -> Vec<Exemplar>;
}

impl<F: Fn(&Note, &Measure) -> Vec<Exemplar>> ExemplarSource for F {
    fn exemplars(&self, target: &Note, measure: &Measure) -> Vec<Exemplar> {
        self(target, measure)
    }
}

/// Runs collection, expansion, scoring and selection against one weight table.
pub struct Adapter<'w> {
    weights: &'w dyn WeightProvider,
    config: AdaptationConfig,
}

impl Adapter<'static> {
    pub fn with_default_weights(config: AdaptationConfig) -> Result<Self, AdornError> {
        Adapter::new(&*DEFAULT_WEIGHTS, config)
    }
}

impl<'w> Adapter<'w> {
    pub fn new(weights: &'w dyn WeightProvider, config: AdaptationConfig) -> Result<Self, AdornError> {
        config.validate()?;
        Ok(Adapter { weights, config })
    }

    pub fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    fn scorer(&self) -> ComplexityScorer<'w> {
        ComplexityScorer::new(self.weights, self.config.weight_mode, self.config.aggregation)
    }

    pub fn adorn_note(&self, target: &Note, exemplars: &[Exemplar], context: &MeasureContext) -> Result<Selection, AdornError> {
        let objective = self.config.objective();
        let facets = collect_candidates(target, context.frame, exemplars);
        let adornments = expand(&facets, self.config.strict, objective.minimizes());
        debug!(
            "pitch {} at {}: {} adornments x {} dynamics",
            target.pitch(),
            target.start(),
            adornments.len(),
            facets.dynamics.len()
        );
        let selection = Selector::new(self.scorer(), objective).select(
            target,
            &context.frame,
            context.preceding.as_ref(),
            &adornments,
            facets.dynamics.values(),
        )?;
        debug!(
            "pitch {} at {}: selected complexity {:.3}, difficulty {:.3}",
            target.pitch(),
            target.start(),
            selection.complexity,
            selection.difficulty
        );
        Ok(selection)
    }

    /// Adorns every sounding note of `measure` in order. A note without any
    /// feasible adornment is left unadorned.
    pub fn adorn_measure<S: ExemplarSource + ?Sized>(
        &self,
        measure: &Measure,
        index: usize,
        carry: Option<&AdornedNote>,
        source: &S,
    ) -> Result<Measure, AdornError> {
        measure.validate(index)?;
        let frame = measure.frame();
        let mut preceding = carry.cloned();
        let mut events = Vec::with_capacity(measure.notes().len());
        for event in measure.notes().iter() {
            match event {
                Event::Rest(rest) => events.push(Event::Rest(*rest)),
                Event::Note(adorned) => {
                    let target = adorned.note();
                    let exemplars = source.exemplars(target, measure);
                    let context = MeasureContext::new(frame, preceding.take());
                    let chosen = match self.adorn_note(target, &exemplars, &context) {
                        Ok(selection) => selection.note,
                        Err(AdornError::NoFeasibleAdornment { pitch, start }) => {
                            warn!("measure {index}: no feasible adornment for pitch {pitch} at {start}; left unadorned");
                            AdornedNote::unadorned(target.clone())
                        }
                        Err(e) => return Err(e),
                    };
                    preceding = Some(chosen.clone());
                    events.push(Event::Note(chosen));
                }
            }
        }
        Ok(measure.with_notes(events))
    }

    pub fn adapt_measure<S: ExemplarSource + ?Sized>(&self, measure: &Measure, index: usize, source: &S) -> Result<Measure, AdornError> {
        let adorned = self.adorn_measure(measure, index, None, source)?;
        RevisionEngine::from_config(&self.config).revise_measure(&adorned, index)
    }

    pub fn adapt_song<S: ExemplarSource + ?Sized>(&self, song: &Song, source: &S) -> Result<Song, AdornError> {
        let mut measures: Vec<Measure> = Vec::with_capacity(song.measures().len());
        for (i, measure) in song.measures().iter().enumerate() {
            let carry = measures.last().and_then(|m| m.last_sounding()).cloned();
            measures.push(self.adorn_measure(measure, i, carry.as_ref(), source)?);
        }
        RevisionEngine::from_config(&self.config).revise_song(&song.with_measures(measures))
    }
}

pub fn adorn_note(target: &Note, exemplars: &[Exemplar], context: &MeasureContext, config: &AdaptationConfig) -> Result<AdornedNote, AdornError> {
    Ok(Adapter::with_default_weights(*config)?.adorn_note(target, exemplars, context)?.note)
}

pub fn adapt_measure<S: ExemplarSource + ?Sized>(measure: &Measure, source: &S, config: &AdaptationConfig) -> Result<Measure, AdornError> {
    Adapter::with_default_weights(*config)?.adapt_measure(measure, 0, source)
}

pub fn adapt_song<S: ExemplarSource + ?Sized>(song: &Song, source: &S, config: &AdaptationConfig) -> Result<Song, AdornError> {
    Adapter::with_default_weights(*config)?.adapt_song(song, source)
}
