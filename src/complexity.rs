use std::cmp::{max, min};
use std::ops::AddAssign;

use float_cmp::{ApproxEq, F64Margin};
use itertools::Itertools;
use num::Zero;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::adornment::{
    Adornment, Bend, BendKind, FrettingModificationType, FrettingTechnique, GraceTransition, SlideIn,
};
use crate::error::AdornError;
use crate::tab::{realtime_ms, AdornedNote, DynamicLevel, Fret, MeasureFrame, Measure, Note, Song, Time};
use crate::weights::{Category, WeightMode, WeightProvider, DEFAULT_WEIGHTS};

pub const NUM_FEATURES: usize = 15;

pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "technique",
    "duration",
    "tempo",
    "key_signature",
    "time_signature",
    "expression",
    "articulation",
    "dynamics",
    "fret_position",
    "interval",
    "interval_ioi",
    "shift_distance",
    "interval_dynamic",
    "interval_fret_position",
    "interval_expression",
];

const MAX_SCORED_INTERVAL: i16 = 21;
const HAND_SPAN: Fret = 4;
const AVERAGE_DURATION_FIT: (f64, f64, f64) = (1.2e-6, 1.1e-3, 0.95);
const TOTAL_TIME_DURATION_FIT: (f64, f64, f64) = (9.0e-7, 1.4e-3, 0.90);
const MS_PER_MINUTE: f64 = 60000.0;

/// Running sums of every weighted feature over the scored notes and intervals.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayingComplexityVector {
    pub technique: f64,
    pub duration: f64,
    pub tempo: f64,
    pub key_signature: f64,
    pub time_signature: f64,
    pub expression: f64,
    pub articulation: f64,
    pub dynamics: f64,
    pub fret_position: f64,
    pub interval: f64,
    pub interval_ioi: f64,
    pub shift_distance: f64,
    pub interval_dynamic: f64,
    pub interval_fret_position: f64,
    pub interval_expression: f64,
}

impl PlayingComplexityVector {
    pub fn as_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.technique,
            self.duration,
            self.tempo,
            self.key_signature,
            self.time_signature,
            self.expression,
            self.articulation,
            self.dynamics,
            self.fret_position,
            self.interval,
            self.interval_ioi,
            self.shift_distance,
            self.interval_dynamic,
            self.interval_fret_position,
            self.interval_expression,
        ]
    }

    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.as_array())
    }

    pub fn norm(&self) -> f64 {
        self.as_array().iter().map(|x| x * x).sum::<f64>().sqrt()
    }
}

impl AddAssign for PlayingComplexityVector {
    fn add_assign(&mut self, rhs: Self) {
        self.technique += rhs.technique;
        self.duration += rhs.duration;
        self.tempo += rhs.tempo;
        self.key_signature += rhs.key_signature;
        self.time_signature += rhs.time_signature;
        self.expression += rhs.expression;
        self.articulation += rhs.articulation;
        self.dynamics += rhs.dynamics;
        self.fret_position += rhs.fret_position;
        self.interval += rhs.interval;
        self.interval_ioi += rhs.interval_ioi;
        self.shift_distance += rhs.shift_distance;
        self.interval_dynamic += rhs.interval_dynamic;
        self.interval_fret_position += rhs.interval_fret_position;
        self.interval_expression += rhs.interval_expression;
    }
}

/// How the weights of simultaneous tags on one note combine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Product,
    Sum,
}

impl Default for Aggregation {
    fn default() -> Self {
        Aggregation::Product
    }
}

impl Aggregation {
    pub fn combine(&self, weights: &[f64]) -> f64 {
        if weights.is_empty() {
            return 1.0;
        }
        match self {
            Aggregation::Product => weights.iter().product(),
            Aggregation::Sum => weights.iter().sum(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub complexity: f64,
    pub difficulty: f64,
    pub vector: PlayingComplexityVector,
    pub hand_shifts: usize,
}

impl ApproxEq for ComplexityReport {
    type Margin = F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        let margin = margin.into();
        self.hand_shifts == other.hand_shifts
            && self.complexity.approx_eq(other.complexity, margin)
            && self.difficulty.approx_eq(other.difficulty, margin)
            && self
                .vector
                .as_array()
                .iter()
                .zip(other.vector.as_array().iter())
                .all(|(a, b)| a.approx_eq(*b, margin))
    }
}

/// Fretting-hand window threaded through a scoring pass.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HandPosition {
    window: Option<(Fret, Fret)>,
    shifts: usize,
}

impl HandPosition {
    /// Open strings leave the hand where it is.
    pub fn track(self, fret: Fret) -> Self {
        if fret == 0 {
            return self;
        }
        match self.window {
            None => HandPosition { window: Some((fret, fret)), shifts: self.shifts },
            Some((low, high)) => {
                let (low, high) = (min(low, fret), max(high, fret));
                if high - low > HAND_SPAN {
                    HandPosition { window: Some((fret, fret)), shifts: self.shifts + 1 }
                } else {
                    HandPosition { window: Some((low, high)), shifts: self.shifts }
                }
            }
        }
    }

    pub fn shifts(&self) -> usize {
        self.shifts
    }
}

pub struct ComplexityScorer<'w> {
    weights: &'w dyn WeightProvider,
    mode: WeightMode,
    aggregation: Aggregation,
}

impl ComplexityScorer<'static> {
    pub fn with_defaults(mode: WeightMode) -> Self {
        ComplexityScorer::new(&*DEFAULT_WEIGHTS, mode, Aggregation::Product)
    }
}

impl<'w> ComplexityScorer<'w> {
    pub fn new(weights: &'w dyn WeightProvider, mode: WeightMode, aggregation: Aggregation) -> Self {
        ComplexityScorer { weights, mode, aggregation }
    }

    pub fn mode(&self) -> WeightMode {
        self.mode
    }

    /// Closed-form fit over clicks per minute, so any real duration scores.
    pub fn duration_weight(&self, ms: f64) -> f64 {
        if ms <= 0.0 {
            return 1.0;
        }
        let (a, b, c) = if self.mode.is_total_time() { TOTAL_TIME_DURATION_FIT } else { AVERAGE_DURATION_FIT };
        let cpm = MS_PER_MINUTE / ms;
        self.mode.scaled(a * cpm * cpm + b * cpm + c)
    }

    fn named(&self, category: Category, key: &str) -> Result<f64, AdornError> {
        self.weights.weight(self.mode, category, key)
    }

    fn closest(&self, category: Category, key: f64) -> Result<f64, AdornError> {
        self.weights.closest(self.mode, category, key)
    }

    fn aggregate(&self, category: Category, keys: &[&str]) -> Result<f64, AdornError> {
        let weights = keys.iter().map(|k| self.named(category, k)).collect::<Result<Vec<_>, _>>()?;
        Ok(self.aggregation.combine(&weights))
    }

    fn time_signature_weight(&self, frame: &MeasureFrame) -> Result<f64, AdornError> {
        match self.named(Category::TimeSignature, &frame.meta.time_signature.to_string()) {
            Err(AdornError::UnknownWeight { .. }) => self.named(Category::TimeSignature, "other"),
            other => other,
        }
    }

    pub fn score_measure(&self, measure: &Measure, index: usize) -> Result<ComplexityReport, AdornError> {
        measure.validate(index)?;
        let notes = measure.sounding().cloned().collect_vec();
        self.score(&notes, &measure.frame())
    }

    pub fn score(&self, notes: &[AdornedNote], frame: &MeasureFrame) -> Result<ComplexityReport, AdornError> {
        let notes = materialize_grace_notes(notes)?;
        let mut report = ComplexityReport::default();
        let mut hand = HandPosition::default();
        for note in notes.iter() {
            let (complexity, vector) = self.note_complexity(note, frame)?;
            report.complexity += complexity;
            report.vector += vector;
            hand = hand.track(note.note().fret());
        }
        for (prev, cur) in notes.iter().tuple_windows() {
            if prev.note().end() <= cur.note().start() {
                let (complexity, vector) = self.interval_complexity(prev, cur, frame)?;
                report.complexity += complexity;
                report.vector += vector;
            }
        }
        report.difficulty = report.vector.norm();
        report.hand_shifts = hand.shifts();
        Ok(report)
    }

    fn note_complexity(&self, adorned: &AdornedNote, frame: &MeasureFrame) -> Result<(f64, PlayingComplexityVector), AdornError> {
        let note = adorned.note();
        let adornment = adorned.adornment();
        let v = PlayingComplexityVector {
            fret_position: self.closest(Category::FretPosition, note.fret() as f64)?,
            technique: self.aggregate(Category::Technique, &technique_tags(adornment))?,
            expression: self.aggregate(Category::Expression, &expression_tags(adornment))?,
            articulation: self.aggregate(Category::Articulation, &articulation_tags(adornment))?,
            dynamics: self.aggregate(Category::Dynamics, &dynamic_tags(note))?,
            duration: self.duration_weight(note.realtime_ms(frame.meta.tempo)),
            time_signature: self.time_signature_weight(frame)?,
            tempo: self.closest(Category::Tempo, frame.meta.tempo as f64)?,
            ..Default::default()
        };
        let complexity = v.fret_position
            * v.technique
            * v.expression
            * v.articulation
            * v.dynamics
            * v.duration
            * v.time_signature
            * v.tempo;
        Ok((complexity, v))
    }

    fn interval_complexity(
        &self,
        prev: &AdornedNote,
        cur: &AdornedNote,
        frame: &MeasureFrame,
    ) -> Result<(f64, PlayingComplexityVector), AdornError> {
        let delta = (cur.note().pitch() - prev.note().pitch()).abs().min(MAX_SCORED_INTERVAL);
        let ioi = cur.note().start() - prev.note().start();
        let dynamic = interval_dynamic(prev.note().dynamic().level, cur.note().dynamic().level);
        let expression = if prev.adornment().has_connecting_slide() { "slide" } else { "none" };
        let v = PlayingComplexityVector {
            interval: self.closest(Category::Interval, delta as f64)?,
            interval_ioi: self.duration_weight(realtime_ms(ioi, frame.meta.tempo)),
            key_signature: self.closest(Category::KeySignature, frame.meta.accidentals() as f64)?,
            interval_dynamic: self.named(Category::IntervalDynamic, dynamic)?,
            shift_distance: self.closest(Category::ShiftDistance, 0.0)?,
            interval_fret_position: self.closest(
                Category::IntervalFretPosition,
                max(prev.note().fret(), cur.note().fret()) as f64,
            )?,
            interval_expression: self.named(Category::IntervalExpression, expression)?,
            ..Default::default()
        };
        let complexity = v.interval
            * v.interval_ioi
            * v.key_signature
            * v.interval_dynamic
            * v.shift_distance
            * v.interval_fret_position
            * v.interval_expression;
        Ok((complexity, v))
    }
}

fn interval_dynamic(prev: DynamicLevel, cur: DynamicLevel) -> &'static str {
    if cur > prev {
        "crescendo"
    } else if cur < prev {
        "diminuendo"
    } else {
        "none"
    }
}

fn technique_tags(adornment: &Adornment) -> Vec<&'static str> {
    let mut tags = vec![adornment.plucking.technique.weight_key()];
    if adornment.fretting.technique.is_legato() {
        tags.push(adornment.fretting.technique.weight_key());
    }
    if adornment.plucking.modification.palm_mute {
        tags.push("palm_mute");
    }
    if adornment.artificial_harmonic().is_some() {
        tags.push("artificial_harmonic");
    }
    if let Some(kind) = adornment.modification_kind() {
        tags.push(kind.weight_key());
    }
    if adornment.fretting.modification.let_ring {
        tags.push("let_ring");
    }
    tags
}

fn expression_tags(adornment: &Adornment) -> Vec<&'static str> {
    let modulation = &adornment.fretting.modulation;
    let mut tags = vec![];
    if let Some(bend) = modulation.bend {
        tags.push(bend.kind.weight_key());
    }
    if modulation.vibrato {
        tags.push("vibrato");
    }
    if modulation.trill.is_some() {
        tags.push("trill");
    }
    if let Some(slide) = modulation.slide {
        tags.extend(slide.into.map(|s| s.weight_key()));
        tags.extend(slide.outto.map(|s| s.weight_key()));
    }
    tags
}

fn articulation_tags(adornment: &Adornment) -> Vec<&'static str> {
    let mut tags = vec![];
    if adornment.plucking.accent {
        tags.push("accent");
    }
    if adornment.fretting.accent {
        tags.push("heavy_accent");
    }
    if adornment.ghost_note {
        tags.push("ghost_note");
    }
    tags
}

fn dynamic_tags(note: &Note) -> Vec<&'static str> {
    let dynamic = note.dynamic();
    let mut tags = vec![dynamic.level.weight_key()];
    tags.extend(dynamic.hairpin.map(|h| h.weight_key()));
    tags
}

/// Splits every host note carrying a grace note into a pseudo-note for the
/// grace note followed by the shortened host.
pub fn materialize_grace_notes(notes: &[AdornedNote]) -> Result<Vec<AdornedNote>, AdornError> {
    let mut result = Vec::with_capacity(notes.len());
    for adorned in notes.iter() {
        let host = adorned.note();
        let grace = match &adorned.adornment().grace_note {
            Some(grace) if grace.duration > Time::zero() => grace.clone(),
            _ => {
                result.push(adorned.clone());
                continue;
            }
        };
        let length = min(grace.duration, host.duration() / 2);
        let pitch = host.open_pitch()? + grace.fret;
        let mut pseudo = Adornment::unadorned(grace.fret);
        if grace.dead {
            pseudo = pseudo.with_fretting_modification(Some(FrettingModificationType::DeadNote));
        }
        let mut hosted = adorned.adornment().with_grace_note(None);
        match grace.transition {
            Some(GraceTransition::Bend) => {
                let amount = ((host.pitch() - pitch).unsigned_abs() * 2).min(u8::MAX as u16) as u8;
                pseudo = pseudo.with_bend(Some(Bend { kind: BendKind::Bend, amount }));
            }
            Some(GraceTransition::Hammer) => {
                if host.fret() > grace.fret {
                    hosted = hosted.with_fretting_technique(FrettingTechnique::HammerOn);
                } else if host.fret() < grace.fret {
                    hosted = hosted.with_fretting_technique(FrettingTechnique::PullOff);
                }
            }
            Some(GraceTransition::Slide) => {
                if host.fret() > grace.fret {
                    hosted = hosted.with_slide_into(Some(SlideIn::FromBelow));
                } else if host.fret() < grace.fret {
                    hosted = hosted.with_slide_into(Some(SlideIn::FromAbove));
                }
            }
            None => {}
        }
        let pseudo_note = host
            .repitched(pitch, grace.fret)
            .retimed(host.start(), length)
            .with_dynamic(grace.dynamic);
        result.push(AdornedNote::new(pseudo_note, pseudo));
        result.push(AdornedNote::new(host.retimed(host.start() + length, host.duration() - length), hosted));
    }
    Ok(result)
}

pub fn score(notes: &[AdornedNote], frame: &MeasureFrame, mode: WeightMode) -> Result<ComplexityReport, AdornError> {
    ComplexityScorer::with_defaults(mode).score(notes, frame)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SongComplexity {
    pub measures: Vec<ComplexityReport>,
    pub complexity: f64,
    pub difficulty: f64,
}

/// Measures score independently, so they are scored in parallel.
pub fn score_song(song: &Song, scorer: &ComplexityScorer) -> Result<SongComplexity, AdornError> {
    let measures = song
        .measures()
        .par_iter()
        .enumerate()
        .map(|(i, m)| scorer.score_measure(m, i))
        .collect::<Result<Vec<_>, _>>()?;
    let mut total = PlayingComplexityVector::default();
    for report in measures.iter() {
        total += report.vector;
    }
    Ok(SongComplexity {
        complexity: measures.iter().map(|r| r.complexity).sum(),
        difficulty: total.norm(),
        measures,
    })
}
