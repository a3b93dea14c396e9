use itertools::Itertools;
use log::{debug, warn};

use crate::adornment::{FrettingTechnique, PluckingTechnique, Slide, SlideIn, SlideOut, Stroke};
use crate::config::AdaptationConfig;
use crate::error::AdornError;
use crate::harmonics::{nearest_harmonic_position, HarmonicKind, Position};
use crate::tab::{AdornedNote, Event, Measure, MeasureFrame, Song};

/// A revised pair: the previous note, when there is one, and the current note.
type Pair = (Option<AdornedNote>, AdornedNote);

const DEFAULT_SLAP_STRING_CROSSING: u8 = 2;

struct PairContext<'a> {
    frame: MeasureFrame,
    /// The following note as it was before this sweep.
    next: Option<&'a AdornedNote>,
    /// Most common non-tap technique of the measure.
    fallback: Option<PluckingTechnique>,
}

fn traced(rule: &str, before: &Pair, after: Pair) -> Pair {
    if before != &after {
        debug!("{rule}: revised note at {}", after.1.note().start());
    }
    after
}

/// Repairs cross-note inconsistencies in one left-to-right pass. Corrections
/// made by a later rule are not re-checked against earlier rules, except that
/// a harmonic relocation re-runs the rules that depend on string and fret.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RevisionEngine {
    strict: bool,
    slap_string_crossing: u8,
}

impl Default for RevisionEngine {
    fn default() -> Self {
        RevisionEngine::new(true, DEFAULT_SLAP_STRING_CROSSING)
    }
}

impl RevisionEngine {
    pub fn new(strict: bool, slap_string_crossing: u8) -> Self {
        RevisionEngine { strict, slap_string_crossing }
    }

    pub fn from_config(config: &AdaptationConfig) -> Self {
        RevisionEngine::new(config.strict, config.slap_string_crossing)
    }

    /// `index` identifies the measure in errors.
    pub fn revise_measure(&self, measure: &Measure, index: usize) -> Result<Measure, AdornError> {
        measure.validate(index)?;
        Ok(self.sweep(measure, None).0)
    }

    /// Revises measures in order. The first note of each measure is paired
    /// with the last note of the measure just before it, when both sound.
    pub fn revise_song(&self, song: &Song) -> Result<Song, AdornError> {
        let mut measures: Vec<Measure> = Vec::with_capacity(song.measures().len());
        for (i, measure) in song.measures().iter().enumerate() {
            measure.validate(i)?;
            let carry = measures.last().and_then(|m| m.last_sounding()).cloned();
            let (revised, carry) = self.sweep(measure, carry);
            if let (Some(carry), Some(last)) = (carry, measures.last_mut()) {
                *last = last.with_last_sounding(carry);
            }
            measures.push(revised);
        }
        if let Some(last) = measures.iter_mut().rev().find(|m| !m.is_all_rests()) {
            if let Some(note) = last.last_sounding() {
                if note.adornment().has_connecting_slide() {
                    debug!("end of song: dropped dangling slide at {}", note.note().start());
                    let stripped = note.map_adornment(|a| a.with_slide_outto(None));
                    *last = last.with_last_sounding(stripped);
                }
            }
        }
        Ok(song.with_measures(measures))
    }

    /// Returns the revised measure and the revised carry-in note.
    fn sweep(&self, measure: &Measure, carry: Option<AdornedNote>) -> (Measure, Option<AdornedNote>) {
        let original = measure.sounding().collect_vec();
        let mut notes = original.iter().map(|n| (*n).clone()).collect_vec();
        let fallback = measure.most_common_plucking();
        let frame = measure.frame();
        let mut carry = carry;
        for k in 0..notes.len() {
            let context = PairContext { frame, next: original.get(k + 1).copied(), fallback };
            let prev = if k == 0 { carry.take() } else { Some(notes[k - 1].clone()) };
            let (prev, cur) = self.revise_pair((prev, notes[k].clone()), &context);
            notes[k] = cur;
            match (k, prev) {
                (0, prev) => carry = prev,
                (_, Some(prev)) => notes[k - 1] = prev,
                _ => {}
            }
        }
        let mut revised = notes.into_iter();
        let events = measure
            .notes()
            .iter()
            .map(|e| match e {
                Event::Note(_) => revised.next().map(Event::Note).unwrap_or_else(|| e.clone()),
                Event::Rest(r) => Event::Rest(*r),
            })
            .collect_vec();
        (measure.with_notes(events), carry)
    }

    fn revise_pair(&self, pair: Pair, context: &PairContext) -> Pair {
        let pair = self.revise_placement(pair, context);
        let placed = (pair.1.note().string(), pair.1.note().fret());
        let pair = self.apply("harmonic position", pair, |p| self.correct_harmonic_position(p));
        // A relocated note invalidates every decision that depends on its string or fret.
        let pair = if (pair.1.note().string(), pair.1.note().fret()) != placed {
            self.revise_placement(pair, context)
        } else {
            pair
        };
        let pair = self.apply("grace duration", pair, |p| self.correct_grace_duration(p));
        if self.strict {
            self.apply("legato after modulation", pair, |p| self.strict_legato(p))
        } else {
            pair
        }
    }

    /// Rules that depend on where the current note sits on the fretboard.
    fn revise_placement(&self, pair: Pair, context: &PairContext) -> Pair {
        let pair = self.apply("fretting technique", pair, |p| self.correct_fretting_technique(p));
        let pair = self.apply("slap clash", pair, |p| self.resolve_slap_clash(p));
        let pair = self.apply("stroke direction", pair, |p| self.alternate_stroke(p, context));
        let pair = self.apply("slide continuation", pair, |p| self.continue_slide(p));
        self.apply("open string", pair, |p| self.restrict_open_string(p, context))
    }

    fn apply<F: FnOnce(Pair) -> Pair>(&self, rule: &str, pair: Pair, revise: F) -> Pair {
        let before = pair.clone();
        traced(rule, &before, revise(pair))
    }

    fn correct_fretting_technique(&self, (prev, cur): Pair) -> Pair {
        let technique = cur.adornment().fretting.technique;
        if !technique.is_legato() {
            return (prev, cur);
        }
        let fret = cur.note().fret();
        let plain = FrettingTechnique::plain(fret);
        let derived = match &prev {
            Some(p) if p.note().string() == cur.note().string() => {
                if fret > p.note().fret() {
                    FrettingTechnique::HammerOn
                } else if fret < p.note().fret() && !p.adornment().has_natural_harmonic() {
                    FrettingTechnique::PullOff
                } else {
                    plain
                }
            }
            _ => plain,
        };
        let cur = if derived.is_legato() {
            cur.map_adornment(|a| a.with_fretting_technique(derived).with_plucking_technique(PluckingTechnique::Finger))
        } else {
            cur.map_adornment(|a| a.with_fretting_technique(derived))
        };
        (prev, cur)
    }

    fn resolve_slap_clash(&self, (prev, cur): Pair) -> Pair {
        let p = match prev {
            Some(p) => p,
            None => return (None, cur),
        };
        let technique = cur.adornment().plucking.technique;
        let crossing = (cur.note().string() as i16 - p.note().string() as i16).abs();
        if !technique.is_slap_family()
            || p.adornment().plucking.technique != technique
            || crossing < self.slap_string_crossing as i16
        {
            return (Some(p), cur);
        }
        // The thumb slaps the lower-pitched string.
        let (prev_role, cur_role) = if cur.note().string() > p.note().string() {
            (PluckingTechnique::Pop, PluckingTechnique::Slap)
        } else {
            (PluckingTechnique::Slap, PluckingTechnique::Pop)
        };
        if p.adornment().plucking.technique == prev_role {
            (Some(p), cur.map_adornment(|a| a.with_plucking_technique(cur_role)))
        } else {
            (Some(p.map_adornment(|a| a.with_plucking_technique(prev_role))), cur)
        }
    }

    fn alternate_stroke(&self, (prev, cur): Pair, context: &PairContext) -> Pair {
        let technique = cur.adornment().plucking.technique;
        if !technique.is_directional() {
            return (prev, cur);
        }
        let downbeat = context.frame.is_on_beat(cur.note().start());
        let to = cur.note().string();
        let last = prev
            .as_ref()
            .and_then(|p| p.adornment().plucking.technique.stroke().map(|s| (s, p.note().string())));
        let stroke = match last {
            None if downbeat => Stroke::Down,
            None => return (prev, cur),
            Some((last_stroke, from)) => {
                let stroke = if downbeat { Stroke::Down } else { last_stroke.opposite() };
                let sweep = from != to
                    && match last_stroke {
                        Stroke::Down => to < from,
                        Stroke::Up => to > from,
                    };
                if stroke == last_stroke && !sweep {
                    stroke.opposite()
                } else {
                    stroke
                }
            }
        };
        let cur = cur.map_adornment(|a| a.with_plucking_technique(technique.with_stroke(stroke)));
        (prev, cur)
    }

    fn continue_slide(&self, (prev, cur): Pair) -> Pair {
        let p = match prev {
            Some(p) if p.adornment().has_connecting_slide() => p,
            other => return (other, cur),
        };
        let (before, after) = (p.note().clone(), cur.note().clone());
        let fall_away = |p: AdornedNote| {
            let outto = if before.fret() <= 1 { None } else { Some(SlideOut::OutDownwards) };
            p.map_adornment(|a| a.with_slide_outto(outto))
        };
        if before.end() != after.start() {
            (Some(fall_away(p)), cur)
        } else if before.string() == after.string() {
            if after.fret() == before.fret() {
                (Some(p.map_adornment(|a| a.with_slide_outto(None))), cur)
            } else {
                let into = if after.fret() > before.fret() { SlideIn::FromBelow } else { SlideIn::FromAbove };
                (Some(p), cur.map_adornment(|a| a.with_slide_into(Some(into))))
            }
        } else if after.pitch() > before.pitch() {
            let into = if after.fret() > 1 { Some(SlideIn::FromBelow) } else { None };
            (
                Some(p.map_adornment(|a| a.with_slide_outto(Some(SlideOut::OutUpwards)))),
                cur.map_adornment(|a| a.with_slide_into(into)),
            )
        } else {
            (Some(fall_away(p)), cur.map_adornment(|a| a.with_slide_into(Some(SlideIn::FromAbove))))
        }
    }

    fn restrict_open_string(&self, (prev, cur): Pair, context: &PairContext) -> Pair {
        if cur.note().fret() != 0 {
            return (prev, cur);
        }
        let cur = match cur.adornment().slide() {
            Some(slide) => cur.map_adornment(|a| {
                a.with_slide(Some(Slide {
                    into: slide.into.filter(|i| *i != SlideIn::FromBelow),
                    outto: slide.outto.filter(|o| *o != SlideOut::OutDownwards),
                }))
            }),
            None => cur,
        };
        if cur.adornment().plucking.technique != PluckingTechnique::Tap {
            return (prev, cur);
        }
        let untapped = |n: Option<&AdornedNote>| {
            n.map(|n| n.adornment().plucking.technique)
                .filter(|t| *t != PluckingTechnique::Tap)
        };
        let replacement = untapped(prev.as_ref())
            .or_else(|| untapped(context.next))
            .or(context.fallback)
            .unwrap_or(PluckingTechnique::Finger);
        let cur = cur.map_adornment(|a| a.with_plucking_technique(replacement));
        if replacement.is_directional() {
            self.alternate_stroke((prev, cur), context)
        } else {
            (prev, cur)
        }
    }

    fn correct_harmonic_position(&self, (prev, cur): Pair) -> Pair {
        let kind = if cur.adornment().has_natural_harmonic() {
            HarmonicKind::Natural
        } else if cur.adornment().artificial_harmonic().is_some() {
            HarmonicKind::Artificial
        } else {
            return (prev, cur);
        };
        let note = cur.note().clone();
        let here = Position::new(note.string(), note.fret());
        let cur = match nearest_harmonic_position(note.tuning(), note.pitch(), kind, here) {
            Some(there) if there == here => cur,
            Some(there) => {
                let moved = cur.with_note(note.relocated(there.string, there.fret));
                if moved.adornment().fretting.technique.is_legato() {
                    moved
                } else {
                    moved.map_adornment(|a| a.with_fretting_technique(FrettingTechnique::plain(there.fret)))
                }
            }
            None => {
                warn!(
                    "no {kind:?} harmonic position sounds pitch {} near string {} fret {}; harmonic dropped",
                    note.pitch(),
                    note.string(),
                    note.fret()
                );
                match kind {
                    HarmonicKind::Natural => cur.map_adornment(|a| a.with_fretting_modification(None)),
                    HarmonicKind::Artificial => cur.map_adornment(|a| a.with_artificial_harmonic(None)),
                }
            }
        };
        (prev, cur)
    }

    /// An off-beat grace note takes at most half of the previous note.
    fn correct_grace_duration(&self, (prev, cur): Pair) -> Pair {
        let limit = match (&prev, &cur.adornment().grace_note) {
            (Some(p), Some(grace)) if !grace.on_beat && grace.duration > p.note().duration() / 2 => {
                Some(p.note().duration() / 2)
            }
            _ => None,
        };
        match limit {
            Some(limit) => {
                let cur = cur.map_adornment(|a| a.with_grace_note(a.grace_note.as_ref().map(|g| g.with_duration(limit))));
                (prev, cur)
            }
            None => (prev, cur),
        }
    }

    fn strict_legato(&self, (prev, cur): Pair) -> Pair {
        let modulated = prev.as_ref().map_or(false, |p| p.adornment().trill().is_some() || p.adornment().slide().is_some());
        if modulated && cur.adornment().fretting.technique.is_legato() {
            let plain = FrettingTechnique::plain(cur.note().fret());
            let cur = cur.map_adornment(|a| a.with_fretting_technique(plain));
            (prev, cur)
        } else {
            (prev, cur)
        }
    }
}

pub fn revise_measure(measure: &Measure, strict: bool) -> Result<Measure, AdornError> {
    RevisionEngine::new(strict, DEFAULT_SLAP_STRING_CROSSING).revise_measure(measure, 0)
}

pub fn revise_song(song: &Song, strict: bool) -> Result<Song, AdornError> {
    RevisionEngine::new(strict, DEFAULT_SLAP_STRING_CROSSING).revise_song(song)
}
