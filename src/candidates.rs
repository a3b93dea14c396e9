use std::cmp::{max, min};

use log::debug;
use num::Zero;
use serde::{Deserialize, Serialize};

use crate::adornment::{
    ArtificialHarmonic, Bend, FrettingModificationType, FrettingTechnique, GraceNote, GraceTransition,
    PluckingTechnique, Slide, SlideIn, SlideOut, Trill,
};
use crate::harmonics::{is_reachable, HarmonicKind};
use crate::tab::{time, AdornedNote, Dynamic, Fret, MeasureFrame, Note, Time};

const DEFAULT_TRILL_RATIO: i64 = 4;

/// An adorned note offered as a source of technique, with the frame of the
/// measure it came from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    pub note: AdornedNote,
    pub frame: MeasureFrame,
}

impl Exemplar {
    pub fn new(note: AdornedNote, frame: MeasureFrame) -> Self {
        Exemplar { note, frame }
    }
}

/// Admissible values of one facet, in order of first admission and without duplicates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FacetValues<T> {
    values: Vec<T>,
}

impl<T> Default for FacetValues<T> {
    fn default() -> Self {
        FacetValues { values: vec![] }
    }
}

impl<T: Clone + PartialEq> FacetValues<T> {
    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Self {
        let mut result = FacetValues::default();
        for v in values {
            result.admit(v);
        }
        result
    }

    pub fn admit(&mut self, value: T) {
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.values.contains(value)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Restricts the facet to `value` when it is admissible at all.
    pub fn restrict_to(&mut self, value: T) {
        if !self.values.is_empty() {
            self.values = vec![value];
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CandidateFacetSet {
    pub plucking_accent: FacetValues<bool>,
    pub fretting_accent: FacetValues<bool>,
    pub plucking_technique: FacetValues<PluckingTechnique>,
    pub artificial_harmonic: FacetValues<Option<ArtificialHarmonic>>,
    pub palm_mute: FacetValues<bool>,
    pub fretting_technique: FacetValues<FrettingTechnique>,
    pub fretting_modification: FacetValues<Option<FrettingModificationType>>,
    pub let_ring: FacetValues<bool>,
    pub bend: FacetValues<Option<Bend>>,
    pub trill: FacetValues<Option<Trill>>,
    pub vibrato: FacetValues<bool>,
    pub slide: FacetValues<Option<Slide>>,
    pub grace_note: FacetValues<Option<GraceNote>>,
    pub ghost_note: FacetValues<bool>,
    pub dynamics: FacetValues<Dynamic>,
}

impl CandidateFacetSet {
    pub fn is_empty(&self) -> bool {
        self.facet_sizes().iter().any(|n| *n == 0)
    }

    pub fn facet_sizes(&self) -> [usize; 15] {
        [
            self.plucking_accent.len(),
            self.fretting_accent.len(),
            self.plucking_technique.len(),
            self.artificial_harmonic.len(),
            self.palm_mute.len(),
            self.fretting_technique.len(),
            self.fretting_modification.len(),
            self.let_ring.len(),
            self.bend.len(),
            self.trill.len(),
            self.vibrato.len(),
            self.slide.len(),
            self.grace_note.len(),
            self.ghost_note.len(),
            self.dynamics.len(),
        ]
    }
}

pub struct CandidateFeatureCollector<'a> {
    target: &'a Note,
    frame: MeasureFrame,
}

impl<'a> CandidateFeatureCollector<'a> {
    pub fn new(target: &'a Note, frame: MeasureFrame) -> Self {
        CandidateFeatureCollector { target, frame }
    }

    pub fn collect(&self, exemplars: &[Exemplar]) -> CandidateFacetSet {
        let mut facets = CandidateFacetSet::default();
        for exemplar in exemplars.iter() {
            self.admit(exemplar, &mut facets);
        }
        debug!(
            "collected facets {:?} for pitch {} at {} from {} exemplars",
            facets.facet_sizes(),
            self.target.pitch(),
            self.target.start(),
            exemplars.len()
        );
        facets
    }

    fn admit(&self, exemplar: &Exemplar, facets: &mut CandidateFacetSet) {
        let source = exemplar.note.note();
        let adornment = exemplar.note.adornment();
        let modulation = &adornment.fretting.modulation;

        let same_phase = exemplar.frame.beat_phase(source.start()) == self.frame.beat_phase(self.target.start());
        facets.plucking_accent.admit(same_phase && adornment.plucking.accent);
        facets.fretting_accent.admit(same_phase && adornment.fretting.accent);

        if self.same_length(exemplar) {
            facets.bend.admit(modulation.bend);
            facets.vibrato.admit(modulation.vibrato);
            facets.trill.admit(modulation.trill.as_ref().map(|t| self.transposed_trill(source, t)));
        } else {
            facets.bend.admit(None);
            facets.vibrato.admit(false);
            facets.trill.admit(None);
        }

        facets.slide.admit(modulation.slide.and_then(|s| self.open_string_slide(s)));

        facets.artificial_harmonic.admit(
            adornment
                .artificial_harmonic()
                .filter(|_| is_reachable(self.target.tuning(), self.target.pitch(), HarmonicKind::Artificial))
                .map(|_| ArtificialHarmonic::for_pitch(self.target.pitch())),
        );
        facets.fretting_modification.admit(match adornment.modification_kind() {
            Some(FrettingModificationType::NaturalHarmonic)
                if !is_reachable(self.target.tuning(), self.target.pitch(), HarmonicKind::Natural) =>
            {
                None
            }
            other => other,
        });

        facets.fretting_technique.admit(match adornment.fretting.technique {
            FrettingTechnique::Fretted | FrettingTechnique::NoTechnique => FrettingTechnique::plain(self.target.fret()),
            legato => legato,
        });

        facets
            .grace_note
            .admit(adornment.grace_note.as_ref().map(|g| self.transposed_grace(exemplar, g)));

        facets
            .ghost_note
            .admit(adornment.ghost_note && self.target.duration() <= source.duration());

        facets.plucking_technique.admit(adornment.plucking.technique);
        facets.palm_mute.admit(adornment.plucking.modification.palm_mute);
        facets.let_ring.admit(adornment.fretting.modification.let_ring);
        facets.dynamics.admit(source.dynamic());
    }

    fn same_length(&self, exemplar: &Exemplar) -> bool {
        let source = exemplar.note.note();
        exemplar.frame.normalized(source.duration()) == self.frame.normalized(self.target.duration())
            || exemplar.frame.normalized(source.notated().value) == self.frame.normalized(self.target.notated().value)
    }

    /// Keeps the interval between the exemplar's fret and the ornament's fret.
    fn transposed_fret(&self, source: &Note, fret: Fret) -> Fret {
        max(0, fret - source.fret() + self.target.fret())
    }

    fn transposed_trill(&self, source: &Note, trill: &Trill) -> Trill {
        let ratio = match trill.duration {
            Some(d) if d > Time::zero() => source.notated().value / d,
            _ => Time::from_integer(DEFAULT_TRILL_RATIO),
        };
        let duration = if ratio.is_zero() { None } else { Some(self.target.notated().value / ratio) };
        Trill { fret: self.transposed_fret(source, trill.fret), duration }
    }

    fn open_string_slide(&self, slide: Slide) -> Option<Slide> {
        if self.target.fret() != 0 {
            return Some(slide);
        }
        Slide {
            into: slide.into.filter(|i| *i != SlideIn::FromBelow),
            outto: slide.outto.filter(|o| *o != SlideOut::OutDownwards),
        }
        .normalized()
    }

    fn transposed_grace(&self, exemplar: &Exemplar, grace: &GraceNote) -> GraceNote {
        let source = exemplar.note.note();
        let target_fret = self.target.fret();
        let fret = self.transposed_fret(source, grace.fret);
        let transition = grace.transition.filter(|t| match t {
            GraceTransition::Bend => target_fret != 0 && !grace.dead,
            GraceTransition::Slide => fret != target_fret,
            GraceTransition::Hammer => fret != target_fret && !(grace.dead && fret > target_fret),
        });
        let target_duration = self.target.duration();
        let duration = if !grace.on_beat {
            min(target_duration / 2, time(1, 32))
        } else if target_duration >= time(1, 16) {
            time(1, 32)
        } else {
            target_duration / 2
        };
        GraceNote { fret, duration, transition, ..grace.clone() }
    }
}

pub fn collect_candidates(target: &Note, frame: MeasureFrame, exemplars: &[Exemplar]) -> CandidateFacetSet {
    CandidateFeatureCollector::new(target, frame).collect(exemplars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adornment::{Adornment, BendKind};
    use crate::tab::{DynamicLevel, MeasureMeta, Tuning};

    fn plain(string: u8, fret: Fret, start: Time, duration: Time) -> Note {
        Note::fretted(string, fret, Tuning::standard_bass(), start, duration).unwrap()
    }

    fn frame_at(start: Time) -> MeasureFrame {
        MeasureFrame::new(start, MeasureMeta::default())
    }

    fn grace(fret: Fret, transition: GraceTransition, dead: bool, on_beat: bool) -> GraceNote {
        GraceNote { fret, duration: time(1, 16), dynamic: Dynamic::default(), dead, on_beat, transition: Some(transition) }
    }

    fn rich_exemplar() -> Exemplar {
        let source = plain(3, 5, time(5, 4), time(1, 4)).with_dynamic(Dynamic::new(DynamicLevel::F));
        let mut adornment = Adornment::unadorned(5)
            .with_plucking_technique(PluckingTechnique::Slap)
            .with_bend(Some(Bend { kind: BendKind::Bend, amount: 2 }))
            .with_slide(Slide::new(Some(SlideIn::FromBelow), Some(SlideOut::OutDownwards)))
            .with_grace_note(Some(grace(3, GraceTransition::Hammer, false, false)));
        adornment.plucking.accent = true;
        adornment.plucking.modification.palm_mute = true;
        adornment.fretting.modulation.vibrato = true;
        adornment.ghost_note = true;
        Exemplar::new(AdornedNote::new(source, adornment), frame_at(time(1, 1)))
    }

    #[test]
    fn test_facet_values_combine() {
        let accents = FacetValues::from_values([false, true, false]);
        let dynamics = FacetValues::from_values([Dynamic::default(), Dynamic::new(DynamicLevel::F)]);
        let pairs = itertools::iproduct!(accents.iter(), dynamics.iter(), accents.iter()).count();
        assert_eq!(pairs, 8);
        let repeated = accents.iter();
        assert_eq!(repeated.clone().chain(repeated).copied().collect::<Vec<_>>(), vec![false, true, false, true]);
    }

    #[test]
    fn test_empty_exemplars() {
        let target = plain(3, 7, time(0, 1), time(1, 4));
        let facets = collect_candidates(&target, frame_at(time(0, 1)), &[]);
        assert!(facets.is_empty());
    }

    #[test]
    fn test_admissibility_closure() {
        let target = plain(3, 7, time(1, 4), time(1, 4));
        let exemplar = rich_exemplar();
        let facets = collect_candidates(&target, frame_at(time(0, 1)), &[exemplar.clone()]);
        let source = exemplar.note.adornment();
        assert!(!facets.is_empty());
        assert!(facets.plucking_accent.contains(&true));
        assert!(facets.plucking_technique.contains(&source.plucking.technique));
        assert!(facets.palm_mute.contains(&true));
        assert!(facets.bend.contains(&source.fretting.modulation.bend));
        assert!(facets.vibrato.contains(&true));
        assert!(facets.slide.contains(&source.slide()));
        assert!(facets.ghost_note.contains(&true));
        assert!(facets.dynamics.contains(&Dynamic::new(DynamicLevel::F)));
        assert!(facets.fretting_technique.contains(&FrettingTechnique::Fretted));
        let grace = facets.grace_note.values()[0].clone().unwrap();
        assert_eq!(grace.fret, 5);
        assert_eq!(grace.transition, Some(GraceTransition::Hammer));
        assert_eq!(grace.duration, time(1, 32));
    }

    #[test]
    fn test_phase_and_length_suppression() {
        // Off the exemplar's beat phase and twice as long.
        let target = plain(3, 7, time(1, 8), time(1, 2));
        let facets = collect_candidates(&target, frame_at(time(0, 1)), &[rich_exemplar()]);
        assert_eq!(facets.plucking_accent.values(), &[false]);
        assert_eq!(facets.bend.values(), &[None]);
        assert_eq!(facets.vibrato.values(), &[false]);
        assert_eq!(facets.ghost_note.values(), &[false]);
    }

    #[test]
    fn test_open_string_target() {
        let target = plain(3, 0, time(1, 4), time(1, 4));
        let facets = collect_candidates(&target, frame_at(time(0, 1)), &[rich_exemplar()]);
        assert_eq!(facets.slide.values(), &[None]);
        assert_eq!(facets.fretting_technique.values(), &[FrettingTechnique::NoTechnique]);
        // Hammer from fret 3 to 5 becomes 0 to 0.
        let grace = facets.grace_note.values()[0].clone().unwrap();
        assert_eq!(grace.fret, 0);
        assert_eq!(grace.transition, None);
    }

    #[test]
    fn test_trill_transposition() {
        let source = plain(3, 5, time(0, 1), time(1, 4));
        let adornment = Adornment::unadorned(5).with_trill(Some(Trill { fret: 7, duration: Some(time(1, 16)) }));
        let untimed = Adornment::unadorned(5).with_trill(Some(Trill { fret: 6, duration: None }));
        let exemplars = vec![
            Exemplar::new(AdornedNote::new(source.clone(), adornment), frame_at(time(0, 1))),
            Exemplar::new(AdornedNote::new(source, untimed), frame_at(time(0, 1))),
        ];
        let target = plain(2, 2, time(0, 1), time(1, 4));
        let facets = collect_candidates(&target, frame_at(time(0, 1)), &exemplars);
        assert_eq!(facets.trill.values(), &[
            Some(Trill { fret: 4, duration: Some(time(1, 16)) }),
            Some(Trill { fret: 3, duration: Some(time(1, 16)) }),
        ]);
    }

    #[test]
    fn test_harmonic_admission() {
        let source = plain(2, 7, time(0, 1), time(1, 4)).repitched(57, 7);
        let natural = Adornment::unadorned(7).with_fretting_modification(Some(FrettingModificationType::NaturalHarmonic));
        let artificial = Adornment::unadorned(7).with_artificial_harmonic(Some(ArtificialHarmonic::for_pitch(57)));
        let exemplars = vec![
            Exemplar::new(AdornedNote::new(source.clone(), natural), frame_at(time(0, 1))),
            Exemplar::new(AdornedNote::new(source, artificial), frame_at(time(0, 1))),
        ];
        // 44 is not a natural harmonic anywhere on a standard bass.
        let unreachable = plain(1, 1, time(0, 1), time(1, 4));
        let facets = collect_candidates(&unreachable, frame_at(time(0, 1)), &exemplars);
        assert_eq!(facets.fretting_modification.values(), &[None]);
        assert!(facets.artificial_harmonic.contains(&Some(ArtificialHarmonic::for_pitch(44))));

        let reachable = plain(2, 7, time(0, 1), time(1, 4)).repitched(57, 7);
        let facets = collect_candidates(&reachable, frame_at(time(0, 1)), &exemplars);
        assert_eq!(facets.fretting_modification.values(), &[Some(FrettingModificationType::NaturalHarmonic), None]);
    }

    #[test]
    fn test_grace_rules() {
        let target = plain(3, 5, time(1, 4), time(1, 32));
        let source = plain(3, 5, time(1, 4), time(1, 4));
        let exemplar = |g: GraceNote| {
            Exemplar::new(AdornedNote::new(source.clone(), Adornment::unadorned(5).with_grace_note(Some(g))), frame_at(time(0, 1)))
        };
        let collect = |g: GraceNote| collect_candidates(&target, frame_at(time(0, 1)), &[exemplar(g)]).grace_note.values()[0].clone().unwrap();

        assert_eq!(collect(grace(5, GraceTransition::Slide, false, false)).transition, None);
        assert_eq!(collect(grace(3, GraceTransition::Bend, true, false)).transition, None);
        assert_eq!(collect(grace(7, GraceTransition::Hammer, true, false)).transition, None);
        assert_eq!(collect(grace(3, GraceTransition::Hammer, true, false)).transition, Some(GraceTransition::Hammer));
        assert_eq!(collect(grace(3, GraceTransition::Hammer, false, true)).duration, time(1, 64));
        assert_eq!(collect(grace(3, GraceTransition::Hammer, false, false)).duration, time(1, 64));
    }
}
