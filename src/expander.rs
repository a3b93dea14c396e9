use itertools::{iproduct, Itertools};
use log::debug;

use crate::adornment::{Adornment, Fretting, FrettingModification, Modulation, Plucking, PluckingModification};
use crate::candidates::CandidateFacetSet;

/// Expands per-facet candidates into whole adornments that satisfy the
/// mutual-exclusion table.
pub struct AdornmentSpaceExpander {
    strict: bool,
    minimizing: bool,
}

impl AdornmentSpaceExpander {
    pub fn new(strict: bool, minimizing: bool) -> Self {
        AdornmentSpaceExpander { strict, minimizing }
    }

    pub fn expand(&self, facets: &CandidateFacetSet) -> Vec<Adornment> {
        let mut facets = facets.clone();
        if self.minimizing {
            facets.let_ring.restrict_to(false);
            facets.ghost_note.restrict_to(false);
        }

        let pluckings = iproduct!(
            facets.plucking_technique.iter(),
            facets.plucking_accent.iter(),
            facets.palm_mute.iter(),
            facets.artificial_harmonic.iter()
        )
        .map(|(technique, accent, palm_mute, artificial_harmonic)| Plucking {
            technique: *technique,
            modification: PluckingModification { palm_mute: *palm_mute, artificial_harmonic: *artificial_harmonic },
            accent: *accent,
        })
        .collect_vec();

        let frettings = iproduct!(
            facets.fretting_technique.iter(),
            facets.fretting_accent.iter(),
            facets.fretting_modification.iter(),
            facets.let_ring.iter()
        )
        .map(|(technique, accent, kind, let_ring)| Fretting {
            technique: *technique,
            modification: FrettingModification { kind: *kind, let_ring: *let_ring },
            accent: *accent,
            modulation: Modulation::default(),
        })
        .collect_vec();

        let modulations = iproduct!(facets.bend.iter(), facets.vibrato.iter(), facets.trill.iter(), facets.slide.iter())
            .map(|(bend, vibrato, trill, slide)| Modulation {
                bend: *bend,
                vibrato: *vibrato,
                trill: trill.clone(),
                slide: *slide,
            })
            .collect_vec();

        let tails = iproduct!(facets.grace_note.iter(), facets.ghost_note.iter()).collect_vec();

        let space = iproduct!(pluckings.iter(), frettings.iter(), modulations.iter(), tails.iter())
            .map(|(plucking, fretting, modulation, (grace_note, ghost_note))| {
                Adornment {
                    plucking: *plucking,
                    fretting: Fretting { modulation: modulation.clone(), ..fretting.clone() },
                    grace_note: (*grace_note).clone(),
                    ghost_note: **ghost_note,
                }
                .conformed(self.strict)
            })
            .unique()
            .collect_vec();
        debug!(
            "expanded {} pluckings, {} frettings, {} modulations, {} tails into {} adornments",
            pluckings.len(),
            frettings.len(),
            modulations.len(),
            tails.len(),
            space.len()
        );
        space
    }
}

pub fn expand(facets: &CandidateFacetSet, strict: bool, minimizing: bool) -> Vec<Adornment> {
    AdornmentSpaceExpander::new(strict, minimizing).expand(facets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adornment::{
        ArtificialHarmonic, FrettingModificationType, FrettingTechnique, GraceNote, GraceTransition, PluckingTechnique,
        Slide, SlideIn, SlideOut, Trill,
    };
    use crate::candidates::FacetValues;
    use crate::tab::{time, Dynamic};

    fn grace(transition: GraceTransition, dead: bool) -> Option<GraceNote> {
        Some(GraceNote { fret: 3, duration: time(1, 32), dynamic: Dynamic::default(), dead, on_beat: false, transition: Some(transition) })
    }

    fn minimal() -> CandidateFacetSet {
        CandidateFacetSet {
            plucking_accent: FacetValues::from_values([false]),
            fretting_accent: FacetValues::from_values([false]),
            plucking_technique: FacetValues::from_values([PluckingTechnique::Finger]),
            artificial_harmonic: FacetValues::from_values([None]),
            palm_mute: FacetValues::from_values([false]),
            fretting_technique: FacetValues::from_values([FrettingTechnique::Fretted]),
            fretting_modification: FacetValues::from_values([None]),
            let_ring: FacetValues::from_values([false]),
            bend: FacetValues::from_values([None]),
            trill: FacetValues::from_values([None]),
            vibrato: FacetValues::from_values([false]),
            slide: FacetValues::from_values([None]),
            grace_note: FacetValues::from_values([None]),
            ghost_note: FacetValues::from_values([false]),
            dynamics: FacetValues::from_values([Dynamic::default()]),
        }
    }

    fn crowded() -> CandidateFacetSet {
        let mut facets = minimal();
        facets.plucking_technique = FacetValues::from_values([PluckingTechnique::Finger, PluckingTechnique::Tap]);
        facets.artificial_harmonic = FacetValues::from_values([None, Some(ArtificialHarmonic::for_pitch(52))]);
        facets.fretting_technique = FacetValues::from_values([FrettingTechnique::Fretted, FrettingTechnique::HammerOn]);
        facets.fretting_modification = FacetValues::from_values([
            None,
            Some(FrettingModificationType::DeadNote),
            Some(FrettingModificationType::NaturalHarmonic),
        ]);
        facets.let_ring = FacetValues::from_values([false, true]);
        facets.trill = FacetValues::from_values([None, Some(Trill { fret: 7, duration: Some(time(1, 16)) })]);
        facets.slide = FacetValues::from_values([None, Slide::new(Some(SlideIn::FromAbove), Some(SlideOut::ShiftSlideTo))]);
        facets.grace_note = FacetValues::from_values([
            None,
            grace(GraceTransition::Slide, true),
            grace(GraceTransition::Bend, false),
            grace(GraceTransition::Hammer, false),
        ]);
        facets.ghost_note = FacetValues::from_values([false, true]);
        facets
    }

    #[test]
    fn test_single_combination() {
        let space = expand(&minimal(), true, false);
        assert_eq!(space, vec![Adornment::unadorned(5)]);
    }

    #[test]
    fn test_empty_facet_empties_space() {
        let mut facets = minimal();
        facets.slide = FacetValues::default();
        assert!(expand(&facets, true, false).is_empty());
        assert!(expand(&CandidateFacetSet::default(), true, true).is_empty());
    }

    #[test]
    fn test_mutual_exclusion() {
        let space = expand(&crowded(), true, false);
        assert!(!space.is_empty());
        for adornment in space.iter() {
            assert!(adornment.is_well_formed(true));
            if adornment.trill().is_some() {
                assert_eq!(adornment.modification_kind(), None);
                assert_eq!(adornment.artificial_harmonic(), None);
                assert_eq!(adornment.slide(), None);
                assert_ne!(adornment.plucking.technique, PluckingTechnique::Tap);
            }
            let transition = adornment.grace_note.as_ref().and_then(|g| g.transition);
            if adornment.has_natural_harmonic() || adornment.artificial_harmonic().is_some() {
                assert!(transition.is_none() || transition == Some(GraceTransition::Bend));
                assert_ne!(adornment.plucking.technique, PluckingTechnique::Tap);
            }
            if adornment.is_dead_note() && adornment.fretting.technique.is_legato() {
                assert_eq!(transition, None);
            }
        }
        assert_eq!(space.iter().unique().count(), space.len());
    }

    #[test]
    fn test_lenient_space_is_full_product() {
        let facets = crowded();
        let expected: usize = facets.facet_sizes()[..14].iter().product();
        assert_eq!(expand(&facets, false, false).len(), expected);
        assert!(expand(&facets, true, false).len() < expected);
    }

    #[test]
    fn test_minimizing_drops_let_ring_and_ghost() {
        let space = expand(&crowded(), true, true);
        assert!(!space.is_empty());
        assert!(space.iter().all(|a| !a.fretting.modification.let_ring && !a.ghost_note));
    }
}
