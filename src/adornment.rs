use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};

use crate::tab::{octave, pitch_class, Dynamic, Fret, Pitch, Time, NOTES_PER_OCTAVE};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stroke {
    Down,
    Up,
}

impl Stroke {
    pub fn opposite(&self) -> Stroke {
        match self {
            Stroke::Down => Stroke::Up,
            Stroke::Up => Stroke::Down,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluckingTechnique {
    Finger,
    PickDownstroke,
    PickUpstroke,
    DoubleThumbDownstroke,
    DoubleThumbUpstroke,
    Slap,
    Pop,
    Tap,
}

impl Default for PluckingTechnique {
    fn default() -> Self {
        PluckingTechnique::Finger
    }
}

impl PluckingTechnique {
    pub fn weight_key(&self) -> &'static str {
        match self {
            PluckingTechnique::Finger => "finger",
            PluckingTechnique::PickDownstroke => "pick_downstroke",
            PluckingTechnique::PickUpstroke => "pick_upstroke",
            PluckingTechnique::DoubleThumbDownstroke => "double_thumb_downstroke",
            PluckingTechnique::DoubleThumbUpstroke => "double_thumb_upstroke",
            PluckingTechnique::Slap => "slap",
            PluckingTechnique::Pop => "pop",
            PluckingTechnique::Tap => "tap",
        }
    }

    pub fn is_slap_family(&self) -> bool {
        matches!(self, PluckingTechnique::Slap | PluckingTechnique::Pop)
    }

    /// Picking and double-thumb techniques carry a stroke direction.
    pub fn stroke(&self) -> Option<Stroke> {
        match self {
            PluckingTechnique::PickDownstroke | PluckingTechnique::DoubleThumbDownstroke => Some(Stroke::Down),
            PluckingTechnique::PickUpstroke | PluckingTechnique::DoubleThumbUpstroke => Some(Stroke::Up),
            _ => None,
        }
    }

    pub fn is_directional(&self) -> bool {
        self.stroke().is_some()
    }

    /// The same family of technique played in `stroke` direction. Non-directional
    /// techniques are returned unchanged.
    pub fn with_stroke(&self, stroke: Stroke) -> PluckingTechnique {
        match (self, stroke) {
            (PluckingTechnique::PickDownstroke | PluckingTechnique::PickUpstroke, Stroke::Down) => PluckingTechnique::PickDownstroke,
            (PluckingTechnique::PickDownstroke | PluckingTechnique::PickUpstroke, Stroke::Up) => PluckingTechnique::PickUpstroke,
            (PluckingTechnique::DoubleThumbDownstroke | PluckingTechnique::DoubleThumbUpstroke, Stroke::Down) => {
                PluckingTechnique::DoubleThumbDownstroke
            }
            (PluckingTechnique::DoubleThumbDownstroke | PluckingTechnique::DoubleThumbUpstroke, Stroke::Up) => {
                PluckingTechnique::DoubleThumbUpstroke
            }
            (other, _) => *other,
        }
    }
}

/// Sounding pitch of an artificial harmonic.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ArtificialHarmonic {
    pub octave: i8,
    pub pitch_class: u8,
}

impl ArtificialHarmonic {
    pub fn for_pitch(pitch: Pitch) -> Self {
        ArtificialHarmonic { octave: octave(pitch) as i8, pitch_class: pitch_class(pitch) as u8 }
    }

    pub fn pitch(&self) -> Pitch {
        self.octave as Pitch * NOTES_PER_OCTAVE + self.pitch_class as Pitch
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PluckingModification {
    pub palm_mute: bool,
    pub artificial_harmonic: Option<ArtificialHarmonic>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Plucking {
    pub technique: PluckingTechnique,
    pub modification: PluckingModification,
    pub accent: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrettingTechnique {
    NoTechnique,
    Fretted,
    HammerOn,
    PullOff,
}

impl FrettingTechnique {
    pub fn plain(fret: Fret) -> FrettingTechnique {
        if fret > 0 {
            FrettingTechnique::Fretted
        } else {
            FrettingTechnique::NoTechnique
        }
    }

    pub fn is_legato(&self) -> bool {
        matches!(self, FrettingTechnique::HammerOn | FrettingTechnique::PullOff)
    }

    pub fn weight_key(&self) -> &'static str {
        match self {
            FrettingTechnique::NoTechnique => "no_technique",
            FrettingTechnique::Fretted => "fretted",
            FrettingTechnique::HammerOn => "hammer_on",
            FrettingTechnique::PullOff => "pull_off",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrettingModificationType {
    DeadNote,
    NaturalHarmonic,
}

impl FrettingModificationType {
    pub fn weight_key(&self) -> &'static str {
        match self {
            FrettingModificationType::DeadNote => "dead_note",
            FrettingModificationType::NaturalHarmonic => "natural_harmonic",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FrettingModification {
    pub kind: Option<FrettingModificationType>,
    pub let_ring: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BendKind {
    Bend,
    BendRelease,
    BendReleaseBend,
    PreBend,
    PreBendRelease,
}

impl BendKind {
    pub fn weight_key(&self) -> &'static str {
        match self {
            BendKind::Bend => "bend",
            BendKind::BendRelease => "bend_release",
            BendKind::BendReleaseBend => "bend_release_bend",
            BendKind::PreBend => "pre_bend",
            BendKind::PreBendRelease => "pre_bend_release",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Bend {
    pub kind: BendKind,
    /// Quarter tones.
    pub amount: u8,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Trill {
    pub fret: Fret,
    pub duration: Option<Time>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideIn {
    FromBelow,
    FromAbove,
}

impl SlideIn {
    pub fn weight_key(&self) -> &'static str {
        match self {
            SlideIn::FromBelow => "slide_from_below",
            SlideIn::FromAbove => "slide_from_above",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideOut {
    ShiftSlideTo,
    LegatoSlideTo,
    OutDownwards,
    OutUpwards,
}

impl SlideOut {
    /// Shift and legato slides land on the following note.
    pub fn is_connecting(&self) -> bool {
        matches!(self, SlideOut::ShiftSlideTo | SlideOut::LegatoSlideTo)
    }

    pub fn weight_key(&self) -> &'static str {
        match self {
            SlideOut::ShiftSlideTo => "shift_slide_to",
            SlideOut::LegatoSlideTo => "legato_slide_to",
            SlideOut::OutDownwards => "slide_out_downwards",
            SlideOut::OutUpwards => "slide_out_upwards",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Slide {
    pub into: Option<SlideIn>,
    pub outto: Option<SlideOut>,
}

impl Slide {
    pub fn new(into: Option<SlideIn>, outto: Option<SlideOut>) -> Option<Slide> {
        Slide { into, outto }.normalized()
    }

    pub fn normalized(self) -> Option<Slide> {
        if self.into.is_none() && self.outto.is_none() {
            None
        } else {
            Some(self)
        }
    }

    pub fn is_connecting(&self) -> bool {
        self.outto.map_or(false, |o| o.is_connecting())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Modulation {
    pub bend: Option<Bend>,
    pub vibrato: bool,
    pub trill: Option<Trill>,
    pub slide: Option<Slide>,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Fretting {
    pub technique: FrettingTechnique,
    pub modification: FrettingModification,
    pub accent: bool,
    pub modulation: Modulation,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraceTransition {
    Slide,
    Bend,
    Hammer,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GraceNote {
    pub fret: Fret,
    pub duration: Time,
    pub dynamic: Dynamic,
    pub dead: bool,
    pub on_beat: bool,
    pub transition: Option<GraceTransition>,
}

impl GraceNote {
    pub fn with_transition(&self, transition: Option<GraceTransition>) -> GraceNote {
        GraceNote { transition, ..self.clone() }
    }

    pub fn with_duration(&self, duration: Time) -> GraceNote {
        GraceNote { duration, ..self.clone() }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Adornment {
    pub plucking: Plucking,
    pub fretting: Fretting,
    pub grace_note: Option<GraceNote>,
    pub ghost_note: bool,
}

impl Adornment {
    /// Finger-plucked with the plain fretting technique for `fret`.
    pub fn unadorned(fret: Fret) -> Self {
        Adornment {
            plucking: Plucking::default(),
            fretting: Fretting {
                technique: FrettingTechnique::plain(fret),
                modification: FrettingModification::default(),
                accent: false,
                modulation: Modulation::default(),
            },
            grace_note: None,
            ghost_note: false,
        }
    }

    pub fn slide(&self) -> Option<Slide> {
        self.fretting.modulation.slide
    }

    pub fn trill(&self) -> Option<&Trill> {
        self.fretting.modulation.trill.as_ref()
    }

    pub fn modification_kind(&self) -> Option<FrettingModificationType> {
        self.fretting.modification.kind
    }

    pub fn artificial_harmonic(&self) -> Option<ArtificialHarmonic> {
        self.plucking.modification.artificial_harmonic
    }

    pub fn has_natural_harmonic(&self) -> bool {
        self.modification_kind() == Some(FrettingModificationType::NaturalHarmonic)
    }

    pub fn is_dead_note(&self) -> bool {
        self.modification_kind() == Some(FrettingModificationType::DeadNote)
    }

    pub fn has_connecting_slide(&self) -> bool {
        self.slide().map_or(false, |s| s.is_connecting())
    }

    pub fn with_plucking_technique(&self, technique: PluckingTechnique) -> Adornment {
        let mut result = self.clone();
        result.plucking.technique = technique;
        result
    }

    pub fn with_fretting_technique(&self, technique: FrettingTechnique) -> Adornment {
        let mut result = self.clone();
        result.fretting.technique = technique;
        result
    }

    /// Empty slides are stored as no slide.
    pub fn with_slide(&self, slide: Option<Slide>) -> Adornment {
        let mut result = self.clone();
        result.fretting.modulation.slide = slide.and_then(|s| s.normalized());
        result
    }

    pub fn with_slide_into(&self, into: Option<SlideIn>) -> Adornment {
        let outto = self.slide().and_then(|s| s.outto);
        self.with_slide(Some(Slide { into, outto }))
    }

    pub fn with_slide_outto(&self, outto: Option<SlideOut>) -> Adornment {
        let into = self.slide().and_then(|s| s.into);
        self.with_slide(Some(Slide { into, outto }))
    }

    pub fn with_trill(&self, trill: Option<Trill>) -> Adornment {
        let mut result = self.clone();
        result.fretting.modulation.trill = trill;
        result
    }

    pub fn with_bend(&self, bend: Option<Bend>) -> Adornment {
        let mut result = self.clone();
        result.fretting.modulation.bend = bend;
        result
    }

    pub fn with_grace_note(&self, grace_note: Option<GraceNote>) -> Adornment {
        let mut result = self.clone();
        result.grace_note = grace_note;
        result
    }

    pub fn with_fretting_modification(&self, kind: Option<FrettingModificationType>) -> Adornment {
        let mut result = self.clone();
        result.fretting.modification.kind = kind;
        result
    }

    pub fn with_artificial_harmonic(&self, harmonic: Option<ArtificialHarmonic>) -> Adornment {
        let mut result = self.clone();
        result.plucking.modification.artificial_harmonic = harmonic;
        result
    }

    fn with_grace_transition(&self, transition: Option<GraceTransition>) -> Adornment {
        let grace_note = self.grace_note.as_ref().map(|g| g.with_transition(transition));
        self.with_grace_note(grace_note)
    }

    fn grace_transition(&self) -> Option<GraceTransition> {
        self.grace_note.as_ref().and_then(|g| g.transition)
    }

    /// Applies the mutual-exclusion table. Without `strict`, every combination
    /// is representable and the adornment is returned as is.
    pub fn conformed(&self, strict: bool) -> Adornment {
        if !strict {
            return self.clone();
        }
        let tapped = self.plucking.technique == PluckingTechnique::Tap;
        let mut result = self.clone();
        if tapped {
            result = result.with_trill(None);
        }
        if result.trill().is_some() {
            result = result
                .with_slide(None)
                .with_fretting_modification(None)
                .with_artificial_harmonic(None);
        }
        if result.has_natural_harmonic() {
            if result.grace_transition() != Some(GraceTransition::Bend) {
                result = result.with_grace_transition(None);
            }
            if tapped {
                result = result.with_fretting_modification(None);
            }
        }
        if result.artificial_harmonic().is_some() {
            if result.grace_transition() != Some(GraceTransition::Bend) {
                result = result.with_grace_transition(None);
            }
            if tapped {
                result = result.with_artificial_harmonic(None);
            }
        }
        if result.is_dead_note() {
            if let Some(grace) = result.grace_note.clone() {
                if grace.dead && grace.transition == Some(GraceTransition::Slide) {
                    result = result.with_grace_transition(None);
                }
                if result.fretting.technique.is_legato() {
                    result = result.with_grace_transition(None);
                }
            }
        }
        result
    }

    pub fn is_well_formed(&self, strict: bool) -> bool {
        if !strict {
            return true;
        }
        let tapped = self.plucking.technique == PluckingTechnique::Tap;
        let transition = self.grace_transition();
        let harmonic_grace_ok = transition.is_none() || transition == Some(GraceTransition::Bend);
        !(tapped && self.trill().is_some())
            && !(self.trill().is_some()
                && (self.slide().is_some() || self.modification_kind().is_some() || self.artificial_harmonic().is_some()))
            && !(self.has_natural_harmonic() && (!harmonic_grace_ok || tapped))
            && !(self.artificial_harmonic().is_some() && (!harmonic_grace_ok || tapped))
            && !(self.is_dead_note()
                && self.grace_note.as_ref().map_or(false, |g| {
                    g.transition.is_some()
                        && ((g.dead && g.transition == Some(GraceTransition::Slide)) || self.fretting.technique.is_legato())
                }))
    }
}
