use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bare_metal_modulo::{MNum, ModNumC};
use enum_iterator::Sequence;
use itertools::Itertools;
use num::rational::Ratio;
use num::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::adornment::{Adornment, PluckingTechnique};
use crate::error::AdornError;

pub type Pitch = i16;
pub type Fret = i16;
pub type StringNumber = u8;

/// Exact musical time, measured in whole notes (a quarter note is 1/4).
pub type Time = Ratio<i64>;

pub const NOTES_PER_OCTAVE: Pitch = 12;
const USIZE_NOTES_PER_OCTAVE: usize = NOTES_PER_OCTAVE as usize;
const MS_PER_MINUTE: f64 = 60000.0;
const QUARTERS_PER_WHOLE: f64 = 4.0;

pub fn time(numer: i64, denom: i64) -> Time {
    Ratio::new(numer, denom)
}

pub fn pitch_class(pitch: Pitch) -> Pitch {
    ModNumC::<Pitch, USIZE_NOTES_PER_OCTAVE>::new(pitch).a()
}

pub fn octave(pitch: Pitch) -> Pitch {
    pitch.div_euclid(NOTES_PER_OCTAVE)
}

/// Wall-clock length of `duration` at `tempo` quarter notes per minute.
pub fn realtime_ms(duration: Time, tempo: u16) -> f64 {
    duration.to_f64().unwrap_or(0.0) * QUARTERS_PER_WHOLE * MS_PER_MINUTE / tempo.max(1) as f64
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Tuning {
    open_strings: BTreeMap<StringNumber, Pitch>,
}

impl Tuning {
    pub fn new(open_strings: BTreeMap<StringNumber, Pitch>) -> Self {
        Tuning { open_strings }
    }

    /// `pitches[0]` is string 1, the highest-pitched string.
    pub fn from_pitches(pitches: &[Pitch]) -> Self {
        Tuning {
            open_strings: pitches
                .iter()
                .enumerate()
                .map(|(i, p)| ((i + 1) as StringNumber, *p))
                .collect(),
        }
    }

    pub fn standard_bass() -> Self {
        Self::from_pitches(&[43, 38, 33, 28])
    }

    pub fn five_string_bass() -> Self {
        Self::from_pitches(&[43, 38, 33, 28, 23])
    }

    pub fn open(&self, string: StringNumber) -> Option<Pitch> {
        self.open_strings.get(&string).copied()
    }

    pub fn open_pitch(&self, string: StringNumber) -> Result<Pitch, AdornError> {
        self.open(string).ok_or(AdornError::UnknownString { string })
    }

    pub fn strings(&self) -> impl Iterator<Item = (StringNumber, Pitch)> + '_ {
        self.open_strings.iter().map(|(s, p)| (*s, *p))
    }

    pub fn len(&self) -> usize {
        self.open_strings.len()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dots {
    Plain,
    Dotted,
    DoubleDotted,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NotatedDuration {
    pub value: Time,
    pub dots: Dots,
    /// `(n, m)`: n notes in the time of m.
    pub tuplet: Option<(u8, u8)>,
}

impl NotatedDuration {
    pub fn plain(value: Time) -> Self {
        NotatedDuration { value, dots: Dots::Plain, tuplet: None }
    }

    pub fn sounding(&self) -> Time {
        let dotted = match self.dots {
            Dots::Plain => self.value,
            Dots::Dotted => self.value * time(3, 2),
            Dots::DoubleDotted => self.value * time(7, 4),
        };
        match self.tuplet {
            Some((n, m)) if n > 0 => dotted * time(m as i64, n as i64),
            _ => dotted,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicLevel {
    Ppp,
    Pp,
    P,
    Mp,
    Mf,
    F,
    Ff,
    Fff,
}

impl DynamicLevel {
    pub fn weight_key(&self) -> &'static str {
        match self {
            DynamicLevel::Ppp => "ppp",
            DynamicLevel::Pp => "pp",
            DynamicLevel::P => "p",
            DynamicLevel::Mp => "mp",
            DynamicLevel::Mf => "mf",
            DynamicLevel::F => "f",
            DynamicLevel::Ff => "ff",
            DynamicLevel::Fff => "fff",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Sequence, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hairpin {
    Crescendo,
    Diminuendo,
}

impl Hairpin {
    pub fn weight_key(&self) -> &'static str {
        match self {
            Hairpin::Crescendo => "crescendo",
            Hairpin::Diminuendo => "diminuendo",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Dynamic {
    pub level: DynamicLevel,
    pub hairpin: Option<Hairpin>,
}

impl Dynamic {
    pub fn new(level: DynamicLevel) -> Self {
        Dynamic { level, hairpin: None }
    }
}

impl Default for Dynamic {
    fn default() -> Self {
        Dynamic::new(DynamicLevel::Mf)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Note {
    pitch: Pitch,
    fret: Fret,
    string: StringNumber,
    tuning: Tuning,
    start: Time,
    duration: Time,
    notated: NotatedDuration,
    dynamic: Dynamic,
}

impl Note {
    pub fn new(pitch: Pitch, fret: Fret, string: StringNumber, tuning: Tuning, start: Time, duration: Time) -> Self {
        Note {
            pitch,
            fret,
            string,
            tuning,
            start,
            duration,
            notated: NotatedDuration::plain(duration),
            dynamic: Dynamic::default(),
        }
    }

    /// A note whose pitch follows from its string and fret.
    pub fn fretted(string: StringNumber, fret: Fret, tuning: Tuning, start: Time, duration: Time) -> Result<Self, AdornError> {
        let pitch = tuning.open_pitch(string)? + fret;
        Ok(Note::new(pitch, fret, string, tuning, start, duration))
    }

    pub fn pitch(&self) -> Pitch {
        self.pitch
    }

    pub fn fret(&self) -> Fret {
        self.fret
    }

    pub fn string(&self) -> StringNumber {
        self.string
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn start(&self) -> Time {
        self.start
    }

    pub fn duration(&self) -> Time {
        self.duration
    }

    pub fn end(&self) -> Time {
        self.start + self.duration
    }

    pub fn notated(&self) -> &NotatedDuration {
        &self.notated
    }

    pub fn dynamic(&self) -> Dynamic {
        self.dynamic
    }

    pub fn is_open_string(&self) -> bool {
        self.fret == 0
    }

    pub fn open_pitch(&self) -> Result<Pitch, AdornError> {
        self.tuning.open_pitch(self.string)
    }

    pub fn realtime_ms(&self, tempo: u16) -> f64 {
        realtime_ms(self.duration, tempo)
    }

    /// Same pitch played somewhere else on the neck.
    pub fn relocated(&self, string: StringNumber, fret: Fret) -> Note {
        Note { string, fret, ..self.clone() }
    }

    pub fn repitched(&self, pitch: Pitch, fret: Fret) -> Note {
        Note { pitch, fret, ..self.clone() }
    }

    pub fn retimed(&self, start: Time, duration: Time) -> Note {
        Note { start, duration, ..self.clone() }
    }

    pub fn with_dynamic(&self, dynamic: Dynamic) -> Note {
        Note { dynamic, ..self.clone() }
    }

    pub fn with_notated(&self, notated: NotatedDuration) -> Note {
        Note { notated, ..self.clone() }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AdornedNote {
    note: Note,
    adornment: Adornment,
}

impl AdornedNote {
    pub fn new(note: Note, adornment: Adornment) -> Self {
        AdornedNote { note, adornment }
    }

    pub fn unadorned(note: Note) -> Self {
        let adornment = Adornment::unadorned(note.fret());
        AdornedNote { note, adornment }
    }

    pub fn note(&self) -> &Note {
        &self.note
    }

    pub fn adornment(&self) -> &Adornment {
        &self.adornment
    }

    pub fn with_note(&self, note: Note) -> AdornedNote {
        AdornedNote { note, adornment: self.adornment.clone() }
    }

    pub fn with_adornment(&self, adornment: Adornment) -> AdornedNote {
        AdornedNote { note: self.note.clone(), adornment }
    }

    pub fn map_adornment<F: FnOnce(&Adornment) -> Adornment>(&self, update: F) -> AdornedNote {
        self.with_adornment(update(&self.adornment))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Rest {
    pub start: Time,
    pub duration: Time,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Note(AdornedNote),
    Rest(Rest),
}

impl Event {
    pub fn start(&self) -> Time {
        match self {
            Event::Note(n) => n.note().start(),
            Event::Rest(r) => r.start,
        }
    }

    pub fn duration(&self) -> Time {
        match self {
            Event::Note(n) => n.note().duration(),
            Event::Rest(r) => r.duration,
        }
    }

    pub fn end(&self) -> Time {
        self.start() + self.duration()
    }

    pub fn as_note(&self) -> Option<&AdornedNote> {
        match self {
            Event::Note(n) => Some(n),
            Event::Rest(_) => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    numerator: u8,
    denominator: u8,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8) -> Result<Self, AdornError> {
        if numerator == 0 || denominator == 0 || !denominator.is_power_of_two() {
            return Err(AdornError::InvalidTimeSignature(format!("{numerator}/{denominator}")));
        }
        Ok(TimeSignature { numerator, denominator })
    }

    pub fn common_time() -> Self {
        TimeSignature { numerator: 4, denominator: 4 }
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> u8 {
        self.denominator
    }

    pub fn measure_length(&self) -> Time {
        time(self.numerator as i64, self.denominator as i64)
    }

    pub fn beat_unit(&self) -> Time {
        time(1, self.denominator as i64)
    }
}

impl FromStr for TimeSignature {
    type Err = AdornError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AdornError::InvalidTimeSignature(s.to_string());
        let (n, d) = s.trim().split_once('/').ok_or_else(invalid)?;
        let n = n.trim().parse::<u8>().map_err(|_| invalid())?;
        let d = d.trim().parse::<u8>().map_err(|_| invalid())?;
        TimeSignature::new(n, d)
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = AdornError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(value: TimeSignature) -> Self {
        value.to_string()
    }
}

impl Display for TimeSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MeasureMeta {
    /// Circle-of-fifths position: positive for sharps, negative for flats.
    pub key_signature: i8,
    pub time_signature: TimeSignature,
    pub tempo: u16,
    pub triplet_feel: bool,
    pub monophonic: bool,
}

impl Default for MeasureMeta {
    fn default() -> Self {
        MeasureMeta {
            key_signature: 0,
            time_signature: TimeSignature::common_time(),
            tempo: 120,
            triplet_feel: false,
            monophonic: true,
        }
    }
}

impl MeasureMeta {
    pub fn accidentals(&self) -> u8 {
        self.key_signature.unsigned_abs()
    }
}

/// Where a measure sits in time, and how it is metered.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MeasureFrame {
    pub start: Time,
    pub meta: MeasureMeta,
}

impl MeasureFrame {
    pub fn new(start: Time, meta: MeasureMeta) -> Self {
        MeasureFrame { start, meta }
    }

    pub fn length(&self) -> Time {
        self.meta.time_signature.measure_length()
    }

    pub fn beat_unit(&self) -> Time {
        self.meta.time_signature.beat_unit()
    }

    pub fn end(&self) -> Time {
        self.start + self.length()
    }

    /// Position of `t` within its beat, relative to the measure start.
    pub fn beat_phase(&self, t: Time) -> Time {
        (t - self.start) % self.beat_unit()
    }

    pub fn is_on_beat(&self, t: Time) -> bool {
        self.beat_phase(t).is_zero()
    }

    /// `duration` as a fraction of this measure's length.
    pub fn normalized(&self, duration: Time) -> Time {
        duration / self.length()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    start: Time,
    meta: MeasureMeta,
    notes: Vec<Event>,
}

impl Measure {
    pub fn new(start: Time, meta: MeasureMeta, notes: Vec<Event>) -> Self {
        Measure { start, meta, notes }
    }

    pub fn start(&self) -> Time {
        self.start
    }

    pub fn meta(&self) -> &MeasureMeta {
        &self.meta
    }

    pub fn frame(&self) -> MeasureFrame {
        MeasureFrame::new(self.start, self.meta)
    }

    pub fn notes(&self) -> &[Event] {
        &self.notes
    }

    pub fn with_notes(&self, notes: Vec<Event>) -> Measure {
        Measure { start: self.start, meta: self.meta, notes }
    }

    pub fn sounding(&self) -> impl Iterator<Item = &AdornedNote> {
        self.notes.iter().filter_map(|e| e.as_note())
    }

    pub fn sounding_indices(&self) -> Vec<usize> {
        self.notes
            .iter()
            .enumerate()
            .filter(|(_, e)| e.as_note().is_some())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_all_rests(&self) -> bool {
        self.sounding().next().is_none()
    }

    pub fn last_sounding(&self) -> Option<&AdornedNote> {
        self.sounding().last()
    }

    /// Replaces the last sounding note; a measure of rests is returned unchanged.
    pub fn with_last_sounding(&self, note: AdornedNote) -> Measure {
        let mut notes = self.notes.clone();
        if let Some(i) = notes.iter().rposition(|e| e.as_note().is_some()) {
            notes[i] = Event::Note(note);
        }
        self.with_notes(notes)
    }

    /// Most frequent plucking technique other than tapping; ties go to the
    /// technique heard first.
    pub fn most_common_plucking(&self) -> Option<PluckingTechnique> {
        let techniques = self
            .sounding()
            .map(|n| n.adornment().plucking.technique)
            .filter(|t| *t != PluckingTechnique::Tap)
            .collect::<Vec<_>>();
        let counts = techniques.iter().counts();
        let mut best: Option<(PluckingTechnique, usize)> = None;
        for technique in techniques.iter().unique() {
            let count = counts[technique];
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((*technique, count));
            }
        }
        best.map(|(t, _)| t)
    }

    /// Fails fast on input the scorer and revision sweep cannot interpret.
    pub fn validate(&self, index: usize) -> Result<(), AdornError> {
        let malformed = |reason: String| AdornError::MalformedMeasure { measure: index, reason };
        for event in self.notes.iter() {
            if event.duration() <= Time::zero() {
                return Err(malformed(format!("non-positive duration at {}", event.start())));
            }
            if let Some(n) = event.as_note() {
                let note = n.note();
                if note.fret() < 0 {
                    return Err(malformed(format!("negative fret at {}", note.start())));
                }
                if note.tuning().open(note.string()).is_none() {
                    return Err(malformed(format!("string {} missing from tuning", note.string())));
                }
            }
        }
        for (a, b) in self.notes.iter().tuple_windows() {
            if b.start() < a.start() {
                return Err(malformed(format!("{} starts before {}", b.start(), a.start())));
            }
            if b.start() < a.end() {
                return Err(malformed(format!("event at {} overlaps one ending at {}", b.start(), a.end())));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: Option<String>,
    pub measures: Vec<Measure>,
}

impl Song {
    pub fn new(measures: Vec<Measure>) -> Self {
        Song { title: None, measures }
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn with_measures(&self, measures: Vec<Measure>) -> Song {
        Song { title: self.title.clone(), measures }
    }

    pub fn num_notes(&self) -> usize {
        self.measures.iter().map(|m| m.sounding().count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adornment::Adornment;

    fn bass_note(string: StringNumber, fret: Fret, start: Time, duration: Time) -> AdornedNote {
        AdornedNote::unadorned(Note::fretted(string, fret, Tuning::standard_bass(), start, duration).unwrap())
    }

    #[test]
    fn test_fretted_pitch() {
        let note = Note::fretted(4, 3, Tuning::standard_bass(), time(0, 1), time(1, 4)).unwrap();
        assert_eq!(note.pitch(), 31);
        assert_eq!(pitch_class(note.pitch()), 7);
        assert_eq!(octave(note.pitch()), 2);
        assert!(Note::fretted(5, 3, Tuning::standard_bass(), time(0, 1), time(1, 4)).is_err());
    }

    #[test]
    fn test_time_signature_parse() {
        let ts: TimeSignature = "6/8".parse().unwrap();
        assert_eq!(ts.measure_length(), time(3, 4));
        assert_eq!(ts.beat_unit(), time(1, 8));
        assert_eq!(ts.to_string(), "6/8");
        assert!("6-8".parse::<TimeSignature>().is_err());
        assert!("4/3".parse::<TimeSignature>().is_err());
        assert!("0/4".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn test_beat_phase() {
        let frame = MeasureFrame::new(time(1, 1), MeasureMeta::default());
        assert!(frame.is_on_beat(time(5, 4)));
        assert_eq!(frame.beat_phase(time(11, 8)), time(1, 8));
        assert_eq!(frame.normalized(time(1, 2)), time(1, 2));
    }

    #[test]
    fn test_realtime() {
        assert_eq!(realtime_ms(time(1, 4), 120), 500.0);
        assert_eq!(realtime_ms(time(1, 1), 60), 4000.0);
    }

    #[test]
    fn test_notated_sounding() {
        let dotted = NotatedDuration { value: time(1, 4), dots: Dots::Dotted, tuplet: None };
        assert_eq!(dotted.sounding(), time(3, 8));
        let triplet = NotatedDuration { value: time(1, 8), dots: Dots::Plain, tuplet: Some((3, 2)) };
        assert_eq!(triplet.sounding(), time(1, 12));
    }

    #[test]
    fn test_validate() {
        let meta = MeasureMeta::default();
        let ok = Measure::new(time(0, 1), meta, vec![
            Event::Note(bass_note(3, 3, time(0, 1), time(1, 4))),
            Event::Rest(Rest { start: time(1, 4), duration: time(1, 4) }),
            Event::Note(bass_note(3, 5, time(1, 2), time(1, 2))),
        ]);
        assert!(ok.validate(0).is_ok());
        assert_eq!(ok.sounding_indices(), vec![0, 2]);

        let overlapping = Measure::new(time(0, 1), meta, vec![
            Event::Note(bass_note(3, 3, time(0, 1), time(1, 2))),
            Event::Note(bass_note(3, 5, time(1, 4), time(1, 4))),
        ]);
        assert!(matches!(overlapping.validate(2), Err(AdornError::MalformedMeasure { measure: 2, .. })));

        let unordered = Measure::new(time(0, 1), meta, vec![
            Event::Note(bass_note(3, 3, time(1, 2), time(1, 4))),
            Event::Note(bass_note(3, 5, time(0, 1), time(1, 4))),
        ]);
        assert!(unordered.validate(0).is_err());
    }

    #[test]
    fn test_most_common_plucking() {
        let meta = MeasureMeta::default();
        let with = |n: AdornedNote, t: PluckingTechnique| n.map_adornment(|a| a.with_plucking_technique(t));
        let measure = Measure::new(time(0, 1), meta, vec![
            Event::Note(with(bass_note(3, 3, time(0, 1), time(1, 4)), PluckingTechnique::Tap)),
            Event::Note(with(bass_note(3, 5, time(1, 4), time(1, 4)), PluckingTechnique::Slap)),
            Event::Note(with(bass_note(3, 7, time(1, 2), time(1, 4)), PluckingTechnique::Tap)),
            Event::Note(with(bass_note(2, 5, time(3, 4), time(1, 4)), PluckingTechnique::Pop)),
        ]);
        assert_eq!(measure.most_common_plucking(), Some(PluckingTechnique::Slap));
        let empty = measure.with_notes(vec![]);
        assert_eq!(empty.most_common_plucking(), None);
        assert!(empty.is_all_rests());
    }

    #[test]
    fn test_json_round_trip_shape() {
        let measure = Measure::new(time(0, 1), MeasureMeta::default(), vec![
            Event::Note(AdornedNote::new(
                Note::fretted(1, 0, Tuning::standard_bass(), time(0, 1), time(1, 1)).unwrap(),
                Adornment::unadorned(0),
            )),
        ]);
        let json = serde_json::to_string(&measure).unwrap();
        assert!(json.contains("\"4/4\""));
        let back: Measure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, measure);
    }
}
