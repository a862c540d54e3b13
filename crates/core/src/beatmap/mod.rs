use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{FilletError, Result};

/// Number of finger zones a note can target.
pub const ZONE_COUNT: usize = 5;

/// One expected stab at an absolute playback timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub time_ms: f64,
    pub zone: usize,
}

impl Note {
    pub fn new(time_ms: f64, zone: usize) -> Self {
        Self { time_ms, zone }
    }
}

/// Ordered list of notes, ascending by `time_ms`.
///
/// Serialized as a bare JSON array of `{"time_ms": .., "zone": ..}` objects,
/// the format written by `fillet generate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Beatmap {
    notes: Vec<Note>,
}

impl Beatmap {
    /// Wraps notes as-is. Ordering is the caller's responsibility; see
    /// [`Beatmap::validate`].
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    /// Parses a JSON beatmap and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let beatmap: Beatmap = serde_json::from_str(json)?;
        beatmap.validate()?;
        Ok(beatmap)
    }

    /// Reads and validates a beatmap file. A failure here means no session
    /// should be started.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let beatmap = Self::from_json_str(&json)?;
        tracing::debug!(?path, notes = beatmap.len(), "loaded beatmap");
        Ok(beatmap)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Checks every note against the data model: finite non-negative time,
    /// zone in range, times non-decreasing.
    pub fn validate(&self) -> Result<()> {
        let mut previous = 0.0;
        for (index, note) in self.notes.iter().enumerate() {
            if !note.time_ms.is_finite() || note.time_ms < 0.0 {
                return Err(FilletError::invalid_note(
                    index,
                    format!("time_ms must be a non-negative number, got {}", note.time_ms),
                ));
            }
            if note.zone >= ZONE_COUNT {
                return Err(FilletError::invalid_note(
                    index,
                    format!("zone {} is outside 0..{ZONE_COUNT}", note.zone),
                ));
            }
            if note.time_ms < previous {
                return Err(FilletError::invalid_note(
                    index,
                    format!("time_ms {} is earlier than the previous note", note.time_ms),
                ));
            }
            previous = note.time_ms;
        }
        Ok(())
    }

    pub fn is_sorted(&self) -> bool {
        self.notes
            .windows(2)
            .all(|pair| pair[0].time_ms <= pair[1].time_ms)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Timestamp of the last note, or 0 for an empty beatmap.
    pub fn duration_ms(&self) -> f64 {
        self.notes.last().map(|note| note.time_ms).unwrap_or(0.0)
    }

    /// Number of notes per zone.
    pub fn zone_histogram(&self) -> [usize; ZONE_COUNT] {
        let mut counts = [0; ZONE_COUNT];
        for note in &self.notes {
            if let Some(slot) = counts.get_mut(note.zone) {
                *slot += 1;
            }
        }
        counts
    }
}

impl From<Vec<Note>> for Beatmap {
    fn from(notes: Vec<Note>) -> Self {
        Self::new(notes)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_generator_output() {
        let beatmap =
            Beatmap::from_json_str(r#"[{"time_ms": 1000, "zone": 2}, {"time_ms": 2000, "zone": 4}]"#)
                .unwrap();

        assert_eq!(beatmap.len(), 2);
        assert_eq!(beatmap.notes()[0], Note::new(1000.0, 2));
        assert_eq!(beatmap.duration_ms(), 2000.0);
    }

    #[test]
    fn rejects_out_of_range_zone() {
        let err = Beatmap::from_json_str(r#"[{"time_ms": 10, "zone": 5}]"#).unwrap_err();
        assert!(matches!(err, FilletError::InvalidBeatmap { index: 0, .. }));
    }

    #[test]
    fn rejects_unsorted_and_negative_times() {
        let unsorted = Beatmap::new(vec![Note::new(500.0, 0), Note::new(100.0, 1)]);
        assert!(!unsorted.is_sorted());
        let err = unsorted.validate().unwrap_err();
        assert!(format!("{err}").contains("#1"));

        let negative = Beatmap::new(vec![Note::new(-1.0, 0)]);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        let err = Beatmap::from_json_str(r#"{"notes": []}"#).unwrap_err();
        assert!(matches!(err, FilletError::Json(_)));
    }

    #[test]
    fn loads_from_file_and_reports_missing_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"time_ms": 0, "zone": 0}}]"#).unwrap();

        let beatmap = Beatmap::load(file.path()).unwrap();
        assert_eq!(beatmap.len(), 1);

        let dir = tempfile::tempdir().unwrap();
        let err = Beatmap::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, FilletError::Io(_)));
    }

    #[test]
    fn save_then_load_preserves_notes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track_beatmap.json");
        let beatmap = Beatmap::new(vec![Note::new(250.0, 1), Note::new(600.0, 3)]);

        beatmap.save(&path).unwrap();
        assert_eq!(Beatmap::load(&path).unwrap(), beatmap);
    }

    #[test]
    fn histogram_counts_each_zone() {
        let beatmap = Beatmap::new(vec![
            Note::new(0.0, 0),
            Note::new(1.0, 4),
            Note::new(2.0, 4),
        ]);
        assert_eq!(beatmap.zone_histogram(), [1, 0, 0, 0, 2]);
    }
}
