//! Rhythm judgment: walks a beatmap against the playback clock and decides
//! which notes were hit and which were missed.

use crate::{
    beatmap::{Beatmap, Note},
    events::{Listeners, SubscriptionId},
};

/// Tolerance in milliseconds on either side of a note for a press to count as
/// a hit. Notes further than this behind the playback position are missed.
pub const TIMING_WINDOW_MS: f64 = 200.0;

/// Judgment emitted by the conductor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConductorEvent {
    /// `offset_ms` is signed: positive when the press came late.
    NoteHit {
        index: usize,
        zone: usize,
        offset_ms: f64,
    },
    NoteMissed {
        index: usize,
        zone: usize,
    },
    TrackCompleted,
}

/// Holds the beatmap and a single cursor pointing at the next unjudged note.
#[derive(Debug, Default)]
pub struct RhythmConductor {
    beatmap: Beatmap,
    cursor: usize,
    completed: bool,
    listeners: Listeners<ConductorEvent>,
}

impl RhythmConductor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the beatmap and rewinds to its first note.
    ///
    /// Notes must be ascending by time. This is checked in debug builds only;
    /// use [`Beatmap::validate`] to reject bad files up front.
    pub fn load(&mut self, beatmap: Beatmap) {
        debug_assert!(
            beatmap.is_sorted(),
            "beatmap notes must be ordered by ascending time_ms"
        );
        tracing::debug!(notes = beatmap.len(), "conductor loaded beatmap");
        self.beatmap = beatmap;
        self.cursor = 0;
        self.completed = false;
    }

    /// Rewinds to the first note without touching the beatmap.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.completed = false;
    }

    /// Resolves every note whose window has closed as a miss, then reports
    /// completion once the cursor reaches the end.
    ///
    /// `playback_ms` must not decrease between calls. Completion fires once per
    /// load/reset no matter how often this is called afterwards.
    pub fn update(&mut self, playback_ms: f64) {
        while let Some(note) = self.beatmap.get(self.cursor).copied() {
            if playback_ms - note.time_ms > TIMING_WINDOW_MS {
                tracing::debug!(index = self.cursor, zone = note.zone, playback_ms, "note missed");
                self.listeners.emit(&ConductorEvent::NoteMissed {
                    index: self.cursor,
                    zone: note.zone,
                });
                self.cursor += 1;
            } else {
                break;
            }
        }

        if self.cursor >= self.beatmap.len() && !self.completed {
            self.completed = true;
            tracing::debug!(notes = self.beatmap.len(), "track completed");
            self.listeners.emit(&ConductorEvent::TrackCompleted);
        }
    }

    /// Judges a zone press against the pending note.
    ///
    /// Returns `true` and consumes the note only for the right zone inside the
    /// window. Anything else leaves the note pending.
    pub fn try_hit(&mut self, zone: usize, playback_ms: f64) -> bool {
        let Some(note) = self.beatmap.get(self.cursor).copied() else {
            return false;
        };

        let offset_ms = playback_ms - note.time_ms;
        if offset_ms.abs() <= TIMING_WINDOW_MS && zone == note.zone {
            tracing::debug!(index = self.cursor, zone, offset_ms, "note hit");
            self.listeners.emit(&ConductorEvent::NoteHit {
                index: self.cursor,
                zone: note.zone,
                offset_ms,
            });
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// The note awaiting judgment, if any.
    pub fn current_note(&self) -> Option<Note> {
        self.beatmap.get(self.cursor).copied()
    }

    /// Fraction of notes judged so far, in `[0, 1]`. Empty beatmaps report 0.
    pub fn progress(&self) -> f64 {
        if self.beatmap.is_empty() {
            return 0.0;
        }
        self.cursor as f64 / self.beatmap.len() as f64
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.beatmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beatmap.is_empty()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn beatmap(&self) -> &Beatmap {
        &self.beatmap
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ConductorEvent) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}
