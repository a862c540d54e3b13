use std::time::Instant;

/// Source of the audio playback position the conductor judges against.
pub trait PlaybackClock {
    /// Milliseconds since the track started, or 0 when nothing is playing.
    fn current_playback_ms(&self) -> f64;

    fn is_playing(&self) -> bool;
}

/// Clock that only moves when told to. Used for deterministic replays and tests.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    time_ms: f64,
    playing: bool,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn reset(&mut self) {
        self.time_ms = 0.0;
    }

    /// Moves the clock forward. Negative deltas are clamped so time never rewinds.
    pub fn advance(&mut self, delta_ms: f64) {
        self.time_ms = (self.time_ms + delta_ms).max(self.time_ms);
    }

    pub fn set(&mut self, time_ms: f64) {
        self.time_ms = time_ms.max(0.0);
    }
}

impl PlaybackClock for ManualClock {
    fn current_playback_ms(&self) -> f64 {
        if self.playing {
            self.time_ms
        } else {
            0.0
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Wall-clock playback position measured from the moment [`WallClock::play`]
/// was called.
#[derive(Debug, Default, Clone)]
pub struct WallClock {
    started: Option<Instant>,
}

impl WallClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        self.started = None;
    }
}

impl PlaybackClock for WallClock {
    fn current_playback_ms(&self) -> f64 {
        self.started
            .map(|start| start.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    fn is_playing(&self) -> bool {
        self.started.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_reads_zero_until_playing() {
        let mut clock = ManualClock::new();
        clock.set(1500.0);
        assert_eq!(clock.current_playback_ms(), 0.0);

        clock.play();
        assert_eq!(clock.current_playback_ms(), 1500.0);
    }

    #[test]
    fn manual_clock_never_rewinds() {
        let mut clock = ManualClock::new();
        clock.play();
        clock.advance(100.0);
        clock.advance(-40.0);
        assert_eq!(clock.current_playback_ms(), 100.0);
    }

    #[test]
    fn wall_clock_counts_up_while_playing() {
        let mut clock = WallClock::new();
        assert!(!clock.is_playing());

        clock.play();
        let first = clock.current_playback_ms();
        let second = clock.current_playback_ms();
        assert!(first >= 0.0);
        assert!(second >= first);

        clock.stop();
        assert_eq!(clock.current_playback_ms(), 0.0);
    }
}
