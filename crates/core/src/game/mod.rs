//! Session orchestration: the per-frame loop that feeds the playback clock to
//! the conductor, routes judgments into the scoreboard, and forwards
//! everything a presentation layer needs to draw.

use std::{
    path::Path,
    sync::mpsc::{self, Receiver},
};

use crate::{
    beatmap::{Beatmap, Note},
    conductor::{ConductorEvent, RhythmConductor},
    events::{Listeners, SubscriptionId},
    input::{InputClassifier, InputSource, KeyMap},
    score::{GameState, ScoreEvent, Scoreboard, SessionSummary},
    timeline::PlaybackClock,
    Result,
};

/// Everything a presentation layer can react to, in emission order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    Conductor(ConductorEvent),
    Score(ScoreEvent),
    ProgressChanged(f64),
}

/// Result of a recognized zone press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressOutcome {
    pub zone: usize,
    pub hit: bool,
}

#[derive(Debug)]
pub struct Game<C> {
    clock: C,
    conductor: RhythmConductor,
    input: InputClassifier,
    scoreboard: Scoreboard,
    judgments: Receiver<ConductorEvent>,
    score_events: Receiver<ScoreEvent>,
    listeners: Listeners<GameEvent>,
}

impl<C: PlaybackClock> Game<C> {
    pub fn new(clock: C, key_map: KeyMap) -> Self {
        let mut conductor = RhythmConductor::new();
        let (judgment_tx, judgments) = mpsc::channel();
        conductor.subscribe(move |event| {
            let _ = judgment_tx.send(*event);
        });

        let mut scoreboard = Scoreboard::new();
        let (score_tx, score_events) = mpsc::channel();
        scoreboard.subscribe(move |event| {
            let _ = score_tx.send(*event);
        });

        Self {
            clock,
            conductor,
            input: InputClassifier::new(key_map),
            scoreboard,
            judgments,
            score_events,
            listeners: Listeners::new(),
        }
    }

    /// Begins a fresh session on `beatmap`, discarding any previous progress.
    pub fn start(&mut self, beatmap: Beatmap) {
        let total_notes = beatmap.len();
        self.conductor.load(beatmap);
        self.conductor.reset();
        self.scoreboard.start_game(total_notes);
        self.input.start();
        self.dispatch();
    }

    /// Loads a beatmap file and starts a session on it. On failure the
    /// current state is left untouched.
    pub fn start_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let beatmap = Beatmap::load(path)?;
        self.start(beatmap);
        Ok(())
    }

    /// Handles one raw key press at the current playback position.
    ///
    /// Returns `None` if the key was ignored (unbound or input stopped).
    pub fn press(&mut self, key: &str) -> Option<PressOutcome> {
        let now = self.clock.current_playback_ms();
        let zone = self.input.classify(key)?;
        let hit = self.conductor.try_hit(zone, now);
        if !hit {
            tracing::trace!(zone, now, "press did not land");
        }
        self.dispatch();
        Some(PressOutcome { zone, hit })
    }

    /// Per-frame update. Judges presses from the attached input source at the
    /// playback time each was made, then resolves expired notes. Does nothing
    /// while the clock is stopped.
    pub fn tick(&mut self) -> Vec<PressOutcome> {
        if !self.clock.is_playing() {
            return Vec::new();
        }
        let now = self.clock.current_playback_ms();

        let outcomes = self
            .input
            .pump(now)
            .into_iter()
            .map(|(zone, at_ms)| PressOutcome {
                zone,
                hit: self.conductor.try_hit(zone, at_ms),
            })
            .collect();
        self.conductor.update(now);
        self.dispatch();

        let progress = self.conductor.progress();
        self.listeners.emit(&GameEvent::ProgressChanged(progress));
        outcomes
    }

    /// Routes queued judgments into the scoreboard and forwards both streams
    /// to subscribers, each judgment followed by the score changes it caused.
    fn dispatch(&mut self) {
        self.forward_score_events();
        while let Ok(event) = self.judgments.try_recv() {
            self.listeners.emit(&GameEvent::Conductor(event));
            match event {
                ConductorEvent::NoteHit { .. } => self.scoreboard.add_score(),
                ConductorEvent::NoteMissed { .. } => self.scoreboard.add_miss(),
                ConductorEvent::TrackCompleted => {
                    self.input.stop();
                    self.scoreboard.end_game();
                }
            }
            self.forward_score_events();
        }
    }

    fn forward_score_events(&mut self) {
        while let Ok(event) = self.score_events.try_recv() {
            self.listeners.emit(&GameEvent::Score(event));
        }
    }

    /// Connects a raw input source polled on every [`Game::tick`].
    pub fn attach_input<S>(&mut self, source: S)
    where
        S: InputSource + 'static,
    {
        self.input.attach(source);
    }

    pub fn detach_input(&mut self) -> Option<Box<dyn InputSource>> {
        self.input.detach()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Upcoming note, for highlighting its zone.
    pub fn current_note(&self) -> Option<Note> {
        self.conductor.current_note()
    }

    pub fn progress(&self) -> f64 {
        self.conductor.progress()
    }

    pub fn state(&self) -> GameState {
        self.scoreboard.state()
    }

    pub fn is_finished(&self) -> bool {
        self.scoreboard.state() == GameState::Finished
    }

    pub fn summary(&self) -> SessionSummary {
        self.scoreboard.summary()
    }

    pub fn is_accepting_input(&self) -> bool {
        self.input.is_active()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        input::{ScriptedInput, KeyPress},
        timeline::ManualClock,
    };

    fn playing_game(notes: Vec<Note>) -> (Game<ManualClock>, Rc<RefCell<Vec<GameEvent>>>) {
        let mut game = Game::new(ManualClock::new(), KeyMap::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        game.subscribe(move |event| sink.borrow_mut().push(*event));
        game.clock_mut().play();
        game.start(Beatmap::new(notes));
        (game, log)
    }

    #[test]
    fn start_announces_fresh_session() {
        let (game, log) = playing_game(vec![Note::new(1000.0, 2)]);

        assert_eq!(
            *log.borrow(),
            vec![
                GameEvent::Score(ScoreEvent::StateChanged(GameState::Active)),
                GameEvent::Score(ScoreEvent::ScoreChanged(0)),
                GameEvent::Score(ScoreEvent::MissesChanged(0)),
            ]
        );
        assert!(game.is_accepting_input());
        assert_eq!(game.current_note(), Some(Note::new(1000.0, 2)));
    }

    #[test]
    fn hit_is_followed_by_its_score_change() {
        let (mut game, log) = playing_game(vec![Note::new(1000.0, 2), Note::new(2000.0, 4)]);
        log.borrow_mut().clear();

        game.clock_mut().set(1050.0);
        assert_eq!(game.press("3"), Some(PressOutcome { zone: 2, hit: true }));

        assert_eq!(
            *log.borrow(),
            vec![
                GameEvent::Conductor(ConductorEvent::NoteHit {
                    index: 0,
                    zone: 2,
                    offset_ms: 50.0
                }),
                GameEvent::Score(ScoreEvent::ScoreChanged(1)),
            ]
        );
    }

    #[test]
    fn completion_stops_input_and_finishes_once() {
        let (mut game, log) = playing_game(vec![Note::new(1000.0, 2), Note::new(2000.0, 4)]);

        game.clock_mut().set(1050.0);
        game.press("3");
        game.clock_mut().set(2250.0);
        game.tick();
        game.clock_mut().set(2300.0);
        game.tick();

        let completions = log
            .borrow()
            .iter()
            .filter(|event| **event == GameEvent::Conductor(ConductorEvent::TrackCompleted))
            .count();
        assert_eq!(completions, 1);
        assert!(game.is_finished());
        assert!(!game.is_accepting_input());
        assert_eq!(game.press("5"), None);

        let summary = game.summary();
        assert_eq!((summary.score, summary.misses, summary.total_notes), (1, 1, 2));
        assert_eq!(summary.accuracy_percent, 50);
    }

    #[test]
    fn tick_reports_progress() {
        let (mut game, log) = playing_game(vec![Note::new(0.0, 0), Note::new(5000.0, 1)]);
        log.borrow_mut().clear();

        game.clock_mut().set(300.0);
        game.tick();

        assert_eq!(log.borrow().last(), Some(&GameEvent::ProgressChanged(0.5)));
    }

    #[test]
    fn stopped_clock_freezes_the_session() {
        let (mut game, log) = playing_game(vec![Note::new(0.0, 0)]);
        log.borrow_mut().clear();
        game.clock_mut().stop();

        assert!(game.tick().is_empty());
        assert!(log.borrow().is_empty());
        assert_eq!(game.progress(), 0.0);
    }

    #[test]
    fn attached_script_is_judged_on_tick() {
        let (mut game, _) = playing_game(vec![Note::new(500.0, 0), Note::new(900.0, 1)]);
        game.attach_input(ScriptedInput::new(vec![
            KeyPress {
                at_ms: 480.0,
                key: "1".to_string(),
            },
            KeyPress {
                at_ms: 900.0,
                key: "3".to_string(),
            },
        ]));

        game.clock_mut().set(490.0);
        assert_eq!(game.tick(), vec![PressOutcome { zone: 0, hit: true }]);
        game.clock_mut().set(910.0);
        assert_eq!(game.tick(), vec![PressOutcome { zone: 2, hit: false }]);
        assert_eq!(game.summary().score, 1);
    }

    #[test]
    fn scripted_press_is_judged_at_its_own_time_not_the_frame() {
        let (mut game, log) = playing_game(vec![Note::new(1000.0, 0)]);
        game.attach_input(ScriptedInput::new(vec![KeyPress {
            at_ms: 1190.0,
            key: "1".to_string(),
        }]));
        log.borrow_mut().clear();

        // 4 fps: the press lands between the 1000ms and 1250ms frames.
        game.clock_mut().set(1000.0);
        assert!(game.tick().is_empty());
        game.clock_mut().set(1250.0);
        assert_eq!(game.tick(), vec![PressOutcome { zone: 0, hit: true }]);

        assert_eq!(
            log.borrow()[0],
            GameEvent::Conductor(ConductorEvent::NoteHit {
                index: 0,
                zone: 0,
                offset_ms: 190.0
            })
        );
        let summary = game.summary();
        assert_eq!((summary.score, summary.misses), (1, 0));
    }

    #[test]
    fn restart_resets_counters() {
        let notes = vec![Note::new(100.0, 0)];
        let (mut game, _) = playing_game(notes.clone());
        game.clock_mut().set(1000.0);
        game.tick();
        assert!(game.is_finished());

        game.clock_mut().reset();
        game.start(Beatmap::new(notes));
        game.tick();

        assert_eq!(game.state(), GameState::Active);
        assert_eq!(game.summary().misses, 0);
        assert!(game.is_accepting_input());
    }

    #[test]
    fn failed_load_does_not_start_a_session() {
        let mut game = Game::new(ManualClock::new(), KeyMap::default());
        let dir = tempfile::tempdir().unwrap();

        assert!(game.start_from_path(dir.path().join("absent.json")).is_err());
        assert_eq!(game.state(), GameState::Idle);
        assert!(!game.is_accepting_input());
    }
}
