use serde::Serialize;

use crate::events::{Listeners, SubscriptionId};

/// Lifecycle of a play session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    #[default]
    Idle,
    Active,
    Finished,
}

/// Change notifications from the [`Scoreboard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEvent {
    ScoreChanged(usize),
    MissesChanged(usize),
    StateChanged(GameState),
}

/// Final tally shown on the result screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub score: usize,
    pub misses: usize,
    pub total_notes: usize,
    /// Hits over total notes as a rounded percentage, 0 for an empty track.
    pub accuracy_percent: u32,
}

/// Hit/miss counters for the current session.
///
/// Counters are not guarded by state: bumping them outside an active session
/// is allowed and simply counts.
#[derive(Debug, Default)]
pub struct Scoreboard {
    state: GameState,
    score: usize,
    misses: usize,
    total_notes: usize,
    listeners: Listeners<ScoreEvent>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_game(&mut self, total_notes: usize) {
        self.score = 0;
        self.misses = 0;
        self.total_notes = total_notes;
        self.state = GameState::Active;
        tracing::info!(total_notes, "session started");
        self.listeners.emit(&ScoreEvent::StateChanged(self.state));
        self.listeners.emit(&ScoreEvent::ScoreChanged(self.score));
        self.listeners.emit(&ScoreEvent::MissesChanged(self.misses));
    }

    pub fn add_score(&mut self) {
        self.score += 1;
        self.listeners.emit(&ScoreEvent::ScoreChanged(self.score));
    }

    pub fn add_miss(&mut self) {
        self.misses += 1;
        self.listeners.emit(&ScoreEvent::MissesChanged(self.misses));
    }

    pub fn end_game(&mut self) {
        self.state = GameState::Finished;
        tracing::info!(score = self.score, misses = self.misses, "session finished");
        self.listeners.emit(&ScoreEvent::StateChanged(self.state));
    }

    pub fn reset(&mut self) {
        self.score = 0;
        self.misses = 0;
        self.state = GameState::Idle;
        self.listeners.emit(&ScoreEvent::StateChanged(self.state));
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn total_notes(&self) -> usize {
        self.total_notes
    }

    pub fn summary(&self) -> SessionSummary {
        let accuracy_percent = if self.total_notes > 0 {
            (self.score as f64 / self.total_notes as f64 * 100.0).round() as u32
        } else {
            0
        };
        SessionSummary {
            score: self.score,
            misses: self.misses,
            total_notes: self.total_notes,
            accuracy_percent,
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&ScoreEvent) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn recording_board() -> (Scoreboard, Rc<RefCell<Vec<ScoreEvent>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut board = Scoreboard::new();
        let sink = Rc::clone(&log);
        board.subscribe(move |event| sink.borrow_mut().push(*event));
        (board, log)
    }

    #[test]
    fn start_game_announces_initial_values_in_order() {
        let (mut board, log) = recording_board();
        board.add_score();
        log.borrow_mut().clear();

        board.start_game(12);

        assert_eq!(
            *log.borrow(),
            vec![
                ScoreEvent::StateChanged(GameState::Active),
                ScoreEvent::ScoreChanged(0),
                ScoreEvent::MissesChanged(0),
            ]
        );
        assert_eq!(board.total_notes(), 12);
    }

    #[test]
    fn counters_report_new_values() {
        let (mut board, log) = recording_board();
        board.start_game(3);
        log.borrow_mut().clear();

        board.add_score();
        board.add_score();
        board.add_miss();

        assert_eq!(
            *log.borrow(),
            vec![
                ScoreEvent::ScoreChanged(1),
                ScoreEvent::ScoreChanged(2),
                ScoreEvent::MissesChanged(1),
            ]
        );
    }

    #[test]
    fn walks_through_the_lifecycle() {
        let mut board = Scoreboard::new();
        assert_eq!(board.state(), GameState::Idle);

        board.start_game(1);
        assert_eq!(board.state(), GameState::Active);
        board.end_game();
        assert_eq!(board.state(), GameState::Finished);

        board.add_miss();
        board.reset();
        assert_eq!(board.state(), GameState::Idle);
        assert_eq!((board.score(), board.misses()), (0, 0));
    }

    #[test]
    fn summary_rounds_accuracy() {
        let mut board = Scoreboard::new();
        board.start_game(3);
        board.add_score();
        board.add_score();
        board.add_miss();

        let summary = board.summary();
        assert_eq!(summary.accuracy_percent, 67);
        assert_eq!(summary.total_notes, 3);
    }

    #[test]
    fn summary_serializes_for_reports() {
        let mut board = Scoreboard::new();
        board.start_game(4);
        board.add_score();
        board.add_miss();

        let value = serde_json::to_value(board.summary()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "score": 1,
                "misses": 1,
                "total_notes": 4,
                "accuracy_percent": 25,
            })
        );
    }

    #[test]
    fn empty_track_has_zero_accuracy() {
        let mut board = Scoreboard::new();
        board.start_game(0);
        assert_eq!(board.summary().accuracy_percent, 0);
    }
}
