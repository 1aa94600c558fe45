use std::{fmt, sync::Arc, time::Duration};

use tokio::time::Instant;

/// Accuracy (percent) a round must reach to count as passed.
pub const PASS_ACCURACY: f64 = 50.0;

/// One puzzle unit: an image payload and the integer it encodes.
#[derive(Clone, PartialEq, Eq)]
pub struct PuzzleItem {
    image: Arc<[u8]>,
    solution: i32,
}

impl PuzzleItem {
    /// Build an item from the raw image bytes and its expected answer.
    pub fn new(image: impl Into<Arc<[u8]>>, solution: i32) -> Self {
        Self {
            image: image.into(),
            solution,
        }
    }

    /// Raw image payload as delivered by the item source.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Expected answer for this puzzle.
    pub fn solution(&self) -> i32 {
        self.solution
    }

    /// Media type guessed from the image signature, `application/octet-stream`
    /// when the format is not recognised.
    pub fn content_type(&self) -> &'static str {
        match &*self.image {
            [0x89, b'P', b'N', b'G', ..] => "image/png",
            [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
            [b'G', b'I', b'F', b'8', ..] => "image/gif",
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Debug for PuzzleItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PuzzleItem")
            .field("image_len", &self.image.len())
            .field("solution", &self.solution)
            .finish()
    }
}

/// Cumulative statistics for a registered player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Unique login name.
    pub username: String,
    /// Total points across every round played.
    pub total_score: u32,
    /// Number of correct answers across every round played.
    pub correct_answers: u32,
    /// Number of answers submitted across every round played.
    pub total_attempts: u32,
}

impl Player {
    /// Fresh player without any recorded answer.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            total_score: 0,
            correct_answers: 0,
            total_attempts: 0,
        }
    }

    /// Count one answer; only correct answers add to score and correct count.
    pub fn record_answer(&mut self, correct: bool) {
        self.total_attempts += 1;
        if correct {
            self.correct_answers += 1;
            self.total_score += 1;
        }
    }

    /// Percentage of correct answers, `0.0` before the first attempt.
    pub fn accuracy(&self) -> f64 {
        accuracy(self.correct_answers, self.total_attempts)
    }
}

/// Immutable timing data of a round, cheap to copy into timer tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    started_at: Instant,
    duration: Duration,
}

impl SessionClock {
    /// Start a clock now with the given budget.
    pub fn start(duration: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            duration,
        }
    }

    /// Time spent since the round started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time left in the round, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed())
    }

    /// Whether the time budget is used up.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Per-round state of a single player. Pure state, no I/O.
#[derive(Debug, Clone)]
pub struct Session {
    player: Player,
    current_item: Option<PuzzleItem>,
    clock: SessionClock,
    active: bool,
    score: u32,
    attempts: u32,
}

impl Session {
    /// Open a round for `player` with the given time budget, starting now.
    pub fn new(player: Player, duration: Duration) -> Self {
        Self {
            player,
            current_item: None,
            clock: SessionClock::start(duration),
            active: true,
            score: 0,
            attempts: 0,
        }
    }

    /// Replace the puzzle currently shown to the player.
    pub fn set_current_item(&mut self, item: PuzzleItem) {
        self.current_item = Some(item);
    }

    /// Grade `candidate` against the current item.
    ///
    /// Returns `false` without touching any counter when no item is loaded or
    /// the round is no longer active. Otherwise both the session and the
    /// player counters advance and the verdict is returned.
    pub fn check_answer(&mut self, candidate: i32) -> bool {
        if !self.is_active() {
            return false;
        }
        let Some(item) = &self.current_item else {
            return false;
        };

        let correct = item.solution() == candidate;
        self.attempts += 1;
        if correct {
            self.score += 1;
        }
        self.player.record_answer(correct);
        correct
    }

    /// Time spent since the round started.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Time left, never negative.
    pub fn remaining(&self) -> Duration {
        self.clock.remaining()
    }

    /// Not yet terminated and not yet expired.
    pub fn is_active(&self) -> bool {
        self.active && !self.clock.is_expired()
    }

    /// Terminate the round. Setting the flag twice is harmless.
    pub fn end(&mut self) {
        self.active = false;
    }

    /// Percentage of correct answers in this round, `0.0` before any attempt.
    pub fn accuracy(&self) -> f64 {
        accuracy(self.score, self.attempts)
    }

    /// Snapshot of the round results.
    pub fn summary(&self) -> SessionSummary {
        let accuracy = self.accuracy();
        SessionSummary {
            score: self.score,
            attempts: self.attempts,
            accuracy,
            passed: accuracy >= PASS_ACCURACY,
        }
    }

    /// Player of the round with their cumulative counters.
    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Puzzle currently shown, if one was loaded.
    pub fn current_item(&self) -> Option<&PuzzleItem> {
        self.current_item.as_ref()
    }

    /// Clock of the round, shared with the countdown.
    pub fn clock(&self) -> SessionClock {
        self.clock
    }

    /// Correct answers in this round.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Answers submitted in this round.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Results of a round, as reported when it ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    /// Correct answers in the round.
    pub score: u32,
    /// Answers submitted in the round.
    pub attempts: u32,
    /// `score * 100 / attempts`, `0.0` when nothing was submitted.
    pub accuracy: f64,
    /// Whether accuracy reached [`PASS_ACCURACY`].
    pub passed: bool,
}

fn accuracy(correct: u32, attempts: u32) -> f64 {
    if attempts == 0 {
        return 0.0;
    }
    f64::from(correct) * 100.0 / f64::from(attempts)
}
