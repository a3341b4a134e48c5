//! Typing race: every player types the same text, fastest finisher wins.
//!
//! The race moves `NotStarted -> Started -> Finished`. It finishes when every
//! player has typed the whole text or when the duration bound runs out,
//! whichever happens first. Ranks are handed out in finish order and never
//! change afterwards.

use crate::event::GameEvent;
use crate::{PlayerId, RuleError};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_DURATION_SECS: u64 = 180;

const EASY_TEXTS: [&str; 5] = [
    "The quick brown fox jumps over the lazy dog.",
    "A journey of a thousand miles begins with a single step.",
    "To be or not to be, that is the question.",
    "All that glitters is not gold.",
    "Actions speak louder than words.",
];

const MEDIUM_TEXTS: [&str; 4] = [
    "Programming is the art of telling another human what one wants the computer to do. The computer follows instructions precisely, but humans must communicate clearly.",
    "In software development, debugging is twice as hard as writing the code in the first place. Therefore, if you write code as cleverly as possible, you are not smart enough to debug it.",
    "The best way to predict the future is to implement it. Technology moves forward when people build solutions to real problems.",
    "Good code is its own best documentation. As you are about to add a comment, ask yourself if there is some way to turn the code itself into the explanation.",
];

const HARD_TEXTS: [&str; 3] = [
    "Machine learning algorithms can analyze vast amounts of data to identify patterns and make predictions. These systems learn from experience without being explicitly programmed for each specific task, adapting their behavior based on the data they process.",
    "Quantum computing represents a fundamental shift in how we process information. Unlike classical computers that use bits representing either zero or one, quantum computers use quantum bits or qubits that can exist in multiple states simultaneously through superposition.",
    "Cybersecurity professionals must constantly adapt to evolving threats. Attack vectors become more sophisticated as technology advances, requiring comprehensive strategies that include network security, application security, information security, and operational security measures.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn corpus(self) -> &'static [&'static str] {
        match self {
            Difficulty::Easy => &EASY_TEXTS,
            Difficulty::Medium => &MEDIUM_TEXTS,
            Difficulty::Hard => &HARD_TEXTS,
        }
    }

    pub fn pick_text<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        // Every corpus is non-empty.
        self.corpus().choose(rng).copied().unwrap_or(EASY_TEXTS[0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    NotStarted,
    Started,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProgress {
    pub player_id: PlayerId,
    pub characters_typed: u32,
    pub total_characters: u32,
    pub error_count: u32,
    pub progress_percentage: f64,
    pub wpm: u32,
    pub accuracy: u32,
    /// Milliseconds from race start to the last character.
    pub finish_time_ms: Option<u64>,
    pub rank: Option<u32>,
    pub has_finished: bool,
}

impl PlayerProgress {
    fn new(player_id: PlayerId, total_characters: u32) -> Self {
        Self {
            player_id,
            characters_typed: 0,
            total_characters,
            error_count: 0,
            progress_percentage: 0.0,
            wpm: 0,
            accuracy: 100,
            finish_time_ms: None,
            rank: None,
            has_finished: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingRaceState {
    pub text: String,
    pub progress: Vec<PlayerProgress>,
    pub phase: RacePhase,
    /// Set once a countdown has been scheduled, so a second start request
    /// is refused before the race actually flips to `Started`.
    pub countdown_armed: bool,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub finish_order: Vec<PlayerId>,
    pub max_duration_secs: u64,
    pub total_updates: u32,
}

/// Words per minute, counting five characters as one word.
pub fn words_per_minute(characters_typed: u32, elapsed_ms: u64) -> u32 {
    if elapsed_ms == 0 {
        return 0;
    }
    let minutes = elapsed_ms as f64 / 60_000.0;
    ((characters_typed as f64 / 5.0) / minutes).round() as u32
}

/// Percentage of typed characters that were correct, 100 before any typing.
pub fn accuracy(characters_typed: u32, error_count: u32) -> u32 {
    if characters_typed == 0 {
        return 100;
    }
    let correct = characters_typed as f64 - error_count as f64;
    (correct / characters_typed as f64 * 100.0)
        .round()
        .clamp(0.0, 100.0) as u32
}

impl TypingRaceState {
    pub fn new(players: &[PlayerId], text: impl Into<String>, max_duration_secs: u64) -> Self {
        let text = text.into();
        let total = text.chars().count() as u32;
        Self {
            progress: players
                .iter()
                .map(|&id| PlayerProgress::new(id, total))
                .collect(),
            text,
            phase: RacePhase::NotStarted,
            countdown_armed: false,
            started_at: None,
            ended_at: None,
            finish_order: Vec::new(),
            max_duration_secs,
            total_updates: 0,
        }
    }

    pub fn text_len(&self) -> u32 {
        self.text.chars().count() as u32
    }

    pub fn is_finished(&self) -> bool {
        self.phase == RacePhase::Finished
    }

    pub fn progress_of(&self, player_id: PlayerId) -> Option<&PlayerProgress> {
        self.progress.iter().find(|p| p.player_id == player_id)
    }

    /// Rank-1 finisher, if anyone finished.
    pub fn winner(&self) -> Option<PlayerId> {
        self.finish_order.first().copied()
    }

    /// Reserves the start of the race ahead of the countdown.
    pub fn arm_countdown(&mut self) -> Result<(), RuleError> {
        match self.phase {
            RacePhase::NotStarted if !self.countdown_armed => {
                self.countdown_armed = true;
                Ok(())
            }
            RacePhase::Finished => Err(RuleError::AlreadyTerminal),
            _ => Err(RuleError::RaceAlreadyStarted),
        }
    }

    pub fn start(&mut self, now: u64) -> Result<Vec<GameEvent>, RuleError> {
        match self.phase {
            RacePhase::NotStarted => {}
            RacePhase::Started => return Err(RuleError::RaceAlreadyStarted),
            RacePhase::Finished => return Err(RuleError::AlreadyTerminal),
        }
        self.countdown_armed = true;
        self.phase = RacePhase::Started;
        self.started_at = Some(now);

        Ok(vec![GameEvent::RaceStarted {
            started_at: now,
            text: self.text.clone(),
            max_duration_secs: self.max_duration_secs,
        }])
    }

    pub fn update_progress(
        &mut self,
        player_id: PlayerId,
        characters_typed: u32,
        error_count: u32,
        now: u64,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let started_at = match self.phase {
            RacePhase::NotStarted => return Err(RuleError::RaceNotStarted),
            RacePhase::Finished => return Err(RuleError::AlreadyTerminal),
            RacePhase::Started => self.started_at.unwrap_or(now),
        };
        let text_len = self.text_len();
        let next_rank = self.finish_order.len() as u32 + 1;

        let progress = self
            .progress
            .iter_mut()
            .find(|p| p.player_id == player_id)
            .ok_or(RuleError::UnknownPlayer)?;
        if progress.has_finished {
            return Err(RuleError::AlreadyFinished);
        }

        let elapsed_ms = now.saturating_sub(started_at);
        let typed = characters_typed.min(text_len);
        progress.characters_typed = typed;
        progress.error_count = error_count;
        progress.progress_percentage = if text_len == 0 {
            100.0
        } else {
            typed as f64 / text_len as f64 * 100.0
        };
        progress.wpm = words_per_minute(typed, elapsed_ms);
        progress.accuracy = accuracy(typed, error_count);

        let mut events = vec![GameEvent::ProgressUpdated {
            progress: progress.clone(),
        }];

        if typed >= text_len {
            progress.has_finished = true;
            progress.finish_time_ms = Some(elapsed_ms);
            progress.rank = Some(next_rank);
            events.push(GameEvent::PlayerFinished {
                progress: progress.clone(),
            });
            self.finish_order.push(player_id);
        }
        self.total_updates += 1;

        if self.finish_order.len() == self.progress.len() {
            events.push(self.finish(now));
        }
        Ok(events)
    }

    /// Duration bound reached. A no-op unless the race is still running.
    pub fn expire(&mut self, now: u64) -> Vec<GameEvent> {
        if self.phase != RacePhase::Started {
            return Vec::new();
        }
        vec![GameEvent::RaceTimeout, self.finish(now)]
    }

    /// Finishers by rank, then everyone else by characters typed.
    pub fn final_results(&self) -> Vec<PlayerProgress> {
        let mut results = self.progress.clone();
        results.sort_by(|a, b| {
            let rank_a = a.rank.unwrap_or(u32::MAX);
            let rank_b = b.rank.unwrap_or(u32::MAX);
            rank_a
                .cmp(&rank_b)
                .then(b.characters_typed.cmp(&a.characters_typed))
        });
        results
    }

    fn finish(&mut self, now: u64) -> GameEvent {
        self.phase = RacePhase::Finished;
        self.ended_at = Some(now);
        let duration_ms = now.saturating_sub(self.started_at.unwrap_or(now));
        GameEvent::RaceEnded {
            results: self.final_results(),
            duration_ms,
        }
    }
}
