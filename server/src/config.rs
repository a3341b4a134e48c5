use shared::{GameVariant, RaceSettings};
use std::time::Duration;

/// Timing and content knobs of the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a finished tic-tac-toe or connect-four session stays queryable.
    pub board_game_grace: Duration,
    /// How long a finished typing race stays queryable.
    pub race_grace: Duration,
    pub race: RaceSettings,
    /// Number of countdown ticks before a race starts.
    pub countdown_from: u32,
    pub countdown_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            board_game_grace: Duration::from_secs(60),
            race_grace: Duration::from_secs(120),
            race: RaceSettings::default(),
            countdown_from: 3,
            countdown_interval: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    pub fn grace_period(&self, variant: GameVariant) -> Duration {
        match variant {
            GameVariant::TicTacToe | GameVariant::ConnectFour => self.board_game_grace,
            GameVariant::TypingRace => self.race_grace,
        }
    }
}
