//! Integration tests for the session engine
//!
//! These tests drive complete games through the engine the way the transport
//! does, checking rule outcomes, event fan-out, history and eviction together.

use assert_approx_eq::assert_approx_eq;
use server::config::EngineConfig;
use server::engine::GameEngine;
use server::error::SessionError;
use server::sink::{MemoryStore, SideChannel};
use shared::{
    Action, Coord, Difficulty, GameEvent, GameState, GameVariant, PlayerId, RuleError, SessionId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

/// TIC-TAC-TOE TESTS
mod tic_tac_toe_tests {
    use super::*;

    /// Plays a full board without a line and expects a draw
    #[tokio::test]
    async fn full_board_is_draw() {
        let (engine, store) = engine_with_store();
        let (session_id, x, o) = two_player_session(&engine, GameVariant::TicTacToe).await;

        // X O X / X O O / O X X
        let moves = [
            (x, 0, 0),
            (o, 0, 1),
            (x, 0, 2),
            (o, 1, 1),
            (x, 1, 0),
            (o, 1, 2),
            (x, 2, 1),
            (o, 2, 0),
            (x, 2, 2),
        ];
        let mut last = Vec::new();
        for (player, row, col) in moves {
            last = assert_ok!(
                engine
                    .submit(session_id, player, Action::PlaceMark { row, col })
                    .await
            );
        }

        assert_eq!(
            last.last(),
            Some(&GameEvent::GameOver {
                winner: None,
                ended_by: x,
                is_draw: true,
                winning_line: None,
                total_moves: 9,
            })
        );
        let state = assert_ok!(engine.get_state(session_id).await);
        assert!(state.is_terminal());
        assert!(state.is_draw());
        assert_eq!(state.winner(), None);

        // The draw is logged against the player who filled the last cell.
        engine.sinks().flush().await;
        let records = store.records();
        let ended = records.iter().find(|r| r.action_type == "GameEnded");
        assert_eq!(ended.and_then(|r| r.player_id), Some(x));
    }

    /// Retried submissions never count twice
    #[tokio::test]
    async fn retried_move_is_rejected() {
        let (engine, _) = engine_with_store();
        let (session_id, x, o) = two_player_session(&engine, GameVariant::TicTacToe).await;

        assert_ok!(
            engine
                .submit(session_id, x, Action::PlaceMark { row: 1, col: 1 })
                .await
        );
        // The same datagram arrives again, then the opponent races for the cell.
        assert_eq!(
            engine
                .submit(session_id, x, Action::PlaceMark { row: 1, col: 1 })
                .await,
            Err(SessionError::Rule(RuleError::NotYourTurn))
        );
        assert_eq!(
            engine
                .submit(session_id, o, Action::PlaceMark { row: 1, col: 1 })
                .await,
            Err(SessionError::Rule(RuleError::CellOccupied { row: 1, col: 1 }))
        );

        let state = assert_ok!(engine.get_state(session_id).await);
        assert_eq!(state.total_moves(), 1);
        assert_eq!(state.current_turn(), Some(o));
    }

    /// Turns alternate between the two seated players only
    #[tokio::test]
    async fn turns_alternate() {
        let (engine, _) = engine_with_store();
        let (session_id, x, o) = two_player_session(&engine, GameVariant::TicTacToe).await;
        let outsider = Uuid::new_v4();

        for (i, (row, col)) in [(0, 0), (1, 1), (2, 2), (0, 1)].into_iter().enumerate() {
            let expected = if i % 2 == 0 { x } else { o };
            let state = assert_ok!(engine.get_state(session_id).await);
            assert_eq!(state.current_turn(), Some(expected));

            assert_err!(
                engine
                    .submit(session_id, outsider, Action::PlaceMark { row, col })
                    .await
            );
            assert_ok!(
                engine
                    .submit(session_id, expected, Action::PlaceMark { row, col })
                    .await
            );
        }
    }
}

/// CONNECT-FOUR TESTS
mod connect_four_tests {
    use super::*;

    /// A vertical run ends the game and reports the run
    #[tokio::test]
    async fn vertical_win_reports_run() {
        let (engine, _) = engine_with_store();
        let (session_id, red, yellow) = two_player_session(&engine, GameVariant::ConnectFour).await;
        let (_, mut rx) = engine.subscribe(session_id);

        for column in [0, 1, 0, 1, 0, 1] {
            let player = if column == 0 { red } else { yellow };
            assert_ok!(
                engine
                    .submit(session_id, player, Action::DropPiece { column })
                    .await
            );
        }
        let events = assert_ok!(
            engine
                .submit(session_id, red, Action::DropPiece { column: 0 })
                .await
        );

        match &events[..] {
            [GameEvent::PieceDropped { row: 2, column: 0, .. }, GameEvent::GameOver {
                winner,
                winning_line: Some(line),
                ..
            }] => {
                assert_eq!(*winner, Some(red));
                assert_eq!(line.len(), 4);
                assert!(line.contains(&Coord::new(2, 0)));
            }
            other => panic!("unexpected events {:?}", other),
        }

        // Subscribers saw all seven drops followed by the end of the game.
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.name());
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(seen.last(), Some(&"GameOver"));

        assert_eq!(
            engine
                .submit(session_id, yellow, Action::DropPiece { column: 3 })
                .await,
            Err(SessionError::Rule(RuleError::AlreadyTerminal))
        );
    }

    /// A full column refuses the next drop without touching the board
    #[tokio::test]
    async fn full_column_rejected() {
        let (engine, _) = engine_with_store();
        let (session_id, red, yellow) = two_player_session(&engine, GameVariant::ConnectFour).await;

        for i in 0..6 {
            let player = if i % 2 == 0 { red } else { yellow };
            assert_ok!(
                engine
                    .submit(session_id, player, Action::DropPiece { column: 6 })
                    .await
            );
        }
        let before = assert_ok!(engine.get_state(session_id).await);

        assert_eq!(
            engine
                .submit(session_id, red, Action::DropPiece { column: 6 })
                .await,
            Err(SessionError::Rule(RuleError::ColumnFull(6)))
        );
        assert_eq!(assert_ok!(engine.get_state(session_id).await), before);
    }

    /// Forfeit hands the win to the opponent and is logged
    #[tokio::test(start_paused = true)]
    async fn forfeit_then_eviction() {
        let (engine, store) = engine_with_store();
        let (session_id, red, yellow) = two_player_session(&engine, GameVariant::ConnectFour).await;

        assert_ok!(
            engine
                .submit(session_id, red, Action::DropPiece { column: 3 })
                .await
        );
        let events = assert_ok!(engine.forfeit(session_id, red).await);
        assert_eq!(
            events[0],
            GameEvent::PlayerForfeited {
                forfeiter: red,
                winner: yellow,
            }
        );

        sleep(Duration::from_secs(30)).await;
        let frozen = assert_ok!(engine.get_state(session_id).await);
        assert_eq!(frozen.winner(), Some(yellow));

        sleep(Duration::from_secs(31)).await;
        assert_eq!(
            engine.get_state(session_id).await,
            Err(SessionError::NotFound(session_id))
        );

        engine.sinks().flush().await;
        let actions: Vec<String> = store.records().into_iter().map(|r| r.action_type).collect();
        assert_eq!(
            actions,
            vec!["GameInitialized", "DropPiece", "PlayerForfeited", "GameEnded"]
        );
        assert_eq!(store.snapshots().len(), 1);
    }
}

/// TYPING RACE TESTS
mod typing_race_tests {
    use super::*;

    /// Finishers are ranked in order, stragglers are cut off by the timeout
    #[tokio::test(start_paused = true)]
    async fn ranks_and_timeout() {
        let (engine, store) = engine_with_store();
        let session_id = Uuid::new_v4();
        let players: Vec<PlayerId> = (0..3).map(|_| Uuid::new_v4()).collect();
        let state = assert_ok!(
            engine
                .create_session(
                    session_id,
                    GameVariant::TypingRace,
                    players.clone(),
                    Some(Difficulty::Hard)
                )
                .await
        );
        let text_len = match &state.game {
            GameState::TypingRace(race) => race.text_len(),
            _ => panic!("not a race"),
        };
        let (_, mut rx) = engine.subscribe(session_id);

        assert_ok!(engine.start_race(session_id).await);
        wait_for(&mut rx, "RaceStarted").await;

        let progress = |characters_typed| Action::UpdateProgress {
            characters_typed,
            error_count: 0,
        };
        assert_ok!(engine.submit(session_id, players[2], progress(text_len)).await);
        assert_ok!(engine.submit(session_id, players[1], progress(text_len / 2)).await);
        // Overshooting is clamped to the text length.
        assert_ok!(engine.submit(session_id, players[0], progress(text_len + 50)).await);
        assert_eq!(
            engine.submit(session_id, players[0], progress(text_len)).await,
            Err(SessionError::Rule(RuleError::AlreadyFinished))
        );

        let results = match wait_for(&mut rx, "RaceEnded").await {
            GameEvent::RaceEnded { results, .. } => results,
            _ => unreachable!(),
        };
        assert_eq!(
            results.iter().map(|p| p.player_id).collect::<Vec<_>>(),
            vec![players[2], players[0], players[1]]
        );
        assert_eq!(results[0].rank, Some(1));
        assert_eq!(results[1].rank, Some(2));
        assert_eq!(results[1].characters_typed, text_len);
        assert_eq!(results[2].rank, None);
        assert!(!results[2].has_finished);
        assert_approx_eq!(
            results[2].progress_percentage,
            (text_len / 2) as f64 / text_len as f64 * 100.0,
            1e-9
        );

        let state = assert_ok!(engine.get_state(session_id).await);
        assert_eq!(state.winner(), Some(players[2]));
        assert_eq!(
            engine.submit(session_id, players[1], progress(text_len)).await,
            Err(SessionError::Rule(RuleError::AlreadyTerminal))
        );

        engine.sinks().flush().await;
        let records = store.records();
        assert_eq!(
            records.iter().filter(|r| r.action_type == "PlayerFinished").count(),
            2
        );
        let ended = records.iter().find(|r| r.action_type == "RaceEnded");
        assert!(ended.is_some_and(|r| r.player_id.is_none()));
    }

    /// The race needs two or more typists
    #[tokio::test]
    async fn roster_validation() {
        let (engine, _) = engine_with_store();

        let solo = engine
            .create_session(Uuid::new_v4(), GameVariant::TypingRace, vec![Uuid::new_v4()], None)
            .await;
        assert!(matches!(
            solo,
            Err(SessionError::Rule(RuleError::PlayerCount { actual: 1, .. }))
        ));

        let crowd: Vec<PlayerId> = (0..8).map(|_| Uuid::new_v4()).collect();
        assert_ok!(
            engine
                .create_session(Uuid::new_v4(), GameVariant::TypingRace, crowd, None)
                .await
        );
    }
}

/// CONCURRENCY TESTS
mod concurrency_tests {
    use super::*;

    /// Many sessions played at once finish independently
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_sessions() {
        let (engine, _) = engine_with_store();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let (session_id, x, o) = two_player_session(&engine, GameVariant::TicTacToe).await;
                for (player, row, col) in [(x, 0, 0), (o, 1, 0), (x, 0, 1), (o, 1, 1), (x, 0, 2)] {
                    engine
                        .submit(session_id, player, Action::PlaceMark { row, col })
                        .await?;
                }
                engine.get_state(session_id).await.map(|state| (state, x))
            }));
        }

        for handle in handles {
            let (state, x) = assert_ok!(handle.await.unwrap());
            assert!(state.is_terminal());
            assert_eq!(state.winner(), Some(x));
        }
        assert_eq!(engine.session_count().await, 50);
    }

    /// Racing submissions on one session: exactly one legal move lands
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn contested_cell() {
        let (engine, _) = engine_with_store();
        let (session_id, x, o) = two_player_session(&engine, GameVariant::TicTacToe).await;
        assert_ok!(
            engine
                .submit(session_id, x, Action::PlaceMark { row: 0, col: 0 })
                .await
        );

        // O is on turn; both the legal move and a stale retry of X race in.
        let legal = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .submit(session_id, o, Action::PlaceMark { row: 2, col: 2 })
                    .await
            })
        };
        let stale = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .submit(session_id, x, Action::PlaceMark { row: 0, col: 0 })
                    .await
            })
        };

        assert_ok!(legal.await.unwrap());
        assert_err!(stale.await.unwrap());

        let state = assert_ok!(engine.get_state(session_id).await);
        assert_eq!(state.total_moves(), 2);
        assert_eq!(state.current_turn(), Some(x));
    }
}

// HELPER FUNCTIONS

fn engine_with_store() -> (Arc<GameEngine>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let (sinks, _) = SideChannel::spawn(store.clone());
    (GameEngine::new(EngineConfig::default(), sinks), store)
}

async fn two_player_session(
    engine: &Arc<GameEngine>,
    variant: GameVariant,
) -> (SessionId, PlayerId, PlayerId) {
    let session_id = Uuid::new_v4();
    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    assert_ok!(
        engine
            .create_session(session_id, variant, vec![first, second], None)
            .await
    );
    (session_id, first, second)
}

async fn wait_for(rx: &mut tokio::sync::mpsc::UnboundedReceiver<GameEvent>, name: &str) -> GameEvent {
    loop {
        let event = rx.recv().await.expect("session closed");
        if event.name() == name {
            return event;
        }
    }
}
