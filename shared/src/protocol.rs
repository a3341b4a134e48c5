//! Datagram packets exchanged between arcade clients and the server.
//! Each packet is one bincode-encoded datagram.

use crate::event::GameEvent;
use crate::session::{Action, GameVariant, SessionState};
use crate::typing_race::Difficulty;
use crate::{ErrorKind, PlayerId, SessionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientPacket {
    /// Sent by the lobby once its roster is final.
    CreateSession {
        session_id: SessionId,
        variant: GameVariant,
        players: Vec<PlayerId>,
        difficulty: Option<Difficulty>,
    },
    /// Subscribes the sender to the session's events.
    Join {
        session_id: SessionId,
    },
    Leave {
        session_id: SessionId,
    },
    Action {
        session_id: SessionId,
        player_id: PlayerId,
        action: Action,
    },
    StartRace {
        session_id: SessionId,
    },
    GetState {
        session_id: SessionId,
    },
}

impl ClientPacket {
    pub fn session_id(&self) -> SessionId {
        match self {
            ClientPacket::CreateSession { session_id, .. }
            | ClientPacket::Join { session_id }
            | ClientPacket::Leave { session_id }
            | ClientPacket::Action { session_id, .. }
            | ClientPacket::StartRace { session_id }
            | ClientPacket::GetState { session_id } => *session_id,
        }
    }
}

/// Why a request was refused. Only ever sent to the requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionKind {
    NotFound,
    AlreadyExists,
    Rule(ErrorKind),
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    Event {
        session_id: SessionId,
        event: GameEvent,
    },
    State {
        state: SessionState,
    },
    Rejected {
        session_id: SessionId,
        rejection: Rejection,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_client_packet_session_id() {
        let session_id = Uuid::new_v4();
        let packets = vec![
            ClientPacket::Join { session_id },
            ClientPacket::StartRace { session_id },
            ClientPacket::Action {
                session_id,
                player_id: Uuid::new_v4(),
                action: Action::DropPiece { column: 3 },
            },
        ];
        for packet in packets {
            assert_eq!(packet.session_id(), session_id);
        }
    }

    #[test]
    fn test_action_packet_serialization() {
        let packet = ClientPacket::Action {
            session_id: Uuid::new_v4(),
            player_id: Uuid::new_v4(),
            action: Action::UpdateProgress {
                characters_typed: 42,
                error_count: 3,
            },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: ClientPacket = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_rejection_packet_serialization() {
        let packet = ServerPacket::Rejected {
            session_id: Uuid::new_v4(),
            rejection: Rejection {
                kind: RejectionKind::Rule(ErrorKind::WrongPhase),
                reason: "race has not started yet".to_string(),
            },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        match bincode::deserialize::<ServerPacket>(&serialized).unwrap() {
            ServerPacket::Rejected { rejection, .. } => {
                assert_eq!(rejection.kind, RejectionKind::Rule(ErrorKind::WrongPhase));
                assert_eq!(rejection.reason, "race has not started yet");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
