//! Inbound and outbound events.
//!
//! Both enums are adjacently tagged: the variant name becomes the
//! snake_case `event` field and the fields go under `data`, camelCased.

use serde::{Deserialize, Serialize};

use crate::{Card, PlayerId, RoundStatus, WinPattern};

/// Codes carried by [`ServerEvent::Error`]. HTTP-flavoured so clients can
/// reuse their existing handling.
pub mod error_code {
    /// Malformed frame, or the handshake was not the first frame.
    pub const BAD_REQUEST: u16 = 400;
    /// The hello token did not verify.
    pub const UNAUTHORIZED: u16 = 401;
    /// The frame names a player other than the authenticated one.
    pub const FORBIDDEN: u16 = 403;
    /// A request/response operation referred to an unknown record.
    pub const NOT_FOUND: u16 = 404;
    /// The engine could not serve the request.
    pub const INTERNAL: u16 = 500;
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Mandatory first frame. `token` is Telegram init data in production.
    Hello { token: String },

    /// Fetch (or create) the caller's card.
    RegisterPlayer {
        #[serde(default)]
        name: String,
    },

    /// Join the shared round.
    JoinGame { player_id: PlayerId },

    /// Mark a number on the caller's card.
    MarkNumber { player_id: PlayerId, number: u8 },

    /// Draw one number now, bypassing the timer.
    CallNumber {},

    /// End the current round early.
    StopRound {},

    Heartbeat { client_time: u64 },

    /// Graceful goodbye; the server closes the connection.
    Disconnect {},
}

impl ClientEvent {
    /// The player id the frame claims to act for, if any.
    pub fn claimed_player(&self) -> Option<PlayerId> {
        match self {
            Self::JoinGame { player_id } | Self::MarkNumber { player_id, .. } => Some(*player_id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Reply to a successful `hello`.
    Welcome { player_id: PlayerId, server_time: u64 },

    GameStatusChange { status: RoundStatus },

    NumberCalled { number: u8, total_called: usize },

    /// A player joined for the first time (reconnects are silent).
    PlayerJoined { player_id: PlayerId, player_name: String },

    PlayerMarked { player_id: PlayerId, number: u8 },

    /// First winning pattern, in evaluation order.
    PlayerWon {
        player_id: PlayerId,
        winning_line: WinPattern,
    },

    /// Full round snapshot, sent to a single connection.
    GameStateUpdate {
        status: RoundStatus,
        called_numbers: Vec<u8>,
        current_number: Option<u8>,
    },

    PlayerRegistered { player_id: PlayerId, player_card: Card },

    /// The joining player's own board.
    PlayerProgress {
        player_id: PlayerId,
        card: Card,
        marked_numbers: Vec<u8>,
        has_won: bool,
    },

    HeartbeatAck { client_time: u64, server_time: u64 },

    Error { code: u16, message: String },
}

impl ServerEvent {
    /// Shorthand for an [`ServerEvent::Error`].
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// The wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::GameStatusChange { .. } => "game_status_change",
            Self::NumberCalled { .. } => "number_called",
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerMarked { .. } => "player_marked",
            Self::PlayerWon { .. } => "player_won",
            Self::GameStateUpdate { .. } => "game_state_update",
            Self::PlayerRegistered { .. } => "player_registered",
            Self::PlayerProgress { .. } => "player_progress",
            Self::HeartbeatAck { .. } => "heartbeat_ack",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiagonalDirection;
    use serde_json::json;

    // =====================================================================
    // ClientEvent
    // =====================================================================

    #[test]
    fn test_client_event_join_game_json_format() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"join_game","data":{"playerId":42}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinGame {
                player_id: PlayerId(42)
            }
        );
    }

    #[test]
    fn test_client_event_mark_number_json_format() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"mark_number","data":{"playerId":42,"number":17}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::MarkNumber {
                player_id: PlayerId(42),
                number: 17
            }
        );
    }

    #[test]
    fn test_client_event_empty_data_variants() {
        let call: ClientEvent =
            serde_json::from_str(r#"{"event":"call_number","data":{}}"#).unwrap();
        assert_eq!(call, ClientEvent::CallNumber {});
        let stop: ClientEvent =
            serde_json::from_str(r#"{"event":"stop_round","data":{}}"#).unwrap();
        assert_eq!(stop, ClientEvent::StopRound {});
    }

    #[test]
    fn test_client_event_register_player_name_defaults_to_empty() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"register_player","data":{}}"#).unwrap();
        assert_eq!(event, ClientEvent::RegisterPlayer { name: String::new() });
    }

    #[test]
    fn test_client_event_heartbeat_uses_camel_case() {
        let json = serde_json::to_value(ClientEvent::Heartbeat { client_time: 9 }).unwrap();
        assert_eq!(json, json!({"event": "heartbeat", "data": {"clientTime": 9}}));
    }

    #[test]
    fn test_client_event_unknown_event_fails() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"event":"cheat","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_event_claimed_player() {
        assert_eq!(
            ClientEvent::MarkNumber {
                player_id: PlayerId(3),
                number: 1
            }
            .claimed_player(),
            Some(PlayerId(3))
        );
        assert_eq!(ClientEvent::CallNumber {}.claimed_player(), None);
    }

    // =====================================================================
    // ServerEvent
    // =====================================================================

    #[test]
    fn test_server_event_number_called_json_format() {
        let json = serde_json::to_value(ServerEvent::NumberCalled {
            number: 42,
            total_called: 7,
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"event": "number_called", "data": {"number": 42, "totalCalled": 7}})
        );
    }

    #[test]
    fn test_server_event_game_state_update_json_format() {
        let json = serde_json::to_value(ServerEvent::GameStateUpdate {
            status: RoundStatus::Started,
            called_numbers: vec![5, 60],
            current_number: Some(60),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({
                "event": "game_state_update",
                "data": {"status": "started", "calledNumbers": [5, 60], "currentNumber": 60}
            })
        );
    }

    #[test]
    fn test_server_event_current_number_none_is_null() {
        let json = serde_json::to_value(ServerEvent::GameStateUpdate {
            status: RoundStatus::Shuffling,
            called_numbers: vec![],
            current_number: None,
        })
        .unwrap();
        assert!(json["data"]["currentNumber"].is_null());
    }

    #[test]
    fn test_server_event_player_won_json_format() {
        let json = serde_json::to_value(ServerEvent::PlayerWon {
            player_id: PlayerId(8),
            winning_line: WinPattern::Diagonal {
                direction: DiagonalDirection::TopRightBottomLeft,
            },
        })
        .unwrap();
        assert_eq!(
            json,
            json!({
                "event": "player_won",
                "data": {"playerId": 8, "winningLine": {"type": "diagonal", "direction": "TR-BL"}}
            })
        );
    }

    #[test]
    fn test_server_event_name_matches_tag() {
        let events = [
            ServerEvent::error(400, "bad"),
            ServerEvent::HeartbeatAck {
                client_time: 1,
                server_time: 2,
            },
            ServerEvent::GameStatusChange {
                status: RoundStatus::Waiting,
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }
}
