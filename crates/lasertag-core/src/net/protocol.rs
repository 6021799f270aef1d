use serde::Serialize;

use super::messages::{ClientAction, ServerEvent};

/// Maximum inbound frame size. Anything larger is dropped before parsing.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    Parse(String),
    Encode(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Decode an inbound JSON text frame into a [`ClientAction`].
pub fn decode_action(text: &str) -> Result<ClientAction, ProtocolError> {
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::Parse(e.to_string()))
}

/// Encode an outbound [`ServerEvent`] as a JSON text frame.
pub fn encode_event(event: &ServerEvent) -> Result<String, ProtocolError> {
    encode(event)
}

/// Decode an outbound frame back into a [`ServerEvent`]. Used by test
/// clients; the server itself only encodes.
pub fn decode_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Parse(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(value).map_err(|e| ProtocolError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::messages::WinCondition;
    use crate::player::TeamColor;
    use crate::weapons::WeaponKind;

    #[test]
    fn roundtrip_fire() {
        let action = ClientAction::Fire {
            weapon: WeaponKind::Rifle,
            target_color: TeamColor::Blue,
        };
        let json = serde_json::to_string(&action).unwrap();
        let back = decode_action(&json).unwrap();
        assert_eq!(action, back);
    }

    #[test]
    fn roundtrip_game_end() {
        let event = ServerEvent::GameEnd {
            results: vec![],
            winner: Some("Nova".into()),
            win_condition: WinCondition::TimeExpired,
        };
        let encoded = encode_event(&event).unwrap();
        let back = decode_event(&encoded).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn decode_empty_fails() {
        assert!(matches!(decode_action(""), Err(ProtocolError::EmptyMessage)));
    }

    #[test]
    fn decode_oversized_fails() {
        let huge = format!(r#"{{"action":"purchase","item":"{}"}}"#, "x".repeat(MAX_MESSAGE_SIZE));
        assert!(matches!(
            decode_action(&huge),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn decode_malformed_json_fails() {
        assert!(matches!(
            decode_action("{not json"),
            Err(ProtocolError::Parse(_))
        ));
    }
}
