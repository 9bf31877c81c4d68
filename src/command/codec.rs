// Line codec for control messages: one JSON object per line

use crate::command::ControlMessage;
use crate::error::CommandError;

/// Encode a message as a newline-terminated JSON line
pub fn encode_line(message: &ControlMessage) -> Result<String, CommandError> {
    let mut line = serde_json::to_string(message).map_err(|err| CommandError::SendFailed {
        reason: format!("encode failed: {}", err),
    })?;
    line.push('\n');
    Ok(line)
}

/// Decode one received line, ignoring surrounding whitespace
pub fn decode_line(line: &str) -> Result<ControlMessage, CommandError> {
    serde_json::from_str(line.trim()).map_err(|err| CommandError::MalformedMessage {
        line: line.trim().to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn test_encode_matches_wire_format() {
        assert_eq!(
            encode_line(&ControlMessage::MoveUp).unwrap(),
            "{\"action\":\"move_up\"}\n"
        );
        assert_eq!(
            encode_line(&ControlMessage::SelectCard { card: 2 }).unwrap(),
            "{\"action\":\"select_card\",\"card\":2}\n"
        );
        assert_eq!(
            encode_line(&ControlMessage::from(Command::Place)).unwrap(),
            "{\"action\":\"place\"}\n"
        );
    }

    #[test]
    fn test_decode_accepts_legacy_place_name() {
        assert_eq!(
            decode_line("{\"action\": \"place_card\"}").unwrap(),
            ControlMessage::Place
        );
    }

    #[test]
    fn test_decode_trims_line_endings() {
        assert_eq!(
            decode_line("{\"action\":\"exit\"}\r\n").unwrap(),
            ControlMessage::Exit
        );
    }

    #[test]
    fn test_decode_rejects_unknown_action() {
        match decode_line("{\"action\":\"jump\"}") {
            Err(CommandError::MalformedMessage { line, .. }) => {
                assert_eq!(line, "{\"action\":\"jump\"}")
            }
            other => panic!("Expected MalformedMessage, got {:?}", other),
        }
        assert!(decode_line("not json").is_err());
        assert!(decode_line("{\"action\":\"select_card\"}").is_err(), "Card number required");
    }
}
