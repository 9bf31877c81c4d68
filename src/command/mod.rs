// Command channel - vocabulary shared by the note client and control server
//
// Notes map to a closed set of game commands. On the wire each command is a
// `ControlMessage`, one JSON object per line, so the unprivileged recognizer
// and the privileged input injector only agree on this module.

pub mod codec;
pub mod dispatcher;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::classifier::Note;

pub use codec::{decode_line, encode_line};
pub use dispatcher::{CommandDispatcher, DispatchStats};

/// Game command triggered by a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    CycleCard,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Place,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::CycleCard => "cycle_card",
            Command::MoveUp => "move_up",
            Command::MoveDown => "move_down",
            Command::MoveLeft => "move_left",
            Command::MoveRight => "move_right",
            Command::Place => "place",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message understood by the control server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlMessage {
    CycleCard,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    #[serde(alias = "place_card")]
    Place,
    SelectCard {
        card: u8,
    },
    Reset,
    Exit,
}

impl From<Command> for ControlMessage {
    fn from(command: Command) -> Self {
        match command {
            Command::CycleCard => ControlMessage::CycleCard,
            Command::MoveUp => ControlMessage::MoveUp,
            Command::MoveDown => ControlMessage::MoveDown,
            Command::MoveLeft => ControlMessage::MoveLeft,
            Command::MoveRight => ControlMessage::MoveRight,
            Command::Place => ControlMessage::Place,
        }
    }
}

/// One entry of the note to command table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteAction {
    pub note: Note,
    pub command: Command,
}

pub fn default_note_actions() -> Vec<NoteAction> {
    [
        (Note::C, Command::CycleCard),
        (Note::D, Command::MoveUp),
        (Note::E, Command::MoveDown),
        (Note::F, Command::MoveLeft),
        (Note::G, Command::MoveRight),
        (Note::A, Command::Place),
    ]
    .into_iter()
    .map(|(note, command)| NoteAction { note, command })
    .collect()
}

/// Lookup table from note to command
#[derive(Debug, Clone, PartialEq)]
pub struct NoteActions {
    map: HashMap<Note, Command>,
}

impl NoteActions {
    /// Build the table; a later entry for the same note wins
    pub fn new(actions: &[NoteAction]) -> Self {
        Self {
            map: actions.iter().map(|a| (a.note, a.command)).collect(),
        }
    }

    pub fn command_for(&self, note: Note) -> Option<Command> {
        self.map.get(&note).copied()
    }
}

impl Default for NoteActions {
    fn default() -> Self {
        Self::new(&default_note_actions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping_covers_every_note() {
        let actions = NoteActions::default();
        for note in Note::ALL {
            assert!(
                actions.command_for(note).is_some(),
                "Note {} has no command",
                note
            );
        }
        assert_eq!(actions.command_for(Note::C), Some(Command::CycleCard));
        assert_eq!(actions.command_for(Note::A), Some(Command::Place));
    }

    #[test]
    fn test_partial_mapping() {
        let actions = NoteActions::new(&[NoteAction {
            note: Note::G,
            command: Command::Place,
        }]);
        assert_eq!(actions.command_for(Note::G), Some(Command::Place));
        assert_eq!(actions.command_for(Note::C), None);
    }

    #[test]
    fn test_command_names_match_wire_format() {
        for action in default_note_actions() {
            let json = serde_json::to_string(&action.command).unwrap();
            assert_eq!(json, format!("\"{}\"", action.command));
        }
    }
}
