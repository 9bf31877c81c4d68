// Mouse controller - turns control messages into pointer input
//
// Position is tracked relative to card 1, which is where the pointer is
// assumed to rest when the server starts. All pointer output goes through
// an `InputSink`, so the state machine runs the same against a kernel input
// device, a log, or a test recorder.

use crate::command::ControlMessage;
use crate::config::ControllerConfig;

/// Destination for synthesized pointer input
pub trait InputSink {
    fn move_by(&mut self, dx: i32, dy: i32);
    fn button_down(&mut self);
    fn button_up(&mut self);
}

/// Sink that only logs what it would do
#[derive(Debug, Default)]
pub struct LoggingSink;

impl InputSink for LoggingSink {
    fn move_by(&mut self, dx: i32, dy: i32) {
        tracing::debug!(dx, dy, "pointer move");
    }

    fn button_down(&mut self) {
        tracing::debug!("button down");
    }

    fn button_up(&mut self) {
        tracing::debug!("button up");
    }
}

/// Split a relative move into steps no larger than `max_step` on either axis
///
/// Steps follow the floored cumulative path, so they always sum to (dx, dy)
/// and neighbouring steps differ by at most one pixel.
pub fn split_motion(dx: i32, dy: i32, max_step: i32) -> Vec<(i32, i32)> {
    let max_step = max_step.max(1);
    let steps = dx.abs().max(dy.abs()) / max_step + 1;
    let along = |total: i32, k: i32| {
        (i64::from(total) * i64::from(k)).div_euclid(i64::from(steps)) as i32
    };

    (1..=steps)
        .map(|k| {
            (
                along(dx, k) - along(dx, k - 1),
                along(dy, k) - along(dy, k - 1),
            )
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No card in hand
    Idle,
    /// Pointer on a card, button still up
    CardSelected,
    /// Dragging a card over the field
    Placing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Card placement state machine driving an `InputSink`
pub struct MouseController<S: InputSink> {
    sink: S,
    config: ControllerConfig,
    state: ControllerState,
    current_card: Option<u8>,
    pressed: bool,
    position: (i32, i32),
}

impl<S: InputSink> MouseController<S> {
    pub fn new(sink: S, config: ControllerConfig) -> Self {
        Self {
            sink,
            config,
            state: ControllerState::Idle,
            current_card: None,
            pressed: false,
            position: (0, 0),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn current_card(&self) -> Option<u8> {
        self.current_card
    }

    /// Position relative to card 1
    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn card_count(&self) -> usize {
        self.config.card_offsets.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn move_pointer(&mut self, dx: i32, dy: i32) {
        for (step_x, step_y) in split_motion(dx, dy, self.config.max_step_px) {
            self.sink.move_by(step_x, step_y);
        }
    }

    fn release(&mut self) {
        if self.pressed {
            self.sink.button_up();
            self.pressed = false;
        }
    }

    fn return_to_first_card(&mut self) {
        let (x, y) = self.position;
        if x != 0 || y != 0 {
            self.move_pointer(-x, -y);
            self.position = (0, 0);
        }
    }

    /// Put the pointer on card `card` (1-based)
    ///
    /// Returns false for a card number outside the deck.
    pub fn select_card(&mut self, card: u8) -> bool {
        let Some(&[offset_x, offset_y]) = (card as usize)
            .checked_sub(1)
            .and_then(|index| self.config.card_offsets.get(index))
        else {
            tracing::warn!(card, "Invalid card number");
            return false;
        };

        if self.state != ControllerState::Idle {
            self.reset();
        }
        self.release();
        self.return_to_first_card();

        if offset_x != 0 || offset_y != 0 {
            self.move_pointer(offset_x, offset_y);
            self.position = (offset_x, offset_y);
        }

        self.state = ControllerState::CardSelected;
        self.current_card = Some(card);
        tracing::info!(card, position = ?self.position, "Card selected");
        true
    }

    /// Move one step, picking up the selected card on the first move
    pub fn move_step(&mut self, direction: Direction) {
        if self.state == ControllerState::Idle {
            tracing::debug!(?direction, "No card selected, move ignored");
            return;
        }

        if self.state == ControllerState::CardSelected {
            self.sink.button_down();
            self.pressed = true;
            self.state = ControllerState::Placing;
        }

        let step = self.config.move_step;
        let (dx, dy) = match direction {
            Direction::Up => (0, -step),
            Direction::Down => (0, step),
            Direction::Left => (-step, 0),
            Direction::Right => (step, 0),
        };
        self.move_pointer(dx, dy);
        self.position.0 += dx;
        self.position.1 += dy;
        tracing::debug!(position = ?self.position, "Moved");
    }

    /// Drop the card where it is and go back to card 1
    pub fn place(&mut self) {
        if self.state == ControllerState::Idle {
            tracing::debug!("No card to place");
            return;
        }

        self.release();
        self.return_to_first_card();
        self.state = ControllerState::Idle;
        self.current_card = None;
        tracing::info!("Card placed");
    }

    /// Cancel a placement by dragging the card off the board
    pub fn reset(&mut self) {
        let [drag_x, drag_y] = self.config.reset_drag;
        self.move_pointer(drag_x, drag_y);
        self.release();

        let [back_x, back_y] = self.config.reset_return;
        self.move_pointer(back_x, back_y);

        self.state = ControllerState::Idle;
        self.current_card = None;
        self.position = (0, 0);
        tracing::info!("Controller reset");
    }
}

/// Whether the server keeps reading after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Applies control messages to a `MouseController`, including card cycling
pub struct ControlExecutor<S: InputSink> {
    controller: MouseController<S>,
    cycle_index: usize,
    last_was_cycle: bool,
}

impl<S: InputSink> ControlExecutor<S> {
    pub fn new(controller: MouseController<S>) -> Self {
        Self {
            controller,
            cycle_index: 0,
            last_was_cycle: false,
        }
    }

    pub fn controller(&self) -> &MouseController<S> {
        &self.controller
    }

    pub fn handle(&mut self, message: ControlMessage) -> Flow {
        tracing::debug!(?message, "Handling control message");

        if message == ControlMessage::CycleCard {
            self.cycle_card();
            return Flow::Continue;
        }
        self.last_was_cycle = false;

        match message {
            ControlMessage::CycleCard => {}
            ControlMessage::MoveUp => self.controller.move_step(Direction::Up),
            ControlMessage::MoveDown => self.controller.move_step(Direction::Down),
            ControlMessage::MoveLeft => self.controller.move_step(Direction::Left),
            ControlMessage::MoveRight => self.controller.move_step(Direction::Right),
            ControlMessage::Place => self.controller.place(),
            ControlMessage::SelectCard { card } => {
                self.controller.select_card(card);
            }
            ControlMessage::Reset => self.controller.reset(),
            ControlMessage::Exit => return Flow::Exit,
        }
        Flow::Continue
    }

    fn cycle_card(&mut self) {
        let cards = self.controller.card_count().max(1);
        self.cycle_index = if self.last_was_cycle {
            (self.cycle_index + 1) % cards
        } else {
            0
        };
        self.last_was_cycle = true;

        let card = (self.cycle_index + 1) as u8;
        tracing::info!(card, "Cycling card");
        self.controller.select_card(card);
    }

    /// Let go of a held card before the server stops
    pub fn shutdown(&mut self) {
        if self.controller.is_pressed() {
            self.controller.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Input {
        Move(i32, i32),
        Down,
        Up,
    }

    #[derive(Default)]
    struct RecordingSink {
        inputs: Vec<Input>,
    }

    impl RecordingSink {
        fn net_motion(&self) -> (i32, i32) {
            self.inputs.iter().fold((0, 0), |(x, y), input| match input {
                Input::Move(dx, dy) => (x + dx, y + dy),
                _ => (x, y),
            })
        }

        fn buttons(&self) -> Vec<Input> {
            self.inputs
                .iter()
                .copied()
                .filter(|input| !matches!(input, Input::Move(..)))
                .collect()
        }
    }

    impl InputSink for RecordingSink {
        fn move_by(&mut self, dx: i32, dy: i32) {
            self.inputs.push(Input::Move(dx, dy));
        }
        fn button_down(&mut self) {
            self.inputs.push(Input::Down);
        }
        fn button_up(&mut self) {
            self.inputs.push(Input::Up);
        }
    }

    fn executor() -> ControlExecutor<RecordingSink> {
        ControlExecutor::new(MouseController::new(
            RecordingSink::default(),
            ControllerConfig::default(),
        ))
    }

    #[test]
    fn test_split_motion() {
        assert_eq!(split_motion(0, 0, 10), vec![(0, 0)]);
        assert_eq!(
            split_motion(0, -50, 10),
            vec![(0, -9), (0, -8), (0, -8), (0, -9), (0, -8), (0, -8)]
        );
        assert_eq!(split_motion(7, 0, 10), vec![(7, 0)]);

        let steps = split_motion(-1000, 1000, 10);
        assert_eq!(steps.len(), 101);
        let total = steps.iter().fold((0, 0), |(x, y), (dx, dy)| (x + dx, y + dy));
        assert_eq!(total, (-1000, 1000));
        assert!(steps.iter().all(|(dx, dy)| dx.abs() <= 10 && dy.abs() <= 10));
    }

    #[test]
    fn test_moves_ignored_when_idle() {
        let mut exec = executor();
        exec.handle(ControlMessage::MoveUp);
        exec.handle(ControlMessage::Place);

        assert_eq!(exec.controller().state(), ControllerState::Idle);
        assert!(exec.controller().sink().inputs.is_empty());
    }

    #[test]
    fn test_select_move_place() {
        let mut exec = executor();
        exec.handle(ControlMessage::SelectCard { card: 3 });
        assert_eq!(exec.controller().state(), ControllerState::CardSelected);
        assert_eq!(exec.controller().position(), (180, 0));

        exec.handle(ControlMessage::MoveUp);
        assert_eq!(exec.controller().state(), ControllerState::Placing);
        assert!(exec.controller().is_pressed());
        exec.handle(ControlMessage::MoveLeft);
        assert_eq!(exec.controller().position(), (130, -50));

        exec.handle(ControlMessage::Place);
        assert_eq!(exec.controller().state(), ControllerState::Idle);
        assert_eq!(exec.controller().position(), (0, 0));
        assert_eq!(exec.controller().sink().net_motion(), (0, 0));
        assert_eq!(exec.controller().sink().buttons(), vec![Input::Down, Input::Up]);
    }

    #[test]
    fn test_invalid_card_is_ignored() {
        let mut exec = executor();
        exec.handle(ControlMessage::SelectCard { card: 0 });
        exec.handle(ControlMessage::SelectCard { card: 5 });
        assert_eq!(exec.controller().state(), ControllerState::Idle);
        assert!(exec.controller().sink().inputs.is_empty());
    }

    #[test]
    fn test_cycle_card_sequence() {
        let mut exec = executor();
        let mut cards = Vec::new();
        for _ in 0..5 {
            exec.handle(ControlMessage::CycleCard);
            cards.push(exec.controller().current_card());
        }
        assert_eq!(cards, vec![Some(1), Some(2), Some(3), Some(4), Some(1)]);
    }

    #[test]
    fn test_other_action_restarts_cycle() {
        let mut exec = executor();
        exec.handle(ControlMessage::CycleCard);
        exec.handle(ControlMessage::CycleCard);
        assert_eq!(exec.controller().current_card(), Some(2));

        exec.handle(ControlMessage::MoveDown);
        exec.handle(ControlMessage::CycleCard);
        assert_eq!(exec.controller().current_card(), Some(1));
    }

    #[test]
    fn test_reset_drags_off_board() {
        let mut exec = executor();
        exec.handle(ControlMessage::SelectCard { card: 2 });
        exec.handle(ControlMessage::MoveRight);
        exec.handle(ControlMessage::Reset);

        let controller = exec.controller();
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(!controller.is_pressed());
        assert_eq!(controller.position(), (0, 0));
        // card 2 offset, one step right, drag away, drag back
        assert_eq!(
            controller.sink().net_motion(),
            (103 + 50 - 1000 + 550, 1000 - 80)
        );
        assert_eq!(controller.sink().buttons(), vec![Input::Down, Input::Up]);
    }

    #[test]
    fn test_exit_and_shutdown_release_card() {
        let mut exec = executor();
        exec.handle(ControlMessage::SelectCard { card: 1 });
        exec.handle(ControlMessage::MoveUp);

        assert_eq!(exec.handle(ControlMessage::Exit), Flow::Exit);
        exec.shutdown();
        assert!(!exec.controller().is_pressed());
    }
}
