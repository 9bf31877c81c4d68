//! Note client to control server over a loopback socket

use std::time::Duration;

use note_control::analysis::{Note, NoteEvent};
use note_control::command::{CommandDispatcher, NoteActions};
use note_control::config::ControllerConfig;
use note_control::control::{
    run_control_server, ControlExecutor, ControllerState, InputSink, MouseController,
};
use tokio::net::TcpListener;

#[derive(Default)]
struct CountingSink {
    net: (i32, i32),
    presses: u32,
    releases: u32,
}

impl InputSink for CountingSink {
    fn move_by(&mut self, dx: i32, dy: i32) {
        self.net.0 += dx;
        self.net.1 += dy;
    }
    fn button_down(&mut self) {
        self.presses += 1;
    }
    fn button_up(&mut self) {
        self.releases += 1;
    }
}

fn played(note: Note, start_ms: u64) -> NoteEvent {
    NoteEvent {
        note,
        start: Duration::from_millis(start_ms),
        end: Duration::from_millis(start_ms + 150),
    }
}

#[tokio::test]
async fn test_played_notes_place_a_card() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let mut executor = ControlExecutor::new(MouseController::new(
        CountingSink::default(),
        ControllerConfig::default(),
    ));

    let client = async {
        let mut dispatcher = CommandDispatcher::new(addr, NoteActions::default());
        // cycle to card 1, cycle to card 2, drag up twice, drop
        for (note, at) in [
            (Note::C, 0),
            (Note::C, 300),
            (Note::D, 600),
            (Note::D, 900),
            (Note::A, 1200),
        ] {
            assert!(dispatcher.dispatch(&played(note, at)).await.is_some());
        }
        dispatcher.shutdown().await;
        dispatcher.stats()
    };

    let (server, client) = tokio::join!(
        run_control_server(listener, &mut executor, std::future::pending()),
        client
    );
    let server = server.unwrap();

    assert_eq!(client.sent, 5);
    assert_eq!(client.dropped, 0);
    // Five commands plus the closing exit
    assert_eq!(server.handled, 6);
    assert_eq!(server.malformed, 0);

    let controller = executor.controller();
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(controller.position(), (0, 0));
    assert_eq!(controller.sink().presses, 1);
    assert_eq!(controller.sink().releases, 1);
    // Cycling away from a selected card runs the reset drag, which only
    // approximates the way back to card 1
    let config = ControllerConfig::default();
    let expected = (
        config.reset_drag[0] + config.reset_return[0],
        config.reset_drag[1] + config.reset_return[1],
    );
    assert_eq!(controller.sink().net, expected);
}

#[tokio::test]
async fn test_dispatcher_drops_commands_without_server() {
    // Bind then close to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };

    let mut dispatcher = CommandDispatcher::new(addr, NoteActions::default());
    assert_eq!(dispatcher.dispatch(&played(Note::E, 0)).await, None);
    assert_eq!(dispatcher.dispatch(&played(Note::F, 300)).await, None);

    let stats = dispatcher.stats();
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.dropped, 2);
    assert!(!dispatcher.is_connected());
}
