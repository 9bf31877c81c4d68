// Control executor - the privileged side of the command channel
//
// Receives control messages over TCP and turns them into pointer input
// through an `InputSink`.

pub mod controller;
pub mod server;

pub use controller::{
    split_motion, ControlExecutor, ControllerState, Direction, Flow, InputSink, LoggingSink,
    MouseController,
};
pub use server::{run_control_server, ServerStats};
