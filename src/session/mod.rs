//! Voice session control
//!
//! This module owns everything about when recognition runs:
//! - `state`: listening/speaking flags, active language, retry counter, status line
//! - `machine`: the pure transition function over those fields
//! - `timers`: cancellable debounce/restart tasks
//! - `controller`: the async driver that wires the machine to speech engines and the relay

mod controller;
mod machine;
mod state;
mod timers;

pub use controller::{Collaborators, ControllerHandle, SessionController};
pub use machine::{Effect, Event, RecognitionErrorKind, Session, Timer, APOLOGY};
pub use state::{Profile, SessionState, Status, UiSnapshot};
pub use timers::{TimerElapsed, Timers};

use tokio::sync::mpsc;

/// Where collaborators post their lifecycle events
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Channel shared by the controller and its collaborators
pub fn event_channel() -> (EventSender, mpsc::UnboundedReceiver<Event>) {
    mpsc::unbounded_channel()
}
