//! pubsub-lifecycle: Client lifecycle on top of pubsub-middleware
//!
//! `Session` sequences bridge → transport → publisher/subscription/timer
//! creation and releases them in reverse. `ShutdownController` turns a
//! confirmed interrupt into a dispatcher stop.

pub mod periodic;
pub mod prompt;
pub mod session;
pub mod shutdown;

pub use periodic::{MessageFactory, PeriodicPublish};
pub use prompt::{parse_answer, Confirm, ConsolePrompt, STOP_PROMPT};
pub use session::{Released, ResourceKind, Session, ShutdownReport};
pub use shutdown::{
    ctrl_c_interrupts, run_until_stopped, run_with_interrupts, supervise_interrupts,
    ShutdownController, ShutdownState,
};
