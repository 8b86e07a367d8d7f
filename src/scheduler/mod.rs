//! Delayed work
//!
//! Holds the one-shot timer abstraction and the simulated completion of
//! prediction runs that sits on top of it.

mod completion;
mod timer;

pub use completion::{draw_outcome, CompletionResponder, CompletionSimulator, RESULT_CEILING};
pub use timer::{OneShotTimer, TaskHandle, TaskState, TimerCallback, TokioTimer};
