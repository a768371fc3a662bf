//! Session worker internals.
//!
//! - [`context`] defines captured shared thread state.
//! - [`guard`] tracks session-thread liveness.
//! - [`runner`] executes the queue, track and frame loops.

mod context;
mod guard;
mod runner;

pub(in crate::playback::player::runtime) use context::SessionContext;
pub(in crate::playback::player::runtime) use guard::SessionThreadGuard;
pub(in crate::playback::player::runtime) use runner::run_session;
