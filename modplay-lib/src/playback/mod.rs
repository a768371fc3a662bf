//! Playback orchestration: session loop, queue, watchdog, events and
//! interruption handling.

pub mod broadcast;
pub mod events;
pub mod interrupt;
pub mod player;
pub mod queue;
pub(crate) mod state;
pub mod watchdog;
