//! Internal runtime plumbing for the `ModPlayer` session thread.
//!
//! - [`thread`] handles thread bootstrap and shared state capture.
//! - [`worker`] runs the per-track and per-frame decode loop.

mod thread;
mod worker;
