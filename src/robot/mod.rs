//! Posting robot.
//!
//! A [`RunRegistry`] holds at most one active run. Each run drives a browser
//! session through [`RunDriver`], reporting progress on an [`EventHub`] that
//! the HTTP layer streams to viewers.

mod driver;
mod error;
mod events;
mod registry;
mod viewer;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{RunDriver, RunOutcome, RunPhase};
pub use error::{RobotError, RobotResult};
pub use events::{EventHub, EventLevel, ProgressEvent};
pub use registry::{RunRegistry, RunStatus};
pub use viewer::render_viewer;
