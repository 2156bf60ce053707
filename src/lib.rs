//! A stopwatch that keeps exact time while running in the background, and
//! the decorative progress ring shown around it.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod hooks;
pub mod progress;
pub mod render;
pub mod session;
pub mod status;
pub mod stopwatch;
pub mod task;
pub mod time;

pub use config::Config;
pub use progress::ProgressClock;
pub use session::Session;
pub use stopwatch::Stopwatch;

/// Lifecycle of the stopwatch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Reset,
    Paused,
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Reset => f.write_str("Reset"),
            RunState::Paused => f.write_str("Paused"),
            RunState::Running => f.write_str("Running"),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::RunState;

    #[test]
    fn run_state_starts_reset() {
        assert_eq!(RunState::default(), RunState::Reset);
    }

    #[test]
    fn run_state_to_json() {
        assert_eq!(serde_json::to_string(&RunState::Running).unwrap(), "\"Running\"");
    }
}
