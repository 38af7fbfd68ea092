//! Supervisor state machine.
//!
//! # State Transitions
//! ```text
//! Starting → Running → (RestartPending → Restarting → Running)* → ShuttingDown → Stopped
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    RestartPending,
    Restarting,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::RestartPending => "restart_pending",
            SupervisorState::Restarting => "restarting",
            SupervisorState::ShuttingDown => "shutting_down",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
