//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Init logging/metrics → Watch config → Start server
//!
//! Config change:
//!     ConfigSource → debounce.rs (window + capacity-1 slot)
//!     → supervisor.rs (stop old instance → start new instance)
//!
//! Shutdown:
//!     signals.rs (SIGTERM/SIGINT) → shutdown.rs (one-shot request)
//!     → supervisor.rs (stop within deadline → Stopped)
//! ```
//!
//! # Design Decisions
//! - Exactly one restart in flight; shutdown dominates pending restarts
//! - Shutdown has timeout: forced close after deadline
//! - Every fatal condition funnels into the single shutdown request

pub mod component;
pub mod debounce;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;
pub mod supervisor;

pub use component::{ServerFactory, ServingComponent, ShutdownTimeout};
pub use debounce::{restart_slot, Debouncer, Decision, RestartRequest};
pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::SignalListener;
pub use state::SupervisorState;
pub use supervisor::{Supervisor, SupervisorError, SupervisorOptions};
