pub mod coordinator;
pub mod session;
pub mod state;

pub use coordinator::SyncCoordinator;
pub use session::{Command, SessionHandle, SyncSession};
pub use state::{format_time, segment_index_for, TransportState};
