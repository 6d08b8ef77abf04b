// Public API - what other modules can use
pub use cleanup_task::{run_sweep, start_cleanup_task, CleanupConfig, SweepReport};
pub use handlers::join_room;
pub use models::{Role, Room, RoomState};
pub use store::RoomStore;

// Internal modules
pub mod cleanup_task;
mod handlers;
pub mod models;
pub mod store;
mod types;

pub use types::{JoinRequest, JoinResponse};
