// Public API
pub use handlers::{get_media_root, media_stream, resolve_media, set_media_root};
pub use types::{MediaRootRequest, MediaRootResponse, ResolveRequest, ResolveResponse};

// Internal modules
pub mod broker;
mod handlers;
mod types;
