pub mod assertions;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{host_update, parse, MessageAssertion};
#[allow(unused_imports)]
pub use mocks::{mock_socket, MockPeer, MockSocket};
#[allow(unused_imports)]
pub use setup::{wait_until, TestClient, TestSetup, TestSetupBuilder, PASSWORD};
