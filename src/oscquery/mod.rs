//! OSCQuery protocol pieces: discovery, tree querying, self-advertisement

pub mod advertise;
pub mod discovery;
pub mod tree;

pub use discovery::{find_service, ServiceHandle};
pub use tree::{AccessLevel, OscQueryClient, OscQueryNode, RemoteParameter};
