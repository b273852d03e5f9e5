//! Node-to-node synchronization for a minichain network: the wire protocol,
//! the client role used by miners and normal nodes, and the server role every
//! node runs.

pub mod client;
pub mod config;
pub mod constants;
pub mod node;
pub mod protocol;
pub mod server;

pub use client::{Submission, SyncClient};
pub use config::{NodeConfig, NodeRole};
pub use node::Node;
pub use protocol::{Command, Request, SubmitStatus};
pub use server::SyncServer;
