use std::net::SocketAddr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRole {
    /// Trusted authority; never contacts a peer to load its chain.
    Full,
    /// Trusts the full node's headers and falls back to it for lookups.
    Normal,
}

#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub node_id: String,
    pub role: NodeRole,
    pub listen: SocketAddr,
    pub full_node: SocketAddr,
    /// Re-check proof of work and linkage of headers pulled from the full node.
    pub strict_sync: bool,
}

impl NodeConfig {
    pub fn full(node_id: impl Into<String>, listen: SocketAddr) -> Self {
        Self {
            node_id: node_id.into(),
            role: NodeRole::Full,
            listen,
            full_node: listen,
            strict_sync: false,
        }
    }

    /// A node whose full node is its own listen address is the full node;
    /// syncing from itself would wait on its own chain lock forever.
    pub fn normal(node_id: impl Into<String>, listen: SocketAddr, full_node: SocketAddr) -> Self {
        let role = if same_endpoint(listen, full_node) {
            NodeRole::Full
        } else {
            NodeRole::Normal
        };
        Self {
            node_id: node_id.into(),
            role,
            listen,
            full_node,
            strict_sync: false,
        }
    }

    pub fn with_strict_sync(mut self, strict: bool) -> Self {
        self.strict_sync = strict;
        self
    }

    pub fn is_full_node(&self) -> bool {
        self.role == NodeRole::Full
    }
}

/// `listen` on an unspecified address also answers on any concrete one.
fn same_endpoint(listen: SocketAddr, peer: SocketAddr) -> bool {
    listen.port() == peer.port() && (listen.ip() == peer.ip() || listen.ip().is_unspecified())
}
