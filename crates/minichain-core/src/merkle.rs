use crate::{sha256, Hash};

/// A node of the Merkle tree. Leaves carry the record itself as payload,
/// parents carry `left.hash ‖ right.hash`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleNode {
    pub payload: Vec<u8>,
    pub hash: Hash,
}

impl MerkleNode {
    pub fn leaf(record: &[u8]) -> Self {
        Self {
            payload: record.to_vec(),
            hash: sha256(record),
        }
    }

    pub fn parent(left: &MerkleNode, right: &MerkleNode) -> Self {
        let mut payload = Vec::with_capacity(left.hash.len() + right.hash.len());
        payload.extend_from_slice(&left.hash);
        payload.extend_from_slice(&right.hash);
        let hash = sha256(&payload);
        Self { payload, hash }
    }
}

/// Every level of the tree, leaves first, root last.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    levels: Vec<Vec<MerkleNode>>,
    root: MerkleNode,
}

impl MerkleTree {
    /// Builds the tree bottom-up. An odd level duplicates its last node
    /// before pairing. No records yield a single empty leaf whose hash is
    /// SHA-256 of the empty string.
    pub fn build<R: AsRef<[u8]>>(records: &[R]) -> Self {
        let mut level: Vec<MerkleNode> = records.iter().map(|r| MerkleNode::leaf(r.as_ref())).collect();
        if level.is_empty() {
            level.push(MerkleNode::leaf(&[]));
        }

        let mut levels = vec![level.clone()];
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                if let Some(last) = level.last().cloned() {
                    level.push(last);
                }
            }
            level = level
                .chunks(2)
                .map(|pair| MerkleNode::parent(&pair[0], &pair[1]))
                .collect();
            levels.push(level.clone());
        }

        let root = level.swap_remove(0);
        Self { levels, root }
    }

    pub fn root(&self) -> &MerkleNode {
        &self.root
    }

    pub fn levels(&self) -> &[Vec<MerkleNode>] {
        &self.levels
    }

    pub fn leaves(&self) -> &[MerkleNode] {
        &self.levels[0]
    }
}

pub fn build_root<R: AsRef<[u8]>>(records: &[R]) -> MerkleNode {
    MerkleTree::build(records).root
}

pub fn merkle_root<R: AsRef<[u8]>>(records: &[R]) -> Hash {
    build_root(records).hash
}
