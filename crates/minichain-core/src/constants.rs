use std::time::Duration;

pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// `00004B61726C4E67`, leads every serialized header and never enters the hash.
pub const MAGIC_NUMBER: [u8; 8] = [0x00, 0x00, 0x4B, 0x61, 0x72, 0x6C, 0x4E, 0x67];
pub const MAGIC_SIZE: usize = MAGIC_NUMBER.len();
pub const HEADER_SIZE: usize = MAGIC_SIZE + 4 + HASH_SIZE + HASH_SIZE + 4;
/// Number of leading `'0'` hex digits a block hash must carry.
pub const POW_TARGET_DIFFICULTY: u32 = 4;
pub const BLOCK_CREATION_DELAY: Duration = Duration::from_secs(1);
pub const GENESIS_DATA: [&str; 3] = ["New", "Genesis", "Block"];
