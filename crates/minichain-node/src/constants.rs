pub const DEFAULT_FULL_NODE_ADDR: &str = "127.0.0.1:9999";
pub const COMMAND_LEN: usize = 5;
/// Largest frame body either side accepts. This also bounds a `getBC`
/// reply: past it the serving node answers with an empty chain, so normal
/// nodes stop gaining headers from it.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
pub(crate) const STATUS_SUCCESS: &str = "Success";
pub(crate) const STATUS_FAIL: &str = "Fail";
