use std::sync::Arc;

use crate::palette::default_palette;

pub const DEFAULT_MAX_POINTS: usize = 5000;
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 50_000;
pub const DEFAULT_MAX_CHAT_LEN: usize = 500;

/// Limits and defaults shared by every room in the process.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub palette: Arc<[String]>,
    pub max_points: usize,
    pub max_log_entries: usize,
    pub max_chat_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            max_points: DEFAULT_MAX_POINTS,
            max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
            max_chat_len: DEFAULT_MAX_CHAT_LEN,
        }
    }
}
