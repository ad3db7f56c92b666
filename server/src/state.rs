use std::sync::Arc;

use crate::config::ServerConfig;
use crate::registry::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            rooms: RoomRegistry::new(config.clone()),
            config,
        }
    }
}
