use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use doodly_shared::ServerMessage;
use tokio::sync::{broadcast, mpsc, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::room::Room;

pub type PeerSender = mpsc::UnboundedSender<ServerMessage>;
pub type RoomHandle = Arc<RwLock<RoomSession>>;
pub type RoomGuard = OwnedRwLockWriteGuard<RoomSession>;

const ROOM_LIST_CAPACITY: usize = 16;

/// A room together with the outbound channels of its connected peers.
pub struct RoomSession {
    pub room: Room,
    peers: HashMap<String, PeerSender>,
    closed: bool,
}

impl RoomSession {
    fn new(room: Room) -> Self {
        Self {
            room,
            peers: HashMap::new(),
            closed: false,
        }
    }

    pub fn add_peer(&mut self, connection_id: &str, sender: PeerSender) {
        self.peers.insert(connection_id.to_string(), sender);
    }

    pub fn remove_peer(&mut self, connection_id: &str) {
        self.peers.remove(connection_id);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn broadcast_all(&mut self, message: ServerMessage) {
        self.broadcast(None, message);
    }

    pub fn broadcast_except(&mut self, sender: &str, message: ServerMessage) {
        self.broadcast(Some(sender), message);
    }

    pub fn send_to(&mut self, connection_id: &str, message: ServerMessage) {
        let stale = match self.peers.get(connection_id) {
            Some(tx) => tx.send(message).is_err(),
            None => false,
        };
        if stale {
            self.drop_peer(connection_id);
        }
    }

    // Channel sends never wait on the socket, so delivery order matches the
    // order in which the lock holder broadcasts.
    fn broadcast(&mut self, except: Option<&str>, message: ServerMessage) {
        let mut stale = Vec::new();
        for (id, tx) in self.peers.iter() {
            if Some(id.as_str()) == except {
                continue;
            }
            if tx.send(message.clone()).is_err() {
                stale.push(id.clone());
            }
        }
        for id in stale {
            self.drop_peer(&id);
        }
    }

    fn drop_peer(&mut self, connection_id: &str) {
        self.peers.remove(connection_id);
        debug!(room = self.room.id(), conn = connection_id, "dropped stale peer");
    }
}

/// All live rooms of one server. Rooms are created on first join and
/// reclaimed as soon as their last member leaves.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
    config: Arc<ServerConfig>,
    room_list: broadcast::Sender<Vec<String>>,
}

impl RoomRegistry {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let (room_list, _) = broadcast::channel(ROOM_LIST_CAPACITY);
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config,
            room_list,
        }
    }

    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn get_or_create(&self, room_id: &str) -> RoomHandle {
        if let Some(room) = self.get(room_id).await {
            return room;
        }
        let mut rooms = self.rooms.write().await;
        match rooms.entry(room_id.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let room = Arc::new(RwLock::new(RoomSession::new(Room::new(
                    room_id,
                    self.config.clone(),
                ))));
                entry.insert(room.clone());
                info!(room = room_id, rooms = rooms.len(), "room created");
                self.publish(&rooms);
                room
            }
        }
    }

    /// Locks a room that is still open for members, creating it if needed.
    ///
    /// A room closes inside its own lock when its last member leaves, so a
    /// joiner that raced with that leave sees the flag, discards the dead
    /// handle and retries against a fresh room.
    pub async fn lock_open(&self, room_id: &str) -> (RoomHandle, RoomGuard) {
        loop {
            let handle = self.get_or_create(room_id).await;
            let guard = handle.clone().write_owned().await;
            if !guard.closed {
                return (handle, guard);
            }
            drop(guard);
            self.remove(room_id, &handle).await;
        }
    }

    /// Closes the room if nobody is left in it and drops it from the
    /// registry. Returns whether the room was reclaimed.
    pub async fn release(&self, handle: &RoomHandle, mut guard: RoomGuard) -> bool {
        if !guard.room.is_empty() {
            return false;
        }
        guard.closed = true;
        let room_id = guard.room.id().to_string();
        drop(guard);
        self.remove(&room_id, handle).await;
        true
    }

    /// Removes `handle` from the registry if it is still the room registered
    /// under `room_id` and has been closed.
    pub async fn remove(&self, room_id: &str, handle: &RoomHandle) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(current) = rooms.get(room_id) else {
            return false;
        };
        if !Arc::ptr_eq(current, handle) {
            return false;
        }
        if !handle.read().await.closed {
            return false;
        }
        rooms.remove(room_id);
        info!(room = room_id, rooms = rooms.len(), "room reclaimed");
        self.publish(&rooms);
        true
    }

    pub async fn list(&self) -> Vec<String> {
        sorted_ids(&*self.rooms.read().await)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<String>> {
        self.room_list.subscribe()
    }

    fn publish(&self, rooms: &HashMap<String, RoomHandle>) {
        // No subscribers is fine; nobody is connected.
        let _ = self.room_list.send(sorted_ids(rooms));
    }
}

fn sorted_ids(rooms: &HashMap<String, RoomHandle>) -> Vec<String> {
    let mut ids = rooms.keys().cloned().collect::<Vec<_>>();
    ids.sort();
    ids
}
