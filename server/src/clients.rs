use std::collections::HashMap;

use doodly_shared::Client;

use crate::palette::ColorAllocator;

pub const MAX_NAME_LEN: usize = 32;

/// Who is in a room. Owned by exactly one room.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: HashMap<String, Client>,
    colors: ColorAllocator,
}

impl ClientRegistry {
    pub fn new(colors: ColorAllocator) -> Self {
        Self {
            clients: HashMap::new(),
            colors,
        }
    }

    /// Registers a connection. Adding an id that is already present replaces
    /// the previous entry and assigns a fresh color.
    pub fn add(&mut self, connection_id: &str, requested_name: Option<&str>) -> Client {
        let name = requested_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.chars().take(MAX_NAME_LEN).collect::<String>())
            .unwrap_or_else(|| default_name(connection_id));
        let client = Client {
            id: connection_id.to_string(),
            name,
            color: self.colors.next_color(),
        };
        self.clients
            .insert(connection_id.to_string(), client.clone());
        client
    }

    pub fn remove(&mut self, connection_id: &str) -> Option<Client> {
        self.clients.remove(connection_id)
    }

    pub fn get(&self, connection_id: &str) -> Option<&Client> {
        self.clients.get(connection_id)
    }

    /// Snapshot ordered by name, then id, so repeated listings are stable.
    pub fn list(&self) -> Vec<Client> {
        let mut clients = self.clients.values().cloned().collect::<Vec<_>>();
        clients.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn default_name(connection_id: &str) -> String {
    let short = connection_id.chars().take(4).collect::<String>();
    format!("User-{short}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::parse_palette;

    fn registry() -> ClientRegistry {
        ClientRegistry::new(ColorAllocator::new(parse_palette("red,green")))
    }

    #[test]
    fn blank_names_get_a_placeholder() {
        let mut clients = registry();
        let client = clients.add("abcdef12", Some("   "));
        assert_eq!(client.name, "User-abcd");
        let client = clients.add("0123", None);
        assert_eq!(client.name, "User-0123");
    }

    #[test]
    fn colors_follow_join_order() {
        let mut clients = registry();
        assert_eq!(clients.add("a", Some("Ann")).color, "red");
        assert_eq!(clients.add("b", Some("Bob")).color, "green");
        assert_eq!(clients.add("c", Some("Cat")).color, "red");
        assert_eq!(clients.len(), 3);
    }

    #[test]
    fn remove_and_list() {
        let mut clients = registry();
        clients.add("b", Some("Bob"));
        clients.add("a", Some("Ann"));
        let names = clients
            .list()
            .into_iter()
            .map(|client| client.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Ann", "Bob"]);

        assert_eq!(clients.remove("a").map(|c| c.name), Some("Ann".to_string()));
        assert!(clients.remove("a").is_none());
        assert!(clients.get("b").is_some());
        clients.remove("b");
        assert!(clients.is_empty());
    }

    #[test]
    fn long_names_are_truncated() {
        let mut clients = registry();
        let client = clients.add("a", Some(&"x".repeat(100)));
        assert_eq!(client.name.len(), MAX_NAME_LEN);
    }
}
