use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One advertised backend
///
/// Field order here is the field order clients see in the JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: u32,
    pub name: String,
    pub game_server_ip: String,
    pub tunnel_server_ip: String,
    pub tunnel_port: u16,
    pub download_url: String,
}

/// Immutable, ordered roster of advertised servers
///
/// Built once at startup and shared read-only across workers. Insertion
/// order is preserved and is part of the observable response.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<ServerEntry>,
}

impl Registry {
    /// Validate and freeze the roster
    ///
    /// Fails fast on malformed input so the process never serves partial
    /// or corrupt data: duplicate or zero ids, empty names or addresses,
    /// and zero ports are all rejected.
    pub fn new(entries: Vec<ServerEntry>) -> Result<Self> {
        let mut seen = HashSet::new();

        for entry in &entries {
            if entry.id == 0 {
                return Err(Error::Registry(format!(
                    "server '{}' has id 0, ids must be positive",
                    entry.name
                )));
            }
            if !seen.insert(entry.id) {
                return Err(Error::Registry(format!("duplicate server id {}", entry.id)));
            }
            if entry.name.is_empty() {
                return Err(Error::Registry(format!("server {} has an empty name", entry.id)));
            }
            if entry.game_server_ip.is_empty() {
                return Err(Error::Registry(format!(
                    "server {} has an empty game_server_ip",
                    entry.id
                )));
            }
            if entry.tunnel_server_ip.is_empty() {
                return Err(Error::Registry(format!(
                    "server {} has an empty tunnel_server_ip",
                    entry.id
                )));
            }
            if entry.tunnel_port == 0 {
                return Err(Error::Registry(format!("server {} has tunnel_port 0", entry.id)));
            }
            if entry.download_url.is_empty() {
                return Err(Error::Registry(format!(
                    "server {} has an empty download_url",
                    entry.id
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Read-only view of the ordered roster
    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, name: &str, tunnel_port: u16) -> ServerEntry {
        ServerEntry {
            id,
            name: name.to_string(),
            game_server_ip: "10.0.0.1".to_string(),
            tunnel_server_ip: "10.0.0.2".to_string(),
            tunnel_port,
            download_url: "http://x/a".to_string(),
        }
    }

    #[test]
    fn preserves_insertion_order() {
        let registry = Registry::new(vec![
            entry(3, "C", 1000),
            entry(1, "A", 1001),
            entry(2, "B", 1002),
        ])
        .unwrap();

        let ids: Vec<u32> = registry.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn empty_roster_is_allowed() {
        let registry = Registry::new(Vec::new()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_id_rejected() {
        let err = Registry::new(vec![entry(1, "A", 1000), entry(1, "B", 1001)]).unwrap_err();
        assert!(matches!(err, Error::Registry(_)));
    }

    #[test]
    fn zero_id_rejected() {
        assert!(Registry::new(vec![entry(0, "A", 1000)]).is_err());
    }

    #[test]
    fn empty_name_rejected() {
        assert!(Registry::new(vec![entry(1, "", 1000)]).is_err());
    }

    #[test]
    fn zero_port_rejected() {
        assert!(Registry::new(vec![entry(1, "A", 0)]).is_err());
    }
}
