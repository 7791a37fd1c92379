//! Server configuration from the environment.

use crate::room::CHANNEL_CAPACITY;
use inkroom_core::sync::Channel;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_STORAGE_URL: &str = "memory://";
pub const DEFAULT_ROOM: &str = "boards";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Channels a room accepts; frames on anything else are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSet(Vec<Channel>);

impl ChannelSet {
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Self {
        let mut set = Vec::new();
        for channel in channels {
            if !set.contains(&channel) {
                set.push(channel);
            }
        }
        Self(set)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0.contains(&channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.iter().copied()
    }

    /// Parse a comma-separated list such as `pen,story`.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let mut channels = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let channel = name
                .parse::<Channel>()
                .map_err(|e| ConfigError::invalid("INKROOM_CHANNELS", list, e))?;
            channels.push(channel);
        }
        if channels.is_empty() {
            return Err(ConfigError::invalid("INKROOM_CHANNELS", list, "no channels"));
        }
        Ok(Self::new(channels))
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::new(Channel::ALL)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub storage_url: String,
    pub channels: ChannelSet,
    /// Room served on `/ws`.
    pub default_room: String,
    /// Live frames a peer may fall behind before it is disconnected.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            storage_url: DEFAULT_STORAGE_URL.to_string(),
            channels: ChannelSet::default(),
            default_room: DEFAULT_ROOM.to_string(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("PORT", &port, e))?;
        }
        if let Some(bind) = lookup("INKROOM_BIND") {
            config.bind = bind
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("INKROOM_BIND", &bind, e))?;
        }
        if let Some(url) = lookup("INKROOM_STORAGE_URL") {
            config.storage_url = url.trim().to_string();
        }
        if let Some(list) = lookup("INKROOM_CHANNELS") {
            config.channels = ChannelSet::parse(&list)?;
        }
        if let Some(room) = lookup("INKROOM_DEFAULT_ROOM") {
            let room = room.trim();
            if room.is_empty() {
                return Err(ConfigError::invalid("INKROOM_DEFAULT_ROOM", room, "empty"));
            }
            config.default_room = room.to_string();
        }
        if let Some(capacity) = lookup("INKROOM_CHANNEL_CAPACITY") {
            config.channel_capacity = capacity
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("INKROOM_CHANNEL_CAPACITY", &capacity, e))?;
            if config.channel_capacity == 0 {
                return Err(ConfigError::invalid("INKROOM_CHANNEL_CAPACITY", &capacity, "zero"));
            }
        }

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.storage_url, "memory://");
        assert_eq!(config.default_room, "boards");
        assert_eq!(config.channel_capacity, 256);
        assert!(config.channels.contains(Channel::Pen));
        assert!(config.channels.contains(Channel::Update));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("INKROOM_BIND", "127.0.0.1"),
            ("INKROOM_STORAGE_URL", "file:///var/lib/inkroom"),
            ("INKROOM_CHANNELS", "pen, story"),
            ("INKROOM_DEFAULT_ROOM", "lobby"),
            ("INKROOM_CHANNEL_CAPACITY", "64"),
        ]))
        .unwrap();
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.storage_url, "file:///var/lib/inkroom");
        assert_eq!(config.default_room, "lobby");
        assert!(!config.channels.contains(Channel::Update));
        assert_eq!(config.channels.iter().count(), 2);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("INKROOM_BIND", "localhost:1")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("INKROOM_CHANNELS", "pen,chat")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("INKROOM_CHANNELS", " , ")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("INKROOM_DEFAULT_ROOM", "  ")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("INKROOM_CHANNEL_CAPACITY", "0")])).is_err());
    }

    #[test]
    fn test_channel_set_dedupes() {
        let set = ChannelSet::parse("pen,pen,story").unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Channel::Pen, Channel::Story]);
    }
}
