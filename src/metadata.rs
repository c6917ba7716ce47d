//! METADATA draft-2 key-value state.
//!
//! Two maps keyed by target (users and channels), a local subscription set,
//! and the server-declared limits carried in the `draft/metadata-2`
//! capability value (`maxsub=`, `maxkey=`; absent means unbounded).
//!
//! # Reference
//! - Metadata draft: <https://ircv3.net/specs/extensions/metadata>

use std::collections::{BTreeSet, HashMap};

/// A stored metadata value with its visibility.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetadataValue {
    /// Visibility token as sent by the server (`*` for public).
    pub visibility: String,
    /// The value.
    pub value: String,
}

/// Per-session metadata state.
#[derive(Debug, Default)]
pub struct MetadataStore {
    users: HashMap<String, HashMap<String, MetadataValue>>,
    channels: HashMap<String, HashMap<String, MetadataValue>>,
    subscriptions: BTreeSet<String>,
    max_subscriptions: Option<usize>,
    max_keys: Option<usize>,
}

impl MetadataStore {
    /// Create an empty store with unbounded limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `draft/metadata-2` capability value.
    ///
    /// The value is a comma list of `key` or `key=value` tokens; `maxsub`
    /// and `maxkey` set the server-declared limits.
    pub fn configure_from_cap(&mut self, value: &str) {
        for token in value.split(',') {
            match token.split_once('=') {
                Some(("maxsub", n)) => self.max_subscriptions = n.parse().ok(),
                Some(("maxkey", n)) => self.max_keys = n.parse().ok(),
                _ => {}
            }
        }
    }

    /// Server-declared subscription limit, if any.
    pub fn max_subscriptions(&self) -> Option<usize> {
        self.max_subscriptions
    }

    /// Server-declared per-target key limit, if any.
    pub fn max_keys(&self) -> Option<usize> {
        self.max_keys
    }

    /// Set a key on a user target.
    pub fn set_user(&mut self, folded_nick: &str, key: &str, value: MetadataValue) {
        self.users
            .entry(folded_nick.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
    }

    /// Delete a key from a user target.
    pub fn delete_user(&mut self, folded_nick: &str, key: &str) {
        if let Some(map) = self.users.get_mut(folded_nick) {
            map.remove(key);
            if map.is_empty() {
                self.users.remove(folded_nick);
            }
        }
    }

    /// Look up a user metadata value.
    pub fn user_value(&self, folded_nick: &str, key: &str) -> Option<&MetadataValue> {
        self.users.get(folded_nick)?.get(key)
    }

    /// Set a key on a channel target.
    pub fn set_channel(&mut self, folded_channel: &str, key: &str, value: MetadataValue) {
        self.channels
            .entry(folded_channel.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
    }

    /// Delete a key from a channel target.
    pub fn delete_channel(&mut self, folded_channel: &str, key: &str) {
        if let Some(map) = self.channels.get_mut(folded_channel) {
            map.remove(key);
            if map.is_empty() {
                self.channels.remove(folded_channel);
            }
        }
    }

    /// Look up a channel metadata value.
    pub fn channel_value(&self, folded_channel: &str, key: &str) -> Option<&MetadataValue> {
        self.channels.get(folded_channel)?.get(key)
    }

    /// Record keys the server confirmed subscribed (770).
    pub fn subscribe<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        self.subscriptions.extend(keys.into_iter().map(str::to_owned));
    }

    /// Record keys the server confirmed unsubscribed (771).
    pub fn unsubscribe<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.subscriptions.remove(key);
        }
    }

    /// The current subscription set, sorted.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Whether a key is currently subscribed.
    pub fn is_subscribed(&self, key: &str) -> bool {
        self.subscriptions.contains(key)
    }

    /// Drop all state (session teardown).
    pub fn clear(&mut self) {
        self.users.clear();
        self.channels.clear();
        self.subscriptions.clear();
    }
}
