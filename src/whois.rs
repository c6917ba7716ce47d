//! WHOIS reply aggregation.
//!
//! A WHOIS query fans out over roughly ten numerics; the aggregator
//! collects them into one composite reply per nickname and releases it
//! only on the end-of-WHOIS numeric (318).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// The composite result of one WHOIS query.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhoisResponse {
    /// The queried nickname.
    pub nickname: String,
    /// Ident (311).
    pub username: Option<String>,
    /// Hostname (311).
    pub hostname: Option<String>,
    /// Real name (311).
    pub realname: Option<String>,
    /// Whether the user is an IRC operator (313).
    pub is_oper: bool,
    /// Whether the connection is TLS (671).
    pub is_secure: bool,
    /// Whether the nick is registered with services (307).
    pub is_registered: bool,
    /// Services account (330).
    pub account: Option<String>,
    /// Server the user is connected to (312).
    pub connected_to: Option<String>,
    /// Signon time (317).
    pub connected_time: Option<DateTime<Utc>>,
    /// Idle duration (317).
    pub idle: Option<Duration>,
    /// The host the user is connecting from (378).
    pub connecting_from: Option<String>,
    /// Channel memberships with prefix strings (319).
    pub channels: HashMap<String, String>,
}

impl WhoisResponse {
    fn new(nickname: &str) -> Self {
        WhoisResponse {
            nickname: nickname.to_owned(),
            ..Default::default()
        }
    }
}

/// In-flight WHOIS accumulators, at most one per nickname.
#[derive(Debug, Default)]
pub struct WhoisTable {
    pending: HashMap<String, WhoisResponse>,
}

impl WhoisTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulator for a nickname, created on first use.
    pub fn entry(&mut self, folded_nick: &str, nickname: &str) -> &mut WhoisResponse {
        self.pending
            .entry(folded_nick.to_owned())
            .or_insert_with(|| WhoisResponse::new(nickname))
    }

    /// Take the finished accumulator on end-of-WHOIS.
    ///
    /// Returns `None` if no numerics for this nickname preceded the 318.
    pub fn finish(&mut self, folded_nick: &str) -> Option<WhoisResponse> {
        self.pending.remove(folded_nick)
    }

    /// Drop everything (session teardown).
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
