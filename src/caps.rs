//! IRCv3 capability negotiation.
//!
//! Tracks the capabilities the server advertises, the subset the engine
//! requested, and the acknowledged set. Registration is held open until
//! every outstanding `CAP REQ` has been answered and any SASL exchange has
//! finished; the [`Client`](crate::client::Client) consults
//! [`CapNegotiator::settled`] before releasing `CAP END`.
//!
//! # Reference
//! - IRCv3 capability negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use std::collections::{HashMap, HashSet};

/// Capability names this engine understands and will request.
pub const SUPPORTED_CAPS: &[&str] = &[
    "account-notify",
    "account-tag",
    "away-notify",
    "batch",
    "cap-notify",
    "chghost",
    "echo-message",
    "extended-join",
    "invite-notify",
    "draft/metadata-2",
    "message-tags",
    "draft/metadata-notify-2",
    "draft/multiline",
    "multi-prefix",
    "sasl",
    "server-time",
    "userhost-in-names",
];

/// A capability as advertised by the server.
///
/// The optional value is a capability-specific payload, typically comma- or
/// key-value-delimited (e.g. `sasl=PLAIN,EXTERNAL`).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capability {
    /// Capability name.
    pub name: String,
    /// Optional advertised value.
    pub value: Option<String>,
}

impl Capability {
    /// Parse a `name` or `name=value` token.
    pub fn parse(token: &str) -> Self {
        match token.split_once('=') {
            Some((name, value)) => Capability {
                name: name.to_owned(),
                value: Some(value.to_owned()),
            },
            None => Capability {
                name: token.to_owned(),
                value: None,
            },
        }
    }

    /// Parse a space-separated capability list.
    pub fn parse_list(list: &str) -> Vec<Capability> {
        list.split_whitespace().map(Capability::parse).collect()
    }
}

/// Client-side CAP negotiation state.
#[derive(Debug, Default)]
pub struct CapNegotiator {
    /// Capabilities the server has advertised, with values.
    available: HashMap<String, Option<String>>,
    /// Capabilities acknowledged by the server.
    enabled: HashSet<String>,
    /// LS parts accumulated while a multi-part listing is in progress.
    ls_buffer: Vec<Capability>,
    /// Whether a multi-part LS listing is still awaiting its final part.
    ls_in_progress: bool,
    /// Whether at least one LS listing has completed.
    ls_done: bool,
    /// Number of CAP REQ lines not yet ACKed or NAKed.
    outstanding: usize,
    /// Whether CAP END has been released.
    end_sent: bool,
}

impl CapNegotiator {
    /// Create a fresh negotiator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the named capability is currently enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// The enabled capability names.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }

    /// The advertised value of a capability, if any.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.available.get(name).and_then(|v| v.as_deref())
    }

    /// Returns true when no CAP REQ is awaiting an answer and no LS
    /// listing is mid-continuation.
    pub fn settled(&self) -> bool {
        self.outstanding == 0 && !self.ls_in_progress
    }

    /// Whether a full LS listing has been received this session.
    pub fn listing_complete(&self) -> bool {
        self.ls_done
    }

    /// Whether `CAP END` was already sent.
    pub fn end_sent(&self) -> bool {
        self.end_sent
    }

    /// Record that `CAP END` went out.
    pub fn mark_end_sent(&mut self) {
        self.end_sent = true;
    }

    /// Ingest one `CAP LS` reply part.
    ///
    /// `done` is false while the server signals continuation with `*`.
    /// When the listing completes, returns the names to request: the
    /// intersection of the advertised set with [`SUPPORTED_CAPS`].
    pub fn offer(&mut self, caps: Vec<Capability>, done: bool) -> Vec<String> {
        self.ls_buffer.extend(caps);
        if !done {
            self.ls_in_progress = true;
            return Vec::new();
        }
        self.ls_in_progress = false;
        self.ls_done = true;

        let mut request = Vec::new();
        for cap in self.ls_buffer.drain(..) {
            if SUPPORTED_CAPS.contains(&cap.name.as_str()) && !self.enabled.contains(&cap.name) {
                request.push(cap.name.clone());
            }
            self.available.insert(cap.name, cap.value);
        }
        request
    }

    /// Record that one CAP REQ line went out.
    pub fn note_request_sent(&mut self) {
        self.outstanding += 1;
    }

    /// Apply a `CAP ACK`: mark each listed capability enabled (or disabled
    /// for `-name` entries) and settle one outstanding request.
    pub fn acknowledge(&mut self, caps: &[Capability]) {
        for cap in caps {
            if let Some(name) = cap.name.strip_prefix('-') {
                self.enabled.remove(name);
            } else {
                self.enabled.insert(cap.name.clone());
            }
        }
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    /// Apply a `CAP NAK`: settle one outstanding request, enabling nothing.
    pub fn reject(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    /// Apply a `CAP NEW` (cap-notify): extend the advertised set and return
    /// the supported subset to request.
    pub fn advertise_new(&mut self, caps: Vec<Capability>) -> Vec<String> {
        let mut request = Vec::new();
        for cap in caps {
            if SUPPORTED_CAPS.contains(&cap.name.as_str()) && !self.enabled.contains(&cap.name) {
                request.push(cap.name.clone());
            }
            self.available.insert(cap.name, cap.value);
        }
        request
    }

    /// Apply a `CAP DEL` (cap-notify): drop from available and enabled.
    pub fn withdraw(&mut self, caps: &[Capability]) {
        for cap in caps {
            self.available.remove(&cap.name);
            self.enabled.remove(&cap.name);
        }
    }

    /// Apply a `CAP LIST` reply: the server's authoritative enabled set.
    pub fn replace_enabled(&mut self, caps: &[Capability]) {
        self.enabled = caps.iter().map(|c| c.name.clone()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capability() {
        let cap = Capability::parse("sasl=PLAIN,EXTERNAL");
        assert_eq!(cap.name, "sasl");
        assert_eq!(cap.value.as_deref(), Some("PLAIN,EXTERNAL"));

        let cap = Capability::parse("multi-prefix");
        assert_eq!(cap.name, "multi-prefix");
        assert!(cap.value.is_none());
    }

    #[test]
    fn test_offer_intersects_with_supported() {
        let mut neg = CapNegotiator::new();
        let req = neg.offer(
            Capability::parse_list("multi-prefix sasl some-unknown-cap"),
            true,
        );
        assert_eq!(req, vec!["multi-prefix", "sasl"]);
        assert_eq!(neg.value_of("sasl"), None);
        assert!(neg.available.contains_key("some-unknown-cap"));
    }

    #[test]
    fn test_multipart_ls() {
        let mut neg = CapNegotiator::new();
        let req = neg.offer(Capability::parse_list("multi-prefix"), false);
        assert!(req.is_empty());
        // Mid-listing the negotiation is not settled, even with no REQ out
        assert!(!neg.settled());
        assert!(!neg.listing_complete());

        let req = neg.offer(Capability::parse_list("server-time"), true);
        assert_eq!(req, vec!["multi-prefix", "server-time"]);
        assert!(neg.settled());
        assert!(neg.listing_complete());
    }

    #[test]
    fn test_fresh_negotiator_has_no_listing() {
        let neg = CapNegotiator::new();
        assert!(neg.settled());
        assert!(!neg.listing_complete());
    }

    #[test]
    fn test_ack_nak_settle_requests() {
        let mut neg = CapNegotiator::new();
        neg.note_request_sent();
        neg.note_request_sent();
        assert!(!neg.settled());

        neg.acknowledge(&Capability::parse_list("multi-prefix"));
        assert!(!neg.settled());
        assert!(neg.is_enabled("multi-prefix"));

        neg.reject();
        assert!(neg.settled());
    }

    #[test]
    fn test_ack_removal() {
        let mut neg = CapNegotiator::new();
        neg.acknowledge(&Capability::parse_list("multi-prefix"));
        assert!(neg.is_enabled("multi-prefix"));
        neg.acknowledge(&Capability::parse_list("-multi-prefix"));
        assert!(!neg.is_enabled("multi-prefix"));
    }

    #[test]
    fn test_new_and_del() {
        let mut neg = CapNegotiator::new();
        let req = neg.advertise_new(Capability::parse_list("away-notify unknown-thing"));
        assert_eq!(req, vec!["away-notify"]);

        neg.acknowledge(&Capability::parse_list("away-notify"));
        neg.withdraw(&Capability::parse_list("away-notify"));
        assert!(!neg.is_enabled("away-notify"));
        assert!(!neg.available.contains_key("away-notify"));
    }

    #[test]
    fn test_list_replaces_enabled() {
        let mut neg = CapNegotiator::new();
        neg.acknowledge(&Capability::parse_list("batch sasl"));
        neg.replace_enabled(&Capability::parse_list("batch"));
        assert!(neg.is_enabled("batch"));
        assert!(!neg.is_enabled("sasl"));
    }

    #[test]
    fn test_sasl_value_retained() {
        let mut neg = CapNegotiator::new();
        neg.offer(Capability::parse_list("sasl=EXTERNAL,PLAIN"), true);
        assert_eq!(neg.value_of("sasl"), Some("EXTERNAL,PLAIN"));
    }
}
