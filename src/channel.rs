//! Channel state: topic, modes, membership.
//!
//! Memberships store nicknames (keys into the roster) plus per-channel
//! prefix flags; user records themselves live only in the
//! [`Roster`](crate::roster::Roster).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::isupport::PrefixSpec;
use crate::mode::{Mode, ModeChange};

/// A channel topic with its provenance, when known.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Topic {
    /// Topic text.
    pub text: String,
    /// Who set it (mask or nick), from TOPIC or 333.
    pub set_by: Option<String>,
    /// When it was set, from 333.
    pub set_at: Option<DateTime<Utc>>,
}

/// One member of a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Membership {
    /// The member's current nickname (roster key, unfolded).
    pub nickname: String,
    /// Prefix flags in rank order (e.g. `@+` with multi-prefix).
    pub prefixes: String,
}

/// A joined channel.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    /// Channel name as the server spelled it.
    pub name: String,
    /// Current topic, if known.
    pub topic: Option<Topic>,
    /// Channel modes currently set (argument kept where one was given).
    pub modes: Vec<Mode>,
    members: HashMap<String, Membership>,
}

impl Channel {
    /// Create an empty channel.
    pub fn new(name: impl Into<String>) -> Self {
        Channel {
            name: name.into(),
            topic: None,
            modes: Vec::new(),
            members: HashMap::new(),
        }
    }

    /// Look up a member by folded nickname key.
    pub fn member(&self, folded_nick: &str) -> Option<&Membership> {
        self.members.get(folded_nick)
    }

    /// Returns true if the folded nickname is a member.
    pub fn has_member(&self, folded_nick: &str) -> bool {
        self.members.contains_key(folded_nick)
    }

    /// Iterate over the members in no particular order.
    pub fn members(&self) -> impl Iterator<Item = &Membership> {
        self.members.values()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the membership set is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn insert_member(&mut self, folded_nick: String, membership: Membership) {
        self.members.insert(folded_nick, membership);
    }

    pub(crate) fn remove_member(&mut self, folded_nick: &str) -> Option<Membership> {
        self.members.remove(folded_nick)
    }

    pub(crate) fn rename_member(&mut self, old_folded: &str, new_folded: String, new_nick: &str) {
        if let Some(mut membership) = self.members.remove(old_folded) {
            membership.nickname = new_nick.to_owned();
            self.members.insert(new_folded, membership);
        }
    }

    /// Apply one mode change to channel state.
    ///
    /// Membership modes (per `PREFIX`) adjust the target member's prefix
    /// flags; other categories adjust the channel mode set. A/B/C modes
    /// replace any previous entry with the same letter.
    pub(crate) fn apply_mode_change(
        &mut self,
        change: &ModeChange,
        spec: &PrefixSpec,
        folded_arg: Option<&str>,
    ) {
        let mode = change.mode();

        if spec.is_prefix_mode(mode.letter) {
            let Some(prefix) = spec.prefix_for_mode(mode.letter) else {
                return;
            };
            let Some(member) = folded_arg.and_then(|k| self.members.get_mut(k)) else {
                return;
            };
            if change.is_set() {
                if !member.prefixes.contains(prefix) {
                    member.prefixes.push(prefix);
                    let mut flags: Vec<char> = member.prefixes.chars().collect();
                    flags.sort_by_key(|c| spec.rank(*c).unwrap_or(usize::MAX));
                    member.prefixes = flags.into_iter().collect();
                }
            } else {
                member.prefixes.retain(|c| c != prefix);
            }
            return;
        }

        self.modes.retain(|m| m.letter != mode.letter);
        if change.is_set() {
            self.modes.push(mode.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ModeCategory;

    fn member(channel: &mut Channel, nick: &str) {
        channel.insert_member(
            nick.to_lowercase(),
            Membership {
                nickname: nick.to_owned(),
                prefixes: String::new(),
            },
        );
    }

    #[test]
    fn test_membership_roundtrip() {
        let mut channel = Channel::new("#test");
        member(&mut channel, "Alice");
        assert!(channel.has_member("alice"));
        assert_eq!(channel.len(), 1);

        channel.rename_member("alice", "bob".into(), "Bob");
        assert!(!channel.has_member("alice"));
        assert_eq!(channel.member("bob").unwrap().nickname, "Bob");

        channel.remove_member("bob");
        assert!(channel.is_empty());
    }

    #[test]
    fn test_prefix_grant_and_revoke() {
        let spec = PrefixSpec::parse("(ov)@+").unwrap();
        let mut channel = Channel::new("#test");
        member(&mut channel, "alice");

        let grant = ModeChange::Set(Mode::with_arg(ModeCategory::B, 'v', "alice"));
        channel.apply_mode_change(&grant, &spec, Some("alice"));
        assert_eq!(channel.member("alice").unwrap().prefixes, "+");

        let grant_op = ModeChange::Set(Mode::with_arg(ModeCategory::B, 'o', "alice"));
        channel.apply_mode_change(&grant_op, &spec, Some("alice"));
        // Rank order: @ outranks +
        assert_eq!(channel.member("alice").unwrap().prefixes, "@+");

        let revoke = ModeChange::Unset(Mode::with_arg(ModeCategory::B, 'o', "alice"));
        channel.apply_mode_change(&revoke, &spec, Some("alice"));
        assert_eq!(channel.member("alice").unwrap().prefixes, "+");
    }

    #[test]
    fn test_channel_mode_set() {
        let spec = PrefixSpec::default();
        let mut channel = Channel::new("#test");

        let set_key = ModeChange::Set(Mode::with_arg(ModeCategory::B, 'k', "secret"));
        channel.apply_mode_change(&set_key, &spec, None);
        assert_eq!(channel.modes.len(), 1);
        assert_eq!(channel.modes[0].arg.as_deref(), Some("secret"));

        // Re-setting replaces the previous entry
        let new_key = ModeChange::Set(Mode::with_arg(ModeCategory::B, 'k', "other"));
        channel.apply_mode_change(&new_key, &spec, None);
        assert_eq!(channel.modes.len(), 1);
        assert_eq!(channel.modes[0].arg.as_deref(), Some("other"));

        let unset = ModeChange::Unset(Mode::with_arg(ModeCategory::B, 'k', "other"));
        channel.apply_mode_change(&unset, &spec, None);
        assert!(channel.modes.is_empty());
    }
}
