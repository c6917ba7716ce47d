//! The address book: every user the session has sighted.
//!
//! Users are keyed by case-folded nickname under the server's declared
//! casemapping. Sightings merge: a later, sparser observation never erases
//! fields an earlier one established. Channels reference users only by
//! nickname key, so this map is the single owner of user records.

use crate::casemap::CaseMapping;
use crate::prefix::Prefix;

use std::collections::HashMap;

/// A sighted user.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    /// Current nickname.
    pub nickname: String,
    /// Ident (username), if known.
    pub ident: Option<String>,
    /// Hostname, if known.
    pub host: Option<String>,
    /// Services account, if logged in and known.
    pub account: Option<String>,
    /// Real name (GECOS), if known.
    pub realname: Option<String>,
    /// Whether the user is marked away.
    pub away: bool,
}

impl User {
    /// A user known only by nickname.
    pub fn new(nickname: impl Into<String>) -> Self {
        User {
            nickname: nickname.into(),
            ident: None,
            host: None,
            account: None,
            realname: None,
            away: false,
        }
    }

    /// Build a user from a message prefix, if it is a user prefix.
    pub fn from_prefix(prefix: &Prefix) -> Option<Self> {
        match prefix {
            Prefix::Nickname(nick, user, host) if !nick.is_empty() => Some(User {
                nickname: nick.clone(),
                ident: (!user.is_empty()).then(|| user.clone()),
                host: (!host.is_empty()).then(|| host.clone()),
                account: None,
                realname: None,
                away: false,
            }),
            _ => None,
        }
    }

    /// The `nick!ident@host` mask, with unknown parts omitted.
    pub fn mask(&self) -> String {
        let mut mask = self.nickname.clone();
        if let Some(ident) = &self.ident {
            mask.push('!');
            mask.push_str(ident);
        }
        if let Some(host) = &self.host {
            mask.push('@');
            mask.push_str(host);
        }
        mask
    }

    /// Merge another sighting of the same user into this record.
    ///
    /// Fields absent on `other` leave the existing values alone.
    pub fn merge(&mut self, other: &User) {
        self.nickname.clone_from(&other.nickname);
        if other.ident.is_some() {
            self.ident.clone_from(&other.ident);
        }
        if other.host.is_some() {
            self.host.clone_from(&other.host);
        }
        if other.account.is_some() {
            self.account.clone_from(&other.account);
        }
        if other.realname.is_some() {
            self.realname.clone_from(&other.realname);
        }
    }
}

/// The session-global user map.
#[derive(Debug, Default)]
pub struct Roster {
    users: HashMap<String, User>,
    casemap: CaseMapping,
}

impl Roster {
    /// Create an empty roster with the default casemapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the casemapping (from ISUPPORT). Existing keys are not
    /// re-folded; 005 precedes sightings in any normal session.
    pub fn set_casemapping(&mut self, casemap: CaseMapping) {
        self.casemap = casemap;
    }

    /// Fold a nickname to its map key.
    pub fn fold(&self, nick: &str) -> String {
        self.casemap.fold(nick)
    }

    /// Compare two nicknames under the session casemapping.
    pub fn nick_eq(&self, a: &str, b: &str) -> bool {
        self.casemap.eq(a, b)
    }

    /// Merge-upsert a sighting and return the canonical record.
    pub fn update(&mut self, user: User) -> &User {
        let key = self.fold(&user.nickname);
        self.users
            .entry(key)
            .and_modify(|existing| existing.merge(&user))
            .or_insert(user)
    }

    /// Look up a user by nickname.
    pub fn get(&self, nick: &str) -> Option<&User> {
        self.users.get(&self.fold(nick))
    }

    /// Re-key a user under a new nickname, preserving other fields.
    ///
    /// Returns false if the old nickname was unknown.
    pub fn rename(&mut self, old: &str, new_nick: &str) -> bool {
        let old_key = self.fold(old);
        let Some(mut user) = self.users.remove(&old_key) else {
            return false;
        };
        user.nickname = new_nick.to_owned();
        self.users.insert(self.fold(new_nick), user);
        true
    }

    /// Remove a user (quit or session teardown).
    pub fn remove(&mut self, nick: &str) -> Option<User> {
        self.users.remove(&self.fold(nick))
    }

    /// Overwrite a user's ident and host (CHGHOST).
    pub fn set_hostmask(&mut self, nick: &str, ident: &str, host: &str) -> Option<&User> {
        let key = self.fold(nick);
        let user = self.users.get_mut(&key)?;
        user.ident = Some(ident.to_owned());
        user.host = Some(host.to_owned());
        Some(user)
    }

    /// Set or clear a user's account (ACCOUNT / account-tag / 900).
    pub fn set_account(&mut self, nick: &str, account: Option<&str>) -> Option<&User> {
        let key = self.fold(nick);
        let user = self.users.get_mut(&key)?;
        user.account = account.map(str::to_owned);
        Some(user)
    }

    /// Set a user's away flag.
    pub fn set_away(&mut self, nick: &str, away: bool) -> Option<&User> {
        let key = self.fold(nick);
        let user = self.users.get_mut(&key)?;
        user.away = away;
        Some(user)
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if no users are known.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Drop every record (session teardown).
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_prefix() {
        let user = User::from_prefix(&Prefix::new_from_str("nick!id@host")).unwrap();
        assert_eq!(user.nickname, "nick");
        assert_eq!(user.ident.as_deref(), Some("id"));
        assert_eq!(user.host.as_deref(), Some("host"));

        assert!(User::from_prefix(&Prefix::new_from_str("irc.example.com")).is_none());
    }

    #[test]
    fn test_mask() {
        let mut user = User::new("nick");
        assert_eq!(user.mask(), "nick");
        user.ident = Some("id".into());
        user.host = Some("host".into());
        assert_eq!(user.mask(), "nick!id@host");
    }

    #[test]
    fn test_merge_keeps_known_fields() {
        let mut roster = Roster::new();
        let mut full = User::new("alice");
        full.ident = Some("al".into());
        full.realname = Some("Alice".into());
        roster.update(full);

        // A sparser sighting (e.g. a NAMES entry) must not erase anything
        roster.update(User::new("alice"));

        let user = roster.get("alice").unwrap();
        assert_eq!(user.ident.as_deref(), Some("al"));
        assert_eq!(user.realname.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_case_folded_lookup() {
        let mut roster = Roster::new();
        roster.update(User::new("Nick[1]"));
        assert!(roster.get("nick{1}").is_some());

        roster.set_casemapping(CaseMapping::Ascii);
        let mut ascii = Roster::new();
        ascii.set_casemapping(CaseMapping::Ascii);
        ascii.update(User::new("Nick[1]"));
        assert!(ascii.get("NICK[1]").is_some());
        assert!(ascii.get("nick{1}").is_none());
    }

    #[test]
    fn test_rename_preserves_fields() {
        let mut roster = Roster::new();
        let mut user = User::new("alice");
        user.account = Some("alice_acct".into());
        roster.update(user);

        assert!(roster.rename("alice", "bob"));
        assert!(roster.get("alice").is_none());

        let renamed = roster.get("bob").unwrap();
        assert_eq!(renamed.nickname, "bob");
        assert_eq!(renamed.account.as_deref(), Some("alice_acct"));
    }

    #[test]
    fn test_rename_unknown() {
        let mut roster = Roster::new();
        assert!(!roster.rename("ghost", "other"));
    }

    #[test]
    fn test_set_hostmask_and_account() {
        let mut roster = Roster::new();
        roster.update(User::new("alice"));

        roster.set_hostmask("alice", "newid", "new.host");
        let user = roster.get("alice").unwrap();
        assert_eq!(user.ident.as_deref(), Some("newid"));
        assert_eq!(user.host.as_deref(), Some("new.host"));

        roster.set_account("alice", Some("acct"));
        assert_eq!(roster.get("alice").unwrap().account.as_deref(), Some("acct"));
        roster.set_account("alice", None);
        assert!(roster.get("alice").unwrap().account.is_none());
    }
}
