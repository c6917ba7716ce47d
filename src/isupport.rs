//! ISUPPORT (RPL_ISUPPORT / 005) accumulation and parsing.
//!
//! Servers parameterize clients through `KEY` / `KEY=VALUE` tokens spread
//! over one or more 005 lines. The store accumulates them for the lifetime
//! of the session and exposes parsed accessors for the tokens the engine
//! acts on.
//!
//! # Reference
//! - Modern IRC documentation: <https://modern.ircdocs.horse/isupport.html>

use std::collections::HashMap;

use crate::casemap::CaseMapping;
use crate::mode::{ModeCategories, ModeCategory};

/// Default `PREFIX` when the server has not advertised one.
const DEFAULT_PREFIX: &str = "(ov)@+";
/// Default `CHANMODES` when the server has not advertised one.
const DEFAULT_CHANMODES: &str = "beI,k,l,imnpst";
/// Default `CHANTYPES`.
const DEFAULT_CHANTYPES: &str = "#";

/// Parsed `PREFIX` token.
///
/// Maps channel membership modes (like `o`, `v`) to their prefix symbols
/// (`@`, `+`), preserving rank order (highest first).
///
/// # Example
///
/// ```
/// use slirc_engine::isupport::PrefixSpec;
///
/// let spec = PrefixSpec::parse("(qaohv)~&@%+").unwrap();
/// assert_eq!(spec.prefix_for_mode('o'), Some('@'));
/// assert_eq!(spec.mode_for_prefix('+'), Some('v'));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrefixSpec {
    /// Mode characters in rank order (e.g., `ov`).
    pub modes: String,
    /// Prefix symbols in the same order (e.g., `@+`).
    pub prefixes: String,
}

impl PrefixSpec {
    /// Parse a `PREFIX` value like `(ov)@+`.
    pub fn parse(s: &str) -> Option<Self> {
        let open = s.find('(')?;
        let close = s.find(')')?;
        if close <= open + 1 {
            return None;
        }
        let modes = &s[open + 1..close];
        let prefixes = &s[close + 1..];
        if modes.len() != prefixes.len() || prefixes.is_empty() {
            return None;
        }
        Some(PrefixSpec {
            modes: modes.to_owned(),
            prefixes: prefixes.to_owned(),
        })
    }

    /// Returns true if the character is a membership mode on this server.
    #[inline]
    pub fn is_prefix_mode(&self, mode: char) -> bool {
        self.modes.contains(mode)
    }

    /// Returns true if the character is a membership prefix symbol.
    #[inline]
    pub fn is_prefix_char(&self, c: char) -> bool {
        self.prefixes.contains(c)
    }

    /// Returns the prefix symbol for a mode character.
    #[inline]
    pub fn prefix_for_mode(&self, mode: char) -> Option<char> {
        self.modes
            .chars()
            .position(|c| c == mode)
            .and_then(|i| self.prefixes.chars().nth(i))
    }

    /// Returns the mode character for a prefix symbol.
    #[inline]
    pub fn mode_for_prefix(&self, prefix: char) -> Option<char> {
        self.prefixes
            .chars()
            .position(|c| c == prefix)
            .and_then(|i| self.modes.chars().nth(i))
    }

    /// Rank of a prefix symbol; lower is more privileged.
    pub fn rank(&self, prefix: char) -> Option<usize> {
        self.prefixes.chars().position(|c| c == prefix)
    }
}

impl Default for PrefixSpec {
    fn default() -> Self {
        Self::parse(DEFAULT_PREFIX).expect("default PREFIX is well-formed")
    }
}

/// Accumulated server parameters from 005 lines.
#[derive(Clone, Debug, Default)]
pub struct Isupport {
    entries: HashMap<String, Option<String>>,
}

impl Isupport {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the argument list of one 005 line.
    ///
    /// The first argument (the client's nick) and the trailing
    /// "are supported by this server" text are skipped. A `-KEY` token
    /// negates a previously advertised key.
    pub fn extend_from_args(&mut self, args: &[String]) {
        let Some(tokens) = args.get(1..) else {
            return;
        };
        for token in tokens {
            if token.contains(' ') || token.is_empty() {
                continue;
            }
            if let Some(negated) = token.strip_prefix('-') {
                self.entries.remove(&negated.to_ascii_uppercase());
                continue;
            }
            let (key, value) = match token.find('=') {
                Some(eq) => (&token[..eq], Some(token[eq + 1..].to_owned())),
                None => (token.as_str(), None),
            };
            self.entries.insert(key.to_ascii_uppercase(), value);
        }
    }

    /// Get the value for a key.
    ///
    /// `Some(Some(value))` for `KEY=VALUE`, `Some(None)` for a bare `KEY`,
    /// `None` if the key was never advertised.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .get(&key.to_ascii_uppercase())
            .map(|v| v.as_deref())
    }

    /// Returns true if the key was advertised at all.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_uppercase())
    }

    /// The declared case mapping (default `rfc1459`).
    pub fn casemapping(&self) -> CaseMapping {
        self.get("CASEMAPPING")
            .flatten()
            .map(CaseMapping::from_token)
            .unwrap_or_default()
    }

    /// Channel type sigils (default `#`).
    pub fn chantypes(&self) -> &str {
        self.get("CHANTYPES").flatten().unwrap_or(DEFAULT_CHANTYPES)
    }

    /// Prefixes usable as message-target qualifiers (default none).
    pub fn statusmsg(&self) -> &str {
        self.get("STATUSMSG").flatten().unwrap_or("")
    }

    /// Parsed `PREFIX` token (default `(ov)@+`).
    pub fn prefix(&self) -> PrefixSpec {
        self.get("PREFIX")
            .flatten()
            .and_then(PrefixSpec::parse)
            .unwrap_or_default()
    }

    /// Channel mode categories from `CHANMODES`, with `PREFIX` membership
    /// modes merged in as category B (they consume a nick argument in both
    /// directions).
    pub fn chan_mode_categories(&self) -> ModeCategories {
        let spec = self.get("CHANMODES").flatten().unwrap_or(DEFAULT_CHANMODES);
        let mut map = ModeCategories::new();
        let categories = [
            ModeCategory::A,
            ModeCategory::B,
            ModeCategory::C,
            ModeCategory::D,
        ];
        for (letters, category) in spec.split(',').zip(categories) {
            for c in letters.chars() {
                map.insert(c, category);
            }
        }
        for c in self.prefix().modes.chars() {
            map.insert(c, ModeCategory::B);
        }
        map
    }

    /// Returns true if the target string names a channel.
    pub fn is_channel_name(&self, target: &str) -> bool {
        target
            .chars()
            .next()
            .is_some_and(|c| self.chantypes().contains(c))
    }

    fn numeric_limit(&self, key: &str) -> Option<usize> {
        self.get(key).flatten().and_then(|v| v.parse().ok())
    }

    /// Maximum KICK reason length, if declared.
    pub fn kicklen(&self) -> Option<usize> {
        self.numeric_limit("KICKLEN")
    }

    /// Maximum nickname length, if declared.
    pub fn nicklen(&self) -> Option<usize> {
        self.numeric_limit("NICKLEN")
    }

    /// Maximum channel name length, if declared.
    pub fn channellen(&self) -> Option<usize> {
        self.numeric_limit("CHANNELLEN")
    }

    /// Maximum topic length, if declared.
    pub fn topiclen(&self) -> Option<usize> {
        self.numeric_limit("TOPICLEN")
    }

    /// Maximum away message length, if declared.
    pub fn awaylen(&self) -> Option<usize> {
        self.numeric_limit("AWAYLEN")
    }

    /// Whether the server supports WHOX queries.
    pub fn has_whox(&self) -> bool {
        self.has("WHOX")
    }

    /// Whether the server advertises legacy NAMESX.
    pub fn has_namesx(&self) -> bool {
        self.has("NAMESX")
    }

    /// Whether the server advertises legacy UHNAMES.
    pub fn has_uhnames(&self) -> bool {
        self.has("UHNAMES")
    }
}
