use std::borrow::Cow;

use crate::prefix::Prefix;

/// An owned, parsed IRC message.
///
/// Holds the complete representation of one protocol line: optional IRCv3
/// tags, optional prefix/source, the verb (command word or three-digit
/// numeric), its arguments, and the raw line it was parsed from.
///
/// # Example
///
/// ```
/// use slirc_engine::Message;
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
/// assert_eq!(msg.verb, "PRIVMSG");
/// assert_eq!(msg.args, vec!["#channel", "Hello!"]);
/// ```
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// IRCv3 message tags, decoded. A tag without `=` has an empty value.
    pub tags: Vec<Tag>,
    /// Message prefix/source (e.g., `nick!user@host`).
    pub prefix: Option<Prefix>,
    /// The command word or three-digit numeric, as received.
    pub verb: String,
    /// Positional arguments including the trailing parameter.
    pub args: Vec<String>,
    /// The raw line this message was parsed from (empty for constructed
    /// messages).
    pub raw: String,
}

impl Message {
    /// Construct a message from a verb and arguments, without tags or prefix.
    pub fn new(verb: impl Into<String>, args: Vec<String>) -> Self {
        Message {
            tags: Vec::new(),
            prefix: None,
            verb: verb.into(),
            args,
            raw: String::new(),
        }
    }

    /// Get the nickname from the message prefix, if present.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Get the decoded value of an IRCv3 tag by key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|Tag(k, _)| k.as_ref() == key)
            .map(|Tag(_, v)| v.as_str())
    }

    /// Get the `batch` tag value, if this line belongs to an open batch.
    pub fn batch_tag(&self) -> Option<&str> {
        self.tag_value("batch")
    }

    /// Get the server-time tag value.
    pub fn server_time(&self) -> Option<&str> {
        self.tag_value("time")
    }

    /// Get the account tag value.
    pub fn account_tag(&self) -> Option<&str> {
        self.tag_value("account")
    }

    /// Interpret the verb as a numeric reply code.
    ///
    /// Returns `None` for word commands.
    pub fn numeric(&self) -> Option<u16> {
        if self.verb.len() == 3 && self.verb.bytes().all(|b| b.is_ascii_digit()) {
            self.verb.parse().ok()
        } else {
            None
        }
    }

    /// Get argument `i`, if present.
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(String::as_str)
    }

    /// Add a single IRCv3 tag to this message.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value.into()));
        self
    }

    /// Set the prefix/source of this message.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

/// An IRCv3 message tag.
///
/// Tags are key-value pairs attached to messages. A presence-only flag tag
/// carries an empty value.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag(
    /// Tag key (e.g., `time`, `msgid`).
    pub Cow<'static, str>,
    /// Decoded tag value; empty for flag tags.
    pub String,
);

impl Tag {
    /// Create a new tag with a key and decoded value.
    pub fn new(key: impl Into<String>, value: String) -> Self {
        Tag(Cow::Owned(key.into()), value)
    }

    /// The tag key.
    pub fn key(&self) -> &str {
        &self.0
    }

    /// The decoded tag value.
    pub fn value(&self) -> &str {
        &self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric() {
        let msg = Message::new("001", vec!["nick".into(), "Welcome".into()]);
        assert_eq!(msg.numeric(), Some(1));

        let msg = Message::new("PRIVMSG", vec![]);
        assert_eq!(msg.numeric(), None);

        // Four digits is a word, not a numeric
        let msg = Message::new("0001", vec![]);
        assert_eq!(msg.numeric(), None);
    }

    #[test]
    fn test_tag_value() {
        let msg = Message::new("PING", vec!["x".into()])
            .with_tag("time", "2023-01-01T00:00:00Z".to_string())
            .with_tag("flag", String::new());
        assert_eq!(msg.tag_value("time"), Some("2023-01-01T00:00:00Z"));
        assert_eq!(msg.tag_value("flag"), Some(""));
        assert_eq!(msg.tag_value("missing"), None);
    }

    #[test]
    fn test_source_nickname() {
        let msg =
            Message::new("NICK", vec!["b".into()]).with_prefix(Prefix::new_from_str("a!u@h"));
        assert_eq!(msg.source_nickname(), Some("a"));

        let msg = Message::new("PING", vec![])
            .with_prefix(Prefix::new_from_str("irc.example.com"));
        assert_eq!(msg.source_nickname(), None);
    }
}
