//! Message parsing implementation.
//!
//! Implements `FromStr` for [`Message`] on top of the nom grammar.

use std::borrow::Cow;
use std::str::FromStr;

use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

use super::nom_parser::RawMessage;
use super::tags::unescape_tag_value;
use super::types::{Message, Tag};

/// Intern common tag keys to avoid allocations.
///
/// The same handful of keys appears on almost every tagged line; returning
/// `Cow::Borrowed` for them skips the per-line heap allocation.
#[inline]
fn intern_tag_key(key: &str) -> Cow<'static, str> {
    match key {
        "time" => Cow::Borrowed("time"),
        "batch" => Cow::Borrowed("batch"),
        "account" => Cow::Borrowed("account"),
        "msgid" => Cow::Borrowed("msgid"),
        "label" => Cow::Borrowed("label"),
        _ => Cow::Owned(key.to_owned()),
    }
}

/// Parse a raw tags string (without the leading `@`) into decoded tags.
///
/// A tag without `=` decodes to the empty value.
fn parse_tags_string(tags_str: &str) -> Vec<Tag> {
    tags_str
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|tag| {
            let mut iter = tag.splitn(2, '=');
            let key = iter.next().unwrap_or("");
            let value = iter.next().map(unescape_tag_value).unwrap_or_default();
            Tag(intern_tag_key(key), value)
        })
        .collect()
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        if s.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        let raw = RawMessage::parse(s).map_err(|position| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause: MessageParseError::ParseContext {
                position,
                context: "message grammar".to_owned(),
            },
        })?;

        let prefix = match raw.prefix {
            Some(p) => Some(Prefix::try_from_str(p).map_err(|cause| {
                ProtocolError::InvalidMessage {
                    string: s.to_owned(),
                    cause,
                }
            })?),
            None => None,
        };

        Ok(Message {
            tags: raw.tags.map(parse_tags_string).unwrap_or_default(),
            prefix,
            verb: raw.verb.to_owned(),
            args: raw.args.iter().map(|a| (*a).to_owned()).collect(),
            raw: s.to_owned(),
        })
    }
}
