use std::fmt::{self, Display, Formatter};

use super::tags::escape_tag_value;
use super::types::Message;

/// Check if a string must be sent as a colon-prefixed trailing argument.
pub(crate) fn needs_colon_prefix(s: &str) -> bool {
    s.is_empty() || s.contains(' ') || s.starts_with(':')
}

impl Display for Message {
    /// Serialize without line terminator. Tag values are escaped; a tag
    /// with an empty value is emitted as a bare key.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            write!(f, "@")?;
            for (i, tag) in self.tags.iter().enumerate() {
                if i > 0 {
                    write!(f, ";")?;
                }
                write!(f, "{}", tag.0)?;
                if !tag.1.is_empty() {
                    write!(f, "={}", escape_tag_value(&tag.1))?;
                }
            }
            write!(f, " ")?;
        }

        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }

        write!(f, "{}", self.verb)?;

        for (i, arg) in self.args.iter().enumerate() {
            write!(f, " ")?;
            if i == self.args.len() - 1 && needs_colon_prefix(arg) {
                write!(f, ":")?;
            }
            write!(f, "{}", arg)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::message::Message;
    use crate::prefix::Prefix;

    #[test]
    fn test_serialize_plain() {
        let msg = Message::new("NICK", vec!["someone".into()]);
        assert_eq!(msg.to_string(), "NICK someone");
    }

    #[test]
    fn test_serialize_trailing_space() {
        let msg = Message::new("PRIVMSG", vec!["#chan".into(), "hello there".into()]);
        assert_eq!(msg.to_string(), "PRIVMSG #chan :hello there");
    }

    #[test]
    fn test_serialize_empty_trailing() {
        let msg = Message::new("TOPIC", vec!["#chan".into(), String::new()]);
        assert_eq!(msg.to_string(), "TOPIC #chan :");
    }

    #[test]
    fn test_serialize_with_prefix_and_tags() {
        let msg = Message::new("PRIVMSG", vec!["#c".into(), "hi".into()])
            .with_tag("time", "2023-01-01T00:00:00Z".to_string())
            .with_prefix(Prefix::new_from_str("nick!u@h"));
        assert_eq!(
            msg.to_string(),
            "@time=2023-01-01T00:00:00Z :nick!u@h PRIVMSG #c hi"
        );
    }

    #[test]
    fn test_serialize_escapes_tag_values() {
        let msg = Message::new("TAGMSG", vec!["#c".into()])
            .with_tag("+draft/reply", "a b;c".to_string());
        assert_eq!(msg.to_string(), "@+draft/reply=a\\sb\\:c TAGMSG #c");
    }

    #[test]
    fn test_parse_serialize_roundtrip() {
        let lines = [
            "PING server",
            ":nick!u@h PRIVMSG #chan :Hello world",
            "@time=2023-01-01T00:00:00Z :s 001 me :Welcome home",
        ];
        for line in lines {
            let msg: Message = line.parse().unwrap();
            assert_eq!(msg.to_string(), line);
        }
    }
}
