//! Outgoing command formatting.
//!
//! Every method formats one line, fires `on_send`, writes it CR/LF
//! terminated and flushes. Middle parameters are validated against
//! injection (CR, LF, NUL) and embedded spaces; freeform trailing text is
//! always colon-prefixed. Domain invariants (KICKLEN, OPER/SQUIT operand
//! shape) are enforced here, before anything reaches the sink.

use crate::error::{ProtocolError, Result};
use crate::message::{escape_tag_value, Tag};

use super::{fire, Client};

/// Reject middles containing framing or injection characters.
fn validate_middle(arg: &str) -> Result<()> {
    if arg.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0 || b == b' ') {
        return Err(ProtocolError::InvalidInput(format!(
            "parameter {:?} contains a space or control character",
            arg
        )));
    }
    Ok(())
}

fn validate_trailing(arg: &str) -> Result<()> {
    if arg.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(ProtocolError::InvalidInput(format!(
            "trailing parameter {:?} contains a control character",
            arg
        )));
    }
    Ok(())
}

/// Format a command whose last argument is colon-prefixed only when needed.
fn cmd(verb: &str, args: &[&str]) -> Result<String> {
    let mut line = String::from(verb);
    for (i, arg) in args.iter().enumerate() {
        line.push(' ');
        if i == args.len() - 1 {
            validate_trailing(arg)?;
            if crate::message::needs_colon_prefix(arg) {
                line.push(':');
            }
        } else {
            validate_middle(arg)?;
        }
        line.push_str(arg);
    }
    Ok(line)
}

/// Format a command with an always colon-prefixed freeform trailing.
fn cmd_freeform(verb: &str, middles: &[&str], trailing: &str) -> Result<String> {
    let mut line = String::from(verb);
    for arg in middles {
        validate_middle(arg)?;
        line.push(' ');
        line.push_str(arg);
    }
    validate_trailing(trailing)?;
    line.push_str(" :");
    line.push_str(trailing);
    Ok(line)
}

impl Client {
    /// Write one formatted line to the sink, CR/LF terminated.
    pub(crate) fn send_line(&mut self, line: String) -> Result<()> {
        fire!(self.events, on_send, line.as_str());
        self.sink.write(line.as_bytes())?;
        self.sink.write(b"\r\n")?;
        self.sink.flush()?;
        Ok(())
    }

    /// As [`send_line`](Self::send_line), prepending client tags when the
    /// `message-tags` capability is enabled and tags were supplied.
    fn send_line_tagged(&mut self, tags: &[Tag], line: String) -> Result<()> {
        if tags.is_empty() || !self.caps.is_enabled("message-tags") {
            return self.send_line(line);
        }
        let mut tagged = String::from("@");
        for (i, tag) in tags.iter().enumerate() {
            if i > 0 {
                tagged.push(';');
            }
            tagged.push_str(&tag.0);
            if !tag.1.is_empty() {
                tagged.push('=');
                tagged.push_str(&escape_tag_value(&tag.1));
            }
        }
        tagged.push(' ');
        tagged.push_str(&line);
        self.send_line(tagged)
    }

    // --- registration ---

    /// `CAP LS 302`.
    pub fn cap_ls(&mut self) -> Result<()> {
        self.send_line(cmd("CAP", &["LS", "302"])?)
    }

    /// `CAP REQ :<caps>`; counts one outstanding request.
    pub fn cap_req(&mut self, caps: &[&str]) -> Result<()> {
        let line = cmd_freeform("CAP", &["REQ"], &caps.join(" "))?;
        self.send_line(line)?;
        self.caps.note_request_sent();
        Ok(())
    }

    /// `CAP END`.
    pub fn cap_end(&mut self) -> Result<()> {
        self.send_line(cmd("CAP", &["END"])?)
    }

    /// `CAP LIST`.
    pub fn cap_list(&mut self) -> Result<()> {
        self.send_line(cmd("CAP", &["LIST"])?)
    }

    /// `PASS <password>`.
    pub fn send_pass(&mut self, password: &str) -> Result<()> {
        self.send_line(cmd("PASS", &[password])?)
    }

    /// `NICK <nickname>`.
    pub fn send_nick(&mut self, nickname: &str) -> Result<()> {
        self.send_line(cmd("NICK", &[nickname])?)
    }

    /// `USER <username> 0 * :<realname>`.
    pub fn send_user(&mut self, username: &str, realname: &str) -> Result<()> {
        self.send_line(cmd_freeform("USER", &[username, "0", "*"], realname)?)
    }

    /// `AUTHENTICATE <payload>`.
    pub fn send_authenticate(&mut self, payload: &str) -> Result<()> {
        self.send_line(cmd("AUTHENTICATE", &[payload])?)
    }

    // --- channel membership ---

    /// `JOIN <channels> [keys]`. Channels and keys are comma lists.
    pub fn send_join(&mut self, channels: &str, keys: Option<&str>) -> Result<()> {
        match keys {
            Some(keys) => self.send_line(cmd("JOIN", &[channels, keys])?),
            None => self.send_line(cmd("JOIN", &[channels])?),
        }
    }

    /// `PART <channels> [:reason]`.
    pub fn send_part(&mut self, channels: &str, reason: Option<&str>) -> Result<()> {
        match reason {
            Some(reason) => self.send_line(cmd_freeform("PART", &[channels], reason)?),
            None => self.send_line(cmd("PART", &[channels])?),
        }
    }

    /// `KICK <channel> <nick> [:reason]`.
    ///
    /// The reason must stay within the server's advertised `KICKLEN`.
    pub fn send_kick(&mut self, channel: &str, nick: &str, reason: Option<&str>) -> Result<()> {
        if let (Some(reason), Some(limit)) = (reason, self.isupport.kicklen()) {
            if reason.len() > limit {
                return Err(ProtocolError::InvalidInput(format!(
                    "kick reason is {} bytes, server KICKLEN is {}",
                    reason.len(),
                    limit
                )));
            }
        }
        match reason {
            Some(reason) => self.send_line(cmd_freeform("KICK", &[channel, nick], reason)?),
            None => self.send_line(cmd("KICK", &[channel, nick])?),
        }
    }

    /// `QUIT :<reason>`. Prefer [`Client::quit`], which also tears down
    /// session state.
    pub(crate) fn send_quit(&mut self, reason: &str) -> Result<()> {
        self.send_line(cmd_freeform("QUIT", &[], reason)?)
    }

    // --- messaging ---

    /// `PRIVMSG <target> :<text>`.
    pub fn send_privmsg(&mut self, target: &str, text: &str) -> Result<()> {
        self.send_line(cmd_freeform("PRIVMSG", &[target], text)?)
    }

    /// `PRIVMSG` with client tags (sent only when `message-tags` is on).
    pub fn send_privmsg_tagged(&mut self, tags: &[Tag], target: &str, text: &str) -> Result<()> {
        let line = cmd_freeform("PRIVMSG", &[target], text)?;
        self.send_line_tagged(tags, line)
    }

    /// `NOTICE <target> :<text>`.
    pub fn send_notice(&mut self, target: &str, text: &str) -> Result<()> {
        self.send_line(cmd_freeform("NOTICE", &[target], text)?)
    }

    /// `TAGMSG <target>` carrying only client tags.
    pub fn send_tagmsg(&mut self, tags: &[Tag], target: &str) -> Result<()> {
        let line = cmd("TAGMSG", &[target])?;
        self.send_line_tagged(tags, line)
    }

    /// `WALLOPS :<text>`.
    pub fn send_wallops(&mut self, text: &str) -> Result<()> {
        self.send_line(cmd_freeform("WALLOPS", &[], text)?)
    }

    // --- channel management & queries ---

    /// `TOPIC <channel>` to query, or `TOPIC <channel> :<text>` to set.
    pub fn send_topic(&mut self, channel: &str, topic: Option<&str>) -> Result<()> {
        match topic {
            Some(text) => self.send_line(cmd_freeform("TOPIC", &[channel], text)?),
            None => self.send_line(cmd("TOPIC", &[channel])?),
        }
    }

    /// `MODE <target> [modestring args...]`.
    pub fn send_mode(&mut self, target: &str, modes: Option<&str>) -> Result<()> {
        match modes {
            Some(modes) => {
                let mut args = vec![target];
                args.extend(modes.split(' ').filter(|s| !s.is_empty()));
                self.send_line(cmd("MODE", &args)?)
            }
            None => self.send_line(cmd("MODE", &[target])?),
        }
    }

    /// `WHO <mask> [fields]`.
    pub fn send_who(&mut self, mask: &str, whox_fields: Option<&str>) -> Result<()> {
        match whox_fields {
            Some(fields) => self.send_line(cmd("WHO", &[mask, fields])?),
            None => self.send_line(cmd("WHO", &[mask])?),
        }
    }

    /// `WHOIS <nick>`.
    pub fn send_whois(&mut self, nick: &str) -> Result<()> {
        self.send_line(cmd("WHOIS", &[nick])?)
    }

    /// `NAMES [channel]`.
    pub fn send_names(&mut self, channel: Option<&str>) -> Result<()> {
        match channel {
            Some(channel) => self.send_line(cmd("NAMES", &[channel])?),
            None => self.send_line(cmd("NAMES", &[])?),
        }
    }

    /// `LIST`.
    pub fn send_list(&mut self) -> Result<()> {
        self.send_line(cmd("LIST", &[])?)
    }

    /// `LUSERS`.
    pub fn send_lusers(&mut self) -> Result<()> {
        self.send_line(cmd("LUSERS", &[])?)
    }

    /// `ISON <nicks...>`.
    pub fn send_ison(&mut self, nicks: &[&str]) -> Result<()> {
        let mut args = vec![];
        args.extend_from_slice(nicks);
        self.send_line(cmd("ISON", &args)?)
    }

    /// `AWAY :<message>` to mark away, `AWAY` to return.
    pub fn send_away(&mut self, message: Option<&str>) -> Result<()> {
        match message {
            Some(text) => self.send_line(cmd_freeform("AWAY", &[], text)?),
            None => self.send_line(cmd("AWAY", &[])?),
        }
    }

    /// `INVITE <nick> <channel>`.
    pub fn send_invite(&mut self, nick: &str, channel: &str) -> Result<()> {
        self.send_line(cmd("INVITE", &[nick, channel])?)
    }

    // --- server queries & operator commands ---

    /// `PING <token>`.
    pub fn send_ping(&mut self, token: &str) -> Result<()> {
        self.send_line(cmd("PING", &[token])?)
    }

    /// `PONG :<payload>`.
    pub fn send_pong(&mut self, payload: &str) -> Result<()> {
        self.send_line(cmd_freeform("PONG", &[], payload)?)
    }

    /// `VERSION`.
    pub fn send_version(&mut self) -> Result<()> {
        self.send_line(cmd("VERSION", &[])?)
    }

    /// `ADMIN`.
    pub fn send_admin(&mut self) -> Result<()> {
        self.send_line(cmd("ADMIN", &[])?)
    }

    /// `OPER <name> <password>`. Operands must not contain spaces.
    pub fn send_oper(&mut self, name: &str, password: &str) -> Result<()> {
        self.send_line(cmd("OPER", &[name, password])?)
    }

    /// `REHASH`.
    pub fn send_rehash(&mut self) -> Result<()> {
        self.send_line(cmd("REHASH", &[])?)
    }

    /// `RESTART`.
    pub fn send_restart(&mut self) -> Result<()> {
        self.send_line(cmd("RESTART", &[])?)
    }

    /// `SQUIT <server> :<comment>`. The server operand must not contain
    /// spaces.
    pub fn send_squit(&mut self, server: &str, comment: &str) -> Result<()> {
        self.send_line(cmd_freeform("SQUIT", &[server], comment)?)
    }

    // --- MONITOR ---

    /// `MONITOR + <targets>`.
    pub fn monitor_add(&mut self, targets: &[&str]) -> Result<()> {
        self.send_line(cmd("MONITOR", &["+", &targets.join(",")])?)
    }

    /// `MONITOR - <targets>`.
    pub fn monitor_remove(&mut self, targets: &[&str]) -> Result<()> {
        self.send_line(cmd("MONITOR", &["-", &targets.join(",")])?)
    }

    /// `MONITOR C`: clear the monitor list.
    pub fn monitor_clear(&mut self) -> Result<()> {
        self.send_line(cmd("MONITOR", &["C"])?)
    }

    /// `MONITOR L`: request the monitor list.
    pub fn monitor_list(&mut self) -> Result<()> {
        self.send_line(cmd("MONITOR", &["L"])?)
    }

    /// `MONITOR S`: request status for every monitored target.
    pub fn monitor_status(&mut self) -> Result<()> {
        self.send_line(cmd("MONITOR", &["S"])?)
    }

    // --- METADATA ---

    /// `METADATA <target> GET <keys...>`.
    pub fn metadata_get(&mut self, target: &str, keys: &[&str]) -> Result<()> {
        let mut args = vec![target, "GET"];
        args.extend_from_slice(keys);
        self.send_line(cmd("METADATA", &args)?)
    }

    /// `METADATA <target> LIST`.
    pub fn metadata_list(&mut self, target: &str) -> Result<()> {
        self.send_line(cmd("METADATA", &[target, "LIST"])?)
    }

    /// `METADATA <target> SET <key> [:value]`; no value deletes the key.
    pub fn metadata_set(&mut self, target: &str, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                self.send_line(cmd_freeform("METADATA", &[target, "SET", key], value)?)
            }
            None => self.send_line(cmd("METADATA", &[target, "SET", key])?),
        }
    }

    /// `METADATA * SUB <keys...>`: subscribe to notifications.
    pub fn metadata_sub(&mut self, keys: &[&str]) -> Result<()> {
        let mut args = vec!["*", "SUB"];
        args.extend_from_slice(keys);
        self.send_line(cmd("METADATA", &args)?)
    }

    /// `METADATA * UNSUB <keys...>`.
    pub fn metadata_unsub(&mut self, keys: &[&str]) -> Result<()> {
        let mut args = vec!["*", "UNSUB"];
        args.extend_from_slice(keys);
        self.send_line(cmd("METADATA", &args)?)
    }

    /// `METADATA * SUBS`: request the current subscription list.
    pub fn metadata_subs(&mut self) -> Result<()> {
        self.send_line(cmd("METADATA", &["*", "SUBS"])?)
    }

    /// `METADATA <target> SYNC`.
    pub fn metadata_sync(&mut self, target: &str) -> Result<()> {
        self.send_line(cmd("METADATA", &[target, "SYNC"])?)
    }

    /// `METADATA <target> CLEAR`.
    pub fn metadata_clear(&mut self, target: &str) -> Result<()> {
        self.send_line(cmd("METADATA", &[target, "CLEAR"])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_colon_heuristic() {
        assert_eq!(cmd("CAP", &["LS", "302"]).unwrap(), "CAP LS 302");
        assert_eq!(cmd("NICK", &["someone"]).unwrap(), "NICK someone");
        assert_eq!(cmd("AWAY", &[]).unwrap(), "AWAY");
        assert_eq!(
            cmd("KICK", &["#c", "nick", "two words"]).unwrap(),
            "KICK #c nick :two words"
        );
    }

    #[test]
    fn test_cmd_freeform_always_colons() {
        assert_eq!(
            cmd_freeform("USER", &["someone", "0", "*"], "someone").unwrap(),
            "USER someone 0 * :someone"
        );
        assert_eq!(
            cmd_freeform("CAP", &["REQ"], "multi-prefix sasl").unwrap(),
            "CAP REQ :multi-prefix sasl"
        );
    }

    #[test]
    fn test_middle_rejects_space_and_injection() {
        assert!(cmd("OPER", &["name with space", "pw"]).is_err());
        assert!(cmd_freeform("PRIVMSG", &["#c\r\nQUIT"], "hi").is_err());
        assert!(cmd_freeform("PRIVMSG", &["#c"], "hi\r\nQUIT").is_err());
    }

    #[test]
    fn test_trailing_may_contain_spaces() {
        assert_eq!(
            cmd_freeform("QUIT", &[], "gone for lunch").unwrap(),
            "QUIT :gone for lunch"
        );
    }
}
