//! Numeric reply handlers.
//!
//! Each handler is a positional-argument slicer over the reply's argument
//! list; `args[0]` is always the client's own nickname.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::channel::Topic;
use crate::error::Result;
use crate::message::Message;
use crate::prefix::Prefix;
use crate::roster::User;

use super::events::{
    AwayEvent, ChannelListEntry, ConnectEvent, ErrorKind, LusersEvent, MessageMetadata,
    NamesReplyEvent, TopicReplyEvent, TopicWhoTimeEvent, UserOnlineEvent, VersionEvent,
};
use super::{fire, Client};

fn trailing(msg: &Message) -> &str {
    msg.args.last().map(String::as_str).unwrap_or("")
}

fn unix_time(value: &str) -> Option<DateTime<Utc>> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

impl Client {
    pub(crate) fn dispatch_numeric(
        &mut self,
        code: u16,
        msg: &Message,
        _meta: &MessageMetadata,
    ) -> Result<()> {
        match code {
            // RPL_WELCOME: adopt the nick the server actually assigned.
            // onConnect is deferred until capability negotiation has
            // settled and any SASL exchange has terminated.
            1 => {
                if !self.registered && self.pending_welcome.is_none() {
                    if let Some(nick) = msg.arg(0) {
                        self.nick = nick.to_owned();
                    }
                    self.pending_welcome = Some(ConnectEvent {
                        nickname: self.nick.clone(),
                        message: trailing(msg).to_owned(),
                    });
                }
                self.maybe_complete_registration()
            }
            5 => self.handle_isupport(msg),

            // LUSERS family
            251 => {
                let event = LusersEvent {
                    count: None,
                    message: trailing(msg).to_owned(),
                };
                fire!(self.events, on_luser_client, &event);
                Ok(())
            }
            252 | 253 | 254 => {
                let event = LusersEvent {
                    count: msg.arg(1).and_then(|n| n.parse().ok()),
                    message: trailing(msg).to_owned(),
                };
                match code {
                    252 => fire!(self.events, on_luser_op, &event),
                    253 => fire!(self.events, on_luser_unknown, &event),
                    _ => fire!(self.events, on_luser_channels, &event),
                }
                Ok(())
            }
            255 => {
                let event = LusersEvent {
                    count: None,
                    message: trailing(msg).to_owned(),
                };
                fire!(self.events, on_luser_me, &event);
                Ok(())
            }

            // Away state
            301 => {
                let Some(nick) = msg.arg(1) else {
                    return Ok(());
                };
                self.roster.set_away(nick, true);
                let event = AwayEvent {
                    nick: nick.to_owned(),
                    message: trailing(msg).to_owned(),
                };
                fire!(self.events, on_other_user_away_reply, &event);
                Ok(())
            }
            305 => {
                self.is_away = false;
                fire!(self.events, on_unaway_reply, trailing(msg));
                Ok(())
            }
            306 => {
                self.is_away = true;
                fire!(self.events, on_away_reply, trailing(msg));
                Ok(())
            }

            303 => {
                let online = trailing(msg).to_owned();
                for nick in online.split_whitespace() {
                    fire!(self.events, on_ison, nick);
                }
                Ok(())
            }

            // WHOIS aggregation
            307 | 311 | 312 | 313 | 317 | 318 | 319 | 330 | 378 | 671 => {
                self.handle_whois_numeric(code, msg)
            }

            // LIST
            321 => {
                self.list_buffer.clear();
                Ok(())
            }
            322 => {
                let entry = ChannelListEntry {
                    channel: msg.arg(1).unwrap_or("").to_owned(),
                    clients: msg.arg(2).and_then(|n| n.parse().ok()).unwrap_or(0),
                    topic: trailing(msg).to_owned(),
                };
                fire!(self.events, on_channel_list_update, &entry);
                self.list_buffer.push(entry);
                Ok(())
            }
            323 => {
                let entries = std::mem::take(&mut self.list_buffer);
                fire!(self.events, on_list, &entries);
                Ok(())
            }

            // Topic replies
            332 => {
                let (Some(channel_name), Some(topic)) = (msg.arg(1), msg.arg(2)) else {
                    self.emit_error(ErrorKind::Malformed, "RPL_TOPIC missing arguments".into());
                    return Ok(());
                };
                let folded = self.fold(channel_name);
                if let Some(channel) = self.channels.get_mut(&folded) {
                    match channel.topic.as_mut() {
                        Some(existing) => existing.text = topic.to_owned(),
                        None => {
                            channel.topic = Some(Topic {
                                text: topic.to_owned(),
                                set_by: None,
                                set_at: None,
                            })
                        }
                    }
                }
                let event = TopicReplyEvent {
                    channel: channel_name.to_owned(),
                    topic: topic.to_owned(),
                };
                fire!(self.events, on_topic_reply, &event);
                Ok(())
            }
            333 => {
                let (Some(channel_name), Some(set_by), Some(set_at)) =
                    (msg.arg(1), msg.arg(2), msg.arg(3).and_then(unix_time))
                else {
                    self.emit_error(
                        ErrorKind::Malformed,
                        "RPL_TOPICWHOTIME missing arguments".into(),
                    );
                    return Ok(());
                };
                let folded = self.fold(channel_name);
                if let Some(channel) = self.channels.get_mut(&folded) {
                    if let Some(topic) = channel.topic.as_mut() {
                        topic.set_by = Some(set_by.to_owned());
                        topic.set_at = Some(set_at);
                    }
                }
                let event = TopicWhoTimeEvent {
                    channel: channel_name.to_owned(),
                    set_by: set_by.to_owned(),
                    set_at,
                };
                fire!(self.events, on_topic_who_time_reply, &event);
                Ok(())
            }

            351 => {
                let event = VersionEvent {
                    version: msg.arg(1).unwrap_or("").to_owned(),
                    server: msg.arg(2).unwrap_or("").to_owned(),
                    comments: trailing(msg).to_owned(),
                };
                fire!(self.events, on_version_reply, &event);
                Ok(())
            }

            353 => self.handle_names(msg),
            354 => self.handle_whox(msg),
            // End-of-NAMES and MOTD body lines carry no state
            366 | 372 | 375 => Ok(()),
            376 => {
                fire!(self.events, on_end_of_motd, trailing(msg));
                Ok(())
            }

            381 => {
                fire!(self.events, on_youre_oper, trailing(msg));
                Ok(())
            }
            382 => {
                fire!(self.events, on_server_rehashing, trailing(msg));
                Ok(())
            }

            402 => {
                let message = format!("{}: {}", msg.arg(1).unwrap_or(""), trailing(msg));
                self.emit_error(ErrorKind::NoSuchServer, message);
                Ok(())
            }
            422 => {
                self.emit_error(ErrorKind::NoMotd, trailing(msg).to_owned());
                Ok(())
            }
            481 => {
                self.emit_error(ErrorKind::NoPrivileges, trailing(msg).to_owned());
                Ok(())
            }

            // WATCH logon notification
            600 => {
                let (Some(nick), ident, host) = (msg.arg(1), msg.arg(2), msg.arg(3)) else {
                    return Ok(());
                };
                let mut user = User::new(nick);
                user.ident = ident.map(str::to_owned);
                user.host = host.map(str::to_owned);
                let user = self.roster.update(user).clone();
                let event = UserOnlineEvent {
                    user,
                    since: msg.arg(4).and_then(unix_time),
                };
                fire!(self.events, on_user_online, &event);
                Ok(())
            }

            723 => {
                self.emit_error(ErrorKind::NoPrivs, trailing(msg).to_owned());
                Ok(())
            }

            // MONITOR
            730 | 731 => {
                let targets = trailing(msg).to_owned();
                for mask in targets.split(',').filter(|m| !m.is_empty()) {
                    let prefix = Prefix::new_from_str(mask);
                    let user = User::from_prefix(&prefix)
                        .unwrap_or_else(|| User::new(mask));
                    let user = self.roster.update(user).clone();
                    if code == 730 {
                        let event = UserOnlineEvent { user, since: None };
                        fire!(self.events, on_user_online, &event);
                    } else {
                        fire!(self.events, on_user_offline, &user);
                    }
                }
                Ok(())
            }
            732 => {
                self.monitor_buffer.extend(
                    trailing(msg)
                        .split(',')
                        .filter(|m| !m.is_empty())
                        .map(str::to_owned),
                );
                Ok(())
            }
            733 => {
                let targets = std::mem::take(&mut self.monitor_buffer);
                fire!(self.events, on_monitor_list, targets.as_slice());
                Ok(())
            }
            734 => {
                self.emit_error(ErrorKind::MonListFull, trailing(msg).to_owned());
                Ok(())
            }

            // METADATA numerics
            760 | 761 => {
                let (Some(target), Some(key)) = (msg.arg(1), msg.arg(2)) else {
                    self.emit_error(ErrorKind::Malformed, "metadata reply missing key".into());
                    return Ok(());
                };
                let visibility = msg.arg(3).unwrap_or("*").to_owned();
                let value = msg.arg(4).map(str::to_owned);
                self.apply_metadata(target.to_owned(), key.to_owned(), visibility, value);
                Ok(())
            }
            764 => {
                self.emit_error(ErrorKind::TooManySubs, trailing(msg).to_owned());
                Ok(())
            }
            766 => {
                let message = format!("{}: {}", msg.arg(2).unwrap_or(""), trailing(msg));
                self.emit_error(ErrorKind::KeyNotSet, message);
                Ok(())
            }
            770 | 771 | 772 => {
                let keys: Vec<String> = msg
                    .args
                    .get(1..)
                    .unwrap_or(&[])
                    .iter()
                    .flat_map(|a| a.split_whitespace())
                    .map(str::to_owned)
                    .collect();
                let borrowed: Vec<&str> = keys.iter().map(String::as_str).collect();
                match code {
                    770 => self.metadata.subscribe(borrowed),
                    771 => self.metadata.unsubscribe(borrowed),
                    _ => {
                        self.metadata.subscribe(borrowed);
                        fire!(self.events, on_metadata_sub_list, keys.as_slice());
                    }
                }
                Ok(())
            }
            774 => {
                self.emit_error(ErrorKind::WaitAndRetry, trailing(msg).to_owned());
                Ok(())
            }

            // SASL outcomes
            900 => {
                if let Some(account) = msg.arg(2) {
                    let mut user = User::new(self.nick.clone());
                    user.account = Some(account.to_owned());
                    let user = self.roster.update(user).clone();
                    fire!(self.events, on_login, &user);
                }
                Ok(())
            }
            903 => {
                self.sasl.finish(true);
                self.maybe_complete_registration()
            }
            902 | 904 | 905 | 906 | 907 => {
                self.sasl.finish(false);
                self.maybe_complete_registration()
            }

            other => {
                self.emit_error(
                    ErrorKind::Unrecognized,
                    format!("unrecognized numeric {:03}", other),
                );
                Ok(())
            }
        }
    }

    fn handle_isupport(&mut self, msg: &Message) -> Result<()> {
        self.isupport.extend_from_args(&msg.args);
        self.roster.set_casemapping(self.isupport.casemapping());

        // Legacy multi-prefix/userhost-in-names negotiation for servers
        // that predate the capabilities.
        if self.isupport.has_namesx()
            && !self.caps.is_enabled("multi-prefix")
            && !self.protoctl_namesx_sent
        {
            self.protoctl_namesx_sent = true;
            self.send_line("PROTOCTL NAMESX".to_owned())?;
        }
        if self.isupport.has_uhnames()
            && !self.caps.is_enabled("userhost-in-names")
            && !self.protoctl_uhnames_sent
        {
            self.protoctl_uhnames_sent = true;
            self.send_line("PROTOCTL UHNAMES".to_owned())?;
        }
        Ok(())
    }

    fn handle_whois_numeric(&mut self, code: u16, msg: &Message) -> Result<()> {
        let Some(nick) = msg.arg(1) else {
            self.emit_error(ErrorKind::Malformed, "WHOIS reply without nickname".into());
            return Ok(());
        };
        let folded = self.fold(nick);

        if code == 318 {
            match self.whois.finish(&folded) {
                Some(response) => fire!(self.events, on_whois, &response),
                None => self.emit_error(
                    ErrorKind::Unexpected,
                    format!("end of WHOIS for {} with no preceding data", nick),
                ),
            }
            return Ok(());
        }

        // 311 is also an address-book sighting
        if code == 311 {
            let mut user = User::new(nick);
            user.ident = msg.arg(2).map(str::to_owned);
            user.host = msg.arg(3).map(str::to_owned);
            user.realname = Some(trailing(msg).to_owned());
            self.roster.update(user);
        }

        let spec = self.isupport.prefix();
        let entry = self.whois.entry(&folded, nick);
        match code {
            311 => {
                entry.username = msg.arg(2).map(str::to_owned);
                entry.hostname = msg.arg(3).map(str::to_owned);
                entry.realname = Some(trailing(msg).to_owned());
            }
            312 => entry.connected_to = msg.arg(2).map(str::to_owned),
            313 => entry.is_oper = true,
            317 => {
                entry.idle = msg
                    .arg(2)
                    .and_then(|s| s.parse().ok())
                    .map(Duration::from_secs);
                entry.connected_time = msg.arg(3).and_then(unix_time);
            }
            319 => {
                for token in trailing(msg).split_whitespace() {
                    let name_start = token
                        .find(|c| !spec.is_prefix_char(c))
                        .unwrap_or(token.len());
                    let (prefixes, channel) = token.split_at(name_start);
                    if !channel.is_empty() {
                        entry
                            .channels
                            .insert(channel.to_owned(), prefixes.to_owned());
                    }
                }
            }
            330 => entry.account = msg.arg(2).map(str::to_owned),
            378 => entry.connecting_from = Some(trailing(msg).to_owned()),
            671 => entry.is_secure = true,
            307 => entry.is_registered = true,
            _ => {}
        }
        Ok(())
    }

    fn handle_names(&mut self, msg: &Message) -> Result<()> {
        // args: client, visibility symbol, channel, names
        let (Some(channel_name), Some(names)) = (msg.arg(2), msg.arg(3)) else {
            self.emit_error(ErrorKind::Malformed, "RPL_NAMREPLY missing arguments".into());
            return Ok(());
        };
        let channel_name = channel_name.to_owned();
        let names = names.to_owned();
        let spec = self.isupport.prefix();
        let folded_channel = self.fold(&channel_name);

        let mut members = Vec::new();
        for token in names.split_whitespace() {
            let name_start = token
                .find(|c| !spec.is_prefix_char(c))
                .unwrap_or(token.len());
            let (prefixes, mask) = token.split_at(name_start);
            if mask.is_empty() {
                continue;
            }

            // With userhost-in-names the entry is a full mask
            let prefix = Prefix::new_from_str(mask);
            let user = User::from_prefix(&prefix).unwrap_or_else(|| User::new(mask));
            let nickname = self.roster.update(user).nickname.clone();
            let folded_nick = self.fold(&nickname);

            let channel = self
                .channels
                .entry(folded_channel.clone())
                .or_insert_with(|| crate::channel::Channel::new(channel_name.clone()));
            channel.insert_member(
                folded_nick,
                crate::channel::Membership {
                    nickname: nickname.clone(),
                    prefixes: prefixes.to_owned(),
                },
            );
            members.push((prefixes.to_owned(), nickname));
        }

        let event = NamesReplyEvent {
            channel: channel_name,
            members,
        };
        fire!(self.events, on_names_reply, &event);
        Ok(())
    }

    fn handle_whox(&mut self, msg: &Message) -> Result<()> {
        // Reply to `WHO <chan> %uihsnflar`:
        // client, user, ip, host, server, nick, flags, idle, account, realname
        if msg.args.len() < 10 {
            self.emit_error(ErrorKind::Malformed, "short WHOX reply".into());
            return Ok(());
        }

        let nick = msg.args[5].clone();
        let mut user = User::new(nick.clone());
        user.ident = Some(msg.args[1].clone());
        user.host = Some(msg.args[3].clone());
        if msg.args[8] != "0" {
            user.account = Some(msg.args[8].clone());
        }
        user.realname = Some(msg.args[9].clone());

        self.roster.update(user);
        let away = msg.args[6].contains('G');
        let user = self
            .roster
            .set_away(&nick, away)
            .cloned()
            .unwrap_or_else(|| User::new(nick));
        fire!(self.events, on_whox_reply, &user);
        Ok(())
    }
}
