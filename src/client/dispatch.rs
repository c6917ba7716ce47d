//! Inbound dispatch: batch unwrapping, metadata computation, verb handlers.
//!
//! Numeric replies are handled in the sibling `numerics` module.

use chrono::Utc;
use tracing::trace;

use crate::batch::{Batch, BatchMember, FramedUnit, FramerOutcome};
use crate::caps::Capability;
use crate::channel::{Channel, Membership, Topic};
use crate::error::Result;
use crate::ircv3::parse_server_time;
use crate::message::Message;
use crate::mode::parse_mode_string;
use crate::prefix::Prefix;
use crate::roster::User;
use crate::sasl::SaslStep;

use super::events::{
    AwayEvent, BatchInfo, ChgHostEvent, ErrorKind, InviteEvent, JoinEvent, KickEvent,
    MessageEvent, MessageMetadata, MessageTarget, ModeEvent, NickEvent, PartEvent, QuitEvent,
    TopicChangeEvent, WallopsEvent,
};
use super::{fire, Client};

impl Client {
    /// Run one parsed message through the batch framer and dispatch
    /// whatever completes.
    pub(crate) fn ingest(&mut self, msg: Message) -> Result<()> {
        match self.framer.accept(msg) {
            FramerOutcome::Buffered => Ok(()),
            FramerOutcome::UnmatchedClose(reference) => {
                self.emit_error(
                    ErrorKind::Malformed,
                    format!("BATCH close for unknown reference {}", reference),
                );
                Ok(())
            }
            FramerOutcome::Surfaced(FramedUnit::Line(msg)) => self.dispatch(msg, None),
            FramerOutcome::Surfaced(FramedUnit::Batch(batch)) => self.dispatch_batch(batch),
        }
    }

    fn dispatch_batch(&mut self, batch: Batch) -> Result<()> {
        let info = BatchInfo {
            reference: batch.reference,
            kind: batch.kind,
            params: batch.params,
        };
        // Replay members in arrival order: direct lines and nested
        // sub-batches dispatch exactly as the server interleaved them.
        for member in batch.members {
            match member {
                BatchMember::Line(line) => self.dispatch(line, Some(info.clone()))?,
                BatchMember::Nested(nested) => self.dispatch_batch(nested)?,
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: Message, batch: Option<BatchInfo>) -> Result<()> {
        trace!(verb = %msg.verb, "dispatch");

        let time = msg
            .server_time()
            .and_then(parse_server_time)
            .unwrap_or_else(Utc::now);
        let meta = MessageMetadata {
            raw: msg.raw.clone(),
            tags: msg.tags.clone(),
            time,
            batch,
        };

        // Upsert the source into the address book, folding in the account
        // tag, then continue with the canonical record.
        let source = msg.prefix.as_ref().and_then(User::from_prefix).map(|mut user| {
            if let Some(account) = msg.account_tag() {
                user.account = Some(account.to_owned());
            }
            self.roster.update(user).clone()
        });

        fire!(self.events, on_raw, &meta);

        if let Some(code) = msg.numeric() {
            return self.dispatch_numeric(code, &msg, &meta);
        }

        match msg.verb.as_str() {
            "PING" => self.handle_ping(&msg),
            "JOIN" => self.handle_join(&msg, source),
            "PART" => self.handle_part(&msg, source),
            "KICK" => self.handle_kick(&msg, source),
            "QUIT" => self.handle_quit(&msg, source),
            "NICK" => self.handle_nick(&msg, source),
            "PRIVMSG" => self.handle_message(&msg, source, &meta, false),
            "NOTICE" => self.handle_message(&msg, source, &meta, true),
            "MODE" => self.handle_mode(&msg, source),
            "TOPIC" => self.handle_topic(&msg, source, &meta),
            "INVITE" => self.handle_invite(&msg, source),
            "CHGHOST" => self.handle_chghost(&msg, source),
            "ACCOUNT" => self.handle_account(&msg, source),
            "AWAY" => self.handle_away(&msg, source),
            "AUTHENTICATE" => self.handle_authenticate(&msg),
            "CAP" => self.handle_cap(&msg),
            "METADATA" => self.handle_metadata(&msg),
            "WALLOPS" => self.handle_wallops(&msg, source),
            "FAIL" => {
                self.emit_error(ErrorKind::StandardFail, msg.args.join(" "));
                Ok(())
            }
            // BATCH markers were consumed by the framer; WARN/NOTE are
            // advisory standard replies; PONG answers our own PING.
            "BATCH" | "WARN" | "NOTE" | "PONG" => Ok(()),
            other => {
                self.emit_error(
                    ErrorKind::Unrecognized,
                    format!("unrecognized command {}", other),
                );
                Ok(())
            }
        }
    }

    fn handle_ping(&mut self, msg: &Message) -> Result<()> {
        let payload = msg.args.last().cloned().unwrap_or_default();
        self.send_pong(&payload)
    }

    fn handle_join(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let (Some(user), Some(channel_name)) = (source, msg.arg(0)) else {
            self.emit_error(ErrorKind::Malformed, "JOIN without source or channel".into());
            return Ok(());
        };
        let channel_name = channel_name.to_owned();

        // extended-join: JOIN <chan> <account|*> :<realname>
        if msg.args.len() >= 3 {
            let account = msg.arg(1).unwrap_or("*");
            self.roster
                .set_account(&user.nickname, (account != "*").then_some(account));
            if let Some(realname) = msg.arg(2) {
                let mut sighting = User::new(user.nickname.clone());
                sighting.realname = Some(realname.to_owned());
                self.roster.update(sighting);
            }
        }
        let user = self.roster.get(&user.nickname).cloned().unwrap_or(user);

        let folded_channel = self.fold(&channel_name);
        let folded_nick = self.fold(&user.nickname);
        let joined_self = self.is_self(&user.nickname);

        let channel = self
            .channels
            .entry(folded_channel)
            .or_insert_with(|| Channel::new(channel_name.clone()));
        channel.insert_member(
            folded_nick,
            Membership {
                nickname: user.nickname.clone(),
                prefixes: String::new(),
            },
        );

        if joined_self && self.isupport.has_whox() {
            self.send_who(&channel_name, Some("%uihsnflar"))?;
        }

        let event = JoinEvent {
            user,
            channel: channel_name,
        };
        fire!(self.events, on_join, &event);
        Ok(())
    }

    fn handle_part(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let (Some(user), Some(channel_name)) = (source, msg.arg(0)) else {
            self.emit_error(ErrorKind::Malformed, "PART without source or channel".into());
            return Ok(());
        };
        let channel_name = channel_name.to_owned();
        let reason = msg.arg(1).map(str::to_owned);

        let folded_channel = self.fold(&channel_name);
        let folded_nick = self.fold(&user.nickname);
        if self.is_self(&user.nickname) {
            self.channels.remove(&folded_channel);
        } else if let Some(channel) = self.channels.get_mut(&folded_channel) {
            channel.remove_member(&folded_nick);
        }

        let event = PartEvent {
            user,
            channel: channel_name,
            reason,
        };
        fire!(self.events, on_part, &event);
        Ok(())
    }

    fn handle_kick(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let (Some(channel_name), Some(kicked)) = (msg.arg(0), msg.arg(1)) else {
            self.emit_error(ErrorKind::Malformed, "KICK without channel or target".into());
            return Ok(());
        };
        let channel_name = channel_name.to_owned();
        let kicked = kicked.to_owned();
        let reason = msg.arg(2).map(str::to_owned);

        let folded_channel = self.fold(&channel_name);
        let folded_kicked = self.fold(&kicked);
        if self.is_self(&kicked) {
            self.channels.remove(&folded_channel);
        } else if let Some(channel) = self.channels.get_mut(&folded_channel) {
            channel.remove_member(&folded_kicked);
        }

        let event = KickEvent {
            channel: channel_name,
            kicked,
            by: source,
            reason,
        };
        fire!(self.events, on_kick, &event);
        Ok(())
    }

    fn handle_quit(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let Some(user) = source else {
            self.emit_error(ErrorKind::Malformed, "QUIT without source".into());
            return Ok(());
        };
        let reason = msg.arg(0).map(str::to_owned);

        let folded_nick = self.fold(&user.nickname);
        for channel in self.channels.values_mut() {
            channel.remove_member(&folded_nick);
        }

        let quit_self = self.is_self(&user.nickname);
        let event = QuitEvent { user, reason };
        fire!(self.events, on_quit, &event);
        self.roster.remove(&event.user.nickname);

        if quit_self {
            self.invalidate();
        }
        Ok(())
    }

    fn handle_nick(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let (Some(user), Some(new_nick)) = (source, msg.arg(0)) else {
            self.emit_error(ErrorKind::Malformed, "NICK without source or nickname".into());
            return Ok(());
        };
        let old = user.nickname.clone();
        let new_nick = new_nick.to_owned();

        let old_folded = self.fold(&old);
        let new_folded = self.fold(&new_nick);
        self.roster.rename(&old, &new_nick);
        for channel in self.channels.values_mut() {
            channel.rename_member(&old_folded, new_folded.clone(), &new_nick);
        }
        if self.is_self(&old) {
            self.nick = new_nick.clone();
        }

        let user = self
            .roster
            .get(&new_nick)
            .cloned()
            .unwrap_or_else(|| User::new(new_nick));
        let event = NickEvent { old, user };
        fire!(self.events, on_nick, &event);
        Ok(())
    }

    fn handle_message(
        &mut self,
        msg: &Message,
        source: Option<User>,
        meta: &MessageMetadata,
        notice: bool,
    ) -> Result<()> {
        let (Some(target), Some(text)) = (msg.arg(0), msg.arg(1)) else {
            self.emit_error(ErrorKind::Malformed, "message without target or body".into());
            return Ok(());
        };

        let target = match target.chars().next() {
            Some(c)
                if self.isupport.statusmsg().contains(c)
                    && self.isupport.is_channel_name(&target[c.len_utf8()..]) =>
            {
                MessageTarget::Channel {
                    name: target[c.len_utf8()..].to_owned(),
                    statusmsg: Some(c),
                }
            }
            _ if self.isupport.is_channel_name(target) => MessageTarget::Channel {
                name: target.to_owned(),
                statusmsg: None,
            },
            _ => MessageTarget::User(target.to_owned()),
        };

        let echo = source
            .as_ref()
            .is_some_and(|user| self.is_self(&user.nickname));
        let source = source.unwrap_or_else(|| {
            User::new(
                msg.prefix
                    .as_ref()
                    .and_then(Prefix::host)
                    .unwrap_or_default(),
            )
        });

        let event = MessageEvent {
            source,
            target,
            text: text.to_owned(),
            notice,
            echo,
            meta: meta.clone(),
        };
        fire!(self.events, on_message, &event);
        Ok(())
    }

    fn handle_mode(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let Some(target) = msg.arg(0) else {
            self.emit_error(ErrorKind::Malformed, "MODE without target".into());
            return Ok(());
        };
        let target = target.to_owned();
        let words: Vec<&str> = msg.args[1..].iter().map(String::as_str).collect();

        let is_channel = self.isupport.is_channel_name(&target);
        let categories = if is_channel {
            self.isupport.chan_mode_categories()
        } else {
            Default::default()
        };

        // An argument underrun yields no changes and, per policy, no event.
        let changes = parse_mode_string(&words, &categories);

        if is_channel {
            let spec = self.isupport.prefix();
            let folded_channel = self.fold(&target);
            for change in &changes {
                let folded_arg = change.mode().arg.as_deref().map(|a| self.fold(a));
                if let Some(channel) = self.channels.get_mut(&folded_channel) {
                    channel.apply_mode_change(change, &spec, folded_arg.as_deref());
                }
            }
        }

        for change in changes {
            let event = ModeEvent {
                target: target.clone(),
                by: source.clone(),
                change,
            };
            fire!(self.events, on_mode, &event);
        }
        Ok(())
    }

    fn handle_topic(
        &mut self,
        msg: &Message,
        source: Option<User>,
        meta: &MessageMetadata,
    ) -> Result<()> {
        let (Some(channel_name), Some(topic)) = (msg.arg(0), msg.arg(1)) else {
            self.emit_error(ErrorKind::Malformed, "TOPIC without channel or text".into());
            return Ok(());
        };
        let channel_name = channel_name.to_owned();
        let topic = topic.to_owned();

        let folded = self.fold(&channel_name);
        if let Some(channel) = self.channels.get_mut(&folded) {
            channel.topic = Some(Topic {
                text: topic.clone(),
                set_by: source.as_ref().map(|u| u.nickname.clone()),
                set_at: Some(meta.time),
            });
        }

        let event = TopicChangeEvent {
            channel: channel_name,
            topic,
            by: source,
        };
        fire!(self.events, on_topic_change, &event);
        Ok(())
    }

    fn handle_invite(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let (Some(by), Some(invitee), Some(channel)) = (source, msg.arg(0), msg.arg(1)) else {
            self.emit_error(ErrorKind::Malformed, "INVITE missing arguments".into());
            return Ok(());
        };
        let invited = self
            .roster
            .get(invitee)
            .cloned()
            .unwrap_or_else(|| User::new(invitee));

        let event = InviteEvent {
            channel: channel.to_owned(),
            invited,
            by,
        };
        fire!(self.events, on_invite, &event);
        Ok(())
    }

    fn handle_chghost(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let (Some(user), Some(ident), Some(host)) = (source, msg.arg(0), msg.arg(1)) else {
            self.emit_error(ErrorKind::Malformed, "CHGHOST missing arguments".into());
            return Ok(());
        };
        let old_mask = user.mask();
        let updated = self
            .roster
            .set_hostmask(&user.nickname, ident, host)
            .cloned()
            .unwrap_or(user);

        let event = ChgHostEvent {
            user: updated,
            old_mask,
        };
        fire!(self.events, on_chghost, &event);
        Ok(())
    }

    fn handle_account(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let (Some(user), Some(account)) = (source, msg.arg(0)) else {
            self.emit_error(ErrorKind::Malformed, "ACCOUNT missing arguments".into());
            return Ok(());
        };
        let logged_in = account != "*";
        let updated = self
            .roster
            .set_account(&user.nickname, logged_in.then_some(account))
            .cloned()
            .unwrap_or(user);

        if logged_in {
            fire!(self.events, on_login, &updated);
        } else {
            fire!(self.events, on_logout, &updated);
        }
        Ok(())
    }

    fn handle_away(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let Some(user) = source else {
            self.emit_error(ErrorKind::Malformed, "AWAY without source".into());
            return Ok(());
        };
        match msg.arg(0) {
            Some(message) => {
                self.roster.set_away(&user.nickname, true);
                let event = AwayEvent {
                    nick: user.nickname,
                    message: message.to_owned(),
                };
                fire!(self.events, on_other_user_away_reply, &event);
            }
            None => {
                let updated = self
                    .roster
                    .set_away(&user.nickname, false)
                    .cloned()
                    .unwrap_or(user);
                fire!(self.events, on_back, &updated);
            }
        }
        Ok(())
    }

    fn handle_authenticate(&mut self, msg: &Message) -> Result<()> {
        let chunk = msg.arg(0).unwrap_or("+").to_owned();
        match self.sasl.feed_chunk(&chunk) {
            SaslStep::Pending | SaslStep::Exhausted => Ok(()),
            SaslStep::Respond(chunks) => {
                for chunk in chunks {
                    self.send_authenticate(&chunk)?;
                }
                Ok(())
            }
            SaslStep::BadChallenge => {
                self.emit_error(
                    ErrorKind::Malformed,
                    "undecodable SASL challenge".into(),
                );
                self.send_authenticate("*")?;
                self.sasl.finish(false);
                self.maybe_complete_registration()
            }
        }
    }

    fn handle_cap(&mut self, msg: &Message) -> Result<()> {
        let sub = msg.arg(1).unwrap_or("").to_ascii_uppercase();

        // LS and LIST may continue across lines with a `*` marker
        let (more, list_arg) = if msg.arg(2) == Some("*") {
            (true, msg.arg(3).unwrap_or(""))
        } else {
            (false, msg.arg(2).unwrap_or(""))
        };
        let caps = Capability::parse_list(list_arg);

        match sub.as_str() {
            "LS" => {
                fire!(self.events, on_cap_ls, caps.as_slice());
                let request = self.caps.offer(caps, !more);
                if !request.is_empty() {
                    let names: Vec<&str> = request.iter().map(String::as_str).collect();
                    self.cap_req(&names)?;
                }
                self.maybe_complete_registration()
            }
            "ACK" => {
                self.caps.acknowledge(&caps);
                fire!(self.events, on_cap_ack, caps.as_slice());
                for cap in &caps {
                    match cap.name.as_str() {
                        "sasl" => self.maybe_begin_sasl()?,
                        "draft/metadata-2" => {
                            if let Some(value) =
                                self.caps.value_of("draft/metadata-2").map(str::to_owned)
                            {
                                self.metadata.configure_from_cap(&value);
                            }
                        }
                        _ => {}
                    }
                }
                self.maybe_complete_registration()
            }
            "NAK" => {
                self.caps.reject();
                fire!(self.events, on_cap_nak, caps.as_slice());
                self.maybe_complete_registration()
            }
            "NEW" => {
                fire!(self.events, on_cap_new, caps.as_slice());
                let request = self.caps.advertise_new(caps);
                if !request.is_empty() {
                    let names: Vec<&str> = request.iter().map(String::as_str).collect();
                    self.cap_req(&names)?;
                }
                Ok(())
            }
            "DEL" => {
                self.caps.withdraw(&caps);
                fire!(self.events, on_cap_del, caps.as_slice());
                Ok(())
            }
            "LIST" => {
                self.caps.replace_enabled(&caps);
                fire!(self.events, on_cap_list, caps.as_slice());
                Ok(())
            }
            other => {
                self.emit_error(
                    ErrorKind::Unrecognized,
                    format!("unrecognized CAP subcommand {}", other),
                );
                Ok(())
            }
        }
    }

    /// `METADATA <target> <key> <visibility> [:value]`; absent value
    /// deletes the key.
    fn handle_metadata(&mut self, msg: &Message) -> Result<()> {
        let (Some(target), Some(key)) = (msg.arg(0), msg.arg(1)) else {
            self.emit_error(ErrorKind::Malformed, "METADATA missing arguments".into());
            return Ok(());
        };
        let visibility = msg.arg(2).unwrap_or("*").to_owned();
        let value = msg.arg(3).map(str::to_owned);
        self.apply_metadata(target.to_owned(), key.to_owned(), visibility, value);
        Ok(())
    }

    /// Shared METADATA application for the verb and numerics 760/761.
    pub(crate) fn apply_metadata(
        &mut self,
        target: String,
        key: String,
        visibility: String,
        value: Option<String>,
    ) {
        use crate::metadata::MetadataValue;

        let is_channel = self.isupport.is_channel_name(&target);
        let folded = if target == "*" {
            self.fold(&self.nick)
        } else {
            self.fold(&target)
        };

        match value {
            Some(value) => {
                let stored = MetadataValue { visibility, value };
                if is_channel {
                    self.metadata.set_channel(&folded, &key, stored);
                } else {
                    self.metadata.set_user(&folded, &key, stored);
                }
            }
            None => {
                if is_channel {
                    self.metadata.delete_channel(&folded, &key);
                } else {
                    self.metadata.delete_user(&folded, &key);
                }
            }
        }
    }

    fn handle_wallops(&mut self, msg: &Message, source: Option<User>) -> Result<()> {
        let event = WallopsEvent {
            by: source,
            text: msg.arg(0).unwrap_or("").to_owned(),
        };
        fire!(self.events, on_wallops, &event);
        Ok(())
    }
}
