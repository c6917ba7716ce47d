//! The protocol engine.
//!
//! [`Client`] is a sans-IO state machine: the embedder pushes received
//! lines in with [`Client::push`], registers event callbacks, and calls
//! command methods to produce outgoing traffic. The engine performs no
//! I/O of its own beyond writing formatted lines to the supplied
//! [`Sink`]; it spawns nothing, blocks on nothing and owns no timers.
//!
//! Both entry points take `&mut self`, so the caller serializes them by
//! construction. Callbacks are invoked synchronously on the pushing
//! thread.

use std::collections::HashMap;
use std::io;

use tracing::debug;

use crate::batch::BatchFramer;
use crate::caps::CapNegotiator;
use crate::channel::Channel;
use crate::error::{ProtocolError, Result};
use crate::isupport::Isupport;
use crate::metadata::MetadataStore;
use crate::roster::{Roster, User};
use crate::sasl::{SaslMechanism, SaslSession};
use crate::whois::WhoisTable;

mod commands;
mod dispatch;
pub mod events;
mod numerics;

pub use events::{
    AwayEvent, BatchInfo, ChannelListEntry, ChgHostEvent, ConnectEvent, ErrorEvent, ErrorKind,
    InviteEvent, JoinEvent, KickEvent, LusersEvent, MessageEvent, MessageMetadata, MessageTarget,
    ModeEvent, NamesReplyEvent, NickEvent, PartEvent, QuitEvent, TopicChangeEvent,
    TopicReplyEvent, TopicWhoTimeEvent, UserOnlineEvent, VersionEvent, WallopsEvent,
};

use events::Events;

/// Fire an event slot if the embedder registered one.
macro_rules! fire {
    ($events:expr, $slot:ident, $arg:expr) => {
        if let Some(cb) = $events.$slot.as_mut() {
            cb($arg);
        }
    };
}
pub(crate) use fire;

/// Where outgoing lines go.
///
/// The engine writes fully formed lines including the CR/LF terminator
/// and flushes after each one.
pub trait Sink {
    /// Accept bytes of a formatted line.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Flush buffered output. The default is a no-op.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Adapt any [`io::Write`] into a [`Sink`].
pub struct IoSink<W: io::Write>(pub W);

impl<W: io::Write> Sink for IoSink<W> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.0.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// The identity the session registers with.
#[derive(Clone, Debug)]
pub struct Identity {
    /// Desired nickname.
    pub nickname: String,
    /// Username (ident).
    pub username: String,
    /// Real name / GECOS.
    pub realname: String,
    /// Server password (PASS), if required.
    pub password: Option<String>,
}

impl Identity {
    /// Identity without a server password.
    pub fn new(
        nickname: impl Into<String>,
        username: impl Into<String>,
        realname: impl Into<String>,
    ) -> Self {
        Identity {
            nickname: nickname.into(),
            username: username.into(),
            realname: realname.into(),
            password: None,
        }
    }

    /// Attach a server password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// The IRC client protocol engine.
pub struct Client {
    pub(crate) sink: Box<dyn Sink>,
    pub(crate) identity: Identity,
    pub(crate) nick: String,
    pub(crate) registered: bool,
    pub(crate) invalidated: bool,
    pub(crate) is_away: bool,
    pub(crate) caps: CapNegotiator,
    pub(crate) sasl: SaslSession,
    pub(crate) isupport: Isupport,
    pub(crate) roster: Roster,
    pub(crate) channels: HashMap<String, Channel>,
    pub(crate) whois: WhoisTable,
    pub(crate) metadata: MetadataStore,
    pub(crate) framer: BatchFramer,
    pub(crate) events: Events,
    /// RPL_WELCOME seen but registration not yet complete (CAP REQs or
    /// SASL still outstanding); fired once the conjunction holds.
    pub(crate) pending_welcome: Option<ConnectEvent>,
    pub(crate) list_buffer: Vec<ChannelListEntry>,
    pub(crate) monitor_buffer: Vec<String>,
    pub(crate) protoctl_namesx_sent: bool,
    pub(crate) protoctl_uhnames_sent: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("nick", &self.nick)
            .field("registered", &self.registered)
            .field("invalidated", &self.invalidated)
            .field("channels", &self.channels.len())
            .finish()
    }
}

impl Client {
    /// Create an engine and open the registration handshake.
    ///
    /// Writes the opening burst (PASS if configured, `CAP LS 302`, NICK,
    /// USER) to the sink before returning.
    pub fn new<S: Sink + 'static>(sink: S, identity: Identity) -> Result<Self> {
        Self::with_sasl(sink, identity, Vec::new())
    }

    /// As [`Client::new`], with SASL mechanisms in preference order.
    pub fn with_sasl<S: Sink + 'static>(
        sink: S,
        identity: Identity,
        mechanisms: Vec<Box<dyn SaslMechanism>>,
    ) -> Result<Self> {
        let nick = identity.nickname.clone();
        let mut client = Client {
            sink: Box::new(sink),
            identity,
            nick,
            registered: false,
            invalidated: false,
            is_away: false,
            caps: CapNegotiator::new(),
            sasl: SaslSession::new(mechanisms),
            isupport: Isupport::new(),
            roster: Roster::new(),
            channels: HashMap::new(),
            whois: WhoisTable::new(),
            metadata: MetadataStore::new(),
            framer: BatchFramer::new(),
            events: Events::default(),
            pending_welcome: None,
            list_buffer: Vec::new(),
            monitor_buffer: Vec::new(),
            protoctl_namesx_sent: false,
            protoctl_uhnames_sent: false,
        };
        client.register_burst()?;
        Ok(client)
    }

    fn register_burst(&mut self) -> Result<()> {
        if let Some(password) = self.identity.password.clone() {
            self.send_pass(&password)?;
        }
        self.cap_ls()?;
        let nick = self.identity.nickname.clone();
        self.send_nick(&nick)?;
        let (username, realname) =
            (self.identity.username.clone(), self.identity.realname.clone());
        self.send_user(&username, &realname)
    }

    /// The current nickname (server-assigned once registered).
    pub fn nickname(&self) -> &str {
        &self.nick
    }

    /// Whether registration has completed (RPL_WELCOME observed).
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Whether SASL authentication succeeded this session.
    pub fn is_authenticated(&self) -> bool {
        self.sasl.authenticated()
    }

    /// Whether we are currently marked away.
    pub fn is_away(&self) -> bool {
        self.is_away
    }

    /// Whether the session has been invalidated.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// The accumulated server parameters.
    pub fn isupport(&self) -> &Isupport {
        &self.isupport
    }

    /// Whether a capability is currently enabled.
    pub fn cap_enabled(&self, name: &str) -> bool {
        self.caps.is_enabled(name)
    }

    /// A joined channel, by name.
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&self.roster.fold(name))
    }

    /// Iterate over joined channels.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// A sighted user, by nickname.
    pub fn user(&self, nick: &str) -> Option<&User> {
        self.roster.get(nick)
    }

    /// The metadata store (values and subscriptions).
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Push one received line into the engine.
    ///
    /// The line may carry its CR/LF terminator; it and anything after it
    /// are discarded. Malformed lines produce a `malformed` error event
    /// and are otherwise ignored. Returns an error only for sink I/O
    /// failures or pushes after invalidation.
    pub fn push(&mut self, line: &str) -> Result<()> {
        if self.invalidated {
            return Err(ProtocolError::SessionClosed);
        }

        let line = match line.find(['\r', '\n']) {
            Some(end) => &line[..end],
            None => line,
        };
        if line.is_empty() {
            return Ok(());
        }

        match line.parse::<crate::message::Message>() {
            Ok(msg) => self.ingest(msg),
            Err(err) => {
                self.emit_error(ErrorKind::Malformed, err.to_string());
                Ok(())
            }
        }
    }

    /// Send QUIT, invalidate the session and release all state.
    pub fn quit(&mut self, reason: &str) -> Result<()> {
        if self.invalidated {
            return Err(ProtocolError::SessionClosed);
        }
        self.send_quit(reason)?;
        self.invalidate();
        Ok(())
    }

    pub(crate) fn invalidate(&mut self) {
        debug!("session invalidated");
        self.invalidated = true;
        self.roster.clear();
        self.channels.clear();
        self.whois.clear();
        self.metadata.clear();
        self.framer = BatchFramer::new();
        self.pending_welcome = None;
        self.list_buffer.clear();
        self.monitor_buffer.clear();
    }

    pub(crate) fn emit_error(&mut self, kind: ErrorKind, message: String) {
        let event = ErrorEvent { kind, message };
        fire!(self.events, on_error, &event);
    }

    /// Advance registration whenever its inputs change.
    ///
    /// Once every CAP REQ is answered and SASL is idle, releases `CAP END`
    /// (if a listing was received and END not yet sent) and fires a
    /// deferred `onConnect`. Registration completes only when all three of
    /// CAP settlement, SASL termination and RPL_WELCOME have been seen,
    /// whichever arrives last.
    pub(crate) fn maybe_complete_registration(&mut self) -> Result<()> {
        if !self.caps.settled() || self.sasl.in_flight() {
            return Ok(());
        }

        if self.caps.listing_complete() && !self.caps.end_sent() {
            debug!("capability negotiation settled");
            self.cap_end()?;
            self.caps.mark_end_sent();
        }

        if let Some(event) = self.pending_welcome.take() {
            debug!(nickname = %event.nickname, "registration complete");
            self.registered = true;
            fire!(self.events, on_connect, &event);
        }
        Ok(())
    }

    /// Begin SASL if the `sasl` capability was acknowledged and the
    /// embedder supplied mechanisms.
    pub(crate) fn maybe_begin_sasl(&mut self) -> Result<()> {
        if !self.sasl.has_mechanisms() || self.sasl.in_flight() || self.sasl.authenticated() {
            return Ok(());
        }
        let server_list = self.caps.value_of("sasl").map(str::to_owned);
        if let Some(mechanism) = self.sasl.begin(server_list.as_deref()) {
            debug!(mechanism = %mechanism, "starting SASL exchange");
            self.send_authenticate(&mechanism)?;
        }
        Ok(())
    }

    /// Fold a nickname or channel name with the session casemapping.
    pub(crate) fn fold(&self, s: &str) -> String {
        self.roster.fold(s)
    }

    /// Whether the nickname is our own, under the session casemapping.
    pub(crate) fn is_self(&self, nick: &str) -> bool {
        self.roster.nick_eq(nick, &self.nick)
    }
}
