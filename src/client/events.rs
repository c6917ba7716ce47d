//! The public event surface.
//!
//! Each event is a register-once callback slot holding a boxed `FnMut`.
//! A missing callback is a no-op. Callbacks run synchronously on the
//! thread that called [`Client::push`](super::Client::push), in wire
//! order; payloads are immutable snapshots of engine state.

use chrono::{DateTime, Utc};

use crate::caps::Capability;
use crate::message::Tag;
use crate::mode::ModeChange;
use crate::roster::User;
use crate::whois::WhoisResponse;

use super::Client;

/// Context computed for every dispatched line.
#[derive(Clone, Debug)]
pub struct MessageMetadata {
    /// The raw line as received (CR/LF stripped).
    pub raw: String,
    /// Decoded IRCv3 tags.
    pub tags: Vec<Tag>,
    /// Timestamp: the `time` tag if present and parseable, else the local
    /// clock in UTC.
    pub time: DateTime<Utc>,
    /// The enclosing batch, if the line arrived inside one.
    pub batch: Option<BatchInfo>,
}

/// Identity of the batch a line arrived in.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchInfo {
    /// The batch reference tag.
    pub reference: String,
    /// The batch type.
    pub kind: String,
    /// Batch parameters.
    pub params: Vec<String>,
}

/// Registration completed (RPL_WELCOME observed, negotiation settled).
#[derive(Clone, Debug)]
pub struct ConnectEvent {
    /// The nickname the server assigned.
    pub nickname: String,
    /// The welcome text.
    pub message: String,
}

/// Where a PRIVMSG/NOTICE was addressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageTarget {
    /// A channel, possibly narrowed by a STATUSMSG prefix.
    Channel {
        /// Channel name without the status prefix.
        name: String,
        /// The STATUSMSG prefix, when one narrowed the audience.
        statusmsg: Option<char>,
    },
    /// A direct message to a nickname.
    User(String),
}

/// An incoming PRIVMSG or NOTICE.
#[derive(Clone, Debug)]
pub struct MessageEvent {
    /// The sender.
    pub source: User,
    /// The resolved target.
    pub target: MessageTarget,
    /// Message body.
    pub text: String,
    /// True for NOTICE.
    pub notice: bool,
    /// True when this is our own message echoed back (echo-message).
    pub echo: bool,
    /// Per-line context.
    pub meta: MessageMetadata,
}

/// A user joined a channel.
#[derive(Clone, Debug)]
pub struct JoinEvent {
    /// Who joined (with account/realname when extended-join supplied them).
    pub user: User,
    /// The channel.
    pub channel: String,
}

/// A user left a channel.
#[derive(Clone, Debug)]
pub struct PartEvent {
    /// Who left.
    pub user: User,
    /// The channel.
    pub channel: String,
    /// Part message, if any.
    pub reason: Option<String>,
}

/// A user was kicked from a channel.
#[derive(Clone, Debug)]
pub struct KickEvent {
    /// The channel.
    pub channel: String,
    /// Nickname of the user kicked out.
    pub kicked: String,
    /// Who performed the kick, when a user source was given.
    pub by: Option<User>,
    /// Kick reason, if any.
    pub reason: Option<String>,
}

/// A user quit the network.
#[derive(Clone, Debug)]
pub struct QuitEvent {
    /// Who quit.
    pub user: User,
    /// Quit message, if any.
    pub reason: Option<String>,
}

/// A user changed nickname.
#[derive(Clone, Debug)]
pub struct NickEvent {
    /// The previous nickname.
    pub old: String,
    /// The user under the new nickname.
    pub user: User,
}

/// One mode change on a channel or user target.
#[derive(Clone, Debug)]
pub struct ModeEvent {
    /// The mode target (channel name or nickname).
    pub target: String,
    /// Who changed it, when a user source was given.
    pub by: Option<User>,
    /// The change.
    pub change: ModeChange,
}

/// The topic of a channel changed.
#[derive(Clone, Debug)]
pub struct TopicChangeEvent {
    /// The channel.
    pub channel: String,
    /// The new topic text (empty when cleared).
    pub topic: String,
    /// Who changed it.
    pub by: Option<User>,
}

/// We were invited to a channel, or saw an invite (invite-notify).
#[derive(Clone, Debug)]
pub struct InviteEvent {
    /// The channel.
    pub channel: String,
    /// The user invited.
    pub invited: User,
    /// Who issued the invite.
    pub by: User,
}

/// A user's visible host changed (chghost).
#[derive(Clone, Debug)]
pub struct ChgHostEvent {
    /// The user, already carrying the new ident and host.
    pub user: User,
    /// The mask before the change.
    pub old_mask: String,
}

/// Error kinds surfaced through [`Client::on_error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// ERR_NOPRIVS (723).
    NoPrivs,
    /// Monitor list is full (734).
    MonListFull,
    /// ERR_NOMOTD (422).
    NoMotd,
    /// ERR_NOSUCHSERVER (402).
    NoSuchServer,
    /// ERR_NOPRIVILEGES (481).
    NoPrivileges,
    /// A line failed to parse or had impossible arguments.
    Malformed,
    /// A reply arrived that no request explains.
    Unexpected,
    /// An unknown verb or numeric.
    Unrecognized,
    /// Caller-supplied input violated a protocol invariant.
    BadUserInput,
    /// RPL_KEYNOTSET (766).
    KeyNotSet,
    /// ERR_METADATASYNCLATER (774): retry the sync later.
    WaitAndRetry,
    /// Metadata subscription limit reached (764).
    TooManySubs,
    /// A FAIL standard reply.
    StandardFail,
}

/// An error event: data, never an exception.
#[derive(Clone, Debug)]
pub struct ErrorEvent {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable context.
    pub message: String,
}

/// A NAMES reply line for a channel.
#[derive(Clone, Debug)]
pub struct NamesReplyEvent {
    /// The channel.
    pub channel: String,
    /// Members as (prefix flags, nickname) pairs.
    pub members: Vec<(String, String)>,
}

/// RPL_TOPIC (332).
#[derive(Clone, Debug)]
pub struct TopicReplyEvent {
    /// The channel.
    pub channel: String,
    /// Topic text.
    pub topic: String,
}

/// RPL_TOPICWHOTIME (333).
#[derive(Clone, Debug)]
pub struct TopicWhoTimeEvent {
    /// The channel.
    pub channel: String,
    /// Who set the topic.
    pub set_by: String,
    /// When it was set.
    pub set_at: DateTime<Utc>,
}

/// RPL_VERSION (351).
#[derive(Clone, Debug)]
pub struct VersionEvent {
    /// Server software version.
    pub version: String,
    /// Server name.
    pub server: String,
    /// Free-form comments.
    pub comments: String,
}

/// A monitored or watched user came online.
#[derive(Clone, Debug)]
pub struct UserOnlineEvent {
    /// The user.
    pub user: User,
    /// Sign-on time when the notification carried one (WATCH 600).
    pub since: Option<DateTime<Utc>>,
}

/// One RPL_LIST (322) entry.
#[derive(Clone, Debug)]
pub struct ChannelListEntry {
    /// Channel name.
    pub channel: String,
    /// Visible member count.
    pub clients: u32,
    /// Channel topic.
    pub topic: String,
}

/// Another user's away message (301 or away-notify).
#[derive(Clone, Debug)]
pub struct AwayEvent {
    /// The away user's nickname.
    pub nick: String,
    /// Their away message.
    pub message: String,
}

/// A WALLOPS broadcast.
#[derive(Clone, Debug)]
pub struct WallopsEvent {
    /// The originating user, if a user prefix was given.
    pub by: Option<User>,
    /// Broadcast text.
    pub text: String,
}

/// One LUSERS family reply (251-255).
#[derive(Clone, Debug)]
pub struct LusersEvent {
    /// The numeric's count argument, when it has one.
    pub count: Option<u64>,
    /// The descriptive text.
    pub message: String,
}

type Slot<T> = Option<Box<dyn FnMut(&T)>>;
type StrSlot = Option<Box<dyn FnMut(&str)>>;
type CapsSlot = Option<Box<dyn FnMut(&[Capability])>>;
type KeysSlot = Option<Box<dyn FnMut(&[String])>>;

/// The callback slots. All default to unset.
#[derive(Default)]
pub(crate) struct Events {
    pub(crate) on_connect: Slot<ConnectEvent>,
    pub(crate) on_raw: Slot<MessageMetadata>,
    pub(crate) on_send: StrSlot,
    pub(crate) on_message: Slot<MessageEvent>,
    pub(crate) on_join: Slot<JoinEvent>,
    pub(crate) on_part: Slot<PartEvent>,
    pub(crate) on_kick: Slot<KickEvent>,
    pub(crate) on_quit: Slot<QuitEvent>,
    pub(crate) on_nick: Slot<NickEvent>,
    pub(crate) on_mode: Slot<ModeEvent>,
    pub(crate) on_topic_change: Slot<TopicChangeEvent>,
    pub(crate) on_invite: Slot<InviteEvent>,
    pub(crate) on_chghost: Slot<ChgHostEvent>,
    pub(crate) on_whois: Slot<WhoisResponse>,
    pub(crate) on_error: Slot<ErrorEvent>,
    pub(crate) on_cap_ls: CapsSlot,
    pub(crate) on_cap_list: CapsSlot,
    pub(crate) on_cap_ack: CapsSlot,
    pub(crate) on_cap_nak: CapsSlot,
    pub(crate) on_cap_new: CapsSlot,
    pub(crate) on_cap_del: CapsSlot,
    pub(crate) on_names_reply: Slot<NamesReplyEvent>,
    pub(crate) on_topic_reply: Slot<TopicReplyEvent>,
    pub(crate) on_topic_who_time_reply: Slot<TopicWhoTimeEvent>,
    pub(crate) on_version_reply: Slot<VersionEvent>,
    pub(crate) on_server_rehashing: StrSlot,
    pub(crate) on_youre_oper: StrSlot,
    pub(crate) on_end_of_motd: StrSlot,
    pub(crate) on_user_online: Slot<UserOnlineEvent>,
    pub(crate) on_user_offline: Slot<User>,
    pub(crate) on_monitor_list: KeysSlot,
    pub(crate) on_list: Slot<Vec<ChannelListEntry>>,
    pub(crate) on_channel_list_update: Slot<ChannelListEntry>,
    pub(crate) on_whox_reply: Slot<User>,
    pub(crate) on_away_reply: StrSlot,
    pub(crate) on_unaway_reply: StrSlot,
    pub(crate) on_other_user_away_reply: Slot<AwayEvent>,
    pub(crate) on_back: Slot<User>,
    pub(crate) on_ison: StrSlot,
    pub(crate) on_metadata_sub_list: KeysSlot,
    pub(crate) on_login: Slot<User>,
    pub(crate) on_logout: Slot<User>,
    pub(crate) on_wallops: Slot<WallopsEvent>,
    pub(crate) on_luser_client: Slot<LusersEvent>,
    pub(crate) on_luser_op: Slot<LusersEvent>,
    pub(crate) on_luser_unknown: Slot<LusersEvent>,
    pub(crate) on_luser_channels: Slot<LusersEvent>,
    pub(crate) on_luser_me: Slot<LusersEvent>,
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Events { .. }")
    }
}

macro_rules! event_setters {
    ($($(#[$doc:meta])* $name:ident: $payload:ty;)*) => {
        impl Client {
            $(
                $(#[$doc])*
                pub fn $name(&mut self, callback: impl FnMut(&$payload) + 'static) {
                    self.events.$name = Some(Box::new(callback));
                }
            )*
        }
    };
}

event_setters! {
    /// Registration completed; fires exactly once per session.
    on_connect: ConnectEvent;
    /// Every dispatched line, before its handler runs.
    on_raw: MessageMetadata;
    /// Every outgoing line (without CR/LF). Debug aid.
    on_send: str;
    /// PRIVMSG or NOTICE received.
    on_message: MessageEvent;
    /// A user joined a channel we share.
    on_join: JoinEvent;
    /// A user parted a channel we share.
    on_part: PartEvent;
    /// A user was kicked.
    on_kick: KickEvent;
    /// A user quit.
    on_quit: QuitEvent;
    /// A user changed nickname.
    on_nick: NickEvent;
    /// One mode change; a multi-mode line fires once per change.
    on_mode: ModeEvent;
    /// The topic changed via TOPIC.
    on_topic_change: TopicChangeEvent;
    /// An INVITE was seen.
    on_invite: InviteEvent;
    /// A user's visible host changed.
    on_chghost: ChgHostEvent;
    /// A WHOIS aggregation completed (numeric 318).
    on_whois: WhoisResponse;
    /// A protocol-level anomaly or server error numeric.
    on_error: ErrorEvent;
    /// CAP LS listing received (final part).
    on_cap_ls: [Capability];
    /// CAP LIST reply received.
    on_cap_list: [Capability];
    /// CAP ACK received.
    on_cap_ack: [Capability];
    /// CAP NAK received.
    on_cap_nak: [Capability];
    /// CAP NEW received (cap-notify).
    on_cap_new: [Capability];
    /// CAP DEL received (cap-notify).
    on_cap_del: [Capability];
    /// RPL_NAMREPLY processed for a channel.
    on_names_reply: NamesReplyEvent;
    /// RPL_TOPIC (332).
    on_topic_reply: TopicReplyEvent;
    /// RPL_TOPICWHOTIME (333).
    on_topic_who_time_reply: TopicWhoTimeEvent;
    /// RPL_VERSION (351).
    on_version_reply: VersionEvent;
    /// RPL_REHASHING (382).
    on_server_rehashing: str;
    /// RPL_YOUREOPER (381).
    on_youre_oper: str;
    /// RPL_ENDOFMOTD (376).
    on_end_of_motd: str;
    /// A monitored/watched user came online (730, 600).
    on_user_online: UserOnlineEvent;
    /// A monitored user went offline (731).
    on_user_offline: User;
    /// RPL_MONLIST targets (732).
    on_monitor_list: [String];
    /// Aggregated LIST reply at RPL_LISTEND.
    on_list: Vec<ChannelListEntry>;
    /// One RPL_LIST entry (322).
    on_channel_list_update: ChannelListEntry;
    /// One WHOX reply row (354).
    on_whox_reply: User;
    /// RPL_NOWAWAY (306): we are now marked away.
    on_away_reply: str;
    /// RPL_UNAWAY (305): we are no longer away.
    on_unaway_reply: str;
    /// Another user is away (301 or away-notify AWAY with text).
    on_other_user_away_reply: AwayEvent;
    /// Another user returned from away (away-notify AWAY without text).
    on_back: User;
    /// One online nickname from RPL_ISON (303).
    on_ison: str;
    /// Current metadata subscriptions (772).
    on_metadata_sub_list: [String];
    /// A user logged into an account.
    on_login: User;
    /// A user logged out of their account.
    on_logout: User;
    /// WALLOPS broadcast.
    on_wallops: WallopsEvent;
    /// RPL_LUSERCLIENT (251).
    on_luser_client: LusersEvent;
    /// RPL_LUSEROP (252).
    on_luser_op: LusersEvent;
    /// RPL_LUSERUNKNOWN (253).
    on_luser_unknown: LusersEvent;
    /// RPL_LUSERCHANNELS (254).
    on_luser_channels: LusersEvent;
    /// RPL_LUSERME (255).
    on_luser_me: LusersEvent;
}
