//! # slirc-engine
//!
//! An I/O-agnostic IRC client protocol engine with IRCv3 support.
//!
//! The engine is a single-threaded, push-driven state machine: the
//! embedder owns the transport and feeds received lines into
//! [`Client::push`]; the engine maintains session state (capabilities,
//! ISUPPORT, channels, users, metadata, WHOIS aggregation, batches,
//! SASL), fires registered event callbacks synchronously, and writes
//! formatted outgoing commands to the supplied [`Sink`].
//!
//! ## Features
//!
//! - IRC message parsing with tags, prefixes, verbs and arguments
//! - IRCv3 capability negotiation with deferred registration
//! - BATCH reassembly (nested batches buffer until the root closes)
//! - Multi-stage SASL (PLAIN, EXTERNAL, pluggable mechanisms)
//! - ISUPPORT-driven mode parsing, casemapping and limits
//! - Address book and channel membership tracking across renames
//! - WHOIS aggregation and METADATA draft-2 key-value state
//!
//! ## Quick start
//!
//! ```
//! use slirc_engine::{Client, Identity};
//!
//! let mut client = Client::new(Vec::<u8>::new(), Identity::new("nick", "user", "Real Name"))
//!     .expect("sink accepts the registration burst");
//!
//! client.on_message(|event| {
//!     println!("<{}> {}", event.source.nickname, event.text);
//! });
//!
//! client.push(":server 001 nick :Welcome\r\n").unwrap();
//! assert!(client.is_registered());
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod batch;
pub mod caps;
pub mod casemap;
pub mod channel;
pub mod client;
pub mod error;
pub mod ircv3;
pub mod isupport;
pub mod message;
pub mod metadata;
pub mod mode;
pub mod prefix;
pub mod roster;
pub mod sasl;
pub mod whois;

pub use self::batch::{Batch, BatchFramer, BatchMember, FramedUnit, FramerOutcome};
pub use self::caps::{CapNegotiator, Capability, SUPPORTED_CAPS};
pub use self::casemap::CaseMapping;
pub use self::channel::{Channel, Membership, Topic};
pub use self::client::{Client, Identity, IoSink, Sink};
pub use self::client::{ErrorEvent, ErrorKind, MessageEvent, MessageMetadata, MessageTarget};
pub use self::error::{MessageParseError, ProtocolError, Result};
pub use self::ircv3::{format_server_time, parse_server_time};
pub use self::isupport::{Isupport, PrefixSpec};
pub use self::message::{escape_tag_value, unescape_tag_value, Message, Tag};
pub use self::metadata::{MetadataStore, MetadataValue};
pub use self::mode::{parse_mode_string, to_mode_string, Mode, ModeCategories, ModeCategory, ModeChange};
pub use self::prefix::Prefix;
pub use self::roster::{Roster, User};
pub use self::sasl::{External, Plain, SaslMechanism, SaslSession, SaslStep, SASL_CHUNK_SIZE};
pub use self::whois::{WhoisResponse, WhoisTable};
