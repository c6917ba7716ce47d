//! SASL authentication for IRC.
//!
//! The driver sits between the `AUTHENTICATE` wire exchange and pluggable
//! [`SaslMechanism`] implementations. Inbound challenge chunks are
//! reassembled (a chunk shorter than 400 bytes, or a bare `+`, terminates a
//! challenge), base64-decoded and handed to the mechanism; outbound
//! payloads are base64-encoded and split back into 400-byte chunks.
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>
//! - RFC 4616 (PLAIN): <https://tools.ietf.org/html/rfc4616>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

mod external;
mod plain;

pub use external::External;
pub use plain::Plain;

/// Maximum length of a single `AUTHENTICATE` chunk (400 bytes).
pub const SASL_CHUNK_SIZE: usize = 400;

/// A pluggable SASL mechanism.
///
/// The driver feeds each fully reassembled, decoded server challenge to
/// [`challenge`](Self::challenge), then drains successive client payloads
/// from [`next_payload`](Self::next_payload) until it returns `None`.
pub trait SaslMechanism {
    /// The mechanism name as sent in `AUTHENTICATE <name>` (e.g. `PLAIN`).
    fn name(&self) -> &str;

    /// Accept a decoded server challenge (may be empty).
    fn challenge(&mut self, data: &[u8]);

    /// Yield the next raw client payload, or `None` when exhausted.
    fn next_payload(&mut self) -> Option<Vec<u8>>;
}

/// Decode a base64 `AUTHENTICATE` argument; `+` means empty.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if encoded == "+" {
        return Ok(Vec::new());
    }
    BASE64.decode(encoded)
}

/// Encode a raw payload into `AUTHENTICATE` argument chunks.
///
/// An empty payload becomes a single `+`. Longer payloads are base64-encoded
/// and split into 400-byte chunks; when the final chunk is exactly 400 bytes
/// a terminating `+` chunk is appended so the server knows the response is
/// complete.
pub fn encode_payload_chunks(payload: &[u8]) -> Vec<String> {
    if payload.is_empty() {
        return vec!["+".to_owned()];
    }

    let encoded = BASE64.encode(payload);
    let mut chunks: Vec<String> = encoded
        .as_bytes()
        .chunks(SASL_CHUNK_SIZE)
        .map(|c| String::from_utf8(c.to_vec()).expect("base64 is ASCII"))
        .collect();

    if encoded.len() % SASL_CHUNK_SIZE == 0 {
        chunks.push("+".to_owned());
    }
    chunks
}

/// What the driver wants done after ingesting a challenge chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum SaslStep {
    /// The challenge is incomplete; wait for more chunks.
    Pending,
    /// Send these `AUTHENTICATE` arguments.
    Respond(Vec<String>),
    /// The mechanism produced no further payload; wait for the outcome
    /// numeric.
    Exhausted,
    /// The challenge could not be decoded; the exchange should be aborted.
    BadChallenge,
}

/// Driver state for one session's SASL exchanges.
pub struct SaslSession {
    mechanisms: Vec<Box<dyn SaslMechanism>>,
    active: Option<usize>,
    in_flight: bool,
    authenticated: bool,
    buffer: String,
}

impl std::fmt::Debug for SaslSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslSession")
            .field("mechanisms", &self.mechanisms.len())
            .field("active", &self.active)
            .field("in_flight", &self.in_flight)
            .field("authenticated", &self.authenticated)
            .finish()
    }
}

impl SaslSession {
    /// Create a session over the caller's mechanisms, in preference order.
    pub fn new(mechanisms: Vec<Box<dyn SaslMechanism>>) -> Self {
        SaslSession {
            mechanisms,
            active: None,
            in_flight: false,
            authenticated: false,
            buffer: String::new(),
        }
    }

    /// Whether any mechanism is configured.
    pub fn has_mechanisms(&self) -> bool {
        !self.mechanisms.is_empty()
    }

    /// Whether an exchange is currently in progress.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether a previous exchange succeeded.
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Select a mechanism against the server's advertised list and begin an
    /// exchange.
    ///
    /// Picks the first client mechanism whose name appears in `server_list`
    /// (comma-delimited). An absent or empty list - legacy sasl 3.1 - selects
    /// the client's first mechanism. Returns the chosen name.
    pub fn begin(&mut self, server_list: Option<&str>) -> Option<String> {
        let server: Vec<&str> = server_list
            .unwrap_or("")
            .split(',')
            .filter(|m| !m.is_empty())
            .collect();

        let index = if server.is_empty() {
            if self.mechanisms.is_empty() {
                return None;
            }
            0
        } else {
            self.mechanisms
                .iter()
                .position(|m| server.iter().any(|s| s.eq_ignore_ascii_case(m.name())))?
        };

        self.active = Some(index);
        self.in_flight = true;
        self.buffer.clear();
        Some(self.mechanisms[index].name().to_owned())
    }

    /// Ingest one inbound `AUTHENTICATE` argument.
    pub fn feed_chunk(&mut self, chunk: &str) -> SaslStep {
        let Some(index) = self.active else {
            return SaslStep::BadChallenge;
        };

        let complete = if chunk == "+" {
            std::mem::take(&mut self.buffer)
        } else {
            self.buffer.push_str(chunk);
            if chunk.len() < SASL_CHUNK_SIZE {
                std::mem::take(&mut self.buffer)
            } else {
                return SaslStep::Pending;
            }
        };

        let Ok(decoded) = decode_base64(&complete) else {
            return SaslStep::BadChallenge;
        };

        let mechanism = &mut self.mechanisms[index];
        mechanism.challenge(&decoded);
        match mechanism.next_payload() {
            Some(payload) => SaslStep::Respond(encode_payload_chunks(&payload)),
            None => SaslStep::Exhausted,
        }
    }

    /// Terminate the in-flight exchange with its outcome.
    pub fn finish(&mut self, success: bool) {
        self.in_flight = false;
        self.active = None;
        self.buffer.clear();
        if success {
            self.authenticated = true;
        }
    }
}
