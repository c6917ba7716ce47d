//! EXTERNAL mechanism.
//!
//! Authentication happens out of band (TLS client certificate); the client
//! sends a single empty payload.

use super::SaslMechanism;

/// SASL EXTERNAL: one empty payload.
#[derive(Default)]
pub struct External {
    sent: bool,
}

impl External {
    /// Create the mechanism.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaslMechanism for External {
    fn name(&self) -> &str {
        "EXTERNAL"
    }

    fn challenge(&mut self, _data: &[u8]) {}

    fn next_payload(&mut self) -> Option<Vec<u8>> {
        if self.sent {
            return None;
        }
        self.sent = true;
        Some(Vec::new())
    }
}
