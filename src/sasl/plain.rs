//! PLAIN mechanism (RFC 4616).

use super::SaslMechanism;

/// SASL PLAIN: `authzid \0 authcid \0 password` in a single payload.
pub struct Plain {
    authzid: String,
    authcid: String,
    password: String,
    sent: bool,
}

impl Plain {
    /// Credentials with an empty authorization identity (the common case).
    pub fn new(authcid: impl Into<String>, password: impl Into<String>) -> Self {
        Plain {
            authzid: String::new(),
            authcid: authcid.into(),
            password: password.into(),
            sent: false,
        }
    }

    /// Credentials with an explicit authorization identity.
    pub fn with_authzid(
        authzid: impl Into<String>,
        authcid: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Plain {
            authzid: authzid.into(),
            authcid: authcid.into(),
            password: password.into(),
            sent: false,
        }
    }
}

impl SaslMechanism for Plain {
    fn name(&self) -> &str {
        "PLAIN"
    }

    fn challenge(&mut self, _data: &[u8]) {}

    fn next_payload(&mut self) -> Option<Vec<u8>> {
        if self.sent {
            return None;
        }
        self.sent = true;

        let mut payload =
            Vec::with_capacity(self.authzid.len() + self.authcid.len() + self.password.len() + 2);
        payload.extend_from_slice(self.authzid.as_bytes());
        payload.push(0);
        payload.extend_from_slice(self.authcid.as_bytes());
        payload.push(0);
        payload.extend_from_slice(self.password.as_bytes());
        Some(payload)
    }
}
