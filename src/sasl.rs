//! SASL authentication helpers.
//!
//! PLAIN (RFC 4616) and EXTERNAL payload encoding for the IRCv3 `sasl`
//! capability.
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Supported SASL authentication mechanisms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaslMechanism {
    /// Simple username/password authentication.
    Plain,
    /// TLS client certificate authentication.
    External,
}

impl SaslMechanism {
    /// Canonical mechanism name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::External => "EXTERNAL",
        }
    }
}

/// Progress of an in-flight authentication exchange.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaslState {
    #[default]
    None,
    /// Sent `AUTHENTICATE <mechanism>`, awaiting the `+` challenge.
    MechanismSent,
    /// Sent credentials, awaiting the result numeric.
    CredentialsSent,
    Complete,
}

/// Per-server SASL configuration and exchange state.
#[derive(Clone, Debug)]
pub struct SaslAuth {
    pub mechanism: SaslMechanism,
    pub user: String,
    pub pass: String,
    pub state: SaslState,
}

impl SaslAuth {
    pub fn plain(user: &str, pass: &str) -> SaslAuth {
        SaslAuth {
            mechanism: SaslMechanism::Plain,
            user: user.to_string(),
            pass: pass.to_string(),
            state: SaslState::None,
        }
    }

    /// The base64 payload answering the server's `+` challenge.
    pub fn payload(&self) -> String {
        match self.mechanism {
            SaslMechanism::Plain => encode_plain(&self.user, &self.pass),
            SaslMechanism::External => "+".to_string(),
        }
    }
}

/// Encode credentials for the PLAIN mechanism:
/// `authzid NUL authcid NUL password`, with an empty authzid.
pub fn encode_plain(username: &str, password: &str) -> String {
    let payload = format!("\0{}\0{}", username, password);
    BASE64.encode(payload.as_bytes())
}
