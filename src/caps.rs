//! IRCv3 capability state.
//!
//! One record per capability known to the client, plus a server-wide
//! count of outstanding REQs that gates sending `CAP END` during
//! registration.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use crate::error::CapError;

/// CAP LS version sent on connect.
pub const CAP_VERSION: &str = "302";

const CAP_AUTO: u8 = 1 << 0;
const CAP_NO_DEL: u8 = 1 << 1;
const CAP_NO_REQ: u8 = 1 << 2;

/// Capabilities known to the client: `(name, attributes)`.
///
/// Auto capabilities are requested during registration as soon as the
/// server advertises them. `sasl` is requested only when credentials
/// are configured, and refuses CAP DEL: an authentication already
/// performed cannot be un-negotiated.
const CAP_DEFS: &[(&str, u8)] = &[
    ("account-notify", CAP_AUTO),
    ("away-notify", CAP_AUTO),
    ("chghost", CAP_AUTO),
    ("extended-join", CAP_AUTO),
    ("invite-notify", CAP_AUTO),
    ("multi-prefix", CAP_AUTO),
    ("sasl", CAP_NO_DEL),
];

/// Negotiation state of a single capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cap {
    /// CAP REQ sent, response outstanding.
    pub req: bool,
    /// REQ automatically during registration.
    pub req_auto: bool,
    /// Currently enabled.
    pub set: bool,
    /// Advertised by the server.
    pub supported: bool,
    /// May be revoked via CAP DEL.
    pub supports_del: bool,
    /// May be requested via CAP REQ.
    pub supports_req: bool,
}

/// Per-server capability table.
#[derive(Debug, Clone)]
pub struct Caps {
    caps: Vec<Cap>,
    /// Outstanding REQs; registration completes when this reaches zero.
    pub cap_reqs: u32,
}

impl Default for Caps {
    fn default() -> Self {
        Caps {
            caps: CAP_DEFS
                .iter()
                .map(|&(_, attrs)| Cap {
                    req_auto: attrs & CAP_AUTO != 0,
                    supports_del: attrs & CAP_NO_DEL == 0,
                    supports_req: attrs & CAP_NO_REQ == 0,
                    ..Cap::default()
                })
                .collect(),
            cap_reqs: 0,
        }
    }
}

impl Caps {
    /// Look up a capability record by name.
    pub fn get(&self, name: &str) -> Option<&Cap> {
        CAP_DEFS
            .iter()
            .position(|&(n, _)| n == name)
            .map(|i| &self.caps[i])
    }

    /// Mutable lookup by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Cap> {
        CAP_DEFS
            .iter()
            .position(|&(n, _)| n == name)
            .map(|i| &mut self.caps[i])
    }

    /// Iterate `(name, cap)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Cap)> {
        CAP_DEFS.iter().map(|&(n, _)| n).zip(self.caps.iter())
    }

    /// Iterate `(name, cap)` pairs mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&'static str, &mut Cap)> {
        CAP_DEFS.iter().map(|&(n, _)| n).zip(self.caps.iter_mut())
    }

    /// Clear negotiation state, keeping the static attributes.
    pub fn reset(&mut self) {
        for cap in &mut self.caps {
            cap.req = false;
            cap.set = false;
            cap.supported = false;
        }
        self.cap_reqs = 0;
    }

    /// Apply a `CAP ACK` token, with optional leading `-` meaning
    /// "disabled". Clears the outstanding request and flips `set`.
    pub fn ack(&mut self, token: &str) -> Result<(), CapError> {
        let (unset, name) = match token.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, token),
        };

        let outstanding = self.cap_reqs;

        let cap = self.get_mut(name).ok_or(CapError::NotSupported)?;

        if !cap.req {
            return Err(CapError::NoReq);
        }

        cap.req = false;

        if !unset && cap.set {
            return Err(CapError::WasSet);
        }

        if unset && !cap.set {
            return Err(CapError::WasUnset);
        }

        cap.set = !unset;

        if outstanding > 0 {
            self.cap_reqs = outstanding - 1;
        }

        Ok(())
    }

    /// Apply a `CAP NAK` token: the outstanding request is cleared and
    /// `set` is left unchanged.
    pub fn nak(&mut self, token: &str) -> Result<(), CapError> {
        let (unset, name) = match token.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, token),
        };

        let outstanding = self.cap_reqs;

        let cap = self.get_mut(name).ok_or(CapError::NotSupported)?;

        if !cap.req {
            return Err(CapError::NoReq);
        }

        cap.req = false;

        if !unset && cap.set {
            return Err(CapError::WasSet);
        }

        if unset && !cap.set {
            return Err(CapError::WasUnset);
        }

        if outstanding > 0 {
            self.cap_reqs = outstanding - 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let caps = Caps::default();

        let mp = caps.get("multi-prefix").unwrap();
        assert!(mp.req_auto);
        assert!(mp.supports_del);
        assert!(mp.supports_req);
        assert!(!mp.set);

        let sasl = caps.get("sasl").unwrap();
        assert!(!sasl.req_auto);
        assert!(!sasl.supports_del);
        assert!(sasl.supports_req);

        assert!(caps.get("unknown-cap").is_none());
    }

    #[test]
    fn test_ack() {
        let mut caps = Caps::default();

        assert_eq!(caps.ack("multi-prefix"), Err(CapError::NoReq));
        assert_eq!(caps.ack("unknown"), Err(CapError::NotSupported));

        caps.get_mut("multi-prefix").unwrap().req = true;
        caps.cap_reqs = 1;

        assert!(caps.ack("multi-prefix").is_ok());
        assert!(caps.get("multi-prefix").unwrap().set);
        assert!(!caps.get("multi-prefix").unwrap().req);
        assert_eq!(caps.cap_reqs, 0);

        /* ack again: nothing outstanding */
        assert_eq!(caps.ack("multi-prefix"), Err(CapError::NoReq));

        /* enable when already set */
        caps.get_mut("multi-prefix").unwrap().req = true;
        assert_eq!(caps.ack("multi-prefix"), Err(CapError::WasSet));

        /* disable */
        caps.get_mut("multi-prefix").unwrap().req = true;
        assert!(caps.ack("-multi-prefix").is_ok());
        assert!(!caps.get("multi-prefix").unwrap().set);

        /* disable when already unset */
        caps.get_mut("multi-prefix").unwrap().req = true;
        assert_eq!(caps.ack("-multi-prefix"), Err(CapError::WasUnset));
    }

    #[test]
    fn test_nak_leaves_set() {
        let mut caps = Caps::default();

        caps.get_mut("away-notify").unwrap().req = true;
        caps.cap_reqs = 1;

        assert!(caps.nak("away-notify").is_ok());
        let cap = caps.get("away-notify").unwrap();
        assert!(!cap.req);
        assert!(!cap.set);
        assert_eq!(caps.cap_reqs, 0);

        /* rejected disable keeps the cap enabled */
        caps.get_mut("chghost").unwrap().set = true;
        caps.get_mut("chghost").unwrap().req = true;
        caps.cap_reqs = 1;

        assert!(caps.nak("-chghost").is_ok());
        assert!(caps.get("chghost").unwrap().set);
        assert_eq!(caps.cap_reqs, 0);
    }

    #[test]
    fn test_cap_reqs_floor() {
        let mut caps = Caps::default();

        caps.get_mut("chghost").unwrap().req = true;
        assert!(caps.ack("chghost").is_ok());
        assert_eq!(caps.cap_reqs, 0);
    }

    #[test]
    fn test_reset() {
        let mut caps = Caps::default();

        caps.get_mut("multi-prefix").unwrap().set = true;
        caps.get_mut("multi-prefix").unwrap().supported = true;
        caps.cap_reqs = 3;

        caps.reset();

        let mp = caps.get("multi-prefix").unwrap();
        assert!(!mp.set && !mp.supported);
        assert!(mp.req_auto);
        assert_eq!(caps.cap_reqs, 0);
    }
}
