//! IRCv3 capability negotiation.
//!
//! `CAP <targ> <sub> [*] [:params]` dispatch. During registration,
//! advertised capabilities are collected across multi-line `LS`
//! continuations; requests are issued after the final line, and
//! `CAP END` is sent once no request is outstanding and no SASL
//! exchange is in flight.

use crate::error::CapError;
use crate::message::Message;
use crate::sasl::SaslState;
use crate::state::Client;

impl Client {
    pub(crate) fn recv_cap(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        if m.param().is_none() {
            return self.failf(sid, "CAP: target is null");
        }

        let Some(cmnd) = m.param() else {
            return self.failf(sid, "CAP: command is null");
        };

        match cmnd {
            "LS" => self.cap_ls(sid, m),
            "LIST" => self.cap_list(sid, m),
            "ACK" => self.cap_ack(sid, m),
            "NAK" => self.cap_nak(sid, m),
            "NEW" => self.cap_new(sid, m),
            "DEL" => self.cap_del(sid, m),
            _ => self.failf(sid, &format!("CAP: unrecognized subcommand '{}'", cmnd)),
        }
    }

    /// Send `CAP END` when registration is pending and nothing is
    /// outstanding.
    pub(crate) fn cap_try_end(&mut self, sid: usize) {
        let s = self.servers.index(sid);

        let sasl_pending = matches!(
            s.sasl.as_ref().map(|a| a.state),
            Some(SaslState::MechanismSent | SaslState::CredentialsSent)
        );

        if !s.registered && s.caps.cap_reqs == 0 && !sasl_pending {
            self.sendf(sid, "CAP END".to_string());
        }
    }

    /// Begin the SASL exchange once the `sasl` capability is enabled.
    fn sasl_begin(&mut self, sid: usize) {
        let mechanism = {
            let Some(auth) = &mut self.servers.index_mut(sid).sasl else {
                return;
            };
            auth.state = SaslState::MechanismSent;
            auth.mechanism
        };

        self.sendf(sid, format!("AUTHENTICATE {}", mechanism.as_str()));
    }

    fn cap_ls(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let (multiline, list, extra) = cap_params(m);

        let Some(list) = list else {
            return self.failf(sid, "CAP LS: parameter is null");
        };

        if extra {
            return self.failf(sid, "CAP LS: invalid parameters");
        }

        if self.servers.index(sid).registered {
            self.server_info(sid, &format!("CAP LS: {}", list));
            return Ok(());
        }

        {
            let s = self.servers.index_mut(sid);
            for tok in list.split(' ').filter(|t| !t.is_empty()) {
                let name = tok.split('=').next().unwrap_or(tok);
                if let Some(cap) = s.caps.get_mut(name) {
                    cap.supported = true;
                }
            }
        }

        if multiline {
            return Ok(());
        }

        let sasl_configured = self.servers.index(sid).sasl.is_some();

        let reqs: Vec<&'static str> = self
            .servers
            .index(sid)
            .caps
            .iter()
            .filter(|(name, cap)| {
                let auto = cap.req_auto || (*name == "sasl" && sasl_configured);
                cap.supported && cap.supports_req && auto && !cap.set && !cap.req
            })
            .map(|(name, _)| name)
            .collect();

        for &name in &reqs {
            let caps = &mut self.servers.index_mut(sid).caps;
            caps.get_mut(name).unwrap().req = true;
            caps.cap_reqs += 1;
        }

        for name in reqs {
            self.sendf(sid, format!("CAP REQ :{}", name));
        }

        self.cap_try_end(sid);

        Ok(())
    }

    fn cap_list(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let (_, list, extra) = cap_params(m);

        let Some(list) = list else {
            return self.failf(sid, "CAP LIST: parameter is null");
        };

        if extra {
            return self.failf(sid, "CAP LIST: invalid parameters");
        }

        if list.is_empty() {
            self.server_info(sid, "CAP LIST: (no capabilities)");
        } else {
            self.server_info(sid, &format!("CAP LIST: {}", list));
        }

        Ok(())
    }

    fn cap_ack(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(list) = m.param() else {
            return self.failf(sid, "CAP ACK: parameter is null");
        };

        if list.trim().is_empty() {
            return self.failf(sid, "CAP ACK: parameter is empty");
        }

        let sasl_configured = self.servers.index(sid).sasl.is_some();
        let mut errors = 0;

        for tok in list.split(' ').filter(|t| !t.is_empty()) {
            match self.servers.index_mut(sid).caps.ack(tok) {
                Ok(()) => {
                    self.server_info(sid, &format!("capability change accepted: {}", tok));

                    if tok == "sasl" && sasl_configured {
                        self.sasl_begin(sid);
                    }
                }
                Err(e) => {
                    errors += 1;
                    let text = match e {
                        CapError::NotSupported => format!("CAP ACK: '{}' not supported", tok),
                        CapError::NoReq => format!("CAP ACK: '{}' was not requested", tok),
                        CapError::WasSet => format!("CAP ACK: '{}' was set", tok),
                        CapError::WasUnset => format!("CAP ACK: '{}' was not set", tok),
                    };
                    self.server_error(sid, &text);
                }
            }
        }

        if errors > 0 {
            return self.failf(sid, "CAP ACK: parameter errors");
        }

        self.cap_try_end(sid);

        Ok(())
    }

    fn cap_nak(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(list) = m.param() else {
            return self.failf(sid, "CAP NAK: parameter is null");
        };

        if list.trim().is_empty() {
            return self.failf(sid, "CAP NAK: parameter is empty");
        }

        for tok in list.split(' ').filter(|t| !t.is_empty()) {
            self.server_info(sid, &format!("capability change rejected: {}", tok));
            let _ = self.servers.index_mut(sid).caps.nak(tok);
        }

        self.cap_try_end(sid);

        Ok(())
    }

    fn cap_new(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(list) = m.param() else {
            return self.failf(sid, "CAP NEW: parameter is null");
        };

        if list.trim().is_empty() {
            return self.failf(sid, "CAP NEW: parameter is empty");
        }

        let sasl_configured = self.servers.index(sid).sasl.is_some();

        for tok in list.split(' ').filter(|t| !t.is_empty()) {
            let name = tok.split('=').next().unwrap_or(tok);

            let req = {
                let s = self.servers.index_mut(sid);
                let Some(cap) = s.caps.get_mut(name) else {
                    continue;
                };

                cap.supported = true;

                let auto = cap.req_auto || (name == "sasl" && sasl_configured);
                let req = auto && cap.supports_req && !cap.set && !cap.req;

                if req {
                    cap.req = true;
                    s.caps.cap_reqs += 1;
                }

                req
            };

            self.server_info(sid, &format!("new capability: {}", name));

            if req {
                self.sendf(sid, format!("CAP REQ :{}", name));
            }
        }

        Ok(())
    }

    fn cap_del(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(list) = m.param() else {
            return self.failf(sid, "CAP DEL: parameter is null");
        };

        if list.trim().is_empty() {
            return self.failf(sid, "CAP DEL: parameter is empty");
        }

        let mut errors = 0;

        for tok in list.split(' ').filter(|t| !t.is_empty()) {
            let name = tok.split('=').next().unwrap_or(tok);

            let removed = {
                let s = self.servers.index_mut(sid);
                match s.caps.get_mut(name) {
                    None => continue,
                    Some(cap) if !cap.supports_del => false,
                    Some(cap) => {
                        cap.req = false;
                        cap.set = false;
                        cap.supported = false;
                        true
                    }
                }
            };

            if removed {
                self.server_info(sid, &format!("capability lost: {}", name));
            } else {
                errors += 1;
                self.server_error(sid, &format!("CAP DEL: '{}' doesn't support DEL", name));
            }
        }

        if errors > 0 {
            return self.failf(sid, "CAP DEL: parameter errors");
        }

        Ok(())
    }
}

/// CAP subcommand parameter shape: `[*] <list>`, where the `*` marks a
/// multi-line continuation. Returns `(multiline, list, extra)`.
fn cap_params<'a>(m: &mut Message<'a>) -> (bool, Option<&'a str>, bool) {
    let p1 = m.param();

    let (multiline, list) = match p1 {
        Some("*") => (true, m.param()),
        p => (false, p),
    };

    let extra = m.param().is_some();

    (multiline, list, extra)
}
