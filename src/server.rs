//! Server entities and the server list.
//!
//! A server owns its protocol configuration (casemapping, mode config,
//! capability table), its ordered channel list with the server buffer at
//! index zero, and the read-framing accumulator for its connection.

use std::sync::Arc;

use crate::caps::Caps;
use crate::casemap::{is_chan, is_nick, Casemap};
use crate::channel::{Channel, ChannelKind, ChannelList};
use crate::ctcp::CTCP_DELIM;
use crate::io::Connection;
use crate::mode::{Mode, ModeCfg};
use crate::sasl::SaslAuth;
use crate::user::UserList;

/// RFC 2812, section 2.3: 512 bytes per line including CRLF.
pub const READ_LEN_MAX: usize = 510;

/// Read-framing accumulator: `\r` terminates a line, `\n` is discarded,
/// only printable characters, space and the CTCP delimiter are accepted.
/// A full buffer without a terminator drops the line.
#[derive(Debug, Default)]
struct ReadBuf {
    buf: Vec<u8>,
    skip: bool,
}

impl ReadBuf {
    fn read(&mut self, c: u8) -> Option<String> {
        match c {
            b'\r' => {
                let skip = std::mem::take(&mut self.skip);
                let line = std::mem::take(&mut self.buf);

                if skip || line.is_empty() {
                    return None;
                }

                Some(String::from_utf8_lossy(&line).into_owned())
            }
            b'\n' => None,
            0x20..=0x7E | CTCP_DELIM => {
                if self.skip {
                    return None;
                }
                if self.buf.len() == READ_LEN_MAX {
                    self.buf.clear();
                    self.skip = true;
                    return None;
                }
                self.buf.push(c);
                None
            }
            _ => None,
        }
    }
}

/// A configured IRC server and everything owned by it.
pub struct Server {
    /// Stable identity used as the connection callback object; list
    /// indices shift as servers are removed, this does not.
    pub uid: usize,
    pub host: String,
    pub port: u16,
    pub pass: Option<String>,
    pub username: String,
    pub realname: String,

    /// Nick candidates, rotated on collision.
    pub nicks: Vec<String>,
    nick_cursor: usize,
    /// Active nick.
    pub nick: String,

    pub casemapping: Casemap,
    pub mode_cfg: ModeCfg,
    pub usermodes: Mode,
    pub usermodes_str: String,

    /// Nicks whose messages are dropped.
    pub ignore: UserList,
    /// Channels, with the server buffer at index 0.
    pub channels: ChannelList,

    pub caps: Caps,
    pub sasl: Option<SaslAuth>,

    pub registered: bool,
    pub quitting: bool,
    /// Seconds of ping-phase silence, 0 when the link is live.
    pub ping: u32,

    pub connection: Option<Arc<Connection>>,

    read_buf: ReadBuf,
}

impl Server {
    pub fn new(
        host: &str,
        port: u16,
        pass: Option<&str>,
        username: &str,
        realname: &str,
    ) -> Server {
        let mut channels = ChannelList::default();
        channels.add(Channel::new(host, ChannelKind::Server));

        Server {
            uid: 0,
            host: host.to_string(),
            port,
            pass: pass.map(str::to_string),
            username: username.to_string(),
            realname: realname.to_string(),
            nicks: Vec::new(),
            nick_cursor: 0,
            nick: String::new(),
            casemapping: Casemap::default(),
            mode_cfg: ModeCfg::default(),
            usermodes: Mode::default(),
            usermodes_str: String::new(),
            ignore: UserList::default(),
            channels,
            caps: Caps::default(),
            sasl: None,
            registered: false,
            quitting: false,
            ping: 0,
            connection: None,
            read_buf: ReadBuf::default(),
        }
    }

    /// Replace the nick candidate list; comma and/or space separated.
    pub fn set_nicks(&mut self, nicks: &str) -> Result<(), ()> {
        let parsed: Vec<String> = nicks
            .split([',', ' '])
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        if parsed.is_empty() || !parsed.iter().all(|n| is_nick(n)) {
            return Err(());
        }

        self.nicks = parsed;
        self.nick_cursor = 0;

        Ok(())
    }

    /// Add channels to be joined, comma separated.
    pub fn set_chans(&mut self, chans: &str) -> Result<(), ()> {
        let parsed: Vec<&str> = chans.split(',').filter(|c| !c.is_empty()).collect();

        if parsed.is_empty() || !parsed.iter().all(|c| is_chan(c)) {
            return Err(());
        }

        for chan in parsed {
            if self.channels.get(self.casemapping, chan).is_none() {
                self.channels.add(Channel::new(chan, ChannelKind::Channel));
            }
        }

        Ok(())
    }

    /// Advance to the next nick candidate. Returns false when the list
    /// is exhausted.
    pub fn nicks_next(&mut self) -> bool {
        if self.nick_cursor >= self.nicks.len() {
            return false;
        }

        self.nick = self.nicks[self.nick_cursor].clone();
        self.nick_cursor += 1;

        true
    }

    /// Adopt a server-confirmed nick.
    pub fn nick_set(&mut self, nick: &str) {
        self.nick = nick.to_string();
    }

    /// Reset per-connection state ahead of registration.
    pub fn reset(&mut self) {
        self.nick_cursor = 0;
        self.registered = false;
        self.quitting = false;
        self.ping = 0;
        self.usermodes.reset();
        self.usermodes_str.clear();
        self.caps.reset();
        self.read_buf = ReadBuf::default();

        if let Some(sasl) = &mut self.sasl {
            sasl.state = crate::sasl::SaslState::None;
        }
    }

    /// Feed received bytes through the framing accumulator, yielding
    /// complete lines.
    pub fn read(&mut self, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|&c| self.read_buf.read(c)).collect()
    }

    /// Ingest numeric 004 (RPL_MYINFO):
    /// `<server_name> <version> <user_modes> <chan_modes>`.
    ///
    /// Returns reportable error lines; defaults are retained for
    /// rejected values.
    pub fn set_004(&mut self, params: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let mut args = params.split(' ').filter(|a| !a.is_empty());

        let _server_name = args.next();
        let _version = args.next();
        let user_modes = args.next();
        let chan_modes = args.next();

        match user_modes {
            None => errors.push("invalid numeric 004: user_modes is null".to_string()),
            Some(modes) => {
                if self.mode_cfg.set_usermodes(modes).is_err() {
                    errors.push(format!("invalid numeric 004 user_modes: {}", modes));
                }
            }
        }

        match chan_modes {
            None => errors.push("invalid numeric 004: chan_modes is null".to_string()),
            Some(modes) => {
                if self.mode_cfg.set_chanmodes(modes).is_err() {
                    errors.push(format!("invalid numeric 004 chan_modes: {}", modes));
                }
            }
        }

        errors
    }

    /// Ingest numeric 005 (RPL_ISUPPORT) options. Handled options:
    /// CHANMODES, PREFIX, MODES, CASEMAPPING; everything else is
    /// advisory.
    ///
    /// Returns reportable error lines; prior configuration is retained
    /// for rejected values.
    pub fn set_005(&mut self, params: &str) -> Vec<String> {
        let mut errors = Vec::new();

        for opt in params.split(' ').filter(|o| !o.is_empty()) {
            if opt.starts_with(':') {
                break;
            }

            let (arg, val) = match opt.split_once('=') {
                Some((a, v)) => (a, Some(v)),
                None => (opt, None),
            };

            match arg {
                "CHANMODES" => {
                    if val.map_or(true, |v| self.mode_cfg.set_subtypes(v).is_err()) {
                        errors.push(format!("invalid CHANMODES: {}", val.unwrap_or("")));
                    }
                }
                "PREFIX" => {
                    if val.map_or(true, |v| self.mode_cfg.set_prefix(v).is_err()) {
                        errors.push(format!("invalid PREFIX: {}", val.unwrap_or("")));
                    }
                }
                "MODES" => {
                    if val.map_or(true, |v| self.mode_cfg.set_modes(v).is_err()) {
                        errors.push(format!("invalid MODES: {}", val.unwrap_or("")));
                    }
                }
                "CASEMAPPING" => match val.and_then(Casemap::parse) {
                    Some(cm) => self.casemapping = cm,
                    None => {
                        errors.push(format!("invalid CASEMAPPING: {}", val.unwrap_or("")))
                    }
                },
                _ => (),
            }
        }

        errors
    }
}

/// Servers in insertion order, identified by `(host, port)`.
#[derive(Default)]
pub struct ServerList {
    servers: Vec<Server>,
}

impl ServerList {
    pub fn count(&self) -> usize {
        self.servers.len()
    }

    /// Find a server index by `(host, port)`.
    pub fn get(&self, host: &str, port: u16) -> Option<usize> {
        self.servers
            .iter()
            .position(|s| s.host == host && s.port == port)
    }

    /// Add a server; re-adding an existing `(host, port)` returns the
    /// existing index.
    pub fn add(&mut self, server: Server) -> Result<usize, usize> {
        if let Some(at) = self.get(&server.host, server.port) {
            return Err(at);
        }

        self.servers.push(server);
        Ok(self.servers.len() - 1)
    }

    pub fn del(&mut self, index: usize) -> Server {
        self.servers.remove(index)
    }

    pub fn index(&self, i: usize) -> &Server {
        &self.servers[i]
    }

    pub fn index_mut(&mut self, i: usize) -> &mut Server {
        &mut self.servers[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Server> {
        self.servers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Server> {
        self.servers.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Server {
        Server::new("irc.example.org", 6697, None, "user", "real")
    }

    #[test]
    fn test_server_buffer_channel() {
        let s = server();
        assert_eq!(s.channels.count(), 1);
        assert_eq!(s.channels.index(0).name, "irc.example.org");
        assert_eq!(s.channels.index(0).kind, ChannelKind::Server);
    }

    #[test]
    fn test_nick_rotation() {
        let mut s = server();
        s.set_nicks("nick, nick_ nick__").unwrap();

        assert!(s.nicks_next());
        assert_eq!(s.nick, "nick");
        assert!(s.nicks_next());
        assert_eq!(s.nick, "nick_");
        assert!(s.nicks_next());
        assert_eq!(s.nick, "nick__");
        assert!(!s.nicks_next());
        assert_eq!(s.nick, "nick__");
    }

    #[test]
    fn test_set_nicks_invalid() {
        let mut s = server();
        assert!(s.set_nicks("0bad").is_err());
        assert!(s.set_nicks("").is_err());
        assert!(s.set_nicks("good, 1bad").is_err());
    }

    #[test]
    fn test_set_chans() {
        let mut s = server();
        s.set_chans("#a,#b").unwrap();
        assert_eq!(s.channels.count(), 3);
        assert!(s.set_chans("nochan").is_err());

        /* re-adding is a no-op */
        s.set_chans("#a").unwrap();
        assert_eq!(s.channels.count(), 3);
    }

    #[test]
    fn test_reset() {
        let mut s = server();
        s.set_nicks("a,b").unwrap();
        s.nicks_next();
        s.nicks_next();
        s.registered = true;
        s.ping = 100;

        s.reset();

        assert!(!s.registered);
        assert_eq!(s.ping, 0);
        assert!(s.nicks_next());
        assert_eq!(s.nick, "a");
    }

    #[test]
    fn test_read_framing() {
        let mut s = server();

        assert!(s.read(b"PING :irc.example").is_empty());
        let lines = s.read(b".org\r\nNOTICE");
        assert_eq!(lines, vec!["PING :irc.example.org"]);

        let lines = s.read(b" * :hi\r\n");
        assert_eq!(lines, vec!["NOTICE * :hi"]);
    }

    #[test]
    fn test_read_filters_unprintable() {
        let mut s = server();
        let lines = s.read(b"A\x02B\x1bC\x01D\r\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_bytes(), b"AB\x01D");
    }

    #[test]
    fn test_read_overflow_drops_line() {
        let mut s = server();

        let long = vec![b'x'; READ_LEN_MAX + 1];
        assert!(s.read(&long).is_empty());
        assert!(s.read(b"\r\n").is_empty());

        let lines = s.read(b"ok\r\n");
        assert_eq!(lines, vec!["ok"]);
    }

    #[test]
    fn test_server_list_identity() {
        let mut sl = ServerList::default();

        let a = sl.add(Server::new("h1", 6667, None, "u", "r")).unwrap();
        sl.add(Server::new("h1", 6697, None, "u", "r")).unwrap();

        assert_eq!(sl.count(), 2);
        assert_eq!(sl.add(Server::new("h1", 6667, None, "u", "r")), Err(a));
        assert_eq!(sl.get("h1", 6697), Some(1));
        assert_eq!(sl.get("h2", 6667), None);
    }

    #[test]
    fn test_set_004() {
        let mut s = server();

        let errors = s.set_004("srv.tld ircd-2.0 iowz bcdklmnt");
        assert!(errors.is_empty());
        assert!(s.mode_cfg.usermodes.is_set('z'));
        assert!(s.mode_cfg.chanmodes.is_set('t'));
        assert!(!s.mode_cfg.chanmodes.is_set('z'));

        let errors = s.set_004("srv.tld ircd-2.0");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_set_005() {
        let mut s = server();

        let errors = s.set_005("CHANMODES=eIb,k,l,imnpst PREFIX=(ov)@+ MODES=4 UNKNOWN=x");
        assert!(errors.is_empty());
        assert!(s.mode_cfg.subtype_a.is_set('e'));
        assert_eq!(s.mode_cfg.modes_max, 4);

        let errors = s.set_005("CASEMAPPING=ascii");
        assert!(errors.is_empty());
        assert_eq!(s.casemapping, Casemap::Ascii);

        let errors = s.set_005("CASEMAPPING=latin1 MODES=0");
        assert_eq!(errors.len(), 2);
        assert_eq!(s.casemapping, Casemap::Ascii);
        assert_eq!(s.mode_cfg.modes_max, 4);
    }
}
