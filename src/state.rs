//! The coordinator: single owner of all protocol and UI state.
//!
//! One [`Client`] owns the server list, every channel and buffer, and
//! the current-channel focus. Connection workers call back into it
//! through [`IoCallbacks`] under one shared mutex, so every state
//! mutation happens in a total order.
//!
//! Outgoing wire lines produced by handlers are buffered in a per-batch
//! outbox and flushed after the batch, so no handler re-enters the I/O
//! engine while the coordinator lock is held.
//!
//! Rendering is external: the client accumulates draw flags and exposes
//! the entity graph; a terminal front end consumes both.

use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::buffer::LineType;
use crate::channel::{Activity, Channel, ChannelKind};
use crate::error::IoError;
use crate::io::{Connection, IoCallbacks, IoConfig, IoFlags, SharedCallbacks};
use crate::message::Message;
use crate::server::{Server, ServerList};
use crate::user::UserList;

pub(crate) const FROM_INFO: &str = "--";
pub(crate) const FROM_ERROR: &str = "-!!-";
pub(crate) const FROM_UNKNOWN: &str = "-??-";
pub(crate) const FROM_JOIN: &str = ">>";
pub(crate) const FROM_PART: &str = "<<";
pub(crate) const FROM_QUIT: &str = "<<";
pub(crate) const FROM_NICK: &str = "--";

pub(crate) const VERSION_STR: &str = concat!("slirc v", env!("CARGO_PKG_VERSION"));
pub(crate) const SOURCE_URL: &str = "https://github.com/sid3xyz/slirc";

const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const CTRL_F: u8 = 0x06;
const CTRL_L: u8 = 0x0C;
const CTRL_N: u8 = 0x0E;
const CTRL_P: u8 = 0x10;
const CTRL_U: u8 = 0x15;
const CTRL_X: u8 = 0x18;
const TAB: u8 = 0x09;
const LINE_FEED: u8 = 0x0A;
const ESC: u8 = 0x1B;
const BACKSPACE: u8 = 0x7F;

/// IRC commands for `/`-prefix completion.
const IRC_COMMAND_LIST: &[&str] = &[
    "ctcp-action",
    "ctcp-clientinfo",
    "ctcp-finger",
    "ctcp-ping",
    "ctcp-source",
    "ctcp-time",
    "ctcp-userinfo",
    "ctcp-version",
    "admin", "connect", "ignore", "info", "invite", "join", "kick", "kill",
    "links", "list", "lusers", "me", "mode", "motd", "msg", "names", "nick",
    "notice", "oper", "part", "pass", "ping", "pong", "privmsg", "quit",
    "raw", "servlist", "squery", "stats", "time", "topic", "trace",
    "unignore", "user", "version", "who", "whois", "whowas",
];

/// Local commands for `:`-prefix completion.
const CMD_LIST: &[&str] = &["clear", "close", "connect", "disconnect", "quit", "set"];

/// A channel address: the root buffer, or a channel of a server.
///
/// Indices are only valid within a single handler batch; nothing stores
/// them across mutations of the server or channel lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Root,
    Chan { sid: usize, cid: usize },
}

/// Render work accumulated since the last repaint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawFlags {
    pub buffer: bool,
    pub input: bool,
    pub nav: bool,
    pub status: bool,
    pub bell: bool,
}

impl DrawFlags {
    pub fn all() -> DrawFlags {
        DrawFlags {
            buffer: true,
            input: true,
            nav: true,
            status: true,
            bell: false,
        }
    }

    pub fn any(&self) -> bool {
        *self != DrawFlags::default()
    }
}

/// Client-wide configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub username: String,
    pub realname: String,
    /// Default nick candidates for new servers.
    pub nicks: Vec<String>,
    /// User count beyond which join lines are suppressed; 0 disables.
    pub join_threshold: usize,
    /// User count beyond which part lines are suppressed; 0 disables.
    pub part_threshold: usize,
    /// User count beyond which quit lines are suppressed; 0 disables.
    pub quit_threshold: usize,
    pub quit_message: String,
    pub part_message: String,
    pub io: IoConfig,
    pub flags: IoFlags,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let user = std::env::var("USER").unwrap_or_else(|_| "slirc".to_string());

        ClientConfig {
            username: user.clone(),
            realname: user.clone(),
            nicks: vec![user],
            join_threshold: 0,
            part_threshold: 0,
            quit_threshold: 0,
            quit_message: VERSION_STR.to_string(),
            part_message: VERSION_STR.to_string(),
            io: IoConfig::default(),
            flags: IoFlags::default(),
        }
    }
}

/// An input-line prompt awaiting user confirmation or search input.
enum Action {
    FindChannel {
        search: String,
        result: Option<Target>,
    },
    CloseServer {
        sid: usize,
    },
}

/// The coordinator.
pub struct Client {
    pub config: ClientConfig,
    pub(crate) servers: ServerList,
    pub(crate) root: Channel,
    pub(crate) current: Target,
    pub(crate) outgoing: Vec<(usize, String)>,
    draw: DrawFlags,
    action: Option<Action>,
    quit: bool,
    cols: u16,
    rows: u16,
    next_uid: usize,
    self_ref: Weak<Mutex<Client>>,
}

impl Client {
    /// Create the shared client; connection callbacks target the
    /// returned mutex.
    pub fn new_shared(config: ClientConfig) -> Arc<Mutex<Client>> {
        let client = Arc::new(Mutex::new(Client::new(config)));
        client.lock().unwrap().self_ref = Arc::downgrade(&client);
        client
    }

    pub fn new(config: ClientConfig) -> Client {
        let mut root = Channel::new("slirc", ChannelKind::Rirc);
        root.buffer.push(LineType::Other, FROM_INFO, VERSION_STR, None);
        root.buffer.push(LineType::Other, FROM_INFO, SOURCE_URL, None);

        Client {
            config,
            servers: ServerList::default(),
            root,
            current: Target::Root,
            outgoing: Vec::new(),
            draw: DrawFlags::all(),
            action: None,
            quit: false,
            cols: 80,
            rows: 24,
            next_uid: 0,
            self_ref: Weak::new(),
        }
    }

    /* ------------------------------------------------------------------ *
     * Accessors for the renderer
     * ------------------------------------------------------------------ */

    pub fn servers(&self) -> &ServerList {
        &self.servers
    }

    pub fn current(&self) -> Target {
        self.current
    }

    pub fn channel(&self, t: Target) -> &Channel {
        match t {
            Target::Root => &self.root,
            Target::Chan { sid, cid } => self.servers.index(sid).channels.index(cid),
        }
    }

    pub fn channel_mut(&mut self, t: Target) -> &mut Channel {
        match t {
            Target::Root => &mut self.root,
            Target::Chan { sid, cid } => self.servers.index_mut(sid).channels.index_mut(cid),
        }
    }

    /// All channel addresses in navigation order.
    pub fn targets(&self) -> Vec<Target> {
        let mut out = vec![Target::Root];

        for (sid, s) in self.servers.iter().enumerate() {
            for cid in 0..s.channels.count() {
                out.push(Target::Chan { sid, cid });
            }
        }

        out
    }

    /// The active prompt line, if an action is in progress.
    pub fn action_message(&self) -> Option<String> {
        match &self.action {
            None => None,
            Some(Action::CloseServer { sid }) => {
                let s = self.servers.index(*sid);
                let chans = s.channels.count() - 1;
                Some(if chans > 0 {
                    format!("Close server '{}'? Channels: {}   [y/n]", s.host, chans)
                } else {
                    format!("Close server '{}'?   [y/n]", s.host)
                })
            }
            Some(Action::FindChannel { search, result }) => Some(match result {
                None if search.is_empty() => "Find: ".to_string(),
                None => format!("Find: NO MATCH -- {}", search),
                Some(t) => {
                    let c = self.channel(*t);
                    match (*t, self.current) {
                        (Target::Chan { sid, .. }, Target::Chan { sid: cur, .. })
                            if sid == cur =>
                        {
                            format!("Find: {} -- {}", c.name, search)
                        }
                        (Target::Chan { sid, .. }, _) => {
                            let s = self.servers.index(sid);
                            if s.port == 6667 {
                                format!("Find: {}/{} -- {}", s.host, c.name, search)
                            } else {
                                format!("Find: {}:{}/{} -- {}", s.host, s.port, c.name, search)
                            }
                        }
                        _ => format!("Find: {} -- {}", c.name, search),
                    }
                }
            }),
        }
    }

    /// Renderer-reported terminal dimensions, for buffer paging.
    pub fn set_dimensions(&mut self, cols: u16, rows: u16) {
        self.cols = cols.max(1);
        self.rows = rows.max(5);
        self.draw = DrawFlags::all();
    }

    /// Take and clear the accumulated draw flags.
    pub fn take_draw(&mut self) -> DrawFlags {
        std::mem::take(&mut self.draw)
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /* ------------------------------------------------------------------ *
     * Embedder-owned transport
     * ------------------------------------------------------------------ */

    /// Add a server without arming a connection, for embedders (and
    /// tests) that own their transport. Re-adding an existing
    /// `(host, port)` returns the existing index.
    pub fn add_server(&mut self, mut server: Server) -> usize {
        server.uid = self.next_uid;
        self.next_uid += 1;

        match self.servers.add(server) {
            Ok(sid) | Err(sid) => sid,
        }
    }

    pub fn servers_mut(&mut self) -> &mut ServerList {
        &mut self.servers
    }

    /// Feed one received, CRLF-trimmed line through parse and dispatch.
    /// Replies accumulate in the outbox.
    pub fn recv_line(&mut self, sid: usize, line: &str) {
        match Message::parse(line) {
            Ok(mut m) => {
                let _ = self.irc_recv(sid, &mut m);
            }
            Err(e) => {
                self.server_error(sid, &format!("failed to parse message: {}", e));
            }
        }
    }

    /// Drain the outbox of `(server uid, line)` pairs without writing
    /// them to any connection.
    pub fn take_outgoing(&mut self) -> Vec<(usize, String)> {
        std::mem::take(&mut self.outgoing)
    }

    /* ------------------------------------------------------------------ *
     * Lines and sends
     * ------------------------------------------------------------------ */

    pub(crate) fn newline(&mut self, t: Target, lt: LineType, from: &str, text: &str) {
        let prefix = match (lt, t) {
            (LineType::Chat | LineType::Pinged, Target::Chan { sid, cid }) => {
                let s = self.servers.index(sid);
                s.channels
                    .index(cid)
                    .users
                    .get(s.casemapping, from)
                    .and_then(|u| u.prefix())
            }
            _ => None,
        };

        let is_current = t == self.current;

        let ch = self.channel_mut(t);
        ch.buffer.push(lt, from, text, prefix);

        if is_current {
            self.draw.buffer = true;
        } else {
            let activity = match lt {
                LineType::Join | LineType::Part | LineType::Quit | LineType::Nick => {
                    Activity::JoinPartQuit
                }
                _ => Activity::Active,
            };
            self.channel_mut(t).touch_activity(activity);
            self.draw.nav = true;
        }
    }

    pub(crate) fn server_info(&mut self, sid: usize, text: &str) {
        self.newline(
            Target::Chan { sid, cid: 0 },
            LineType::ServerInfo,
            FROM_INFO,
            text,
        );
    }

    pub(crate) fn server_error(&mut self, sid: usize, text: &str) {
        self.newline(
            Target::Chan { sid, cid: 0 },
            LineType::ServerError,
            FROM_ERROR,
            text,
        );
    }

    pub(crate) fn chan_error(&mut self, t: Target, text: &str) {
        self.newline(t, LineType::ServerError, FROM_ERROR, text);
    }

    pub(crate) fn draw_status(&mut self) {
        self.draw.status = true;
    }

    pub(crate) fn draw_bell(&mut self) {
        self.draw.bell = true;
        self.draw.nav = true;
    }

    /// Queue a wire line for the server; flushed after the current
    /// handler batch.
    pub(crate) fn sendf(&mut self, sid: usize, line: String) {
        let uid = self.servers.index(sid).uid;
        self.outgoing.push((uid, line));
    }

    pub(crate) fn flush_outgoing(&mut self) {
        let outgoing = std::mem::take(&mut self.outgoing);

        for (uid, line) in outgoing {
            let Some(sid) = self.sid_by_uid(uid) else {
                continue;
            };

            let conn = self.servers.index(sid).connection.clone();

            let result = match conn {
                Some(conn) => conn.sendf(&line),
                None => Err(IoError::Disconnected),
            };

            if let Err(e) = result {
                self.server_error(sid, &format!("sendf fail: {}", e));
            }
        }
    }

    fn sid_by_uid(&self, uid: usize) -> Option<usize> {
        self.servers.iter().position(|s| s.uid == uid)
    }

    /* ------------------------------------------------------------------ *
     * Server lifecycle
     * ------------------------------------------------------------------ */

    /// Add a server and begin connecting. An existing `(host, port)`
    /// server is re-connected instead.
    #[allow(clippy::too_many_arguments)]
    pub fn connect(
        &mut self,
        host: &str,
        port: u16,
        pass: Option<&str>,
        username: &str,
        realname: &str,
        nicks: &str,
        chans: Option<&str>,
        flags: IoFlags,
    ) -> Result<usize, IoError> {
        if let Some(sid) = self.servers.get(host, port) {
            self.current = Target::Chan { sid, cid: 0 };
            self.server_error(sid, &format!("already connected to {}:{}", host, port));

            if let Some(conn) = self.servers.index(sid).connection.clone() {
                let _ = conn.cx();
            }

            return Ok(sid);
        }

        let mut server = Server::new(host, port, pass, username, realname);

        server.uid = self.next_uid;
        self.next_uid += 1;

        if server.set_nicks(nicks).is_err() {
            let fallback = self.config.nicks.join(",");
            let _ = server.set_nicks(&fallback);
        }

        if let Some(chans) = chans {
            if server.set_chans(chans).is_err() {
                debug!("invalid channel list: {}", chans);
            }
        }

        let Some(cb) = self.self_ref.upgrade() else {
            return Err(IoError::Thread);
        };
        let cb: SharedCallbacks = cb;

        let conn = Connection::new(
            server.uid,
            host,
            port,
            flags,
            self.config.io.clone(),
            &cb,
        );

        server.connection = Some(Arc::clone(&conn));

        let sid = match self.servers.add(server) {
            Ok(sid) => sid,
            Err(sid) => sid,
        };

        self.current = Target::Chan { sid, cid: 0 };
        self.draw = DrawFlags::all();

        conn.cx()?;

        Ok(sid)
    }

    fn close_server(&mut self, sid: usize) {
        let s = self.servers.index(sid);
        let quit_message = self.config.quit_message.clone();

        if let Some(conn) = s.connection.clone() {
            let _ = conn.sendf(&format!("QUIT :{}", quit_message));
            let _ = conn.dx();
        }

        self.servers.del(sid);

        /* re-aim the focus around the removed server */
        self.current = match self.current {
            Target::Chan { sid: cur, .. } if cur == sid => {
                if self.servers.count() == 0 {
                    Target::Root
                } else {
                    Target::Chan {
                        sid: cur.min(self.servers.count() - 1),
                        cid: 0,
                    }
                }
            }
            Target::Chan { sid: cur, cid } if cur > sid => Target::Chan { sid: cur - 1, cid },
            other => other,
        };

        self.draw = DrawFlags::all();
    }

    /// Close a channel. Closing the current channel moves the focus;
    /// closing a server buffer prompts for confirmation first.
    pub(crate) fn channel_close(&mut self, t: Target) {
        match t {
            Target::Root => {
                self.newline(t, LineType::Other, FROM_INFO, "Type :quit to exit slirc");
            }
            Target::Chan { sid, cid: 0 } => {
                self.action = Some(Action::CloseServer { sid });
                self.draw.input = true;
            }
            Target::Chan { sid, cid } => {
                let part_message = self.config.part_message.clone();

                {
                    let ch = self.servers.index(sid).channels.index(cid);
                    if ch.kind == ChannelKind::Channel && ch.joined && !ch.parted {
                        let name = ch.name.clone();
                        self.sendf(sid, format!("PART {} :{}", name, part_message));
                    }
                }

                self.servers.index_mut(sid).channels.del(cid);

                self.current = match self.current {
                    Target::Chan { sid: s, cid: c } if s == sid && c == cid => {
                        let count = self.servers.index(sid).channels.count();
                        Target::Chan {
                            sid,
                            cid: if cid < count { cid } else { 0 },
                        }
                    }
                    Target::Chan { sid: s, cid: c } if s == sid && c > cid => {
                        Target::Chan { sid: s, cid: c - 1 }
                    }
                    other => other,
                };

                self.draw = DrawFlags::all();
            }
        }
    }

    /* ------------------------------------------------------------------ *
     * Navigation
     * ------------------------------------------------------------------ */

    pub(crate) fn channel_set_current(&mut self, t: Target) {
        self.current = t;
        self.channel_mut(t).activity = Activity::Default;
        self.draw = DrawFlags::all();
    }

    fn channel_move(&mut self, forward: bool) {
        let targets = self.targets();
        let at = targets.iter().position(|&t| t == self.current).unwrap_or(0);

        let next = if forward {
            (at + 1) % targets.len()
        } else {
            (at + targets.len() - 1) % targets.len()
        };

        if targets[next] != self.current {
            self.channel_set_current(targets[next]);
        }
    }

    /* ------------------------------------------------------------------ *
     * User input
     * ------------------------------------------------------------------ */

    /// Handle raw bytes read from the terminal.
    pub fn read_input(&mut self, buf: &[u8]) {
        if buf.is_empty() {
            return;
        }

        let redraw_input = if self.action.is_some() {
            self.input_action(buf)
        } else if buf[0].is_ascii_control() {
            self.input_ctrlch(buf)
        } else {
            let printable: Vec<u8> = buf
                .iter()
                .copied()
                .filter(|c| !c.is_ascii_control())
                .collect();
            self.channel_mut(self.current).input.insert(&printable)
        };

        if redraw_input {
            self.draw.input = true;
        }

        self.flush_outgoing();
    }

    fn input_ctrlch(&mut self, buf: &[u8]) -> bool {
        let t = self.current;

        if buf[0] == ESC {
            return match &buf[1..] {
                b"[A" => self.channel_mut(t).input.hist_back(),
                b"[B" => self.channel_mut(t).input.hist_forw(),
                b"[C" => self.channel_mut(t).input.cursor_forw(),
                b"[D" => self.channel_mut(t).input.cursor_back(),
                b"[3~" => self.channel_mut(t).input.delete_forw(),
                b"[H" | b"[1~" => {
                    while self.channel_mut(t).input.cursor_back() {}
                    true
                }
                b"[F" | b"[4~" => {
                    while self.channel_mut(t).input.cursor_forw() {}
                    true
                }
                b"[5~" => {
                    self.scrollback_page(t, false);
                    false
                }
                b"[6~" => {
                    self.scrollback_page(t, true);
                    false
                }
                _ => false,
            };
        }

        match buf[0] {
            BACKSPACE => self.channel_mut(t).input.delete_back(),
            TAB => self.input_complete(),
            LINE_FEED => self.input_linef(),
            CTRL_C => self.channel_mut(t).input.reset(),
            CTRL_F => {
                if matches!(t, Target::Chan { .. }) {
                    self.action = Some(Action::FindChannel {
                        search: String::new(),
                        result: None,
                    });
                    true
                } else {
                    false
                }
            }
            CTRL_L => {
                self.channel_mut(t).buffer.clear();
                self.draw.buffer = true;
                false
            }
            CTRL_P => {
                self.channel_move(false);
                false
            }
            CTRL_N => {
                self.channel_move(true);
                false
            }
            CTRL_X => {
                self.channel_close(t);
                false
            }
            CTRL_U => {
                self.scrollback_page(t, false);
                false
            }
            CTRL_D => {
                self.scrollback_page(t, true);
                false
            }
            _ => false,
        }
    }

    fn scrollback_page(&mut self, t: Target, forward: bool) {
        let cols = self.cols;
        let rows = self.rows.saturating_sub(4).max(1);

        let buffer = &mut self.channel_mut(t).buffer;
        let moved = if forward {
            buffer.page_forw(cols, rows)
        } else {
            buffer.page_back(cols, rows)
        };

        if moved {
            self.draw.buffer = true;
            self.draw.status = true;
        }
    }

    /// Handle line feed: dispatch the input line.
    fn input_linef(&mut self) -> bool {
        let t = self.current;
        let line = self.channel_mut(t).input.write();

        if line.is_empty() {
            return false;
        }

        let _ = match line.as_bytes() {
            [b':', b':', ..] => self.irc_send_privmsg(t, &line[1..]),
            [b':', ..] => {
                self.command(t, &line[1..]);
                Ok(())
            }
            [b'/', b'/', ..] => self.irc_send_privmsg(t, &line[1..]),
            [b'/', ..] => self.irc_send_command(t, &line[1..]),
            _ => self.irc_send_privmsg(t, &line),
        };

        self.channel_mut(t).input.hist_push();

        true
    }

    /* ------------------------------------------------------------------ *
     * Completion
     * ------------------------------------------------------------------ */

    fn input_complete(&mut self) -> bool {
        let t = self.current;

        let (users, cm) = match t {
            Target::Chan { sid, cid } => {
                let s = self.servers.index(sid);
                (s.channels.index(cid).users.clone(), s.casemapping)
            }
            Target::Root => (UserList::default(), Default::default()),
        };

        let mut input = std::mem::take(&mut self.channel_mut(t).input);

        let mut lookup = |buf: &mut [u8], len: usize, first: bool| -> usize {
            complete_word(buf, len, first, &users, cm)
        };

        let changed = input.complete(&mut lookup);

        self.channel_mut(t).input = input;

        changed
    }

    /* ------------------------------------------------------------------ *
     * Actions (prompt-mode input)
     * ------------------------------------------------------------------ */

    fn input_action(&mut self, buf: &[u8]) -> bool {
        let c = buf[0];

        match self.action.take() {
            None => false,
            Some(Action::CloseServer { sid }) => match c {
                b'y' | b'Y' => {
                    self.close_server(sid);
                    true
                }
                b'n' | b'N' | CTRL_C => true,
                _ => {
                    self.action = Some(Action::CloseServer { sid });
                    false
                }
            },
            Some(Action::FindChannel { mut search, result }) => {
                match c {
                    LINE_FEED => {
                        if let Some(t) = result {
                            self.channel_set_current(t);
                        }
                        return true;
                    }
                    ESC | CTRL_C => return true,
                    CTRL_F => {
                        let from = result.unwrap_or(self.current);
                        let next = if result.is_some() {
                            self.search_channels(from, &search)
                        } else {
                            search.clear();
                            None
                        };
                        self.action = Some(Action::FindChannel {
                            search,
                            result: next,
                        });
                    }
                    BACKSPACE => {
                        search.pop();
                        let result = self.search_channels(self.current, &search);
                        self.action = Some(Action::FindChannel { search, result });
                    }
                    c if (0x20..0x7F).contains(&c) => {
                        search.push(c as char);
                        let result = self.search_channels(self.current, &search);
                        self.action = Some(Action::FindChannel { search, result });
                    }
                    _ => {
                        self.action = Some(Action::FindChannel { search, result });
                        return false;
                    }
                }
                true
            }
        }
    }

    /// Incremental channel search: the next channel after `start` whose
    /// name contains `search`.
    fn search_channels(&self, start: Target, search: &str) -> Option<Target> {
        if search.is_empty() {
            return None;
        }

        let targets = self.targets();
        let at = targets.iter().position(|&t| t == start)?;

        targets
            .iter()
            .cycle()
            .skip(at + 1)
            .take(targets.len() - 1)
            .copied()
            .find(|&t| !matches!(t, Target::Root) && self.channel(t).name.contains(search))
    }

    /* ------------------------------------------------------------------ *
     * Local (`:`) commands
     * ------------------------------------------------------------------ */

    fn command(&mut self, t: Target, line: &str) {
        let mut args = line.split(' ').filter(|a| !a.is_empty());

        let Some(cmnd) = args.next() else {
            self.chan_error(t, "Messages beginning with ':' require a command");
            return;
        };

        match cmnd.to_ascii_lowercase().as_str() {
            "quit" => {
                self.quit = true;

                let quit_message = self.config.quit_message.clone();

                for sid in 0..self.servers.count() {
                    self.servers.index_mut(sid).quitting = true;

                    if let Some(conn) = self.servers.index(sid).connection.clone() {
                        let _ = conn.sendf(&format!("QUIT :{}", quit_message));
                        let _ = conn.dx();
                    }
                }
            }
            "connect" => {
                let host = args.next();
                let port = args.next();
                let pass = args.next();
                let user = args.next();
                let real = args.next();

                match host {
                    None => match t {
                        Target::Chan { sid, .. } => {
                            if let Some(conn) = self.servers.index(sid).connection.clone() {
                                if let Err(e) = conn.cx() {
                                    self.chan_error(t, &e.to_string());
                                }
                            }
                        }
                        Target::Root => {
                            self.chan_error(t, ":connect [host [port [pass [user [real]]]]]");
                        }
                    },
                    Some(host) => {
                        let flags = self.config.flags.clone();
                        let default_port = if flags.tls { 6697 } else { 6667 };

                        let port = match port.map(str::parse::<u16>) {
                            None => default_port,
                            Some(Ok(p)) => p,
                            Some(Err(_)) => {
                                self.chan_error(t, "connect: invalid port");
                                return;
                            }
                        };

                        let username = user.unwrap_or(&self.config.username).to_string();
                        let realname = real.unwrap_or(&self.config.realname).to_string();
                        let nicks = self.config.nicks.join(",");
                        let host = host.to_string();
                        let pass = pass.map(str::to_string);

                        if let Err(e) = self.connect(
                            &host,
                            port,
                            pass.as_deref(),
                            &username,
                            &realname,
                            &nicks,
                            None,
                            flags,
                        ) {
                            self.chan_error(self.current, &e.to_string());
                        }
                    }
                }
            }
            "disconnect" => match t {
                Target::Chan { sid, .. } => {
                    if let Some(conn) = self.servers.index(sid).connection.clone() {
                        if let Err(e) = conn.dx() {
                            self.chan_error(t, &e.to_string());
                        }
                    }
                }
                Target::Root => self.chan_error(t, "This is not a server"),
            },
            "clear" => {
                self.channel_mut(t).buffer.clear();
                self.draw.buffer = true;
            }
            "close" => self.channel_close(t),
            "set" => self.chan_error(t, ":set is not yet supported"),
            _ => self.chan_error(t, &format!("Unknown command '{}'", cmnd)),
        }
    }
}

/// Completion candidate source: IRC commands after `/`, local commands
/// after `:`, channel nicks otherwise (with a `:` delimiter when the
/// nick starts the line).
fn complete_word(
    buf: &mut [u8],
    len: usize,
    first: bool,
    users: &UserList,
    cm: crate::casemap::Casemap,
) -> usize {
    if first && buf[0] == b'/' {
        return complete_list(&mut buf[1..], len - 1, IRC_COMMAND_LIST).map_or(0, |n| n + 1);
    }

    if first && buf[0] == b':' {
        return complete_list(&mut buf[1..], len - 1, CMD_LIST).map_or(0, |n| n + 1);
    }

    let Ok(word) = std::str::from_utf8(&buf[..len]) else {
        return 0;
    };

    let Some(user) = users.get_prefix(cm, word, len) else {
        return 0;
    };

    let nick = user.nick.as_bytes();
    let need = nick.len() + usize::from(first);

    if need > buf.len() {
        return 0;
    }

    buf[..nick.len()].copy_from_slice(nick);

    if first {
        buf[nick.len()] = b':';
    }

    need
}

fn complete_list(buf: &mut [u8], len: usize, list: &[&str]) -> Option<usize> {
    if len == 0 {
        return None;
    }

    let word = std::str::from_utf8(&buf[..len]).ok()?;
    let found = list.iter().find(|cmd| cmd.starts_with(word))?;

    let need = found.len() + 1;
    if need > buf.len() {
        return None;
    }

    buf[..found.len()].copy_from_slice(found.as_bytes());
    buf[found.len()] = b' ';

    Some(need)
}

/* ---------------------------------------------------------------------- *
 * I/O callbacks
 * ---------------------------------------------------------------------- */

impl IoCallbacks for Client {
    fn cxed(&mut self, obj: usize) {
        let Some(sid) = self.sid_by_uid(obj) else {
            return;
        };

        {
            let s = self.servers.index_mut(sid);
            s.reset();
            if !s.nicks_next() && s.nick.is_empty() {
                s.nick = s.username.clone();
            }
        }

        self.sendf(sid, format!("CAP LS {}", crate::caps::CAP_VERSION));

        let s = self.servers.index(sid);
        let pass = s.pass.clone();
        let nick = s.nick.clone();
        let username = s.username.clone();
        let realname = s.realname.clone();

        if let Some(pass) = pass {
            self.sendf(sid, format!("PASS {}", pass));
        }
        self.sendf(sid, format!("NICK {}", nick));
        self.sendf(sid, format!("USER {} 8 * :{}", username, realname));

        self.draw.status = true;
        self.flush_outgoing();
    }

    fn dxed(&mut self, obj: usize) {
        let Some(sid) = self.sid_by_uid(obj) else {
            return;
        };

        let host = self.servers.index(sid).host.clone();

        self.servers.index_mut(sid).registered = false;
        self.servers.index_mut(sid).ping = 0;

        for cid in 0..self.servers.index(sid).channels.count() {
            self.servers.index_mut(sid).channels.index_mut(cid).reset();
            self.newline(
                Target::Chan { sid, cid },
                LineType::ServerError,
                FROM_ERROR,
                &format!("disconnected from {}", host),
            );
        }

        self.draw.status = true;
    }

    fn ping(&mut self, obj: usize, n: u32) {
        let Some(sid) = self.sid_by_uid(obj) else {
            return;
        };

        self.servers.index_mut(sid).ping = n;

        if n == self.config.io.ping_min {
            let host = self.servers.index(sid).host.clone();
            self.sendf(sid, format!("PING :{}", host));
            self.flush_outgoing();
        }

        self.draw.status = true;
    }

    fn info(&mut self, obj: usize, text: &str) {
        if let Some(sid) = self.sid_by_uid(obj) {
            self.server_info(sid, text);
        }
    }

    fn error(&mut self, obj: usize, text: &str) {
        if let Some(sid) = self.sid_by_uid(obj) {
            self.server_error(sid, text);
        }
    }

    fn read_soc(&mut self, obj: usize, bytes: &[u8]) {
        let Some(sid) = self.sid_by_uid(obj) else {
            return;
        };

        let lines = self.servers.index_mut(sid).read(bytes);

        for line in lines {
            debug!(sid, "recv: {}", line);

            match Message::parse(&line) {
                Ok(mut m) => {
                    let _ = self.irc_recv(sid, &mut m);
                }
                Err(e) => {
                    self.server_error(sid, &format!("failed to parse message: {}", e));
                }
            }
        }

        self.flush_outgoing();
    }
}
