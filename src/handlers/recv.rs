//! Receive dispatch: numeric and command handler tables.

use crate::buffer::LineType;
use crate::casemap::{irc_eq, irc_pinged, is_nick_char};
use crate::channel::{Activity, Channel, ChannelKind};
use crate::ctcp::is_ctcp;
use crate::message::Message;
use crate::mode::{mode_str, ModeSet, ModeStrKind, ChanModeType};
use crate::sasl::SaslState;
use crate::state::{
    Client, Target, FROM_ERROR, FROM_INFO, FROM_JOIN, FROM_NICK, FROM_PART, FROM_QUIT,
    FROM_UNKNOWN,
};

/// Numeric handler categories, indexed by reply code.
enum Numeric {
    /// Dedicated handler.
    Handled,
    /// Displayed in the server buffer.
    Info,
    /// Silently dropped.
    Ignore,
    /// Displayed as an error.
    Error,
    /// SASL result numerics.
    Sasl,
    Unknown,
}

fn numeric_class(code: u16) -> Numeric {
    use Numeric::*;

    match code {
        1 | 4 | 5 | 221 | 324 | 328 | 329 | 332 | 333 | 353 | 433 => Handled,

        2 | 3 => Info,
        200..=218 => Info,           /* RPL_TRACE*, RPL_STATS* */
        234 | 240..=247 => Info,
        250..=259 => Info,           /* RPL_LUSER*, RPL_ADMIN* */
        262 | 263 | 265 | 266 => Info,
        301..=303 | 305 | 306 => Info,
        311..=314 | 317 | 319 => Info, /* RPL_WHOIS*, RPL_WHOWAS* */
        322 | 325 => Info,
        341 | 346 | 348 => Info,
        351 | 352 => Info,
        364 | 367 => Info,
        371 | 372 => Info,
        381 | 391 => Info,
        704 | 705 => Info,

        219 | 235 => Ignore,
        315 | 318 | 323 | 331 => Ignore,
        347 | 349 => Ignore,
        365 | 366 | 368 | 369 => Ignore,
        374..=376 => Ignore,
        706 => Ignore,

        401..=409 => Error,
        411..=416 => Error,
        421..=423 => Error,
        431 | 432 | 436 | 437 => Error,
        441..=443 | 451 => Error,
        461..=467 => Error,
        471..=478 => Error,
        481..=485 => Error,
        491 => Error,
        501 | 502 => Error,

        900 | 908 => Info,
        902..=907 => Sasl,

        _ => Unknown,
    }
}

impl Client {
    /// Dispatch a parsed incoming message.
    pub(crate) fn irc_recv(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        if m.command.bytes().next().is_some_and(|c| c.is_ascii_digit()) {
            return self.irc_recv_numeric(sid, m);
        }

        match m.command {
            "AUTHENTICATE" => self.recv_authenticate(sid, m),
            "CAP" => self.recv_cap(sid, m),
            "ERROR" => self.recv_error(sid, m),
            "INVITE" => self.recv_invite(sid, m),
            "JOIN" => self.recv_join(sid, m),
            "KICK" => self.recv_kick(sid, m),
            "MODE" => self.recv_mode(sid, m),
            "NICK" => self.recv_nick(sid, m),
            "NOTICE" => self.recv_notice(sid, m),
            "PART" => self.recv_part(sid, m),
            "PING" => self.recv_ping(sid, m),
            "PONG" => Ok(()),
            "PRIVMSG" => self.recv_privmsg(sid, m),
            "QUIT" => self.recv_quit(sid, m),
            "TOPIC" => self.recv_topic(sid, m),
            _ => self.irc_message(sid, m, FROM_UNKNOWN, LineType::Other),
        }
    }

    /// `:server <code> <target> [args]`
    fn irc_recv_numeric(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        if !m.command.bytes().all(|c| c.is_ascii_digit()) {
            return self.failf(sid, "NUMERIC: invalid");
        }

        let Ok(code) = m.command.parse::<u16>() else {
            return self.failf(sid, "NUMERIC: out of range");
        };

        if code > 999 {
            return self.failf(sid, "NUMERIC: out of range");
        }

        /* The target is only used to establish the nick while
         * registering; a mismatch after that means we're out of sync */
        let Some(targ) = m.param() else {
            self.io_dx(sid);
            return self.failf(sid, "NUMERIC: target is null");
        };

        let nick = self.servers.index(sid).nick.clone();

        if targ != nick && targ != "*" && code != 1 {
            self.io_dx(sid);
            return self.failf(
                sid,
                &format!(
                    "NUMERIC: target mismatched, nick is '{}', received '{}'",
                    nick, targ
                ),
            );
        }

        if code == 1 && targ != "*" {
            self.servers.index_mut(sid).nick_set(targ);
        }

        match numeric_class(code) {
            Numeric::Handled => match code {
                1 => self.irc_001(sid, m),
                4 => self.irc_004(sid, m),
                5 => self.irc_005(sid, m),
                221 => self.recv_mode_usermodes(sid, m),
                324 => self.irc_324(sid, m),
                328 => self.irc_328(sid, m),
                329 => self.irc_329(sid, m),
                332 => self.irc_332(sid, m),
                333 => self.irc_333(sid, m),
                353 => self.irc_353(sid, m),
                433 => self.irc_433(sid, m),
                _ => unreachable!(),
            },
            Numeric::Info => self.irc_message(sid, m, FROM_INFO, LineType::ServerInfo),
            Numeric::Error => self.irc_message(sid, m, FROM_ERROR, LineType::ServerError),
            Numeric::Ignore => Ok(()),
            Numeric::Sasl => self.irc_sasl_result(sid, m),
            Numeric::Unknown => {
                let params = m.params_str();
                if params.is_empty() {
                    self.failf(sid, &format!("Numeric type '{}' unknown", code))
                } else {
                    self.failf(sid, &format!("Numeric type '{}' unknown: {}", code, params))
                }
            }
        }
    }

    /// Default display for unhandled messages:
    /// `[params] ~ trailing`, or its one-sided variants.
    fn irc_message(
        &mut self,
        sid: usize,
        m: &mut Message,
        from: &str,
        lt: LineType,
    ) -> Result<(), ()> {
        let t = Target::Chan { sid, cid: 0 };

        match m.split() {
            Some(trailing) => {
                let params = m.params_str();
                if params.is_empty() {
                    self.newline(t, lt, from, trailing);
                } else {
                    self.newline(t, lt, from, &format!("[{}] ~ {}", params, trailing));
                }
            }
            None => {
                let params = m.params_str();
                if !params.is_empty() {
                    self.newline(t, lt, from, &format!("[{}]", params));
                }
            }
        }

        Ok(())
    }

    fn io_dx(&mut self, sid: usize) {
        if let Some(conn) = self.servers.index(sid).connection.clone() {
            let _ = conn.dx();
        }
    }

    /* -------------------------------------------------------------- *
     * Numerics
     * -------------------------------------------------------------- */

    /// 001 RPL_WELCOME: registration complete; join non-parted
    /// channels.
    fn irc_001(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        self.servers.index_mut(sid).registered = true;

        let joins: Vec<String> = self
            .servers
            .index(sid)
            .channels
            .iter()
            .filter(|c| c.kind == ChannelKind::Channel && !c.parted)
            .map(|c| c.name.clone())
            .collect();

        for name in joins {
            self.sendf(sid, format!("JOIN {}", name));
        }

        if let Some(trailing) = m.split() {
            self.server_info(sid, trailing);
        }

        let nick = self.servers.index(sid).nick.clone();
        self.server_info(sid, &format!("You are known as {}", nick));

        Ok(())
    }

    /// 004 RPL_MYINFO: ingest usermodes/chanmodes.
    fn irc_004(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        match m.split() {
            Some(trailing) => {
                let text = format!("{} ~ {}", m.params_str(), trailing);
                self.server_info(sid, &text);
            }
            None => {
                let text = m.params_str().to_string();
                self.server_info(sid, &text);
            }
        }

        let errors = self.servers.index_mut(sid).set_004(m.params_str());

        for e in errors {
            self.server_error(sid, &e);
        }

        Ok(())
    }

    /// 005 RPL_ISUPPORT: parse options.
    fn irc_005(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        match m.split() {
            Some(trailing) => {
                let text = format!("{} ~ {}", m.params_str(), trailing);
                self.server_info(sid, &text);
            }
            None => {
                let text = format!("{} ~ are supported by this server", m.params_str());
                self.server_info(sid, &text);
            }
        }

        let errors = self.servers.index_mut(sid).set_005(m.params_str());

        for e in errors {
            self.server_error(sid, &e);
        }

        Ok(())
    }

    /// 324 RPL_CHANNELMODEIS
    fn irc_324(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(chan) = m.param() else {
            return self.failf(sid, "RPL_CHANNELMODEIS: channel is null");
        };

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("RPL_CHANNELMODEIS: channel '{}' not found", chan));
        };

        let from = m.from;
        self.recv_mode_chanmodes(sid, cid, m, from)
    }

    /// 328 RPL_CHANNEL_URL
    fn irc_328(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(chan) = m.param() else {
            return self.failf(sid, "RPL_CHANNEL_URL: channel is null");
        };

        let Some(url) = m.param() else {
            return self.failf(sid, "RPL_CHANNEL_URL: url is null");
        };

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("RPL_CHANNEL_URL: channel '{}' not found", chan));
        };

        self.newline(
            Target::Chan { sid, cid },
            LineType::ServerInfo,
            FROM_INFO,
            &format!("URL for {} is: \"{}\"", chan, url),
        );

        Ok(())
    }

    /// 329 RPL_CREATIONTIME
    fn irc_329(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(chan) = m.param() else {
            return self.failf(sid, "RPL_CREATIONTIME: channel is null");
        };

        let Some(time_str) = m.param() else {
            return self.failf(sid, "RPL_CREATIONTIME: time is null");
        };

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("RPL_CREATIONTIME: channel '{}' not found", chan));
        };

        let Some(time) = format_epoch(time_str) else {
            return self.failf(sid, "RPL_CREATIONTIME: invalid time");
        };

        self.newline(
            Target::Chan { sid, cid },
            LineType::ServerInfo,
            FROM_INFO,
            &format!("Channel created {}", time),
        );

        Ok(())
    }

    /// 332 RPL_TOPIC
    fn irc_332(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(chan) = m.param() else {
            return self.failf(sid, "RPL_TOPIC: channel is null");
        };

        let Some(topic) = m.param() else {
            return self.failf(sid, "RPL_TOPIC: topic is null");
        };

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("RPL_TOPIC: channel '{}' not found", chan));
        };

        self.newline(
            Target::Chan { sid, cid },
            LineType::ServerInfo,
            FROM_INFO,
            &format!("Topic for {} is \"{}\"", chan, topic),
        );

        Ok(())
    }

    /// 333 RPL_TOPICWHOTIME
    fn irc_333(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(chan) = m.param() else {
            return self.failf(sid, "RPL_TOPICWHOTIME: channel is null");
        };

        let Some(nick) = m.param() else {
            return self.failf(sid, "RPL_TOPICWHOTIME: nick is null");
        };

        let Some(time_str) = m.param() else {
            return self.failf(sid, "RPL_TOPICWHOTIME: time is null");
        };

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("RPL_TOPICWHOTIME: channel '{}' not found", chan));
        };

        let Some(time) = format_epoch(time_str) else {
            return self.failf(sid, "RPL_TOPICWHOTIME: invalid time");
        };

        self.newline(
            Target::Chan { sid, cid },
            LineType::ServerInfo,
            FROM_INFO,
            &format!("Topic set by {}, {}", nick, time),
        );

        Ok(())
    }

    /// 353 RPL_NAMREPLY:
    /// `("="/"*"/"@") <channel> *([prefix]<nick>)`
    fn irc_353(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(chan_type) = m.param() else {
            return self.failf(sid, "RPL_NAMEREPLY: type is null");
        };

        let Some(chan) = m.param() else {
            return self.failf(sid, "RPL_NAMEREPLY: channel is null");
        };

        let Some(nicks) = m.param() else {
            return self.failf(sid, "RPL_NAMEREPLY: nicks is null");
        };

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("RPL_NAMEREPLY: channel '{}' not found", chan));
        };

        let t = Target::Chan { sid, cid };
        let cm = self.servers.index(sid).casemapping;
        let cfg = self.servers.index(sid).mode_cfg.clone();

        let flag = chan_type.chars().next().unwrap_or('=');
        if self
            .servers
            .index_mut(sid)
            .channels
            .index_mut(cid)
            .chanmodes
            .chanmode_prefix(flag)
            .is_err()
        {
            self.newline(
                t,
                LineType::ServerError,
                FROM_ERROR,
                &format!("RPL_NAMEREPLY: invalid channel flag: '{}'", flag),
            );
        }

        for mut nick in nicks.split(' ').filter(|n| !n.is_empty()) {
            let mut modes = crate::mode::Mode::default();

            while let Some(c) = nick.chars().next() {
                if is_nick_char(c as u8, true) {
                    break;
                }

                if modes.prfxmode_prefix(&cfg, c).is_err() {
                    self.newline(
                        t,
                        LineType::ServerError,
                        FROM_ERROR,
                        &format!("Invalid user prefix: '{}'", c),
                    );
                }

                nick = &nick[c.len_utf8()..];
            }

            if self
                .servers
                .index_mut(sid)
                .channels
                .index_mut(cid)
                .users
                .add(cm, nick, modes)
                .is_err()
            {
                self.newline(
                    t,
                    LineType::ServerError,
                    FROM_ERROR,
                    &format!("Duplicate nick: '{}'", nick),
                );
            }
        }

        self.draw_status();

        Ok(())
    }

    /// 433 ERR_NICKNAMEINUSE: rotate to the next nick candidate.
    fn irc_433(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(nick) = m.param() else {
            return self.failf(sid, "ERR_NICKNAMEINUSE: nick is null");
        };

        self.server_error(sid, &format!("Nick '{}' in use", nick));

        if nick == self.servers.index(sid).nick {
            if self.servers.index_mut(sid).nicks_next() {
                let next = self.servers.index(sid).nick.clone();
                self.server_error(sid, &format!("Trying again with '{}'", next));
                self.sendf(sid, format!("NICK {}", next));
            } else {
                self.server_error(sid, "Exhausted nick candidates");
            }
        }

        Ok(())
    }

    fn irc_sasl_result(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let trailing = m.split().unwrap_or("");
        let code_903 = m.command == "903";

        if let Some(auth) = &mut self.servers.index_mut(sid).sasl {
            auth.state = SaslState::Complete;
        }

        if code_903 {
            if trailing.is_empty() {
                self.server_info(sid, "SASL authentication successful");
            } else {
                self.server_info(sid, trailing);
            }
        } else if trailing.is_empty() {
            self.server_error(sid, "SASL authentication failed");
        } else {
            self.server_error(sid, trailing);
        }

        self.cap_try_end(sid);

        Ok(())
    }

    /* -------------------------------------------------------------- *
     * Commands
     * -------------------------------------------------------------- */

    fn recv_authenticate(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let challenge = m.param().unwrap_or("");

        let payload = {
            let Some(auth) = &mut self.servers.index_mut(sid).sasl else {
                return self.failf(sid, "AUTHENTICATE: no credentials configured");
            };

            if challenge != "+" || auth.state != SaslState::MechanismSent {
                return self.failf(sid, &format!("AUTHENTICATE: unexpected '{}'", challenge));
            }

            auth.state = SaslState::CredentialsSent;
            auth.payload()
        };

        self.sendf(sid, format!("AUTHENTICATE {}", payload));

        Ok(())
    }

    /// `ERROR <message>`
    fn recv_error(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(message) = m.param() else {
            return self.failf(sid, "ERROR: message is null");
        };

        if self.servers.index(sid).quitting {
            self.server_info(sid, message);
        } else {
            self.newline(Target::Chan { sid, cid: 0 }, LineType::ServerError, "ERROR", message);
        }

        Ok(())
    }

    /// `:nick!user@host INVITE <nick> <channel>`
    fn recv_invite(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(from) = m.from else {
            return self.failf(sid, "INVITE: sender's nick is null");
        };

        let Some(nick) = m.param() else {
            return self.failf(sid, "INVITE: target nick is null");
        };

        let Some(chan) = m.param() else {
            return self.failf(sid, "INVITE: target channel is null");
        };

        let self_nick = self.servers.index(sid).nick.clone();

        if from == self_nick {
            self.server_info(sid, &format!("You invited {} to {}", nick, chan));
        } else {
            self.server_info(sid, &format!("You've been invited to {} by {}", chan, from));
        }

        Ok(())
    }

    /// `:nick!user@host JOIN <channel>`
    fn recv_join(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(from) = m.from else {
            return self.failf(sid, "JOIN: sender's nick is null");
        };

        let Some(chan) = m.param() else {
            return self.failf(sid, "JOIN: target channel is null");
        };

        let cm = self.servers.index(sid).casemapping;
        let self_nick = self.servers.index(sid).nick.clone();

        if irc_eq(cm, from, &self_nick) {
            let cid = match self.chan_lookup(sid, chan) {
                Some(cid) => cid,
                None => {
                    let cid = self
                        .servers
                        .index_mut(sid)
                        .channels
                        .add(Channel::new(chan, ChannelKind::Channel));
                    self.channel_set_current(Target::Chan { sid, cid });
                    cid
                }
            };

            {
                let c = self.servers.index_mut(sid).channels.index_mut(cid);
                c.joined = true;
                c.parted = false;
            }

            self.newline(
                Target::Chan { sid, cid },
                LineType::Join,
                FROM_JOIN,
                &format!("Joined {}", chan),
            );
            self.sendf(sid, format!("MODE {}", chan));

            return Ok(());
        }

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("JOIN: channel '{}' not found", chan));
        };

        if self
            .servers
            .index_mut(sid)
            .channels
            .index_mut(cid)
            .users
            .add(cm, from, crate::mode::Mode::default())
            .is_err()
        {
            return self.failf(
                sid,
                &format!("JOIN: user '{}' already on channel '{}'", from, chan),
            );
        }

        let count = self.servers.index(sid).channels.index(cid).users.count();
        let threshold = self.config.join_threshold;

        if threshold == 0 || count <= threshold {
            let host = m.host.unwrap_or("");
            self.newline(
                Target::Chan { sid, cid },
                LineType::Join,
                FROM_JOIN,
                &format!("{}!{} has joined", from, host),
            );
        }

        self.draw_status();

        Ok(())
    }

    /// `:nick!user@host KICK <channel> <user> [message]`
    fn recv_kick(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(from) = m.from else {
            return self.failf(sid, "KICK: sender's nick is null");
        };

        let Some(chan) = m.param() else {
            return self.failf(sid, "KICK: channel is null");
        };

        let Some(user) = m.param() else {
            return self.failf(sid, "KICK: user is null");
        };

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("KICK: channel '{}' not found", chan));
        };

        /* RFC 2812, section 3.2.8: a comment matching the kicker's nick
         * is the default, not worth displaying */
        let message = m.param().filter(|msg| *msg != from);

        let t = Target::Chan { sid, cid };
        let cm = self.servers.index(sid).casemapping;
        let self_nick = self.servers.index(sid).nick.clone();

        if irc_eq(cm, user, &self_nick) {
            self.servers.index_mut(sid).channels.index_mut(cid).part();

            let text = match message {
                Some(msg) => format!("Kicked by {} ({})", from, msg),
                None => format!("Kicked by {}", from),
            };
            self.newline(t, LineType::ServerInfo, FROM_INFO, &text);
        } else {
            if self
                .servers
                .index_mut(sid)
                .channels
                .index_mut(cid)
                .users
                .del(cm, user)
                .is_err()
            {
                return self.failf(sid, &format!("KICK: nick '{}' not found in '{}'", user, chan));
            }

            let text = match message {
                Some(msg) => format!("{} has kicked {} ({})", from, user, msg),
                None => format!("{} has kicked {}", from, user),
            };
            self.newline(t, LineType::ServerInfo, FROM_INFO, &text);
        }

        self.draw_status();

        Ok(())
    }

    /// `MODE <targ> 1*[<modestring> [<mode arguments>]]`
    ///
    /// The target is either our own nick (usermodes) or a channel
    /// (chanmodes).
    fn recv_mode(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(targ) = m.param() else {
            return self.failf(sid, "MODE: target is null");
        };

        if targ == self.servers.index(sid).nick {
            return self.recv_mode_usermodes(sid, m);
        }

        let from = m.from;

        match self.chan_lookup(sid, targ) {
            Some(cid) => self.recv_mode_chanmodes(sid, cid, m, from),
            None => self.failf(sid, &format!("MODE: target '{}' not found", targ)),
        }
    }

    /// Apply chanmode flags: `+`/`-` runs with per-flag parameter
    /// consumption decided by the server's CHANMODE subtypes.
    fn recv_mode_chanmodes(
        &mut self,
        sid: usize,
        cid: usize,
        m: &mut Message,
        from: Option<&str>,
    ) -> Result<(), ()> {
        let t = Target::Chan { sid, cid };
        let cfg = self.servers.index(sid).mode_cfg.clone();
        let cm = self.servers.index(sid).casemapping;
        let chan = self.servers.index(sid).channels.index(cid).name.clone();

        let Some(first) = m.param() else {
            self.chan_error(t, "MODE: modestring is null");
            return Err(());
        };

        let set_str = |set: ModeSet| match set {
            ModeSet::On => '+',
            ModeSet::Off => '-',
        };

        let who = |from: Option<&str>| match from {
            Some(from) => format!("{} set ", from),
            None => String::new(),
        };

        let mut modestring = Some(first);

        while let Some(ms) = modestring {
            let mut set: Option<ModeSet> = None;

            for flag in ms.chars() {
                if flag == '+' {
                    set = Some(ModeSet::On);
                    continue;
                }
                if flag == '-' {
                    set = Some(ModeSet::Off);
                    continue;
                }

                match cfg.chanmode_type(set, flag) {
                    ChanModeType::Chanmode => {
                        let set = set.unwrap();
                        let result = self
                            .servers
                            .index_mut(sid)
                            .channels
                            .index_mut(cid)
                            .chanmodes
                            .chanmode_set(&cfg, flag, set);

                        match result {
                            Ok(()) => {
                                let text = format!(
                                    "{}{} mode: {}{}",
                                    who(from),
                                    chan,
                                    set_str(set),
                                    flag
                                );
                                self.newline(t, LineType::ServerInfo, FROM_INFO, &text);
                            }
                            Err(_) => {
                                self.chan_error(t, &format!("MODE: invalid flag '{}'", flag));
                            }
                        }
                    }

                    ChanModeType::ChanmodeParam => {
                        let set = set.unwrap();

                        let Some(arg) = m.param() else {
                            self.chan_error(
                                t,
                                &format!("MODE: flag '{}' expected argument", flag),
                            );
                            continue;
                        };

                        let result = self
                            .servers
                            .index_mut(sid)
                            .channels
                            .index_mut(cid)
                            .chanmodes
                            .chanmode_set(&cfg, flag, set);

                        match result {
                            Ok(()) => {
                                let text = format!(
                                    "{}{} mode: {}{} {}",
                                    who(from),
                                    chan,
                                    set_str(set),
                                    flag,
                                    arg
                                );
                                self.newline(t, LineType::ServerInfo, FROM_INFO, &text);
                            }
                            Err(_) => {
                                self.chan_error(t, &format!("MODE: invalid flag '{}'", flag));
                            }
                        }
                    }

                    ChanModeType::Prefix => {
                        let set = set.unwrap();

                        let Some(arg) = m.param() else {
                            self.chan_error(t, &format!("MODE: flag '{}' argument is null", flag));
                            continue;
                        };

                        let result = {
                            let c = self.servers.index_mut(sid).channels.index_mut(cid);
                            match c.users.get_mut(cm, arg) {
                                Some(user) => {
                                    user.prfxmodes.prfxmode_set(&cfg, flag, set).err()
                                }
                                None => Some(crate::error::ModeError::InvalidFlag),
                            }
                        };

                        match result {
                            None => {
                                let text = format!(
                                    "{}user {} mode: {}{}",
                                    who(from),
                                    arg,
                                    set_str(set),
                                    flag
                                );
                                self.newline(t, LineType::ServerInfo, FROM_INFO, &text);
                            }
                            Some(_) => {
                                self.chan_error(
                                    t,
                                    &format!("MODE: flag '{}' user '{}' not found", flag, arg),
                                );
                            }
                        }
                    }

                    ChanModeType::InvalidSet => {
                        self.chan_error(t, "MODE: missing '+'/'-'");
                    }

                    ChanModeType::InvalidFlag => {
                        self.chan_error(t, &format!("MODE: invalid flag '{}'", flag));
                    }
                }
            }

            modestring = m.param();
        }

        {
            let c = self.servers.index_mut(sid).channels.index_mut(cid);
            c.chanmodes_str = mode_str(&c.chanmodes, ModeStrKind::Chanmode);
        }

        self.draw_status();

        Ok(())
    }

    fn recv_mode_usermodes(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(first) = m.param() else {
            return self.failf(sid, "MODE: modestring is null");
        };

        let cfg = self.servers.index(sid).mode_cfg.clone();
        let from = m.from.map(str::to_string);

        let who = match &from {
            Some(from) => format!("{} set ", from),
            None => String::new(),
        };

        let mut modestring = Some(first);

        while let Some(ms) = modestring {
            let mut set: Option<ModeSet> = None;

            for flag in ms.chars() {
                if flag == '+' {
                    set = Some(ModeSet::On);
                    continue;
                }
                if flag == '-' {
                    set = Some(ModeSet::Off);
                    continue;
                }

                let Some(set) = set else {
                    self.server_error(sid, "MODE: missing '+'/'-'");
                    continue;
                };

                match self
                    .servers
                    .index_mut(sid)
                    .usermodes
                    .usermode_set(&cfg, flag, set)
                {
                    Ok(()) => {
                        let c = match set {
                            ModeSet::On => '+',
                            ModeSet::Off => '-',
                        };
                        self.server_info(sid, &format!("{}mode: {}{}", who, c, flag));
                    }
                    Err(_) => {
                        self.server_error(sid, &format!("MODE: invalid flag '{}'", flag));
                    }
                }
            }

            modestring = m.param();
        }

        {
            let s = self.servers.index_mut(sid);
            s.usermodes_str = mode_str(&s.usermodes, ModeStrKind::Usermode);
        }

        self.draw_status();

        Ok(())
    }

    /// `:nick!user@host NICK <nick>`
    fn recv_nick(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(from) = m.from else {
            return self.failf(sid, "NICK: old nick is null");
        };

        let Some(nick) = m.param() else {
            return self.failf(sid, "NICK: new nick is null");
        };

        let cm = self.servers.index(sid).casemapping;
        let self_nick = self.servers.index(sid).nick.clone();

        if irc_eq(cm, from, &self_nick) {
            self.servers.index_mut(sid).nick_set(nick);
            self.newline(
                Target::Chan { sid, cid: 0 },
                LineType::Nick,
                FROM_NICK,
                &format!("Your nick is '{}'", nick),
            );
        }

        for cid in 0..self.servers.index(sid).channels.count() {
            let result = self
                .servers
                .index_mut(sid)
                .channels
                .index_mut(cid)
                .users
                .rpl(cm, from, nick);

            match result {
                Ok(()) => {
                    self.newline(
                        Target::Chan { sid, cid },
                        LineType::Nick,
                        FROM_NICK,
                        &format!("{}  >>  {}", from, nick),
                    );
                }
                Err(crate::error::UserError::Duplicate) => {
                    let chan = self.servers.index(sid).channels.index(cid).name.clone();
                    self.server_error(
                        sid,
                        &format!("NICK: user '{}' already on channel '{}'", nick, chan),
                    );
                }
                Err(crate::error::UserError::NotFound) => (),
            }
        }

        Ok(())
    }

    /// `:nick!user@host NOTICE <target> <message>`
    fn recv_notice(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        self.recv_message(sid, m, false)
    }

    /// `:nick!user@host PRIVMSG <target> <message>`
    fn recv_privmsg(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        self.recv_message(sid, m, true)
    }

    fn recv_message(&mut self, sid: usize, m: &mut Message, privmsg: bool) -> Result<(), ()> {
        let label = if privmsg { "PRIVMSG" } else { "NOTICE" };

        let Some(from) = m.from else {
            return self.failf(sid, &format!("{}: sender's nick is null", label));
        };

        let Some(targ) = m.param() else {
            return self.failf(sid, &format!("{}: target is null", label));
        };

        let Some(message) = m.param() else {
            return self.failf(sid, &format!("{}: message is null", label));
        };

        let cm = self.servers.index(sid).casemapping;

        if self.servers.index(sid).ignore.get(cm, from).is_some() {
            return Ok(());
        }

        if is_ctcp(message) {
            return if privmsg {
                self.ctcp_request(sid, from, targ, message)
            } else {
                self.ctcp_response(sid, from, targ, message)
            };
        }

        let self_nick = self.servers.index(sid).nick.clone();
        let mut urgent = false;

        let t = if !privmsg && targ == "*" {
            Target::Chan { sid, cid: 0 }
        } else if irc_eq(cm, targ, &self_nick) {
            let cid = match self.chan_lookup(sid, from) {
                Some(cid) => cid,
                None => {
                    let mut c = Channel::new(from, ChannelKind::Privmsg);
                    c.joined = true;
                    self.servers.index_mut(sid).channels.add(c)
                }
            };

            let t = Target::Chan { sid, cid };
            if t != self.current() {
                urgent = true;
            }
            t
        } else {
            match self.chan_lookup(sid, targ) {
                Some(cid) => Target::Chan { sid, cid },
                None => {
                    return self.failf(sid, &format!("{}: channel '{}' not found", label, targ))
                }
            }
        };

        if irc_pinged(cm, message, &self_nick) {
            if t != self.current() {
                urgent = true;
            }
            self.newline(t, LineType::Pinged, from, message);
        } else {
            self.newline(t, LineType::Chat, from, message);
        }

        if urgent {
            self.channel_mut(t).touch_activity(Activity::Pinged);
            self.draw_bell();
        }

        Ok(())
    }

    /// `:nick!user@host PART <channel> [message]`
    fn recv_part(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(from) = m.from else {
            return self.failf(sid, "PART: sender's nick is null");
        };

        let Some(chan) = m.param() else {
            return self.failf(sid, "PART: target channel is null");
        };

        let cm = self.servers.index(sid).casemapping;
        let self_nick = self.servers.index(sid).nick.clone();

        if irc_eq(cm, from, &self_nick) {
            /* if not found, assume the channel was closed */
            if let Some(cid) = self.chan_lookup(sid, chan) {
                let t = Target::Chan { sid, cid };

                let text = match m.param() {
                    Some(message) => format!("you have parted ({})", message),
                    None => "you have parted".to_string(),
                };
                self.newline(t, LineType::Part, FROM_PART, &text);

                self.servers.index_mut(sid).channels.index_mut(cid).part();
            }
        } else {
            let Some(cid) = self.chan_lookup(sid, chan) else {
                return self.failf(sid, &format!("PART: channel '{}' not found", chan));
            };

            if self
                .servers
                .index_mut(sid)
                .channels
                .index_mut(cid)
                .users
                .del(cm, from)
                .is_err()
            {
                return self.failf(sid, &format!("PART: nick '{}' not found in '{}'", from, chan));
            }

            let count = self.servers.index(sid).channels.index(cid).users.count();
            let threshold = self.config.part_threshold;

            if threshold == 0 || count <= threshold {
                let host = m.host.unwrap_or("");
                let text = match m.param() {
                    Some(message) => format!("{}!{} has parted ({})", from, host, message),
                    None => format!("{}!{} has parted", from, host),
                };
                self.newline(Target::Chan { sid, cid }, LineType::Part, FROM_PART, &text);
            }
        }

        self.draw_status();

        Ok(())
    }

    /// `PING <server>`
    fn recv_ping(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(server) = m.param() else {
            return self.failf(sid, "PING: server is null");
        };

        self.sendf(sid, format!("PONG :{}", server));

        Ok(())
    }

    /// `:nick!user@host QUIT [message]`
    fn recv_quit(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(from) = m.from else {
            return self.failf(sid, "QUIT: sender's nick is null");
        };

        let message = m.param();
        let host = m.host.unwrap_or("");

        let text = match message {
            Some(message) => format!("{}!{} has quit ({})", from, host, message),
            None => format!("{}!{} has quit", from, host),
        };

        let cm = self.servers.index(sid).casemapping;
        let threshold = self.config.quit_threshold;

        for cid in 0..self.servers.index(sid).channels.count() {
            let removed = self
                .servers
                .index_mut(sid)
                .channels
                .index_mut(cid)
                .users
                .del(cm, from)
                .is_ok();

            if removed {
                let count = self.servers.index(sid).channels.index(cid).users.count();
                if threshold == 0 || count <= threshold {
                    self.newline(Target::Chan { sid, cid }, LineType::Quit, FROM_QUIT, &text);
                }
            }
        }

        self.draw_status();

        Ok(())
    }

    /// `:nick!user@host TOPIC <channel> [topic]`
    fn recv_topic(&mut self, sid: usize, m: &mut Message) -> Result<(), ()> {
        let Some(from) = m.from else {
            return self.failf(sid, "TOPIC: sender's nick is null");
        };

        let Some(chan) = m.param() else {
            return self.failf(sid, "TOPIC: target channel is null");
        };

        let Some(topic) = m.param() else {
            return self.failf(sid, "TOPIC: topic is null");
        };

        let Some(cid) = self.chan_lookup(sid, chan) else {
            return self.failf(sid, &format!("TOPIC: target channel '{}' not found", chan));
        };

        let t = Target::Chan { sid, cid };

        if topic.is_empty() {
            self.newline(
                t,
                LineType::ServerInfo,
                FROM_INFO,
                &format!("{} has unset the topic", from),
            );
        } else {
            self.newline(
                t,
                LineType::ServerInfo,
                FROM_INFO,
                &format!("{} has changed the topic:", from),
            );
            self.newline(t, LineType::ServerInfo, FROM_INFO, &format!("\"{}\"", topic));
        }

        Ok(())
    }

    /* -------------------------------------------------------------- */

    pub(crate) fn chan_lookup(&self, sid: usize, name: &str) -> Option<usize> {
        let s = self.servers.index(sid);
        s.channels.get(s.casemapping, name)
    }
}

fn format_epoch(time_str: &str) -> Option<String> {
    let t: i64 = time_str.parse().ok()?;
    let dt = chrono::DateTime::from_timestamp(t, 0)?;
    Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}
