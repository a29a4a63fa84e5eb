//! Send dispatch: typed user commands to wire messages.
//!
//! A `/`-command has its first word uppercased and is passed through
//! verbatim unless specially handled. Anything that is not a command is
//! a privmsg to the current channel, echoed locally.

use chrono::Utc;

use crate::buffer::LineType;
use crate::channel::{Channel, ChannelKind};
use crate::state::{Client, Target};

impl Client {
    /// Dispatch a `/`-prefixed command line (leader stripped).
    pub(crate) fn irc_send_command(&mut self, t: Target, line: &str) -> Result<(), ()> {
        let Target::Chan { sid, .. } = t else {
            return self.sendf_chan_err(t, "This is not a server");
        };

        let line = line.trim_start_matches(' ');

        let (command, rest) = match line.split_once(' ') {
            Some((c, r)) => (c, r.trim_start_matches(' ')),
            None => (line, ""),
        };

        if command.is_empty() {
            return self.sendf_chan_err(t, "Messages beginning with '/' require a command");
        }

        let command = command.to_ascii_uppercase();

        match command.as_str() {
            "JOIN" => self.send_join(sid, t, rest),
            "MSG" | "PRIVMSG" => self.send_msg(sid, t, rest),
            "ME" | "CTCP-ACTION" => self.send_me(sid, t, rest),
            "NICK" => self.send_nick(sid, t, rest),
            "PART" => self.send_part(sid, t, rest),
            "QUIT" => self.send_quit(sid, rest),
            "RAW" => self.send_raw(sid, t, rest),
            "TOPIC" => self.send_topic(sid, t, rest),
            "VERSION" => self.send_version(sid, t, rest),
            "IGNORE" => self.send_ignore(sid, t, rest, true),
            "UNIGNORE" => self.send_ignore(sid, t, rest, false),
            "CTCP-CLIENTINFO" | "CTCP-FINGER" | "CTCP-PING" | "CTCP-SOURCE" | "CTCP-TIME"
            | "CTCP-USERINFO" | "CTCP-VERSION" => {
                self.send_ctcp(sid, t, &command["CTCP-".len()..], rest)
            }
            _ => {
                if rest.is_empty() {
                    self.sendf(sid, command);
                } else {
                    self.sendf(sid, format!("{} {}", command, rest));
                }
                Ok(())
            }
        }
    }

    /// Send message text to the current channel.
    pub(crate) fn irc_send_privmsg(&mut self, t: Target, text: &str) -> Result<(), ()> {
        let Target::Chan { sid, cid } = t else {
            return self.sendf_chan_err(t, "This is not a server");
        };

        {
            let c = self.servers.index(sid).channels.index(cid);

            if !matches!(c.kind, ChannelKind::Channel | ChannelKind::Privmsg) {
                return self.sendf_chan_err(t, "This is not a channel");
            }

            if !c.joined || c.parted {
                return self.sendf_chan_err(t, "Not on channel");
            }
        }

        if text.is_empty() {
            return Err(());
        }

        let name = self.servers.index(sid).channels.index(cid).name.clone();
        let nick = self.servers.index(sid).nick.clone();

        self.sendf(sid, format!("PRIVMSG {} :{}", name, text));
        self.newline(t, LineType::Chat, &nick, text);

        Ok(())
    }

    fn sendf_chan_err(&mut self, t: Target, text: &str) -> Result<(), ()> {
        self.chan_error(t, text);
        Err(())
    }

    /// `/join [target]`
    fn send_join(&mut self, sid: usize, t: Target, rest: &str) -> Result<(), ()> {
        if let Some(targ) = rest.split(' ').find(|a| !a.is_empty()) {
            self.sendf(sid, format!("JOIN {}", targ));
            return Ok(());
        }

        let c = self.channel(t);

        match c.kind {
            ChannelKind::Privmsg => self.sendf_chan_err(t, "Can't rejoin private buffers"),
            ChannelKind::Channel if !c.parted => self.sendf_chan_err(t, "Not parted from channel"),
            ChannelKind::Channel => {
                let name = c.name.clone();
                self.sendf(sid, format!("JOIN {}", name));
                Ok(())
            }
            _ => self.sendf_chan_err(t, "JOIN requires a target"),
        }
    }

    /// `/msg <target> <message>`
    fn send_msg(&mut self, sid: usize, t: Target, rest: &str) -> Result<(), ()> {
        let (targ, message) = match rest.split_once(' ') {
            Some((targ, msg)) => (targ, msg.trim_start_matches(' ')),
            None => (rest, ""),
        };

        if targ.is_empty() {
            return self.sendf_chan_err(t, "Private messages require a target");
        }

        if message.is_empty() {
            return self.sendf_chan_err(t, "Private message was null");
        }

        self.sendf(sid, format!("PRIVMSG {} :{}", targ, message));

        let cid = match self.chan_lookup(sid, targ) {
            Some(cid) => cid,
            None => {
                let mut c = Channel::new(targ, ChannelKind::Privmsg);
                c.joined = true;
                self.servers.index_mut(sid).channels.add(c)
            }
        };

        let nick = self.servers.index(sid).nick.clone();
        self.newline(Target::Chan { sid, cid }, LineType::Chat, &nick, message);

        Ok(())
    }

    /// `/me <message>`
    fn send_me(&mut self, sid: usize, t: Target, rest: &str) -> Result<(), ()> {
        {
            let c = self.channel(t);
            if !matches!(c.kind, ChannelKind::Channel | ChannelKind::Privmsg) {
                return self.sendf_chan_err(t, "This is not a channel");
            }
        }

        let name = self.channel(t).name.clone();
        let nick = self.servers.index(sid).nick.clone();

        self.sendf(sid, format!("PRIVMSG {} :\x01ACTION {}\x01", name, rest));
        self.newline(t, LineType::Chat, "*", &format!("{} {}", nick, rest));

        Ok(())
    }

    /// `/nick [nick]`
    fn send_nick(&mut self, sid: usize, t: Target, rest: &str) -> Result<(), ()> {
        match rest.split(' ').find(|a| !a.is_empty()) {
            Some(nick) => {
                self.sendf(sid, format!("NICK {}", nick));
                Ok(())
            }
            None => {
                let nick = self.servers.index(sid).nick.clone();
                self.newline(
                    t,
                    LineType::ServerInfo,
                    crate::state::FROM_INFO,
                    &format!("Your nick is '{}'", nick),
                );
                Ok(())
            }
        }
    }

    /// `/part [[target] message]`
    fn send_part(&mut self, sid: usize, t: Target, rest: &str) -> Result<(), ()> {
        let part_message = self.config.part_message.clone();

        let (targ, message) = match rest.split_once(' ') {
            Some((targ, msg)) => (targ, msg.trim_start_matches(' ')),
            None => (rest, ""),
        };

        if !targ.is_empty() {
            let message = if message.is_empty() {
                part_message.as_str()
            } else {
                message
            };
            self.sendf(sid, format!("PART {} :{}", targ, message));
            return Ok(());
        }

        let c = self.channel(t);

        match c.kind {
            ChannelKind::Privmsg => self.sendf_chan_err(t, "Can't part private buffers"),
            ChannelKind::Channel if c.parted => {
                self.sendf_chan_err(t, "Already parted from channel")
            }
            ChannelKind::Channel => {
                let name = c.name.clone();
                self.sendf(sid, format!("PART {} :{}", name, part_message));
                Ok(())
            }
            _ => self.sendf_chan_err(t, "PART requires a target"),
        }
    }

    /// `/quit [message]`
    fn send_quit(&mut self, sid: usize, rest: &str) -> Result<(), ()> {
        let message = if rest.is_empty() {
            self.config.quit_message.clone()
        } else {
            rest.to_string()
        };

        self.servers.index_mut(sid).quitting = true;
        self.sendf(sid, format!("QUIT :{}", message));

        Ok(())
    }

    /// `/raw <message>`
    fn send_raw(&mut self, sid: usize, t: Target, rest: &str) -> Result<(), ()> {
        if rest.is_empty() {
            return self.sendf_chan_err(t, "usage: /raw <message>");
        }

        self.sendf(sid, rest.to_string());
        self.newline(t, LineType::ServerInfo, "RAW >>", rest);

        Ok(())
    }

    /// `/topic [topic]`
    fn send_topic(&mut self, sid: usize, t: Target, rest: &str) -> Result<(), ()> {
        {
            let c = self.channel(t);
            if c.kind != ChannelKind::Channel {
                return self.sendf_chan_err(t, "This is not a channel");
            }
        }

        let name = self.channel(t).name.clone();

        if rest.is_empty() {
            self.sendf(sid, format!("TOPIC {}", name));
        } else {
            self.sendf(sid, format!("TOPIC {} :{}", name, rest));
        }

        Ok(())
    }

    /// `/version [target]`
    fn send_version(&mut self, sid: usize, t: Target, rest: &str) -> Result<(), ()> {
        match rest.split(' ').find(|a| !a.is_empty()) {
            Some(targ) => {
                self.newline(
                    t,
                    LineType::ServerInfo,
                    crate::state::FROM_INFO,
                    &format!("Sending CTCP VERSION request to {}", targ),
                );
                self.sendf(sid, format!("PRIVMSG {} :\x01VERSION\x01", targ));
            }
            None => {
                let host = self.servers.index(sid).host.clone();
                self.newline(
                    t,
                    LineType::ServerInfo,
                    crate::state::FROM_INFO,
                    &format!("Sending CTCP VERSION request to {}", host),
                );
                self.sendf(sid, "VERSION".to_string());
            }
        }

        Ok(())
    }

    /// `/ignore [nick]`, `/unignore [nick]`
    fn send_ignore(&mut self, sid: usize, t: Target, rest: &str, add: bool) -> Result<(), ()> {
        let cm = self.servers.index(sid).casemapping;

        let Some(nick) = rest.split(' ').find(|a| !a.is_empty()) else {
            let nicks: Vec<String> = self
                .servers
                .index(sid)
                .ignore
                .iter()
                .map(|u| u.nick.clone())
                .collect();

            let text = if nicks.is_empty() {
                "Ignoring: (none)".to_string()
            } else {
                format!("Ignoring: {}", nicks.join(", "))
            };

            self.newline(t, LineType::ServerInfo, crate::state::FROM_INFO, &text);
            return Ok(());
        };

        if add {
            match self
                .servers
                .index_mut(sid)
                .ignore
                .add(cm, nick, crate::mode::Mode::default())
            {
                Ok(()) => {
                    let text = format!("Ignoring '{}'", nick);
                    self.newline(t, LineType::ServerInfo, crate::state::FROM_INFO, &text);
                    Ok(())
                }
                Err(_) => self.sendf_chan_err(t, &format!("Already ignoring '{}'", nick)),
            }
        } else {
            match self.servers.index_mut(sid).ignore.del(cm, nick) {
                Ok(()) => {
                    let text = format!("No longer ignoring '{}'", nick);
                    self.newline(t, LineType::ServerInfo, crate::state::FROM_INFO, &text);
                    Ok(())
                }
                Err(_) => self.sendf_chan_err(t, &format!("'{}' not on ignore list", nick)),
            }
        }
    }

    /// `/ctcp-* [target]`: request to the named target, or the private
    /// buffer's counterpart.
    fn send_ctcp(&mut self, sid: usize, t: Target, command: &str, rest: &str) -> Result<(), ()> {
        let targ = match rest.split(' ').find(|a| !a.is_empty()) {
            Some(targ) => targ.to_string(),
            None => {
                let c = self.channel(t);
                if c.kind == ChannelKind::Privmsg {
                    c.name.clone()
                } else {
                    return self.sendf_chan_err(
                        t,
                        &format!("usage: /ctcp-{} <target>", command.to_ascii_lowercase()),
                    );
                }
            }
        };

        if command == "PING" {
            let now = Utc::now();
            self.sendf(
                sid,
                format!(
                    "PRIVMSG {} :\x01PING {} {}\x01",
                    targ,
                    now.timestamp(),
                    now.timestamp_subsec_micros()
                ),
            );
        } else {
            self.sendf(sid, format!("PRIVMSG {} :\x01{}\x01", targ, command));
        }

        Ok(())
    }
}
