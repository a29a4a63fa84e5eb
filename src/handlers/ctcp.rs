//! CTCP request and response handling.
//!
//! Requests arrive in PRIVMSG, responses in NOTICE. Requests other than
//! ACTION are answered with a NOTICE back to the sender; responses are
//! informational only.

use chrono::Local;

use crate::buffer::LineType;
use crate::channel::{Activity, Channel, ChannelKind};
use crate::ctcp::Ctcp;
use crate::state::{Client, Target, SOURCE_URL, VERSION_STR};

/// Commands answered by CLIENTINFO, in reply order.
const CLIENTINFO: &str = "ACTION CLIENTINFO FINGER PING SOURCE TIME USERINFO VERSION";

impl Client {
    pub(crate) fn ctcp_request(
        &mut self,
        sid: usize,
        from: &str,
        targ: &str,
        message: &str,
    ) -> Result<(), ()> {
        let Some(ctcp) = Ctcp::parse(message) else {
            return self.failf(sid, &format!("Received malformed CTCP from {}", from));
        };

        match ctcp.command.to_ascii_uppercase().as_str() {
            "ACTION" => return self.ctcp_request_action(sid, from, targ, ctcp.args),
            "CLIENTINFO" => {
                self.ctcp_report(sid, "CLIENTINFO", from, ctcp.args);
                self.sendf(sid, format!("NOTICE {} :\x01CLIENTINFO {}\x01", from, CLIENTINFO));
            }
            "FINGER" => {
                self.ctcp_report(sid, "FINGER", from, ctcp.args);
                let date = Local::now().format("%b %e %Y");
                self.sendf(
                    sid,
                    format!("NOTICE {} :\x01FINGER {} ({})\x01", from, VERSION_STR, date),
                );
            }
            "PING" => {
                self.ctcp_report(sid, "PING", from, ctcp.args);
                match ctcp.args {
                    Some(args) => {
                        self.sendf(sid, format!("NOTICE {} :\x01PING {}\x01", from, args))
                    }
                    None => self.sendf(sid, format!("NOTICE {} :\x01PING\x01", from)),
                }
            }
            "SOURCE" => {
                self.ctcp_report(sid, "SOURCE", from, ctcp.args);
                self.sendf(sid, format!("NOTICE {} :\x01SOURCE {}\x01", from, SOURCE_URL));
            }
            "TIME" => {
                self.ctcp_report(sid, "TIME", from, ctcp.args);
                let time = Local::now().format("%Y-%m-%dT%H:%M:%S%z");
                self.sendf(sid, format!("NOTICE {} :\x01TIME {}\x01", from, time));
            }
            "USERINFO" => {
                self.ctcp_report(sid, "USERINFO", from, ctcp.args);
                let s = self.servers.index(sid);
                let reply = format!("{} ({})", s.nick, s.realname);
                self.sendf(sid, format!("NOTICE {} :\x01USERINFO {}\x01", from, reply));
            }
            "VERSION" => {
                self.ctcp_report(sid, "VERSION", from, ctcp.args);
                self.sendf(sid, format!("NOTICE {} :\x01VERSION {}\x01", from, VERSION_STR));
            }
            other => {
                self.sendf(
                    sid,
                    format!(
                        "NOTICE {} :\x01ERRMSG Unsupported CTCP command: '{}'\x01",
                        from, other
                    ),
                );
                return self.failf(
                    sid,
                    &format!("Received unsupported CTCP command '{}' from {}", other, from),
                );
            }
        }

        Ok(())
    }

    pub(crate) fn ctcp_response(
        &mut self,
        sid: usize,
        from: &str,
        _targ: &str,
        message: &str,
    ) -> Result<(), ()> {
        let Some(ctcp) = Ctcp::parse(message) else {
            return self.failf(sid, &format!("Received malformed CTCP from {}", from));
        };

        let command = ctcp.command.to_ascii_uppercase();

        match ctcp.args {
            Some(args) => {
                self.server_info(sid, &format!("CTCP {} response from {}: {}", command, from, args))
            }
            None => self.server_info(sid, &format!("CTCP {} response from {}", command, from)),
        }

        Ok(())
    }

    /// `nick message` rendered into the target channel, or a private
    /// channel for a direct ACTION. No response is generated.
    fn ctcp_request_action(
        &mut self,
        sid: usize,
        from: &str,
        targ: &str,
        args: Option<&str>,
    ) -> Result<(), ()> {
        let s = self.servers.index(sid);
        let cm = s.casemapping;

        let t = if crate::casemap::irc_eq(cm, targ, &s.nick) {
            match s.channels.get(cm, from) {
                Some(cid) => Target::Chan { sid, cid },
                None => {
                    let mut c = Channel::new(from, ChannelKind::Privmsg);
                    c.joined = true;
                    let cid = self.servers.index_mut(sid).channels.add(c);
                    Target::Chan { sid, cid }
                }
            }
        } else {
            match s.channels.get(cm, targ) {
                Some(cid) => Target::Chan { sid, cid },
                None => {
                    return self.failf(sid, &format!("CTCP ACTION: target '{}' not found", targ))
                }
            }
        };

        let text = match args {
            Some(args) => format!("{} {}", from, args),
            None => from.to_string(),
        };
        self.newline(t, LineType::Chat, "*", &text);

        if t != self.current() {
            self.channel_mut(t).touch_activity(Activity::Pinged);
        }

        Ok(())
    }

    fn ctcp_report(&mut self, sid: usize, command: &str, from: &str, args: Option<&str>) {
        match args {
            Some(args) => {
                self.server_info(sid, &format!("CTCP {} from {} ({})", command, from, args))
            }
            None => self.server_info(sid, &format!("CTCP {} from {}", command, from)),
        }
    }
}
