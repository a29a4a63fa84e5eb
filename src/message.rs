//! IRC message parsing.
//!
//! RFC 2812, section 2.3.1:
//!
//! ```text
//! message    =   [ ":" prefix SPACE ] command [ params ] crlf
//! prefix     =   servername / ( nickname [ [ "!" user ] "@" host ] )
//! command    =   1*letter / 3digit
//! params     =   *14( SPACE middle ) [ SPACE ":" trailing ]
//!            =/  14( SPACE middle ) [ SPACE [ ":" ] trailing ]
//! ```
//!
//! The leading structure (prefix, command) is parsed up front; parameters
//! are consumed lazily through a cursor so handlers take exactly the
//! arguments they need and can treat the remainder as trailing text.

use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::opt,
    sequence::{preceded, terminated},
    IResult,
};

use crate::error::MessageParseError;

/// Parse the `:prefix ` section, yielding the text between `:` and space.
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    terminated(
        preceded(char(':'), take_while(|c| c != ' ')),
        take_while(|c| c == ' '),
    )(input)
}

/// Parse the command word.
fn parse_command(input: &str) -> IResult<&str, &str> {
    take_while1(|c| c != ' ')(input)
}

/// A parsed incoming message with a stateful parameter cursor.
#[derive(Debug, Clone)]
pub struct Message<'a> {
    /// Prefix name: servername, or nickname up to `!`/`@`.
    pub from: Option<&'a str>,
    /// Prefix host: what follows `!` or `@`.
    pub host: Option<&'a str>,
    /// Command word or numeric.
    pub command: &'a str,
    params: &'a str,
    n_params: u32,
    split: bool,
}

impl<'a> Message<'a> {
    /// Parse a single CRLF-trimmed line.
    pub fn parse(line: &'a str) -> Result<Message<'a>, MessageParseError> {
        let input = line.trim_start_matches(' ');

        if input.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let (input, prefix) =
            opt(parse_prefix)(input).map_err(|_: nom::Err<nom::error::Error<&str>>| {
                MessageParseError::InvalidPrefix
            })?;

        let (from, host) = match prefix {
            None => (None, None),
            Some(p) => {
                let name_len = p
                    .bytes()
                    .position(|c| c == b'!' || c == b'@')
                    .unwrap_or(p.len());

                if name_len == 0 {
                    return Err(MessageParseError::InvalidPrefix);
                }

                let host = if name_len < p.len() {
                    Some(&p[name_len + 1..])
                } else {
                    None
                };

                (Some(&p[..name_len]), host)
            }
        };

        let input = input.trim_start_matches(' ');

        let (rest, command) =
            parse_command(input).map_err(|_: nom::Err<nom::error::Error<&str>>| {
                MessageParseError::InvalidCommand
            })?;

        Ok(Message {
            from,
            host,
            command,
            params: rest.trim_start_matches(' '),
            n_params: 0,
            split: false,
        })
    }

    /// Yield the next argument, or `None` when exhausted.
    ///
    /// A leading `:` or, outside of split mode, the 14-argument boundary
    /// makes the entire remainder one argument.
    pub fn param(&mut self) -> Option<&'a str> {
        let p = self.params.trim_start_matches(' ');

        if p.is_empty() {
            self.params = "";
            return None;
        }

        if !self.split && self.n_params >= 14 {
            self.params = "";
            return Some(p);
        }

        if let Some(trailing) = p.strip_prefix(':') {
            self.params = "";
            return Some(trailing);
        }

        self.n_params += 1;

        match p.find(' ') {
            Some(i) => {
                self.params = &p[i + 1..];
                Some(&p[..i])
            }
            None => {
                self.params = "";
                Some(p)
            }
        }
    }

    /// Switch to generic-handler semantics: locate the trailing argument
    /// (at `:`, or the 15th positional), truncate the parameter section to
    /// the head words, and return the trailing text.
    ///
    /// Subsequent [`param`](Self::param) calls yield the head words
    /// individually.
    pub fn split(&mut self) -> Option<&'a str> {
        self.split = true;

        let base = self.params;
        let bytes = base.as_bytes();
        let mut i = 0;

        loop {
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }

            if i >= bytes.len() {
                return None;
            }

            self.n_params += 1;

            if self.n_params >= 15 {
                let trailing = &base[i..];
                self.params = base[..i].trim_end_matches(' ');
                return Some(trailing);
            }

            if bytes[i] == b':' {
                let trailing = &base[i + 1..];
                self.params = base[..i].trim_end_matches(' ');
                return if trailing.is_empty() {
                    None
                } else {
                    Some(trailing)
                };
            }

            while i < bytes.len() && bytes[i] != b' ' {
                i += 1;
            }
        }
    }

    /// The unconsumed parameter section, for generic display.
    pub fn params_str(&self) -> &'a str {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let mut m = Message::parse("PRIVMSG #chan :hello world").unwrap();
        assert_eq!(m.from, None);
        assert_eq!(m.host, None);
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.param(), Some("#chan"));
        assert_eq!(m.param(), Some("hello world"));
        assert_eq!(m.param(), None);
    }

    #[test]
    fn test_parse_prefix_forms() {
        let m = Message::parse(":server.tld 001 me :welcome").unwrap();
        assert_eq!(m.from, Some("server.tld"));
        assert_eq!(m.host, None);

        let m = Message::parse(":nick!user@host PRIVMSG #c :hi").unwrap();
        assert_eq!(m.from, Some("nick"));
        assert_eq!(m.host, Some("user@host"));

        let m = Message::parse(":nick@host PRIVMSG #c :hi").unwrap();
        assert_eq!(m.from, Some("nick"));
        assert_eq!(m.host, Some("host"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Message::parse("").unwrap_err(),
            MessageParseError::EmptyMessage
        );
        assert_eq!(
            Message::parse("   ").unwrap_err(),
            MessageParseError::EmptyMessage
        );
        assert_eq!(
            Message::parse(": PING x").unwrap_err(),
            MessageParseError::InvalidPrefix
        );
        assert_eq!(
            Message::parse(":prefix").unwrap_err(),
            MessageParseError::InvalidCommand
        );
    }

    #[test]
    fn test_parse_leading_whitespace() {
        let m = Message::parse("  PING  :irc.tld").unwrap();
        assert_eq!(m.command, "PING");
    }

    #[test]
    fn test_param_trailing_colon() {
        let mut m = Message::parse("TOPIC #c :one : two").unwrap();
        assert_eq!(m.param(), Some("#c"));
        assert_eq!(m.param(), Some("one : two"));
        assert_eq!(m.param(), None);
    }

    #[test]
    fn test_param_14_boundary() {
        let mut m = Message::parse("CMD a1 a2 a3 a4 a5 a6 a7 a8 a9 a10 a11 a12 a13 a14 rest of it")
            .unwrap();
        for i in 1..=14 {
            assert_eq!(m.param(), Some(format!("a{}", i)).as_deref());
        }
        assert_eq!(m.param(), Some("rest of it"));
        assert_eq!(m.param(), None);
    }

    #[test]
    fn test_split_trailing() {
        let mut m = Message::parse("004 me srv ver umodes cmodes :extra text").unwrap();
        let trailing = m.split();
        assert_eq!(trailing, Some("extra text"));
        assert_eq!(m.params_str(), "me srv ver umodes cmodes");
        assert_eq!(m.param(), Some("me"));
        assert_eq!(m.param(), Some("srv"));
    }

    #[test]
    fn test_split_no_trailing() {
        let mut m = Message::parse("005 me TOKEN=x").unwrap();
        assert_eq!(m.split(), None);
        assert_eq!(m.params_str(), "me TOKEN=x");
    }

    #[test]
    fn test_split_empty_trailing() {
        let mut m = Message::parse("CMD a b :").unwrap();
        assert_eq!(m.split(), None);
        assert_eq!(m.params_str(), "a b");
    }

    #[test]
    fn test_split_15th_positional() {
        let mut m = Message::parse("CMD p1 p2 p3 p4 p5 p6 p7 p8 p9 p10 p11 p12 p13 p14 t15 t16")
            .unwrap();
        assert_eq!(m.split(), Some("t15 t16"));
        for i in 1..=14 {
            assert_eq!(m.param(), Some(format!("p{}", i)).as_deref());
        }
        assert_eq!(m.param(), None);
    }

    #[test]
    fn test_parse_unparse_identity() {
        let raw = ":nick!user@host PRIVMSG #chan :hello world";
        let mut m = Message::parse(raw).unwrap();

        let targ = m.param().unwrap();
        let text = m.param().unwrap();
        let rebuilt = format!(
            ":{}!{} {} {} :{}",
            m.from.unwrap(),
            m.host.unwrap(),
            m.command,
            targ,
            text
        );
        assert_eq!(rebuilt, raw);
    }
}
