//! Client-To-Client Protocol payload extraction.
//!
//! CTCP messages travel inside PRIVMSG/NOTICE bracketed by `\x01`; the
//! closing delimiter is optional at end of line. The first token is the
//! CTCP command, the remainder its arguments.

/// CTCP message delimiter.
pub const CTCP_DELIM: u8 = 0x01;

/// Test whether a PRIVMSG/NOTICE payload is CTCP-encoded.
pub fn is_ctcp(message: &str) -> bool {
    message.as_bytes().first() == Some(&CTCP_DELIM)
}

/// An extracted CTCP command and its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ctcp<'a> {
    pub command: &'a str,
    pub args: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Extract the command and arguments from a `\x01`-bracketed
    /// payload; `None` for empty or malformed messages.
    pub fn parse(message: &'a str) -> Option<Ctcp<'a>> {
        let body = message.strip_prefix('\x01')?;

        let body = match body.find('\x01') {
            Some(end) => &body[..end],
            None => body,
        };

        let body = body.trim_matches(' ');

        if body.is_empty() {
            return None;
        }

        let (command, args) = match body.split_once(' ') {
            Some((c, a)) => (c, a.trim_start_matches(' ')),
            None => (body, ""),
        };

        Some(Ctcp {
            command,
            args: if args.is_empty() { None } else { Some(args) },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ctcp() {
        assert!(is_ctcp("\x01VERSION\x01"));
        assert!(!is_ctcp("VERSION"));
        assert!(!is_ctcp(""));
    }

    #[test]
    fn test_parse_closed() {
        let c = Ctcp::parse("\x01PING 123\x01").unwrap();
        assert_eq!(c.command, "PING");
        assert_eq!(c.args, Some("123"));
    }

    #[test]
    fn test_parse_unterminated() {
        let c = Ctcp::parse("\x01ACTION waves slowly").unwrap();
        assert_eq!(c.command, "ACTION");
        assert_eq!(c.args, Some("waves slowly"));
    }

    #[test]
    fn test_parse_no_args() {
        let c = Ctcp::parse("\x01VERSION\x01").unwrap();
        assert_eq!(c.command, "VERSION");
        assert_eq!(c.args, None);
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(Ctcp::parse("no delimiter"), None);
        assert_eq!(Ctcp::parse("\x01\x01"), None);
        assert_eq!(Ctcp::parse("\x01   \x01"), None);
    }
}
