//! Property tests for the buffer, input editor and case folding.

use proptest::prelude::*;

use slirc::buffer::{Buffer, LineType, BUFFER_LINES_MAX};
use slirc::casemap::{irc_cmp, irc_eq, Casemap};
use slirc::input::{Input, INPUT_LEN_MAX};

proptest! {
    #[test]
    fn buffer_size_is_bounded(n in 0u32..3000) {
        let mut b = Buffer::new();

        for i in 0..n {
            b.push(LineType::Chat, "nick", &format!("line {}", i), None);
            prop_assert!(b.size() <= BUFFER_LINES_MAX);
        }

        if n >= BUFFER_LINES_MAX {
            prop_assert_eq!(b.size(), BUFFER_LINES_MAX);
        } else {
            prop_assert_eq!(b.size(), n);
        }
    }

    #[test]
    fn buffer_scrollback_stays_in_range(
        pushes in 1u32..2500,
        pages in proptest::collection::vec(any::<bool>(), 0..40),
    ) {
        let mut b = Buffer::new();

        for i in 0..pushes {
            b.push(LineType::Chat, "nick", &format!("line {}", i), None);
        }

        for forward in pages {
            if forward {
                b.page_forw(20, 10);
            } else {
                b.page_back(20, 10);
            }

            /* the line() range check aborts on an invalid index */
            let _ = b.line(b.scrollback());

            let status = b.scrollback_status();
            prop_assert!((0.0..=100.0).contains(&status));
        }
    }

    #[test]
    fn input_cursor_round_trip(
        text in "[a-zA-Z0-9 ]{1,100}",
        moves in 0usize..120,
    ) {
        let mut input = Input::new();
        prop_assert!(input.insert(text.as_bytes()));

        let mut moved = 0;
        for _ in 0..moves {
            if input.cursor_back() {
                moved += 1;
            }
        }
        for _ in 0..moved {
            prop_assert!(input.cursor_forw());
        }

        prop_assert_eq!(input.write(), text);
    }

    #[test]
    fn input_never_exceeds_capacity(
        chunks in proptest::collection::vec("[a-z]{1,80}", 0..20),
    ) {
        let mut input = Input::new();

        for chunk in chunks {
            input.insert(chunk.as_bytes());
            prop_assert!(input.size() <= INPUT_LEN_MAX);
        }
    }

    #[test]
    fn hist_push_then_back_round_trips(lines in proptest::collection::vec("[a-z]{1,20}", 1..30)) {
        let mut input = Input::new();

        for line in &lines {
            input.insert(line.as_bytes());
            prop_assert!(input.hist_push());
        }

        prop_assert!(input.hist_back());
        prop_assert_eq!(input.write(), lines.last().unwrap().clone());
    }

    #[test]
    fn casemap_cmp_is_symmetric(a in "[ -~]{0,20}", b in "[ -~]{0,20}") {
        for cm in [Casemap::Rfc1459, Casemap::StrictRfc1459, Casemap::Ascii] {
            let ab = irc_cmp(cm, &a, &b);
            let ba = irc_cmp(cm, &b, &a);
            prop_assert_eq!(ab, ba.reverse());
            prop_assert_eq!(irc_eq(cm, &a, &b), irc_eq(cm, &b, &a));
        }
    }

    #[test]
    fn casemap_eq_is_reflexive(a in "[ -~]{0,30}") {
        for cm in [Casemap::Rfc1459, Casemap::StrictRfc1459, Casemap::Ascii] {
            prop_assert!(irc_eq(cm, &a, &a));
        }
    }

    #[test]
    fn parse_roundtrip_privmsg(
        chan in "#[a-zA-Z0-9]{1,20}",
        text in "[ -~]{1,200}",
    ) {
        let raw = format!(":nick!user@host PRIVMSG {} :{}", chan, text);
        let mut m = slirc::Message::parse(&raw).unwrap();

        prop_assert_eq!(m.from, Some("nick"));
        prop_assert_eq!(m.command, "PRIVMSG");
        prop_assert_eq!(m.param(), Some(chan.as_str()));
        prop_assert_eq!(m.param(), Some(text.as_str()));
    }
}
