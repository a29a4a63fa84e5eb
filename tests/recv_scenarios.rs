//! End-to-end receive scenarios, driven through the sans-IO surface:
//! received lines in, outgoing lines and buffer/state effects out.

use slirc::state::{Client, ClientConfig, Target};
use slirc::{Activity, Casemap, Channel, ChannelKind, LineType, Server};

fn client() -> Client {
    let mut config = ClientConfig::default();
    config.username = "user".to_string();
    config.realname = "real".to_string();
    Client::new(config)
}

fn client_with_server(nicks: &str) -> (Client, usize) {
    let mut c = client();

    let mut server = Server::new("irc.example.org", 6697, None, "user", "real");
    server.set_nicks(nicks).unwrap();
    server.nicks_next();

    let sid = c.add_server(server);
    (c, sid)
}

fn add_channel(c: &mut Client, sid: usize, name: &str, joined: bool, parted: bool) -> usize {
    let mut chan = Channel::new(name, ChannelKind::Channel);
    chan.joined = joined;
    chan.parted = parted;
    c.servers_mut().index_mut(sid).channels.add(chan)
}

fn sent(c: &mut Client) -> Vec<String> {
    c.take_outgoing().into_iter().map(|(_, l)| l).collect()
}

fn buffer_texts(c: &Client, t: Target) -> Vec<String> {
    let b = &c.channel(t).buffer;
    let mut out = Vec::new();
    if b.size() > 0 {
        let head = b.head_idx();
        let tail = head.wrapping_sub(b.size() - 1);
        let mut i = tail;
        loop {
            out.push(b.line(i).text.clone());
            if i == head {
                break;
            }
            i = i.wrapping_add(1);
        }
    }
    out
}

#[test]
fn scenario_welcome_and_auto_join() {
    let (mut c, sid) = client_with_server("me");

    add_channel(&mut c, sid, "#a", false, false);
    add_channel(&mut c, sid, "#b", false, true);

    c.recv_line(sid, ":srv 001 me :Welcome");

    let lines = sent(&mut c);
    assert_eq!(lines, vec!["JOIN #a"]);

    assert!(c.servers().index(sid).registered);

    let texts = buffer_texts(&c, Target::Chan { sid, cid: 0 });
    assert!(texts.contains(&"Welcome".to_string()));
    assert!(texts.contains(&"You are known as me".to_string()));
}

#[test]
fn scenario_names_with_prefixes() {
    let (mut c, sid) = client_with_server("me");
    let cid = add_channel(&mut c, sid, "#c", true, false);

    c.recv_line(sid, ":srv 353 me = #c :@alice +bob @+carol dave");

    let cm = Casemap::Rfc1459;
    let users = &c.servers().index(sid).channels.index(cid).users;
    assert_eq!(users.count(), 4);

    let alice = users.get(cm, "alice").unwrap();
    assert!(alice.prfxmodes.is_set('o'));
    assert_eq!(alice.prefix(), Some('@'));

    let bob = users.get(cm, "bob").unwrap();
    assert!(bob.prfxmodes.is_set('v'));
    assert_eq!(bob.prefix(), Some('+'));

    let carol = users.get(cm, "carol").unwrap();
    assert!(carol.prfxmodes.is_set('o'));
    assert!(carol.prfxmodes.is_set('v'));
    assert_eq!(carol.prefix(), Some('@'));

    let dave = users.get(cm, "dave").unwrap();
    assert_eq!(dave.prefix(), None);
}

#[test]
fn scenario_ping_phase() {
    use slirc::IoCallbacks;

    let (mut c, sid) = client_with_server("me");
    c.config.io.ping_min = 5;

    let uid = c.servers().index(sid).uid;

    /* entering the ping phase sends one PING */
    c.ping(uid, 5);
    assert_eq!(c.servers().index(sid).ping, 5);

    /* refreshes only update state */
    c.ping(uid, 10);
    assert_eq!(c.servers().index(sid).ping, 10);

    /* data arrived: phase cleared */
    c.ping(uid, 0);
    assert_eq!(c.servers().index(sid).ping, 0);
}

#[test]
fn scenario_nick_collision_rotation() {
    let (mut c, sid) = client_with_server("nick, nick_, nick__");
    assert_eq!(c.servers().index(sid).nick, "nick");

    c.recv_line(sid, ":srv 433 * nick :Nick in use");
    assert_eq!(sent(&mut c), vec!["NICK nick_"]);
    assert_eq!(c.servers().index(sid).nick, "nick_");

    let texts = buffer_texts(&c, Target::Chan { sid, cid: 0 });
    assert!(texts.contains(&"Trying again with 'nick_'".to_string()));

    c.recv_line(sid, ":srv 433 * nick_ :Nick in use");
    assert_eq!(sent(&mut c), vec!["NICK nick__"]);

    /* candidates exhausted: stop retrying */
    c.recv_line(sid, ":srv 433 * nick__ :Nick in use");
    assert!(sent(&mut c).is_empty());
    assert_eq!(c.servers().index(sid).nick, "nick__");
}

#[test]
fn scenario_mode_mixed_subtypes() {
    let (mut c, sid) = client_with_server("me");
    let cid = add_channel(&mut c, sid, "#d", true, false);

    c.recv_line(sid, ":srv 005 me CHANMODES=b,k,l,imnpst PREFIX=(ov)@+ :are supported");
    c.recv_line(sid, ":srv 353 me = #d :alice bob");
    c.recv_line(sid, ":op!op@h MODE #d +ovkl alice bob secret 30");

    let cm = Casemap::Rfc1459;
    let chan = c.servers().index(sid).channels.index(cid);

    let alice = chan.users.get(cm, "alice").unwrap();
    assert!(alice.prfxmodes.is_set('o'));
    assert_eq!(alice.prefix(), Some('@'));

    let bob = chan.users.get(cm, "bob").unwrap();
    assert!(bob.prfxmodes.is_set('v'));
    assert_eq!(bob.prefix(), Some('+'));

    assert!(chan.chanmodes.is_set('k'));
    assert!(chan.chanmodes.is_set('l'));
    assert!(!chan.chanmodes.is_set('o'));
    assert_eq!(chan.chanmodes_str, "kl");

    let texts = buffer_texts(&c, Target::Chan { sid, cid });
    assert!(texts.contains(&"op set user alice mode: +o".to_string()));
    assert!(texts.contains(&"op set user bob mode: +v".to_string()));
    assert!(texts.contains(&"op set #d mode: +k secret".to_string()));
    assert!(texts.contains(&"op set #d mode: +l 30".to_string()));
}

#[test]
fn scenario_ctcp_action_creates_private_channel() {
    let (mut c, sid) = client_with_server("me");

    c.recv_line(sid, ":nick!u@h PRIVMSG me :\x01ACTION waves\x01");

    let cid = c
        .servers()
        .index(sid)
        .channels
        .get(Casemap::Rfc1459, "nick")
        .expect("private channel created");

    let chan = c.servers().index(sid).channels.index(cid);
    assert_eq!(chan.kind, ChannelKind::Privmsg);
    assert_eq!(chan.activity, Activity::Pinged);
    assert_eq!(chan.buffer.head().unwrap().text, "nick waves");
    assert_eq!(chan.buffer.head().unwrap().from, "*");
}

#[test]
fn scenario_privmsg_routing_and_ping_detection() {
    let (mut c, sid) = client_with_server("me");
    let cid = add_channel(&mut c, sid, "#chan", true, false);
    c.recv_line(sid, ":srv 353 me = #chan :alice me");

    c.recv_line(sid, ":alice!u@h PRIVMSG #chan :hello everyone");
    let t = Target::Chan { sid, cid };
    assert_eq!(c.channel(t).buffer.head().unwrap().line_type, LineType::Chat);

    c.recv_line(sid, ":alice!u@h PRIVMSG #chan :hey me, you there?");
    assert_eq!(
        c.channel(t).buffer.head().unwrap().line_type,
        LineType::Pinged
    );
    assert_eq!(c.channel(t).activity, Activity::Pinged);

    /* direct message: routed to a private buffer named for the sender */
    c.recv_line(sid, ":alice!u@h PRIVMSG me :psst");
    let pcid = c
        .servers()
        .index(sid)
        .channels
        .get(Casemap::Rfc1459, "alice")
        .unwrap();
    assert_eq!(
        c.channel(Target::Chan { sid, cid: pcid }).buffer.head().unwrap().text,
        "psst"
    );
}

#[test]
fn scenario_ignored_nick_is_dropped() {
    let (mut c, sid) = client_with_server("me");
    let cid = add_channel(&mut c, sid, "#chan", true, false);

    c.servers_mut()
        .index_mut(sid)
        .ignore
        .add(Casemap::Rfc1459, "troll", slirc::Mode::default())
        .unwrap();

    c.recv_line(sid, ":srv 353 me = #chan :troll");
    let before = c.channel(Target::Chan { sid, cid }).buffer.size();

    c.recv_line(sid, ":TROLL!u@h PRIVMSG #chan :spam spam spam");
    assert_eq!(c.channel(Target::Chan { sid, cid }).buffer.size(), before);
}

#[test]
fn scenario_kick_and_part_lifecycle() {
    let (mut c, sid) = client_with_server("me");
    let cid = add_channel(&mut c, sid, "#chan", true, false);
    c.recv_line(sid, ":srv 353 me = #chan :me alice");

    /* another user kicked: removed from the list */
    c.recv_line(sid, ":op!o@h KICK #chan alice :flooding");
    assert!(c
        .servers()
        .index(sid)
        .channels
        .index(cid)
        .users
        .get(Casemap::Rfc1459, "alice")
        .is_none());

    /* we get kicked: parted, users cleared, buffer kept */
    c.recv_line(sid, ":op!o@h KICK #chan me");
    let chan = c.servers().index(sid).channels.index(cid);
    assert!(chan.parted);
    assert!(!chan.joined);
    assert_eq!(chan.users.count(), 0);
    assert!(chan.buffer.size() > 0);
}

#[test]
fn scenario_quit_removes_user_everywhere() {
    let (mut c, sid) = client_with_server("me");
    let a = add_channel(&mut c, sid, "#a", true, false);
    let b = add_channel(&mut c, sid, "#b", true, false);
    c.recv_line(sid, ":srv 353 me = #a :alice bob");
    c.recv_line(sid, ":srv 353 me = #b :alice");

    c.recv_line(sid, ":alice!u@h QUIT :gone");

    let cm = Casemap::Rfc1459;
    assert!(c.servers().index(sid).channels.index(a).users.get(cm, "alice").is_none());
    assert!(c.servers().index(sid).channels.index(b).users.get(cm, "alice").is_none());
    assert!(c.servers().index(sid).channels.index(a).users.get(cm, "bob").is_some());

    let texts = buffer_texts(&c, Target::Chan { sid, cid: b });
    assert!(texts.contains(&"alice!u@h has quit (gone)".to_string()));
}

#[test]
fn scenario_nick_change_replaces_everywhere() {
    let (mut c, sid) = client_with_server("me");
    let cid = add_channel(&mut c, sid, "#chan", true, false);
    c.recv_line(sid, ":srv 353 me = #chan :@alice");

    c.recv_line(sid, ":alice!u@h NICK :alice2");

    let cm = Casemap::Rfc1459;
    let users = &c.servers().index(sid).channels.index(cid).users;
    assert!(users.get(cm, "alice").is_none());

    let alice2 = users.get(cm, "alice2").unwrap();
    assert_eq!(alice2.prefix(), Some('@'));
}

#[test]
fn scenario_casemapping_from_isupport() {
    let (mut c, sid) = client_with_server("me");
    add_channel(&mut c, sid, "#chan", true, false);

    c.recv_line(sid, ":srv 005 me CASEMAPPING=ascii :are supported");
    assert_eq!(c.servers().index(sid).casemapping, Casemap::Ascii);

    /* under ascii, #CHAN still matches but #{chan} does not */
    c.recv_line(sid, ":srv 332 me #CHAN :the topic");
    c.recv_line(sid, ":srv 332 me #{chan} :the topic");

    let texts = buffer_texts(&c, Target::Chan { sid, cid: 0 });
    assert!(texts.iter().any(|l| l.contains("'#{chan}' not found")));
}

#[test]
fn scenario_numeric_target_mismatch() {
    let (mut c, sid) = client_with_server("me");

    c.recv_line(sid, ":srv 372 someoneelse :motd line");

    let texts = buffer_texts(&c, Target::Chan { sid, cid: 0 });
    assert!(texts
        .iter()
        .any(|l| l.contains("target mismatched")));
}

#[test]
fn scenario_topic_display() {
    let (mut c, sid) = client_with_server("me");
    let cid = add_channel(&mut c, sid, "#chan", true, false);

    c.recv_line(sid, ":alice!u@h TOPIC #chan :fresh topic");
    c.recv_line(sid, ":alice!u@h TOPIC #chan :");

    let texts = buffer_texts(&c, Target::Chan { sid, cid });
    assert!(texts.contains(&"alice has changed the topic:".to_string()));
    assert!(texts.contains(&"\"fresh topic\"".to_string()));
    assert!(texts.contains(&"alice has unset the topic".to_string()));
}

#[test]
fn scenario_ping_pong() {
    let (mut c, sid) = client_with_server("me");

    c.recv_line(sid, "PING :irc.example.org");
    assert_eq!(sent(&mut c), vec!["PONG :irc.example.org"]);
}

#[test]
fn scenario_join_echo_creates_channel() {
    let (mut c, sid) = client_with_server("me");

    c.recv_line(sid, ":me!u@h JOIN #new");

    let cid = c
        .servers()
        .index(sid)
        .channels
        .get(Casemap::Rfc1459, "#new")
        .expect("channel created on join echo");

    let chan = c.servers().index(sid).channels.index(cid);
    assert!(chan.joined);
    assert!(!chan.parted);

    assert_eq!(sent(&mut c), vec!["MODE #new"]);
    assert_eq!(c.current(), Target::Chan { sid, cid });
}

#[test]
fn scenario_ctcp_version_request() {
    let (mut c, sid) = client_with_server("me");

    c.recv_line(sid, ":nick!u@h PRIVMSG me :\x01VERSION\x01");

    let lines = sent(&mut c);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("NOTICE nick :\x01VERSION slirc v"));

    let texts = buffer_texts(&c, Target::Chan { sid, cid: 0 });
    assert!(texts.contains(&"CTCP VERSION from nick".to_string()));
}

#[test]
fn scenario_ctcp_finger_includes_date() {
    let (mut c, sid) = client_with_server("me");

    c.recv_line(sid, ":nick!u@h PRIVMSG me :\x01FINGER\x01");

    let lines = sent(&mut c);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("NOTICE nick :\x01FINGER slirc v"));
    assert!(lines[0].contains('('), "{}", lines[0]);
    assert!(lines[0].ends_with(")\x01"));
}

#[test]
fn scenario_ctcp_unsupported() {
    let (mut c, sid) = client_with_server("me");

    c.recv_line(sid, ":nick!u@h PRIVMSG me :\x01DCC SEND file\x01");

    let lines = sent(&mut c);
    assert_eq!(
        lines,
        vec!["NOTICE nick :\x01ERRMSG Unsupported CTCP command: 'DCC'\x01"]
    );
}
