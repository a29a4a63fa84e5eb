//! Capability negotiation: LS/LIST/ACK/NAK/NEW/DEL with registration
//! gating and multi-line continuation.

use slirc::state::{Client, ClientConfig, Target};
use slirc::Server;

fn client_with_server() -> (Client, usize) {
    let mut c = Client::new(ClientConfig::default());

    let mut server = Server::new("irc.example.org", 6697, None, "user", "real");
    server.set_nicks("me").unwrap();
    server.nicks_next();

    let sid = c.add_server(server);
    (c, sid)
}

fn sent(c: &mut Client) -> Vec<String> {
    c.take_outgoing().into_iter().map(|(_, l)| l).collect()
}

fn buffer_texts(c: &Client, sid: usize) -> Vec<String> {
    let b = &c.channel(Target::Chan { sid, cid: 0 }).buffer;
    let mut out = Vec::new();
    if b.size() > 0 {
        let head = b.head_idx();
        let mut i = head.wrapping_sub(b.size() - 1);
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
fn cap_missing_arguments() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP");
    c.recv_line(sid, "CAP *");
    c.recv_line(sid, "CAP * XXX");

    let texts = buffer_texts(&c, sid);
    assert!(texts.contains(&"CAP: target is null".to_string()));
    assert!(texts.contains(&"CAP: command is null".to_string()));
    assert!(texts.contains(&"CAP: unrecognized subcommand 'XXX'".to_string()));
    assert!(sent(&mut c).is_empty());
}

#[test]
fn cap_ls_requests_auto_caps() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * LS :away-notify multi-prefix unknown-cap");

    assert_eq!(
        sent(&mut c),
        vec!["CAP REQ :away-notify", "CAP REQ :multi-prefix"]
    );

    let caps = &c.servers().index(sid).caps;
    assert!(caps.get("away-notify").unwrap().supported);
    assert!(caps.get("away-notify").unwrap().req);
    assert!(caps.get("multi-prefix").unwrap().supported);
    assert_eq!(caps.cap_reqs, 2);
}

#[test]
fn cap_ls_empty_completes_registration() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * LS :");
    assert_eq!(sent(&mut c), vec!["CAP END"]);
}

#[test]
fn cap_ls_invalid_parameters() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * LS");
    c.recv_line(sid, "CAP * LS *");
    c.recv_line(sid, "CAP * LS cap-1 cap-2");

    let texts = buffer_texts(&c, sid);
    assert_eq!(
        texts
            .iter()
            .filter(|l| l.as_str() == "CAP LS: parameter is null")
            .count(),
        2
    );
    assert!(texts.contains(&"CAP LS: invalid parameters".to_string()));
    assert!(sent(&mut c).is_empty());
}

#[test]
fn cap_ls_multiline_defers_requests() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * LS * :away-notify");
    assert!(sent(&mut c).is_empty());

    c.recv_line(sid, "CAP * LS * :chghost unknown");
    assert!(sent(&mut c).is_empty());

    c.recv_line(sid, "CAP * LS :multi-prefix");
    assert_eq!(
        sent(&mut c),
        vec![
            "CAP REQ :away-notify",
            "CAP REQ :chghost",
            "CAP REQ :multi-prefix",
        ]
    );
}

#[test]
fn cap_ls_when_registered_is_informational() {
    let (mut c, sid) = client_with_server();
    c.servers_mut().index_mut(sid).registered = true;

    c.recv_line(sid, "CAP * LS :away-notify multi-prefix");

    assert!(sent(&mut c).is_empty());
    assert!(buffer_texts(&c, sid).contains(&"CAP LS: away-notify multi-prefix".to_string()));
}

#[test]
fn cap_ack_enables_then_ends() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * LS :away-notify multi-prefix");
    let _ = sent(&mut c);

    c.recv_line(sid, "CAP * ACK :away-notify");
    assert!(sent(&mut c).is_empty());
    assert!(c.servers().index(sid).caps.get("away-notify").unwrap().set);

    c.recv_line(sid, "CAP * ACK :multi-prefix");
    assert_eq!(sent(&mut c), vec!["CAP END"]);

    let texts = buffer_texts(&c, sid);
    assert!(texts.contains(&"capability change accepted: away-notify".to_string()));
    assert!(texts.contains(&"capability change accepted: multi-prefix".to_string()));
}

#[test]
fn cap_ack_errors() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * ACK");
    c.recv_line(sid, "CAP * ACK :");
    c.recv_line(sid, "CAP * ACK :unknown-cap multi-prefix");

    let texts = buffer_texts(&c, sid);
    assert!(texts.contains(&"CAP ACK: parameter is null".to_string()));
    assert!(texts.contains(&"CAP ACK: parameter is empty".to_string()));
    assert!(texts.contains(&"CAP ACK: 'unknown-cap' not supported".to_string()));
    assert!(texts.contains(&"CAP ACK: 'multi-prefix' was not requested".to_string()));
    assert!(texts.contains(&"CAP ACK: parameter errors".to_string()));
    assert!(sent(&mut c).is_empty());
}

#[test]
fn cap_ack_disable() {
    let (mut c, sid) = client_with_server();
    c.servers_mut().index_mut(sid).registered = true;

    {
        let caps = &mut c.servers_mut().index_mut(sid).caps;
        caps.get_mut("away-notify").unwrap().set = true;
        caps.get_mut("away-notify").unwrap().req = true;
        caps.cap_reqs = 1;
    }

    c.recv_line(sid, "CAP * ACK :-away-notify");

    assert!(!c.servers().index(sid).caps.get("away-notify").unwrap().set);
    assert!(buffer_texts(&c, sid).contains(&"capability change accepted: -away-notify".to_string()));
    /* registered: no CAP END */
    assert!(sent(&mut c).is_empty());
}

#[test]
fn cap_nak_rejects_and_ends() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * LS :away-notify");
    let _ = sent(&mut c);

    c.recv_line(sid, "CAP * NAK :away-notify");

    let caps = &c.servers().index(sid).caps;
    assert!(!caps.get("away-notify").unwrap().set);
    assert!(!caps.get("away-notify").unwrap().req);

    assert!(buffer_texts(&c, sid).contains(&"capability change rejected: away-notify".to_string()));
    assert_eq!(sent(&mut c), vec!["CAP END"]);
}

#[test]
fn cap_nak_unknown_caps_reported() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * NAK :cap-aaa cap-bbb");

    let texts = buffer_texts(&c, sid);
    assert!(texts.contains(&"capability change rejected: cap-aaa".to_string()));
    assert!(texts.contains(&"capability change rejected: cap-bbb".to_string()));
    assert_eq!(sent(&mut c), vec!["CAP END"]);
}

#[test]
fn cap_new_auto_requests() {
    let (mut c, sid) = client_with_server();
    c.servers_mut().index_mut(sid).registered = true;

    {
        let caps = &mut c.servers_mut().index_mut(sid).caps;
        caps.get_mut("chghost").unwrap().set = true;
    }

    c.recv_line(sid, "CAP * NEW :chghost extended-join unknown");

    /* chghost already set: no REQ; unknown: silent */
    assert_eq!(sent(&mut c), vec!["CAP REQ :extended-join"]);

    let texts = buffer_texts(&c, sid);
    assert!(texts.contains(&"new capability: chghost".to_string()));
    assert!(texts.contains(&"new capability: extended-join".to_string()));
    assert!(!texts.iter().any(|l| l.contains("unknown")));
}

#[test]
fn cap_del_revokes() {
    let (mut c, sid) = client_with_server();

    {
        let caps = &mut c.servers_mut().index_mut(sid).caps;
        caps.get_mut("invite-notify").unwrap().set = true;
        caps.get_mut("invite-notify").unwrap().supported = true;
    }

    c.recv_line(sid, "CAP * DEL :invite-notify unknown");

    let cap = c.servers().index(sid).caps.get("invite-notify").unwrap();
    assert!(!cap.set && !cap.supported && !cap.req);
    assert!(buffer_texts(&c, sid).contains(&"capability lost: invite-notify".to_string()));
    assert!(sent(&mut c).is_empty());
}

#[test]
fn cap_del_mixed_list_continues() {
    let (mut c, sid) = client_with_server();

    {
        let caps = &mut c.servers_mut().index_mut(sid).caps;
        caps.get_mut("sasl").unwrap().set = true;
        caps.get_mut("sasl").unwrap().supported = true;
        caps.get_mut("invite-notify").unwrap().set = true;
        caps.get_mut("invite-notify").unwrap().supported = true;
    }

    c.recv_line(sid, "CAP * DEL :sasl invite-notify");

    /* sasl refuses DEL; the rest of the list is still processed */
    let sasl = c.servers().index(sid).caps.get("sasl").unwrap();
    assert!(sasl.set && sasl.supported);

    let inv = c.servers().index(sid).caps.get("invite-notify").unwrap();
    assert!(!inv.set && !inv.supported);

    let texts = buffer_texts(&c, sid);
    assert!(texts.contains(&"CAP DEL: 'sasl' doesn't support DEL".to_string()));
    assert!(texts.contains(&"capability lost: invite-notify".to_string()));
    assert!(texts.contains(&"CAP DEL: parameter errors".to_string()));
    assert!(sent(&mut c).is_empty());
}

#[test]
fn cap_list_advisory() {
    let (mut c, sid) = client_with_server();

    c.recv_line(sid, "CAP * LIST :");
    c.recv_line(sid, "CAP * LIST :multi-prefix sasl");

    let texts = buffer_texts(&c, sid);
    assert!(texts.contains(&"CAP LIST: (no capabilities)".to_string()));
    assert!(texts.contains(&"CAP LIST: multi-prefix sasl".to_string()));
    assert!(sent(&mut c).is_empty());
}

#[test]
fn cap_sasl_flow() {
    let (mut c, sid) = client_with_server();
    c.servers_mut().index_mut(sid).sasl = Some(slirc::sasl::SaslAuth::plain("me", "hunter2"));

    c.recv_line(sid, "CAP * LS :sasl");
    assert_eq!(sent(&mut c), vec!["CAP REQ :sasl"]);

    /* ack begins the exchange and defers CAP END */
    c.recv_line(sid, "CAP * ACK :sasl");
    assert_eq!(sent(&mut c), vec!["AUTHENTICATE PLAIN"]);

    c.recv_line(sid, "AUTHENTICATE +");
    let lines = sent(&mut c);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("AUTHENTICATE "));
    assert_ne!(lines[0], "AUTHENTICATE +");

    /* success completes registration */
    c.recv_line(sid, ":srv 903 me :SASL authentication successful");
    assert_eq!(sent(&mut c), vec!["CAP END"]);
}

#[test]
fn cap_sasl_failure_continues() {
    let (mut c, sid) = client_with_server();
    c.servers_mut().index_mut(sid).sasl = Some(slirc::sasl::SaslAuth::plain("me", "hunter2"));

    c.recv_line(sid, "CAP * LS :sasl");
    let _ = sent(&mut c);
    c.recv_line(sid, "CAP * ACK :sasl");
    let _ = sent(&mut c);

    c.recv_line(sid, ":srv 904 me :SASL authentication failed");
    assert_eq!(sent(&mut c), vec!["CAP END"]);
}
