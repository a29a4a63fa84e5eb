//! Benchmarks for IRC message parsing and case folding.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slirc::casemap::{irc_eq, irc_pinged, Casemap};
use slirc::util::word_wrap;
use slirc::Message;

/// Simple PING message
const SIMPLE_MESSAGE: &str = "PING :irc.example.com";

/// Message with prefix
const PREFIX_MESSAGE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

/// Numeric response
const NUMERIC_RESPONSE: &str = ":irc.server.net 001 nickname :Welcome to the IRC Network nickname!user@host";

/// ISUPPORT with many positional parameters
const ISUPPORT_MESSAGE: &str = ":irc.server.net 005 nickname CHANMODES=eIbq,k,flj,CFLMPQScgimnprstuz PREFIX=(ov)@+ MODES=4 CASEMAPPING=rfc1459 NETWORK=Example STATUSMSG=@+ :are supported by this server";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    let messages = [
        ("simple_ping", SIMPLE_MESSAGE),
        ("with_prefix", PREFIX_MESSAGE),
        ("numeric_response", NUMERIC_RESPONSE),
        ("isupport", ISUPPORT_MESSAGE),
    ];

    for (name, raw) in messages {
        group.bench_function(name, |b| {
            b.iter(|| {
                let msg = Message::parse(black_box(raw)).unwrap();
                black_box(msg)
            })
        });
    }

    group.finish();
}

fn benchmark_param_consumption(c: &mut Criterion) {
    let mut group = c.benchmark_group("Parameter Consumption");

    group.bench_function("drain_isupport", |b| {
        b.iter(|| {
            let mut msg = Message::parse(black_box(ISUPPORT_MESSAGE)).unwrap();
            while let Some(p) = msg.param() {
                black_box(p);
            }
        })
    });

    group.finish();
}

fn benchmark_casemap(c: &mut Criterion) {
    let mut group = c.benchmark_group("Case Folding");

    for cm in [Casemap::Rfc1459, Casemap::StrictRfc1459, Casemap::Ascii] {
        group.bench_with_input(
            BenchmarkId::new("irc_eq", format!("{:?}", cm)),
            &cm,
            |b, &cm| {
                b.iter(|| irc_eq(cm, black_box("[some]^nick"), black_box("{SOME}~NICK")))
            },
        );
    }

    group.bench_function("irc_pinged", |b| {
        b.iter(|| {
            irc_pinged(
                Casemap::Rfc1459,
                black_box("a longer line of chat that mentions nickname near the end"),
                black_box("nickname"),
            )
        })
    });

    group.finish();
}

fn benchmark_word_wrap(c: &mut Criterion) {
    let text = "the quick brown fox jumps over the lazy dog ".repeat(10);

    c.bench_function("word_wrap_80", |b| {
        b.iter(|| word_wrap(80, black_box(&text)).count())
    });
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_param_consumption,
    benchmark_casemap,
    benchmark_word_wrap,
);

criterion_main!(benches);
